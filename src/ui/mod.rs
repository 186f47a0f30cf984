pub mod history;
pub mod markdown;
pub mod widgets;

use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

pub fn render(frame: &mut Frame, app: &mut App) {
    // Width available for text is total width - 2 (for borders)
    let available_width = frame.area().width.saturating_sub(2).max(1) as usize;

    let input_lines = if app.input_buffer.is_empty() {
        1
    } else {
        app.input_len().div_ceil(available_width)
    };

    // At most half the screen
    let max_lines = (frame.area().height as usize / 2).saturating_sub(2).max(1);
    let actual_lines = input_lines.clamp(1, max_lines);

    #[allow(clippy::cast_possible_truncation)]
    let input_height = (actual_lines + 2) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(input_height), // Question input with counter
            Constraint::Min(0),               // Headline card and answers
            Constraint::Length(1),            // Status line
            Constraint::Length(1),            // Bottom keymap bar
        ])
        .split(frame.area());

    widgets::render_input_field(frame, app, chunks[0]);
    widgets::render_history(frame, app, chunks[1]);
    widgets::render_status_bar(frame, app, chunks[2]);
    widgets::render_bottom_bar(frame, app, chunks[3]);

    if app.show_examples {
        widgets::render_examples_popup(frame, app, frame.area());
    }

    if app.show_help {
        widgets::render_help_window(frame, app, frame.area());
    }
}

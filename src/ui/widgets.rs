use chrono::{DateTime, Local};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::str::FromStr;
use unicode_width::UnicodeWidthChar;

use super::history::{history_entries, EntryHeader};
use super::markdown::LineKind;
use crate::app::{App, MAX_QUESTION_LEN};
use crate::models::ThemeConfig;
use crate::store::Headline;
use crate::time_format::time_format_ago;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const INTRODUCTION: &str = "🙋 I'm AskBend, I can help you with automatic search and completion \
for articles and knowledge base related to Databend. I have limitations and won't always get it \
right, but your feedback will help me improve.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub border: Color,
    pub accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border: Color::Cyan,
            accent: Color::Green,
        }
    }
}

impl Theme {
    /// Unknown color names fall back to the defaults.
    pub fn from_config(config: &ThemeConfig) -> Self {
        let default = Self::default();
        Self {
            border: parse_color(&config.border_color, default.border),
            accent: parse_color(&config.accent_color, default.accent),
        }
    }
}

fn parse_color(name: &str, fallback: Color) -> Color {
    Color::from_str(name.trim()).unwrap_or(fallback)
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let x = (area.width.saturating_sub(width)) / 2;
    let y = (area.height.saturating_sub(height)) / 2;

    Rect {
        x: area.x + x,
        y: area.y + y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

pub fn render_help_window(frame: &mut Frame, app: &App, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(Span::styled(
            "AskBend - Keyboard Shortcuts",
            Style::default()
                .fg(app.theme.border)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("General:", bold)),
        Line::from("  Ctrl+H        - Show/hide this help"),
        Line::from("  Ctrl+Q        - Quit application"),
        Line::from("  Ctrl+C x2     - Quit application"),
        Line::from(""),
        Line::from(Span::styled("Asking:", bold)),
        Line::from("  Enter         - Ask the typed question"),
        Line::from("  Ctrl+R        - Regenerate the answer"),
        Line::from("  Ctrl+E        - Pick an example question"),
        Line::from(""),
        Line::from(Span::styled("Answers:", bold)),
        Line::from("  Up/Down       - Scroll history"),
        Line::from("  PgUp/PgDn     - Scroll history"),
        Line::from("  Home/End      - Jump to start/end"),
        Line::from("  Left/Right    - Scroll tables"),
        Line::from("  Tab           - Select next code block"),
        Line::from("  Ctrl+Y        - Copy selected code block"),
        Line::from("  Ctrl+S        - Copy share link"),
        Line::from("  Ctrl+L        - Copy answer links"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Ctrl+H or Esc to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let help_paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .border_style(Style::default().fg(app.theme.border)),
        )
        .wrap(Wrap { trim: false });

    let popup_area = centered(area, 56, 25);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(help_paragraph, popup_area);
}

pub fn render_examples_popup(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Not sure where to start? You can try:",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for (index, example) in app.examples.iter().enumerate() {
        if index == app.selected_example {
            lines.push(Line::from(Span::styled(
                format!("▶ {example}"),
                Style::default()
                    .fg(app.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )));
        } else {
            lines.push(Line::from(format!("  {example}")));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Up/Down to select, Enter to ask, Esc to close",
        Style::default().fg(Color::DarkGray),
    )));

    let popup = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Examples ")
                .border_style(Style::default().fg(app.theme.border)),
        )
        .wrap(Wrap { trim: false });

    #[allow(clippy::cast_possible_truncation)]
    let height = (app.examples.len() as u16).saturating_add(6);
    let popup_area = centered(area, 70, height);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(popup, popup_area);
}

pub fn render_bottom_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if app.exit_pending {
        (
            "Press Ctrl+C again to exit, Esc to cancel",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else {
        (
            "Enter: Ask | Ctrl+R: Regenerate | Ctrl+E: Examples | Ctrl+H: Help | Ctrl+Q: Quit",
            Style::default().fg(Color::DarkGray),
        )
    };

    let bar = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(style);

    frame.render_widget(bar, area);
}

fn spinner_frame(app: &App) -> &'static str {
    let millis = app
        .fetch_started
        .map_or(0, |started| started.elapsed().as_millis());
    #[allow(clippy::cast_possible_truncation)]
    let index = (millis / 100) as usize % SPINNER.len();
    SPINNER[index]
}

fn elapsed_secs(app: &App) -> u64 {
    app.fetch_started
        .map_or(0, |started| started.elapsed().as_secs())
}

pub fn status_text(app: &App) -> String {
    if let Some(notice) = &app.notice {
        return notice.clone();
    }

    let state = app.store.state();
    if state.fetch_status.is_in_flight() {
        return format!("{} Asking... {}s", spinner_frame(app), elapsed_secs(app));
    }

    let mut parts = Vec::new();
    if let Some(current) = state.current() {
        parts.push(format!(
            "{} answer(s), last {}",
            state.results.len(),
            time_format_ago(Some(current.date))
        ));
    }
    if app.regenerate_eligible {
        parts.push("Ctrl+R to regenerate".to_string());
    }
    parts.join(" | ")
}

pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let color = if app.notice.is_some() {
        app.theme.accent
    } else if app.store.state().show_error_tip {
        Color::Red
    } else {
        Color::Yellow
    };

    let status = Paragraph::new(status_text(app))
        .alignment(Alignment::Right)
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD));

    frame.render_widget(status, area);
}

fn headline_lines(app: &App) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    match app.store.state().headline() {
        Headline::Waiting => vec![
            Line::from(vec![
                Span::styled(
                    format!("{} ", spinner_frame(app)),
                    Style::default().fg(app.theme.accent),
                ),
                Span::styled(
                    "💡 Please be patient and wait ...",
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(" ({}s)", elapsed_secs(app)), dim),
            ]),
            Line::from(Span::styled(
                "We are organizing the answers for you, which may take some time.",
                dim,
            )),
        ],
        Headline::Failed => vec![Line::from(Span::styled(
            "I'm sorry, the generation failed. Please generate again.",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))],
        Headline::Success => vec![Line::from(Span::styled(
            "Here are the results we found for you.",
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        ))],
        Headline::Introduction => {
            let mut lines = vec![
                Line::from(INTRODUCTION),
                Line::from(""),
                Line::from(Span::styled(
                    "Not sure where to start? You can try:",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
            ];
            lines.extend(app.examples.iter().map(|example| {
                Line::from(Span::styled(
                    format!("  • {example}"),
                    Style::default().fg(app.theme.border),
                ))
            }));
            lines.push(Line::from(Span::styled("Press Ctrl+E to pick one.", dim)));
            lines
        }
        Headline::Blank => Vec::new(),
    }
}

/// Drops `offset` columns and keeps at most `width` columns.
pub fn clip_line(line: &Line<'static>, offset: usize, width: usize) -> Line<'static> {
    let mut skipped = 0;
    let mut used = 0;
    let mut spans = Vec::new();

    for span in &line.spans {
        let mut text = String::new();
        for ch in span.content.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if skipped < offset {
                skipped += ch_width;
                continue;
            }
            if used + ch_width > width {
                break;
            }
            used += ch_width;
            text.push(ch);
        }
        if !text.is_empty() {
            spans.push(Span::styled(text, span.style));
        }
    }

    Line::from(spans)
}

/// Headline card followed by every answer, newest first.
pub fn history_lines(app: &mut App, now: DateTime<Local>, width: usize) -> Vec<Line<'static>> {
    let mut lines = headline_lines(app);
    let selected_code = app.selected_code_ref();

    let revision = app.store.revision();
    let records = &app.store.state().results;
    app.markdown.sync(revision, records);

    let dim = Style::default().fg(Color::DarkGray);
    for (index, (entry, record)) in history_entries(records, now)
        .into_iter()
        .zip(records)
        .enumerate()
    {
        lines.push(Line::from(""));
        match entry.header {
            EntryHeader::Current { share } => {
                let mut spans = vec![Span::styled(
                    "Answer",
                    Style::default()
                        .fg(app.theme.accent)
                        .add_modifier(Modifier::BOLD),
                )];
                if share {
                    spans.push(Span::styled(" · Ctrl+S share", dim));
                }
                lines.push(Line::from(spans));
            }
            EntryHeader::Historical { label } => {
                lines.push(Line::from(Span::styled(format!("⏱ {label}"), dim)));
            }
        }
        if let Some(question) = entry.question {
            lines.push(Line::from(Span::styled(
                format!("Q: {question}"),
                Style::default()
                    .fg(app.theme.border)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::from(""));

        let tree = app.markdown.tree(record);
        for display in &tree.lines {
            match display.kind {
                LineKind::Text => lines.push(display.line.clone()),
                LineKind::Table => lines.push(clip_line(&display.line, app.table_offset, width)),
                LineKind::Code(block) => {
                    let selected = selected_code == Some((index, block));
                    let marker = if selected {
                        Span::styled("▌", Style::default().fg(app.theme.accent))
                    } else {
                        Span::raw(" ")
                    };
                    let mut spans = vec![marker];
                    spans.extend(display.line.spans.iter().cloned());
                    lines.push(Line::from(spans));
                }
            }
        }
    }

    lines
}

pub fn render_history(frame: &mut Frame, app: &mut App, area: Rect) {
    let available_width = area.width as usize;
    let lines = history_lines(app, Local::now(), available_width);
    let history = Paragraph::new(lines).wrap(Wrap { trim: false });

    // Rows after word wrapping, so scrolling stops at the last line
    let total_visual_lines = history.line_count(area.width);

    let visible_height = area.height as usize;
    let max_scroll = total_visual_lines.saturating_sub(visible_height);
    let actual_scroll = app.scroll_offset.min(max_scroll);

    if app.scroll_offset != actual_scroll {
        app.scroll_offset = actual_scroll;
    }

    let history = history.scroll((u16::try_from(actual_scroll).unwrap_or(u16::MAX), 0));

    frame.render_widget(history, area);
}

pub fn input_counter(app: &App) -> Line<'static> {
    let len = app.input_len();
    let style = if len >= MAX_QUESTION_LEN {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Line::from(Span::styled(format!(" {len} / {MAX_QUESTION_LEN} "), style)).right_aligned()
}

pub fn render_input_field(frame: &mut Frame, app: &App, area: Rect) {
    let in_flight = app.store.state().fetch_status.is_in_flight();
    let input_text = if app.input_buffer.is_empty() {
        "Ask a question about Databend..."
    } else {
        &app.input_buffer
    };

    let input_style = if app.input_buffer.is_empty() {
        Style::default().fg(Color::Gray)
    } else if in_flight {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
            .fg(app.theme.border)
            .add_modifier(Modifier::BOLD)
    };

    let input = Paragraph::new(input_text)
        .style(input_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" AskBend ")
                .title_top(input_counter(app))
                .border_style(Style::default().fg(app.theme.border)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(input, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryRecord;
    use crate::store::{FetchStatus, Intent};
    use chrono::TimeZone;

    fn app() -> App {
        App::new(
            vec!["How to load CSV?".to_string()],
            "https://ask.databend.rs".to_string(),
        )
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).single().unwrap()
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn all_text(lines: &[Line<'_>]) -> Vec<String> {
        lines.iter().map(text).collect()
    }

    fn answer(app: &mut App, value: &str, is_regenerate: bool) {
        app.store.dispatch(Intent::UpdateResult(QueryRecord::new(
            value.to_string(),
            Some("what is X".to_string()),
            is_regenerate,
        )));
    }

    #[test]
    fn test_theme_from_config() {
        let config = ThemeConfig {
            border_color: "magenta".to_string(),
            accent_color: "no-such-color".to_string(),
        };
        let theme = Theme::from_config(&config);
        assert_eq!(theme.border, Color::Magenta);
        assert_eq!(theme.accent, Color::Green);
    }

    #[test]
    fn test_introduction_lists_examples() {
        let mut app = app();
        let lines = all_text(&history_lines(&mut app, now(), 80));
        assert!(lines[0].starts_with("🙋 I'm AskBend"));
        assert!(lines.iter().any(|l| l == "  • How to load CSV?"));
    }

    #[test]
    fn test_waiting_card() {
        let mut app = app();
        app.store.dispatch(Intent::SetFetchStatus(FetchStatus::InFlight));
        let lines = all_text(&history_lines(&mut app, now(), 80));
        assert!(lines[0].contains("Please be patient and wait ..."));
        assert_eq!(
            lines[1],
            "We are organizing the answers for you, which may take some time."
        );
    }

    #[test]
    fn test_failed_card_with_history() {
        let mut app = app();
        answer(&mut app, "first", false);
        app.store.dispatch(Intent::ShowErrorTip(true));
        let lines = all_text(&history_lines(&mut app, now(), 80));
        assert_eq!(
            lines[0],
            "I'm sorry, the generation failed. Please generate again."
        );
        assert!(lines.iter().any(|l| l == "first"));
    }

    #[test]
    fn test_answers_newest_first_with_headers() {
        let mut app = app();
        answer(&mut app, "older", false);
        answer(&mut app, "newer", true);
        app.store.dispatch(Intent::SetFetchStatus(FetchStatus::Idle));

        let lines = all_text(&history_lines(&mut app, Local::now(), 80));
        assert_eq!(lines[0], "Here are the results we found for you.");

        let answer_header = lines.iter().position(|l| l == "Answer · Ctrl+S share");
        let newer = lines.iter().position(|l| l == "newer");
        let historical = lines
            .iter()
            .position(|l| l.starts_with("⏱ Historical result"));
        let older = lines.iter().position(|l| l == "older");
        assert!(answer_header < newer);
        assert!(newer < historical);
        assert!(historical < older);
        assert!(lines.iter().any(|l| l == "Q: what is X"));
    }

    #[test]
    fn test_selected_code_block_marker() {
        let mut app = app();
        answer(&mut app, "```sql\nSELECT 1;\n```", false);
        let lines = history_lines(&mut app, now(), 80);
        let marked = lines
            .iter()
            .filter(|l| text(l).starts_with('▌'))
            .count();
        assert!(marked > 0);

        app.selected_code_block = 3;
        let lines = history_lines(&mut app, now(), 80);
        assert!(!lines.iter().any(|l| text(l).starts_with('▌')));
    }

    #[test]
    fn test_marker_follows_selection_into_older_answer() {
        let mut app = app();
        answer(&mut app, "```sql\nSELECT old;\n```", false);
        answer(&mut app, "```sql\nSELECT new;\n```", true);
        app.selected_code_block = 1;

        let lines = all_text(&history_lines(&mut app, now(), 80));
        let marked: Vec<&String> = lines.iter().filter(|l| l.starts_with('▌')).collect();
        assert!(marked.iter().any(|l| l.contains("SELECT old;")));
        assert!(!marked.iter().any(|l| l.contains("SELECT new;")));
    }

    #[test]
    fn test_clip_line() {
        let line = Line::from(vec![Span::raw("| abc "), Span::raw("| défg |")]);
        assert_eq!(text(&clip_line(&line, 0, 4)), "| ab");
        assert_eq!(text(&clip_line(&line, 2, 6)), "abc | ");
        assert_eq!(text(&clip_line(&line, 100, 10)), "");
    }

    #[test]
    fn test_clip_line_wide_chars() {
        let line = Line::from("数据库");
        assert_eq!(text(&clip_line(&line, 0, 3)), "数");
        assert_eq!(text(&clip_line(&line, 2, 4)), "据库");
    }

    #[test]
    fn test_status_text() {
        let mut app = app();
        assert_eq!(status_text(&app), "");

        answer(&mut app, "a", false);
        app.regenerate_eligible = true;
        let status = status_text(&app);
        assert!(status.starts_with("1 answer(s), last "));
        assert!(status.ends_with(" | Ctrl+R to regenerate"));

        app.notice = Some("Copied share link".to_string());
        assert_eq!(status_text(&app), "Copied share link");
    }

    #[test]
    fn test_input_counter() {
        let mut app = app();
        app.set_input("hello");
        assert_eq!(text(&input_counter(&app)), " 5 / 500 ");
    }
}

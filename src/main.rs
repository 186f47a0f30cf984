mod api;
mod app;
mod config;
mod events;
mod examples;
mod logging;
mod models;
mod store;
mod submission;
mod time_format;
mod ui;

use anyhow::{Context, Result};
use arboard::Clipboard;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, prelude::*};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use api::{AnswerSource, QaClient};
use app::{App, Command};
use events::AppEvent;
use ui::widgets::Theme;

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = config::get_config_dir()?;
    if let Err(err) = logging::init_logging(&config_dir) {
        eprintln!("Logging disabled: {err:#}");
    }

    let app_config = config::load_config()?;
    let base_url = config::resolve_api_base_url(
        &app_config,
        std::env::var(config::API_BASE_URL_ENV).ok(),
    );
    info!(%base_url, "starting askbend-tui");

    let client = QaClient::new(base_url, app_config.request_timeout)?;
    let examples = examples::load_examples()?;

    let mut app = App::new(examples, app_config.share_url.clone());
    app.theme = Theme::from_config(&app_config.theme);
    if let Some(question) = app::initial_question(std::env::args()) {
        app.stage_initial_question(question);
    }

    install_panic_hook();
    let guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();

    let res = run_app(&mut terminal, &mut app, &client, &tx, &mut rx);

    drop(terminal);
    drop(guard);

    if let Err(err) = res {
        error!(error = %err, "event loop failed");
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

/// Raw mode and the alternate screen for as long as it lives.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        // Restored by Drop from here on, even if the next step fails
        let guard = Self;
        execute!(io::stdout(), EnterAlternateScreen)
            .context("Failed to enter alternate screen")?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn leave_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(out, LeaveAlternateScreen, cursor::Show)
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = leave_screen(&mut io::stdout());
}

/// Puts the terminal back before the panic message is printed.
fn install_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();
        prev_hook(info);
    }));
}

fn handle_examples_keys(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
    match key {
        KeyCode::Char('e') if modifiers.contains(KeyModifiers::CONTROL) => app.toggle_examples(),
        KeyCode::Char('q') if modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Up => app.select_previous_example(),
        KeyCode::Down | KeyCode::Tab => app.select_next_example(),
        KeyCode::Enter => app.choose_example(),
        _ => {}
    }
}

fn handle_keyboard_input(app: &mut App, key: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    app.notice = None;

    match key {
        KeyCode::Char('c') if ctrl => {
            if app.exit_pending {
                app.quit();
            } else {
                app.exit_pending = true;
            }
            return None;
        }
        KeyCode::Esc => {
            if app.show_help {
                app.show_help = false;
            } else if app.show_examples {
                app.show_examples = false;
            } else if app.exit_pending {
                app.exit_pending = false;
            }
            return None;
        }
        _ if app.exit_pending => {
            // Any other key cancels pending exit
            app.exit_pending = false;
        }
        _ => {}
    }

    if app.show_help {
        if key == KeyCode::Char('h') && ctrl {
            app.toggle_help();
        }
        return None;
    }

    if app.show_examples {
        handle_examples_keys(app, key, modifiers);
        return None;
    }

    match key {
        KeyCode::Char('q') if ctrl => app.quit(),
        KeyCode::Char('h') if ctrl => app.toggle_help(),
        KeyCode::Char('e') if ctrl => app.toggle_examples(),
        KeyCode::Char('r') if ctrl => return submission::submit_input(app, true),
        KeyCode::Char('y') if ctrl => return app.copy_selected_code(),
        KeyCode::Char('s') if ctrl => return app.share_current(),
        KeyCode::Char('l') if ctrl => return app.copy_links(),
        KeyCode::Char(_) if ctrl => {}

        KeyCode::Tab => app.cycle_code_block(),

        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.scroll_to_bottom(),
        KeyCode::Left => app.scroll_left(4),
        KeyCode::Right => app.scroll_right(4),

        KeyCode::Backspace => app.pop_char(),
        KeyCode::Enter => return submission::submit_input(app, false),
        KeyCode::Char(c) => app.push_char(c),

        _ => {}
    }
    None
}

fn copy_to_clipboard(clipboard: &mut Option<Clipboard>, text: &str) -> Result<(), arboard::Error> {
    if clipboard.is_none() {
        *clipboard = Some(Clipboard::new()?);
    }
    if let Some(clipboard) = clipboard.as_mut() {
        clipboard.set_text(text)?;
    }
    Ok(())
}

fn execute_command(
    app: &mut App,
    command: Command,
    source: &dyn AnswerSource,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
    clipboard: &mut Option<Clipboard>,
) {
    match command {
        Command::Submit(ticket) => {
            submission::spawn_query(source, ticket, event_tx);
        }
        Command::Copy { text, what } => {
            app.notice = Some(match copy_to_clipboard(clipboard, &text) {
                Ok(()) => format!("Copied {what}"),
                Err(err) => {
                    warn!(error = %err, "clipboard write failed");
                    "Clipboard unavailable".to_string()
                }
            });
        }
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    source: &dyn AnswerSource,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
    event_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let mut clipboard = None;

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        while let Ok(app_event) = event_rx.try_recv() {
            submission::finish_query(app, app_event);
        }

        // Example picks and the startup question
        if let Some(ticket) = submission::submit_pending(app) {
            submission::spawn_query(source, ticket, event_tx);
        }

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(command) = handle_keyboard_input(app, key.code, key.modifiers) {
                        execute_command(app, command, source, event_tx, &mut clipboard);
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    info!("shutting down");
    Ok(())
}

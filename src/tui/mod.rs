//! Terminal User Interface module for Nota.
//!
//! Provides a three-panel TUI with search input, note list, and editor
//! using ratatui for rendering and crossterm for terminal management. The
//! event loop doubles as the autosave scheduler: every tick it drives the
//! note manager so debounced saves flush on schedule while the UI stays
//! responsive to further keystrokes.

use std::io;
use std::panic;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self as crossterm_event, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

mod app;
pub mod event;
mod ui;

pub use app::{App, Command, Confirm, ConfirmAction, Focus, HistoryView};

use crate::config::AppConfig;
use crate::manager::{NoteManager, ServiceSaveClient};
use crate::models::{NoteId, UserId};
use crate::service::NoteService;

/// Initializes the terminal for TUI rendering.
///
/// Enables raw mode and enters the alternate screen.
/// Returns a configured Terminal instance.
fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
///
/// Disables raw mode and leaves the alternate screen. This should always
/// be called before exiting the TUI, even in error cases, to prevent
/// terminal corruption.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

/// Minimal terminal restoration for the panic handler.
///
/// Does not require a Terminal reference, making it safe to call from a
/// panic hook. Ignores errors since we're likely already in a bad state.
fn restore_terminal_panic() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Installs a panic hook that restores the terminal before panicking.
fn init_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        restore_terminal_panic();
        original_hook(panic_info);
    }));
}

/// Entry point for the TUI.
///
/// Loads the acting user's notes, then runs the event loop until quit.
/// Pending edits are flushed before exit.
pub fn run(service: &NoteService, user: UserId, config: &AppConfig) -> Result<()> {
    init_panic_hook();

    let mut manager = NoteManager::with_debounce(config.content_debounce, config.meta_debounce);
    let notes = service
        .fetch_notes(user)
        .context("Failed to load notes from database")?;
    manager.set_notes(notes);

    let mut app = App::with_manager(manager);
    run_event_loop(&mut app, service, user)
}

/// Runs the main event loop, guaranteeing terminal restoration.
fn run_event_loop(app: &mut App, service: &NoteService, user: UserId) -> Result<()> {
    let mut terminal = init_terminal()?;

    let result = run_event_loop_internal(app, service, user, &mut terminal);

    // Always restore terminal state
    if let Err(e) = restore_terminal(&mut terminal) {
        eprintln!("Error restoring terminal: {e}");
    }

    result
}

/// Internal event loop implementation.
///
/// Renders, drives the autosave pipeline, then polls for input with a
/// 100 ms timeout. The timeout is what turns the loop into a debounce
/// scheduler: even without keystrokes, due saves flush within a tick.
fn run_event_loop_internal(
    app: &mut App,
    service: &NoteService,
    user: UserId,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| {
            ui::draw(frame, app);
        })?;

        // Flush any debounced saves that came due
        let mut client = ServiceSaveClient::new(service, user);
        app.manager_mut().drive(Instant::now(), &mut client);

        if crossterm_event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = crossterm_event::read()?
        {
            app.clear_notice();
            if let Some(command) = event::handle_key_event(app, key) {
                let quit = execute_command(app, service, user, command);
                if quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Executes a store-touching command. Returns `true` on quit.
///
/// Failures surface as one-shot status notices and leave prior state
/// intact; they never abort the loop.
fn execute_command(app: &mut App, service: &NoteService, user: UserId, command: Command) -> bool {
    match command {
        Command::Quit => {
            // Flush pending edits so nothing is lost on exit
            flush_all(app, service, user);
            return true;
        }
        Command::CreateNote => match service.create_note(user, Some("Untitled"), "", None) {
            Ok(note) => {
                let id = note.id();
                reload_notes(app, service, user);
                app.select(id);
                app.focus_note_list();
                app.focus_editor();
                app.set_notice("New note added.");
            }
            Err(e) => app.set_notice(format!("Create failed: {e}")),
        },
        Command::DeleteNote(note_id) => match service.delete_note(user, note_id) {
            Ok(()) => {
                app.manager_mut().remove_note(note_id);
                app.clear_selection();
                app.focus_note_list();
                app.set_notice("Note removed.");
            }
            Err(e) => app.set_notice(format!("Delete failed: {e}")),
        },
        Command::TogglePublic { note_id, public } => {
            match service.set_public(user, note_id, public) {
                Ok(note) => {
                    let notice = match note.public_token() {
                        Some(token) => format!("Public link enabled: {token}"),
                        None => "Public link disabled.".to_string(),
                    };
                    app.manager_mut().replace_note(note);
                    app.set_notice(notice);
                }
                Err(e) => app.set_notice(format!("Sharing failed: {e}")),
            }
        }
        Command::ShowHistory(note_id) => {
            // Push pending edits first so history reflects the latest state
            flush_note(app, service, user, note_id);
            match service.history(user, note_id) {
                Ok(versions) => app.open_history(note_id, versions),
                Err(e) => app.set_notice(format!("History failed: {e}")),
            }
        }
        Command::RestoreVersion {
            note_id,
            version_id,
        } => {
            flush_note(app, service, user, note_id);
            match service.restore_version(user, note_id, version_id) {
                Ok(()) => {
                    app.close_history();
                    reload_notes(app, service, user);
                    app.set_notice("Version restored.");
                }
                Err(e) => app.set_notice(format!("Restore failed: {e}")),
            }
        }
    }

    false
}

/// Replaces the manager's note list with a fresh fetch.
///
/// A failed fetch leaves the current list untouched and surfaces a notice.
fn reload_notes(app: &mut App, service: &NoteService, user: UserId) {
    match service.fetch_notes(user) {
        Ok(notes) => app.manager_mut().set_notes(notes),
        Err(e) => app.set_notice(format!("Reload failed: {e}")),
    }
}

/// Synchronously flushes everything pending for one note.
fn flush_note(app: &mut App, service: &NoteService, user: UserId, note_id: NoteId) {
    let now = Instant::now();
    app.manager_mut().flush_now(note_id, now);
    let mut client = ServiceSaveClient::new(service, user);
    app.manager_mut().drive(now, &mut client);
}

/// Synchronously flushes everything pending for all notes.
fn flush_all(app: &mut App, service: &NoteService, user: UserId) {
    let now = Instant::now();
    app.manager_mut().flush_all_now(now);
    let mut client = ServiceSaveClient::new(service, user);
    app.manager_mut().drive(now, &mut client);
}

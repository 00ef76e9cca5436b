//! Keyboard event handling for the TUI.
//!
//! Maps crossterm keyboard events to application state changes. Key
//! behavior depends on the focused panel and any open modal. Actions that
//! touch the store are returned as [`Command`]s for the event loop to
//! execute; everything else mutates [`App`] directly.

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Command, ConfirmAction, Focus};

/// Handles a keyboard event and updates the app state accordingly.
///
/// Returns a [`Command`] when the event loop must act (quit or a
/// store-touching operation), `None` otherwise.
///
/// # Event Handling
///
/// - `Ctrl+Q`: quit from anywhere
/// - Modals swallow input: confirm takes `y`/`n`/`Esc`; history takes
///   `j`/`k`/`r`/`Esc`
/// - `Tab` / `Shift+Tab`: cycle panel focus
/// - When `SearchInput` focused: character input edits the filter
/// - When `NoteList` focused: `j`/`k` navigate, `Enter` edits, plus the
///   note action keys (`n`, `d`, `p`, `P`, `h`, `s`, `o`, `q`)
/// - When `Editor` focused: typing edits content; `Ctrl+S` saves now,
///   `Ctrl+P` toggles the markdown preview, `Esc` leaves the editor
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Command> {
    let now = Instant::now();

    // Global quit works regardless of focus or modals
    if key.code == KeyCode::Char('q') && key.modifiers == KeyModifiers::CONTROL {
        return Some(Command::Quit);
    }

    // An open confirm dialog swallows all other input
    if app.confirm().is_some() {
        return handle_confirm(app, key);
    }

    // The history modal is next in precedence
    if app.history().is_some() {
        return handle_history(app, key);
    }

    // Global focus cycling with Tab / Shift+Tab (BackTab)
    if key.code == KeyCode::Tab {
        app.next_focus();
        return None;
    }
    if key.code == KeyCode::BackTab {
        app.prev_focus();
        return None;
    }

    match app.focus() {
        Focus::SearchInput => handle_search_input(app, key),
        Focus::NoteList => handle_note_list(app, key, now),
        Focus::Editor => handle_editor(app, key, now),
    }
}

/// Confirm dialog: `y` accepts, `n`/`Esc` cancels.
fn handle_confirm(app: &mut App, key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            let action = app.accept_confirm()?;
            match action {
                ConfirmAction::Delete(note_id) => Some(Command::DeleteNote(note_id)),
                ConfirmAction::Restore(note_id, version_id) => Some(Command::RestoreVersion {
                    note_id,
                    version_id,
                }),
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.cancel_confirm();
            None
        }
        _ => None,
    }
}

/// History modal: `j`/`k` navigate, `r` asks to restore, `Esc`/`q` closes.
fn handle_history(app: &mut App, key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            app.history_next();
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.history_previous();
            None
        }
        KeyCode::Char('r') => {
            let view = app.history()?;
            let note_id = view.note_id;
            let version_id = view.versions.get(view.selected)?.id();
            app.request_restore(note_id, version_id);
            None
        }
        KeyCode::Esc | KeyCode::Char('q') => {
            app.close_history();
            None
        }
        _ => None,
    }
}

/// Search input focus: characters and backspace edit the filter.
fn handle_search_input(app: &mut App, key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            app.push_search_char(c);
        }
        KeyCode::Backspace => {
            app.pop_search_char();
        }
        KeyCode::Esc => {
            app.clear_selection();
        }
        KeyCode::Enter => {
            app.focus_note_list();
        }
        _ => {
            // Ignore other keys when in search input
        }
    }
    None
}

/// Note list focus: navigation plus per-note actions.
fn handle_note_list(app: &mut App, key: KeyEvent, now: Instant) -> Option<Command> {
    match key.code {
        KeyCode::Char('q') if key.modifiers.is_empty() => return Some(Command::Quit),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Enter => app.focus_editor(),
        KeyCode::Char('n') => return Some(Command::CreateNote),
        KeyCode::Char('d') => app.request_delete(),
        KeyCode::Char('p') if key.modifiers.is_empty() => app.toggle_pin(now),
        KeyCode::Char('P') => {
            let note = app.selected_note()?;
            return Some(Command::TogglePublic {
                note_id: note.id(),
                public: !note.is_public(),
            });
        }
        KeyCode::Char('h') => {
            let note = app.selected_note()?;
            return Some(Command::ShowHistory(note.id()));
        }
        KeyCode::Char('s') => app.save_now(now),
        KeyCode::Char('o') => app.cycle_sort(),
        KeyCode::Esc => {
            app.reset_focus();
            app.clear_selection();
        }
        _ => {
            // Ignore other keys when in note list
        }
    }
    None
}

/// Editor focus: typing edits the selected note's content.
fn handle_editor(app: &mut App, key: KeyEvent, now: Instant) -> Option<Command> {
    match key.code {
        KeyCode::Char('s') if key.modifiers == KeyModifiers::CONTROL => {
            app.save_now(now);
        }
        KeyCode::Char('p') if key.modifiers == KeyModifiers::CONTROL => {
            app.toggle_preview();
        }
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            app.edit_insert_char(c, now);
        }
        KeyCode::Enter => {
            app.edit_newline(now);
        }
        KeyCode::Backspace => {
            app.edit_backspace(now);
        }
        KeyCode::Esc => {
            app.focus_note_list();
        }
        _ => {
            // Ignore other keys when in editor
        }
    }
    None
}

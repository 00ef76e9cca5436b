use std::time::Instant;

use crate::manager::NoteManager;
use crate::models::{Note, NoteId, VersionId, VersionSummary};
use crate::service::NoteMetaPatch;
use crate::SortMode;

/// Application state for the TUI.
///
/// Wraps the client note manager and adds view concerns: panel focus,
/// selection, the markdown preview toggle, and the confirm/history modals.
/// All store access happens outside this type: key handling returns a
/// [`Command`] for the event loop to execute against the service.
pub struct App {
    manager: NoteManager,
    focus: Focus,
    /// Selected note, tracked by ID so it survives re-sorting.
    selected: Option<NoteId>,
    preview: bool,
    confirm: Option<Confirm>,
    history: Option<HistoryView>,
    notice: Option<String>,
}

/// Panel focus state for keyboard navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Search bar is focused; typing updates the filter.
    SearchInput,
    /// Note list is focused; j/k navigation plus note actions.
    NoteList,
    /// Editor is focused; typing edits the selected note's content.
    Editor,
}

/// A store-touching action requested by key handling.
///
/// The event loop owns the service handle and executes these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    CreateNote,
    DeleteNote(NoteId),
    TogglePublic { note_id: NoteId, public: bool },
    ShowHistory(NoteId),
    RestoreVersion { note_id: NoteId, version_id: VersionId },
}

/// A destructive action awaiting explicit confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Delete(NoteId),
    Restore(NoteId, VersionId),
}

/// The confirm modal: a prompt plus the action it guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    pub prompt: String,
    pub action: ConfirmAction,
}

/// The version-history modal for one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryView {
    pub note_id: NoteId,
    pub versions: Vec<VersionSummary>,
    pub selected: usize,
}

impl App {
    /// Creates an App with default manager settings.
    pub fn new() -> Self {
        Self::with_manager(NoteManager::new())
    }

    /// Creates an App around a preconfigured manager (custom debounce
    /// windows, preloaded notes).
    pub fn with_manager(manager: NoteManager) -> Self {
        Self {
            manager,
            focus: Focus::SearchInput,
            selected: None,
            preview: false,
            confirm: None,
            history: None,
            notice: None,
        }
    }

    /// Returns the underlying note manager.
    pub fn manager(&self) -> &NoteManager {
        &self.manager
    }

    /// Returns the underlying note manager mutably (used by the event loop
    /// to drive flushes and reload notes).
    pub fn manager_mut(&mut self) -> &mut NoteManager {
        &mut self.manager
    }

    /// Returns the current focus state.
    pub fn focus(&self) -> Focus {
        self.focus
    }

    /// Returns the notes visible under the current search/sort projection.
    pub fn visible_notes(&self) -> Vec<&Note> {
        self.manager.projection()
    }

    /// Returns the selected note's position in the projection, if visible.
    pub fn selected_index(&self) -> Option<usize> {
        let selected = self.selected?;
        self.visible_notes().iter().position(|n| n.id() == selected)
    }

    /// Returns the currently selected note, if any.
    pub fn selected_note(&self) -> Option<&Note> {
        let selected = self.selected?;
        self.manager.note(selected)
    }

    /// Selects a specific note by ID.
    pub fn select(&mut self, id: NoteId) {
        if self.manager.note(id).is_some() {
            self.selected = Some(id);
        }
    }

    /// Clears the selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Whether the markdown preview pane is showing.
    pub fn preview(&self) -> bool {
        self.preview
    }

    /// Toggles the markdown preview pane.
    pub fn toggle_preview(&mut self) {
        self.preview = !self.preview;
    }

    // --- Focus cycling ---

    /// Cycles focus: `SearchInput -> NoteList -> Editor -> SearchInput`.
    ///
    /// Entering the note list with no selection auto-selects the first
    /// visible note; the editor requires a selection and is skipped
    /// without one.
    pub fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::SearchInput => Focus::NoteList,
            Focus::NoteList => {
                if self.selected.is_some() {
                    Focus::Editor
                } else {
                    Focus::SearchInput
                }
            }
            Focus::Editor => Focus::SearchInput,
        };
        self.auto_select_on_note_list_focus();
    }

    /// Cycles focus in the reverse direction.
    pub fn prev_focus(&mut self) {
        self.focus = match self.focus {
            Focus::SearchInput => {
                if self.selected.is_some() {
                    Focus::Editor
                } else {
                    Focus::NoteList
                }
            }
            Focus::NoteList => Focus::SearchInput,
            Focus::Editor => Focus::NoteList,
        };
        self.auto_select_on_note_list_focus();
    }

    /// Returns focus to the search input.
    pub fn reset_focus(&mut self) {
        self.focus = Focus::SearchInput;
    }

    /// Moves focus to the note list.
    pub fn focus_note_list(&mut self) {
        self.focus = Focus::NoteList;
        self.auto_select_on_note_list_focus();
    }

    /// Moves focus to the editor if a note is selected.
    pub fn focus_editor(&mut self) {
        if self.selected.is_some() {
            self.focus = Focus::Editor;
        }
    }

    fn auto_select_on_note_list_focus(&mut self) {
        if self.focus == Focus::NoteList && self.selected_index().is_none() {
            self.selected = self.visible_notes().first().map(|n| n.id());
        }
    }

    // --- Search ---

    /// Appends a character to the search filter.
    ///
    /// Changing the filter resets the selection, since the projection may
    /// no longer contain the selected note.
    pub fn push_search_char(&mut self, c: char) {
        let mut term = self.manager.search_term().to_string();
        term.push(c);
        self.manager.set_search(term);
        self.selected = None;
    }

    /// Removes the last character from the search filter.
    pub fn pop_search_char(&mut self) {
        let mut term = self.manager.search_term().to_string();
        term.pop();
        self.manager.set_search(term);
        self.selected = None;
    }

    /// Cycles to the next sort mode.
    pub fn cycle_sort(&mut self) {
        let next = match self.manager.sort_mode() {
            SortMode::UpdatedDesc => SortMode::CreatedDesc,
            SortMode::CreatedDesc => SortMode::TitleAsc,
            SortMode::TitleAsc => SortMode::UpdatedDesc,
        };
        self.manager.set_sort(next);
    }

    // --- Selection movement ---

    /// Moves selection down in the projection, wrapping at the end.
    pub fn select_next(&mut self) {
        let ids: Vec<NoteId> = self.visible_notes().iter().map(|n| n.id()).collect();
        if ids.is_empty() {
            self.selected = None;
            return;
        }
        let next = match self.selected_index() {
            None => 0,
            Some(i) => (i + 1) % ids.len(),
        };
        self.selected = Some(ids[next]);
    }

    /// Moves selection up in the projection, wrapping at the start.
    pub fn select_previous(&mut self) {
        let ids: Vec<NoteId> = self.visible_notes().iter().map(|n| n.id()).collect();
        if ids.is_empty() {
            self.selected = None;
            return;
        }
        let prev = match self.selected_index() {
            None => 0,
            Some(0) => ids.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(ids[prev]);
    }

    // --- Editing ---

    /// Appends a character to the selected note's content and queues the
    /// debounced save.
    pub fn edit_insert_char(&mut self, c: char, now: Instant) {
        let Some(note) = self.selected_note() else {
            return;
        };
        let id = note.id();
        let mut content = note.content().to_string();
        content.push(c);
        self.manager.queue_content_edit(id, content, now);
    }

    /// Appends a newline to the selected note's content.
    pub fn edit_newline(&mut self, now: Instant) {
        self.edit_insert_char('\n', now);
    }

    /// Removes the last character from the selected note's content.
    pub fn edit_backspace(&mut self, now: Instant) {
        let Some(note) = self.selected_note() else {
            return;
        };
        let id = note.id();
        let mut content = note.content().to_string();
        content.pop();
        self.manager.queue_content_edit(id, content, now);
    }

    /// Toggles the selected note's pin as a queued metadata edit.
    pub fn toggle_pin(&mut self, now: Instant) {
        let Some(note) = self.selected_note() else {
            return;
        };
        let (id, pinned) = (note.id(), note.is_pinned());
        self.manager
            .queue_meta_edit(id, NoteMetaPatch::pinned(!pinned), now);
    }

    /// Forces all pending saves due immediately (explicit save).
    pub fn save_now(&mut self, now: Instant) {
        self.manager.flush_all_now(now);
    }

    // --- Confirm modal ---

    /// Opens a delete confirmation for the selected note.
    pub fn request_delete(&mut self) {
        let Some(note) = self.selected_note() else {
            return;
        };
        self.confirm = Some(Confirm {
            prompt: format!(
                "Delete \"{}\" and its history? (y/n)",
                note.title()
            ),
            action: ConfirmAction::Delete(note.id()),
        });
    }

    /// Opens a restore confirmation for a version of the given note.
    pub fn request_restore(&mut self, note_id: NoteId, version_id: VersionId) {
        self.confirm = Some(Confirm {
            prompt: "Replace current content with this version? (y/n)".to_string(),
            action: ConfirmAction::Restore(note_id, version_id),
        });
    }

    /// Returns the active confirmation, if any.
    pub fn confirm(&self) -> Option<&Confirm> {
        self.confirm.as_ref()
    }

    /// Accepts the active confirmation, returning its action.
    pub fn accept_confirm(&mut self) -> Option<ConfirmAction> {
        self.confirm.take().map(|c| c.action)
    }

    /// Dismisses the active confirmation.
    pub fn cancel_confirm(&mut self) {
        self.confirm = None;
    }

    // --- History modal ---

    /// Opens the history modal with versions fetched by the event loop.
    pub fn open_history(&mut self, note_id: NoteId, versions: Vec<VersionSummary>) {
        self.history = Some(HistoryView {
            note_id,
            versions,
            selected: 0,
        });
    }

    /// Returns the open history modal, if any.
    pub fn history(&self) -> Option<&HistoryView> {
        self.history.as_ref()
    }

    /// Closes the history modal.
    pub fn close_history(&mut self) {
        self.history = None;
    }

    /// Moves the history selection down.
    pub fn history_next(&mut self) {
        if let Some(view) = &mut self.history
            && !view.versions.is_empty()
        {
            view.selected = (view.selected + 1) % view.versions.len();
        }
    }

    /// Moves the history selection up.
    pub fn history_previous(&mut self) {
        if let Some(view) = &mut self.history
            && !view.versions.is_empty()
        {
            view.selected = view
                .selected
                .checked_sub(1)
                .unwrap_or(view.versions.len() - 1);
        }
    }

    // --- Notices ---

    /// Sets the one-shot status line message.
    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    /// Returns the current status line message, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Clears the status line message.
    pub fn clear_notice(&mut self) {
        self.notice = None;
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NoteBuilder, UserId};

    fn make_note(id: i64, title: &str, content: &str) -> Note {
        NoteBuilder::new()
            .id(NoteId::new(id))
            .user_id(UserId::new(1))
            .title(title)
            .content(content)
            .build()
    }

    fn app_with_notes(notes: Vec<Note>) -> App {
        let mut manager = NoteManager::new();
        manager.set_notes(notes);
        App::with_manager(manager)
    }

    #[test]
    fn focus_cycles_through_panels_with_a_selection() {
        let mut app = app_with_notes(vec![make_note(1, "a", "")]);
        assert_eq!(app.focus(), Focus::SearchInput);

        app.next_focus();
        assert_eq!(app.focus(), Focus::NoteList);
        // Entering the list auto-selected the first note
        assert_eq!(app.selected_index(), Some(0));

        app.next_focus();
        assert_eq!(app.focus(), Focus::Editor);

        app.next_focus();
        assert_eq!(app.focus(), Focus::SearchInput);
    }

    #[test]
    fn editor_is_skipped_without_a_selection() {
        let mut app = app_with_notes(vec![]);

        app.next_focus();
        assert_eq!(app.focus(), Focus::NoteList);
        assert_eq!(app.selected_index(), None);

        app.next_focus();
        assert_eq!(app.focus(), Focus::SearchInput);
    }

    #[test]
    fn selection_tracks_note_identity_across_reordering() {
        let mut app = app_with_notes(vec![
            make_note(1, "first", ""),
            make_note(2, "second", ""),
        ]);

        app.focus_note_list();
        app.select_next(); // move to the second visible note
        let selected = app.selected_note().unwrap().id();

        // Pinning the other note reorders the projection
        let other = app
            .visible_notes()
            .iter()
            .map(|n| n.id())
            .find(|id| *id != selected)
            .unwrap();
        app.manager_mut()
            .queue_meta_edit(other, NoteMetaPatch::pinned(true), Instant::now());

        assert_eq!(app.selected_note().unwrap().id(), selected);
    }

    #[test]
    fn selection_wraps_in_both_directions() {
        let mut app = app_with_notes(vec![make_note(1, "a", ""), make_note(2, "b", "")]);
        app.focus_note_list();
        assert_eq!(app.selected_index(), Some(0));

        app.select_next();
        assert_eq!(app.selected_index(), Some(1));
        app.select_next();
        assert_eq!(app.selected_index(), Some(0));

        app.select_previous();
        assert_eq!(app.selected_index(), Some(1));
    }

    #[test]
    fn search_edits_reset_selection() {
        let mut app = app_with_notes(vec![make_note(1, "alpha", ""), make_note(2, "beta", "")]);
        app.focus_note_list();
        assert!(app.selected_index().is_some());

        app.reset_focus();
        app.push_search_char('b');
        assert_eq!(app.selected_index(), None);

        let titles: Vec<&str> = app.visible_notes().iter().map(|n| n.title()).collect();
        assert_eq!(titles, vec!["beta"]);

        app.pop_search_char();
        assert_eq!(app.visible_notes().len(), 2);
    }

    #[test]
    fn editing_updates_content_and_queues_a_save() {
        let mut app = app_with_notes(vec![make_note(1, "t", "hi")]);
        app.focus_note_list();
        let t0 = Instant::now();

        app.edit_insert_char('!', t0);
        assert_eq!(app.selected_note().unwrap().content(), "hi!");

        app.edit_backspace(t0);
        app.edit_backspace(t0);
        assert_eq!(app.selected_note().unwrap().content(), "h");

        app.edit_newline(t0);
        assert_eq!(app.selected_note().unwrap().content(), "h\n");

        assert!(app.manager().has_unsaved_changes());
    }

    #[test]
    fn toggle_pin_queues_a_meta_edit() {
        let mut app = app_with_notes(vec![make_note(1, "t", "")]);
        app.focus_note_list();

        app.toggle_pin(Instant::now());
        assert!(app.selected_note().unwrap().is_pinned());
        assert!(app.manager().has_unsaved_changes());
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app_with_notes(vec![make_note(1, "doomed", "")]);
        app.focus_note_list();

        app.request_delete();
        let confirm = app.confirm().expect("confirm should be open");
        assert!(confirm.prompt.contains("doomed"));

        // Cancel leaves everything intact
        app.cancel_confirm();
        assert!(app.confirm().is_none());

        // Accept yields the action
        app.request_delete();
        let action = app.accept_confirm().expect("action expected");
        assert_eq!(action, ConfirmAction::Delete(NoteId::new(1)));
        assert!(app.confirm().is_none());
    }

    #[test]
    fn history_modal_navigation_wraps() {
        use time::OffsetDateTime;

        let mut app = app_with_notes(vec![make_note(1, "t", "")]);
        let now = OffsetDateTime::now_utc();
        app.open_history(
            NoteId::new(1),
            vec![
                VersionSummary::new(VersionId::new(1), now, "a"),
                VersionSummary::new(VersionId::new(2), now, "b"),
            ],
        );

        assert_eq!(app.history().unwrap().selected, 0);
        app.history_next();
        assert_eq!(app.history().unwrap().selected, 1);
        app.history_next();
        assert_eq!(app.history().unwrap().selected, 0);
        app.history_previous();
        assert_eq!(app.history().unwrap().selected, 1);

        app.close_history();
        assert!(app.history().is_none());
    }

    #[test]
    fn cycle_sort_walks_all_modes() {
        let mut app = app_with_notes(vec![]);
        assert_eq!(app.manager().sort_mode(), SortMode::UpdatedDesc);
        app.cycle_sort();
        assert_eq!(app.manager().sort_mode(), SortMode::CreatedDesc);
        app.cycle_sort();
        assert_eq!(app.manager().sort_mode(), SortMode::TitleAsc);
        app.cycle_sort();
        assert_eq!(app.manager().sort_mode(), SortMode::UpdatedDesc);
    }
}

//! Client-side note manager: the authoritative in-memory note list, the
//! search/sort projection, and the debounced save pipeline.
//!
//! The manager is deliberately clock-free and I/O-free: edits record a
//! deadline computed from a caller-supplied `Instant`, and the host event
//! loop periodically calls [`NoteManager::take_due`] (or the
//! [`NoteManager::drive`] convenience) to collect flush jobs once their
//! quiet window has elapsed. Rapid edits inside the window coalesce into a
//! single write; content and metadata run on independent windows and never
//! cancel each other.
//!
//! Per-note flushes are serialized: while a flush is in flight no second
//! job is issued for that note, and edits made mid-flight survive the
//! flight's completion via a generation counter. A failed flush keeps its
//! payload queued but parked; the next edit or an explicit
//! [`NoteManager::flush_now`] re-arms it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::config::{DEFAULT_CONTENT_DEBOUNCE, DEFAULT_META_DEBOUNCE};
use crate::errors::ServiceError;
use crate::models::{Note, NoteId, UserId};
use crate::service::{NoteMetaPatch, NoteService};

/// The seam between the manager and whatever persists its flushes.
///
/// The owner-scoped service implements this; tests script it.
pub trait SaveClient {
    /// Persists a content payload for one note.
    fn save_content(
        &mut self,
        note_id: NoteId,
        payload: &ContentPayload,
    ) -> Result<(), ServiceError>;

    /// Persists a metadata patch for one note.
    fn save_meta(&mut self, note_id: NoteId, patch: &NoteMetaPatch) -> Result<(), ServiceError>;
}

/// Adapts a `NoteService` plus an acting user to the `SaveClient` seam.
pub struct ServiceSaveClient<'a> {
    service: &'a NoteService,
    user: UserId,
}

impl<'a> ServiceSaveClient<'a> {
    /// Creates a save client acting as the given user.
    pub fn new(service: &'a NoteService, user: UserId) -> Self {
        Self { service, user }
    }
}

impl SaveClient for ServiceSaveClient<'_> {
    fn save_content(
        &mut self,
        note_id: NoteId,
        payload: &ContentPayload,
    ) -> Result<(), ServiceError> {
        self.service
            .update_content(self.user, note_id, &payload.content, Some(&payload.title))
    }

    fn save_meta(&mut self, note_id: NoteId, patch: &NoteMetaPatch) -> Result<(), ServiceError> {
        self.service.update_meta(self.user, note_id, patch)
    }
}

/// The accumulated content payload for one note's pending save.
///
/// Last-write-wins inside the debounce window: each edit overwrites the
/// whole payload. The title rides along so the store can keep auto-derived
/// titles in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPayload {
    pub content: String,
    pub title: String,
}

/// Which of a note's two independent save pipelines a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushKind {
    Content,
    Meta,
}

/// Per-note save status: `Saved -> Saving -> {Saved | Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Saved,
    Saving,
    Error,
}

/// A note's save status plus the most recent failure message, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveState {
    pub status: SaveStatus,
    pub last_error: Option<String>,
}

/// A flush job handed to the host for delivery to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushJob {
    Content {
        note_id: NoteId,
        payload: ContentPayload,
    },
    Meta {
        note_id: NoteId,
        patch: NoteMetaPatch,
    },
}

impl FlushJob {
    /// The note this job saves.
    pub fn note_id(&self) -> NoteId {
        match self {
            Self::Content { note_id, .. } | Self::Meta { note_id, .. } => *note_id,
        }
    }

    /// Which pipeline produced this job.
    pub fn kind(&self) -> FlushKind {
        match self {
            Self::Content { .. } => FlushKind::Content,
            Self::Meta { .. } => FlushKind::Meta,
        }
    }
}

/// Ordering for the list projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Pinned notes first, then most recently updated. The default.
    #[default]
    UpdatedDesc,
    /// Most recently created first; ignores pins.
    CreatedDesc,
    /// Title, lexicographic and case-insensitive.
    TitleAsc,
}

/// One pending entry in a save pipeline.
///
/// `deadline` of `None` means parked: the payload is retained (after a
/// failed flush) but nothing is due until an edit or explicit flush
/// re-arms it. `in_flight` records the generation a taken job carried so a
/// mid-flight edit is never lost on success.
#[derive(Debug)]
struct Pending<T> {
    payload: T,
    deadline: Option<Instant>,
    generation: u64,
    in_flight: Option<u64>,
}

impl<T> Pending<T> {
    fn new(payload: T, deadline: Instant) -> Self {
        Self {
            payload,
            deadline: Some(deadline),
            generation: 0,
            in_flight: None,
        }
    }
}

/// In-browser-style note manager on a single-threaded event loop.
pub struct NoteManager {
    notes: Vec<Note>,
    search_term: String,
    sort_mode: SortMode,
    save_state: HashMap<NoteId, SaveState>,
    pending_content: HashMap<NoteId, Pending<ContentPayload>>,
    pending_meta: HashMap<NoteId, Pending<NoteMetaPatch>>,
    content_debounce: Duration,
    meta_debounce: Duration,
}

impl NoteManager {
    /// Creates a manager with the default debounce windows (700 ms content,
    /// 550 ms metadata).
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_CONTENT_DEBOUNCE, DEFAULT_META_DEBOUNCE)
    }

    /// Creates a manager with custom debounce windows.
    pub fn with_debounce(content_debounce: Duration, meta_debounce: Duration) -> Self {
        Self {
            notes: Vec::new(),
            search_term: String::new(),
            sort_mode: SortMode::default(),
            save_state: HashMap::new(),
            pending_content: HashMap::new(),
            pending_meta: HashMap::new(),
            content_debounce,
            meta_debounce,
        }
    }

    /// Replaces the authoritative note list with a server-fetched one.
    ///
    /// Save states are seeded as `Saved` for new notes and retained for
    /// known ones; state for notes that vanished is dropped.
    pub fn set_notes(&mut self, notes: Vec<Note>) {
        self.notes = notes;
        for note in &self.notes {
            self.save_state.entry(note.id()).or_default();
        }
        let live: Vec<NoteId> = self.notes.iter().map(Note::id).collect();
        self.save_state.retain(|id, _| live.contains(id));
        self.pending_content.retain(|id, _| live.contains(id));
        self.pending_meta.retain(|id, _| live.contains(id));
    }

    /// Returns the authoritative (unprojected) note list.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Looks up a note by ID.
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id() == id)
    }

    /// Replaces a single note with a server-confirmed row (e.g. the
    /// response of a sharing toggle).
    pub fn replace_note(&mut self, note: Note) {
        if let Some(slot) = self.notes.iter_mut().find(|n| n.id() == note.id()) {
            *slot = note;
        }
    }

    /// Removes a note and all of its client-side state (after a delete).
    pub fn remove_note(&mut self, id: NoteId) {
        self.notes.retain(|n| n.id() != id);
        self.save_state.remove(&id);
        self.pending_content.remove(&id);
        self.pending_meta.remove(&id);
    }

    /// Returns a note's save state. Notes with no recorded state are `Saved`.
    pub fn save_state(&self, id: NoteId) -> SaveState {
        self.save_state.get(&id).cloned().unwrap_or_default()
    }

    /// True when any note has a pending (or parked) unsaved payload.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending_content.is_empty() || !self.pending_meta.is_empty()
    }

    // --- Search / sort projection ---

    /// Sets the search term. The projection picks it up on the next call.
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// Returns the current search term.
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Sets the sort mode.
    pub fn set_sort(&mut self, mode: SortMode) {
        self.sort_mode = mode;
    }

    /// Returns the current sort mode.
    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    /// Computes the filtered, ordered view of the note list.
    ///
    /// Purely derived from (notes, search term, sort mode); never mutates
    /// the underlying set. Search matches case-insensitively against the
    /// concatenation of title, tags, and content.
    pub fn projection(&self) -> Vec<&Note> {
        let query = self.search_term.trim().to_lowercase();

        let mut view: Vec<&Note> = self
            .notes
            .iter()
            .filter(|note| {
                if query.is_empty() {
                    return true;
                }
                let haystack = format!(
                    "{}\n{}\n{}",
                    note.title(),
                    note.tags().unwrap_or(""),
                    note.content()
                )
                .to_lowercase();
                haystack.contains(&query)
            })
            .collect();

        match self.sort_mode {
            SortMode::UpdatedDesc => view.sort_by(|a, b| {
                b.is_pinned()
                    .cmp(&a.is_pinned())
                    .then(b.updated_at().cmp(&a.updated_at()))
            }),
            SortMode::CreatedDesc => view.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
            SortMode::TitleAsc => {
                view.sort_by(|a, b| a.title().to_lowercase().cmp(&b.title().to_lowercase()))
            }
        }

        view
    }

    // --- Edit queueing ---

    /// Records a content edit: updates the in-memory note, overwrites any
    /// not-yet-flushed payload for it (last-write-wins within the window),
    /// marks the note `Saving`, and restarts the content deadline.
    ///
    /// Edits to unknown note IDs are ignored.
    pub fn queue_content_edit(&mut self, id: NoteId, content: impl Into<String>, now: Instant) {
        let content = content.into();
        let Some(note) = self.notes.iter_mut().find(|n| n.id() == id) else {
            return;
        };
        note.set_content(content.clone());
        let payload = ContentPayload {
            content,
            title: note.title().to_string(),
        };

        let deadline = now + self.content_debounce;
        self.pending_content
            .entry(id)
            .and_modify(|pending| {
                pending.payload = payload.clone();
                pending.generation += 1;
                pending.deadline = Some(deadline);
            })
            .or_insert_with(|| Pending::new(payload, deadline));

        self.mark_saving(id);
    }

    /// Records a metadata edit: applies the patch to the in-memory note,
    /// merges it field-wise into the pending patch, marks the note
    /// `Saving`, and restarts the (independent) metadata deadline.
    pub fn queue_meta_edit(&mut self, id: NoteId, patch: NoteMetaPatch, now: Instant) {
        if patch.is_empty() {
            return;
        }
        let Some(note) = self.notes.iter_mut().find(|n| n.id() == id) else {
            return;
        };

        // Optimistic local application; the store reconciles on flush.
        if let Some(title) = patch.title.as_deref().map(str::trim)
            && !title.is_empty()
        {
            note.set_title(title);
        }
        if let Some(tags) = &patch.tags {
            let normalized = tags
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            note.set_tags(normalized);
        }
        if let Some(pinned) = patch.is_pinned {
            note.set_pinned(pinned);
        }

        let deadline = now + self.meta_debounce;
        self.pending_meta
            .entry(id)
            .and_modify(|pending| {
                pending.payload.merge(patch.clone());
                pending.generation += 1;
                pending.deadline = Some(deadline);
            })
            .or_insert_with(|| Pending::new(patch, deadline));

        self.mark_saving(id);
    }

    // --- Flushing ---

    /// Forces any pending payloads for one note to be due immediately,
    /// bypassing the quiet window. Also re-arms payloads parked by a
    /// failed flush.
    pub fn flush_now(&mut self, id: NoteId, now: Instant) {
        if let Some(pending) = self.pending_content.get_mut(&id) {
            pending.deadline = Some(now);
        }
        if let Some(pending) = self.pending_meta.get_mut(&id) {
            pending.deadline = Some(now);
        }
    }

    /// Forces every pending payload to be due immediately.
    pub fn flush_all_now(&mut self, now: Instant) {
        for pending in self.pending_content.values_mut() {
            pending.deadline = Some(now);
        }
        for pending in self.pending_meta.values_mut() {
            pending.deadline = Some(now);
        }
    }

    /// Collects the flush jobs whose deadlines have passed.
    ///
    /// A job is only issued for a note/pipeline with no flush already in
    /// flight; taking a job marks it in flight and consumes its deadline.
    /// The payload itself stays queued until [`Self::flush_succeeded`]
    /// confirms it reached the store.
    pub fn take_due(&mut self, now: Instant) -> Vec<FlushJob> {
        let mut jobs = Vec::new();

        let mut content_ids: Vec<NoteId> = self.pending_content.keys().copied().collect();
        content_ids.sort_by_key(|id| id.get());
        for id in content_ids {
            let Some(pending) = self.pending_content.get_mut(&id) else {
                continue;
            };
            if pending.in_flight.is_none()
                && let Some(deadline) = pending.deadline
                && deadline <= now
            {
                pending.in_flight = Some(pending.generation);
                pending.deadline = None;
                jobs.push(FlushJob::Content {
                    note_id: id,
                    payload: pending.payload.clone(),
                });
            }
        }

        let mut meta_ids: Vec<NoteId> = self.pending_meta.keys().copied().collect();
        meta_ids.sort_by_key(|id| id.get());
        for id in meta_ids {
            let Some(pending) = self.pending_meta.get_mut(&id) else {
                continue;
            };
            if pending.in_flight.is_none()
                && let Some(deadline) = pending.deadline
                && deadline <= now
            {
                pending.in_flight = Some(pending.generation);
                pending.deadline = None;
                jobs.push(FlushJob::Meta {
                    note_id: id,
                    patch: pending.payload.clone(),
                });
            }
        }

        jobs
    }

    /// Confirms a taken flush reached the store.
    ///
    /// Clears the pending entry only if nothing newer accumulated while
    /// the flush was in flight; otherwise the newer payload stays queued
    /// with its own deadline. Reconciles the note's `updated_at`
    /// optimistically to the flush time (a later full reload replaces it
    /// with the authoritative store value) and marks the note `Saved` once
    /// neither pipeline holds anything for it.
    pub fn flush_succeeded(&mut self, id: NoteId, kind: FlushKind, flushed_at: OffsetDateTime) {
        match kind {
            FlushKind::Content => Self::settle(&mut self.pending_content, id),
            FlushKind::Meta => Self::settle(&mut self.pending_meta, id),
        }

        if let Some(note) = self.notes.iter_mut().find(|n| n.id() == id) {
            note.set_updated_at(flushed_at);
        }

        if !self.pending_content.contains_key(&id) && !self.pending_meta.contains_key(&id) {
            self.save_state.insert(id, SaveState::default());
        }
    }

    /// Records a failed flush: the payload stays queued but parked, and
    /// the note's status becomes `Error` with the message retained. The
    /// next edit or explicit flush retries with the latest accumulated
    /// payload.
    pub fn flush_failed(&mut self, id: NoteId, kind: FlushKind, message: impl Into<String>) {
        let pending = match kind {
            FlushKind::Content => self.pending_content.get_mut(&id).map(|p| &mut p.in_flight),
            FlushKind::Meta => self.pending_meta.get_mut(&id).map(|p| &mut p.in_flight),
        };
        if let Some(in_flight) = pending {
            *in_flight = None;
        }

        self.save_state.insert(
            id,
            SaveState {
                status: SaveStatus::Error,
                last_error: Some(message.into()),
            },
        );
    }

    /// Takes all due jobs and performs them synchronously against the
    /// given client, reporting each outcome back into the state machine.
    /// Returns the number of jobs performed.
    pub fn drive(&mut self, now: Instant, client: &mut dyn SaveClient) -> usize {
        let jobs = self.take_due(now);
        let count = jobs.len();

        for job in jobs {
            let (id, kind) = (job.note_id(), job.kind());
            let result = match &job {
                FlushJob::Content { payload, .. } => client.save_content(id, payload),
                FlushJob::Meta { patch, .. } => client.save_meta(id, patch),
            };
            match result {
                Ok(()) => self.flush_succeeded(id, kind, OffsetDateTime::now_utc()),
                Err(e) => self.flush_failed(id, kind, e.to_string()),
            }
        }

        count
    }

    /// Removes a settled entry, or just the in-flight mark when a newer
    /// generation accumulated during the flight.
    fn settle<T>(map: &mut HashMap<NoteId, Pending<T>>, id: NoteId) {
        let Some(pending) = map.get_mut(&id) else {
            return;
        };
        match pending.in_flight.take() {
            Some(taken) if taken == pending.generation => {
                map.remove(&id);
            }
            // Newer payload queued mid-flight (or nothing was in flight):
            // keep it for its own flush.
            _ => {}
        }
    }

    fn mark_saving(&mut self, id: NoteId) {
        self.save_state.insert(
            id,
            SaveState {
                status: SaveStatus::Saving,
                last_error: None,
            },
        );
    }
}

impl Default for NoteManager {
    fn default() -> Self {
        Self::new()
    }
}

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::DEFAULT_MAX_VERSIONS;
use crate::errors::ServiceError;
use crate::models::{Note, NoteBuilder, NoteId, UserId, VersionId, VersionSummary};
use crate::utils::truncate_chars;
use crate::Database;

/// Maximum versions returned by a history listing, independent of the
/// retention cap.
const HISTORY_LIMIT: usize = 20;

/// Derived titles are capped at this many characters.
const DERIVED_TITLE_MAX: usize = 80;

/// Imported titles and tags are truncated to this many characters.
const IMPORT_FIELD_MAX: usize = 255;

/// Maximum records accepted per import call; the remainder is dropped.
const IMPORT_RECORD_CAP: usize = 200;

/// Service layer providing owner-scoped note operations.
///
/// NoteService owns a Database instance and implements the full note
/// surface: fetch, create, update, metadata patch, delete, public sharing,
/// version history, restore, export, and import. Every operation takes the
/// acting `UserId` explicitly and applies the ownership filter inside the
/// query itself; a note owned by another user is indistinguishable from a
/// missing one.
///
/// # Examples
///
/// ```
/// use nota::{Database, NoteService};
///
/// # fn main() -> anyhow::Result<()> {
/// let db = Database::in_memory()?;
/// let service = NoteService::new(db);
/// # Ok(())
/// # }
/// ```
pub struct NoteService {
    db: Database,
    max_versions: usize,
}

impl NoteService {
    /// Creates a new NoteService with the default version retention cap.
    ///
    /// Takes ownership of the database instance. The service becomes the
    /// sole owner and manages all note storage through its methods.
    pub fn new(db: Database) -> Self {
        Self::with_max_versions(db, DEFAULT_MAX_VERSIONS)
    }

    /// Creates a NoteService with a custom version retention cap.
    pub fn with_max_versions(db: Database, max_versions: usize) -> Self {
        Self { db, max_versions }
    }

    /// Returns a reference to the underlying database.
    ///
    /// Useful for testing or advanced operations that need direct database
    /// access (the user registry borrows it through this).
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the configured version retention cap.
    pub fn max_versions(&self) -> usize {
        self.max_versions
    }

    /// Fetches all of the caller's notes, pinned first, newest update first.
    pub fn fetch_notes(&self, user: UserId) -> Result<Vec<Note>, ServiceError> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, content, tags, is_pinned, is_public, public_token,
                    created_at, updated_at
             FROM notes WHERE user_id = ?1
             ORDER BY is_pinned DESC, updated_at DESC, id DESC",
        )?;

        let rows = stmt.query_map([user.get()], note_from_row)?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?);
        }
        Ok(notes)
    }

    /// Retrieves one of the caller's notes by ID.
    ///
    /// Returns `None` if no such note exists for this owner. This is not
    /// considered an error condition.
    pub fn get_note(&self, user: UserId, id: NoteId) -> Result<Option<Note>, ServiceError> {
        let conn = self.db.connection();
        let result = conn.query_row(
            "SELECT id, user_id, title, content, tags, is_pinned, is_public, public_token,
                    created_at, updated_at
             FROM notes WHERE id = ?1 AND user_id = ?2",
            [id.get(), user.get()],
            note_from_row,
        );

        match result {
            Ok(note) => Ok(Some(note)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates a new note.
    ///
    /// A blank title is derived from the first line of the content; blank
    /// tags are stored as NULL. Returns the fully populated note.
    ///
    /// # Examples
    ///
    /// ```
    /// use nota::{Database, NoteService, UserId};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let db = Database::in_memory()?;
    /// # db.connection().execute(
    /// #     "INSERT INTO users (id, username, password_hash, security_question, security_answer_hash, created_at)
    /// #      VALUES (1, 'alice', 'x', 'q', 'x', 0)", [])?;
    /// let service = NoteService::new(db);
    /// let user = UserId::new(1);
    ///
    /// let note = service.create_note(user, None, "Hello world\nmore text", None)?;
    /// assert_eq!(note.title(), "Hello world");
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_note(
        &self,
        user: UserId,
        title: Option<&str>,
        content: &str,
        tags: Option<&str>,
    ) -> Result<Note, ServiceError> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => derive_title(content),
        };
        let tags = tags.and_then(normalize_tags);
        let now = OffsetDateTime::now_utc();

        let conn = self.db.connection();
        conn.execute(
            "INSERT INTO notes (user_id, title, content, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![user.get(), title, content, tags, now.unix_timestamp()],
        )?;

        let note_id = conn.last_insert_rowid();

        let mut builder = NoteBuilder::new()
            .id(NoteId::new(note_id))
            .user_id(user)
            .title(title)
            .content(content)
            .created_at(now)
            .updated_at(now);
        if let Some(tags) = tags {
            builder = builder.tags(tags);
        }
        Ok(builder.build())
    }

    /// Updates a note's content, versioning the previous content first.
    ///
    /// If the new content differs byte-for-byte from the stored content, a
    /// snapshot of the *old* content is inserted and the version list is
    /// trimmed to the retention cap; the snapshot, trim, and content write
    /// share one transaction. A call that would change neither content nor
    /// title writes nothing at all: no version, no `updated_at` bump.
    ///
    /// Title sync: a supplied non-empty title replaces the stored one; when
    /// both the supplied and stored titles are blank, the title is derived
    /// from the first line of the new content; otherwise the stored title
    /// stands.
    ///
    /// # Examples
    ///
    /// ```
    /// use nota::{Database, NoteService, UserId};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let db = Database::in_memory()?;
    /// # db.connection().execute(
    /// #     "INSERT INTO users (id, username, password_hash, security_question, security_answer_hash, created_at)
    /// #      VALUES (1, 'alice', 'x', 'q', 'x', 0)", [])?;
    /// let service = NoteService::new(db);
    /// let user = UserId::new(1);
    ///
    /// let note = service.create_note(user, None, "v1", None)?;
    /// service.update_content(user, note.id(), "v2", None)?;
    ///
    /// let history = service.history(user, note.id())?;
    /// assert_eq!(history.len(), 1);
    /// assert_eq!(history[0].preview(), "v1");
    /// # Ok(())
    /// # }
    /// ```
    pub fn update_content(
        &self,
        user: UserId,
        note_id: NoteId,
        content: &str,
        title: Option<&str>,
    ) -> Result<(), ServiceError> {
        let conn = self.db.connection();
        conn.execute("BEGIN TRANSACTION", [])?;

        let result: Result<(), ServiceError> = (|| {
            let note = self
                .get_note(user, note_id)?
                .ok_or(ServiceError::NotFound("note"))?;

            let content_changed = note.content() != content;
            let now = OffsetDateTime::now_utc().unix_timestamp();

            // Save a version only when content actually changes.
            if content_changed {
                self.insert_version(conn, user, note_id, note.content(), now)?;
                self.trim_versions(conn, user, note_id)?;
            }

            // If the user hasn't set a title, keep it in sync with the first line.
            let supplied = title.map(str::trim).filter(|t| !t.is_empty());
            let new_title = match supplied {
                Some(t) => t.to_string(),
                None if note.title().is_empty() => derive_title(content),
                None => note.title().to_string(),
            };

            if !content_changed && new_title == note.title() {
                return Ok(());
            }

            conn.execute(
                "UPDATE notes SET content = ?1, title = ?2, updated_at = ?3
                 WHERE id = ?4 AND user_id = ?5",
                rusqlite::params![content, new_title, now, note_id.get(), user.get()],
            )?;
            Ok(())
        })();

        finish_transaction(conn, result)
    }

    /// Applies a sparse metadata patch to a note.
    ///
    /// Only fields present in the patch are modified; a patch with no
    /// effective field is a validation error. Tags distinguish "omitted"
    /// from "present but empty": the latter clears them to NULL.
    pub fn update_meta(
        &self,
        user: UserId,
        note_id: NoteId,
        patch: &NoteMetaPatch,
    ) -> Result<(), ServiceError> {
        let title = patch
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let tags = patch
            .tags
            .as_ref()
            .map(|t| t.as_deref().and_then(normalize_tags));
        let pinned = patch.is_pinned;

        if title.is_none() && tags.is_none() && pinned.is_none() {
            return Err(ServiceError::validation("No changes provided."));
        }

        let note = self
            .get_note(user, note_id)?
            .ok_or(ServiceError::NotFound("note"))?;

        // Structured merge: start from the stored row, overlay present fields.
        let merged_title = title.unwrap_or(note.title());
        let merged_tags = match &tags {
            Some(t) => t.as_deref(),
            None => note.tags(),
        };
        let merged_pinned = pinned.unwrap_or(note.is_pinned());
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let conn = self.db.connection();
        conn.execute(
            "UPDATE notes SET title = ?1, tags = ?2, is_pinned = ?3, updated_at = ?4
             WHERE id = ?5 AND user_id = ?6",
            rusqlite::params![
                merged_title,
                merged_tags,
                merged_pinned,
                now,
                note_id.get(),
                user.get()
            ],
        )?;
        Ok(())
    }

    /// Deletes a note and, via cascade, its version history.
    ///
    /// Idempotent: deleting a nonexistent or already-deleted note affects
    /// zero rows and still reports success. Callers must not rely on this
    /// call as an existence signal.
    pub fn delete_note(&self, user: UserId, note_id: NoteId) -> Result<(), ServiceError> {
        let conn = self.db.connection();
        conn.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
            [note_id.get(), user.get()],
        )?;
        Ok(())
    }

    /// Enables or disables public sharing for a note.
    ///
    /// Enabling generates a fresh unguessable token (16 random bytes,
    /// hex-encoded) even if the note was already public; disabling clears
    /// the flag and token in one statement. Returns the updated note so
    /// callers can refresh their sharing affordance without a second fetch.
    pub fn set_public(
        &self,
        user: UserId,
        note_id: NoteId,
        public: bool,
    ) -> Result<Note, ServiceError> {
        let conn = self.db.connection();
        let now = OffsetDateTime::now_utc().unix_timestamp();

        if public {
            let mut attempts = 0;
            loop {
                let token = generate_token();
                let result = conn.execute(
                    "UPDATE notes SET is_public = 1, public_token = ?1, updated_at = ?2
                     WHERE id = ?3 AND user_id = ?4",
                    rusqlite::params![token, now, note_id.get(), user.get()],
                );
                match result {
                    Ok(0) => return Err(ServiceError::NotFound("note")),
                    Ok(_) => break,
                    // A token collision trips the UNIQUE index; regenerate.
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation && attempts < 3 =>
                    {
                        attempts += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        } else {
            let affected = conn.execute(
                "UPDATE notes SET is_public = 0, public_token = NULL, updated_at = ?1
                 WHERE id = ?2 AND user_id = ?3",
                rusqlite::params![now, note_id.get(), user.get()],
            )?;
            if affected == 0 {
                return Err(ServiceError::NotFound("note"));
            }
        }

        self.get_note(user, note_id)?
            .ok_or(ServiceError::NotFound("note"))
    }

    /// Lists the most recent versions of a note, newest first.
    ///
    /// Returns at most 20 summaries with previews truncated to 200
    /// characters. Full version content is only ever applied by
    /// `restore_version`, never returned here, to bound response size.
    pub fn history(
        &self,
        user: UserId,
        note_id: NoteId,
    ) -> Result<Vec<VersionSummary>, ServiceError> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, content FROM note_versions
             WHERE note_id = ?1 AND user_id = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![note_id.get(), user.get(), HISTORY_LIMIT as i64],
            |row| {
                let id: i64 = row.get(0)?;
                let created_at = datetime_from_unix(1, row.get(1)?)?;
                let content: String = row.get(2)?;
                Ok(VersionSummary::new(
                    VersionId::new(id),
                    created_at,
                    truncate_chars(&content, 200),
                ))
            },
        )?;

        let mut versions = Vec::new();
        for row in rows {
            versions.push(row?);
        }
        Ok(versions)
    }

    /// Restores a note's content from one of its versions.
    ///
    /// The version must belong to the note and the caller. The current
    /// content is snapshotted first (subject to the same no-op skip and
    /// trim rules as `update_content`), then overwritten. The title is
    /// not touched.
    ///
    /// # Examples
    ///
    /// ```
    /// use nota::{Database, NoteService, UserId};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let db = Database::in_memory()?;
    /// # db.connection().execute(
    /// #     "INSERT INTO users (id, username, password_hash, security_question, security_answer_hash, created_at)
    /// #      VALUES (1, 'alice', 'x', 'q', 'x', 0)", [])?;
    /// let service = NoteService::new(db);
    /// let user = UserId::new(1);
    ///
    /// let note = service.create_note(user, None, "v1", None)?;
    /// service.update_content(user, note.id(), "v2", None)?;
    ///
    /// let history = service.history(user, note.id())?;
    /// service.restore_version(user, note.id(), history[0].id())?;
    ///
    /// let restored = service.get_note(user, note.id())?.unwrap();
    /// assert_eq!(restored.content(), "v1");
    /// # Ok(())
    /// # }
    /// ```
    pub fn restore_version(
        &self,
        user: UserId,
        note_id: NoteId,
        version_id: VersionId,
    ) -> Result<(), ServiceError> {
        let conn = self.db.connection();
        conn.execute("BEGIN TRANSACTION", [])?;

        let result: Result<(), ServiceError> = (|| {
            let note = self
                .get_note(user, note_id)?
                .ok_or(ServiceError::NotFound("note"))?;

            let version_content: String = conn
                .query_row(
                    "SELECT content FROM note_versions
                     WHERE id = ?1 AND note_id = ?2 AND user_id = ?3",
                    [version_id.get(), note_id.get(), user.get()],
                    |row| row.get(0),
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => ServiceError::NotFound("version"),
                    other => other.into(),
                })?;

            // Restoring to identical content is a no-op.
            if note.content() == version_content {
                return Ok(());
            }

            let now = OffsetDateTime::now_utc().unix_timestamp();

            // Save current content as a version before the restore overwrites it.
            self.insert_version(conn, user, note_id, note.content(), now)?;
            self.trim_versions(conn, user, note_id)?;

            conn.execute(
                "UPDATE notes SET content = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                rusqlite::params![version_content, now, note_id.get(), user.get()],
            )?;
            Ok(())
        })();

        finish_transaction(conn, result)
    }

    /// Exports all of the caller's notes with full metadata.
    pub fn export_notes(&self, user: UserId) -> Result<ExportPayload, ServiceError> {
        Ok(ExportPayload {
            exported_at: OffsetDateTime::now_utc(),
            notes: self.fetch_notes(user)?,
        })
    }

    /// Imports notes from a serialized export payload.
    ///
    /// Fails fast, before any insert, if the payload does not parse into
    /// the expected shape. Each record is sanitized: title and tags are
    /// truncated to 255 characters, a missing title becomes "Untitled",
    /// missing content becomes empty, and sharing flags are always reset.
    /// At most 200 records are inserted per call; the remainder is silently
    /// dropped. Returns the number of notes actually imported.
    pub fn import_notes(&self, user: UserId, payload: &str) -> Result<usize, ServiceError> {
        let parsed: ImportPayload = serde_json::from_str(payload)
            .map_err(|_| ServiceError::validation("Invalid import file."))?;
        if parsed.notes.is_empty() {
            return Err(ServiceError::validation("Invalid import file."));
        }

        let conn = self.db.connection();
        conn.execute("BEGIN TRANSACTION", [])?;

        let result: Result<usize, ServiceError> = (|| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            let mut imported = 0;

            for record in parsed.notes.into_iter().take(IMPORT_RECORD_CAP) {
                let title = record
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or("Untitled");
                let title = truncate_chars(title, IMPORT_FIELD_MAX);
                let content = record.content.unwrap_or_default();
                let tags = record
                    .tags
                    .as_deref()
                    .and_then(normalize_tags)
                    .map(|t| truncate_chars(&t, IMPORT_FIELD_MAX).to_string());

                conn.execute(
                    "INSERT INTO notes (user_id, title, content, tags, is_pinned, is_public,
                                        public_token, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, ?6)",
                    rusqlite::params![user.get(), title, content, tags, record.is_pinned, now],
                )?;
                imported += 1;
            }

            Ok(imported)
        })();

        finish_transaction(conn, result)
    }

    /// Unauthenticated read of a publicly shared note by its token.
    ///
    /// Returns the note content, the owner's display name, and the
    /// last-updated time, only while the note's public flag is set.
    /// Unknown tokens and revoked shares are both not-found.
    pub fn lookup_public(&self, token: &str) -> Result<PublicNote, ServiceError> {
        let conn = self.db.connection();
        conn.query_row(
            "SELECT n.content, u.username, n.updated_at
             FROM notes n JOIN users u ON n.user_id = u.id
             WHERE n.public_token = ?1 AND n.is_public = 1",
            [token],
            |row| {
                Ok(PublicNote {
                    content: row.get(0)?,
                    username: row.get(1)?,
                    updated_at: datetime_from_unix(2, row.get(2)?)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => ServiceError::NotFound("public note"),
            other => other.into(),
        })
    }

    /// Inserts a version snapshot of `content` for the given note.
    fn insert_version(
        &self,
        conn: &Connection,
        user: UserId,
        note_id: NoteId,
        content: &str,
        now: i64,
    ) -> Result<(), ServiceError> {
        conn.execute(
            "INSERT INTO note_versions (note_id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![note_id.get(), user.get(), content, now],
        )?;
        Ok(())
    }

    /// Deletes versions beyond the retention cap, oldest first.
    ///
    /// Retention keeps the newest `max_versions` rows ordered by creation
    /// time descending with id-descending tie-break; everything past that
    /// window is removed in the same transaction as the triggering insert.
    fn trim_versions(
        &self,
        conn: &Connection,
        user: UserId,
        note_id: NoteId,
    ) -> Result<(), ServiceError> {
        conn.execute(
            "DELETE FROM note_versions WHERE id IN (
                 SELECT id FROM note_versions
                 WHERE note_id = ?1 AND user_id = ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT -1 OFFSET ?3
             )",
            rusqlite::params![note_id.get(), user.get(), self.max_versions as i64],
        )?;
        Ok(())
    }
}

/// A sparse metadata patch: only present fields are applied.
///
/// Tags use a doubled Option so callers can distinguish "leave tags alone"
/// (`None`) from "clear tags" (`Some(None)` or a present-but-empty string).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteMetaPatch {
    /// Replacement title. Blank values are ignored at apply time.
    pub title: Option<String>,
    /// Replacement tags; the inner `None` (or an empty string) clears them.
    pub tags: Option<Option<String>>,
    /// New pinned state.
    pub is_pinned: Option<bool>,
}

impl NoteMetaPatch {
    /// Patch that replaces the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Patch that replaces (or, with `None`, clears) the tags.
    pub fn tags(tags: Option<String>) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }

    /// Patch that sets the pinned flag.
    pub fn pinned(pinned: bool) -> Self {
        Self {
            is_pinned: Some(pinned),
            ..Self::default()
        }
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_none() && self.is_pinned.is_none()
    }

    /// Overlays `newer` onto this patch, field-wise. Present fields in
    /// `newer` win; absent ones leave the existing value queued.
    pub fn merge(&mut self, newer: NoteMetaPatch) {
        if newer.title.is_some() {
            self.title = newer.title;
        }
        if newer.tags.is_some() {
            self.tags = newer.tags;
        }
        if newer.is_pinned.is_some() {
            self.is_pinned = newer.is_pinned;
        }
    }
}

/// A full export of a user's notes, plus the export timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPayload {
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    pub notes: Vec<Note>,
}

/// The unauthenticated view of a publicly shared note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicNote {
    pub content: String,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Import payload shape. Unknown fields (ids, timestamps, sharing state
/// from an export) are tolerated and ignored.
#[derive(Debug, Deserialize)]
struct ImportPayload {
    notes: Vec<ImportRecord>,
}

#[derive(Debug, Deserialize)]
struct ImportRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    is_pinned: bool,
}

/// Derives a title from the first line of content.
///
/// Surrounding whitespace is trimmed and carriage returns stripped before
/// splitting on newlines; the result is capped at 80 characters. Content
/// with no usable first line titles as "Untitled".
pub(crate) fn derive_title(content: &str) -> String {
    let cleaned = content.trim().replace('\r', "");
    let first_line = cleaned.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        "Untitled".to_string()
    } else {
        truncate_chars(first_line, DERIVED_TITLE_MAX).to_string()
    }
}

/// Normalizes a tags string: trimmed, with empty collapsing to NULL.
fn normalize_tags(tags: &str) -> Option<String> {
    let trimmed = tags.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Maps a stored Unix timestamp to an `OffsetDateTime` inside a row mapper.
fn datetime_from_unix(idx: usize, unix: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(unix).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

/// Maps a full notes row to a `Note`.
fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    let id: i64 = row.get(0)?;
    let user_id: i64 = row.get(1)?;
    let title: String = row.get(2)?;
    let content: String = row.get(3)?;
    let tags: Option<String> = row.get(4)?;
    let is_pinned: bool = row.get(5)?;
    let is_public: bool = row.get(6)?;
    let public_token: Option<String> = row.get(7)?;
    let created_at = datetime_from_unix(8, row.get(8)?)?;
    let updated_at = datetime_from_unix(9, row.get(9)?)?;

    let mut builder = NoteBuilder::new()
        .id(NoteId::new(id))
        .user_id(UserId::new(user_id))
        .title(title)
        .content(content)
        .pinned(is_pinned)
        .created_at(created_at)
        .updated_at(updated_at);
    if let Some(tags) = tags {
        builder = builder.tags(tags);
    }
    // The schema CHECK keeps the flag and token in lockstep.
    if is_public && let Some(token) = public_token {
        builder = builder.public_token(token);
    }
    Ok(builder.build())
}

/// Generates a fresh public-share token: 16 random bytes, hex-encoded.
fn generate_token() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Commits on success, rolls back on error, preserving the inner result.
fn finish_transaction<T>(
    conn: &Connection,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", [])?;
            Ok(value)
        }
        Err(e) => {
            conn.execute("ROLLBACK", []).ok();
            Err(e)
        }
    }
}

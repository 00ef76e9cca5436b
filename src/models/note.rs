use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{NoteId, UserId};

/// A user-owned note with its content and sharing metadata.
///
/// Notes are the primary unit of the system. Each note belongs to exactly
/// one owner; the invariant that `public_token` is present iff `is_public`
/// is enforced by the store schema and preserved by every service operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: NoteId,
    user_id: UserId,
    title: String,
    content: String,
    tags: Option<String>,
    is_pinned: bool,
    is_public: bool,
    public_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl Note {
    /// Returns the note's unique ID.
    pub fn id(&self) -> NoteId {
        self.id
    }

    /// Returns the owner's user ID.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the note title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the note content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the free-text tags, if any.
    pub fn tags(&self) -> Option<&str> {
        self.tags.as_deref()
    }

    /// Returns whether the note is pinned to the top of listings.
    pub fn is_pinned(&self) -> bool {
        self.is_pinned
    }

    /// Returns whether the note is publicly shared.
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Returns the public sharing token. Present iff `is_public()`.
    pub fn public_token(&self) -> Option<&str> {
        self.public_token.as_deref()
    }

    /// Returns when the note was created.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Returns when the note was last updated.
    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Replaces the content. Used by the client manager for optimistic
    /// in-memory edits; the store is reconciled by the save pipeline.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Replaces the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Replaces the tags. Empty strings should be normalized to `None`
    /// before calling.
    pub fn set_tags(&mut self, tags: Option<String>) {
        self.tags = tags;
    }

    /// Sets the pinned flag.
    pub fn set_pinned(&mut self, pinned: bool) {
        self.is_pinned = pinned;
    }

    /// Sets the last-updated timestamp. The client manager stamps this
    /// optimistically after a successful flush; a full reload replaces it
    /// with the authoritative store value.
    pub fn set_updated_at(&mut self, at: OffsetDateTime) {
        self.updated_at = at;
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use nota::{NoteBuilder, NoteId, UserId};
///
/// let note = NoteBuilder::new()
///     .id(NoteId::new(1))
///     .user_id(UserId::new(1))
///     .title("Groceries")
///     .content("milk\neggs")
///     .build();
///
/// assert_eq!(note.title(), "Groceries");
/// assert!(!note.is_public());
/// assert_eq!(note.public_token(), None);
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    user_id: Option<UserId>,
    title: Option<String>,
    content: Option<String>,
    tags: Option<String>,
    is_pinned: bool,
    is_public: bool,
    public_token: Option<String>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note ID.
    pub fn id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the owner's user ID.
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the tags.
    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Sets the pinned flag.
    pub fn pinned(mut self, pinned: bool) -> Self {
        self.is_pinned = pinned;
        self
    }

    /// Marks the note public with the given sharing token.
    pub fn public_token(mut self, token: impl Into<String>) -> Self {
        self.is_public = true;
        self.public_token = Some(token.into());
        self
    }

    /// Sets the created timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the updated timestamp.
    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the `Note`, using defaults for optional fields.
    ///
    /// # Panics
    ///
    /// Panics if `id` or `user_id` have not been set.
    pub fn build(self) -> Note {
        let now = OffsetDateTime::now_utc();
        Note {
            id: self.id.expect("id is required"),
            user_id: self.user_id.expect("user_id is required"),
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            tags: self.tags,
            is_pinned: self.is_pinned,
            is_public: self.is_public,
            public_token: self.public_token,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

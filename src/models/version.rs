use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{NoteId, UserId, VersionId};

/// An immutable historical snapshot of a note's content.
///
/// A version is created when an update is about to change a note's content,
/// and just before a restore overwrites it. Versions are owned by their note
/// and deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteVersion {
    id: VersionId,
    note_id: NoteId,
    user_id: UserId,
    content: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl NoteVersion {
    /// Assembles a version from its stored fields.
    pub fn new(
        id: VersionId,
        note_id: NoteId,
        user_id: UserId,
        content: impl Into<String>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            note_id,
            user_id,
            content: content.into(),
            created_at,
        }
    }

    /// Returns the version's unique ID.
    pub fn id(&self) -> VersionId {
        self.id
    }

    /// Returns the ID of the note this version snapshots.
    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    /// Returns the owner's user ID (denormalized for owner-scoped queries).
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the full content snapshot.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when this snapshot was taken.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

/// A bounded view of a version for history listings.
///
/// Carries only a content preview; full content is returned by restore,
/// never by history, to bound response size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    id: VersionId,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    preview: String,
}

impl VersionSummary {
    /// Assembles a summary with an already-truncated preview.
    pub fn new(id: VersionId, created_at: OffsetDateTime, preview: impl Into<String>) -> Self {
        Self {
            id,
            created_at,
            preview: preview.into(),
        }
    }

    /// Returns the version's unique ID.
    pub fn id(&self) -> VersionId {
        self.id
    }

    /// Returns when the snapshot was taken.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Returns the truncated content preview (at most 200 characters).
    pub fn preview(&self) -> &str {
        &self.preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_preserves_fields() {
        let now = OffsetDateTime::now_utc();
        let version = NoteVersion::new(
            VersionId::new(3),
            NoteId::new(1),
            UserId::new(2),
            "old content",
            now,
        );

        assert_eq!(version.id(), VersionId::new(3));
        assert_eq!(version.note_id(), NoteId::new(1));
        assert_eq!(version.user_id(), UserId::new(2));
        assert_eq!(version.content(), "old content");
        assert_eq!(version.created_at(), now);
    }

    #[test]
    fn summary_serialization_roundtrip() {
        let now = OffsetDateTime::now_utc();
        let summary = VersionSummary::new(VersionId::new(9), now, "preview text");

        let json = serde_json::to_string(&summary).unwrap();
        let deserialized: VersionSummary = serde_json::from_str(&json).unwrap();

        assert_eq!(summary, deserialized);
    }
}

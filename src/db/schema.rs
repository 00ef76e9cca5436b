/// Complete database schema for the Nota application.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
/// All statements are designed to be run in a single batch.
pub const INITIAL_SCHEMA: &str = r#"
-- Users table: account identities and credential hashes
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    security_question TEXT NOT NULL,
    security_answer_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Notes table: one row per note, owner-scoped
-- public_token is present iff is_public is set; the CHECK keeps the pair honest
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    tags TEXT,
    is_pinned INTEGER NOT NULL DEFAULT 0,
    is_public INTEGER NOT NULL DEFAULT 0,
    public_token TEXT UNIQUE,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    CHECK ((is_public = 0 AND public_token IS NULL)
        OR (is_public = 1 AND public_token IS NOT NULL))
);

-- Version snapshots: bounded, append-only history per note
-- user_id is denormalized so owner-scoped queries skip the join
CREATE TABLE IF NOT EXISTS note_versions (
    id INTEGER PRIMARY KEY,
    note_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Index for the default listing order (pinned first, newest update first)
CREATE INDEX IF NOT EXISTS idx_notes_owner ON notes(user_id, is_pinned, updated_at);

-- Index for unauthenticated public-token lookups
CREATE INDEX IF NOT EXISTS idx_notes_public_token ON notes(public_token);

-- Index for history listing and retention trimming
CREATE INDEX IF NOT EXISTS idx_versions_note ON note_versions(note_id, created_at, id);
"#;

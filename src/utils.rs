//! Shared utility functions for database paths and text handling.
//!
//! These functions are reused across the CLI and TUI interfaces.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Gets the cross-platform database path.
///
/// Returns the path as `{data_dir}/nota/nota.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_database_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("nota").join("nota.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// Creates the directory structure if it doesn't exist using `create_dir_all`.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}

/// Truncates a string to at most `max_chars` characters.
///
/// Counts characters, not bytes, so multi-byte input is never cut
/// mid-codepoint. Returns a borrowed slice when no truncation is needed.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Formats a word/character count label for a note's content.
///
/// Words are whitespace-separated runs; characters are counted after
/// trimming surrounding whitespace.
pub fn stats_label(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return "0 words · 0 chars".to_string();
    }
    let words = trimmed.split_whitespace().count();
    let chars = trimmed.chars().count();
    format!("{words} words · {chars} chars")
}

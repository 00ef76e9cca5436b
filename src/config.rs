//! Application configuration resolved from the environment.
//!
//! Every knob has a default; environment variables override them:
//!
//! - `NOTA_DB`: database file path (default `{data_dir}/nota/nota.db`)
//! - `NOTA_MAX_VERSIONS`: per-note version retention cap (default 20)
//! - `NOTA_CONTENT_DEBOUNCE_MS`: content autosave quiet window (default 700)
//! - `NOTA_META_DEBOUNCE_MS`: metadata autosave quiet window (default 550)
//!
//! The binary loads `.env` files via `dotenvy` before reading these.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Default per-note version retention cap.
pub const DEFAULT_MAX_VERSIONS: usize = 20;

/// Default quiet window before a pending content edit is flushed.
pub const DEFAULT_CONTENT_DEBOUNCE: Duration = Duration::from_millis(700);

/// Default quiet window before a pending metadata patch is flushed.
pub const DEFAULT_META_DEBOUNCE: Duration = Duration::from_millis(550);

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Per-note version retention cap.
    pub max_versions: usize,
    /// Debounce window for content edits.
    pub content_debounce: Duration,
    /// Debounce window for metadata edits.
    pub meta_debounce: Duration,
}

impl AppConfig {
    /// Resolves configuration from the environment, falling back to defaults.
    ///
    /// Unparseable numeric overrides are rejected rather than silently
    /// ignored, so a typo in `.env` fails loudly at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or a
    /// numeric override does not parse.
    pub fn from_env() -> Result<Self> {
        let db_path = match std::env::var("NOTA_DB") {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => crate::utils::get_database_path()?,
        };

        let max_versions = parse_env("NOTA_MAX_VERSIONS", DEFAULT_MAX_VERSIONS)?;
        let content_debounce = Duration::from_millis(parse_env(
            "NOTA_CONTENT_DEBOUNCE_MS",
            DEFAULT_CONTENT_DEBOUNCE.as_millis() as u64,
        )?);
        let meta_debounce = Duration::from_millis(parse_env(
            "NOTA_META_DEBOUNCE_MS",
            DEFAULT_META_DEBOUNCE.as_millis() as u64,
        )?);

        Ok(Self {
            db_path,
            max_versions,
            content_debounce,
            meta_debounce,
        })
    }
}

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is unset or empty.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name} value {raw:?}: {e}")),
        _ => Ok(default),
    }
}

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod manager;
pub mod models;
pub mod service;
pub mod tui;
pub mod utils;

pub use config::AppConfig;
pub use db::Database;
pub use errors::ServiceError;
pub use manager::{
    ContentPayload, FlushJob, FlushKind, NoteManager, SaveClient, SaveState, SaveStatus,
    ServiceSaveClient, SortMode,
};
pub use models::{Note, NoteBuilder, NoteId, NoteVersion, User, UserId, VersionId, VersionSummary};
pub use service::{ExportPayload, NoteMetaPatch, NoteService, PublicNote};

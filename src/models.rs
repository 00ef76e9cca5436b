mod ids;
mod note;
mod user;
mod version;

pub use ids::{NoteId, UserId, VersionId};
pub use note::{Note, NoteBuilder};
pub use user::User;
pub use version::{NoteVersion, VersionSummary};

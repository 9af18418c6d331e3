//! Loading of book content and runtime settings.
//!
//! The content document is produced by an external build step. It is read
//! once at startup, validated, and handed to the core as an immutable
//! [`Content`](bookgame_core::content::Content).

pub mod loader;
pub mod validate;

pub use loader::{BookData, DataLoadError, load_book, load_content, load_settings};
pub use validate::{ContentIssue, validate_content};

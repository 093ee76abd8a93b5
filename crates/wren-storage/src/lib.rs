//! Interface boundary to the document-store collaborator.
//!
//! Bookmarks, history, favicons, form-fill entries, startup tabs and
//! permission grants all live behind [`DocumentStore`]: a scoped
//! find/insert/update/remove document interface. The on-disk format is the
//! collaborator's business; the chrome only sees records.

pub mod memory;
pub mod models;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Bookmark, Favicon, HistoryItem, PermissionGrant, StartupTab};
pub use store::{DocumentStore, Query, Record, Scope};

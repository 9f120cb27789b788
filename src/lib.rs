//! Hikkoshi - moves a MangaDex reading list to AniList.
//!
//! This library provides:
//! - API clients for MangaDex (source) and AniList (destination)
//! - Title resolution between the two catalogs
//! - A resumable reconciliation run backed by a JSON checkpoint

pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod rate_limit;
pub mod resolver;
pub mod retry;
pub mod status;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use catalog::{AniListClient, DestinationCatalog, MangaDexClient, SourceCatalog, StatusTable};
pub use config::Config;
pub use console::Console;
pub use error::{ApiError, ConfigError, StoreError, SyncError};
pub use status::{FollowStatus, ListStatus};
pub use store::{Checkpoint, JsonProgressStore, ProgressStore};
pub use sync::{ItemOutcome, SyncEngine, SyncReport};

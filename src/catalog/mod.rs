//! Catalog service traits and the types that flow between them.
//!
//! The reconciliation engine only talks to these traits; the MangaDex and
//! AniList clients are the production implementations.

pub mod anilist;
pub mod browser;
pub mod callback;
pub mod mangadex;

pub use anilist::AniListClient;
pub use mangadex::MangaDexClient;

use crate::error::ApiError;
use crate::status::{FollowStatus, ListStatus};
use async_trait::async_trait;
use futures::Stream;
use std::collections::BTreeMap;

/// Full follow table: source id to reading status.
pub type StatusTable = BTreeMap<String, FollowStatus>;

/// Bearer credential for one service. Never written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Manga metadata from the source catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangaRecord {
    pub id: String,
    /// Titles keyed by locale, in the order the service returned them.
    pub titles: Vec<(String, String)>,
}

/// A search hit on the destination catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: u64,
    pub romaji_title: Option<String>,
    pub english_title: Option<String>,
}

impl Candidate {
    /// Best title for display.
    pub fn display_title(&self) -> &str {
        self.romaji_title
            .as_deref()
            .or(self.english_title.as_deref())
            .unwrap_or("<untitled>")
    }
}

/// Service the reading list is read from.
#[async_trait]
pub trait SourceCatalog: Send {
    /// Largest number of ids `fetch_batch` accepts.
    fn max_batch(&self) -> usize;

    /// Fetches the whole follow table, optionally filtered by status.
    async fn fetch_follow_statuses(
        &mut self,
        filter: Option<FollowStatus>,
    ) -> Result<StatusTable, ApiError>;

    /// Fetches metadata for up to `max_batch()` ids.
    async fn fetch_batch(&mut self, ids: &[String]) -> Result<Vec<MangaRecord>, ApiError>;
}

/// Service the reading list is written to.
#[async_trait]
pub trait DestinationCatalog: Send {
    /// Obtains a credential if there isn't one yet.
    async fn authenticate(&mut self) -> Result<(), ApiError>;

    /// Free-text search over the catalog.
    async fn search_by_title(&mut self, title: &str) -> Result<Vec<Candidate>, ApiError>;

    /// Creates or updates a list entry; returns the status the service stored.
    async fn upsert_list_entry(
        &mut self,
        destination_id: u64,
        status: ListStatus,
    ) -> Result<ListStatus, ApiError>;
}

/// Splits `ids` into consecutive batches of at most `size`, order preserved.
pub fn partition_batches(ids: &[String], size: usize) -> std::slice::Chunks<'_, String> {
    ids.chunks(size.max(1))
}

/// Lazily fetches metadata for `ids`, one batch per item.
///
/// Holds no state between calls; to resume, call again with the ids that
/// are still pending.
pub fn iterate_all_details<'a, S>(
    source: &'a mut S,
    ids: &'a [String],
) -> impl Stream<Item = Result<Vec<MangaRecord>, ApiError>> + 'a
where
    S: SourceCatalog + ?Sized,
{
    let batches = partition_batches(ids, source.max_batch());
    futures::stream::unfold((source, batches), |(source, mut batches)| async move {
        let batch = batches.next()?;
        let result = source.fetch_batch(batch).await;
        Some((result, (source, batches)))
    })
}

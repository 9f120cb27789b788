//! The reconciliation run: walk the pending follows batch by batch, find
//! each title on the destination and write its status there, persisting the
//! checkpoint after every item.

use crate::catalog::{DestinationCatalog, MangaRecord, SourceCatalog, StatusTable, iterate_all_details};
use crate::console::Console;
use crate::error::{ApiError, SyncError};
use crate::resolver::{FirstResult, MatchStrategy, extract_title};
use crate::retry::Sleeper;
use crate::status::{FollowStatus, ListStatus};
use crate::store::{Checkpoint, ProgressStore, StatusSnapshotCache};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Returns the follow table, from the snapshot cache unless `force_refresh`
/// is set or nothing is cached. A fresh fetch replaces the cache.
pub async fn load_status_table<S>(
    source: &mut S,
    cache: &StatusSnapshotCache,
    force_refresh: bool,
    console: &Console,
) -> Result<StatusTable, SyncError>
where
    S: SourceCatalog + ?Sized,
{
    if !force_refresh && let Some(table) = cache.load()? {
        console.info(&format!(
            "Using cached follow list ({} entries) from {}",
            console.count(table.len()),
            cache.path().display()
        ));
        return Ok(table);
    }

    console.step("Fetching follow list from MangaDex...");
    let table = source.fetch_follow_statuses(None).await?;
    cache.save(&table)?;
    console.success(&format!("Fetched {} follows", console.count(table.len())));
    Ok(table)
}

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Written to the destination list.
    Matched {
        destination_id: u64,
        status: ListStatus,
    },
    /// Search returned nothing usable; queued for manual review.
    NotFound,
    /// The record had no title to search with; queued for manual review.
    ExtractFailed,
    /// The search answer was malformed; queued for manual review.
    SearchError,
    /// A destination call failed; the item stays pending for the next run.
    Skipped { reason: String },
}

impl ItemOutcome {
    /// Whether the item is now in the checkpoint's processed set.
    pub fn is_recorded(&self) -> bool {
        !matches!(self, ItemOutcome::Skipped { .. })
    }
}

/// Tally of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Size of the follow table.
    pub total: usize,
    /// Already processed by earlier runs.
    pub previously_processed: usize,
    pub matched: usize,
    pub not_found: usize,
    pub extract_failed: usize,
    pub search_errors: usize,
    pub skipped: usize,
}

impl SyncReport {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Matched { .. } => self.matched += 1,
            ItemOutcome::NotFound => self.not_found += 1,
            ItemOutcome::ExtractFailed => self.extract_failed += 1,
            ItemOutcome::SearchError => self.search_errors += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Items handled in this run, skipped ones included.
    pub fn attempted(&self) -> usize {
        self.matched + self.not_found + self.extract_failed + self.search_errors + self.skipped
    }

    /// Items queued for manual review in this run.
    pub fn non_matched(&self) -> usize {
        self.not_found + self.extract_failed + self.search_errors
    }
}

/// Drives one reconciliation run against a destination, keeping the
/// checkpoint in `store` current after every item.
pub struct SyncEngine<D, P> {
    destination: D,
    store: P,
    strategy: Box<dyn MatchStrategy>,
    sleeper: Arc<dyn Sleeper>,
    pacing: Duration,
    console: Console,
    checkpoint: Checkpoint,
}

impl<D, P> SyncEngine<D, P>
where
    D: DestinationCatalog,
    P: ProgressStore,
{
    pub fn new(destination: D, store: P, sleeper: Arc<dyn Sleeper>, console: Console) -> Self {
        Self {
            destination,
            store,
            strategy: Box::new(FirstResult),
            sleeper,
            pacing: Duration::from_secs(1),
            console,
            checkpoint: Checkpoint::new(),
        }
    }

    /// Replaces the default first-result match strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn MatchStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Delay between batches and after each destination round trip.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Checkpoint as of the last save.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Processes every id in `statuses` that the saved checkpoint does not
    /// already cover.
    ///
    /// On any error the checkpoint is flushed before returning, so a rerun
    /// resumes after the last completed item.
    pub async fn run<S>(&mut self, source: &mut S, statuses: &StatusTable) -> Result<SyncReport, SyncError>
    where
        S: SourceCatalog + ?Sized,
    {
        self.checkpoint = self.store.load()?;
        let work = self.checkpoint.pending(statuses);

        let mut report = SyncReport {
            total: statuses.len(),
            previously_processed: statuses.len() - work.len(),
            ..SyncReport::default()
        };

        if work.is_empty() {
            info!(total = statuses.len(), "nothing left to sync");
            self.console.success("Everything is already synced");
            return Ok(report);
        }

        self.console.info(&format!(
            "{} of {} follows left to sync",
            self.console.count(work.len()),
            statuses.len()
        ));

        let result = match self.destination.authenticate().await {
            Ok(()) => self.process_all(source, statuses, &work, &mut report).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            error!("sync aborted: {}", e);
            self.flush();
            return Err(e);
        }

        info!(
            matched = report.matched,
            non_matched = report.non_matched(),
            skipped = report.skipped,
            "sync finished"
        );
        Ok(report)
    }

    async fn process_all<S>(
        &mut self,
        source: &mut S,
        statuses: &StatusTable,
        work: &[String],
        report: &mut SyncReport,
    ) -> Result<(), SyncError>
    where
        S: SourceCatalog + ?Sized,
    {
        let batch_count = work.len().div_ceil(source.max_batch().max(1));
        let batches = iterate_all_details(source, work);
        let mut batches = std::pin::pin!(batches);
        let mut index = 0;

        while let Some(batch) = batches.next().await {
            index += 1;
            let records = batch.inspect_err(|e| error!(batch = index, "batch fetch failed: {}", e))?;

            self.console.step(&format!(
                "Processing {} ({} manga)",
                self.console.batch_info(index, batch_count),
                records.len()
            ));

            for record in &records {
                let Some(status) = statuses.get(&record.id) else {
                    warn!(id = %record.id, "batch returned an id that is not followed, ignoring");
                    continue;
                };
                if self.checkpoint.is_processed(&record.id) {
                    debug!(id = %record.id, "already processed");
                    continue;
                }

                let outcome = self.process_item(record, status).await?;
                report.record(&outcome);
            }

            if index < batch_count {
                self.sleeper.sleep(self.pacing).await;
            }
        }

        Ok(())
    }

    async fn process_item(
        &mut self,
        record: &MangaRecord,
        status: &FollowStatus,
    ) -> Result<ItemOutcome, SyncError> {
        let id = record.id.as_str();

        let Some(title) = extract_title(record) else {
            warn!(id, "no usable title, queued for manual review");
            self.console.warning(&format!("No title for {}", self.console.muted(id)));
            self.checkpoint.record_non_matched(id, "", status);
            self.store.save(&self.checkpoint)?;
            return Ok(ItemOutcome::ExtractFailed);
        };

        let outcome = self.resolve(id, &title, status).await?;

        match &outcome {
            ItemOutcome::Matched {
                destination_id,
                status: confirmed,
            } => {
                self.checkpoint.mark_processed(id);
                self.console
                    .success(&format!("{} -> AniList {} ({})", title, destination_id, confirmed));
            }
            ItemOutcome::NotFound | ItemOutcome::SearchError => {
                self.checkpoint.record_non_matched(id, &title, status);
                self.console.warning(&format!("Not found on AniList: {}", title));
            }
            ItemOutcome::Skipped { reason } => {
                warn!(id, title = %title, "skipped, will retry next run: {}", reason);
                self.console.warning(&format!("Skipped {}: {}", title, reason));
            }
            ItemOutcome::ExtractFailed => {}
        }

        if outcome.is_recorded() {
            self.store.save(&self.checkpoint)?;
        }
        self.sleeper.sleep(self.pacing).await;

        Ok(outcome)
    }

    /// Searches for `title` and writes the mapped status to the picked entry.
    /// Fatal destination errors propagate; anything else becomes an outcome.
    async fn resolve(
        &mut self,
        id: &str,
        title: &str,
        status: &FollowStatus,
    ) -> Result<ItemOutcome, SyncError> {
        let candidates = match self.destination.search_by_title(title).await {
            Ok(candidates) => candidates,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(ApiError::UnexpectedResponse(message)) => {
                warn!(id, title, "malformed search response: {}", message);
                return Ok(ItemOutcome::SearchError);
            }
            Err(e) => {
                return Ok(ItemOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let Some(candidate) = self.strategy.pick(title, &candidates) else {
            debug!(id, title, "no search results");
            return Ok(ItemOutcome::NotFound);
        };
        let destination_id = candidate.id;
        debug!(id, title, destination_id, matched = candidate.display_title(), "picked candidate");

        match self
            .destination
            .upsert_list_entry(destination_id, ListStatus::from(status))
            .await
        {
            Ok(confirmed) => Ok(ItemOutcome::Matched {
                destination_id,
                status: confirmed,
            }),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => Ok(ItemOutcome::Skipped {
                reason: e.to_string(),
            }),
        }
    }

    /// Best-effort save on the way out of a failed run.
    fn flush(&self) {
        match self.store.save(&self.checkpoint) {
            Ok(()) => info!(
                processed = self.checkpoint.processed().len(),
                "checkpoint saved"
            ),
            Err(e) => error!("could not save checkpoint: {}", e),
        }
    }
}

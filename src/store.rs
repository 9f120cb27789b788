//! Persisted state: the sync checkpoint, the follow-status snapshot cache
//! and the manual-review report.
//!
//! Everything is pretty-printed JSON so it can be inspected and hand-edited.

use crate::catalog::StatusTable;
use crate::error::StoreError;
use crate::status::FollowStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// An item that needs manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonMatched {
    pub title: String,
    pub status: FollowStatus,
}

/// Durable record of which source ids have been handled.
///
/// `processed` only ever grows, and every key of `non_matched` is also in
/// `processed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "processed_manga", default)]
    processed: BTreeSet<String>,
    #[serde(default)]
    non_matched: BTreeMap<String, NonMatched>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    pub fn mark_processed(&mut self, id: &str) {
        self.processed.insert(id.to_string());
    }

    /// Queues an item for manual review and marks it processed.
    pub fn record_non_matched(&mut self, id: &str, title: &str, status: &FollowStatus) {
        self.non_matched.insert(
            id.to_string(),
            NonMatched {
                title: title.to_string(),
                status: status.clone(),
            },
        );
        self.mark_processed(id);
    }

    pub fn processed(&self) -> &BTreeSet<String> {
        &self.processed
    }

    pub fn non_matched(&self) -> &BTreeMap<String, NonMatched> {
        &self.non_matched
    }

    /// Ids from `table` that have not been handled yet, in table order.
    pub fn pending(&self, table: &StatusTable) -> Vec<String> {
        table
            .keys()
            .filter(|id| !self.is_processed(id))
            .cloned()
            .collect()
    }

    /// Restores the non-matched-implies-processed invariant on data that was
    /// edited by hand.
    fn repair(&mut self) {
        for id in self.non_matched.keys() {
            if !self.processed.contains(id) {
                self.processed.insert(id.clone());
            }
        }
    }
}

/// Loads and saves checkpoints.
pub trait ProgressStore: Send + Sync {
    /// Returns the saved checkpoint, or an empty one if none exists.
    fn load(&self) -> Result<Checkpoint, StoreError>;

    /// Durably replaces the saved checkpoint.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;
}

/// Checkpoint stored as a single JSON file, rewritten on every save.
#[derive(Debug, Clone)]
pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for JsonProgressStore {
    fn load(&self) -> Result<Checkpoint, StoreError> {
        let mut checkpoint: Checkpoint = read_json(&self.path)?.unwrap_or_default();
        checkpoint.repair();
        Ok(checkpoint)
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        write_json(&self.path, checkpoint)
    }
}

/// Cache of the full follow table, reused across runs.
#[derive(Debug, Clone)]
pub struct StatusSnapshotCache {
    path: PathBuf,
}

impl StatusSnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached table, or `None` if nothing usable is cached.
    pub fn load(&self) -> Result<Option<StatusTable>, StoreError> {
        Ok(read_json::<StatusTable>(&self.path)?.filter(|table| !table.is_empty()))
    }

    pub fn save(&self, table: &StatusTable) -> Result<(), StoreError> {
        write_json(&self.path, table)
    }
}

#[derive(Serialize)]
struct NonMatchedReport<'a> {
    total: usize,
    manga: &'a BTreeMap<String, NonMatched>,
}

/// Writes the end-of-run manual review list.
pub fn write_non_matched_report(path: &Path, checkpoint: &Checkpoint) -> Result<(), StoreError> {
    write_json(
        path,
        &NonMatchedReport {
            total: checkpoint.non_matched.len(),
            manga: &checkpoint.non_matched,
        },
    )
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::ReadError {
                path: path.display().to_string(),
                source,
            });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::ParseError {
            path: path.display().to_string(),
            source,
        })
}

/// Writes and fsyncs a sibling temp file, then renames it over `path`.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_error = |message: String| StoreError::WriteError {
        path: path.display().to_string(),
        message,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|e| write_error(e.to_string()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp).map_err(|e| write_error(e.to_string()))?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| write_error(e.to_string()))?;
    drop(file);
    std::fs::rename(&tmp, path).map_err(|e| write_error(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_load_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("sync_progress.json"));
        assert_eq!(store.load().unwrap(), Checkpoint::new());

        let cache = StatusSnapshotCache::new(dir.path().join("manga_statuses.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_non_matched_implies_processed() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record_non_matched("m2", "Lost Title", &FollowStatus::Completed);

        assert!(checkpoint.is_processed("m2"));
        assert_eq!(checkpoint.non_matched()["m2"].title, "Lost Title");
    }

    #[test]
    fn test_checkpoint_file_format() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("data").join("sync_progress.json"));

        let mut checkpoint = Checkpoint::new();
        checkpoint.mark_processed("b");
        checkpoint.mark_processed("a");
        checkpoint.record_non_matched("c", "Gone", &FollowStatus::OnHold);
        store.save(&checkpoint).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["processed_manga"], serde_json::json!(["a", "b", "c"]));
        assert_eq!(raw["non_matched"]["c"]["title"], "Gone");
        assert_eq!(raw["non_matched"]["c"]["status"], "on_hold");

        assert_eq!(store.load().unwrap(), checkpoint);
    }

    #[test]
    fn test_save_replaces_previous_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("sync_progress.json"));

        let mut checkpoint = Checkpoint::new();
        checkpoint.mark_processed("m1");
        store.save(&checkpoint).unwrap();
        checkpoint.record_non_matched("m2", "Second", &FollowStatus::Reading);
        store.save(&checkpoint).unwrap();

        assert_eq!(store.load().unwrap(), checkpoint);
        assert!(!dir.path().join("sync_progress.json.tmp").exists());
    }

    #[test]
    fn test_unwritable_location_is_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let store = JsonProgressStore::new(blocker.join("sync_progress.json"));
        let err = store.save(&Checkpoint::new()).unwrap_err();
        assert!(matches!(err, StoreError::WriteError { .. }));
    }

    #[test]
    fn test_load_repairs_hand_edited_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync_progress.json");
        std::fs::write(
            &path,
            r#"{"processed_manga": ["a"], "non_matched": {"x": {"title": "X", "status": "reading"}}}"#,
        )
        .unwrap();

        let checkpoint = JsonProgressStore::new(&path).load().unwrap();
        assert!(checkpoint.is_processed("a"));
        assert!(checkpoint.is_processed("x"));
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync_progress.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonProgressStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::ParseError { .. }));
    }

    #[test]
    fn test_pending_skips_processed() {
        let mut table = StatusTable::new();
        table.insert("m1".to_string(), FollowStatus::Reading);
        table.insert("m2".to_string(), FollowStatus::Completed);
        table.insert("m3".to_string(), FollowStatus::Dropped);

        let mut checkpoint = Checkpoint::new();
        checkpoint.mark_processed("m2");

        assert_eq!(checkpoint.pending(&table), vec!["m1", "m3"]);
    }

    #[test]
    fn test_snapshot_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = StatusSnapshotCache::new(dir.path().join("manga_statuses.json"));

        let mut table = StatusTable::new();
        table.insert("m1".to_string(), FollowStatus::ReReading);
        table.insert("m2".to_string(), FollowStatus::from("mystery"));
        cache.save(&table).unwrap();

        assert_eq!(cache.load().unwrap(), Some(table));
    }

    #[test]
    fn test_non_matched_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("non_matched_manga.json");

        let mut checkpoint = Checkpoint::new();
        checkpoint.record_non_matched("m9", "Obscure", &FollowStatus::PlanToRead);
        write_non_matched_report(&path, &checkpoint).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["total"], 1);
        assert_eq!(raw["manga"]["m9"]["status"], "plan_to_read");
        assert!(!dir.path().join("non_matched_manga.json.tmp").exists());
    }
}

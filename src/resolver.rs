//! Title extraction and candidate matching.

use crate::catalog::{Candidate, MangaRecord};

/// Locale preferred when picking a display title.
const PREFERRED_LOCALE: &str = "en";

/// Picks the title to search the destination with: the English title if it
/// is non-empty, else the first non-empty title in service order.
pub fn extract_title(record: &MangaRecord) -> Option<String> {
    let preferred = record
        .titles
        .iter()
        .find(|(locale, title)| locale == PREFERRED_LOCALE && !title.is_empty());

    preferred
        .or_else(|| record.titles.iter().find(|(_, title)| !title.is_empty()))
        .map(|(_, title)| title.clone())
}

/// Chooses which search result corresponds to a source title.
pub trait MatchStrategy: Send + Sync {
    fn pick<'c>(&self, title: &str, candidates: &'c [Candidate]) -> Option<&'c Candidate>;
}

/// Takes the first search result, trusting the service's relevance order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstResult;

impl MatchStrategy for FirstResult {
    fn pick<'c>(&self, _title: &str, candidates: &'c [Candidate]) -> Option<&'c Candidate> {
        candidates.first()
    }
}

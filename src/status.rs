//! Reading statuses on both services and the mapping between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Follow status as reported by MangaDex.
///
/// Unknown values are kept verbatim so they survive a round trip through the
/// snapshot cache and the non-matched report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FollowStatus {
    Reading,
    OnHold,
    PlanToRead,
    Dropped,
    ReReading,
    Completed,
    Other(String),
}

impl FollowStatus {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            FollowStatus::Reading => "reading",
            FollowStatus::OnHold => "on_hold",
            FollowStatus::PlanToRead => "plan_to_read",
            FollowStatus::Dropped => "dropped",
            FollowStatus::ReReading => "re_reading",
            FollowStatus::Completed => "completed",
            FollowStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for FollowStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "reading" => FollowStatus::Reading,
            "on_hold" => FollowStatus::OnHold,
            "plan_to_read" => FollowStatus::PlanToRead,
            "dropped" => FollowStatus::Dropped,
            "re_reading" => FollowStatus::ReReading,
            "completed" => FollowStatus::Completed,
            _ => FollowStatus::Other(raw),
        }
    }
}

impl From<&str> for FollowStatus {
    fn from(raw: &str) -> Self {
        FollowStatus::from(raw.to_string())
    }
}

impl From<FollowStatus> for String {
    fn from(status: FollowStatus) -> Self {
        match status {
            FollowStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for FollowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AniList `MediaListStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListStatus {
    Current,
    Planning,
    Completed,
    Dropped,
    Paused,
    Repeating,
}

impl ListStatus {
    /// Returns the GraphQL enum literal.
    pub fn as_str(self) -> &'static str {
        match self {
            ListStatus::Current => "CURRENT",
            ListStatus::Planning => "PLANNING",
            ListStatus::Completed => "COMPLETED",
            ListStatus::Dropped => "DROPPED",
            ListStatus::Paused => "PAUSED",
            ListStatus::Repeating => "REPEATING",
        }
    }
}

impl fmt::Display for ListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&FollowStatus> for ListStatus {
    /// Anything unrecognised is treated as currently reading.
    fn from(status: &FollowStatus) -> Self {
        match status {
            FollowStatus::Reading => ListStatus::Current,
            FollowStatus::OnHold => ListStatus::Paused,
            FollowStatus::PlanToRead => ListStatus::Planning,
            FollowStatus::Dropped => ListStatus::Dropped,
            FollowStatus::ReReading => ListStatus::Repeating,
            FollowStatus::Completed => ListStatus::Completed,
            FollowStatus::Other(_) => ListStatus::Current,
        }
    }
}

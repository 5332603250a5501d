//! Cache status types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-URL cache state.
///
/// `Unknown` is never stored; it is what an absent entry reads as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Unknown,
    Loading,
    Success,
    Failed,
    NotFound,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Emitted on every status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub url: String,
    pub status: CacheStatus,
}

/// Outcome counts of one batch caching run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheReport {
    /// URLs fetched in this run
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// URLs already cached before the run
    pub skipped: usize,
}

impl CacheReport {
    pub(crate) fn record(&mut self, status: CacheStatus) {
        self.attempted += 1;
        match status {
            CacheStatus::Success => self.succeeded += 1,
            _ => self.failed += 1,
        }
    }
}

impl fmt::Display for CacheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} cached, {} failed, {} already cached",
            self.attempted, self.succeeded, self.failed, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let change = StatusChange {
            url: "https://ex.com/a".to_string(),
            status: CacheStatus::NotFound,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["status"], "not_found");
        assert_eq!(CacheStatus::Loading.to_string(), "loading");
        assert_eq!(format!("{:<9}|", CacheStatus::Failed), "failed   |");
    }

    #[test]
    fn test_report_record() {
        let mut report = CacheReport::default();
        report.record(CacheStatus::Success);
        report.record(CacheStatus::Failed);
        report.record(CacheStatus::Success);
        assert_eq!((report.attempted, report.succeeded, report.failed), (3, 2, 1));
    }
}

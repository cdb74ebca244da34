//! Screening run lifecycle records.
//!
//! Every batch job that produces rows opens a run in `running`, then closes
//! it as `success` or `failed`. The daily tracker writes runs whose notes
//! start with [`DAILY_TRACKER_NOTE`] so pick builders can ignore them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notes marker for account-tracking runs.
pub const DAILY_TRACKER_NOTE: &str = "DAILY_TRACKER";

/// Longest error message stored on a failed run.
pub const MAX_RUN_ERROR_CHARS: usize = 800;

/// Lifecycle state of a screening run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A row of `screening_runs`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScreeningRunRecord {
    pub run_id: i64,
    pub run_ts: DateTime<Utc>,
    pub status: String,
    pub universe_size: i32,
    pub candidates_count: Option<i32>,
    pub picks_count: Option<i32>,
    pub notes: Option<String>,
    pub error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScreeningRunRecord {
    #[must_use]
    pub fn run_status(&self) -> Option<RunStatus> {
        RunStatus::parse(&self.status)
    }

    /// True for account-tracking runs, which carry no candidates.
    #[must_use]
    pub fn is_daily_tracker(&self) -> bool {
        self.notes
            .as_deref()
            .is_some_and(|n| n.starts_with(DAILY_TRACKER_NOTE))
    }
}

/// A row of the `v_run_history` view.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunHistoryRow {
    pub run_id: i64,
    pub run_ts: DateTime<Utc>,
    pub status: String,
    pub universe_size: i32,
    pub candidates_count: Option<i32>,
    pub picks_count: Option<i32>,
    pub notes: Option<String>,
    pub error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
    pub csp_picks: Option<i64>,
    pub cc_picks: Option<i64>,
}

/// Truncates an error message to [`MAX_RUN_ERROR_CHARS`] characters.
#[must_use]
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_RUN_ERROR_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [RunStatus::Running, RunStatus::Success, RunStatus::Failed] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("SUCCESS"), Some(RunStatus::Success));
        assert_eq!(RunStatus::parse("done"), None);
    }

    #[test]
    fn test_truncate_error_limits_characters() {
        let long = "é".repeat(1000);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), MAX_RUN_ERROR_CHARS);
        assert_eq!(truncate_error("boom"), "boom");
    }

    #[test]
    fn test_daily_tracker_detection() {
        let mut run = ScreeningRunRecord {
            run_id: 1,
            run_ts: Utc::now(),
            status: "success".to_string(),
            universe_size: 0,
            candidates_count: None,
            picks_count: None,
            notes: Some("DAILY_TRACKER: account snapshot".to_string()),
            error: None,
            finished_at: None,
        };
        assert!(run.is_daily_tracker());
        assert_eq!(run.run_status(), Some(RunStatus::Success));
        run.notes = Some("OK: candidates written".to_string());
        assert!(!run.is_daily_tracker());
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Provider-reported status of an asynchronous scrape job.
///
/// Matching is exact: the provider reports lowercase statuses, and anything
/// it adds in the future lands in `Other` and is treated as still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Ready,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
            JobStatus::Other(s) => s,
        }
    }

    /// Terminal statuses stop the poll loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "running" => JobStatus::Running,
            "ready" => JobStatus::Ready,
            "failed" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

/// Handle to a scrape job the provider accepted for asynchronous delivery.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotJob {
    pub snapshot_id: String,
    pub created_at: DateTime<Utc>,
}

impl SnapshotJob {
    pub fn new(snapshot_id: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Milliseconds since the job was accepted.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.created_at).num_milliseconds()
    }
}

/// A scrape submission: dataset key plus the input rows to scrape.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRequest {
    pub dataset_key: String,
    pub rows: Vec<serde_json::Value>,
}

impl ScrapeRequest {
    pub fn new(dataset_key: impl Into<String>) -> Self {
        Self {
            dataset_key: dataset_key.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: serde_json::Value) -> Self {
        self.rows.push(row);
        self
    }

    pub fn with_rows(mut self, rows: Vec<serde_json::Value>) -> Self {
        self.rows = rows;
        self
    }
}

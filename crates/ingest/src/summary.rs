//! Per-run accounting.
//!
//! Each platform pipeline owns exactly one [`RunSummary`] and updates it
//! while it runs. When the pipelines finish, the orchestrator combines them
//! with [`RunSummary::merge`], which is a pure function over values: it is
//! associative, has [`RunSummary::empty`] as identity, and is commutative up
//! to the order of collected error reports. Nothing mutates a summary across
//! pipeline boundaries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use orderhub_core::Platform;
use serde::{Deserialize, Serialize};

/// Terminal status of a pipeline or of the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Succeeded,
    Failed,
}

/// Pipeline stage an error was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Fetch,
    Decode,
    Flush,
    /// The pipeline task itself died (panic or runtime failure).
    Task,
    Cancelled,
}

impl ErrorStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Flush => "flush",
            Self::Task => "task",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded problem, fatal or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub platform: Platform,
    pub stage: ErrorStage,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    #[must_use]
    pub fn new(platform: Platform, stage: ErrorStage, message: impl Into<String>) -> Self {
        Self {
            platform,
            stage,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Counters and outcomes for one pipeline, or for the merged run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// Logical page fetches issued (retries of one fetch count once).
    pub api_calls: u64,
    /// Database statements executed across all flushes.
    pub db_operations: u64,
    /// Records dropped before buffering: decode defects plus
    /// placeholder/invalid records.
    pub records_filtered: u64,
    /// Records persisted, per platform.
    pub platform_counts: BTreeMap<Platform, u64>,
    /// Rows inserted or updated, per warehouse table.
    pub table_counts: BTreeMap<String, u64>,
    pub errors: Vec<ErrorReport>,
}

impl RunSummary {
    /// The merge identity: no time bounds, zero counters, succeeded.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A summary whose clock has started.
    #[must_use]
    pub fn begin() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn record_api_call(&mut self) {
        self.api_calls += 1;
    }

    pub fn record_filtered(&mut self, n: u64) {
        self.records_filtered += n;
    }

    /// Account for one successful flush: `records` persisted for `platform`,
    /// `operations` statements executed, rows broken down per table in
    /// `table_counts`.
    pub fn record_flush(
        &mut self,
        platform: Platform,
        records: u64,
        operations: u64,
        table_counts: &BTreeMap<String, u64>,
    ) {
        self.db_operations += operations;
        *self.platform_counts.entry(platform).or_default() += records;
        for (table, n) in table_counts {
            *self.table_counts.entry(table.clone()).or_default() += n;
        }
    }

    /// Record a problem. Non-fatal problems (decode defects) leave the
    /// status alone; callers mark fatal ones with [`Self::mark_failed`].
    pub fn record_error(&mut self, report: ErrorReport) {
        self.errors.push(report);
    }

    pub fn mark_failed(&mut self) {
        self.status = RunStatus::Failed;
    }

    /// Combine two summaries into one.
    ///
    /// Time bounds take the earliest start and latest finish, counters add,
    /// per-key maps add key-wise, errors concatenate, and a failure on
    /// either side makes the result failed.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let started_at = match (self.started_at, other.started_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let finished_at = match (self.finished_at, other.finished_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let status = if self.status == RunStatus::Failed || other.status == RunStatus::Failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };

        let mut platform_counts = self.platform_counts;
        for (platform, n) in other.platform_counts {
            *platform_counts.entry(platform).or_default() += n;
        }
        let mut table_counts = self.table_counts;
        for (table, n) in other.table_counts {
            *table_counts.entry(table).or_default() += n;
        }
        let mut errors = self.errors;
        errors.extend(other.errors);

        Self {
            started_at,
            finished_at,
            status,
            api_calls: self.api_calls + other.api_calls,
            db_operations: self.db_operations + other.db_operations,
            records_filtered: self.records_filtered + other.records_filtered,
            platform_counts,
            table_counts,
            errors,
        }
    }

    /// Total records persisted across platforms.
    #[must_use]
    pub fn records_persisted(&self) -> u64 {
        self.platform_counts.values().sum()
    }
}

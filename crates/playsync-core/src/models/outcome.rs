//! Per-record sync outcomes and run summary

use std::fmt;

use serde::Serialize;

/// What happened to one record during a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SyncOutcome {
    Created,
    Updated,
    /// Remote entity already matched the record
    Skipped,
    Failed(String),
}

impl SyncOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome of a single record, keyed by its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

impl fmt::Display for RecordReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            SyncOutcome::Created => write!(f, "'{}' not found remotely, created", self.name),
            SyncOutcome::Updated => write!(f, "'{}' changed, updated", self.name),
            SyncOutcome::Skipped => write!(f, "'{}' unchanged, skipped", self.name),
            SyncOutcome::Failed(reason) => write!(f, "'{}' failed: {reason}", self.name),
        }
    }
}

/// Aggregate result of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Run was aborted before every record was processed
    pub cancelled: bool,
    pub reports: Vec<RecordReport>,
}

impl SyncSummary {
    pub fn record(&mut self, report: RecordReport) {
        match report.outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Failed(_) => self.failed += 1,
        }
        self.reports.push(report);
    }

    pub const fn processed(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }

    /// Number of remote writes the run issued.
    pub const fn writes(&self) -> usize {
        self.created + self.updated
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Created: {}, Updated: {}, Skipped: {}, Failed: {}",
            self.created, self.updated, self.skipped, self.failed
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

//! Per-unit outcomes and the run summary built from them.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

/// Result of one unit of work (a file, a folder, a variable-year).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum UnitOutcome {
    Processed,
    /// Expected input absent; not a failure.
    Skipped(String),
    /// Structural failure confined to this unit.
    Failed(String),
}

impl UnitOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        UnitOutcome::Skipped(reason.into())
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        UnitOutcome::Failed(error.to_string())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, UnitOutcome::Failed(_))
    }
}

/// A failed unit and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub unit: String,
    pub error: String,
}

/// Counts of outcomes over a run, plus every failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub stage: String,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<UnitFailure>,
}

impl RunSummary {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, unit: impl Into<String>, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Processed => self.processed += 1,
            UnitOutcome::Skipped(_) => self.skipped += 1,
            UnitOutcome::Failed(error) => {
                self.failed += 1;
                self.failures.push(UnitFailure {
                    unit: unit.into(),
                    error,
                });
            }
        }
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Emit the summary as one log event, plus one per failure.
    pub fn log(&self) {
        for failure in &self.failures {
            warn!(stage = %self.stage, unit = %failure.unit, error = %failure.error, "Unit failed");
        }
        info!(
            stage = %self.stage,
            processed = self.processed,
            skipped = self.skipped,
            failed = self.failed,
            "Run complete"
        );
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} processed, {} skipped, {} failed",
            self.stage, self.processed, self.skipped, self.failed
        )
    }
}

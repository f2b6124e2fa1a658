//! Serializable run summary handed to an external reporter.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::batch::outcome::{BatchReport, OutcomeStatus};

/// One identifier that was not deleted, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub identifier: String,
    pub code: String,
    pub reason: String,
    /// Confirmation timed out; the final state is unknown.
    pub timed_out: bool,
}

/// Per-resource-type counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    pub listed: usize,
    pub selected: usize,
    pub deleted: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    /// Cancellation arrived before this type was processed.
    pub cancelled: bool,
    /// Type-level failure (listing error, rejected job); per-identifier
    /// failures live in `failures`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

impl TypeSummary {
    /// Fold one batch report into the totals.
    pub fn absorb(&mut self, report: &BatchReport) {
        for outcome in &report.outcomes {
            match outcome.status() {
                OutcomeStatus::Deleted => self.deleted += 1,
                OutcomeStatus::Skipped => self.skipped += 1,
                OutcomeStatus::Failed => self.failed += 1,
                OutcomeStatus::TimedOut => self.timed_out += 1,
            }
            if let Some(err) = &outcome.error {
                self.failures.push(FailureRecord {
                    identifier: outcome.identifier.clone(),
                    code: err.code().to_string(),
                    reason: err.to_string(),
                    timed_out: err.is_timeout(),
                });
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.failed == 0 && self.timed_out == 0
    }
}

/// Result of one sweep across every selected resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub types: BTreeMap<String, TypeSummary>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn deleted(&self) -> usize {
        self.types.values().map(|t| t.deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.types.values().map(|t| t.failed).sum()
    }

    pub fn timed_out(&self) -> usize {
        self.types.values().map(|t| t.timed_out).sum()
    }

    pub fn skipped(&self) -> usize {
        self.types.values().map(|t| t.skipped).sum()
    }

    /// No type-level error and no failed or timed-out identifier.
    pub fn is_clean(&self) -> bool {
        self.types.values().all(TypeSummary::is_clean)
    }

    pub fn to_json(&self) -> crate::core::errors::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

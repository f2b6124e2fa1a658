//! Per-identifier outcomes and the batch report.

#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::teardown::state::DependencyFailure;

// ──────────────────── provider errors ────────────────────

/// Opaque error returned by an injected provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    /// Provider error code (e.g. `DependencyViolation`), when one exists.
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

// ──────────────────── delete errors ────────────────────

/// Terminal failure for one identifier. Recorded in its outcome, never thrown.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeleteError {
    #[error("[RPR-4001] delete rejected: {0}")]
    Rejected(ProviderError),

    #[error("[RPR-4002] deletion not confirmed within {waited:?}")]
    ConfirmTimeout {
        waited: Duration,
        last_error: Option<ProviderError>,
    },

    #[error("[RPR-4003] {0}")]
    DependencyFailed(DependencyFailure),

    #[error("[RPR-4004] delete operation panicked: {message}")]
    Panicked { message: String },
}

impl DeleteError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "RPR-4001",
            Self::ConfirmTimeout { .. } => "RPR-4002",
            Self::DependencyFailed(_) => "RPR-4003",
            Self::Panicked { .. } => "RPR-4004",
        }
    }

    /// Timeouts leave the resource in an unknown final state.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ConfirmTimeout { .. })
    }
}

impl From<ProviderError> for DeleteError {
    fn from(value: ProviderError) -> Self {
        Self::Rejected(value)
    }
}

// ──────────────────── outcomes ────────────────────

/// Reason an identifier was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DryRun,
    Cancelled,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Coarse classification of an outcome for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Deleted,
    Failed,
    TimedOut,
    Skipped,
}

/// Result for exactly one requested identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionOutcome {
    pub identifier: String,
    pub deleted: bool,
    pub error: Option<DeleteError>,
    pub skipped: Option<SkipReason>,
    /// Wall-clock time spent on this identifier, confirmation wait included.
    pub duration: Duration,
}

impl DeletionOutcome {
    pub fn deleted(identifier: impl Into<String>, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            deleted: true,
            error: None,
            skipped: None,
            duration,
        }
    }

    pub fn failed(identifier: impl Into<String>, error: DeleteError, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            deleted: false,
            error: Some(error),
            skipped: None,
            duration,
        }
    }

    pub fn skipped(identifier: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            identifier: identifier.into(),
            deleted: false,
            error: None,
            skipped: Some(reason),
            duration: Duration::ZERO,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match (&self.error, self.skipped) {
            (Some(err), _) if err.is_timeout() => OutcomeStatus::TimedOut,
            (Some(_), _) => OutcomeStatus::Failed,
            (None, Some(_)) => OutcomeStatus::Skipped,
            (None, None) if self.deleted => OutcomeStatus::Deleted,
            (None, None) => OutcomeStatus::Failed,
        }
    }
}

// ──────────────────── batch report ────────────────────

/// Everything one orchestrator invocation produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub resource_type: String,
    /// One outcome per requested identifier, in request order.
    pub outcomes: Vec<DeletionOutcome>,
    pub duration: Duration,
    pub dry_run: bool,
    /// Cancellation was observed before every chunk was dispatched.
    pub cancelled: bool,
}

impl BatchReport {
    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status() == status).count()
    }

    pub fn deleted(&self) -> usize {
        self.count(OutcomeStatus::Deleted)
    }

    /// Failures other than confirmation timeouts.
    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    pub fn timed_out(&self) -> usize {
        self.count(OutcomeStatus::TimedOut)
    }

    pub fn skipped(&self) -> usize {
        self.count(OutcomeStatus::Skipped)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DeleteError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| (o.identifier.as_str(), e)))
    }

    pub fn outcome(&self, identifier: &str) -> Option<&DeletionOutcome> {
        self.outcomes.iter().find(|o| o.identifier == identifier)
    }
}

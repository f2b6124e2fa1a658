//! Batch job description and its pre-flight validation.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::time::Duration;

use crate::core::errors::{ReaperError, Result};

/// Conservative defaults for providers that throttle aggressively.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_HARD_CEILING: usize = 100;
pub const DEFAULT_CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Fixed-interval polling bounds for asynchronous deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_CONFIRM_POLL_INTERVAL,
            timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }
}

/// Effective pacing knobs for one resource type, resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    pub max_batch_size: usize,
    pub max_concurrency: usize,
    pub hard_ceiling: usize,
    pub confirm: ConfirmPolicy,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            hard_ceiling: DEFAULT_HARD_CEILING,
            confirm: ConfirmPolicy::default(),
        }
    }
}

/// Identifiers of one resource type plus the pacing knobs for deleting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub resource_type: String,
    pub identifiers: Vec<String>,
    pub max_batch_size: usize,
    pub max_concurrency: usize,
    /// Upper bound on identifiers per invocation; exceeding it is an error.
    pub hard_ceiling: usize,
    pub confirm: ConfirmPolicy,
}

impl BatchJob {
    pub fn new<I, S>(resource_type: impl Into<String>, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_type: resource_type.into(),
            identifiers: identifiers.into_iter().map(Into::into).collect(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            hard_ceiling: DEFAULT_HARD_CEILING,
            confirm: ConfirmPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: JobSettings) -> Self {
        self.max_batch_size = settings.max_batch_size;
        self.max_concurrency = settings.max_concurrency;
        self.hard_ceiling = settings.hard_ceiling;
        self.confirm = settings.confirm;
        self
    }

    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    #[must_use]
    pub fn with_hard_ceiling(mut self, ceiling: usize) -> Self {
        self.hard_ceiling = ceiling;
        self
    }

    #[must_use]
    pub fn with_confirm_policy(mut self, confirm: ConfirmPolicy) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Pre-flight checks; all of them run before any deletion is attempted.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_batch_size", self.max_batch_size),
            ("max_concurrency", self.max_concurrency),
            ("hard_ceiling", self.hard_ceiling),
        ] {
            if value == 0 {
                return Err(ReaperError::InvalidConfig {
                    details: format!("{}: {name} must be >= 1", self.resource_type),
                });
            }
        }
        if self.confirm.poll_interval.is_zero() {
            return Err(ReaperError::InvalidConfig {
                details: format!(
                    "{}: confirmation poll interval must be > 0",
                    self.resource_type
                ),
            });
        }

        if self.identifiers.len() > self.hard_ceiling {
            return Err(ReaperError::TooManyResources {
                resource_type: self.resource_type.clone(),
                requested: self.identifiers.len(),
                ceiling: self.hard_ceiling,
            });
        }

        let mut seen = HashSet::with_capacity(self.identifiers.len());
        if let Some(dup) = self.identifiers.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ReaperError::InvalidConfig {
                details: format!("{}: duplicate identifier {dup:?}", self.resource_type),
            });
        }

        Ok(())
    }
}

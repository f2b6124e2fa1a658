//! Sweep runner: list, filter and delete across every selected resource type.
//!
//! Order of work:
//! 1. resolve selected types and compile every policy (bad config aborts here,
//!    before any provider call);
//! 2. per type: list -> policy filter -> jobs of at most `max_batch_size`
//!    identifiers -> orchestrator;
//! 3. fold each batch report into the type's summary.
//!
//! A listing failure is recorded against its own type and the run moves on.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::batch::confirm::guarded;
use crate::batch::job::BatchJob;
use crate::batch::orchestrator::{Orchestrator, millis};
use crate::batch::outcome::DeleteError;
use crate::core::cancel::CancelToken;
use crate::core::config::Config;
use crate::core::errors::{ReaperError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::policy::evaluator::Policy;
use crate::sweep::report::{RunReport, TypeSummary};
use crate::sweep::resource::ResourceType;

pub struct Sweeper {
    config: Config,
    logger: Option<ActivityLoggerHandle>,
    cancel: CancelToken,
    now: Option<DateTime<Utc>>,
}

impl Sweeper {
    pub fn new(config: Config, logger: Option<ActivityLoggerHandle>) -> Self {
        Self {
            config,
            logger,
            cancel: CancelToken::new(),
            now: None,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pin the reference time used by expiry-tag rules. Defaults to the
    /// wall clock at the start of `run`.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sweep every registered type the selection allows.
    ///
    /// Returns `Err` only for configuration-class problems found before any
    /// deletion (invalid pattern, duplicate type name).
    pub fn run(&self, types: &[&dyn ResourceType]) -> Result<RunReport> {
        let start = Instant::now();
        let now = self.now.unwrap_or_else(Utc::now);
        let dry_run = self.config.defaults.dry_run;

        let plan = self.plan(types, now)?;

        self.log_event(ActivityEvent::RunStarted {
            config_hash: self.config.stable_hash()?,
            resource_types: plan.iter().map(|(rt, _)| rt.name().to_string()).collect(),
            dry_run,
        });

        let orchestrator = Orchestrator::new(self.logger.clone())
            .dry_run(dry_run)
            .with_cancel(self.cancel.clone());

        let mut summaries = BTreeMap::new();
        for (resource_type, policy) in &plan {
            let summary = if self.cancel.is_cancelled() {
                TypeSummary {
                    cancelled: true,
                    ..TypeSummary::default()
                }
            } else {
                self.sweep_type(&orchestrator, *resource_type, policy)
            };
            summaries.insert(resource_type.name().to_string(), summary);
        }

        let report = RunReport {
            types: summaries,
            dry_run,
            cancelled: self.cancel.is_cancelled(),
            duration_ms: millis(start.elapsed()),
        };
        self.log_event(ActivityEvent::RunCompleted {
            deleted: report.deleted(),
            failed: report.failed(),
            timed_out: report.timed_out(),
            skipped: report.skipped(),
            duration_ms: report.duration_ms,
        });
        Ok(report)
    }

    /// Selected types paired with their compiled policies.
    fn plan<'a>(
        &self,
        types: &[&'a dyn ResourceType],
        now: DateTime<Utc>,
    ) -> Result<Vec<(&'a dyn ResourceType, Policy)>> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        let mut plan = Vec::new();
        for &resource_type in types {
            let name = resource_type.name();
            if !seen.insert(name) {
                return Err(ReaperError::InvalidConfig {
                    details: format!("resource type {name:?} registered twice"),
                });
            }
            if !self.config.selection.is_selected(name) {
                continue;
            }
            let policy = self.config.policy_for(name, now).inspect_err(|err| {
                self.log_event(ActivityEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
            })?;
            plan.push((resource_type, policy));
        }
        Ok(plan)
    }

    fn sweep_type(
        &self,
        orchestrator: &Orchestrator,
        resource_type: &dyn ResourceType,
        policy: &Policy,
    ) -> TypeSummary {
        let name = resource_type.name();
        let mut summary = TypeSummary::default();

        let candidates = match guarded(|| resource_type.list().map_err(DeleteError::from)) {
            Ok(candidates) => candidates,
            Err(err) => {
                let details = match err {
                    DeleteError::Rejected(provider) => provider.to_string(),
                    other => other.to_string(),
                };
                let err = ReaperError::Enumeration {
                    resource_type: name.to_string(),
                    details,
                };
                self.log_event(ActivityEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                summary.error = Some(err.to_string());
                return summary;
            }
        };

        // Providers occasionally page the same resource twice.
        let mut seen = HashSet::new();
        let identifiers: Vec<String> = policy
            .select(&candidates)
            .into_iter()
            .filter(|c| seen.insert(c.identifier.as_str()))
            .map(|c| c.identifier.clone())
            .collect();

        summary.listed = candidates.len();
        summary.selected = identifiers.len();
        self.log_event(ActivityEvent::ResourcesListed {
            resource_type: name.to_string(),
            listed: summary.listed,
            selected: summary.selected,
        });

        let mut settings = self.config.job_settings_for(name);
        if let Some(limit) = resource_type.max_batch_size() {
            settings.max_batch_size = settings.max_batch_size.min(limit.max(1));
        }

        for chunk in identifiers.chunks(settings.max_batch_size) {
            let job = BatchJob::new(name, chunk.iter().cloned()).with_settings(settings);
            match orchestrator.nuke(&job, resource_type) {
                Ok(report) => summary.absorb(&report),
                Err(err) => {
                    summary.error = Some(err.to_string());
                    break;
                }
            }
        }
        summary
    }

    fn log_event(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

//! Batch deletion orchestrator: ceiling-guarded, bounded-concurrency deletion
//! with per-identifier isolation and optional confirmation waits.
//!
//! Pipeline: validate job (ceiling, knobs, duplicates) -> split into chunks of
//! `max_batch_size` -> per chunk: cancellation check -> bulk or per-identifier
//! dispatch on at most `max_concurrency` workers -> confirmation wait -> log.
//!
//! Guarantees:
//! 1. Nothing is deleted when validation fails.
//! 2. Exactly one outcome per requested identifier, in request order.
//! 3. A failure (error, timeout, panic) only affects its own identifier.
//! 4. Cancellation is observed between chunks, never mid-call.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::batch::confirm::{confirm_only, delete_and_confirm, guarded};
use crate::batch::job::BatchJob;
use crate::batch::operation::DeleteOperation;
use crate::batch::outcome::{
    BatchReport, DeleteError, DeletionOutcome, ProviderError, SkipReason,
};
use crate::batch::pool::run_bounded;
use crate::core::cancel::CancelToken;
use crate::core::errors::Result;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

// ──────────────────── orchestrator ────────────────────

/// Drives one [`BatchJob`] to completion against an injected [`DeleteOperation`].
#[derive(Clone, Default)]
pub struct Orchestrator {
    dry_run: bool,
    cancel: CancelToken,
    logger: Option<ActivityLoggerHandle>,
}

impl Orchestrator {
    /// Create an orchestrator with an optional logger handle.
    pub fn new(logger: Option<ActivityLoggerHandle>) -> Self {
        Self {
            dry_run: false,
            cancel: CancelToken::new(),
            logger,
        }
    }

    /// Report what would be deleted without issuing any delete call.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Delete every identifier in `job`.
    ///
    /// Fails as a whole only when the job is invalid (ceiling exceeded, zero
    /// knobs, duplicate identifiers); in that case no delete call is issued.
    /// Per-identifier failures are returned in the report.
    pub fn nuke<O>(&self, job: &BatchJob, op: &O) -> Result<BatchReport>
    where
        O: DeleteOperation + ?Sized,
    {
        if let Err(err) = job.validate() {
            self.log_event(ActivityEvent::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            });
            return Err(err);
        }

        let start = Instant::now();
        self.log_event(ActivityEvent::BatchStarted {
            resource_type: job.resource_type.clone(),
            identifiers: job.len(),
            dry_run: self.dry_run,
        });

        let mut outcomes = Vec::with_capacity(job.len());
        let mut cancelled = false;

        for chunk in job.identifiers.chunks(job.max_batch_size) {
            if !cancelled && self.cancel.is_cancelled() {
                cancelled = true;
            }

            let chunk_outcomes: Vec<DeletionOutcome> = if cancelled {
                skip_all(chunk, SkipReason::Cancelled)
            } else if self.dry_run {
                skip_all(chunk, SkipReason::DryRun)
            } else if op.supports_bulk_delete() {
                Self::bulk_chunk(job, op, chunk)
            } else {
                Self::dispatch_chunk(job, op, chunk)
            };

            for outcome in &chunk_outcomes {
                self.log_outcome(&job.resource_type, outcome);
            }
            outcomes.extend(chunk_outcomes);
        }

        let report = BatchReport {
            resource_type: job.resource_type.clone(),
            outcomes,
            duration: start.elapsed(),
            dry_run: self.dry_run,
            cancelled,
        };

        self.log_event(ActivityEvent::BatchCompleted {
            resource_type: report.resource_type.clone(),
            deleted: report.deleted(),
            failed: report.failed(),
            timed_out: report.timed_out(),
            skipped: report.skipped(),
            duration_ms: millis(report.duration),
        });

        Ok(report)
    }

    // ──────────────────── dispatch ────────────────────

    /// One worker task per identifier, bounded by `max_concurrency`.
    fn dispatch_chunk<O>(job: &BatchJob, op: &O, chunk: &[String]) -> Vec<DeletionOutcome>
    where
        O: DeleteOperation + ?Sized,
    {
        let confirm = job.confirm;
        run_bounded(chunk.iter().collect(), job.max_concurrency, |id: &String| {
            let started = Instant::now();
            match delete_and_confirm(op, id, &confirm) {
                Ok(()) => DeletionOutcome::deleted(id.as_str(), started.elapsed()),
                Err(err) => DeletionOutcome::failed(id.as_str(), err, started.elapsed()),
            }
        })
    }

    /// A single native bulk call for the chunk, then per-identifier confirmation.
    fn bulk_chunk<O>(job: &BatchJob, op: &O, chunk: &[String]) -> Vec<DeletionOutcome>
    where
        O: DeleteOperation + ?Sized,
    {
        let started = Instant::now();
        let response = guarded(|| op.bulk_delete(chunk).map_err(DeleteError::from));

        let mut by_id: HashMap<String, std::result::Result<(), ProviderError>> = match response {
            Ok(items) => items.into_iter().collect(),
            Err(err) => {
                // Whole-call failure applies to every identifier in the chunk.
                return chunk
                    .iter()
                    .map(|id| DeletionOutcome::failed(id.as_str(), err.clone(), started.elapsed()))
                    .collect();
            }
        };

        let accepted: Vec<(&String, Option<std::result::Result<(), ProviderError>>)> =
            chunk.iter().map(|id| (id, by_id.remove(id))).collect();

        let confirm = job.confirm;
        run_bounded(accepted, job.max_concurrency, |(id, item)| {
            let result = match item {
                Some(Ok(())) => confirm_only(op, id, &confirm),
                Some(Err(err)) => Err(DeleteError::Rejected(err)),
                None => Err(DeleteError::Rejected(ProviderError::new(
                    "bulk delete response omitted this identifier",
                ))),
            };
            match result {
                Ok(()) => DeletionOutcome::deleted(id.as_str(), started.elapsed()),
                Err(err) => DeletionOutcome::failed(id.as_str(), err, started.elapsed()),
            }
        })
    }

    // ──────────────────── logging helpers ────────────────────

    fn log_event(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }

    fn log_outcome(&self, resource_type: &str, outcome: &DeletionOutcome) {
        if self.logger.is_none() {
            return;
        }
        let identifier = outcome.identifier.clone();
        let resource_type = resource_type.to_string();
        let event = match (&outcome.error, outcome.skipped) {
            (Some(DeleteError::ConfirmTimeout { waited, .. }), _) => {
                ActivityEvent::ConfirmationTimedOut {
                    resource_type,
                    identifier,
                    waited_ms: millis(*waited),
                }
            }
            (Some(err), _) => ActivityEvent::ResourceDeletionFailed {
                resource_type,
                identifier,
                error_code: err.code().to_string(),
                error_message: err.to_string(),
            },
            (None, Some(reason)) => ActivityEvent::ResourceSkipped {
                resource_type,
                identifier,
                reason: reason.as_str().to_string(),
            },
            (None, None) => ActivityEvent::ResourceDeleted {
                resource_type,
                identifier,
                duration_ms: millis(outcome.duration),
            },
        };
        self.log_event(event);
    }
}

fn skip_all(chunk: &[String], reason: SkipReason) -> Vec<DeletionOutcome> {
    chunk
        .iter()
        .map(|id| DeletionOutcome::skipped(id.as_str(), reason))
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::job::ConfirmPolicy;
    use crate::batch::operation::{BulkResponse, FnOperation};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("res-{i}")).collect()
    }

    fn fast_confirm() -> ConfirmPolicy {
        ConfirmPolicy {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn deletes_every_identifier() {
        let calls = AtomicUsize::new(0);
        let op = FnOperation::new(|_: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let job = BatchJob::new("sqs-queue", ids(25)).with_max_batch_size(10);

        let report = Orchestrator::new(None).nuke(&job, &op).unwrap();

        assert_eq!(report.outcomes.len(), 25);
        assert_eq!(report.deleted(), 25);
        assert_eq!(calls.load(Ordering::SeqCst), 25);
        let order: Vec<&str> = report.outcomes.iter().map(|o| o.identifier.as_str()).collect();
        assert_eq!(order, job.identifiers.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn ceiling_violation_issues_no_deletes() {
        let calls = AtomicUsize::new(0);
        let op = FnOperation::new(|_: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let job = BatchJob::new("ec2-instance", ids(150)).with_hard_ceiling(100);

        let err = Orchestrator::new(None).nuke(&job, &op).unwrap_err();

        assert_eq!(err.code(), "RPR-2001");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn one_failure_does_not_affect_siblings() {
        let op = FnOperation::new(|id: &str| {
            if id == "res-2" {
                Err(ProviderError::with_code("DependencyViolation", "still attached"))
            } else {
                Ok(())
            }
        });
        let job = BatchJob::new("eip", ids(5));

        let report = Orchestrator::new(None).nuke(&job, &op).unwrap();

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.deleted(), 4);
        assert_eq!(report.failed(), 1);
        let failed = report.outcome("res-2").unwrap();
        assert!(!failed.deleted);
        assert_eq!(failed.error.as_ref().map(DeleteError::code), Some("RPR-4001"));
    }

    #[test]
    fn unconfirmed_delete_times_out() {
        let op = FnOperation::new(|_: &str| Ok(())).with_confirmation(|_: &str| Ok(false));
        let job = BatchJob::new("nat-gateway", ids(2)).with_confirm_policy(fast_confirm());

        let report = Orchestrator::new(None).nuke(&job, &op).unwrap();

        assert_eq!(report.timed_out(), 2);
        assert_eq!(report.deleted(), 0);
    }

    #[test]
    fn dry_run_issues_no_deletes() {
        let calls = AtomicUsize::new(0);
        let op = FnOperation::new(|_: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let job = BatchJob::new("s3-bucket", ids(4));

        let report = Orchestrator::new(None).dry_run(true).nuke(&job, &op).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.skipped(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_before_start_skips_everything() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let op = FnOperation::new(|_: &str| Ok(()));
        let job = BatchJob::new("ebs-volume", ids(6)).with_max_batch_size(2);

        let report = Orchestrator::new(None)
            .with_cancel(cancel)
            .nuke(&job, &op)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.outcomes.len(), 6);
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| o.skipped == Some(SkipReason::Cancelled))
        );
    }

    #[test]
    fn cancellation_between_chunks_keeps_finished_chunk() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let op = FnOperation::new(move |_: &str| {
            trigger.cancel();
            Ok(())
        });
        let job = BatchJob::new("ebs-volume", ids(6))
            .with_max_batch_size(2)
            .with_max_concurrency(1);

        let report = Orchestrator::new(None)
            .with_cancel(cancel)
            .nuke(&job, &op)
            .unwrap();

        assert_eq!(report.outcomes.len(), 6);
        assert_eq!(report.deleted(), 2);
        assert_eq!(report.skipped(), 4);
    }

    struct BulkOp {
        calls: AtomicUsize,
        reject: &'static str,
        omit: &'static str,
    }

    impl DeleteOperation for BulkOp {
        fn delete(&self, _identifier: &str) -> std::result::Result<(), DeleteError> {
            panic!("per-identifier delete must not be used with bulk delete");
        }

        fn supports_bulk_delete(&self) -> bool {
            true
        }

        fn bulk_delete(
            &self,
            identifiers: &[String],
        ) -> std::result::Result<BulkResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(identifiers
                .iter()
                .filter(|id| id.as_str() != self.omit)
                .map(|id| {
                    let result = if id == self.reject {
                        Err(ProviderError::new("access denied"))
                    } else {
                        Ok(())
                    };
                    (id.clone(), result)
                })
                .collect())
        }
    }

    #[test]
    fn bulk_delete_yields_one_outcome_per_identifier() {
        let op = BulkOp {
            calls: AtomicUsize::new(0),
            reject: "res-1",
            omit: "res-3",
        };
        let job = BatchJob::new("s3-object", ids(5)).with_max_batch_size(5);

        let report = Orchestrator::new(None).nuke(&job, &op).unwrap();

        assert_eq!(op.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.deleted(), 3);
        assert_eq!(report.failed(), 2);
        assert!(report.outcome("res-3").unwrap().error.is_some());
    }

    #[test]
    fn bulk_whole_call_failure_fails_chunk_only() {
        struct FailingBulk;
        impl DeleteOperation for FailingBulk {
            fn delete(&self, _: &str) -> std::result::Result<(), DeleteError> {
                Ok(())
            }
            fn supports_bulk_delete(&self) -> bool {
                true
            }
            fn bulk_delete(
                &self,
                identifiers: &[String],
            ) -> std::result::Result<BulkResponse, ProviderError> {
                if identifiers.iter().any(|id| id == "res-0") {
                    Err(ProviderError::with_code("Throttling", "rate exceeded"))
                } else {
                    Ok(identifiers.iter().map(|id| (id.clone(), Ok(()))).collect())
                }
            }
        }

        let job = BatchJob::new("s3-object", ids(4)).with_max_batch_size(2);
        let report = Orchestrator::new(None).nuke(&job, &FailingBulk).unwrap();

        assert_eq!(report.failed(), 2);
        assert_eq!(report.deleted(), 2);
    }

    #[test]
    fn outcomes_are_logged() {
        let (handle, rx) = ActivityLoggerHandle::channel(64);
        let op = FnOperation::new(|id: &str| {
            if id == "res-0" {
                Err(ProviderError::new("nope"))
            } else {
                Ok(())
            }
        });
        let job = BatchJob::new("iam-role", ids(2));

        Orchestrator::new(Some(handle)).nuke(&job, &op).unwrap();

        let events: Vec<ActivityEvent> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ActivityEvent::BatchStarted { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ActivityEvent::ResourceDeletionFailed { identifier, .. } if identifier == "res-0"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ActivityEvent::ResourceDeleted { identifier, .. } if identifier == "res-1"
        )));
        assert!(matches!(
            events.last(),
            Some(ActivityEvent::BatchCompleted {
                deleted: 1,
                failed: 1,
                ..
            })
        ));
    }
}

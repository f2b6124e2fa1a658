//! Composite resource teardown: children before parent.
//!
//! Child collections are enumerated first. Kinds that tolerate concurrent
//! mutation are deleted together on a bounded pool; kinds that do not are
//! deleted one at a time, each confirmed before the next is issued. The
//! parent delete is issued only after every child is confirmed. Any child
//! failure moves the parent to `Failed` and surfaces as one
//! [`DependencyFailure`].

#![allow(missing_docs)]

use std::thread;

use crate::batch::confirm::{delete_and_confirm, guarded, panic_message};
use crate::batch::job::{ConfirmPolicy, DEFAULT_MAX_CONCURRENCY};
use crate::batch::operation::DeleteOperation;
use crate::batch::outcome::{DeleteError, ProviderError};
use crate::batch::pool::run_bounded;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::teardown::state::{ChildFailure, DependencyFailure, TeardownState};

/// How the provider lets a child kind be mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildMode {
    /// Independent children; deleted concurrently.
    Concurrent,
    /// One mutation at a time per parent; each confirmed before the next.
    Sequential,
}

/// A kind of child sub-resource attached to a parent.
pub trait ChildCollection: DeleteOperation {
    fn kind(&self) -> &str;

    fn mode(&self) -> ChildMode {
        ChildMode::Concurrent
    }

    /// Identifiers of this kind currently attached to `parent`.
    fn list_children(&self, parent: &str) -> Result<Vec<String>, ProviderError>;
}

/// What happened to one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownReport {
    pub parent: String,
    /// Every state visited, starting with `Pending`.
    pub history: Vec<TeardownState>,
    pub children_deleted: usize,
    pub error: Option<DeleteError>,
}

impl TeardownReport {
    pub fn state(&self) -> TeardownState {
        self.history
            .last()
            .copied()
            .unwrap_or(TeardownState::Pending)
    }

    pub fn is_success(&self) -> bool {
        self.state() == TeardownState::ParentConfirmed
    }
}

/// Deletes a parent resource and everything attached to it.
pub struct Teardown<P> {
    parent_op: P,
    children: Vec<Box<dyn ChildCollection>>,
    max_concurrency: usize,
    confirm: ConfirmPolicy,
    logger: Option<ActivityLoggerHandle>,
}

impl<P: DeleteOperation> Teardown<P> {
    pub fn new(parent_op: P) -> Self {
        Self {
            parent_op,
            children: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            confirm: ConfirmPolicy::default(),
            logger: None,
        }
    }

    #[must_use]
    pub fn with_child<C: ChildCollection + 'static>(mut self, collection: C) -> Self {
        self.children.push(Box::new(collection));
        self
    }

    /// Bound on child deletions in flight for one parent, sequential chain
    /// included. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers.max(1);
        self
    }

    /// Confirmation bounds used for both children and the parent.
    #[must_use]
    pub fn with_confirm_policy(mut self, confirm: ConfirmPolicy) -> Self {
        self.confirm = confirm;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Option<ActivityLoggerHandle>) -> Self {
        self.logger = logger;
        self
    }

    /// Tear down `parent`. Never panics on provider failure; the result is in
    /// the report.
    pub fn run(&self, parent: &str) -> TeardownReport {
        let mut track = Tracker::new(parent, self.logger.as_ref());

        // Enumerate everything before touching anything.
        let mut concurrent: Vec<(&dyn ChildCollection, String)> = Vec::new();
        let mut sequential: Vec<(&dyn ChildCollection, Vec<String>)> = Vec::new();
        let mut failures = Vec::new();
        for collection in &self.children {
            let collection: &dyn ChildCollection = collection.as_ref();
            match guarded(|| {
                collection
                    .list_children(parent)
                    .map_err(DeleteError::from)
            }) {
                Ok(ids) => match collection.mode() {
                    ChildMode::Concurrent => {
                        concurrent.extend(ids.into_iter().map(|id| (collection, id)));
                    }
                    ChildMode::Sequential => sequential.push((collection, ids)),
                },
                Err(error) => failures.push(ChildFailure {
                    kind: collection.kind().to_string(),
                    identifier: None,
                    error,
                }),
            }
        }
        if !failures.is_empty() {
            return track.fail_dependency(failures, 0);
        }

        track.advance(TeardownState::ChildrenDeleting);
        let (deleted, failures) = self.delete_children(concurrent, &sequential);
        if !failures.is_empty() {
            return track.fail_dependency(failures, deleted);
        }

        track.advance(TeardownState::ChildrenConfirmed);
        track.advance(TeardownState::ParentDeleting);
        match delete_and_confirm(&self.parent_op, parent, &self.confirm) {
            Ok(()) => {
                track.advance(TeardownState::ParentConfirmed);
                track.finish(deleted, None)
            }
            Err(error) => {
                track.advance(TeardownState::Failed);
                track.finish(deleted, Some(error))
            }
        }
    }

    /// Sequential chains run on one dedicated thread that takes one slot of
    /// `max_concurrency`; the concurrent children share the remaining slots.
    /// With a single slot the chain runs after the pool drains.
    fn delete_children(
        &self,
        concurrent: Vec<(&dyn ChildCollection, String)>,
        sequential: &[(&dyn ChildCollection, Vec<String>)],
    ) -> (usize, Vec<ChildFailure>) {
        let confirm = self.confirm;
        let work = |(collection, id): (&dyn ChildCollection, String)| {
            let result = delete_and_confirm(collection, &id, &confirm);
            (collection.kind().to_string(), id, result)
        };

        let overlap = !sequential.is_empty() && !concurrent.is_empty() && self.max_concurrency > 1;
        let (pooled, chained) = if overlap {
            thread::scope(|scope| {
                let chain = thread::Builder::new()
                    .name("reaper-teardown-seq".to_string())
                    .spawn_scoped(scope, || delete_sequential(sequential, &confirm));

                let pooled = run_bounded(concurrent, self.max_concurrency - 1, work);

                let chained = match chain {
                    Ok(handle) => handle.join().unwrap_or_else(|payload| {
                        (
                            0,
                            vec![ChildFailure {
                                kind: "sequential".to_string(),
                                identifier: None,
                                error: DeleteError::Panicked {
                                    message: panic_message(payload.as_ref()),
                                },
                            }],
                        )
                    }),
                    // No thread available: run the chain here after the pool drains.
                    Err(_) => delete_sequential(sequential, &confirm),
                };
                (pooled, chained)
            })
        } else {
            let pooled = run_bounded(concurrent, self.max_concurrency, work);
            (pooled, delete_sequential(sequential, &confirm))
        };

        let mut deleted = chained.0;
        let mut failures = chained.1;
        for (kind, id, result) in pooled {
            match result {
                Ok(()) => deleted += 1,
                Err(error) => failures.push(ChildFailure {
                    kind,
                    identifier: Some(id),
                    error,
                }),
            }
        }
        (deleted, failures)
    }
}

/// One identifier at a time per collection; a failure ends that collection's
/// chain since the provider would reject the next mutation anyway.
fn delete_sequential(
    chains: &[(&dyn ChildCollection, Vec<String>)],
    confirm: &ConfirmPolicy,
) -> (usize, Vec<ChildFailure>) {
    let mut deleted = 0;
    let mut failures = Vec::new();
    for (collection, ids) in chains {
        for id in ids {
            if let Err(error) = delete_and_confirm(*collection, id, confirm) {
                failures.push(ChildFailure {
                    kind: collection.kind().to_string(),
                    identifier: Some(id.clone()),
                    error,
                });
                break;
            }
            deleted += 1;
        }
    }
    (deleted, failures)
}

/// Composite resources plug into the batch orchestrator like any other type.
impl<P: DeleteOperation> DeleteOperation for Teardown<P> {
    fn delete(&self, identifier: &str) -> Result<(), DeleteError> {
        match self.run(identifier).error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

// ──────────────────── state tracking ────────────────────

struct Tracker<'a> {
    parent: &'a str,
    history: Vec<TeardownState>,
    logger: Option<&'a ActivityLoggerHandle>,
}

impl<'a> Tracker<'a> {
    fn new(parent: &'a str, logger: Option<&'a ActivityLoggerHandle>) -> Self {
        Self {
            parent,
            history: vec![TeardownState::Pending],
            logger,
        }
    }

    fn current(&self) -> TeardownState {
        self.history
            .last()
            .copied()
            .unwrap_or(TeardownState::Pending)
    }

    fn advance(&mut self, next: TeardownState) {
        let from = self.current();
        debug_assert!(from.can_transition_to(next), "{from} -> {next}");
        if let Some(logger) = self.logger {
            logger.send(ActivityEvent::TeardownTransition {
                parent: self.parent.to_string(),
                from: from.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.history.push(next);
    }

    fn fail_dependency(mut self, failures: Vec<ChildFailure>, deleted: usize) -> TeardownReport {
        let stage = self.current();
        self.advance(TeardownState::Failed);
        let error = DeleteError::DependencyFailed(DependencyFailure {
            parent: self.parent.to_string(),
            stage,
            failures,
        });
        self.finish(deleted, Some(error))
    }

    fn finish(self, children_deleted: usize, error: Option<DeleteError>) -> TeardownReport {
        TeardownReport {
            parent: self.parent.to_string(),
            history: self.history,
            children_deleted,
            error,
        }
    }
}

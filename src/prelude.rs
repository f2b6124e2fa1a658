//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use resource_reaper::prelude::*;
//! ```

// Core
pub use crate::core::cancel::CancelToken;
pub use crate::core::config::Config;
pub use crate::core::errors::{ReaperError, Result};

// Policy
pub use crate::policy::candidate::Candidate;
pub use crate::policy::evaluator::{Decision, Policy, should_include};
pub use crate::policy::rules::{Rule, RuleSetConfig};

// Batch
pub use crate::batch::job::{BatchJob, ConfirmPolicy, JobSettings};
pub use crate::batch::operation::{BulkResponse, DeleteOperation, FnOperation};
pub use crate::batch::orchestrator::Orchestrator;
pub use crate::batch::outcome::{
    BatchReport, DeleteError, DeletionOutcome, OutcomeStatus, ProviderError, SkipReason,
};

// Teardown
pub use crate::teardown::resolver::{ChildCollection, ChildMode, Teardown, TeardownReport};
pub use crate::teardown::state::{ChildFailure, DependencyFailure, TeardownState};

// Sweep
pub use crate::sweep::report::{FailureRecord, RunReport, TypeSummary};
pub use crate::sweep::resource::ResourceType;
pub use crate::sweep::runner::Sweeper;

// Logging
pub use crate::logger::activity::{
    ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};

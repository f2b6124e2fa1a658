//! Per-parent teardown state machine and the aggregated child failure.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::outcome::DeleteError;

/// Lifecycle of one composite resource.
///
/// `Pending -> ChildrenDeleting -> ChildrenConfirmed -> ParentDeleting ->
/// ParentConfirmed`, or `Failed` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownState {
    Pending,
    ChildrenDeleting,
    ChildrenConfirmed,
    ParentDeleting,
    ParentConfirmed,
    Failed,
}

impl TeardownState {
    /// Whether `next` is a legal successor. Every step is mandatory, so no
    /// transition may skip a confirmation.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::ChildrenDeleting)
                | (Self::ChildrenDeleting, Self::ChildrenConfirmed)
                | (Self::ChildrenConfirmed, Self::ParentDeleting)
                | (Self::ParentDeleting, Self::ParentConfirmed)
                | (
                    Self::Pending
                        | Self::ChildrenDeleting
                        | Self::ChildrenConfirmed
                        | Self::ParentDeleting,
                    Self::Failed
                )
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ParentConfirmed | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ChildrenDeleting => "children_deleting",
            Self::ChildrenConfirmed => "children_confirmed",
            Self::ParentDeleting => "parent_deleting",
            Self::ParentConfirmed => "parent_confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TeardownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One child that could not be listed or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildFailure {
    pub kind: String,
    /// `None` when the child collection itself could not be enumerated.
    pub identifier: Option<String>,
    pub error: DeleteError,
}

impl fmt::Display for ChildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "{}/{id}: {}", self.kind, self.error),
            None => write!(f, "{} (listing): {}", self.kind, self.error),
        }
    }
}

/// Every child failure that blocked a parent delete, aggregated into one error.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyFailure {
    pub parent: String,
    /// State the teardown was in when it gave up.
    pub stage: TeardownState,
    pub failures: Vec<ChildFailure>,
}

impl DependencyFailure {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for DependencyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parent {} not deleted: {} child failure(s) during {}",
            self.parent,
            self.failures.len(),
            self.stage
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DependencyFailure {}

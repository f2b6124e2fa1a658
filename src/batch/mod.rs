//! Batch deletion: job validation, bounded dispatch, confirmation waits and
//! per-identifier outcomes.

pub mod confirm;
pub mod job;
pub mod operation;
pub mod orchestrator;
pub mod outcome;
pub mod pool;

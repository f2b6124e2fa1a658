#![forbid(unsafe_code)]

//! resource_reaper: policy-driven bulk deletion of cloud resources.
//!
//! Three cooperating pieces:
//! 1. **Policy filter**: include/exclude rules over name, creation time and tags
//! 2. **Batch orchestrator**: ceiling-guarded, bounded-concurrency deletion with
//!    per-identifier outcomes and confirmation waits for asynchronous providers
//! 3. **Dependency resolver**: composite teardown, children before parent
//!
//! Provider calls are injected through [`batch::operation::DeleteOperation`] and
//! [`sweep::resource::ResourceType`]; the crate never talks to a cloud API itself.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use resource_reaper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use resource_reaper::core::config::Config;
//! use resource_reaper::policy::evaluator::Policy;
//! ```

pub mod prelude;

pub mod batch;
pub mod core;
pub mod logger;
pub mod policy;
pub mod sweep;
pub mod teardown;

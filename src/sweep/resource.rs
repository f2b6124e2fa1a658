//! The capability every resource type implements.

use crate::batch::operation::DeleteOperation;
use crate::batch::outcome::ProviderError;
use crate::policy::candidate::Candidate;

/// One kind of cloud resource the sweeper can enumerate and delete.
///
/// The sweeper, the policy evaluator and the orchestrator only ever see this
/// trait. Composite resources implement `delete` by delegating to a
/// [`crate::teardown::resolver::Teardown`].
pub trait ResourceType: DeleteOperation {
    /// Stable type name used in configuration and reports (`"nat-gateway"`).
    fn name(&self) -> &str;

    /// Every resource of this type visible to the caller's credentials.
    fn list(&self) -> Result<Vec<Candidate>, ProviderError>;

    /// Provider limit on identifiers per delete pass, if tighter than the
    /// configured one.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }
}

//! The injected deletion capability.

use crate::batch::outcome::{DeleteError, ProviderError};

/// Per-item response of a native bulk-delete call, keyed by identifier.
pub type BulkResponse = Vec<(String, Result<(), ProviderError>)>;

/// Opaque "delete one identifier" operation, plus the optional asynchronous
/// confirmation check and native bulk delete some providers offer.
///
/// Implementations are shared across worker threads.
pub trait DeleteOperation: Send + Sync {
    /// Issue the mutating delete call. Never retried by the orchestrator.
    fn delete(&self, identifier: &str) -> Result<(), DeleteError>;

    /// Whether the provider deletes asynchronously and [`Self::confirm_deleted`]
    /// must be polled after a successful delete call.
    fn confirms_deletion(&self) -> bool {
        false
    }

    /// Read-only status check: `true` once the provider reports the resource gone.
    fn confirm_deleted(&self, identifier: &str) -> Result<bool, ProviderError> {
        let _ = identifier;
        Ok(true)
    }

    /// Whether [`Self::bulk_delete`] replaces per-identifier dispatch.
    fn supports_bulk_delete(&self) -> bool {
        false
    }

    /// Native bulk delete for one chunk. A whole-call error applies to every
    /// identifier in the chunk.
    fn bulk_delete(&self, identifiers: &[String]) -> Result<BulkResponse, ProviderError> {
        let _ = identifiers;
        Err(ProviderError::new("bulk delete is not supported"))
    }
}

/// Closure-backed [`DeleteOperation`].
///
/// ```
/// use resource_reaper::batch::operation::{DeleteOperation, FnOperation};
///
/// let op = FnOperation::new(|_id: &str| Ok(()))
///     .with_confirmation(|_id: &str| Ok(true));
/// assert!(op.confirms_deletion());
/// ```
pub struct FnOperation<D, C = fn(&str) -> Result<bool, ProviderError>> {
    delete: D,
    confirm: Option<C>,
}

impl<D> FnOperation<D>
where
    D: Fn(&str) -> Result<(), ProviderError> + Send + Sync,
{
    pub fn new(delete: D) -> Self {
        Self {
            delete,
            confirm: None,
        }
    }
}

impl<D, C> FnOperation<D, C> {
    /// Attach a confirmation check, making the operation asynchronous.
    pub fn with_confirmation<C2>(self, confirm: C2) -> FnOperation<D, C2>
    where
        C2: Fn(&str) -> Result<bool, ProviderError> + Send + Sync,
    {
        FnOperation {
            delete: self.delete,
            confirm: Some(confirm),
        }
    }
}

impl<D, C> DeleteOperation for FnOperation<D, C>
where
    D: Fn(&str) -> Result<(), ProviderError> + Send + Sync,
    C: Fn(&str) -> Result<bool, ProviderError> + Send + Sync,
{
    fn delete(&self, identifier: &str) -> Result<(), DeleteError> {
        (self.delete)(identifier).map_err(DeleteError::from)
    }

    fn confirms_deletion(&self) -> bool {
        self.confirm.is_some()
    }

    fn confirm_deleted(&self, identifier: &str) -> Result<bool, ProviderError> {
        self.confirm.as_ref().map_or(Ok(true), |check| check(identifier))
    }
}

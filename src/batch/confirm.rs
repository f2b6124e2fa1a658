//! Confirmation wait for asynchronous deletes.
//!
//! The only retry loop in the crate: it re-polls the read-only status check on
//! a fixed interval and never re-issues the mutating delete.

#![allow(missing_docs)]

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crate::batch::job::ConfirmPolicy;
use crate::batch::operation::DeleteOperation;
use crate::batch::outcome::DeleteError;

/// Poll `confirm_deleted` until it reports `true` or `policy.timeout` elapses.
///
/// A status-check error does not end the wait; it is kept and reported with
/// the timeout if the resource never shows as deleted.
pub fn wait_for_deletion<O>(op: &O, identifier: &str, policy: &ConfirmPolicy) -> Result<(), DeleteError>
where
    O: DeleteOperation + ?Sized,
{
    let start = Instant::now();
    // An unrepresentable deadline means waiting without one.
    let deadline = start.checked_add(policy.timeout);
    let mut last_error = None;

    loop {
        match op.confirm_deleted(identifier) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => last_error = Some(err),
        }

        let pause = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(DeleteError::ConfirmTimeout {
                        waited: start.elapsed(),
                        last_error,
                    });
                }
                policy.poll_interval.min(remaining)
            }
            None => policy.poll_interval,
        };
        thread::sleep(pause);
    }
}

/// Delete one identifier and, for asynchronous providers, wait for confirmation.
///
/// A panic inside the injected operation is contained and reported as
/// [`DeleteError::Panicked`] so it cannot take sibling deletions down with it.
pub fn delete_and_confirm<O>(
    op: &O,
    identifier: &str,
    policy: &ConfirmPolicy,
) -> Result<(), DeleteError>
where
    O: DeleteOperation + ?Sized,
{
    guarded(|| {
        op.delete(identifier)?;
        if op.confirms_deletion() {
            wait_for_deletion(op, identifier, policy)?;
        }
        Ok(())
    })
}

/// Confirmation only, for identifiers already accepted by a bulk delete.
pub fn confirm_only<O>(op: &O, identifier: &str, policy: &ConfirmPolicy) -> Result<(), DeleteError>
where
    O: DeleteOperation + ?Sized,
{
    if !op.confirms_deletion() {
        return Ok(());
    }
    guarded(|| wait_for_deletion(op, identifier, policy))
}

/// Run `f`, converting a panic into [`DeleteError::Panicked`].
pub(crate) fn guarded<T, F>(f: F) -> Result<T, DeleteError>
where
    F: FnOnce() -> Result<T, DeleteError>,
{
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(DeleteError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::operation::FnOperation;
    use crate::batch::outcome::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy() -> ConfirmPolicy {
        ConfirmPolicy {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(60),
        }
    }

    #[test]
    fn returns_once_confirmed() {
        let polls = AtomicU32::new(0);
        let op = FnOperation::new(|_: &str| Ok(())).with_confirmation(|_: &str| {
            Ok(polls.fetch_add(1, Ordering::SeqCst) >= 2)
        });
        assert!(wait_for_deletion(&op, "nat-1", &fast_policy()).is_ok());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn never_confirmed_times_out_instead_of_hanging() {
        let op = FnOperation::new(|_: &str| Ok(())).with_confirmation(|_: &str| Ok(false));
        let started = Instant::now();
        let err = wait_for_deletion(&op, "nat-1", &fast_policy()).unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn status_errors_keep_polling_and_surface_on_timeout() {
        let op = FnOperation::new(|_: &str| Ok(()))
            .with_confirmation(|_: &str| Err(ProviderError::with_code("Throttling", "slow down")));
        match wait_for_deletion(&op, "nat-1", &fast_policy()).unwrap_err() {
            DeleteError::ConfirmTimeout { last_error, .. } => {
                assert_eq!(last_error.and_then(|e| e.code).as_deref(), Some("Throttling"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_delete_skips_confirmation() {
        let polls = AtomicU32::new(0);
        let op = FnOperation::new(|_: &str| Err(ProviderError::new("denied"))).with_confirmation(
            |_: &str| {
                polls.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            },
        );
        let err = delete_and_confirm(&op, "x", &fast_policy()).unwrap_err();
        assert_eq!(err.code(), "RPR-4001");
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panic_is_contained() {
        let op = FnOperation::new(|_: &str| -> Result<(), ProviderError> { panic!("sdk exploded") });
        match delete_and_confirm(&op, "x", &fast_policy()).unwrap_err() {
            DeleteError::Panicked { message } => assert_eq!(message, "sdk exploded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn huge_timeout_still_confirms_without_panicking() {
        let polls = AtomicU32::new(0);
        let op = FnOperation::new(|_: &str| Ok(())).with_confirmation(|_: &str| {
            Ok(polls.fetch_add(1, Ordering::SeqCst) >= 1)
        });
        let policy = ConfirmPolicy {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_secs(i64::MAX as u64),
        };
        assert!(delete_and_confirm(&op, "nat-1", &policy).is_ok());
        assert_eq!(polls.load(Ordering::SeqCst), 2);

        let policy = ConfirmPolicy {
            timeout: Duration::MAX,
            ..policy
        };
        assert!(wait_for_deletion(&op, "nat-1", &policy).is_ok());
    }

    #[test]
    fn confirm_only_is_noop_for_synchronous_operations() {
        let op = FnOperation::new(|_: &str| Ok(()));
        assert!(confirm_only(&op, "x", &fast_policy()).is_ok());
    }
}

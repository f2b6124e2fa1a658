//! Run-level cancellation: a shared flag polled between batches.
//!
//! Cancellation never interrupts an issued provider call; the orchestrator and
//! the sweep runner check the flag before dispatching the next chunk or
//! resource type. With the `signals` feature, SIGINT/SIGTERM set the flag via
//! `signal-hook`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "signals")]
use crate::core::errors::{ReaperError, Result};

/// Cheaply cloneable cancellation flag shared by every component of a run.
///
/// `Ordering::Relaxed` is enough: the flag is polled at batch boundaries and
/// carries no data.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Route SIGINT and SIGTERM to this token.
    #[cfg(feature = "signals")]
    pub fn install_signal_handlers(&self) -> Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};

        for (name, signal) in [("SIGINT", SIGINT), ("SIGTERM", SIGTERM)] {
            signal_hook::flag::register(signal, Arc::clone(&self.flag)).map_err(|e| {
                ReaperError::Runtime {
                    details: format!("failed to register {name} handler: {e}"),
                }
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

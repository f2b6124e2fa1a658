#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use resource_reaper::batch::job::ConfirmPolicy;
use resource_reaper::batch::operation::DeleteOperation;
use resource_reaper::batch::outcome::{DeleteError, ProviderError};

pub fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}-{i}")).collect()
}

pub fn fast_confirm() -> ConfirmPolicy {
    ConfirmPolicy {
        poll_interval: Duration::from_millis(2),
        timeout: Duration::from_millis(40),
    }
}

/// Records every call; fails or never confirms the identifiers it is told to.
#[derive(Default)]
pub struct SpyOperation {
    pub delete_calls: AtomicUsize,
    pub confirm_calls: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub reject: HashSet<String>,
    pub never_confirm: HashSet<String>,
    pub panic_on: HashSet<String>,
    pub confirms: bool,
    pub delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl SpyOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, id: &str) -> Self {
        self.reject.insert(id.to_string());
        self
    }

    pub fn stuck(mut self, id: &str) -> Self {
        self.confirms = true;
        self.never_confirm.insert(id.to_string());
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panic_on.insert(id.to_string());
        self
    }

    pub fn confirming(mut self) -> Self {
        self.confirms = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl DeleteOperation for SpyOperation {
    fn delete(&self, identifier: &str) -> Result<(), DeleteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        assert!(
            !self.panic_on.contains(identifier),
            "provider SDK blew up on {identifier}"
        );
        if self.reject.contains(identifier) {
            return Err(ProviderError::with_code("DependencyViolation", "resource in use").into());
        }
        self.deleted.lock().push(identifier.to_string());
        Ok(())
    }

    fn confirms_deletion(&self) -> bool {
        self.confirms
    }

    fn confirm_deleted(&self, identifier: &str) -> Result<bool, ProviderError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.never_confirm.contains(identifier))
    }
}

//! Activity logger: a dedicated thread owns the JSONL writer; every other
//! component holds a cheap [`ActivityLoggerHandle`] and sends
//! [`ActivityEvent`]s over a bounded crossbeam channel.
//!
//! `send()` uses `try_send()`, so a deletion worker is never blocked by
//! logging back-pressure; dropped events are counted and reported by the
//! logger thread.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{ReaperError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

/// Events between recovery attempts while the writer is degraded.
const RECOVERY_INTERVAL: u64 = 256;

// ──────────────────── public event type ────────────────────

/// Everything the deletion core reports while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    RunStarted {
        config_hash: String,
        resource_types: Vec<String>,
        dry_run: bool,
    },
    RunCompleted {
        deleted: usize,
        failed: usize,
        timed_out: usize,
        skipped: usize,
        duration_ms: u64,
    },
    ResourcesListed {
        resource_type: String,
        listed: usize,
        selected: usize,
    },
    BatchStarted {
        resource_type: String,
        identifiers: usize,
        dry_run: bool,
    },
    BatchCompleted {
        resource_type: String,
        deleted: usize,
        failed: usize,
        timed_out: usize,
        skipped: usize,
        duration_ms: u64,
    },
    ResourceDeleted {
        resource_type: String,
        identifier: String,
        duration_ms: u64,
    },
    ResourceDeletionFailed {
        resource_type: String,
        identifier: String,
        error_code: String,
        error_message: String,
    },
    ConfirmationTimedOut {
        resource_type: String,
        identifier: String,
        waited_ms: u64,
    },
    ResourceSkipped {
        resource_type: String,
        identifier: String,
        reason: String,
    },
    TeardownTransition {
        parent: String,
        from: String,
        to: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Handle plus the raw receiving end, for callers that forward events to
    /// their own reporter instead of the JSONL thread.
    pub fn channel(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Send an event. Non-blocking; a full channel drops the event and bumps
    /// the dropped-events counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks only if the channel is full.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── spawn ────────────────────

/// Options for the logger thread.
pub struct ActivityLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl Default for ActivityLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Spawn the logger thread and return a handle to it.
///
/// The thread runs until `handle.shutdown()` is called or every handle is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (handle, rx) = ActivityLoggerHandle::channel(config.channel_capacity);
    let dropped = Arc::clone(&handle.dropped_events);

    let join = thread::Builder::new()
        .name("reaper-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config.jsonl, &dropped))
        .map_err(|e| ReaperError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl_config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(jsonl_config);
    let mut processed: u64 = 0;

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        jsonl.write_entry(&event_to_log_entry(&event));

        processed += 1;
        if processed % RECOVERY_INTERVAL == 0 && jsonl.is_degraded() {
            jsonl.try_recover();
        }
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

fn count(n: usize) -> Option<u64> {
    Some(n as u64)
}

#[allow(clippy::too_many_lines)]
pub(crate) fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::RunStarted {
            config_hash,
            resource_types,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::RunStart, Severity::Info);
            e.count = count(resource_types.len());
            e.details = Some(format!(
                "config_hash={config_hash} dry_run={dry_run} types={}",
                resource_types.join(",")
            ));
            e
        }
        ActivityEvent::RunCompleted {
            deleted,
            failed,
            timed_out,
            skipped,
            duration_ms,
        } => {
            let severity = if failed + timed_out > 0 {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new(EventType::RunComplete, severity);
            e.count = count(*deleted);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(failed + timed_out == 0);
            e.details = Some(format!(
                "deleted={deleted} failed={failed} timed_out={timed_out} skipped={skipped}"
            ));
            e
        }
        ActivityEvent::ResourcesListed {
            resource_type,
            listed,
            selected,
        } => {
            let mut e = LogEntry::new(EventType::ResourceList, Severity::Info);
            e.resource_type = Some(resource_type.clone());
            e.count = count(*selected);
            e.details = Some(format!("listed={listed} selected={selected}"));
            e
        }
        ActivityEvent::BatchStarted {
            resource_type,
            identifiers,
            dry_run,
        } => {
            let mut e = LogEntry::new(EventType::BatchStart, Severity::Info);
            e.resource_type = Some(resource_type.clone());
            e.count = count(*identifiers);
            e.details = Some(format!("dry_run={dry_run}"));
            e
        }
        ActivityEvent::BatchCompleted {
            resource_type,
            deleted,
            failed,
            timed_out,
            skipped,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::BatchComplete, Severity::Info);
            e.resource_type = Some(resource_type.clone());
            e.count = count(*deleted);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(failed + timed_out == 0);
            e.details = Some(format!(
                "deleted={deleted} failed={failed} timed_out={timed_out} skipped={skipped}"
            ));
            e
        }
        ActivityEvent::ResourceDeleted {
            resource_type,
            identifier,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::ResourceDelete, Severity::Info);
            e.resource_type = Some(resource_type.clone());
            e.identifier = Some(identifier.clone());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::ResourceDeletionFailed {
            resource_type,
            identifier,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::ResourceDelete, Severity::Warning);
            e.resource_type = Some(resource_type.clone());
            e.identifier = Some(identifier.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::ConfirmationTimedOut {
            resource_type,
            identifier,
            waited_ms,
        } => {
            let mut e = LogEntry::new(EventType::ConfirmTimeout, Severity::Warning);
            e.resource_type = Some(resource_type.clone());
            e.identifier = Some(identifier.clone());
            e.duration_ms = Some(*waited_ms);
            e.ok = Some(false);
            e.error_code = Some("RPR-4002".to_string());
            e
        }
        ActivityEvent::ResourceSkipped {
            resource_type,
            identifier,
            reason,
        } => {
            let mut e = LogEntry::new(EventType::ResourceSkip, Severity::Info);
            e.resource_type = Some(resource_type.clone());
            e.identifier = Some(identifier.clone());
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::TeardownTransition { parent, from, to } => {
            let severity = if to == "failed" {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new(EventType::TeardownTransition, severity);
            e.identifier = Some(parent.clone());
            e.details = Some(format!("{from}->{to}"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        // Handled by the thread loop before conversion.
        ActivityEvent::Shutdown => LogEntry::new(EventType::RunComplete, Severity::Info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn full_channel_drops_and_counts() {
        let (handle, rx) = ActivityLoggerHandle::channel(1);
        handle.send(ActivityEvent::Error {
            code: "RPR-3900".to_string(),
            message: "first".to_string(),
        });
        handle.send(ActivityEvent::Error {
            code: "RPR-3900".to_string(),
            message: "second".to_string(),
        });
        assert_eq!(handle.dropped_events(), 1);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn logger_thread_writes_jsonl_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let (handle, join) = spawn_logger(ActivityLoggerConfig {
            jsonl: JsonlConfig {
                path: path.clone(),
                fallback_path: None,
                max_size_bytes: 1024 * 1024,
                max_rotated_files: 2,
                fsync_interval_secs: 60,
            },
            channel_capacity: 16,
        })
        .unwrap();

        handle.send(ActivityEvent::ResourceDeleted {
            resource_type: "ebs-volume".to_string(),
            identifier: "vol-1".to_string(),
            duration_ms: 12,
        });
        handle.send(ActivityEvent::ConfirmationTimedOut {
            resource_type: "nat-gateway".to_string(),
            identifier: "nat-1".to_string(),
            waited_ms: 900_000,
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let events: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "resource_delete");
        assert_eq!(events[0]["ok"], true);
        assert_eq!(events[1]["event"], "confirm_timeout");
        assert_eq!(events[1]["error_code"], "RPR-4002");
    }

    #[test]
    fn failed_teardown_transition_is_a_warning() {
        let entry = event_to_log_entry(&ActivityEvent::TeardownTransition {
            parent: "cluster-1".to_string(),
            from: "children_deleting".to_string(),
            to: "failed".to_string(),
        });
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.details.as_deref(), Some("children_deleting->failed"));
    }

    #[test]
    fn run_completed_with_failures_is_not_ok() {
        let entry = event_to_log_entry(&ActivityEvent::RunCompleted {
            deleted: 3,
            failed: 1,
            timed_out: 0,
            skipped: 0,
            duration_ms: 10,
        });
        assert_eq!(entry.ok, Some(false));
        assert_eq!(entry.count, Some(3));
    }
}

//! Activity log as JSON Lines.
//!
//! Every entry is serialized to one buffer ending in `\n` and handed to the
//! file in a single `write_all`, so readers tailing the file only see whole
//! lines. When the primary file cannot be written the writer moves to the
//! fallback file, then to stderr (prefixed `[RPR-JSONL]`), then drops lines.
//! Logging never fails a deletion run.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::errors::{ReaperError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types of the deletion activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    RunComplete,
    ResourceList,
    BatchStart,
    BatchComplete,
    ResourceDelete,
    ConfirmTimeout,
    ResourceSkip,
    TeardownTransition,
    Error,
}

/// A single JSONL log entry; everything except `ts`, `event`, `severity` is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Item count the event refers to (identifiers listed, batch size, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            resource_type: None,
            identifier: None,
            count: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the file would grow past this size. Default: 50 MiB.
    pub max_size_bytes: u64,
    /// Rotated files kept. Default: 5.
    pub max_rotated_files: u32,
    /// Seconds between forced fsync calls. Default: 10.
    pub fsync_interval_secs: u64,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        Self {
            path: home
                .join(".local")
                .join("share")
                .join("reaper")
                .join("activity.jsonl"),
            fallback_path: Some(PathBuf::from("/dev/shm/reaper.jsonl")),
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 5,
            fsync_interval_secs: 10,
        }
    }
}

/// Where lines currently go.
enum Sink {
    File {
        out: BufWriter<File>,
        size: u64,
        on_fallback: bool,
    },
    Stderr,
    Discard,
}

const WRITE_BUFFER: usize = 64 * 1024;

pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
    synced_at: SystemTime,
}

impl JsonlWriter {
    /// Never fails: an unusable primary path only lowers the sink.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            sink: Sink::Discard,
            synced_at: SystemTime::now(),
        };
        writer.sink = writer.first_usable_sink(false);
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.write_line(&line);
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[RPR-JSONL] cannot serialize entry: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Sink::File { out, .. } = &mut self.sink {
            let _ = out.flush();
        }
    }

    pub fn fsync(&mut self) {
        if let Sink::File { out, .. } = &mut self.sink {
            let _ = out.flush();
            let _ = out.get_ref().sync_data();
        }
        self.synced_at = SystemTime::now();
    }

    /// `"normal"`, `"fallback"`, `"stderr"` or `"discard"`.
    pub fn state(&self) -> &'static str {
        match &self.sink {
            Sink::File { on_fallback: false, .. } => "normal",
            Sink::File { on_fallback: true, .. } => "fallback",
            Sink::Stderr => "stderr",
            Sink::Discard => "discard",
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self.sink, Sink::File { on_fallback: false, .. })
    }

    /// Reattach to the primary file if it has become writable again.
    pub fn try_recover(&mut self) {
        if !self.is_degraded() {
            return;
        }
        if let Ok(sink) = file_sink(&self.config.path, false) {
            self.flush();
            self.sink = sink;
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if matches!(&self.sink, Sink::File { size, .. } if size + len > self.config.max_size_bytes) {
            self.rotate();
        }

        let failed = match &mut self.sink {
            Sink::File { out, size, .. } => match out.write_all(line.as_bytes()) {
                Ok(()) => {
                    *size += len;
                    false
                }
                Err(_) => true,
            },
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[RPR-JSONL] {line}");
                false
            }
            Sink::Discard => false,
        };

        if failed {
            self.lower_sink();
            self.write_line(line);
        } else if self.synced_at.elapsed().unwrap_or(Duration::ZERO)
            >= Duration::from_secs(self.config.fsync_interval_secs)
        {
            self.fsync();
        }
    }

    /// Primary, then fallback, then stderr. `skip_primary` starts at the fallback.
    fn first_usable_sink(&self, skip_primary: bool) -> Sink {
        let primary = (!skip_primary).then(|| file_sink(&self.config.path, false));
        if let Some(Ok(sink)) = primary {
            return sink;
        }
        if let Some(Ok(sink)) = self
            .config
            .fallback_path
            .as_deref()
            .map(|path| file_sink(path, true))
        {
            return sink;
        }
        let _ = writeln!(io::stderr(), "[RPR-JSONL] no writable log file, logging to stderr");
        Sink::Stderr
    }

    fn lower_sink(&mut self) {
        self.sink = match &self.sink {
            Sink::File { on_fallback: false, .. } => self.first_usable_sink(true),
            Sink::File { on_fallback: true, .. } => Sink::Stderr,
            Sink::Stderr | Sink::Discard => Sink::Discard,
        };
    }

    /// Shift `log.N` to `log.N+1` (dropping the oldest) and start a fresh file.
    fn rotate(&mut self) {
        let on_fallback = match &self.sink {
            Sink::File { on_fallback, .. } => *on_fallback,
            Sink::Stderr | Sink::Discard => return,
        };
        let base = if on_fallback {
            match &self.config.fallback_path {
                Some(path) => path.clone(),
                None => return,
            }
        } else {
            self.config.path.clone()
        };

        self.flush();
        self.sink = Sink::Discard;

        let keep = self.config.max_rotated_files;
        let _ = fs::remove_file(rotated_name(&base, keep));
        for index in (1..keep).rev() {
            let _ = rename(rotated_name(&base, index), rotated_name(&base, index + 1));
        }
        let _ = rename(&base, rotated_name(&base, 1));

        self.sink = match file_sink(&base, on_fallback) {
            Ok(sink) => sink,
            Err(_) if on_fallback => Sink::Stderr,
            Err(_) => self.first_usable_sink(true),
        };
    }
}

// ──────────────────────── helpers ────────────────────────

fn file_sink(path: &Path, on_fallback: bool) -> Result<Sink> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| ReaperError::io(dir, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ReaperError::io(path, source))?;
    let size = file.metadata().map_or(0, |meta| meta.len());
    Ok(Sink::File {
        out: BufWriter::with_capacity(WRITE_BUFFER, file),
        size,
        on_fallback,
    })
}

/// `activity.jsonl` with index 2 is `activity.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────

//! Configuration system: TOML file + env var overrides + conservative defaults.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::job::{
    ConfirmPolicy, DEFAULT_CONFIRM_POLL_INTERVAL, DEFAULT_CONFIRM_TIMEOUT, DEFAULT_HARD_CEILING,
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_CONCURRENCY, JobSettings,
};
use crate::core::errors::{ReaperError, Result};
use crate::logger::jsonl::JsonlConfig;
use crate::policy::evaluator::Policy;
use crate::policy::rules::RuleSetConfig;

/// Full reaper configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub defaults: BatchDefaults,
    pub selection: SelectionConfig,
    pub logging: LoggingConfig,
    /// Per-type overrides and filter policy, keyed by resource type name.
    pub resources: BTreeMap<String, ResourceConfig>,
}

/// Batch knobs applied to every resource type unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchDefaults {
    pub max_batch_size: usize,
    pub max_concurrency: usize,
    pub hard_ceiling: usize,
    pub confirm_poll_interval_secs: u64,
    pub confirm_timeout_secs: u64,
    pub dry_run: bool,
}

/// Which resource types run, plus the tags every policy honors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Empty means every registered type.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// `<tag>=true` always excludes a candidate. Empty disables.
    pub exclusion_tag: String,
    /// Tag holding an RFC 3339 "protect until" time.
    pub expiry_tag: String,
}

/// Activity log destinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

/// Per-resource-type overrides. Unset knobs fall back to `[defaults]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ResourceConfig {
    pub max_batch_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub hard_ceiling: Option<usize>,
    pub confirm_poll_interval_secs: Option<u64>,
    pub confirm_timeout_secs: Option<u64>,
    pub protect_until_expire: bool,
    pub include: RuleSetConfig,
    pub exclude: RuleSetConfig,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            hard_ceiling: DEFAULT_HARD_CEILING,
            confirm_poll_interval_secs: DEFAULT_CONFIRM_POLL_INTERVAL.as_secs(),
            confirm_timeout_secs: DEFAULT_CONFIRM_TIMEOUT.as_secs(),
            dry_run: false,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            exclusion_tag: "reaper-excluded".to_string(),
            expiry_tag: "reaper-after".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let jsonl = JsonlConfig::default();
        Self {
            jsonl_path: jsonl.path,
            fallback_path: jsonl.fallback_path,
            max_size_bytes: jsonl.max_size_bytes,
            max_rotated_files: jsonl.max_rotated_files,
        }
    }
}

impl SelectionConfig {
    /// Whether a resource type takes part in the run. Exclusion wins.
    pub fn is_selected(&self, resource_type: &str) -> bool {
        if self.exclude.iter().any(|t| t == resource_type) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|t| t == resource_type)
    }
}

impl LoggingConfig {
    pub fn to_jsonl_config(&self) -> JsonlConfig {
        JsonlConfig {
            path: self.jsonl_path.clone(),
            fallback_path: self.fallback_path.clone(),
            max_size_bytes: self.max_size_bytes,
            max_rotated_files: self.max_rotated_files,
            ..JsonlConfig::default()
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home.join(".config").join("reaper").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| ReaperError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else if path.is_some() {
            return Err(ReaperError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic hash of the effective config for the run-start log line.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Compile the filter policy for one resource type.
    ///
    /// Types without a `[resources.<type>]` section get an include-everything
    /// policy that still honors the exclusion tag.
    pub fn policy_for(&self, resource_type: &str, now: DateTime<Utc>) -> Result<Policy> {
        let resource = self.resources.get(resource_type);
        let empty = RuleSetConfig::default();
        let (include, exclude) = resource.map_or((&empty, &empty), |r| (&r.include, &r.exclude));
        let expiry_tag = resource
            .filter(|r| r.protect_until_expire)
            .map(|_| self.selection.expiry_tag.as_str());

        Policy::from_config(
            include,
            exclude,
            Some(self.selection.exclusion_tag.as_str()),
            expiry_tag,
            now,
        )
    }

    /// Effective batch knobs for one resource type.
    pub fn job_settings_for(&self, resource_type: &str) -> JobSettings {
        let d = &self.defaults;
        let r = self.resources.get(resource_type);
        let pick = |f: fn(&ResourceConfig) -> Option<usize>, default: usize| {
            r.and_then(f).unwrap_or(default)
        };
        let pick_secs = |f: fn(&ResourceConfig) -> Option<u64>, default: u64| {
            Duration::from_secs(r.and_then(f).unwrap_or(default))
        };

        JobSettings {
            max_batch_size: pick(|r| r.max_batch_size, d.max_batch_size),
            max_concurrency: pick(|r| r.max_concurrency, d.max_concurrency),
            hard_ceiling: pick(|r| r.hard_ceiling, d.hard_ceiling),
            confirm: ConfirmPolicy {
                poll_interval: pick_secs(
                    |r| r.confirm_poll_interval_secs,
                    d.confirm_poll_interval_secs,
                ),
                timeout: pick_secs(|r| r.confirm_timeout_secs, d.confirm_timeout_secs),
            },
        }
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let d = &mut self.defaults;
        set_usize(&mut lookup, "REAPER_MAX_BATCH_SIZE", &mut d.max_batch_size)?;
        set_usize(&mut lookup, "REAPER_MAX_CONCURRENCY", &mut d.max_concurrency)?;
        set_usize(&mut lookup, "REAPER_HARD_CEILING", &mut d.hard_ceiling)?;
        set_u64(
            &mut lookup,
            "REAPER_CONFIRM_POLL_INTERVAL_SECS",
            &mut d.confirm_poll_interval_secs,
        )?;
        set_u64(
            &mut lookup,
            "REAPER_CONFIRM_TIMEOUT_SECS",
            &mut d.confirm_timeout_secs,
        )?;
        if let Some(raw) = lookup("REAPER_DRY_RUN") {
            d.dry_run = parse_env_bool("REAPER_DRY_RUN", &raw)?;
        }

        if let Some(raw) = lookup("REAPER_LOG_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("REAPER_EXCLUSION_TAG") {
            self.selection.exclusion_tag = raw;
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.selection.exclusion_tag = self.selection.exclusion_tag.trim().to_string();
        self.selection.expiry_tag = self.selection.expiry_tag.trim().to_string();
        for list in [&mut self.selection.include, &mut self.selection.exclude] {
            for name in list.iter_mut() {
                *name = name.trim().to_string();
            }
            list.retain(|name| !name.is_empty());
        }
    }

    /// Check every knob and compile every policy so bad patterns fail before
    /// any provider call.
    pub fn validate(&self) -> Result<()> {
        validate_knobs("defaults", &self.job_settings_from_defaults())?;

        for name in self.resources.keys() {
            validate_knobs(&format!("resources.{name}"), &self.job_settings_for(name))?;
        }

        let include: BTreeSet<&str> = self.selection.include.iter().map(String::as_str).collect();
        if let Some(both) = self
            .selection
            .exclude
            .iter()
            .find(|t| include.contains(t.as_str()))
        {
            return Err(ReaperError::InvalidConfig {
                details: format!("selection: {both:?} is both included and excluded"),
            });
        }

        let resource_types: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        for name in resource_types {
            self.policy_for(name, epoch)?;
        }
        Ok(())
    }

    fn job_settings_from_defaults(&self) -> JobSettings {
        let d = &self.defaults;
        JobSettings {
            max_batch_size: d.max_batch_size,
            max_concurrency: d.max_concurrency,
            hard_ceiling: d.hard_ceiling,
            confirm: ConfirmPolicy {
                poll_interval: Duration::from_secs(d.confirm_poll_interval_secs),
                timeout: Duration::from_secs(d.confirm_timeout_secs),
            },
        }
    }
}

/// Longest confirmation wait a config may ask for (24h).
pub const MAX_CONFIRM_TIMEOUT_SECS: u64 = 24 * 60 * 60;

fn validate_knobs(section: &str, settings: &JobSettings) -> Result<()> {
    for (name, value) in [
        ("max_batch_size", settings.max_batch_size),
        ("max_concurrency", settings.max_concurrency),
        ("hard_ceiling", settings.hard_ceiling),
    ] {
        if value == 0 {
            return Err(ReaperError::InvalidConfig {
                details: format!("{section}.{name} must be >= 1"),
            });
        }
    }
    if settings.max_batch_size > settings.hard_ceiling {
        return Err(ReaperError::InvalidConfig {
            details: format!(
                "{section}.max_batch_size ({}) must not exceed hard_ceiling ({})",
                settings.max_batch_size, settings.hard_ceiling
            ),
        });
    }
    if settings.confirm.poll_interval.is_zero() {
        return Err(ReaperError::InvalidConfig {
            details: format!("{section}.confirm_poll_interval_secs must be >= 1"),
        });
    }
    if settings.confirm.timeout < settings.confirm.poll_interval {
        return Err(ReaperError::InvalidConfig {
            details: format!(
                "{section}.confirm_timeout_secs must be >= confirm_poll_interval_secs"
            ),
        });
    }
    if settings.confirm.timeout > Duration::from_secs(MAX_CONFIRM_TIMEOUT_SECS) {
        return Err(ReaperError::InvalidConfig {
            details: format!(
                "{section}.confirm_timeout_secs must be <= {MAX_CONFIRM_TIMEOUT_SECS}"
            ),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_usize<F>(lookup: &mut F, name: &str, slot: &mut usize) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw
            .trim()
            .parse::<usize>()
            .map_err(|error| ReaperError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw
            .trim()
            .parse::<u64>()
            .map_err(|error| ReaperError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| ReaperError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

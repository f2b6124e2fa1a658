//! RPR-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ReaperError>;

/// Top-level error type for configuration-class and run-aborting failures.
///
/// Per-identifier deletion failures never surface here; they are recorded in
/// the identifier's outcome as a [`crate::batch::outcome::DeleteError`].
#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("[RPR-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[RPR-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[RPR-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[RPR-1004] invalid pattern for {rule} rule {pattern:?}: {details}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        details: String,
    },

    #[error(
        "[RPR-2001] too many resources requested at once for {resource_type}: \
         {requested} identifiers exceeds ceiling of {ceiling}"
    )]
    TooManyResources {
        resource_type: String,
        requested: usize,
        ceiling: usize,
    },

    #[error("[RPR-2002] failed to enumerate {resource_type}: {details}")]
    Enumeration {
        resource_type: String,
        details: String,
    },

    #[error("[RPR-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[RPR-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[RPR-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[RPR-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl ReaperError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "RPR-1001",
            Self::MissingConfig { .. } => "RPR-1002",
            Self::ConfigParse { .. } => "RPR-1003",
            Self::InvalidPattern { .. } => "RPR-1004",
            Self::TooManyResources { .. } => "RPR-2001",
            Self::Enumeration { .. } => "RPR-2002",
            Self::Serialization { .. } => "RPR-2101",
            Self::Io { .. } => "RPR-3002",
            Self::ChannelClosed { .. } => "RPR-3003",
            Self::Runtime { .. } => "RPR-3900",
        }
    }

    /// Whether retrying in a later invocation might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Enumeration { .. }
                | Self::Runtime { .. }
        )
    }

    /// Whether the error belongs to the configuration class (aborts before any mutation).
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidPattern { .. }
                | Self::TooManyResources { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for ReaperError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ReaperError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

//! Candidate resources as observed in a provider listing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resource instance observed in a listing pass.
///
/// Built fresh per listing and never mutated afterwards; only the identifier
/// travels on to the orchestrator once the policy decision has been made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider-unique identifier.
    pub identifier: String,
    /// Human label; only consulted by name rules.
    pub name: Option<String>,
    /// Creation time, when the provider exposes one.
    pub created_at: Option<DateTime<Utc>>,
    /// Resource tags (key to value).
    pub tags: HashMap<String, String>,
}

impl Candidate {
    /// Candidate with only an identifier: no name, no creation time, no tags.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: None,
            created_at: None,
            tags: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Tag value for `key`, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

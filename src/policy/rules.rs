//! Matchable predicates: name regex, tag regex, creation-time bounds, expiry tags.
//!
//! Rules compile once (at configuration time) and are then evaluated against
//! every candidate of a run. A rule whose input is missing from the candidate
//! (no name, no such tag, no creation time) never matches.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::core::errors::{ReaperError, Result};
use crate::policy::candidate::Candidate;

/// A single compiled, stateless predicate over a [`Candidate`].
#[derive(Debug, Clone)]
pub enum Rule {
    /// Case-insensitive regex tested against the candidate's name.
    NameMatches(Regex),
    /// Regex tested against the value of tag `key`.
    TagMatches { key: String, pattern: Regex },
    /// Creation time strictly after the bound.
    CreatedAfter(DateTime<Utc>),
    /// Creation time strictly before the bound.
    CreatedBefore(DateTime<Utc>),
    /// Tag `key` holds an RFC 3339 time later than `now` (resource is still protected).
    ProtectedUntil { key: String, now: DateTime<Utc> },
}

impl Rule {
    pub fn name_matches(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| invalid_pattern("name", pattern, &e))?;
        Ok(Self::NameMatches(regex))
    }

    pub fn tag_matches(key: impl Into<String>, pattern: &str) -> Result<Self> {
        let key = key.into();
        let regex =
            Regex::new(pattern).map_err(|e| invalid_pattern(&format!("tag:{key}"), pattern, &e))?;
        Ok(Self::TagMatches {
            key,
            pattern: regex,
        })
    }

    pub const fn created_after(bound: DateTime<Utc>) -> Self {
        Self::CreatedAfter(bound)
    }

    pub const fn created_before(bound: DateTime<Utc>) -> Self {
        Self::CreatedBefore(bound)
    }

    pub fn protected_until(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::ProtectedUntil {
            key: key.into(),
            now,
        }
    }

    /// Evaluate the rule. Pure: same candidate, same answer.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            Self::NameMatches(regex) => candidate
                .name
                .as_deref()
                .is_some_and(|name| regex.is_match(name)),
            Self::TagMatches { key, pattern } => {
                candidate.tag(key).is_some_and(|v| pattern.is_match(v))
            }
            Self::CreatedAfter(bound) => candidate.created_at.is_some_and(|t| t > *bound),
            Self::CreatedBefore(bound) => candidate.created_at.is_some_and(|t| t < *bound),
            Self::ProtectedUntil { key, now } => candidate
                .tag(key)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
                .is_some_and(|until| until.with_timezone(&Utc) > *now),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameMatches(regex) => write!(f, "name~/{}/i", regex.as_str()),
            Self::TagMatches { key, pattern } => write!(f, "tag[{key}]~/{}/", pattern.as_str()),
            Self::CreatedAfter(bound) => write!(f, "created>{}", bound.to_rfc3339()),
            Self::CreatedBefore(bound) => write!(f, "created<{}", bound.to_rfc3339()),
            Self::ProtectedUntil { key, .. } => write!(f, "protected-until[{key}]"),
        }
    }
}

fn invalid_pattern(rule: &str, pattern: &str, err: &regex::Error) -> ReaperError {
    ReaperError::InvalidPattern {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        details: err.to_string(),
    }
}

// ──────────────────── configuration form ────────────────────

/// Uncompiled rule set as it appears in the configuration file.
///
/// Every listed entry becomes one rule; the set matches a candidate when any
/// one of its rules does.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuleSetConfig {
    pub names_regex: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub time_after: Option<DateTime<Utc>>,
    pub time_before: Option<DateTime<Utc>>,
}

impl RuleSetConfig {
    pub fn is_empty(&self) -> bool {
        self.names_regex.is_empty()
            && self.tags.is_empty()
            && self.time_after.is_none()
            && self.time_before.is_none()
    }

    /// Compile every entry. The first invalid regex aborts with
    /// [`ReaperError::InvalidPattern`].
    pub fn compile(&self) -> Result<Vec<Rule>> {
        let mut rules = Vec::with_capacity(
            self.names_regex.len() + self.tags.len() + 2, // time bounds
        );
        for pattern in &self.names_regex {
            rules.push(Rule::name_matches(pattern)?);
        }
        for (key, pattern) in &self.tags {
            rules.push(Rule::tag_matches(key.clone(), pattern)?);
        }
        if let Some(bound) = self.time_after {
            rules.push(Rule::created_after(bound));
        }
        if let Some(bound) = self.time_before {
            rules.push(Rule::created_before(bound));
        }
        Ok(rules)
    }
}

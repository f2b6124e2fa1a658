//! Include/exclude policy evaluation.
//!
//! Decision order:
//! 1. Any exclude rule matches → excluded (final).
//! 2. Include rules present → included only if at least one matches.
//! 3. Otherwise → included.
//!
//! Each step is an unordered "any match", so rule order within a set never
//! changes the outcome.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};

use crate::core::errors::Result;
use crate::policy::candidate::Candidate;
use crate::policy::rules::{Rule, RuleSetConfig};

/// Why a candidate was or was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Selected for deletion.
    Included,
    /// An exclude rule matched; carries the rule's description.
    Excluded { rule: String },
    /// Include rules exist and none matched.
    NotSelected,
}

impl Decision {
    pub const fn is_included(&self) -> bool {
        matches!(self, Self::Included)
    }
}

/// Compiled include and exclude rule sets for one resource type.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    include: Vec<Rule>,
    exclude: Vec<Rule>,
}

impl Policy {
    pub fn new(include: Vec<Rule>, exclude: Vec<Rule>) -> Self {
        Self { include, exclude }
    }

    /// Empty policy: every candidate is included.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Compile a policy from its configuration form.
    ///
    /// `exclusion_tag` adds an exclude rule for `<tag>=true` (case-insensitive);
    /// `expiry_tag` adds a protect-until rule evaluated against `now`.
    pub fn from_config(
        include: &RuleSetConfig,
        exclude: &RuleSetConfig,
        exclusion_tag: Option<&str>,
        expiry_tag: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let include_rules = include.compile()?;
        let mut exclude_rules = exclude.compile()?;
        if let Some(tag) = exclusion_tag.filter(|t| !t.is_empty()) {
            exclude_rules.push(Rule::tag_matches(tag, r"(?i)^\s*true\s*$")?);
        }
        if let Some(tag) = expiry_tag.filter(|t| !t.is_empty()) {
            exclude_rules.push(Rule::protected_until(tag, now));
        }
        Ok(Self::new(include_rules, exclude_rules))
    }

    #[must_use]
    pub fn with_include(mut self, rule: Rule) -> Self {
        self.include.push(rule);
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, rule: Rule) -> Self {
        self.exclude.push(rule);
        self
    }

    pub fn include_rules(&self) -> &[Rule] {
        &self.include
    }

    pub fn exclude_rules(&self) -> &[Rule] {
        &self.exclude
    }

    /// Full decision with the reason, for logging.
    pub fn evaluate(&self, candidate: &Candidate) -> Decision {
        if let Some(rule) = self.exclude.iter().find(|r| r.matches(candidate)) {
            return Decision::Excluded {
                rule: rule.to_string(),
            };
        }
        if self.include.is_empty() || self.include.iter().any(|r| r.matches(candidate)) {
            Decision::Included
        } else {
            Decision::NotSelected
        }
    }

    pub fn should_include(&self, candidate: &Candidate) -> bool {
        self.evaluate(candidate).is_included()
    }

    /// Keep the included candidates, preserving listing order.
    pub fn select<'a, I>(&self, candidates: I) -> Vec<&'a Candidate>
    where
        I: IntoIterator<Item = &'a Candidate>,
    {
        candidates
            .into_iter()
            .filter(|c| self.should_include(c))
            .collect()
    }
}

/// Free-function form of [`Policy::should_include`].
pub fn should_include(candidate: &Candidate, policy: &Policy) -> bool {
    policy.should_include(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn exclude_name_scenario() {
        let policy = Policy::allow_all().with_exclude(Rule::name_matches("^test-").unwrap());
        let candidates = [
            Candidate::new("1").with_name("test-a"),
            Candidate::new("2").with_name("prod-a"),
        ];
        let decisions: Vec<bool> = candidates
            .iter()
            .map(|c| should_include(c, &policy))
            .collect();
        assert_eq!(decisions, vec![false, true]);
    }

    #[test]
    fn empty_policy_includes_everything() {
        let policy = Policy::allow_all();
        assert!(policy.should_include(&Candidate::new("bare")));
        assert!(policy.should_include(&Candidate::new("named").with_name("anything")));
    }

    #[test]
    fn exclude_beats_include() {
        let policy = Policy::allow_all()
            .with_include(Rule::name_matches("^dev-").unwrap())
            .with_exclude(Rule::name_matches("-keep$").unwrap());

        let c = Candidate::new("x").with_name("dev-db-keep");
        assert_eq!(
            policy.evaluate(&c),
            Decision::Excluded {
                rule: "name~/-keep$/i".to_string()
            }
        );
    }

    #[test]
    fn include_set_narrows() {
        let policy = Policy::allow_all().with_include(Rule::name_matches("^dev-").unwrap());
        assert!(policy.should_include(&Candidate::new("1").with_name("dev-a")));
        assert_eq!(
            policy.evaluate(&Candidate::new("2").with_name("prod-a")),
            Decision::NotSelected
        );
        assert_eq!(
            policy.evaluate(&Candidate::new("3")),
            Decision::NotSelected,
            "unnamed candidate cannot satisfy a name include"
        );
    }

    #[test]
    fn unknown_age_is_never_old_enough() {
        let cutoff = ts("2024-01-01T00:00:00Z");
        let include_old = Policy::allow_all().with_include(Rule::created_before(cutoff));
        let exclude_new = Policy::allow_all().with_exclude(Rule::created_after(cutoff));
        let unknown = Candidate::new("unknown");

        assert!(!include_old.should_include(&unknown));
        assert!(exclude_new.should_include(&unknown));
    }

    #[test]
    fn rule_order_does_not_matter() {
        let a = Rule::name_matches("^a").unwrap();
        let b = Rule::tag_matches("env", "prod").unwrap();
        let forward = Policy::new(vec![a.clone(), b.clone()], vec![b.clone(), a.clone()]);
        let reverse = Policy::new(vec![b.clone(), a.clone()], vec![a, b]);

        for c in [
            Candidate::new("1").with_name("alpha"),
            Candidate::new("2").with_tag("env", "prod"),
            Candidate::new("3").with_name("zeta"),
        ] {
            assert_eq!(forward.should_include(&c), reverse.should_include(&c));
        }
    }

    #[test]
    fn exclusion_tag_and_expiry_tag_from_config() {
        let now = ts("2024-05-01T00:00:00Z");
        let policy = Policy::from_config(
            &RuleSetConfig::default(),
            &RuleSetConfig::default(),
            Some("reaper-excluded"),
            Some("reaper-after"),
            now,
        )
        .unwrap();

        assert!(!policy.should_include(&Candidate::new("1").with_tag("reaper-excluded", "TRUE")));
        assert!(policy.should_include(&Candidate::new("2").with_tag("reaper-excluded", "false")));
        assert!(
            !policy.should_include(
                &Candidate::new("3").with_tag("reaper-after", "2030-01-01T00:00:00Z")
            )
        );
        assert!(
            policy.should_include(
                &Candidate::new("4").with_tag("reaper-after", "2020-01-01T00:00:00Z")
            )
        );
    }

    #[test]
    fn empty_tag_names_add_no_rules() {
        let policy = Policy::from_config(
            &RuleSetConfig::default(),
            &RuleSetConfig::default(),
            Some(""),
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(policy.exclude_rules().is_empty());
        assert!(policy.include_rules().is_empty());
    }

    #[test]
    fn select_preserves_listing_order() {
        let policy = Policy::allow_all().with_exclude(Rule::name_matches("skip").unwrap());
        let listed = vec![
            Candidate::new("1").with_name("a"),
            Candidate::new("2").with_name("skip-me"),
            Candidate::new("3").with_name("b"),
        ];
        let ids: Vec<&str> = policy
            .select(&listed)
            .into_iter()
            .map(|c| c.identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}

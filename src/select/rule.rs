//! Target rule grammar
//!
//! `[+|-]host-glob[:service-glob|^tag-glob]` — a bare host glob implies a
//! service glob of `*`. Globs are case-insensitive shell wildcards.

use crate::error::{FlotillaError, Result};
use regex::Regex;

/// Case-insensitive shell wildcard, compiled to an anchored regex
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    re: Regex,
}

impl Glob {
    /// Compile a wildcard pattern (`*` and `?` supported)
    pub fn new(pattern: &str) -> Result<Self> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push_str("(?i)^");
        for ch in pattern.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                ch => source.push_str(&regex::escape(&ch.to_string())),
            }
        }
        source.push('$');

        let re = Regex::new(&source).map_err(|e| {
            FlotillaError::Config(format!("Invalid glob pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            re,
        })
    }

    /// Test a candidate against the pattern
    pub fn matches(&self, candidate: &str) -> bool {
        self.re.is_match(candidate)
    }

    /// The source pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Whether a rule adds to or subtracts from the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Include,
    Exclude,
}

/// The service-side predicate of a rule
#[derive(Debug, Clone)]
pub enum RuleScope {
    /// Match the service name
    Service(Glob),
    /// Match any of the service's tags
    Tag(Glob),
}

/// One parsed target rule
#[derive(Debug, Clone)]
pub struct TargetRule {
    /// Include or exclude
    pub action: RuleAction,
    /// Host name predicate
    pub host: Glob,
    /// Service-side predicate
    pub scope: RuleScope,
}

impl TargetRule {
    /// Parse one rule from its textual form
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(FlotillaError::Config("Empty target rule".to_string()));
        }

        let (action, rest) = if let Some(rest) = text.strip_prefix('+') {
            (RuleAction::Include, rest)
        } else if let Some(rest) = text.strip_prefix('-') {
            (RuleAction::Exclude, rest)
        } else {
            (RuleAction::Include, text)
        };

        if rest.is_empty() {
            return Err(FlotillaError::Config(format!(
                "Target rule '{}' has no host pattern",
                text
            )));
        }

        let (host_part, scope) = match rest.find([':', '^']) {
            Some(index) => {
                let host_part = &rest[..index];
                let scope_part = &rest[index + 1..];
                if host_part.is_empty() || scope_part.is_empty() {
                    return Err(FlotillaError::Config(format!(
                        "Malformed target rule '{}'",
                        text
                    )));
                }
                let glob = Glob::new(scope_part)?;
                let scope = if rest.as_bytes()[index] == b':' {
                    RuleScope::Service(glob)
                } else {
                    RuleScope::Tag(glob)
                };
                (host_part, scope)
            }
            None => (rest, RuleScope::Service(Glob::new("*")?)),
        };

        Ok(Self {
            action,
            host: Glob::new(host_part)?,
            scope,
        })
    }

    /// Test a (service, host) pair against this rule's predicate
    pub fn matches(&self, service: &str, tags: &std::collections::BTreeSet<String>, host: &str) -> bool {
        if !self.host.matches(host) {
            return false;
        }
        match &self.scope {
            RuleScope::Service(glob) => glob.matches(service),
            RuleScope::Tag(glob) => tags.iter().any(|tag| glob.matches(tag)),
        }
    }
}

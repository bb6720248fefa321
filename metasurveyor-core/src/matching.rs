//! Include/exclude name filtering for catalogs, schemas and tables.
//!
//! A [`MatchingRule`] lists include and exclude patterns; a [`Matcher`] is the
//! compiled, immutable form. Exclusion always wins, and an empty include list
//! means "everything".
//!
//! Patterns are either globs, where `*` matches any run of characters and
//! every other character is literal, or regular expressions used as-is.

use crate::error::{CollectorError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

const MATCHER_SOURCE: &str = "matcher";

/// Syntax of the patterns in a [`MatchingRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// `*` wildcards, anchored to the whole name
    #[default]
    Glob,
    /// Regular expressions, unanchored
    Regex,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternType::Glob => f.write_str("glob"),
            PatternType::Regex => f.write_str("regex"),
        }
    }
}

/// Include and exclude pattern lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingRule {
    /// Names must match one of these; empty accepts everything
    pub include: Vec<String>,
    /// Names matching any of these are rejected
    pub exclude: Vec<String>,
}

impl MatchingRule {
    /// Creates an empty rule that accepts every name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set include patterns.
    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set exclude patterns.
    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Matching rules for every level of the catalog hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Pattern syntax shared by all rules
    pub pattern_type: PatternType,
    /// Compare names case-sensitively
    pub case_sensitive: bool,
    /// Rule for catalogs / databases
    pub databases: MatchingRule,
    /// Rule for schemas
    pub schemas: MatchingRule,
    /// Rule for tables
    pub tables: MatchingRule,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            pattern_type: PatternType::Glob,
            case_sensitive: false,
            databases: MatchingRule::default(),
            schemas: MatchingRule::default(),
            tables: MatchingRule::default(),
        }
    }
}

impl MatchingConfig {
    /// Compiles all three rules.
    ///
    /// # Errors
    /// Returns `INVALID_CONFIG` naming the first malformed pattern.
    pub fn compile(&self) -> Result<CompiledMatching> {
        Ok(CompiledMatching {
            databases: Matcher::new(&self.databases, self.pattern_type, self.case_sensitive)?,
            schemas: Matcher::new(&self.schemas, self.pattern_type, self.case_sensitive)?,
            tables: Matcher::new(&self.tables, self.pattern_type, self.case_sensitive)?,
        })
    }
}

/// Compiled matchers for each level of the catalog hierarchy.
#[derive(Debug, Clone)]
pub struct CompiledMatching {
    /// Catalog / database filter
    pub databases: Matcher,
    /// Schema filter
    pub schemas: Matcher,
    /// Table filter
    pub tables: Matcher,
}

/// Compiled include/exclude predicate over names.
///
/// Immutable after construction and safe to share across tasks.
///
/// # Example
/// ```rust
/// use metasurveyor_core::matching::{Matcher, MatchingRule, PatternType};
///
/// let rule = MatchingRule::new()
///     .with_include(["orders_*", "customers"])
///     .with_exclude(["*_tmp"]);
/// let matcher = Matcher::new(&rule, PatternType::Glob, true).unwrap();
///
/// assert!(matcher.is_match("orders_2024"));
/// assert!(!matcher.is_match("orders_tmp"));
/// assert!(!matcher.is_match("invoices"));
/// ```
#[derive(Debug, Clone)]
pub struct Matcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    pattern_type: PatternType,
    case_sensitive: bool,
}

impl Matcher {
    /// Compiles `rule` for the given pattern syntax.
    ///
    /// # Errors
    /// Returns `INVALID_CONFIG` if a pattern is empty or, for
    /// [`PatternType::Regex`], not a valid regular expression.
    pub fn new(rule: &MatchingRule, pattern_type: PatternType, case_sensitive: bool) -> Result<Self> {
        let compile_all = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|pattern| compile_pattern(pattern, pattern_type, case_sensitive))
                .collect()
        };

        Ok(Self {
            include: compile_all(&rule.include)?,
            exclude: compile_all(&rule.exclude)?,
            pattern_type,
            case_sensitive,
        })
    }

    /// A matcher that accepts every name.
    pub fn match_all() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            pattern_type: PatternType::Glob,
            case_sensitive: true,
        }
    }

    /// Decides whether `name` should be collected.
    pub fn is_match(&self, name: &str) -> bool {
        if self.exclude.iter().any(|pattern| pattern.is_match(name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|pattern| pattern.is_match(name))
    }

    /// Keeps the accepted names, preserving input order.
    pub fn filter<I, S>(&self, names: I) -> Vec<S>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| self.is_match(name.as_ref()))
            .collect()
    }

    /// Pattern syntax this matcher was compiled with.
    pub fn pattern_type(&self) -> PatternType {
        self.pattern_type
    }

    /// Whether names are compared case-sensitively.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::match_all()
    }
}

fn compile_pattern(pattern: &str, pattern_type: PatternType, case_sensitive: bool) -> Result<Regex> {
    if pattern.is_empty() {
        return Err(CollectorError::invalid_config(
            MATCHER_SOURCE,
            "compile_pattern",
            format!("empty {pattern_type} pattern"),
        ));
    }

    let expression = match pattern_type {
        PatternType::Glob => glob_to_regex(pattern),
        PatternType::Regex => pattern.to_string(),
    };

    RegexBuilder::new(&expression)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| {
            CollectorError::invalid_config(
                MATCHER_SOURCE,
                "compile_pattern",
                format!("invalid {pattern_type} pattern '{pattern}'"),
            )
            .with_cause(e)
        })
}

/// Translates a glob into an anchored regular expression.
///
/// Only `*` is special; everything else is escaped.
fn glob_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}

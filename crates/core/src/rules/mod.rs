//! Rule abstraction and shared argument types.
//!
//! A [`Rule`] turns a declared [`RawArgument`] into a typed
//! [`RuleArgument`] once, at scan time, and then evaluates field values
//! against it. Evaluation either settles immediately ([`Evaluation::Pass`] /
//! [`Evaluation::Fail`]) or asks for a remote check
//! ([`Evaluation::Remote`]) that the coordinator carries out.

pub mod builtin;
pub mod catalog;

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::transport::RemoteRequest;

/// A rule argument exactly as declared: either a bare flag or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArgument {
    Flag(bool),
    Text(String),
}

impl Default for RawArgument {
    fn default() -> Self {
        Self::Flag(true)
    }
}

impl RawArgument {
    /// The string form, or `None` for a flag.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Flag(_) => None,
        }
    }
}

/// A rule argument after rule-specific parsing.
#[derive(Debug, Clone)]
pub enum RuleArgument {
    None,
    Range(LengthRange),
    Pattern(Pattern),
    /// Name of another field in the same form.
    FieldName(String),
    /// Remote endpoint identifier (URL or path).
    Endpoint(String),
    /// Free-form argument for custom rules.
    Text(String),
}

/// Inclusive character-count range parsed from `"min..max"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthRange {
    pub min: usize,
    pub max: usize,
}

impl LengthRange {
    /// Parse `"N..M"`. Both bounds must be integers and `N <= M`.
    pub fn parse(rule: &str, source: &str) -> EngineResult<Self> {
        let invalid = |reason: String| EngineError::InvalidArgument {
            rule: rule.to_string(),
            reason,
        };

        let (min, max) = source
            .split_once("..")
            .ok_or_else(|| invalid(format!("expected 'N..M', got '{source}'")))?;
        let min: usize = min
            .trim()
            .parse()
            .map_err(|_| invalid(format!("lower bound '{min}' is not an integer")))?;
        let max: usize = max
            .trim()
            .parse()
            .map_err(|_| invalid(format!("upper bound '{max}' is not an integer")))?;

        if min > max {
            return Err(invalid(format!("lower bound {min} exceeds upper bound {max}")));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: &str) -> bool {
        let len = value.chars().count();
        self.min <= len && len <= self.max
    }
}

/// A compiled regular expression that remembers its declared source.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source` so that it must match the whole value.
    pub fn full(source: &str) -> EngineResult<Self> {
        Self::compile(source, &format!("^(?:{source})$"))
    }

    /// Compile `source` so that a match anywhere in the value counts.
    pub fn search(source: &str) -> EngineResult<Self> {
        Self::compile(source, source)
    }

    fn compile(source: &str, expr: &str) -> EngineResult<Self> {
        let regex = Regex::new(expr).map_err(|e| EngineError::InvalidPattern {
            pattern: source.to_string(),
            source: e,
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Read access to the current values of a form's fields.
pub trait FieldValues {
    fn value_of(&self, name: &str) -> Option<&str>;
}

/// Everything a rule sees when it evaluates one field.
pub struct RuleInput<'a> {
    pub field_name: &'a str,
    pub value: &'a str,
    pub argument: &'a RuleArgument,
    pub values: &'a dyn FieldValues,
}

/// Outcome of evaluating a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Pass,
    /// The rule failed; the strings fill the default message's placeholders.
    Fail(Vec<String>),
    /// The outcome depends on a remote check.
    Remote(RemoteRequest),
}

/// A named, parameterized validity check.
///
/// Implementations are registered once in a [`catalog::RuleCatalog`] and
/// shared by every field that declares them.
pub trait Rule: Send + Sync {
    /// Catalog key; also the key under which failures are recorded.
    fn name(&self) -> &str;

    /// Template rendered with the [`Evaluation::Fail`] arguments when the
    /// declaration carries no message override.
    fn default_message(&self) -> &str;

    /// Validate and convert the declared argument. Called at scan time.
    fn parse_argument(&self, raw: &RawArgument) -> EngineResult<RuleArgument>;

    fn evaluate(&self, input: &RuleInput<'_>) -> Evaluation;
}

impl fmt::Debug for dyn Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rule").field(&self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

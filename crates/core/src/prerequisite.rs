//! Prerequisite gating.
//!
//! A field with a prerequisite runs its rules only while every listed target
//! field holds a value that meets the prerequisite's condition.

use crate::declaration::PrerequisiteDeclaration;
use crate::error::{EngineError, EngineResult};
use crate::field::FieldState;
use crate::rules::builtin::PREREQUISITE_MESSAGE;
use crate::rules::{FieldValues, LengthRange, Pattern};

const PREREQUISITE: &str = "prerequisite";

/// Compiled gate on other fields' values.
#[derive(Debug, Clone)]
pub struct Prerequisite {
    targets: Vec<String>,
    required_value: Option<String>,
    required_format: Option<Pattern>,
    required_length: Option<LengthRange>,
    message: String,
}

impl Prerequisite {
    pub fn from_declaration(decl: &PrerequisiteDeclaration) -> EngineResult<Self> {
        let targets: Vec<String> = decl
            .target
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if targets.is_empty() {
            return Err(EngineError::InvalidArgument {
                rule: PREREQUISITE.to_string(),
                reason: "at least one target field is required".to_string(),
            });
        }

        Ok(Self {
            targets,
            required_value: decl.value.clone(),
            required_format: decl.format.as_deref().map(Pattern::search).transpose()?,
            required_length: decl
                .length
                .as_deref()
                .map(|s| LengthRange::parse(PREREQUISITE, s))
                .transpose()?,
            message: decl
                .message
                .clone()
                .unwrap_or_else(|| PREREQUISITE_MESSAGE.to_string()),
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a single target value meets the condition.
    ///
    /// Any one declared condition holding is enough. With no condition
    /// declared, the target only needs to be non-empty. A missing target
    /// never meets the condition.
    pub fn is_met_by(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };

        if self.required_value.is_none()
            && self.required_format.is_none()
            && self.required_length.is_none()
        {
            return !value.is_empty();
        }

        self.required_value.as_deref() == Some(value)
            || self
                .required_format
                .as_ref()
                .is_some_and(|p| p.is_match(value))
            || self
                .required_length
                .as_ref()
                .is_some_and(|r| r.contains(value))
    }
}

/// Whether `field`'s rules should run given the form's current values.
///
/// Fields without a prerequisite are always eligible. Otherwise every
/// target must meet the condition.
pub fn is_satisfied(field: &FieldState, values: &dyn FieldValues) -> bool {
    match field.prerequisite() {
        None => true,
        Some(prereq) => prereq
            .targets()
            .iter()
            .all(|target| prereq.is_met_by(values.value_of(target))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Per-field validation state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::message::format_message;
use crate::prerequisite::Prerequisite;
use crate::rules::{Rule, RuleArgument};

/// A rule as configured on one field.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub rule: Arc<dyn Rule>,
    pub argument: RuleArgument,
    /// Declared override for the rendered default message.
    pub message: Option<String>,
}

impl RuleConfig {
    pub fn name(&self) -> &str {
        self.rule.name()
    }

    /// The message recorded when this rule fails.
    pub fn failure_message(&self, args: &[String]) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format_message(self.rule.default_message(), args),
        }
    }
}

/// Where a field is in its validation lifecycle.
///
/// `Valid` and `Invalid` are settled for the current input only; the next
/// evaluation may move the field anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    Unvalidated,
    /// No rule has failed but remote checks are outstanding.
    Validating,
    Valid,
    Invalid,
}

/// State of one field in a form.
#[derive(Debug)]
pub struct FieldState {
    name: String,
    value: String,
    rules: Vec<RuleConfig>,
    prerequisite: Option<Prerequisite>,
    validated: bool,
    status: FieldStatus,
    errors: BTreeMap<String, String>,
    pending_async: BTreeSet<String>,
    /// Value each remote rule was last checked against.
    remote_values: HashMap<String, String>,
}

impl FieldState {
    pub(crate) fn new(
        name: String,
        value: String,
        rules: Vec<RuleConfig>,
        prerequisite: Option<Prerequisite>,
    ) -> Self {
        Self {
            name,
            value,
            rules,
            prerequisite,
            validated: false,
            status: FieldStatus::Unvalidated,
            errors: BTreeMap::new(),
            pending_async: BTreeSet::new(),
            remote_values: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn rules(&self) -> &[RuleConfig] {
        &self.rules
    }

    pub fn prerequisite(&self) -> Option<&Prerequisite> {
        self.prerequisite.as_ref()
    }

    /// Whether the field has been evaluated at least once.
    pub fn validated(&self) -> bool {
        self.validated
    }

    pub fn status(&self) -> FieldStatus {
        self.status
    }

    /// `None` until the field has settled for its current input.
    pub fn valid(&self) -> Option<bool> {
        match self.status {
            FieldStatus::Valid => Some(true),
            FieldStatus::Invalid => Some(false),
            FieldStatus::Unvalidated | FieldStatus::Validating => None,
        }
    }

    /// Accumulated failure messages keyed by rule name.
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Whether the field's prerequisite or any of its rules reads the value
    /// of the field called `name`.
    pub fn reads(&self, name: &str) -> bool {
        self.prerequisite
            .as_ref()
            .is_some_and(|p| p.targets().iter().any(|t| t == name))
            || self
                .rules
                .iter()
                .any(|r| matches!(&r.argument, RuleArgument::FieldName(target) if target == name))
    }

    /// Remote rules still awaiting a result.
    pub fn pending_async(&self) -> &BTreeSet<String> {
        &self.pending_async
    }

    pub(crate) fn set_value(&mut self, value: String) {
        self.value = value;
    }

    pub(crate) fn record_failure(&mut self, rule: &str, message: String) {
        self.errors.insert(rule.to_string(), message);
    }

    pub(crate) fn clear_error(&mut self, rule: &str) {
        self.errors.remove(rule);
    }

    pub(crate) fn mark_pending(&mut self, rule: &str) {
        self.pending_async.insert(rule.to_string());
    }

    pub(crate) fn clear_pending(&mut self, rule: &str) {
        self.pending_async.remove(rule);
    }

    /// Whether `rule` was already checked remotely against the current value.
    pub(crate) fn remote_checked(&self, rule: &str) -> bool {
        self.remote_values.get(rule) == Some(&self.value)
    }

    pub(crate) fn note_remote_check(&mut self, rule: &str) {
        self.remote_values.insert(rule.to_string(), self.value.clone());
    }

    pub(crate) fn forget_remote_check(&mut self, rule: &str) {
        self.remote_values.remove(rule);
    }

    /// Settle as vacuously valid: used when the prerequisite is unmet.
    pub(crate) fn reset_vacuous(&mut self) {
        self.errors.clear();
        self.pending_async.clear();
        self.remote_values.clear();
        self.validated = true;
        self.status = FieldStatus::Valid;
    }

    /// Mark the field evaluated and derive its status from errors and
    /// outstanding checks.
    pub(crate) fn refresh_status(&mut self) {
        self.validated = true;
        self.status = if !self.errors.is_empty() {
            FieldStatus::Invalid
        } else if !self.pending_async.is_empty() {
            FieldStatus::Validating
        } else {
            FieldStatus::Valid
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Per-form aggregate state.

use std::collections::HashMap;
use std::fmt;

use crate::field::FieldState;
use crate::rules::FieldValues;

/// Stable identifier of a form within a [`crate::validator::Validator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormId(pub(crate) usize);

/// Stable identifier of a field: its form plus its declaration position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    pub(crate) form: FormId,
    pub(crate) index: usize,
}

impl FieldId {
    pub fn form(&self) -> FormId {
        self.form
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "form#{}", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "form#{}/field#{}", self.form.0, self.index)
    }
}

/// All fields of one form and the form-level verdict.
#[derive(Debug)]
pub struct FormState {
    id: FormId,
    name: String,
    fields: Vec<FieldState>,
    by_name: HashMap<String, usize>,
    validated: bool,
    valid: Option<bool>,
    pending_count: usize,
    /// A submit attempt is waiting for the form to settle.
    submit_requested: bool,
}

impl FormState {
    pub(crate) fn new(id: FormId, name: String, fields: Vec<FieldState>) -> Self {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name().to_string(), i))
            .collect();

        Self {
            id,
            name,
            fields,
            by_name,
            validated: false,
            valid: None,
            pending_count: 0,
            submit_requested: false,
        }
    }

    pub fn id(&self) -> FormId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldState] {
        &self.fields
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.by_name.get(name).map(|&index| FieldId {
            form: self.id,
            index,
        })
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldState> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Whether a submit attempt or explicit form query has run.
    pub fn validated(&self) -> bool {
        self.validated
    }

    /// `None` until validated and while any remote check is outstanding.
    pub fn valid(&self) -> Option<bool> {
        self.valid
    }

    /// Remote checks outstanding across all fields.
    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    pub(crate) fn field(&self, index: usize) -> &FieldState {
        &self.fields[index]
    }

    pub(crate) fn field_mut(&mut self, index: usize) -> &mut FieldState {
        &mut self.fields[index]
    }

    pub(crate) fn mark_validated(&mut self) {
        self.validated = true;
    }

    pub(crate) fn increment_pending(&mut self) {
        self.pending_count += 1;
    }

    /// Decrement the outstanding check count, never below zero.
    ///
    /// Returns `true` only on the transition from one to zero.
    pub(crate) fn decrement_pending(&mut self) -> bool {
        if self.pending_count == 0 {
            return false;
        }
        self.pending_count -= 1;
        self.pending_count == 0
    }

    pub(crate) fn request_submit(&mut self) {
        self.submit_requested = true;
    }

    /// Clear and return the pending-submit flag.
    pub(crate) fn take_submit_request(&mut self) -> bool {
        std::mem::take(&mut self.submit_requested)
    }

    /// Recompute `valid` from the fields. Stays `None` while checks are
    /// outstanding; otherwise `true` iff every field is valid.
    pub(crate) fn aggregate(&mut self) -> Option<bool> {
        self.valid = if self.pending_count > 0 {
            None
        } else {
            Some(self.fields.iter().all(|f| f.valid() == Some(true)))
        };
        self.valid
    }

    /// Indices of the other fields whose outcome depends on `index`'s value.
    pub(crate) fn dependents_of(&self, index: usize) -> Vec<usize> {
        let name = self.fields[index].name();
        self.fields
            .iter()
            .enumerate()
            .filter(|&(i, f)| i != index && f.reads(name))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn invalid_fields(&self) -> impl Iterator<Item = &FieldState> {
        self.fields.iter().filter(|f| f.valid() == Some(false))
    }
}

impl FieldValues for FormState {
    fn value_of(&self, name: &str) -> Option<&str> {
        self.field_by_name(name).map(FieldState::value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

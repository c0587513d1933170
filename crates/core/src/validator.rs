//! Validation orchestrator.
//!
//! [`Validator`] owns every form's state and the [`AsyncCoordinator`]. It
//! turns change events, explicit validity queries and submit attempts into
//! rule evaluations, and applies remote check results as they arrive.
//!
//! Everything runs on the caller's turn: synchronous rules finish before a
//! method returns, remote checks run on spawned tasks whose results are
//! applied when the caller drives [`Validator::process_next`],
//! [`Validator::process_ready`], [`Validator::settle`] or
//! [`Validator::submit`].

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::EngineConfig;
use crate::coordinator::{AsyncCoordinator, Resolution};
use crate::declaration::{FieldDeclaration, FormDeclaration};
use crate::error::{EngineError, EngineResult};
use crate::field::{FieldState, RuleConfig};
use crate::form::{FieldId, FormId, FormState};
use crate::prerequisite::{self, Prerequisite};
use crate::rules::catalog::RuleCatalog;
use crate::rules::{Evaluation, RuleArgument, RuleInput};
use crate::transport::{RemoteRequest, RemoteTransport};

/// What a validity query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Field(FieldId),
    Form(FormId),
}

impl From<FieldId> for Target {
    fn from(id: FieldId) -> Self {
        Self::Field(id)
    }
}

impl From<FormId> for Target {
    fn from(id: FormId) -> Self {
        Self::Form(id)
    }
}

/// Callback told the final verdict of a submit attempt.
pub type SubmitGate = Box<dyn FnMut(bool) + Send>;

/// Result of evaluating one rule, ready to apply to the field.
enum Step {
    Pass(String),
    Fail(String, String),
    Remote {
        rule: String,
        message: String,
        request: RemoteRequest,
    },
}

/// Rule-evaluation engine for a set of forms.
///
/// Field and form IDs are only meaningful for the validator that issued
/// them.
pub struct Validator<T> {
    catalog: RuleCatalog,
    forms: Vec<FormState>,
    form_index: HashMap<String, FormId>,
    coordinator: AsyncCoordinator<T>,
    gates: HashMap<FormId, SubmitGate>,
}

impl<T: RemoteTransport> Validator<T> {
    pub fn new(catalog: RuleCatalog, transport: T, config: &EngineConfig) -> Self {
        Self {
            catalog,
            forms: Vec::new(),
            form_index: HashMap::new(),
            coordinator: AsyncCoordinator::new(transport, config.remote_timeout),
            gates: HashMap::new(),
        }
    }

    /// A validator with the built-in rule catalog.
    pub fn with_builtins(transport: T, config: &EngineConfig) -> Self {
        Self::new(RuleCatalog::with_builtins(), transport, config)
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    // ---- scan ----

    /// Compile a declared form into state.
    ///
    /// Fails on unknown rules, malformed arguments, duplicate names, and
    /// confirmation or prerequisite targets outside the form.
    pub fn add_form(&mut self, decl: &FormDeclaration) -> EngineResult<FormId> {
        if self.form_index.contains_key(&decl.name) {
            return Err(EngineError::DuplicateForm(decl.name.clone()));
        }

        let mut names = HashSet::new();
        for field in &decl.fields {
            if !names.insert(field.name.as_str()) {
                return Err(EngineError::DuplicateField {
                    form: decl.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let fields = decl
            .fields
            .iter()
            .map(|field| self.compile_field(&decl.name, field, &names))
            .collect::<EngineResult<Vec<_>>>()?;

        let id = FormId(self.forms.len());
        tracing::debug!(form = %decl.name, fields = fields.len(), "Registered form");
        self.forms.push(FormState::new(id, decl.name.clone(), fields));
        self.form_index.insert(decl.name.clone(), id);
        Ok(id)
    }

    fn compile_field(
        &self,
        form: &str,
        decl: &FieldDeclaration,
        names: &HashSet<&str>,
    ) -> EngineResult<FieldState> {
        let unknown_field = |field: &str| EngineError::UnknownField {
            form: form.to_string(),
            field: field.to_string(),
        };

        let mut rules = Vec::with_capacity(decl.rules.len());
        for rule_decl in &decl.rules {
            let rule = self.catalog.get(&rule_decl.rule)?;
            let argument = rule.parse_argument(&rule_decl.argument)?;
            if let RuleArgument::FieldName(target) = &argument {
                if !names.contains(target.as_str()) {
                    return Err(unknown_field(target));
                }
            }
            rules.push(RuleConfig {
                rule,
                argument,
                message: rule_decl.message.clone(),
            });
        }

        let prerequisite = decl
            .prerequisite
            .as_ref()
            .map(Prerequisite::from_declaration)
            .transpose()?;
        if let Some(prereq) = &prerequisite {
            if let Some(missing) = prereq.targets().iter().find(|t| !names.contains(t.as_str())) {
                return Err(unknown_field(missing));
            }
        }

        Ok(FieldState::new(
            decl.name.clone(),
            decl.value.clone(),
            rules,
            prerequisite,
        ))
    }

    // ---- lookups ----

    pub fn form_id(&self, name: &str) -> EngineResult<FormId> {
        self.form_index
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownForm(name.to_string()))
    }

    pub fn field_id(&self, form: FormId, name: &str) -> EngineResult<FieldId> {
        let state = self.form(form);
        state.field_id(name).ok_or_else(|| EngineError::UnknownField {
            form: state.name().to_string(),
            field: name.to_string(),
        })
    }

    pub fn form(&self, id: FormId) -> &FormState {
        &self.forms[id.0]
    }

    pub fn forms(&self) -> &[FormState] {
        &self.forms
    }

    pub fn field(&self, id: FieldId) -> &FieldState {
        self.forms[id.form.0].field(id.index)
    }

    /// Accumulated failure messages for a field, keyed by rule name.
    pub fn errors(&self, id: FieldId) -> &BTreeMap<String, String> {
        self.field(id).errors()
    }

    /// Invalid fields of a form: what a suppressed submit re-renders.
    pub fn invalid_fields(&self, id: FormId) -> Vec<&FieldState> {
        self.form(id).invalid_fields().collect()
    }

    // ---- events ----

    /// Record a user-driven value change.
    ///
    /// Before the form has been validated (submitted or queried) the new
    /// value is only stored, unless the field itself was already evaluated.
    /// Fields whose prerequisite or confirmation reads this field are
    /// re-evaluated under the same condition, so a flipped prerequisite
    /// cancels their checks and clears their errors.
    pub fn change(&mut self, id: FieldId, value: impl Into<String>) -> Option<bool> {
        let form = &mut self.forms[id.form.0];
        form.field_mut(id.index).set_value(value.into());

        let form_validated = form.validated();
        let affected: Vec<usize> = std::iter::once(id.index)
            .chain(form.dependents_of(id.index))
            .filter(|&index| form_validated || form.field(index).validated())
            .collect();

        for index in affected {
            self.evaluate_field(FieldId { form: id.form, index });
        }
        self.reaggregate(id.form);
        self.field(id).valid()
    }

    /// Validate the target and return its validity.
    ///
    /// Synchronous rules are re-run on every call. A remote rule is only
    /// re-issued when the field's value differs from the one it was last
    /// checked against, so repeated queries never repeat a remote check.
    pub fn valid(&mut self, target: impl Into<Target>) -> Option<bool> {
        match target.into() {
            Target::Field(id) => {
                self.evaluate_field(id);
                self.reaggregate(id.form);
                self.field(id).valid()
            }
            Target::Form(id) => {
                self.validate_form(id);
                self.form(id).valid()
            }
        }
    }

    /// Register the callback told each submit attempt's final verdict.
    pub fn set_submit_gate(&mut self, form: FormId, gate: impl FnMut(bool) + Send + 'static) {
        self.gates.insert(form, Box::new(gate));
    }

    /// Handle a submit attempt without waiting for remote checks.
    ///
    /// Marks the form validated and evaluates every field. Returns the
    /// verdict if the form settled synchronously; otherwise `None`, and the
    /// submit gate fires once the last outstanding check resolves.
    pub fn submit_attempt(&mut self, form: FormId) -> Option<bool> {
        self.forms[form.0].request_submit();
        self.validate_form(form);
        self.form(form).valid()
    }

    /// Handle a submit attempt and drive remote checks until the form
    /// settles. Returns whether submission may proceed.
    pub async fn submit(&mut self, form: FormId) -> bool {
        if let Some(verdict) = self.submit_attempt(form) {
            return verdict;
        }
        self.settle(form).await.unwrap_or(false)
    }

    // ---- remote results ----

    /// Wait for and apply the next remote check result.
    ///
    /// Returns `false` when no check is in flight.
    pub async fn process_next(&mut self) -> bool {
        match self.coordinator.next_resolution().await {
            Some(resolution) => {
                self.resolve(resolution);
                true
            }
            None => false,
        }
    }

    /// Apply every remote check result already delivered. Returns how many
    /// were taken off the channel.
    pub fn process_ready(&mut self) -> usize {
        let mut processed = 0;
        while let Some(resolution) = self.coordinator.try_next_resolution() {
            self.resolve(resolution);
            processed += 1;
        }
        processed
    }

    /// Drive remote checks until `form` has none outstanding.
    pub async fn settle(&mut self, form: FormId) -> Option<bool> {
        while self.form(form).pending_count() > 0 {
            if !self.process_next().await {
                break;
            }
        }
        self.form(form).valid()
    }

    /// Apply a remote check result. Stale or repeated results are ignored
    /// and return `false`.
    pub fn resolve(&mut self, resolution: Resolution) -> bool {
        match self.coordinator.resolve(&mut self.forms, resolution) {
            Some(resolved) => {
                if !resolved.passed {
                    tracing::debug!(
                        form = %self.form(resolved.field.form).name(),
                        field = %self.field(resolved.field).name(),
                        rule = %resolved.rule,
                        "Remote rule failed",
                    );
                }
                if resolved.form_settled {
                    self.reaggregate(resolved.field.form);
                }
                true
            }
            None => false,
        }
    }

    // ---- internals ----

    fn validate_form(&mut self, form: FormId) {
        self.forms[form.0].mark_validated();
        for index in 0..self.forms[form.0].fields().len() {
            self.evaluate_field(FieldId { form, index });
        }
        self.reaggregate(form);
    }

    /// Run a field's rules in declaration order, or settle it vacuously if
    /// its prerequisite is unmet.
    fn evaluate_field(&mut self, id: FieldId) {
        let form = &mut self.forms[id.form.0];

        if !prerequisite::is_satisfied(form.field(id.index), &*form) {
            self.coordinator.cancel_field(form, id);
            form.field_mut(id.index).reset_vacuous();
            tracing::debug!(
                form = %form.name(),
                field = %form.field(id.index).name(),
                "Prerequisite unmet, skipping rules",
            );
            return;
        }
        if let Some(prereq) = form.field(id.index).prerequisite() {
            tracing::debug!(
                form = %form.name(),
                field = %form.field(id.index).name(),
                requirement = %prereq.message(),
                "Prerequisite met, running rules",
            );
        }

        let steps: Vec<Step> = {
            let field = form.field(id.index);
            field
                .rules()
                .iter()
                .map(|config| {
                    let rule = config.name().to_string();
                    let evaluation = config.rule.evaluate(&RuleInput {
                        field_name: field.name(),
                        value: field.value(),
                        argument: &config.argument,
                        values: &*form,
                    });
                    match evaluation {
                        Evaluation::Pass => Step::Pass(rule),
                        Evaluation::Fail(args) => {
                            let message = config.failure_message(&args);
                            Step::Fail(rule, message)
                        }
                        Evaluation::Remote(request) => Step::Remote {
                            message: config.failure_message(&[]),
                            rule,
                            request,
                        },
                    }
                })
                .collect()
        };

        for step in steps {
            // A rule that settles synchronously no longer waits on an
            // earlier remote check for a previous value.
            if let Step::Pass(rule) | Step::Fail(rule, _) = &step {
                if form.field(id.index).pending_async().contains(rule) {
                    self.coordinator.cancel_check(form, id, rule);
                    form.field_mut(id.index).forget_remote_check(rule);
                }
            }

            match step {
                Step::Pass(rule) => form.field_mut(id.index).clear_error(&rule),
                Step::Fail(rule, message) => {
                    tracing::debug!(
                        form = %form.name(),
                        field = %form.field(id.index).name(),
                        rule = %rule,
                        message = %message,
                        "Rule failed",
                    );
                    form.field_mut(id.index).record_failure(&rule, message);
                }
                Step::Remote {
                    rule,
                    message,
                    request,
                } => {
                    let field = form.field_mut(id.index);
                    if field.remote_checked(&rule) {
                        continue;
                    }
                    field.note_remote_check(&rule);
                    field.clear_error(&rule);
                    self.coordinator.start(form, id, &rule, message, request);
                }
            }
        }

        form.field_mut(id.index).refresh_status();
    }

    /// Recompute a validated form's verdict and, if a submit attempt is
    /// waiting and the form has settled, report it.
    fn reaggregate(&mut self, id: FormId) {
        let form = &mut self.forms[id.0];
        if !form.validated() {
            return;
        }

        let Some(verdict) = form.aggregate() else {
            return;
        };
        if !form.take_submit_request() {
            return;
        }

        if verdict {
            tracing::info!(form = %form.name(), "Form is valid, submission may proceed");
        } else {
            for field in form.invalid_fields() {
                tracing::info!(
                    form = %form.name(),
                    field = %field.name(),
                    errors = ?field.errors(),
                    "Field is invalid",
                );
            }
            tracing::info!(form = %form.name(), "Form is invalid, submission suppressed");
        }

        if let Some(gate) = self.gates.get_mut(&id) {
            gate(verdict);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::declaration::PrerequisiteDeclaration;
    use crate::field::FieldStatus;
    use crate::test_support::{Reply, ScriptedTransport};

    fn validator(transport: ScriptedTransport) -> Validator<ScriptedTransport> {
        Validator::with_builtins(transport, &EngineConfig::default())
    }

    fn login_form(login: &str) -> FormDeclaration {
        FormDeclaration::new("register").field(
            FieldDeclaration::new("login")
                .value(login)
                .flag("presence")
                .rule("lengthRange", "6..20")
                .rule("unique", "/available/login")
                .message("Somebody has already registered using that login name"),
        )
    }

    // -- scan ----------------------------------------------------------------

    #[test]
    fn unknown_rule_fails_at_scan() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("f").field(FieldDeclaration::new("a").flag("lengthWithin"));
        assert_matches!(v.add_form(&decl), Err(EngineError::UnknownRule(_)));
    }

    #[test]
    fn malformed_range_fails_at_scan() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("f").field(FieldDeclaration::new("a").rule("lengthRange", "6to20"));
        assert_matches!(v.add_form(&decl), Err(EngineError::InvalidArgument { .. }));
    }

    #[test]
    fn confirmation_target_must_exist() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("f")
            .field(FieldDeclaration::new("password_confirmation").rule("confirmation", "password"));
        assert_matches!(v.add_form(&decl), Err(EngineError::UnknownField { field, .. }) if field == "password");
    }

    #[test]
    fn prerequisite_target_must_exist() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("f").field(FieldDeclaration::new("a").prerequisite(
            PrerequisiteDeclaration {
                target: "b".into(),
                ..Default::default()
            },
        ));
        assert_matches!(v.add_form(&decl), Err(EngineError::UnknownField { .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut v = validator(ScriptedTransport::new());
        let dup_field = FormDeclaration::new("f")
            .field(FieldDeclaration::new("a"))
            .field(FieldDeclaration::new("a"));
        assert_matches!(v.add_form(&dup_field), Err(EngineError::DuplicateField { .. }));

        v.add_form(&FormDeclaration::new("g")).unwrap();
        assert_matches!(v.add_form(&FormDeclaration::new("g")), Err(EngineError::DuplicateForm(_)));
    }

    #[test]
    fn new_fields_start_unvalidated() {
        let mut v = validator(ScriptedTransport::new());
        let form = v.add_form(&login_form("")).unwrap();
        let login = v.field_id(form, "login").unwrap();
        assert_eq!(v.field(login).status(), FieldStatus::Unvalidated);
        assert_eq!(v.form(form).valid(), None);
        assert!(!v.form(form).validated());
        assert_matches!(v.field_id(form, "nope"), Err(EngineError::UnknownField { .. }));
        assert_matches!(v.form_id("nope"), Err(EngineError::UnknownForm(_)));
    }

    // -- change events -------------------------------------------------------

    #[tokio::test]
    async fn change_before_validation_only_stores_value() {
        let mut v = validator(ScriptedTransport::new());
        let form = v.add_form(&login_form("")).unwrap();
        let login = v.field_id(form, "login").unwrap();

        assert_eq!(v.change(login, "abc"), None);
        assert_eq!(v.field(login).value(), "abc");
        assert!(!v.field(login).validated());
    }

    #[tokio::test(start_paused = true)]
    async fn change_after_submit_revalidates() {
        let transport = ScriptedTransport::new().reply("validname", Reply::Answer(true));
        let mut v = validator(transport);
        let form = v.add_form(&login_form("")).unwrap();
        let login = v.field_id(form, "login").unwrap();

        assert!(!v.submit(form).await);
        assert!(v.errors(login).contains_key("presence"));

        assert_eq!(v.change(login, "validname"), None);
        assert!(v.errors(login).is_empty());
        assert_eq!(v.settle(form).await, Some(true));
        assert_eq!(v.field(login).valid(), Some(true));
    }

    // -- sync rules ----------------------------------------------------------

    #[tokio::test]
    async fn errors_accumulate_across_rules() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("f").field(
            FieldDeclaration::new("code")
                .value("ab")
                .rule("lengthRange", "3..5")
                .rule("format", "[0-9]+"),
        );
        let form = v.add_form(&decl).unwrap();
        let code = v.field_id(form, "code").unwrap();

        assert_eq!(v.valid(code), Some(false));
        let errors = v.errors(code);
        assert_eq!(
            errors.get("lengthRange").map(String::as_str),
            Some("This field needs to be between 3 and 5 characters long")
        );
        assert_eq!(
            errors.get("format").map(String::as_str),
            Some("This value should match the format ‘/[0-9]+/’")
        );
    }

    #[tokio::test]
    async fn fixing_value_clears_errors() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("f")
            .field(FieldDeclaration::new("name").flag("presence"));
        let form = v.add_form(&decl).unwrap();
        let name = v.field_id(form, "name").unwrap();

        assert_eq!(v.valid(form), Some(false));
        v.change(name, "Ada");
        assert_eq!(v.field(name).valid(), Some(true));
        assert_eq!(v.form(form).valid(), Some(true));
    }

    // -- prerequisites -------------------------------------------------------

    fn gated_form(employed: &str) -> FormDeclaration {
        FormDeclaration::new("job")
            .field(FieldDeclaration::new("employed").value(employed))
            .field(
                FieldDeclaration::new("company")
                    .flag("presence")
                    .rule("unique", "/available/company")
                    .prerequisite(PrerequisiteDeclaration {
                        target: "employed".into(),
                        value: Some("yes".into()),
                        ..Default::default()
                    }),
            )
    }

    #[tokio::test]
    async fn unmet_prerequisite_is_vacuously_valid() {
        let transport = ScriptedTransport::new();
        let calls = transport.calls();
        let mut v = validator(transport);
        let form = v.add_form(&gated_form("no")).unwrap();
        let company = v.field_id(form, "company").unwrap();

        assert_eq!(v.valid(company), Some(true));
        assert!(v.errors(company).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(v.valid(form), Some(true));
    }

    #[tokio::test]
    async fn met_prerequisite_runs_rules() {
        let mut v = validator(ScriptedTransport::new());
        let form = v.add_form(&gated_form("yes")).unwrap();
        let company = v.field_id(form, "company").unwrap();

        assert_eq!(v.valid(company), Some(false));
        assert!(v.errors(company).contains_key("presence"));
    }

    #[tokio::test]
    async fn prerequisite_becoming_unmet_cancels_pending_checks() {
        let mut v = validator(ScriptedTransport::new());
        let form = v.add_form(&gated_form("yes")).unwrap();
        let employed = v.field_id(form, "employed").unwrap();
        let company = v.field_id(form, "company").unwrap();

        v.change(company, "Acme");
        assert_eq!(v.valid(form), None);
        assert_eq!(v.form(form).pending_count(), 1);

        v.change(employed, "no");
        assert_eq!(v.valid(company), Some(true));
        assert_eq!(v.form(form).pending_count(), 0);
        assert_eq!(v.form(form).valid(), Some(true));
        assert!(!v.process_next().await);
    }

    #[tokio::test(start_paused = true)]
    async fn flipping_prerequisite_target_clears_dependent_errors() {
        let mut v = validator(ScriptedTransport::new());
        let form = v.add_form(&gated_form("yes")).unwrap();
        let employed = v.field_id(form, "employed").unwrap();
        let company = v.field_id(form, "company").unwrap();

        assert!(!v.submit(form).await);
        assert!(v.errors(company).contains_key("presence"));

        assert_eq!(v.change(employed, "no"), Some(true));
        assert_eq!(v.field(company).valid(), Some(true));
        assert!(v.errors(company).is_empty());
        assert_eq!(v.form(form).valid(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn flipping_prerequisite_during_submit_reports_valid() {
        let transport =
            ScriptedTransport::new().reply("Acme", Reply::Delayed(Duration::from_secs(2), false));
        let mut v = validator(transport);
        let form = v.add_form(&gated_form("yes")).unwrap();
        let employed = v.field_id(form, "employed").unwrap();
        let company = v.field_id(form, "company").unwrap();
        v.change(company, "Acme");

        let verdicts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&verdicts);
        v.set_submit_gate(form, move |valid| sink.lock().unwrap().push(valid));

        assert_eq!(v.submit_attempt(form), None);
        v.change(employed, "no");
        assert_eq!(v.settle(form).await, Some(true));

        tokio::time::sleep(Duration::from_secs(5)).await;
        v.process_ready();
        assert_eq!(*verdicts.lock().unwrap(), vec![true]);
        assert!(v.errors(company).is_empty());
        assert_eq!(v.form(form).valid(), Some(true));
    }

    // -- confirmation dependents ---------------------------------------------

    #[tokio::test]
    async fn changing_confirmed_field_revalidates_confirmation() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("register")
            .field(FieldDeclaration::new("password").value("x"))
            .field(
                FieldDeclaration::new("passwordConfirmation")
                    .value("x")
                    .rule("confirmation", "password"),
            );
        let form = v.add_form(&decl).unwrap();
        let password = v.field_id(form, "password").unwrap();
        let confirmation = v.field_id(form, "passwordConfirmation").unwrap();

        assert!(v.submit(form).await);

        v.change(password, "z");
        assert_eq!(v.form(form).valid(), Some(false));
        assert!(v.errors(confirmation).contains_key("confirmation"));

        v.change(confirmation, "z");
        assert_eq!(v.form(form).valid(), Some(true));
    }

    // -- remote checks -------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn unique_times_out_as_valid() {
        let mut v = validator(ScriptedTransport::new().reply("validname", Reply::Hang));
        let form = v.add_form(&login_form("validname")).unwrap();
        let login = v.field_id(form, "login").unwrap();

        assert_eq!(v.valid(login), None);
        assert!(v.process_next().await);
        assert_eq!(v.field(login).valid(), Some(true));
        assert!(v.errors(login).is_empty());
    }

    #[tokio::test]
    async fn unique_negative_response_marks_invalid() {
        let mut v = validator(ScriptedTransport::new().reply("validname", Reply::Answer(false)));
        let form = v.add_form(&login_form("validname")).unwrap();
        let login = v.field_id(form, "login").unwrap();

        assert!(!v.submit(form).await);
        assert_eq!(v.field(login).valid(), Some(false));
        assert_eq!(
            v.errors(login).get("unique").map(String::as_str),
            Some("Somebody has already registered using that login name")
        );
    }

    #[tokio::test]
    async fn repeated_queries_do_not_reissue_remote_checks() {
        let transport = ScriptedTransport::new().reply("validname", Reply::Answer(true));
        let calls = transport.calls();
        let mut v = validator(transport);
        let form = v.add_form(&login_form("validname")).unwrap();
        let login = v.field_id(form, "login").unwrap();

        let first = v.valid(login);
        let second = v.valid(login);
        assert_eq!(first, None);
        assert_eq!(first, second);

        v.settle(form).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let third = v.valid(login);
        let fourth = v.valid(login);
        assert_eq!(third, Some(true));
        assert_eq!(third, fourth);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_value_wins_over_slow_stale_response() {
        let transport = ScriptedTransport::new()
            .reply("takenname", Reply::Delayed(Duration::from_secs(3), false))
            .reply("freshname", Reply::Delayed(Duration::from_secs(1), true));
        let mut v = validator(transport);
        let form = v.add_form(&login_form("takenname")).unwrap();
        let login = v.field_id(form, "login").unwrap();

        assert_eq!(v.submit_attempt(form), None);
        v.change(login, "freshname");
        assert_eq!(v.form(form).pending_count(), 1);

        assert_eq!(v.settle(form).await, Some(true));
        tokio::time::sleep(Duration::from_secs(5)).await;
        v.process_ready();
        assert_eq!(v.field(login).valid(), Some(true));
        assert!(v.errors(login).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn change_supersedes_check_issued_before_form_validation() {
        let transport = ScriptedTransport::new()
            .reply("takenname", Reply::Delayed(Duration::from_secs(2), false))
            .reply("freshname", Reply::Answer(true));
        let mut v = validator(transport);
        let form = v.add_form(&login_form("takenname")).unwrap();
        let login = v.field_id(form, "login").unwrap();

        assert_eq!(v.valid(login), None);
        v.change(login, "freshname");
        assert_eq!(v.form(form).pending_count(), 1);

        v.settle(form).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        v.process_ready();

        assert_eq!(v.field(login).value(), "freshname");
        assert_eq!(v.field(login).valid(), Some(true));
        assert!(v.errors(login).is_empty());
    }

    /// Checks remotely only once the value is long enough.
    struct RemoteWhenLong;

    impl crate::rules::Rule for RemoteWhenLong {
        fn name(&self) -> &str {
            "remoteWhenLong"
        }

        fn default_message(&self) -> &str {
            "Rejected"
        }

        fn parse_argument(
            &self,
            _raw: &crate::rules::RawArgument,
        ) -> EngineResult<RuleArgument> {
            Ok(RuleArgument::None)
        }

        fn evaluate(&self, input: &RuleInput<'_>) -> Evaluation {
            if input.value.chars().count() < 3 {
                return Evaluation::Pass;
            }
            Evaluation::Remote(RemoteRequest {
                endpoint: "/check".into(),
                field_name: input.field_name.to_string(),
                value: input.value.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn synchronous_outcome_cancels_earlier_remote_check() {
        let mut catalog = RuleCatalog::with_builtins();
        catalog.register(RemoteWhenLong).unwrap();
        let mut v = Validator::new(catalog, ScriptedTransport::new(), &EngineConfig::default());
        let decl = FormDeclaration::new("f")
            .field(FieldDeclaration::new("code").value("abcdef").flag("remoteWhenLong"));
        let form = v.add_form(&decl).unwrap();
        let code = v.field_id(form, "code").unwrap();

        assert_eq!(v.valid(form), None);
        assert_eq!(v.form(form).pending_count(), 1);

        assert_eq!(v.change(code, "ab"), Some(true));
        assert_eq!(v.form(form).pending_count(), 0);
        assert_eq!(v.form(form).valid(), Some(true));
        assert!(!v.process_next().await);
    }

    // -- submit gate ---------------------------------------------------------

    #[tokio::test]
    async fn gate_fires_once_with_final_verdict() {
        let mut v = validator(ScriptedTransport::new().reply("validname", Reply::Answer(true)));
        let form = v.add_form(&login_form("validname")).unwrap();
        let verdicts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&verdicts);
        v.set_submit_gate(form, move |valid| sink.lock().unwrap().push(valid));

        assert_eq!(v.submit_attempt(form), None);
        assert!(verdicts.lock().unwrap().is_empty());

        assert!(v.process_next().await);
        assert_eq!(*verdicts.lock().unwrap(), vec![true]);

        // A later query does not fire the gate again.
        v.valid(form);
        assert_eq!(*verdicts.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn gate_fires_immediately_for_synchronous_forms() {
        let mut v = validator(ScriptedTransport::new());
        let decl = FormDeclaration::new("f").field(FieldDeclaration::new("name").flag("presence"));
        let form = v.add_form(&decl).unwrap();
        let verdicts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&verdicts);
        v.set_submit_gate(form, move |valid| sink.lock().unwrap().push(valid));

        assert_eq!(v.submit_attempt(form), Some(false));
        assert_eq!(*verdicts.lock().unwrap(), vec![false]);
        assert_eq!(v.invalid_fields(form).len(), 1);
    }
}

//! Built-in rules: presence, lengthRange, format, confirmation, unique and
//! remoteMethod.

use crate::error::{EngineError, EngineResult};
use crate::transport::RemoteRequest;

use super::{Evaluation, LengthRange, Pattern, RawArgument, Rule, RuleArgument, RuleInput};

pub const PRESENCE: &str = "presence";
pub const LENGTH_RANGE: &str = "lengthRange";
pub const FORMAT: &str = "format";
pub const CONFIRMATION: &str = "confirmation";
pub const IDENTICAL: &str = "identical";
pub const UNIQUE: &str = "unique";
pub const REMOTE_METHOD: &str = "remoteMethod";

/// Default message for a prerequisite. Prerequisites are not rules, but the
/// message lives with the rule templates.
pub const PREREQUISITE_MESSAGE: &str = "This field is required as its prerequisite has been met";

fn required_text<'a>(rule: &str, raw: &'a RawArgument) -> EngineResult<&'a str> {
    match raw.as_text().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(EngineError::InvalidArgument {
            rule: rule.to_string(),
            reason: "a non-empty argument is required".to_string(),
        }),
    }
}

/// Evaluation for an argument the rule's own `parse_argument` never
/// produces. Only reachable when a caller builds a `RuleConfig` by hand, so
/// it fails the field rather than letting the value through.
fn mismatched_argument(rule: &str, argument: &RuleArgument) -> Evaluation {
    tracing::warn!(rule, ?argument, "Rule evaluated with an argument of the wrong kind");
    Evaluation::Fail(Vec::new())
}

/// Value must be non-empty.
pub struct Presence;

impl Rule for Presence {
    fn name(&self) -> &str {
        PRESENCE
    }

    fn default_message(&self) -> &str {
        "This field is required"
    }

    fn parse_argument(&self, _raw: &RawArgument) -> EngineResult<RuleArgument> {
        Ok(RuleArgument::None)
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Evaluation {
        if input.value.is_empty() {
            Evaluation::Fail(Vec::new())
        } else {
            Evaluation::Pass
        }
    }
}

/// Value length must lie within an inclusive `"min..max"` range.
pub struct LengthRangeRule;

impl Rule for LengthRangeRule {
    fn name(&self) -> &str {
        LENGTH_RANGE
    }

    fn default_message(&self) -> &str {
        "This field needs to be between {0} and {1} characters long"
    }

    fn parse_argument(&self, raw: &RawArgument) -> EngineResult<RuleArgument> {
        let text = required_text(LENGTH_RANGE, raw)?;
        Ok(RuleArgument::Range(LengthRange::parse(LENGTH_RANGE, text)?))
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Evaluation {
        match input.argument {
            RuleArgument::Range(range) if range.contains(input.value) => Evaluation::Pass,
            RuleArgument::Range(range) => {
                Evaluation::Fail(vec![range.min.to_string(), range.max.to_string()])
            }
            other => mismatched_argument(LENGTH_RANGE, other),
        }
    }
}

/// Value must fully match a regular expression.
pub struct Format;

impl Rule for Format {
    fn name(&self) -> &str {
        FORMAT
    }

    fn default_message(&self) -> &str {
        "This value should match the format ‘{0}’"
    }

    fn parse_argument(&self, raw: &RawArgument) -> EngineResult<RuleArgument> {
        let source = required_text(FORMAT, raw)?;
        Ok(RuleArgument::Pattern(Pattern::full(source)?))
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Evaluation {
        match input.argument {
            RuleArgument::Pattern(pattern) if pattern.is_match(input.value) => Evaluation::Pass,
            RuleArgument::Pattern(pattern) => {
                Evaluation::Fail(vec![format!("/{}/", pattern.source())])
            }
            other => mismatched_argument(FORMAT, other),
        }
    }
}

/// Value must equal another field's current value.
pub struct Confirmation;

impl Rule for Confirmation {
    fn name(&self) -> &str {
        CONFIRMATION
    }

    fn default_message(&self) -> &str {
        "This field should have the same value as ‘{0}’"
    }

    fn parse_argument(&self, raw: &RawArgument) -> EngineResult<RuleArgument> {
        let target = required_text(CONFIRMATION, raw)?;
        Ok(RuleArgument::FieldName(target.to_string()))
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Evaluation {
        let RuleArgument::FieldName(target) = input.argument else {
            return mismatched_argument(CONFIRMATION, input.argument);
        };

        if input.values.value_of(target) == Some(input.value) {
            Evaluation::Pass
        } else {
            Evaluation::Fail(vec![target.clone()])
        }
    }
}

/// Delegates the verdict to a remote endpoint.
///
/// Backs both `unique` and `remoteMethod`; they differ only in name and
/// default message.
pub struct RemoteCheck {
    name: &'static str,
    default_message: &'static str,
}

impl RemoteCheck {
    pub fn unique() -> Self {
        Self {
            name: UNIQUE,
            default_message: "This value is not unique",
        }
    }

    pub fn remote_method() -> Self {
        Self {
            name: REMOTE_METHOD,
            default_message: "This value failed the remote method callback",
        }
    }
}

impl Rule for RemoteCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn default_message(&self) -> &str {
        self.default_message
    }

    fn parse_argument(&self, raw: &RawArgument) -> EngineResult<RuleArgument> {
        let endpoint = required_text(self.name, raw)?;
        Ok(RuleArgument::Endpoint(endpoint.to_string()))
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Evaluation {
        match input.argument {
            RuleArgument::Endpoint(endpoint) => Evaluation::Remote(RemoteRequest {
                endpoint: endpoint.clone(),
                field_name: input.field_name.to_string(),
                value: input.value.to_string(),
            }),
            other => mismatched_argument(self.name, other),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

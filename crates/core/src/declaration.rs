//! Declared forms, fields, rules and prerequisites.
//!
//! Declarations are plain data read from a collaborator (JSON, or markup
//! attributes via [`FieldDeclaration::from_attributes`]). They are checked
//! and compiled into state by [`crate::validator::Validator::add_form`].

use serde::{Deserialize, Serialize};

use crate::rules::builtin::LENGTH_RANGE;
use crate::rules::RawArgument;

/// Prefix shared by every validation attribute in markup.
pub const ATTRIBUTE_PREFIX: &str = "data-validation-";

const MESSAGE_SUFFIX: &str = "-message";
const PREREQUISITE_KEY: &str = "prerequisite";

/// A form and its fields, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormDeclaration {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDeclaration>,
}

impl FormDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }
}

/// One field: its current value, ordered rules, and optional prerequisite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub rules: Vec<RuleDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisite: Option<PrerequisiteDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeclaration {
    pub rule: String,
    #[serde(default)]
    pub argument: RawArgument,
    /// Replaces the rule's rendered default message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Gate on other fields' values. `target` may list several comma-separated
/// field names; every one of them must satisfy the condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteDeclaration {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Append a rule with a text argument.
    pub fn rule(mut self, rule: impl Into<String>, argument: impl Into<String>) -> Self {
        self.rules.push(RuleDeclaration {
            rule: rule.into(),
            argument: RawArgument::Text(argument.into()),
            message: None,
        });
        self
    }

    /// Append a rule that takes no argument.
    pub fn flag(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(RuleDeclaration {
            rule: rule.into(),
            argument: RawArgument::Flag(true),
            message: None,
        });
        self
    }

    /// Set the message override of the most recently added rule.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.rules.last_mut() {
            last.message = Some(message.into());
        }
        self
    }

    pub fn prerequisite(mut self, prerequisite: PrerequisiteDeclaration) -> Self {
        self.prerequisite = Some(prerequisite);
        self
    }

    /// Build a declaration from markup attributes.
    ///
    /// Recognizes `data-validation-<rule>` keys in the order given, per-rule
    /// `-message` overrides, and the `prerequisite` family
    /// (`-value`, `-format`, `-length`, `-message`). Kebab-case rule keys
    /// become camelCase names and `length` becomes `lengthRange`. An empty
    /// attribute value declares the rule with a `true` flag. Attributes
    /// without the prefix are ignored.
    pub fn from_attributes<I, K, V>(name: impl Into<String>, value: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut field = Self::new(name).value(value);
        let mut messages: Vec<(String, String)> = Vec::new();
        let mut prerequisite: Option<PrerequisiteDeclaration> = None;
        let mut prerequisite_extras: Vec<(String, String)> = Vec::new();

        for (key, attr_value) in attributes {
            let Some(key) = key.as_ref().strip_prefix(ATTRIBUTE_PREFIX) else {
                continue;
            };
            let attr_value = attr_value.as_ref();

            if key == PREREQUISITE_KEY {
                prerequisite = Some(PrerequisiteDeclaration {
                    target: attr_value.to_string(),
                    ..PrerequisiteDeclaration::default()
                });
            } else if let Some(option) = key
                .strip_prefix(PREREQUISITE_KEY)
                .and_then(|rest| rest.strip_prefix('-'))
            {
                prerequisite_extras.push((option.to_string(), attr_value.to_string()));
            } else if let Some(rule_key) = key.strip_suffix(MESSAGE_SUFFIX) {
                messages.push((rule_name(rule_key), attr_value.to_string()));
            } else {
                let argument = if attr_value.is_empty() {
                    RawArgument::Flag(true)
                } else {
                    RawArgument::Text(attr_value.to_string())
                };
                field.rules.push(RuleDeclaration {
                    rule: rule_name(key),
                    argument,
                    message: None,
                });
            }
        }

        for (rule, message) in messages {
            if let Some(decl) = field.rules.iter_mut().find(|r| r.rule == rule) {
                decl.message = Some(message);
            }
        }

        if let Some(mut prereq) = prerequisite {
            for (option, value) in prerequisite_extras {
                match option.as_str() {
                    "value" => prereq.value = Some(value),
                    "format" => prereq.format = Some(value),
                    "length" => prereq.length = Some(value),
                    "message" => prereq.message = Some(value),
                    other => tracing::debug!(option = %other, "Ignoring unknown prerequisite option"),
                }
            }
            field.prerequisite = Some(prereq);
        }

        field
    }
}

/// Map an attribute key to its rule name: kebab-case to camelCase, with
/// `length` renamed to `lengthRange`.
fn rule_name(key: &str) -> String {
    if key == "length" {
        return LENGTH_RANGE.to_string();
    }

    let mut name = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            name.extend(c.to_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

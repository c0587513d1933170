//! Configuration errors raised while building a validator.
//!
//! Rule failures are not errors: they are recorded as per-rule messages on
//! the field. Remote transport failures are not errors either; they resolve
//! as passes (see [`crate::coordinator`]).

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Rule already registered: {0}")]
    DuplicateRule(String),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Invalid argument for rule '{rule}': {reason}")]
    InvalidArgument { rule: String, reason: String },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown field '{field}' in form '{form}'")]
    UnknownField { form: String, field: String },

    #[error("Duplicate field '{field}' in form '{form}'")]
    DuplicateField { form: String, field: String },

    #[error("Unknown form: {0}")]
    UnknownForm(String),

    #[error("Duplicate form: {0}")]
    DuplicateForm(String),
}

/// Convenience alias for fallible engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

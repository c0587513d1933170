//! Declarative form validation engine.
//!
//! Forms are declared as fields carrying ordered rules and an optional
//! prerequisite ([`declaration`]). A [`validator::Validator`] compiles the
//! declarations against a [`rules::catalog::RuleCatalog`], evaluates
//! synchronous rules inline, hands remote rules to the
//! [`coordinator::AsyncCoordinator`] with a fail-open timeout, and
//! aggregates per-field results into a per-form verdict.

pub mod config;
pub mod coordinator;
pub mod declaration;
pub mod error;
pub mod field;
pub mod form;
pub mod message;
pub mod prerequisite;
pub mod rules;
pub mod transport;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::EngineConfig;
pub use declaration::{FieldDeclaration, FormDeclaration, PrerequisiteDeclaration, RuleDeclaration};
pub use error::{EngineError, EngineResult};
pub use form::{FieldId, FormId};
pub use transport::{RemoteRequest, RemoteTransport, TransportError};
pub use validator::{Target, Validator};

//! `formguard` -- validate declared forms from the command line.
//!
//! Reads a JSON array of form declarations (each field carrying its current
//! `value`), runs a submit attempt per form, and prints one JSON report per
//! form to stdout. Remote rules are checked over HTTP.
//!
//! # Usage
//!
//! ```text
//! formguard <declarations.json>
//! ```
//!
//! # Environment variables
//!
//! | Variable                        | Required | Default | Description                                   |
//! |---------------------------------|----------|---------|-----------------------------------------------|
//! | `FORMGUARD_REMOTE_BASE_URL`     | no       | --      | Base URL for relative remote check endpoints  |
//! | `FORMGUARD_REMOTE_TIMEOUT_SECS` | no       | `15`    | Seconds before a remote check fails open      |
//! | `FORMGUARD_HTTP_TIMEOUT_SECS`   | no       | `30`    | Per-request HTTP timeout                      |
//!
//! # Exit status
//!
//! `0` when every form is valid, `1` when any form is invalid, `2` on
//! unreadable input or a configuration error.

use std::collections::BTreeMap;
use std::process::ExitCode;

use formguard_core::{EngineConfig, FormDeclaration, Validator};
use formguard_remote::{HttpTransport, HttpTransportConfig};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One line of output per form.
#[derive(Debug, Serialize)]
struct FormReport<'a> {
    form: &'a str,
    valid: bool,
    errors: BTreeMap<&'a str, &'a BTreeMap<String, String>>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "formguard_cli=info,formguard_core=info,formguard_remote=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(path) = std::env::args().nth(1) else {
        tracing::error!("Usage: formguard <declarations.json>");
        return ExitCode::from(2);
    };

    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Failed to read declarations");
            return ExitCode::from(2);
        }
    };

    let declarations: Vec<FormDeclaration> = match serde_json::from_str(&raw) {
        Ok(decls) => decls,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Declarations are not valid JSON");
            return ExitCode::from(2);
        }
    };

    let transport = match HttpTransport::new(&HttpTransportConfig::from_env()) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return ExitCode::from(2);
        }
    };

    let config = EngineConfig::from_env();
    tracing::info!(
        forms = declarations.len(),
        remote_timeout_secs = config.remote_timeout.as_secs(),
        "Starting formguard",
    );

    let mut validator = Validator::with_builtins(transport, &config);
    let mut form_ids = Vec::with_capacity(declarations.len());
    for decl in &declarations {
        match validator.add_form(decl) {
            Ok(id) => form_ids.push(id),
            Err(e) => {
                tracing::error!(form = %decl.name, error = %e, "Invalid form declaration");
                return ExitCode::from(2);
            }
        }
    }

    let mut all_valid = true;
    for id in form_ids {
        let valid = validator.submit(id).await;
        all_valid &= valid;

        let form = validator.form(id);
        let report = FormReport {
            form: form.name(),
            valid,
            errors: form
                .invalid_fields()
                .map(|field| (field.name(), field.errors()))
                .collect(),
        };

        match serde_json::to_string(&report) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(form = %form.name(), error = %e, "Failed to serialize report"),
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

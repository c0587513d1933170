//! Remote check lifecycle.
//!
//! [`AsyncCoordinator::start`] spawns a task per remote check. The task
//! races the transport against a fixed timeout and reports back over a
//! channel; the owner of the form state applies the report with
//! [`AsyncCoordinator::resolve`] on its own turn, so state is only ever
//! mutated by one caller.
//!
//! Resolution policy:
//! - a response settles the rule with the returned verdict;
//! - a timeout or transport error is inconclusive and resolves as a pass;
//! - a handle resolves at most once, and a handle superseded by a newer
//!   check for the same field and rule is inert: its task is cancelled and
//!   any report it still delivers is discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::form::{FieldId, FormState};
use crate::transport::{RemoteRequest, RemoteTransport};

/// Identifies one issued remote check. Handles increase in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckHandle(u64);

impl fmt::Display for CheckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "check#{}", self.0)
    }
}

/// How a remote check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The endpoint answered; `true` means valid.
    Response(bool),
    /// No answer within the timeout.
    TimedOut,
    /// The transport failed.
    Inconclusive,
}

impl CheckOutcome {
    /// Only an explicit negative response fails the rule.
    pub fn passed(self) -> bool {
        !matches!(self, Self::Response(false))
    }
}

/// A report delivered by a check task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub handle: CheckHandle,
    pub outcome: CheckOutcome,
}

/// Effect of an applied resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCheck {
    pub field: FieldId,
    pub rule: String,
    pub passed: bool,
    /// The form's outstanding count reached zero with this resolution.
    pub form_settled: bool,
}

struct InFlight {
    field: FieldId,
    rule: String,
    message: String,
    cancel: CancellationToken,
}

/// Issues remote checks and tracks the ones still in flight.
pub struct AsyncCoordinator<T> {
    transport: Arc<T>,
    timeout: Duration,
    next_handle: u64,
    in_flight: HashMap<CheckHandle, InFlight>,
    latest: HashMap<(FieldId, String), CheckHandle>,
    tx: mpsc::UnboundedSender<Resolution>,
    rx: mpsc::UnboundedReceiver<Resolution>,
}

impl<T: RemoteTransport> AsyncCoordinator<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            timeout,
            next_handle: 0,
            in_flight: HashMap::new(),
            latest: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Number of checks issued and not yet resolved or superseded.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, handle: CheckHandle) -> bool {
        self.in_flight.contains_key(&handle)
    }

    /// Issue a remote check for `rule` on `field`.
    ///
    /// `message` is recorded on the field if the endpoint answers `false`.
    /// A check already in flight for the same field and rule is superseded;
    /// the form's outstanding count then stays unchanged.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        &mut self,
        form: &mut FormState,
        field: FieldId,
        rule: &str,
        message: String,
        request: RemoteRequest,
    ) -> CheckHandle {
        let key = (field, rule.to_string());

        match self.latest.get(&key).copied() {
            Some(previous) => {
                if let Some(stale) = self.in_flight.remove(&previous) {
                    stale.cancel.cancel();
                }
                tracing::debug!(%field, rule, superseded = %previous, "Superseding remote check");
            }
            None => {
                form.increment_pending();
                form.field_mut(field.index).mark_pending(rule);
            }
        }

        let handle = CheckHandle(self.next_handle);
        self.next_handle += 1;

        let cancel = CancellationToken::new();
        self.spawn_check(handle, request, cancel.clone());

        self.in_flight.insert(
            handle,
            InFlight {
                field,
                rule: rule.to_string(),
                message,
                cancel,
            },
        );
        self.latest.insert(key, handle);
        handle
    }

    fn spawn_check(&self, handle: CheckHandle, request: RemoteRequest, cancel: CancellationToken) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        let timeout = self.timeout;

        tracing::debug!(%handle, %request, "Starting remote check");

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                result = tokio::time::timeout(timeout, transport.check(&request)) => match result {
                    Ok(Ok(valid)) => CheckOutcome::Response(valid),
                    Ok(Err(e)) => {
                        tracing::warn!(%handle, %request, error = %e, "Remote check failed, treating as pass");
                        CheckOutcome::Inconclusive
                    }
                    Err(_) => {
                        tracing::warn!(
                            %handle,
                            %request,
                            timeout_ms = timeout.as_millis() as u64,
                            "Remote check timed out, treating as pass",
                        );
                        CheckOutcome::TimedOut
                    }
                },
            };

            // The receiver is gone only when the validator was dropped.
            let _ = tx.send(Resolution { handle, outcome });
        });
    }

    /// Apply a resolution to the owning form.
    ///
    /// Returns `None` when the handle is unknown, already resolved, or
    /// superseded; such resolutions change nothing.
    pub fn resolve(
        &mut self,
        forms: &mut [FormState],
        resolution: Resolution,
    ) -> Option<ResolvedCheck> {
        let Some(entry) = self.in_flight.remove(&resolution.handle) else {
            tracing::debug!(handle = %resolution.handle, "Discarding stale remote check result");
            return None;
        };

        let key = (entry.field, entry.rule);
        if self.latest.get(&key) == Some(&resolution.handle) {
            self.latest.remove(&key);
        }
        let (field_id, rule) = key;

        let form = forms.get_mut(field_id.form.0)?;
        let passed = resolution.outcome.passed();
        {
            let field = form.field_mut(field_id.index);
            field.clear_pending(&rule);
            if passed {
                field.clear_error(&rule);
            } else {
                field.record_failure(&rule, entry.message);
            }
            field.refresh_status();
            tracing::debug!(
                field = %field.name(),
                rule = %rule,
                outcome = ?resolution.outcome,
                "Remote check resolved",
            );
        }

        let form_settled = form.decrement_pending();
        Some(ResolvedCheck {
            field: field_id,
            rule,
            passed,
            form_settled,
        })
    }

    /// Cancel every check in flight for `field`.
    ///
    /// Returns `true` if this brought the form's outstanding count to zero.
    pub fn cancel_field(&mut self, form: &mut FormState, field: FieldId) -> bool {
        let rules: Vec<String> = self
            .latest
            .keys()
            .filter(|(f, _)| *f == field)
            .map(|(_, rule)| rule.clone())
            .collect();

        let mut settled = false;
        for rule in rules {
            settled |= self.cancel_check(form, field, &rule);
        }
        settled
    }

    /// Cancel the check in flight for `rule` on `field`, if any.
    ///
    /// Returns `true` if this brought the form's outstanding count to zero.
    pub fn cancel_check(&mut self, form: &mut FormState, field: FieldId, rule: &str) -> bool {
        let Some(handle) = self.latest.remove(&(field, rule.to_string())) else {
            return false;
        };
        if let Some(entry) = self.in_flight.remove(&handle) {
            entry.cancel.cancel();
            tracing::debug!(%field, rule, %handle, "Cancelled remote check");
        }
        form.field_mut(field.index).clear_pending(rule);
        form.decrement_pending()
    }

    /// Wait for the next report from a check task.
    ///
    /// Returns `None` immediately when nothing is in flight, so callers
    /// never wait on a channel that cannot produce.
    pub async fn next_resolution(&mut self) -> Option<Resolution> {
        if self.in_flight.is_empty() {
            return None;
        }
        self.rx.recv().await
    }

    /// A report that has already been delivered, if any.
    pub fn try_next_resolution(&mut self) -> Option<Resolution> {
        self.rx.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Scripted remote transport for unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{RemoteRequest, RemoteTransport, TransportError};

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Answer(bool),
    Delayed(Duration, bool),
    Hang,
    Fail,
}

/// Answers each request according to the reply registered for its value.
/// Values without a reply hang.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, Reply>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, value: &str, reply: Reply) -> Self {
        self.replies.insert(value.to_string(), reply);
        self
    }

    /// Shared counter of `check` calls; clone it before handing the
    /// transport to a validator.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl RemoteTransport for ScriptedTransport {
    fn check(
        &self,
        request: &RemoteRequest,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.get(&request.value).copied().unwrap_or(Reply::Hang);

        async move {
            match reply {
                Reply::Answer(valid) => Ok(valid),
                Reply::Delayed(delay, valid) => {
                    tokio::time::sleep(delay).await;
                    Ok(valid)
                }
                Reply::Hang => std::future::pending().await,
                Reply::Fail => Err(TransportError::Request("connection refused".into())),
            }
        }
    }
}

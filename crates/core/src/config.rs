use std::time::Duration;

/// Seconds a remote check may take before it is force-resolved as a pass.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 15;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a remote check may stay unanswered before the fail-open
    /// timeout resolves it (default: 15 seconds).
    pub remote_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default |
    /// |---------------------------------|---------|
    /// | `FORMGUARD_REMOTE_TIMEOUT_SECS` | `15`    |
    pub fn from_env() -> Self {
        let remote_timeout_secs = match std::env::var("FORMGUARD_REMOTE_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "FORMGUARD_REMOTE_TIMEOUT_SECS is not a valid u64, using default");
                DEFAULT_REMOTE_TIMEOUT_SECS
            }),
            Err(_) => DEFAULT_REMOTE_TIMEOUT_SECS,
        };

        Self {
            remote_timeout: Duration::from_secs(remote_timeout_secs),
        }
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }
}

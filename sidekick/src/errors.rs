//! Error taxonomy for the assistant core.
//!
//! Classification misses and admission rejections are *not* errors: the
//! router returns `None` and the limiter returns a typed decision. Everything
//! that is genuinely exceptional funnels into [`CoreError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The named upstream circuit is open. Callers should map this to a
    /// retryable "temporarily unavailable" response rather than a generic
    /// failure; `retry_in_ms` is the time until the next probe is admitted.
    #[error("circuit '{name}' is open, retry in {retry_in_ms}ms")]
    CircuitOpen { name: String, retry_in_ms: u64 },

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("stream processing failed: {0}")]
    Stream(String),

    #[error("action executor failed: {0}")]
    Executor(String),

    #[error("transcript persistence failed: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    /// True when the error is the fail-fast rejection of an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CoreError::CircuitOpen { .. })
    }
}

//! Circuit breaker keyed by upstream name.
//!
//! A pure state machine per name: closed until `failure_threshold`
//! consecutive failures, then open for `reset_timeout`, then a single
//! half-open probe decides between closing again and reopening. The breaker
//! never retries on its own; callers that receive an error retry at a higher
//! layer.

use std::future::Future;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::errors::CoreError;

/// Breaker position in the closed/open/half-open cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Mutable per-name state. Only the breaker itself writes it.
#[derive(Debug, Clone)]
pub struct CircuitState {
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            last_success_at: None,
        }
    }
}

/// Per-invocation policy; [`Default`] is 5 consecutive failures / 30 s.
#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Storage abstraction for circuit states, keyed by upstream name. The
/// closure runs under the key's lock so each decision is an atomic
/// read-modify-write; operations on different keys never block each other.
/// A multi-process deployment can swap in a shared external store without
/// changing call sites.
pub trait CircuitStateStore: Send + Sync {
    fn with_state<R>(&self, name: &str, f: impl FnOnce(&mut CircuitState) -> R) -> R;
    fn snapshot(&self, name: &str) -> Option<CircuitState>;
}

/// Process-wide in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryCircuitStore {
    states: DashMap<String, CircuitState>,
}

impl InMemoryCircuitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CircuitStateStore for InMemoryCircuitStore {
    fn with_state<R>(&self, name: &str, f: impl FnOnce(&mut CircuitState) -> R) -> R {
        let mut entry = self.states.entry(name.to_string()).or_default();
        f(entry.value_mut())
    }

    fn snapshot(&self, name: &str) -> Option<CircuitState> {
        self.states.get(name).map(|e| e.value().clone())
    }
}

/// Generic resilience wrapper around calls to named upstreams.
#[derive(Debug, Default)]
pub struct CircuitBreaker<S: CircuitStateStore = InMemoryCircuitStore> {
    store: S,
}

impl CircuitBreaker<InMemoryCircuitStore> {
    pub fn new() -> Self {
        Self {
            store: InMemoryCircuitStore::new(),
        }
    }
}

impl<S: CircuitStateStore> CircuitBreaker<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Run `op` through the breaker with the default policy.
    pub async fn call<T, F, Fut>(&self, name: &str, op: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.call_with(name, BreakerPolicy::default(), op).await
    }

    /// Run `op` through the breaker with an explicit policy. Fails fast with
    /// [`CoreError::CircuitOpen`] without invoking `op` while the circuit is
    /// open; otherwise forwards `op`'s own result.
    pub async fn call_with<T, F, Fut>(
        &self,
        name: &str,
        policy: BreakerPolicy,
        op: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.admit(name, &policy)?;

        match op().await {
            Ok(value) => {
                self.on_success(name);
                Ok(value)
            }
            Err(err) => {
                self.on_failure(name, &policy);
                Err(err)
            }
        }
    }

    /// Current state snapshot for diagnostics; `None` until first use.
    pub fn state(&self, name: &str) -> Option<CircuitState> {
        self.store.snapshot(name)
    }

    fn admit(&self, name: &str, policy: &BreakerPolicy) -> Result<(), CoreError> {
        let now = Instant::now();
        self.store.with_state(name, |state| match state.status {
            CircuitStatus::Closed => Ok(()),
            CircuitStatus::Open => {
                let elapsed = state
                    .last_failure_at
                    .map(|at| now.duration_since(at))
                    .unwrap_or(policy.reset_timeout);
                if elapsed >= policy.reset_timeout {
                    // Admit exactly this call as the probe.
                    state.status = CircuitStatus::HalfOpen;
                    tracing::info!(circuit = name, "half-open probe admitted");
                    Ok(())
                } else {
                    let retry_in = policy.reset_timeout - elapsed;
                    Err(CoreError::CircuitOpen {
                        name: name.to_string(),
                        retry_in_ms: retry_in.as_millis() as u64,
                    })
                }
            }
            // A probe is already in flight; everyone else fails fast.
            CircuitStatus::HalfOpen => Err(CoreError::CircuitOpen {
                name: name.to_string(),
                retry_in_ms: 0,
            }),
        })
    }

    fn on_success(&self, name: &str) {
        self.store.with_state(name, |state| {
            if state.status != CircuitStatus::Closed {
                tracing::info!(circuit = name, "circuit closed");
            }
            state.status = CircuitStatus::Closed;
            state.consecutive_failures = 0;
            state.last_success_at = Some(Instant::now());
        });
    }

    fn on_failure(&self, name: &str, policy: &BreakerPolicy) {
        self.store.with_state(name, |state| {
            state.last_failure_at = Some(Instant::now());
            match state.status {
                CircuitStatus::HalfOpen => {
                    // A single probe failure reopens immediately.
                    state.status = CircuitStatus::Open;
                    state.consecutive_failures += 1;
                    tracing::warn!(circuit = name, "probe failed, circuit reopened");
                }
                CircuitStatus::Closed => {
                    state.consecutive_failures += 1;
                    if state.consecutive_failures >= policy.failure_threshold {
                        state.status = CircuitStatus::Open;
                        tracing::warn!(
                            circuit = name,
                            failures = state.consecutive_failures,
                            "failure threshold reached, circuit opened"
                        );
                    }
                }
                CircuitStatus::Open => {
                    state.consecutive_failures += 1;
                }
            }
        });
    }
}

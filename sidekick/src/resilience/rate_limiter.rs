//! Sliding-window admission control for the inbound edge.
//!
//! Each client key owns an ordered list of request timestamps inside the
//! trailing window. Entries are pruned lazily on every check and by a
//! periodic sweep that also drops empty keys, so memory stays bounded
//! independent of how many distinct keys were ever seen.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// Limiter policy; [`Default`] is 10 requests / 1000 ms, swept every 60 s.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_millis(1000),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Outcome of one admission check. Rejections are expected, typed outcomes:
/// they still carry limit/remaining/reset so clients can back off
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_ms: u64,
}

/// Storage abstraction over per-key request windows. The closure runs under
/// the key's lock (atomic read-modify-write per key, no cross-key locking);
/// swap in an external store for multi-process deployments.
pub trait WindowStore: Send + Sync {
    fn with_window<R>(&self, key: &str, f: impl FnOnce(&mut VecDeque<Instant>) -> R) -> R;
    /// Keep only the windows for which `f` returns true.
    fn retain(&self, f: impl FnMut(&str, &mut VecDeque<Instant>) -> bool);
    fn key_count(&self) -> usize;
}

/// Process-wide in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    windows: DashMap<String, VecDeque<Instant>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for InMemoryWindowStore {
    fn with_window<R>(&self, key: &str, f: impl FnOnce(&mut VecDeque<Instant>) -> R) -> R {
        let mut entry = self.windows.entry(key.to_string()).or_default();
        f(entry.value_mut())
    }

    fn retain(&self, mut f: impl FnMut(&str, &mut VecDeque<Instant>) -> bool) {
        self.windows.retain(|key, window| f(key, window));
    }

    fn key_count(&self) -> usize {
        self.windows.len()
    }
}

/// Sliding-window request limiter.
#[derive(Debug, Default)]
pub struct SlidingWindowLimiter<S: WindowStore = InMemoryWindowStore> {
    store: S,
    policy: RateLimitPolicy,
}

impl SlidingWindowLimiter<InMemoryWindowStore> {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            store: InMemoryWindowStore::new(),
            policy,
        }
    }
}

impl<S: WindowStore> SlidingWindowLimiter<S> {
    pub fn with_store(store: S, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Check and record one request for `key`.
    pub fn check(&self, key: &str) -> AdmissionDecision {
        let RateLimitPolicy { limit, window, .. } = self.policy;
        let now = Instant::now();

        let (allowed, used, oldest) = self.store.with_window(key, |timestamps| {
            prune(timestamps, now, window);
            if timestamps.len() as u32 >= limit {
                (false, timestamps.len() as u32, timestamps.front().copied())
            } else {
                timestamps.push_back(now);
                (true, timestamps.len() as u32, timestamps.front().copied())
            }
        });

        let reset_ms = oldest
            .map(|at| window.saturating_sub(now.duration_since(at)).as_millis() as u64)
            .unwrap_or(0);

        let decision = AdmissionDecision {
            allowed,
            limit,
            remaining: limit.saturating_sub(used),
            reset_ms,
        };
        if !decision.allowed {
            tracing::debug!(key, reset_ms = decision.reset_ms, "request rejected");
        }
        decision
    }

    /// Drop expired entries everywhere and forget keys with empty windows.
    pub fn sweep(&self) {
        let now = Instant::now();
        let window = self.policy.window;
        self.store.retain(|_, timestamps| {
            prune(timestamps, now, window);
            !timestamps.is_empty()
        });
    }

    /// Number of keys currently tracked (post-sweep memory bound).
    pub fn tracked_keys(&self) -> usize {
        self.store.key_count()
    }
}

impl<S: WindowStore + Send + Sync + 'static> SlidingWindowLimiter<S> {
    /// Spawn the periodic sweep loop.
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.policy.sweep_interval);
            loop {
                ticker.tick().await;
                self.sweep();
            }
        })
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

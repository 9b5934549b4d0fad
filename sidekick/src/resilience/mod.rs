//! Resource-governance primitives: the circuit breaker guarding the upstream
//! generative call and the sliding-window limiter guarding the inbound edge.

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{
    BreakerPolicy, CircuitBreaker, CircuitState, CircuitStateStore, CircuitStatus,
    InMemoryCircuitStore,
};
pub use rate_limiter::{
    AdmissionDecision, InMemoryWindowStore, RateLimitPolicy, SlidingWindowLimiter, WindowStore,
};

//! Sidekick: conversational assistant core for a workspace application.
//!
//! The assistant answers either deterministically (fast path: a multi-layer
//! intent router resolves free text to a typed command, no model call) or by
//! delegating to a generative service (delegated path: the streamed reply is
//! scanned for embedded directive blocks, cleaned for the client and the
//! enclosed commands executed exactly once). The inbound edge is guarded by
//! a sliding-window admission controller and the upstream call by a circuit
//! breaker.
//!
//! ## Architecture
//!
//! - [`router`]: alias resolution, heuristic intent scoring and the ordered
//!   handler registry
//! - [`streaming`]: wire framing, the bounded raw-text accumulator and the
//!   directive processor
//! - [`resilience`]: circuit breaker and sliding-window limiter
//! - [`llm`]: generative service contract plus OpenAI-compatible client
//! - [`service`]: the facade the HTTP boundary talks to

pub mod catalog;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod resilience;
pub mod router;
pub mod service;
pub mod streaming;
pub mod types;

// Re-export main types for easy access
pub use catalog::SectionCatalog;
pub use config::AssistantConfig;
pub use errors::CoreError;
pub use executor::{ActionExecutor, InMemoryActionExecutor, InMemoryTranscriptSink, TranscriptSink};
pub use llm::{ChatModelConfig, ChatModelProvider, OpenAiChatModel, StubChatModel};
pub use resilience::{
    AdmissionDecision, BreakerPolicy, CircuitBreaker, RateLimitPolicy, SlidingWindowLimiter,
};
pub use router::{AliasResolver, IntentRouter, IntentScorer, RouterConfig};
pub use service::{AssistantReply, AssistantService};
pub use streaming::{AssistantEvent, DirectiveStreamProcessor, ProcessorConfig};
pub use types::{ActionResult, ChatMessage, Command, ExecutionReport, RequestContext, Section};

//! Assistant service: the entry point the HTTP boundary calls.
//!
//! Control flow per inbound message: admission check, then the intent
//! router. A match produces a synthetic response stream built locally, with
//! no network call. A miss forwards the message through the circuit breaker to
//! the generative service and pipes the response through the streaming
//! directive processor. Both paths emit identical framing, so the client
//! cannot tell them apart except by latency.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AssistantConfig;
use crate::errors::CoreError;
use crate::executor::{ActionExecutor, TranscriptSink};
use crate::llm::ChatModelProvider;
use crate::resilience::{AdmissionDecision, BreakerPolicy, CircuitBreaker, SlidingWindowLimiter};
use crate::router::IntentRouter;
use crate::streaming::{report_events, sse_done, AssistantEvent, DirectiveStreamProcessor};
use crate::types::{ChatMessage, Command, RequestContext};

/// System prompt for the delegated path. Teaches the model the directive
/// wire format so its side effects arrive machine-readable.
const SYSTEM_PROMPT: &str = "You are the in-app assistant of a workspace application \
with tasks, news and calendar sections. Reply in the user's language. When the user \
asks you to act on the application, append a directive block to your reply: \
[ACTIONS]{\"actions\":[{\"k\":\"task.create\",\"title\":\"...\"}]}[/ACTIONS]. \
Supported kinds: navigation{target,label}, task.create{title}, task.complete{taskId}, \
workspace.switch{targetType}, tasks.filter{filter}, news.sources.open, \
news.search{query}, news.tab.switch{tabName}. Never mention the block in your prose.";

/// Outcome of one inbound message.
#[derive(Debug)]
pub enum AssistantReply {
    /// SSE frames to forward to the client as-is.
    Stream(mpsc::Receiver<String>),
    /// Admission rejected; carries deterministic back-off metadata.
    RateLimited(AdmissionDecision),
}

/// Process-wide assistant instance.
pub struct AssistantService {
    router: IntentRouter,
    limiter: Arc<SlidingWindowLimiter>,
    breaker: CircuitBreaker,
    breaker_policy: BreakerPolicy,
    provider: Arc<dyn ChatModelProvider>,
    executor: Arc<dyn ActionExecutor>,
    transcript: Arc<dyn TranscriptSink>,
    processor: Arc<DirectiveStreamProcessor>,
}

impl AssistantService {
    pub fn new(
        config: AssistantConfig,
        provider: Arc<dyn ChatModelProvider>,
        executor: Arc<dyn ActionExecutor>,
        transcript: Arc<dyn TranscriptSink>,
    ) -> Self {
        let catalog = Arc::new(config.catalog());
        let router = IntentRouter::with_defaults(catalog, config.router);
        let limiter = Arc::new(SlidingWindowLimiter::new(config.admission.into()));
        let processor = Arc::new(
            DirectiveStreamProcessor::new(executor.clone(), transcript.clone())
                .with_config(config.stream.into()),
        );

        Self {
            router,
            limiter,
            breaker: CircuitBreaker::new(),
            breaker_policy: config.breaker.into(),
            provider,
            executor,
            transcript,
            processor,
        }
    }

    /// Start the limiter's periodic sweep; callers hold the handle for the
    /// process lifetime.
    pub fn spawn_limiter_sweeper(&self) -> JoinHandle<()> {
        self.limiter.clone().spawn_sweeper()
    }

    /// Handle one inbound user message.
    ///
    /// `Err(CoreError::CircuitOpen {..})` means the generative service is
    /// cooling down; the caller maps it to a retryable response.
    pub async fn handle_message(
        &self,
        text: &str,
        ctx: RequestContext,
    ) -> Result<AssistantReply, CoreError> {
        let decision = self.limiter.check(&ctx.user_id);
        if !decision.allowed {
            return Ok(AssistantReply::RateLimited(decision));
        }

        if let Some(command) = self.router.route(text, &ctx) {
            tracing::info!(
                conversation = %ctx.conversation_id,
                kind = command.kind(),
                "fast path"
            );
            return Ok(AssistantReply::Stream(self.fast_path(command, ctx)));
        }

        tracing::info!(conversation = %ctx.conversation_id, "delegating to model");
        self.delegate(text, ctx).await
    }

    /// Synthetic response stream for a routed command: confirmation delta,
    /// sentinel, then the executor's outcome events, in the same ordering the
    /// delegated path produces.
    fn fast_path(&self, command: Command, ctx: RequestContext) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(16);
        let executor = self.executor.clone();
        let transcript = self.transcript.clone();

        tokio::spawn(async move {
            let ack = ack_text(&command);
            let _ = tx
                .send(AssistantEvent::Delta {
                    content: ack.clone(),
                }
                .to_frame())
                .await;
            let _ = tx.send(sse_done()).await;

            match executor.execute(std::slice::from_ref(&command), &ctx).await {
                Ok(report) => {
                    for event in report_events(&report) {
                        let _ = tx.send(event.to_frame()).await;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        conversation = %ctx.conversation_id,
                        error = %err,
                        "fast-path execution failed"
                    );
                }
            }

            if let Err(err) = transcript
                .save(&ctx.user_id, &ctx.conversation_id, &ack)
                .await
            {
                tracing::warn!(
                    conversation = %ctx.conversation_id,
                    error = %err,
                    "transcript save failed"
                );
            }
        });

        rx
    }

    /// Delegated path: upstream call through the breaker, then the stream
    /// processor in a background task.
    async fn delegate(
        &self,
        text: &str,
        ctx: RequestContext,
    ) -> Result<AssistantReply, CoreError> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(text),
        ];

        let provider = self.provider.clone();
        let breaker_key = provider.name().to_string();
        let upstream = self
            .breaker
            .call_with(&breaker_key, self.breaker_policy, || async move {
                provider.stream_chat(&messages).await
            })
            .await?;

        let (tx, rx) = mpsc::channel(64);
        let processor = self.processor.clone();
        tokio::spawn(async move {
            processor.run(upstream, tx, &ctx).await;
        });
        Ok(AssistantReply::Stream(rx))
    }
}

/// Short confirmation text for a fast-path command.
fn ack_text(command: &Command) -> String {
    match command {
        Command::Navigation { label, .. } => format!("Opening {label}."),
        Command::TaskCreate { title } => format!("Task \"{title}\" created."),
        Command::TaskComplete { task_id } => format!("Task {task_id} completed."),
        Command::WorkspaceSwitch { target_type } => {
            format!("Switched to the {target_type} workspace.")
        }
        Command::TasksFilter { filter } => format!("Showing {filter} tasks."),
        Command::NewsSourcesOpen => "Opening news sources.".to_string(),
        Command::NewsSearch { query } => format!("Searching news for \"{query}\"."),
        Command::NewsTabSwitch { tab_name } => format!("Switching to the {tab_name} tab."),
    }
}

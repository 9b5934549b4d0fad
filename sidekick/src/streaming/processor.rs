//! Streaming directive processor.
//!
//! Sits between the upstream model stream and the client: reassembles
//! frames, forwards cleaned text deltas as they arrive, and once the stream
//! ends extracts embedded directive blocks from the accumulated raw text,
//! executes them exactly once and reports the outcomes as synthesized
//! events. The terminal sentinel is forwarded *before* directive execution;
//! visible text never waits on side effects.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::errors::CoreError;
use crate::executor::{ActionExecutor, TranscriptSink};
use crate::streaming::buffer::TailBuffer;
use crate::streaming::directives::{extract_commands, VisibleCleaner};
use crate::streaming::{
    data_payloads, report_events, sse_done, sse_frame, AssistantEvent, FrameSplitter,
    DONE_SENTINEL,
};
use crate::types::{ExecutionReport, RequestContext};

/// Default cap for the raw text accumulator.
const DEFAULT_RAW_BUFFER_CAP: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Upper bound, in bytes, on retained raw generated text.
    pub raw_buffer_cap: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            raw_buffer_cap: DEFAULT_RAW_BUFFER_CAP,
        }
    }
}

/// One processor instance serves many requests; per-request state lives in
/// [`RunState`].
pub struct DirectiveStreamProcessor {
    executor: Arc<dyn ActionExecutor>,
    transcript: Arc<dyn TranscriptSink>,
    config: ProcessorConfig,
}

/// Transient per-request state (one per in-flight delegated request).
struct RunState {
    splitter: FrameSplitter,
    raw: TailBuffer,
    cleaner: VisibleCleaner,
    visible: String,
    saw_sentinel: bool,
    client_gone: bool,
}

impl RunState {
    fn new(config: &ProcessorConfig) -> Self {
        Self {
            splitter: FrameSplitter::new(),
            raw: TailBuffer::new(config.raw_buffer_cap),
            cleaner: VisibleCleaner::new(),
            visible: String::new(),
            saw_sentinel: false,
            client_gone: false,
        }
    }
}

impl DirectiveStreamProcessor {
    pub fn new(executor: Arc<dyn ActionExecutor>, transcript: Arc<dyn TranscriptSink>) -> Self {
        Self {
            executor,
            transcript,
            config: ProcessorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Drive one delegated request: consume `upstream`, emit frames on `out`.
    ///
    /// Never returns an error to the caller; every fault is reported on the
    /// output stream (generic message) and logged with detail server-side.
    pub async fn run<S, E>(&self, upstream: S, out: mpsc::Sender<String>, ctx: &RequestContext)
    where
        S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut state = RunState::new(&self.config);

        match self.pump(upstream, &out, ctx, &mut state).await {
            Ok(()) if state.client_gone => {
                tracing::debug!(
                    conversation = %ctx.conversation_id,
                    "client disconnected mid-stream, directive pass skipped"
                );
            }
            Ok(()) => {
                // Flush whatever the cleaner still holds, then close the
                // visible stream before any directive work happens.
                let tail = state.cleaner.finish();
                if !tail.is_empty() {
                    state.visible.push_str(&tail);
                    self.send(&out, AssistantEvent::Delta { content: tail }.to_frame(), &mut state)
                        .await;
                }
                self.send(&out, sse_done(), &mut state).await;
                self.execute_directives(&out, ctx, &mut state).await;
            }
            Err(err) => {
                tracing::error!(
                    conversation = %ctx.conversation_id,
                    error = %err,
                    "stream processing fault"
                );
                let event = AssistantEvent::Error {
                    message: "assistant stream interrupted".to_string(),
                };
                self.send(&out, event.to_frame(), &mut state).await;
            }
        }

        self.persist(ctx, &state).await;
    }

    /// The per-chunk loop of the processing state machine. Returns after the
    /// sentinel, on upstream end, on client disconnect, or with the first
    /// processing fault.
    async fn pump<S, E>(
        &self,
        mut upstream: S,
        out: &mpsc::Sender<String>,
        ctx: &RequestContext,
        state: &mut RunState,
    ) -> Result<(), CoreError>
    where
        S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
        E: std::fmt::Display,
    {
        while let Some(chunk) = upstream.next().await {
            let chunk = chunk.map_err(|e| CoreError::Stream(e.to_string()))?;
            for frame in state.splitter.push(&chunk) {
                self.handle_frame(&frame, out, state).await;
                if state.saw_sentinel || state.client_gone {
                    return Ok(());
                }
            }
            if state.client_gone {
                return Ok(());
            }
        }

        // Upstream closed without a sentinel; a trailing fragment may still
        // hold text worth showing.
        if let Some(frame) = state.splitter.finish() {
            tracing::warn!(
                conversation = %ctx.conversation_id,
                "upstream ended without sentinel, processing trailing fragment"
            );
            self.handle_frame(&frame, out, state).await;
        }
        Ok(())
    }

    async fn handle_frame(&self, frame: &str, out: &mpsc::Sender<String>, state: &mut RunState) {
        for payload in data_payloads(frame) {
            if payload == DONE_SENTINEL {
                state.saw_sentinel = true;
                return;
            }
            self.handle_payload(&payload, out, state).await;
            if state.client_gone {
                return;
            }
        }
    }

    async fn handle_payload(&self, payload: &str, out: &mpsc::Sender<String>, state: &mut RunState) {
        let Ok(event) = serde_json::from_str::<serde_json::Value>(payload) else {
            // Unknown upstream payloads must not be dropped.
            self.send(out, sse_frame(payload), state).await;
            return;
        };

        let Some(delta) = text_delta(&event) else {
            // Parseable but not a text delta: control frame, pass through.
            self.send(out, sse_frame(payload), state).await;
            return;
        };

        state.raw.push(delta);
        let cleaned = state.cleaner.push(delta);
        if !cleaned.is_empty() {
            state.visible.push_str(&cleaned);
            self.send(out, AssistantEvent::Delta { content: cleaned }.to_frame(), state)
                .await;
        }
    }

    /// End-of-stream directive pass: re-scan the full raw accumulator so
    /// blocks split across deltas are caught, execute each well-formed
    /// non-empty block once, and report outcomes.
    async fn execute_directives(
        &self,
        out: &mpsc::Sender<String>,
        ctx: &RequestContext,
        state: &mut RunState,
    ) {
        for commands in extract_commands(state.raw.as_str()) {
            tracing::info!(
                conversation = %ctx.conversation_id,
                count = commands.len(),
                "executing directive block"
            );
            let report = match self.executor.execute(&commands, ctx).await {
                Ok(report) => report,
                Err(err) => {
                    tracing::warn!(
                        conversation = %ctx.conversation_id,
                        error = %err,
                        "directive execution failed"
                    );
                    continue;
                }
            };
            self.emit_report_events(&report, out, state).await;
        }
    }

    async fn emit_report_events(
        &self,
        report: &ExecutionReport,
        out: &mpsc::Sender<String>,
        state: &mut RunState,
    ) {
        for event in report_events(report) {
            self.send(out, event.to_frame(), state).await;
        }
    }

    /// Exactly-once post-close persistence of the visible text. Blank text
    /// is not worth a write; failures are logged, never propagated.
    async fn persist(&self, ctx: &RequestContext, state: &RunState) {
        if state.visible.trim().is_empty() {
            return;
        }
        if let Err(err) = self
            .transcript
            .save(&ctx.user_id, &ctx.conversation_id, &state.visible)
            .await
        {
            tracing::warn!(
                conversation = %ctx.conversation_id,
                error = %err,
                "transcript save failed"
            );
        }
    }

    async fn send(&self, out: &mpsc::Sender<String>, frame: String, state: &mut RunState) {
        if state.client_gone {
            return;
        }
        if out.send(frame).await.is_err() {
            // Receiver dropped: stop the read loop at the next suspension
            // point; already-dispatched executor calls run to completion.
            state.client_gone = true;
        }
    }
}

/// Text delta of an upstream chat-completion chunk, if present.
fn text_delta(event: &serde_json::Value) -> Option<&str> {
    event
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{InMemoryActionExecutor, InMemoryTranscriptSink};
    use crate::types::Command;
    use futures::stream;
    use pretty_assertions::assert_eq;

    fn delta_frame(text: &str) -> String {
        let payload = serde_json::json!({"choices": [{"delta": {"content": text}}]});
        format!("data: {}\n\n", payload)
    }

    fn done_frame() -> String {
        "data: [DONE]\n\n".to_string()
    }

    struct Harness {
        executor: Arc<InMemoryActionExecutor>,
        transcript: Arc<InMemoryTranscriptSink>,
        processor: DirectiveStreamProcessor,
    }

    fn harness() -> Harness {
        let executor = Arc::new(InMemoryActionExecutor::new());
        let transcript = Arc::new(InMemoryTranscriptSink::new());
        let processor = DirectiveStreamProcessor::new(executor.clone(), transcript.clone());
        Harness {
            executor,
            transcript,
            processor,
        }
    }

    async fn run_chunks(h: &Harness, chunks: Vec<&[u8]>) -> Vec<String> {
        let upstream = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, CoreError>(c.to_vec()))
                .collect::<Vec<_>>(),
        );
        let (tx, mut rx) = mpsc::channel(64);
        let ctx = RequestContext::new("u1", "w1");
        h.processor.run(upstream, tx, &ctx).await;

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn deltas(frames: &[String]) -> String {
        frames
            .iter()
            .filter_map(|f| {
                let payloads = data_payloads(f.trim_end());
                let payload = payloads.first()?.clone();
                match serde_json::from_str::<AssistantEvent>(&payload) {
                    Ok(AssistantEvent::Delta { content }) => Some(content),
                    _ => None,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn plain_text_passes_through_cleaned() {
        let h = harness();
        let chunks = [delta_frame("Привет, "), delta_frame("мир!"), done_frame()].join("");
        let frames = run_chunks(&h, vec![chunks.as_bytes()]).await;

        assert_eq!(deltas(&frames), "Привет, мир!");
        assert!(frames.iter().any(|f| f == &sse_done()));
        assert!(h.executor.executed().is_empty());
    }

    #[tokio::test]
    async fn scenario_c_marker_split_across_chunks() {
        let h = harness();
        // The upstream emits one delta whose directive marker is split
        // between two transport chunks *inside the marker*.
        let full = [
            delta_frame("Done.[ACT"),
            delta_frame("IONS]{\"actions\":[{\"k\":\"task.complete\",\"taskId\":\"t1\"}]}[/ACTIONS]"),
            done_frame(),
        ]
        .join("");
        let split_at = full.find("IONS").unwrap();
        let (a, b) = full.as_bytes().split_at(split_at);
        let frames = run_chunks(&h, vec![a, b]).await;

        assert_eq!(deltas(&frames), "Done.");
        assert_eq!(
            h.executor.executed(),
            vec![Command::TaskComplete {
                task_id: "t1".into()
            }]
        );

        // Sentinel comes before the directive-derived refresh event.
        let done_idx = frames.iter().position(|f| f == &sse_done()).unwrap();
        let refresh_idx = frames
            .iter()
            .position(|f| f.contains("\"refresh\""))
            .unwrap();
        assert!(done_idx < refresh_idx);
        assert!(frames[refresh_idx].contains("\"tasks\""));
    }

    #[tokio::test]
    async fn directive_execution_happens_exactly_once() {
        let h = harness();
        let body = format!(
            "Готово!{}",
            "[ACTIONS]{\"actions\":[{\"k\":\"task.create\",\"title\":\"хлеб\"}]}[/ACTIONS]"
        );
        let stream_text = [delta_frame(&body), done_frame()].join("");
        run_chunks(&h, vec![stream_text.as_bytes()]).await;

        assert_eq!(
            h.executor.executed(),
            vec![Command::TaskCreate {
                title: "хлеб".into()
            }]
        );
    }

    #[tokio::test]
    async fn malformed_directive_is_silent() {
        let h = harness();
        let body = "Ок.[ACTIONS]{oops[/ACTIONS]";
        let stream_text = [delta_frame(body), done_frame()].join("");
        let frames = run_chunks(&h, vec![stream_text.as_bytes()]).await;

        assert!(h.executor.executed().is_empty());
        assert!(!frames.iter().any(|f| f.contains("\"error\"")));
        assert_eq!(deltas(&frames), "Ок.");
    }

    #[tokio::test]
    async fn navigation_outcome_emits_navigation_event() {
        let h = harness();
        let body = "[ACTIONS]{\"actions\":[{\"k\":\"navigation\",\"target\":\"/news\",\"label\":\"Новости\"}]}[/ACTIONS]";
        let stream_text = [delta_frame("Открываю."), delta_frame(body), done_frame()].join("");
        let frames = run_chunks(&h, vec![stream_text.as_bytes()]).await;

        assert!(frames
            .iter()
            .any(|f| f.contains("\"navigation\"") && f.contains("/news")));
    }

    #[tokio::test]
    async fn unknown_payloads_are_forwarded_verbatim() {
        let h = harness();
        let chunks = [
            "data: not-json-at-all\n\n".to_string(),
            delta_frame("hi"),
            done_frame(),
        ]
        .join("");
        let frames = run_chunks(&h, vec![chunks.as_bytes()]).await;
        assert!(frames.contains(&sse_frame("not-json-at-all")));
    }

    #[tokio::test]
    async fn control_frames_pass_through() {
        let h = harness();
        let control = serde_json::json!({"choices": [{"delta": {"role": "assistant"}}]});
        let chunks = [
            format!("data: {}\n\n", control),
            delta_frame("ok"),
            done_frame(),
        ]
        .join("");
        let frames = run_chunks(&h, vec![chunks.as_bytes()]).await;
        assert!(frames.iter().any(|f| f.contains("\"role\"")));
    }

    #[tokio::test]
    async fn stream_fault_emits_generic_error_event() {
        let h = harness();
        let upstream = stream::iter(vec![
            Ok::<_, CoreError>(delta_frame("partial").into_bytes()),
            Err(CoreError::Upstream("connection reset".into())),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let ctx = RequestContext::new("u1", "w1");
        h.processor.run(upstream, tx, &ctx).await;

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        let last = frames.last().unwrap();
        assert!(last.contains("\"error\""));
        assert!(
            !last.contains("connection reset"),
            "detail must stay server-side"
        );
    }

    #[tokio::test]
    async fn transcript_saved_once_after_close() {
        let h = harness();
        let stream_text = [delta_frame("Привет!"), done_frame()].join("");
        run_chunks(&h, vec![stream_text.as_bytes()]).await;

        let entries = h.transcript.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Привет!");
    }

    #[tokio::test]
    async fn blank_visible_text_is_not_persisted() {
        let h = harness();
        let body = "[ACTIONS]{\"actions\":[{\"k\":\"news.sources.open\"}]}[/ACTIONS]";
        let stream_text = [delta_frame(body), done_frame()].join("");
        run_chunks(&h, vec![stream_text.as_bytes()]).await;

        assert!(h.transcript.entries().is_empty());
        assert_eq!(h.executor.executed(), vec![Command::NewsSourcesOpen]);
    }

    #[tokio::test]
    async fn directive_near_end_of_long_response_survives_truncation() {
        let executor = Arc::new(InMemoryActionExecutor::new());
        let transcript = Arc::new(InMemoryTranscriptSink::new());
        let processor = DirectiveStreamProcessor::new(executor.clone(), transcript.clone())
            .with_config(ProcessorConfig { raw_buffer_cap: 256 });

        let long_prose = "слово ".repeat(500);
        let body = format!(
            "{long_prose}[ACTIONS]{{\"actions\":[{{\"k\":\"tasks.filter\",\"filter\":\"active\"}}]}}[/ACTIONS]"
        );
        let stream_text = [delta_frame(&body), done_frame()].join("");

        let upstream = stream::iter(vec![Ok::<_, CoreError>(stream_text.into_bytes())]);
        let (tx, mut rx) = mpsc::channel(1024);
        let ctx = RequestContext::new("u1", "w1");
        processor.run(upstream, tx, &ctx).await;
        while rx.try_recv().is_ok() {}

        assert_eq!(
            executor.executed(),
            vec![Command::TasksFilter {
                filter: "active".into()
            }]
        );
    }
}

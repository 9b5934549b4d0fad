//! Collaborator contracts: action execution and transcript persistence.
//!
//! The core never performs side effects itself. It hands typed command
//! lists to an [`ActionExecutor`] and finished assistant text to a
//! [`TranscriptSink`]. The in-memory implementations back tests and the CLI.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::CoreError;
use crate::types::{ActionResult, Command, ExecutionReport, RequestContext};

/// Performs the side effects described by a command list.
///
/// Implementations must not fail for individual commands: a bad command is
/// reported as an unsuccessful [`ActionResult`] entry so it never blocks the
/// rest of the list. An `Err` return means the whole invocation could not be
/// attempted (e.g. the backing service is unreachable).
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        commands: &[Command],
        ctx: &RequestContext,
    ) -> Result<ExecutionReport, CoreError>;
}

/// Receives the accumulated assistant text once per request, after the
/// response stream closes. Best-effort: callers log failures and move on.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn save(
        &self,
        user_id: &str,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), CoreError>;
}

/// Recording executor: acknowledges every command as successful and tracks
/// what was executed.
#[derive(Debug, Default)]
pub struct InMemoryActionExecutor {
    executed: Mutex<Vec<Command>>,
}

impl InMemoryActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<Command> {
        self.executed.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ActionExecutor for InMemoryActionExecutor {
    async fn execute(
        &self,
        commands: &[Command],
        _ctx: &RequestContext,
    ) -> Result<ExecutionReport, CoreError> {
        let mut report = ExecutionReport::default();
        for command in commands {
            if let Command::Navigation { target, .. } = command {
                report.navigation = Some(target.clone());
            }
            report.results.push(ActionResult::ok(command.kind()));
        }
        if let Ok(mut guard) = self.executed.lock() {
            guard.extend_from_slice(commands);
        }
        Ok(report)
    }
}

/// One stored transcript entry.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub user_id: String,
    pub conversation_id: String,
    pub text: String,
    pub saved_at: DateTime<Utc>,
}

/// Transcript sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct InMemoryTranscriptSink {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl InMemoryTranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptSink for InMemoryTranscriptSink {
    async fn save(
        &self,
        user_id: &str,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        let entry = TranscriptEntry {
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
            saved_at: Utc::now(),
        };
        self.entries
            .lock()
            .map_err(|_| CoreError::Persistence("transcript store poisoned".into()))?
            .push(entry);
        Ok(())
    }
}

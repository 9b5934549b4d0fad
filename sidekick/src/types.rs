//! Shared data types for the assistant core.
//!
//! [`Command`] is the single currency between the deterministic router, the
//! directive blocks embedded in generated text, and the action executor: a
//! command *describes* an action and carries no side effects itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One resolvable action. The wire representation uses the `k` discriminator
/// field so directive blocks stay compact: `{"k":"task.create","title":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "k")]
pub enum Command {
    #[serde(rename = "navigation")]
    Navigation { target: String, label: String },

    #[serde(rename = "task.create")]
    TaskCreate { title: String },

    /// Only produced by directive blocks; the fast path never completes tasks.
    #[serde(rename = "task.complete", rename_all = "camelCase")]
    TaskComplete { task_id: String },

    #[serde(rename = "workspace.switch", rename_all = "camelCase")]
    WorkspaceSwitch { target_type: String },

    #[serde(rename = "tasks.filter")]
    TasksFilter { filter: String },

    #[serde(rename = "news.sources.open")]
    NewsSourcesOpen,

    #[serde(rename = "news.search")]
    NewsSearch { query: String },

    #[serde(rename = "news.tab.switch", rename_all = "camelCase")]
    NewsTabSwitch { tab_name: String },
}

impl Command {
    /// Stable action name, identical to the wire discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Navigation { .. } => "navigation",
            Command::TaskCreate { .. } => "task.create",
            Command::TaskComplete { .. } => "task.complete",
            Command::WorkspaceSwitch { .. } => "workspace.switch",
            Command::TasksFilter { .. } => "tasks.filter",
            Command::NewsSourcesOpen => "news.sources.open",
            Command::NewsSearch { .. } => "news.search",
            Command::NewsTabSwitch { .. } => "news.tab.switch",
        }
    }
}

/// A handler's bid for an input, used only during selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerMatch {
    pub command: Command,
    /// Relative confidence in 0..=100.
    pub confidence: u8,
}

/// Static catalog entry describing one application section. The catalog is
/// the single source of truth for navigation resolution and is never mutated
/// after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub sidebar: bool,
}

/// Per-command outcome reported by the action executor. The core only
/// interprets the `action` prefix (`task.`, `news.`, `delivery.`) when
/// grouping client refresh events; everything else is opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionResult {
    pub fn ok(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            success: true,
            message: None,
            data: None,
        }
    }

    /// Domain prefix of the action name (`task.create` -> `task`).
    pub fn domain(&self) -> &str {
        self.action.split('.').next().unwrap_or(&self.action)
    }
}

/// Aggregate result of one executor invocation. Individual command failures
/// are reported as entries in `results`, never as errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<String>,
    #[serde(default)]
    pub results: Vec<ActionResult>,
}

/// Identity and placement of one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub workspace_id: String,
    pub conversation_id: String,
    /// Path the client currently displays, when known.
    pub current_path: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            workspace_id: workspace_id.into(),
            conversation_id: Uuid::new_v4().to_string(),
            current_path: None,
        }
    }

    pub fn with_current_path(mut self, path: impl Into<String>) -> Self {
        self.current_path = Some(path.into());
        self
    }
}

/// One message of the upstream chat payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_wire_format_uses_k_discriminator() {
        let cmd = Command::TaskComplete {
            task_id: "t1".into(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"k":"task.complete","taskId":"t1"}"#);

        let parsed: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn unit_command_round_trips() {
        let cmd: Command = serde_json::from_str(r#"{"k":"news.sources.open"}"#).unwrap();
        assert_eq!(cmd, Command::NewsSourcesOpen);
    }

    #[test]
    fn action_result_domain_is_prefix() {
        assert_eq!(ActionResult::ok("task.create").domain(), "task");
        assert_eq!(ActionResult::ok("delivery.status").domain(), "delivery");
        assert_eq!(ActionResult::ok("noprefix").domain(), "noprefix");
    }
}

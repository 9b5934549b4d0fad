//! Streaming wire format and the directive processor.
//!
//! The assistant speaks a frame-delimited event stream both ways: frames are
//! separated by a blank line, carry `data:` payload lines and end with the
//! `[DONE]` sentinel. The fast path synthesizes these frames locally; the
//! delegated path rewrites the upstream model stream into them. Clients see
//! identical framing either way.

pub mod buffer;
pub mod directives;
pub mod processor;

use serde::{Deserialize, Serialize};

pub use buffer::TailBuffer;
pub use directives::{VisibleCleaner, ACTIONS_CLOSE, ACTIONS_OPEN};
pub use processor::{DirectiveStreamProcessor, ProcessorConfig};

/// Reserved payload marking end-of-stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// Wrap a payload into one SSE frame.
pub fn sse_frame(payload: &str) -> String {
    format!("data: {}\n\n", payload)
}

/// The terminal frame.
pub fn sse_done() -> String {
    sse_frame(DONE_SENTINEL)
}

/// Extract the `data:` payloads of one complete frame. Other fields
/// (`event:`, `id:`, comments) are ignored.
pub fn data_payloads(frame: &str) -> Vec<String> {
    frame
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let payload = line.strip_prefix(DATA_PREFIX)?;
            Some(payload.strip_prefix(' ').unwrap_or(payload).to_string())
        })
        .collect()
}

/// Events the processor synthesizes for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// Incremental visible text.
    Delta { content: String },
    /// The client should navigate to `target`.
    Navigation { target: String },
    /// The client should refresh one data domain ("tasks", "news", "delivery").
    Refresh { scope: String },
    /// Generic stream fault; details stay server-side.
    Error { message: String },
}

impl AssistantEvent {
    pub fn to_frame(&self) -> String {
        sse_frame(&serde_json::to_string(self).unwrap_or_default())
    }
}

/// Events describing one execution report: a navigation event when the
/// executor reported one, then one grouped refresh per domain prefix
/// observed among the outcomes.
pub fn report_events(report: &crate::types::ExecutionReport) -> Vec<AssistantEvent> {
    let mut events = Vec::new();
    if let Some(target) = &report.navigation {
        events.push(AssistantEvent::Navigation {
            target: target.clone(),
        });
    }

    let mut scopes: Vec<&str> = Vec::new();
    for result in &report.results {
        let Some(scope) = refresh_scope(result.domain()) else {
            continue;
        };
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }
    for scope in scopes {
        events.push(AssistantEvent::Refresh {
            scope: scope.to_string(),
        });
    }
    events
}

/// Client refresh scope for an outcome domain. Domains the core does not
/// recognize produce no refresh event.
fn refresh_scope(domain: &str) -> Option<&'static str> {
    match domain {
        "task" | "tasks" => Some("tasks"),
        "news" => Some("news"),
        "delivery" => Some("delivery"),
        _ => None,
    }
}

/// Reassembles frames from transport chunks that are not aligned to frame
/// boundaries. The trailing incomplete fragment is carried over until its
/// delimiter arrives.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    remainder: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns every newly completed frame.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.remainder.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((end, skip)) = find_delimiter(&self.remainder) {
            let frame: Vec<u8> = self.remainder.drain(..end + skip).collect();
            let text = String::from_utf8_lossy(&frame[..end]).into_owned();
            if !text.trim().is_empty() {
                frames.push(text);
            }
        }
        frames
    }

    /// Hand out whatever is left once the transport ends. Upstreams are
    /// supposed to terminate with a sentinel frame, but a truncated stream
    /// must not swallow its final piece.
    pub fn finish(&mut self) -> Option<String> {
        if self.remainder.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.remainder).into_owned();
        self.remainder.clear();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Position and length of the first frame delimiter (`\n\n` or `\r\n\r\n`).
fn find_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len().saturating_sub(1) {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len() && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some((i, 4));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splitter_handles_aligned_frames() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.push(b"data: one\n\ndata: two\n\n");
        assert_eq!(frames, vec!["data: one".to_string(), "data: two".to_string()]);
        assert!(splitter.finish().is_none());
    }

    #[test]
    fn splitter_carries_partial_frames_across_chunks() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push(b"data: hel").is_empty());
        let frames = splitter.push(b"lo\n\ndata: wor");
        assert_eq!(frames, vec!["data: hello".to_string()]);
        let frames = splitter.push(b"ld\n\n");
        assert_eq!(frames, vec!["data: world".to_string()]);
    }

    #[test]
    fn splitter_handles_crlf_delimiters() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.push(b"data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(data_payloads(&frames[0]), vec!["one".to_string()]);
    }

    #[test]
    fn splitter_keeps_multibyte_text_intact_across_chunks() {
        let text = "data: привет мир\n\n".as_bytes();
        let (a, b) = text.split_at(9); // split inside a Cyrillic codepoint
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push(a).is_empty());
        let frames = splitter.push(b);
        assert_eq!(data_payloads(&frames[0]), vec!["привет мир".to_string()]);
    }

    #[test]
    fn finish_returns_trailing_fragment() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push(b"data: tail").is_empty());
        assert_eq!(splitter.finish(), Some("data: tail".to_string()));
        assert!(splitter.finish().is_none());
    }

    #[test]
    fn data_payloads_extracts_all_lines() {
        let frame = "event: message\ndata: first\ndata: second\nid: 3";
        assert_eq!(
            data_payloads(frame),
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(data_payloads("data:nospace"), vec!["nospace".to_string()]);
        assert!(data_payloads(": comment").is_empty());
    }

    #[test]
    fn report_events_group_refreshes_by_domain() {
        use crate::types::{ActionResult, ExecutionReport};

        let report = ExecutionReport {
            navigation: Some("/tasks".into()),
            results: vec![
                ActionResult::ok("task.create"),
                ActionResult::ok("task.complete"),
                ActionResult::ok("news.search"),
                ActionResult::ok("navigation"),
            ],
        };

        let events = report_events(&report);
        assert_eq!(
            events,
            vec![
                AssistantEvent::Navigation {
                    target: "/tasks".into()
                },
                AssistantEvent::Refresh {
                    scope: "tasks".into()
                },
                AssistantEvent::Refresh {
                    scope: "news".into()
                },
            ]
        );
    }

    #[test]
    fn event_frames_round_trip() {
        let event = AssistantEvent::Refresh {
            scope: "tasks".into(),
        };
        let frame = event.to_frame();
        assert_eq!(frame, "data: {\"type\":\"refresh\",\"scope\":\"tasks\"}\n\n");

        let payloads = data_payloads(frame.trim_end());
        let parsed: AssistantEvent = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(parsed, event);
    }
}

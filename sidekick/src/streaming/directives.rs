//! Directive blocks embedded in generated text.
//!
//! The model may interleave machine-actionable commands with prose:
//! `[ACTIONS]{"actions":[{"k":"task.create","title":"..."}]}[/ACTIONS]`,
//! optionally wrapped in a fenced code block. This module extracts and
//! parses the blocks, and keeps them out of the text the user sees.

use serde::Deserialize;

use crate::types::Command;

/// Opening marker of a directive block.
pub const ACTIONS_OPEN: &str = "[ACTIONS]";
/// Closing marker of a directive block.
pub const ACTIONS_CLOSE: &str = "[/ACTIONS]";

#[derive(Debug, Deserialize)]
struct DirectivePayload {
    actions: Vec<Command>,
}

/// Inner contents of every closed directive block, in order of appearance.
pub fn extract_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(ACTIONS_OPEN) {
        let after_open = &rest[open + ACTIONS_OPEN.len()..];
        let Some(close) = after_open.find(ACTIONS_CLOSE) else {
            break;
        };
        blocks.push(&after_open[..close]);
        rest = &after_open[close + ACTIONS_CLOSE.len()..];
    }
    blocks
}

/// Parse one block's inner text into a command list. `None` for anything
/// malformed; a syntax error in one block must not abort the others.
pub fn parse_block(inner: &str) -> Option<Vec<Command>> {
    let inner = strip_code_fence(inner);
    match serde_json::from_str::<DirectivePayload>(inner) {
        Ok(payload) => Some(payload.actions),
        Err(err) => {
            tracing::debug!(error = %err, "skipping malformed directive block");
            None
        }
    }
}

/// All well-formed, non-empty command lists found in `text`, one entry per
/// directive block. Deterministic and idempotent: scanning the same text
/// twice yields the same lists.
pub fn extract_commands(text: &str) -> Vec<Vec<Command>> {
    extract_blocks(text)
        .into_iter()
        .filter_map(parse_block)
        .filter(|commands| !commands.is_empty())
        .collect()
}

/// Remove an optional ``` fence (with or without a language tag) around `s`.
pub fn strip_code_fence(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line, if any.
    let rest = match rest.find('\n') {
        Some(nl) if rest[..nl].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[nl + 1..],
        _ => rest,
    };
    rest.trim()
}

/// Incremental cleaner for the visible text stream.
///
/// Fully-closed directive blocks are dropped from the emitted text. Anything
/// from an unmatched opening marker on (including a trailing partial prefix
/// of the marker) is held back until the block closes or the stream ends,
/// so markup split across chunk boundaries never leaks to the client.
#[derive(Debug, Default)]
pub struct VisibleCleaner {
    held: String,
}

impl VisibleCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw delta; returns the text that is now safe to show.
    pub fn push(&mut self, delta: &str) -> String {
        self.held.push_str(delta);

        let mut out = String::new();
        loop {
            match self.held.find(ACTIONS_OPEN) {
                Some(open) => {
                    out.push_str(&self.held[..open]);
                    let after_open = open + ACTIONS_OPEN.len();
                    match self.held[after_open..].find(ACTIONS_CLOSE) {
                        Some(close) => {
                            // Whole block present: drop it and keep scanning.
                            let resume = after_open + close + ACTIONS_CLOSE.len();
                            self.held.drain(..resume);
                        }
                        None => {
                            // Block still open: hold from the marker on.
                            self.held.drain(..open);
                            return out;
                        }
                    }
                }
                None => {
                    let keep = partial_marker_suffix(&self.held);
                    let emit_to = self.held.len() - keep;
                    out.push_str(&self.held[..emit_to]);
                    self.held.drain(..emit_to);
                    return out;
                }
            }
        }
    }

    /// Flush at end-of-stream. Held text containing a complete opening marker
    /// belongs to an unterminated block and stays suppressed; a bare partial
    /// prefix turned out to be ordinary text and is released.
    pub fn finish(&mut self) -> String {
        let held = std::mem::take(&mut self.held);
        match held.find(ACTIONS_OPEN) {
            Some(open) => held[..open].to_string(),
            None => held,
        }
    }
}

/// Length of the longest suffix of `s` that is a proper prefix of the
/// opening marker.
fn partial_marker_suffix(s: &str) -> usize {
    let max = (ACTIONS_OPEN.len() - 1).min(s.len());
    for keep in (1..=max).rev() {
        if !s.is_char_boundary(s.len() - keep) {
            continue;
        }
        if ACTIONS_OPEN.starts_with(&s[s.len() - keep..]) {
            return keep;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BLOCK: &str = r#"[ACTIONS]{"actions":[{"k":"task.create","title":"молоко"}]}[/ACTIONS]"#;

    #[test]
    fn extracts_commands_from_plain_block() {
        let text = format!("Готово! {BLOCK} Ещё что-нибудь?");
        let lists = extract_commands(&text);
        assert_eq!(lists.len(), 1);
        assert_eq!(
            lists[0],
            vec![Command::TaskCreate {
                title: "молоко".into()
            }]
        );
    }

    #[test]
    fn extracts_multiple_blocks_in_order() {
        let text = format!(
            "{BLOCK} prose [ACTIONS]{{\"actions\":[{{\"k\":\"news.search\",\"query\":\"rust\"}}]}}[/ACTIONS]"
        );
        let lists = extract_commands(&text);
        assert_eq!(lists.len(), 2);
        assert_eq!(
            lists[1],
            vec![Command::NewsSearch {
                query: "rust".into()
            }]
        );
    }

    #[test]
    fn malformed_block_is_skipped_but_later_blocks_survive() {
        let text = format!("[ACTIONS]{{not json[/ACTIONS] middle {BLOCK}");
        let lists = extract_commands(&text);
        assert_eq!(lists.len(), 1);
        assert_eq!(
            lists[0],
            vec![Command::TaskCreate {
                title: "молоко".into()
            }]
        );
    }

    #[test]
    fn empty_action_list_is_not_executed() {
        let text = r#"[ACTIONS]{"actions":[]}[/ACTIONS]"#;
        assert!(extract_commands(text).is_empty());
    }

    #[test]
    fn fenced_block_parses() {
        let inner = "```json\n{\"actions\":[{\"k\":\"news.sources.open\"}]}\n```";
        let commands = parse_block(inner).unwrap();
        assert_eq!(commands, vec![Command::NewsSourcesOpen]);

        let bare = "```\n{\"actions\":[{\"k\":\"news.sources.open\"}]}\n```";
        assert_eq!(parse_block(bare).unwrap(), vec![Command::NewsSourcesOpen]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = format!("A {BLOCK} B");
        assert_eq!(extract_commands(&text), extract_commands(&text));
    }

    #[test]
    fn unknown_discriminator_makes_block_malformed() {
        let text = r#"[ACTIONS]{"actions":[{"k":"quantum.flux"}]}[/ACTIONS]"#;
        assert!(extract_commands(text).is_empty());
    }

    #[test]
    fn cleaner_removes_closed_block_within_one_delta() {
        let mut cleaner = VisibleCleaner::new();
        let out = cleaner.push(&format!("Готово. {BLOCK} Что ещё?"));
        assert_eq!(out, "Готово.  Что ещё?");
        assert_eq!(cleaner.finish(), "");
    }

    #[test]
    fn cleaner_holds_back_marker_split_across_deltas() {
        let mut cleaner = VisibleCleaner::new();
        // Split inside the opening marker, as real transports do.
        let first = cleaner.push("Done.[ACT");
        assert_eq!(first, "Done.");
        let second = cleaner.push(
            "IONS]{\"actions\":[{\"k\":\"task.complete\",\"taskId\":\"t1\"}]}[/ACTIONS]",
        );
        assert_eq!(second, "");
        assert_eq!(cleaner.finish(), "");
    }

    #[test]
    fn cleaner_releases_false_marker_prefix() {
        let mut cleaner = VisibleCleaner::new();
        let first = cleaner.push("see [ACT");
        assert_eq!(first, "see ");
        let second = cleaner.push("ual data]");
        assert_eq!(second, "[ACTual data]");
    }

    #[test]
    fn cleaner_drops_unterminated_block_at_finish() {
        let mut cleaner = VisibleCleaner::new();
        let out = cleaner.push("Text [ACTIONS]{\"actions\":[");
        assert_eq!(out, "Text ");
        assert_eq!(cleaner.finish(), "");
    }

    #[test]
    fn cleaner_flushes_partial_prefix_at_finish() {
        let mut cleaner = VisibleCleaner::new();
        let out = cleaner.push("trailing [AC");
        assert_eq!(out, "trailing ");
        assert_eq!(cleaner.finish(), "[AC");
    }
}

//! Heuristic intent scoring.
//!
//! The scorer never selects a command on its own; handlers consult it to
//! suppress themselves when a competing intent dominates (e.g. a filter word
//! inside a sentence led by a creation verb is a mutation, not a filter).

use crate::router::wordlists::{ACTION_VERBS, NAV_VERBS, PUNCTUATION, QUERY_WORDS};

/// Relative confidence that the input is navigation, a mutation, or a
/// question. Components always sum to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentScores {
    pub navigation: u8,
    pub action: u8,
    pub query: u8,
}

const BASE_NAVIGATION: u32 = 10;
const BASE_ACTION: u32 = 10;
const BASE_QUERY: u32 = 20;
const VERB_BONUS: u32 = 40;
const QUERY_WORD_BONUS: u32 = 30;
const BARE_WORD_BONUS: u32 = 30;
const QUESTION_MARK_BONUS: u32 = 30;

/// Stateless heuristic classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentScorer;

impl IntentScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, text: &str) -> IntentScores {
        let lowered = text.to_lowercase();
        let depunctuated = PUNCTUATION.replace_all(&lowered, " ");
        let words: Vec<&str> = depunctuated.split_whitespace().collect();

        let mut navigation = BASE_NAVIGATION;
        let mut action = BASE_ACTION;
        let mut query = BASE_QUERY;

        for word in &words {
            if NAV_VERBS.contains(word) {
                navigation += VERB_BONUS;
            }
            if ACTION_VERBS.contains(word) {
                action += VERB_BONUS;
            }
            if QUERY_WORDS.contains(word) {
                query += QUERY_WORD_BONUS;
            }
        }

        // A single bare word that is no verb and no interrogative is most
        // likely a section name typed on its own.
        if words.len() == 1 {
            let word = words[0];
            if !NAV_VERBS.contains(word)
                && !ACTION_VERBS.contains(word)
                && !QUERY_WORDS.contains(word)
            {
                navigation += BARE_WORD_BONUS;
            }
        }

        if lowered.trim_end().ends_with('?') {
            query += QUESTION_MARK_BONUS;
        }

        normalize_to_percentages(navigation, action, query)
    }
}

/// Largest-remainder rounding so the three shares always sum to 100.
fn normalize_to_percentages(navigation: u32, action: u32, query: u32) -> IntentScores {
    let total = navigation + action + query;
    let mut shares = [
        (navigation * 100 / total, navigation * 100 % total),
        (action * 100 / total, action * 100 % total),
        (query * 100 / total, query * 100 % total),
    ];
    let assigned: u32 = shares.iter().map(|(share, _)| share).sum();
    let mut leftover = 100 - assigned;

    // Hand the leftover points to the largest remainders, index order on ties.
    while leftover > 0 {
        let mut best = 0;
        for i in 1..shares.len() {
            if shares[i].1 > shares[best].1 {
                best = i;
            }
        }
        shares[best].0 += 1;
        shares[best].1 = 0;
        leftover -= 1;
    }

    IntentScores {
        navigation: shares[0].0 as u8,
        action: shares[1].0 as u8,
        query: shares[2].0 as u8,
    }
}

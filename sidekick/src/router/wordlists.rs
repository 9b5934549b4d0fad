//! Locale-aware word tables used by the scorer, the alias resolver and the
//! command handlers. Russian and English forms live in the same sets; lookups
//! happen on lowercased tokens.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Verbs that signal a mutation request (create/add/delete/complete/finish).
pub static ACTION_VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Russian imperative/infinitive pairs
        "создай", "создайте", "создать", "добавь", "добавьте", "добавить", "удали", "удалите",
        "удалить", "заверши", "завершите", "завершить", "выполни", "выполните", "выполнить",
        "закончи", "закончите", "закончить", "сделай", "сделайте", "сделать",
        // English
        "create", "add", "delete", "remove", "complete", "finish", "make", "new",
    ]
    .into_iter()
    .collect()
});

/// Verbs that signal navigation ("open X", "go to X", "show X").
pub static NAV_VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "открой", "откройте", "открыть", "перейди", "перейдите", "перейти", "покажи",
        "покажите", "показать", "переключись", "переключи", "переключитесь",
        "open", "go", "show", "navigate", "switch",
    ]
    .into_iter()
    .collect()
});

/// Interrogatives and other question markers.
pub static QUERY_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "что", "как", "почему", "зачем", "когда", "где", "кто", "какой", "какая", "какие",
        "сколько", "what", "how", "why", "when", "where", "who", "which",
    ]
    .into_iter()
    .collect()
});

/// Leading "open/go to/show" phrase stripped before alias matching.
pub static LEADING_NAV_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^\s*(?:
            открой(?:те)?|открыть
            |перейди(?:те)?(?:\s+(?:в|на|к))?|перейти(?:\s+(?:в|на|к))?
            |покажи(?:те)?|показать
            |open|show(?:\s+me)?|go\s+to|take\s+me\s+to|navigate\s+to
        )\s+",
    )
    .expect("static regex")
});

/// Anything that is not a letter, digit or whitespace collapses to a space.
pub static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("static regex"));

/// Lowercase, strip a leading navigation phrase, collapse punctuation and
/// squeeze whitespace. Shared by the alias resolver and the scorer.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = LEADING_NAV_PHRASE.replace(&lowered, "");
    let depunctuated = PUNCTUATION.replace_all(&stripped, " ");
    depunctuated.split_whitespace().collect::<Vec<_>>().join(" ")
}

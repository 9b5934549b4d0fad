//! Alias resolution: free text -> application section.
//!
//! Matching runs in strictly decreasing precision: exact, whole-word, then
//! fuzzy. Input that opens with a mutation verb is rejected outright so that
//! "создай задачу календарь" can never be captured as navigation to the
//! calendar.

use std::sync::Arc;

use crate::catalog::SectionCatalog;
use crate::router::wordlists::{normalize, ACTION_VERBS};
use crate::types::Section;

/// Longest normalized input still eligible for fuzzy matching.
const FUZZY_MAX_INPUT_CHARS: usize = 20;
/// Minimum alias length for whole-word matching.
const WORD_MATCH_MIN_CHARS: usize = 4;

/// Side-effect-free resolver over a shared [`SectionCatalog`].
#[derive(Debug, Clone)]
pub struct AliasResolver {
    catalog: Arc<SectionCatalog>,
}

impl AliasResolver {
    pub fn new(catalog: Arc<SectionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SectionCatalog {
        &self.catalog
    }

    /// Resolve free text to a section, or `None` when nothing matches.
    pub fn resolve(&self, text: &str) -> Option<&Section> {
        // Mutation requests are never navigation, regardless of what the
        // rest of the sentence happens to contain.
        if let Some(first) = text.to_lowercase().split_whitespace().next() {
            let first = first.trim_matches(|c: char| !c.is_alphanumeric());
            if ACTION_VERBS.contains(first) {
                return None;
            }
        }

        let needle = normalize(text);
        if needle.is_empty() {
            return None;
        }

        self.exact_match(&needle)
            .or_else(|| self.word_match(&needle))
            .or_else(|| self.fuzzy_match(&needle))
    }

    fn exact_match(&self, needle: &str) -> Option<&Section> {
        self.catalog.sections().iter().find(|section| {
            normalize(&section.title) == needle
                || section.id == needle
                || section.aliases.iter().any(|a| normalize(a) == needle)
        })
    }

    fn word_match(&self, needle: &str) -> Option<&Section> {
        let padded = format!(" {} ", needle);
        self.catalog.sections().iter().find(|section| {
            section.aliases.iter().any(|alias| {
                let alias = normalize(alias);
                alias.chars().count() >= WORD_MATCH_MIN_CHARS
                    && padded.contains(&format!(" {} ", alias))
            })
        })
    }

    fn fuzzy_match(&self, needle: &str) -> Option<&Section> {
        if needle.chars().count() > FUZZY_MAX_INPUT_CHARS {
            return None;
        }

        let mut best: Option<(usize, &Section)> = None;
        for section in self.catalog.sections() {
            let candidates = std::iter::once(section.title.as_str())
                .chain(section.aliases.iter().map(String::as_str));
            for candidate in candidates {
                let candidate = normalize(candidate);
                let len = candidate.chars().count();
                let threshold = (len / 5).max(1);
                let distance = levenshtein_distance(needle, &candidate);
                if distance > threshold {
                    continue;
                }
                // Strict comparison keeps the first-scanned section on ties.
                if best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, section));
                }
            }
        }
        best.map(|(_, section)| section)
    }
}

/// Character-level Levenshtein distance.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b_len {
        matrix[0][j] = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver() -> AliasResolver {
        AliasResolver::new(Arc::new(SectionCatalog::with_defaults()))
    }

    fn resolve_path(text: &str) -> Option<String> {
        resolver().resolve(text).map(|s| s.path.clone())
    }

    #[test]
    fn exact_alias_match() {
        assert_eq!(resolve_path("задачи"), Some("/tasks".into()));
        assert_eq!(resolve_path("news"), Some("/news".into()));
        assert_eq!(resolve_path("Настройки"), Some("/settings".into()));
    }

    #[test]
    fn leading_navigation_verb_is_stripped() {
        assert_eq!(resolve_path("открой задачи"), Some("/tasks".into()));
        assert_eq!(resolve_path("перейди в календарь"), Some("/calendar".into()));
        assert_eq!(resolve_path("go to settings"), Some("/settings".into()));
    }

    #[test]
    fn action_verb_short_circuits_to_none() {
        assert_eq!(resolve_path("создай задачу купить молоко"), None);
        assert_eq!(resolve_path("add task call mom"), None);
        assert_eq!(resolve_path("удали новости"), None);
    }

    #[test]
    fn whole_word_match_inside_longer_text() {
        assert_eq!(resolve_path("открой мои задачи пожалуйста"), Some("/tasks".into()));
        assert_eq!(resolve_path("лента новостей сегодня"), Some("/news".into()));
    }

    #[test]
    fn fuzzy_match_tolerates_typos() {
        // One dropped letter.
        assert_eq!(resolve_path("задчи"), Some("/tasks".into()));
        // One substitution inside a longer alias.
        assert_eq!(resolve_path("настройкв"), Some("/settings".into()));
    }

    #[test]
    fn fuzzy_match_skipped_for_long_input() {
        assert_eq!(resolve_path("очень длинный запрос который не про разделы"), None);
    }

    #[test]
    fn unknown_text_resolves_to_none() {
        assert_eq!(resolve_path("погода"), None);
        assert_eq!(resolve_path(""), None);
        assert_eq!(resolve_path("!!!"), None);
    }

    #[test]
    fn deterministic_resolution() {
        let r = resolver();
        let a = r.resolve("задачи").map(|s| s.id.clone());
        let b = r.resolve("задачи").map(|s| s.id.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn distance_basics() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("задачи", "задчи"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }
}

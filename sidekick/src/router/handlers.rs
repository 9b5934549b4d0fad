//! Command handler strategies.
//!
//! Each handler is an independent, stateless matcher: it either declines or
//! bids a [`HandlerMatch`] with a confidence. Registration order in the
//! router encodes specificity and is the deliberate tie-break, so handlers
//! here make no assumptions about one another beyond that ordering.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::router::alias::AliasResolver;
use crate::router::scorer::IntentScorer;
use crate::router::wordlists::ACTION_VERBS;
use crate::types::{Command, HandlerMatch, RequestContext};

/// Common interface for all fast-path matchers.
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, text: &str, ctx: &RequestContext) -> Option<HandlerMatch>;
}

/// Filter handlers bow out when the mutation score exceeds this.
const FILTER_MAX_ACTION_SCORE: u8 = 40;
/// Navigation bows out when the mutation score exceeds this.
const NAVIGATION_MAX_ACTION_SCORE: u8 = 50;

fn first_word_is_action_verb(text: &str) -> bool {
    text.to_lowercase()
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .is_some_and(|w| ACTION_VERBS.contains(w.as_str()))
}

fn trim_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '«' || c == '»' || c == '\'')
        .trim()
        .to_string()
}

// --- task creation ---------------------------------------------------------

static TASK_CREATE_RU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:создай(?:те)?|создать|добавь(?:те)?|добавить|сделай(?:те)?)\s+(?:(?:нов|общ|личн)\p{L}*\s+){0,2}(?:задачу|таск)\s*[:\-]?\s*(?P<title>.+)$",
    )
    .expect("static regex")
});

static TASK_CREATE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:create|add|make)\s+(?:(?:a|new|shared|personal)\s+){0,2}task\s*[:\-]?\s*(?P<title>.+)$")
        .expect("static regex")
});

/// "создай задачу купить молоко" -> `task.create{title:"купить молоко"}`.
pub struct TaskCreateHandler;

impl CommandHandler for TaskCreateHandler {
    fn name(&self) -> &'static str {
        "task_create"
    }

    fn evaluate(&self, text: &str, _ctx: &RequestContext) -> Option<HandlerMatch> {
        let captures = TASK_CREATE_RU
            .captures(text)
            .or_else(|| TASK_CREATE_EN.captures(text))?;
        let title = trim_title(captures.name("title")?.as_str());
        if title.is_empty() {
            return None;
        }
        Some(HandlerMatch {
            command: Command::TaskCreate { title },
            confidence: 95,
        })
    }
}

// --- workspace switch ------------------------------------------------------

static WORKSPACE_NOUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:пространств\p{L}*|воркспейс\p{L}*|workspace)\b").expect("static regex"));

static WORKSPACE_PERSONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:личн\p{L}*|сво\p{L}*|personal|private)\b").expect("static regex"));

static WORKSPACE_SHARED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:общ\p{L}*|командн\p{L}*|shared|team)\b").expect("static regex"));

/// "переключись на общее пространство" -> `workspace.switch{targetType:"shared"}`.
pub struct WorkspaceSwitchHandler;

impl CommandHandler for WorkspaceSwitchHandler {
    fn name(&self) -> &'static str {
        "workspace_switch"
    }

    fn evaluate(&self, text: &str, _ctx: &RequestContext) -> Option<HandlerMatch> {
        // "добавь общую задачу X" mentions a shared *something* but opens
        // with a mutation verb; that is never a workspace switch.
        if first_word_is_action_verb(text) {
            return None;
        }
        if !WORKSPACE_NOUN.is_match(text) {
            return None;
        }

        let target_type = if WORKSPACE_PERSONAL.is_match(text) {
            "personal"
        } else if WORKSPACE_SHARED.is_match(text) {
            "shared"
        } else {
            return None;
        };

        Some(HandlerMatch {
            command: Command::WorkspaceSwitch {
                target_type: target_type.to_string(),
            },
            confidence: 90,
        })
    }
}

// --- news tab switch -------------------------------------------------------

static TAB_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:вкладк\p{L}*|таб\p{L}*|tab)\b").expect("static regex"));

static TAB_NAMES: [(&str, &Lazy<Regex>); 3] = [
    ("feed", &TAB_FEED),
    ("sources", &TAB_SOURCES),
    ("saved", &TAB_SAVED),
];

static TAB_FEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:лент\p{L}*|feed)\b").expect("static regex"));
static TAB_SOURCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:источник\p{L}*|sources)\b").expect("static regex"));
static TAB_SAVED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:сохранённ\p{L}*|сохраненн\p{L}*|закладк\p{L}*|saved|bookmarks)\b").expect("static regex"));

/// "открой вкладку источники" -> `news.tab.switch{tabName:"sources"}`.
pub struct NewsTabSwitchHandler;

impl CommandHandler for NewsTabSwitchHandler {
    fn name(&self) -> &'static str {
        "news_tab_switch"
    }

    fn evaluate(&self, text: &str, _ctx: &RequestContext) -> Option<HandlerMatch> {
        if !TAB_TOKEN.is_match(text) {
            return None;
        }
        let tab_name = TAB_NAMES
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(name, _)| (*name).to_string())?;
        Some(HandlerMatch {
            command: Command::NewsTabSwitch { tab_name },
            confidence: 85,
        })
    }
}

// --- news sources ----------------------------------------------------------

static NEWS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:новост\p{L}*|news)\b").expect("static regex"));

/// "источники новостей" -> `news.sources.open{}`.
pub struct NewsSourcesOpenHandler;

impl CommandHandler for NewsSourcesOpenHandler {
    fn name(&self) -> &'static str {
        "news_sources_open"
    }

    fn evaluate(&self, text: &str, ctx: &RequestContext) -> Option<HandlerMatch> {
        if first_word_is_action_verb(text) {
            return None;
        }
        if !TAB_SOURCES.is_match(text) {
            return None;
        }
        let in_news = ctx.current_path.as_deref() == Some("/news");
        if !NEWS_TOKEN.is_match(text) && !in_news {
            return None;
        }
        Some(HandlerMatch {
            command: Command::NewsSourcesOpen,
            confidence: 85,
        })
    }
}

// --- task filter -----------------------------------------------------------

static FILTER_COMPLETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:выполненн\p{L}*|завершённ\p{L}*|завершенн\p{L}*|сделанн\p{L}*|completed|done)\b")
        .expect("static regex")
});
static FILTER_ACTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:активн\p{L}*|текущ\p{L}*|незавершённ\p{L}*|незавершенн\p{L}*|active|pending)\b")
        .expect("static regex")
});
static FILTER_ALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:все|all)\b").expect("static regex"));

static TASKS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:задач\p{L}*|таск\p{L}*|task\p{L}*)\b").expect("static regex"));

/// "покажи выполненные" -> `tasks.filter{filter:"completed"}`.
pub struct TaskFilterHandler {
    scorer: Arc<IntentScorer>,
}

impl TaskFilterHandler {
    pub fn new(scorer: Arc<IntentScorer>) -> Self {
        Self { scorer }
    }
}

impl CommandHandler for TaskFilterHandler {
    fn name(&self) -> &'static str {
        "task_filter"
    }

    fn evaluate(&self, text: &str, _ctx: &RequestContext) -> Option<HandlerMatch> {
        // A dominant mutation verb means the filter word is part of the
        // payload ("заверши выполненные..." is not a filter request).
        if self.scorer.score(text).action > FILTER_MAX_ACTION_SCORE {
            return None;
        }

        let filter = if FILTER_COMPLETED.is_match(text) {
            "completed"
        } else if FILTER_ACTIVE.is_match(text) {
            "active"
        } else if FILTER_ALL.is_match(text) && TASKS_TOKEN.is_match(text) {
            // "все" alone is too ambiguous; require a tasks mention.
            "all"
        } else {
            return None;
        };

        // Same confidence as generic navigation; earlier registration is the
        // deliberate tie-break, so "выполненные задачи" filters instead of
        // navigating.
        Some(HandlerMatch {
            command: Command::TasksFilter {
                filter: filter.to_string(),
            },
            confidence: 85,
        })
    }
}

// --- generic navigation ----------------------------------------------------

/// Catch-all navigation via the alias resolver; registered last.
pub struct NavigationHandler {
    resolver: Arc<AliasResolver>,
    scorer: Arc<IntentScorer>,
}

impl NavigationHandler {
    pub fn new(resolver: Arc<AliasResolver>, scorer: Arc<IntentScorer>) -> Self {
        Self { resolver, scorer }
    }
}

impl CommandHandler for NavigationHandler {
    fn name(&self) -> &'static str {
        "navigation"
    }

    fn evaluate(&self, text: &str, _ctx: &RequestContext) -> Option<HandlerMatch> {
        if self.scorer.score(text).action > NAVIGATION_MAX_ACTION_SCORE {
            return None;
        }
        let section = self.resolver.resolve(text)?;
        Some(HandlerMatch {
            command: Command::Navigation {
                target: section.path.clone(),
                label: section.title.clone(),
            },
            confidence: 85,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SectionCatalog;
    use pretty_assertions::assert_eq;

    fn ctx() -> RequestContext {
        RequestContext::new("u1", "w1")
    }

    #[test]
    fn task_create_russian() {
        let m = TaskCreateHandler
            .evaluate("создай задачу купить молоко", &ctx())
            .unwrap();
        assert_eq!(
            m.command,
            Command::TaskCreate {
                title: "купить молоко".into()
            }
        );
        assert_eq!(m.confidence, 95);
    }

    #[test]
    fn task_create_english_and_quotes() {
        let m = TaskCreateHandler
            .evaluate("add a task \"call mom\"", &ctx())
            .unwrap();
        assert_eq!(
            m.command,
            Command::TaskCreate {
                title: "call mom".into()
            }
        );
    }

    #[test]
    fn task_create_declines_without_title() {
        assert!(TaskCreateHandler.evaluate("создай задачу", &ctx()).is_none());
        assert!(TaskCreateHandler.evaluate("открой задачи", &ctx()).is_none());
    }

    #[test]
    fn workspace_switch_targets() {
        let m = WorkspaceSwitchHandler
            .evaluate("переключись на общее пространство", &ctx())
            .unwrap();
        assert_eq!(
            m.command,
            Command::WorkspaceSwitch {
                target_type: "shared".into()
            }
        );

        let m = WorkspaceSwitchHandler
            .evaluate("open my personal workspace", &ctx())
            .unwrap();
        assert_eq!(
            m.command,
            Command::WorkspaceSwitch {
                target_type: "personal".into()
            }
        );
    }

    #[test]
    fn workspace_switch_ignores_mutations() {
        assert!(WorkspaceSwitchHandler
            .evaluate("добавь общую задачу купить хлеб", &ctx())
            .is_none());
    }

    #[test]
    fn news_tab_switch_requires_tab_token() {
        let m = NewsTabSwitchHandler
            .evaluate("открой вкладку источники", &ctx())
            .unwrap();
        assert_eq!(
            m.command,
            Command::NewsTabSwitch {
                tab_name: "sources".into()
            }
        );
        assert!(NewsTabSwitchHandler
            .evaluate("источники новостей", &ctx())
            .is_none());
    }

    #[test]
    fn news_sources_open_matches() {
        let m = NewsSourcesOpenHandler
            .evaluate("источники новостей", &ctx())
            .unwrap();
        assert_eq!(m.command, Command::NewsSourcesOpen);

        // Inside the news section the news mention is implicit.
        let ctx_in_news = ctx().with_current_path("/news");
        let m = NewsSourcesOpenHandler
            .evaluate("покажи источники", &ctx_in_news)
            .unwrap();
        assert_eq!(m.command, Command::NewsSourcesOpen);

        assert!(NewsSourcesOpenHandler
            .evaluate("покажи источники", &ctx())
            .is_none());
    }

    #[test]
    fn task_filter_scenarios() {
        let scorer = Arc::new(IntentScorer::new());
        let handler = TaskFilterHandler::new(scorer);

        let m = handler.evaluate("покажи выполненные", &ctx()).unwrap();
        assert_eq!(
            m.command,
            Command::TasksFilter {
                filter: "completed".into()
            }
        );

        let m = handler.evaluate("покажи все задачи", &ctx()).unwrap();
        assert_eq!(
            m.command,
            Command::TasksFilter {
                filter: "all".into()
            }
        );

        // "все" without a tasks mention is too ambiguous.
        assert!(handler.evaluate("покажи все", &ctx()).is_none());

        // Dominant action verb suppresses the filter.
        assert!(handler
            .evaluate("заверши выполненные задачи", &ctx())
            .is_none());
    }

    #[test]
    fn navigation_handler_matches_sections() {
        let catalog = Arc::new(SectionCatalog::with_defaults());
        let scorer = Arc::new(IntentScorer::new());
        let handler = NavigationHandler::new(Arc::new(AliasResolver::new(catalog)), scorer);

        let m = handler.evaluate("открой календарь", &ctx()).unwrap();
        assert_eq!(
            m.command,
            Command::Navigation {
                target: "/calendar".into(),
                label: "Календарь".into()
            }
        );

        assert!(handler.evaluate("создай задачу календарь", &ctx()).is_none());
    }
}

//! Multi-layer intent routing.
//!
//! The router resolves free-text input to a typed [`Command`] without calling
//! the generative service, or declines so the caller can delegate. Handlers
//! are registered most-specific first; that ordering is the tie-break between
//! equal-confidence matches and must be preserved.

pub mod alias;
pub mod handlers;
pub mod scorer;
pub mod wordlists;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::SectionCatalog;
use crate::types::{Command, HandlerMatch, RequestContext};

pub use alias::AliasResolver;
pub use handlers::{
    CommandHandler, NavigationHandler, NewsSourcesOpenHandler, NewsTabSwitchHandler,
    TaskCreateHandler, TaskFilterHandler, WorkspaceSwitchHandler,
};
pub use scorer::{IntentScorer, IntentScores};

/// Router policy knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Inputs longer than this many words are presumed conversational and
    /// never short-circuit the generative path.
    pub max_words: usize,
    /// Matches below this confidence are discarded.
    pub confidence_floor: u8,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_words: 6,
            confidence_floor: 70,
        }
    }
}

/// Ordered registry of [`CommandHandler`] strategies.
pub struct IntentRouter {
    handlers: Vec<Box<dyn CommandHandler>>,
    config: RouterConfig,
}

impl IntentRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            handlers: Vec::new(),
            config,
        }
    }

    /// Router with the stock handler set over the given catalog, registered
    /// most-specific first: task creation, workspace switch, news-tab switch,
    /// news-sources-open, task filter, generic navigation.
    pub fn with_defaults(catalog: Arc<SectionCatalog>, config: RouterConfig) -> Self {
        let scorer = Arc::new(IntentScorer::new());
        let resolver = Arc::new(AliasResolver::new(catalog));

        let mut router = Self::new(config);
        router.register(Box::new(TaskCreateHandler));
        router.register(Box::new(WorkspaceSwitchHandler));
        router.register(Box::new(NewsTabSwitchHandler));
        router.register(Box::new(NewsSourcesOpenHandler));
        router.register(Box::new(TaskFilterHandler::new(scorer.clone())));
        router.register(Box::new(NavigationHandler::new(resolver, scorer)));
        router
    }

    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        self.handlers.push(handler);
    }

    /// Resolve input to a command, or `None` when the caller should delegate.
    pub fn route(&self, text: &str, ctx: &RequestContext) -> Option<Command> {
        self.route_match(text, ctx).map(|m| m.command)
    }

    /// Like [`route`](Self::route) but keeps the winning confidence around,
    /// which tests and diagnostics care about.
    pub fn route_match(&self, text: &str, ctx: &RequestContext) -> Option<HandlerMatch> {
        if text.split_whitespace().count() > self.config.max_words {
            return None;
        }

        let mut best: Option<(usize, HandlerMatch)> = None;
        for (idx, handler) in self.handlers.iter().enumerate() {
            let Some(m) = handler.evaluate(text, ctx) else {
                continue;
            };
            tracing::debug!(
                handler = handler.name(),
                confidence = m.confidence,
                "handler matched"
            );
            // Strictly-greater keeps the earliest registration on ties.
            if best.as_ref().map_or(true, |(_, b)| m.confidence > b.confidence) {
                best = Some((idx, m));
            }
        }

        let (idx, m) = best?;
        if m.confidence < self.config.confidence_floor {
            tracing::debug!(
                handler = self.handlers[idx].name(),
                confidence = m.confidence,
                floor = self.config.confidence_floor,
                "best match below confidence floor"
            );
            return None;
        }
        Some(m)
    }
}

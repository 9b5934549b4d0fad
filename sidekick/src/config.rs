//! TOML-backed configuration.
//!
//! Every knob has a sensible default, so an empty file (or no file at all)
//! yields a working assistant. Secrets never live here; the model API key
//! is read from the environment variable named in the model section.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::SectionCatalog;
use crate::errors::CoreError;
use crate::llm::ChatModelConfig;
use crate::resilience::{BreakerPolicy, RateLimitPolicy};
use crate::router::RouterConfig;
use crate::streaming::ProcessorConfig;
use crate::types::Section;

/// `[admission]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionSettings {
    pub limit: u32,
    pub window_ms: u64,
    pub sweep_interval_secs: u64,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            limit: 10,
            window_ms: 1000,
            sweep_interval_secs: 60,
        }
    }
}

impl From<AdmissionSettings> for RateLimitPolicy {
    fn from(s: AdmissionSettings) -> Self {
        Self {
            limit: s.limit,
            window: Duration::from_millis(s.window_ms),
            sweep_interval: Duration::from_secs(s.sweep_interval_secs),
        }
    }
}

/// `[breaker]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

impl From<BreakerSettings> for BreakerPolicy {
    fn from(s: BreakerSettings) -> Self {
        Self {
            failure_threshold: s.failure_threshold,
            reset_timeout: Duration::from_millis(s.reset_timeout_ms),
        }
    }
}

/// `[stream]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub raw_buffer_cap: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            raw_buffer_cap: 64 * 1024,
        }
    }
}

impl From<StreamSettings> for ProcessorConfig {
    fn from(s: StreamSettings) -> Self {
        Self {
            raw_buffer_cap: s.raw_buffer_cap,
        }
    }
}

/// Aggregate assistant configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub router: RouterConfig,
    pub admission: AdmissionSettings,
    pub breaker: BreakerSettings,
    pub stream: StreamSettings,
    pub model: ChatModelConfig,
    /// Replaces the built-in section catalog when present.
    pub sections: Option<Vec<Section>>,
}

impl AssistantConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("parse {}: {e}", path.display())))
    }

    /// Section catalog from config, or the built-in defaults.
    pub fn catalog(&self) -> SectionCatalog {
        match &self.sections {
            Some(sections) if !sections.is_empty() => SectionCatalog::new(sections.clone()),
            _ => SectionCatalog::with_defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_policy() {
        let config = AssistantConfig::default();
        assert_eq!(config.router.max_words, 6);
        assert_eq!(config.router.confidence_floor, 70);
        assert_eq!(config.admission.limit, 10);
        assert_eq!(config.admission.window_ms, 1000);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.reset_timeout_ms, 30_000);
        assert_eq!(config.stream.raw_buffer_cap, 64 * 1024);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[admission]
limit = 3

[breaker]
reset_timeout_ms = 5000

[model]
model = "local-test"
"#
        )
        .unwrap();

        let config = AssistantConfig::load(file.path()).unwrap();
        assert_eq!(config.admission.limit, 3);
        assert_eq!(config.admission.window_ms, 1000, "untouched default");
        assert_eq!(config.breaker.reset_timeout_ms, 5000);
        assert_eq!(config.model.model, "local-test");
    }

    #[test]
    fn custom_sections_replace_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[sections]]
id = "inbox"
title = "Inbox"
path = "/inbox"
aliases = ["входящие"]
sidebar = true
"#
        )
        .unwrap();

        let config = AssistantConfig::load(file.path()).unwrap();
        let catalog = config.catalog();
        assert_eq!(catalog.sections().len(), 1);
        assert_eq!(catalog.by_id("inbox").unwrap().path, "/inbox");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = AssistantConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}

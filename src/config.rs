//! Application configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables prefixed `RESEARCH_AGG` (nested keys separated
//! by `__`, e.g. `RESEARCH_AGG__SOURCES__GOOGLE_SCHOLAR__API_KEY`).

use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub sources: SourcesConfig,
    pub rate_limit: RateLimitConfig,
    pub enrichment: EnrichmentConfig,
    pub logging: LoggingConfig,
}

/// Aggregated search behavior
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchConfig {
    /// Default overall results budget when a request omits one
    pub default_max_results: usize,
    /// Wall-clock ceiling per source, in seconds
    pub per_source_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SourcesConfig {
    pub pubmed: PubMedConfig,
    pub google_scholar: GoogleScholarConfig,
}

/// NCBI E-utilities identification, sent with every PubMed request
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PubMedConfig {
    pub tool: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GoogleScholarConfig {
    /// SERP API key; without it the Scholar source is unavailable
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Google Scholar searches allowed per user per UTC day
    pub scholar_daily_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Master switch; requests can still opt out individually
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via `RUST_LOG`
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            sources: SourcesConfig::default(),
            rate_limit: RateLimitConfig::default(),
            enrichment: EnrichmentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Result budget for a request, preferring an explicit override
    #[must_use]
    pub fn resolve_max_results(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_max_results)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_results: 20,
            per_source_timeout_secs: 30,
        }
    }
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            tool: "research-aggregator".to_string(),
            email: "contact@research-aggregator.org".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            scholar_daily_limit: 1,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file, and environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("RESEARCH_AGG")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate cross-field constraints the type system cannot express
    pub fn validate(&self) -> Result<()> {
        if self.search.default_max_results == 0 || self.search.default_max_results > 100 {
            return Err(Error::InvalidInput {
                field: "search.default_max_results".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }
        if self.search.per_source_timeout_secs == 0 {
            return Err(Error::InvalidInput {
                field: "search.per_source_timeout_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.sources.pubmed.email.trim().is_empty() || !self.sources.pubmed.email.contains('@') {
            return Err(Error::InvalidInput {
                field: "sources.pubmed.email".to_string(),
                reason: "a contact email is required by the NCBI usage policy".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.default_max_results, 20);
        assert_eq!(config.rate_limit.scholar_daily_limit, 1);
        assert!(config.sources.google_scholar.api_key.is_none());
    }

    #[test]
    fn test_invalid_max_results_rejected() {
        let mut config = Config::default();
        config.search.default_max_results = 0;
        assert!(config.validate().is_err());
        config.search.default_max_results = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_pubmed_email_rejected() {
        let mut config = Config::default();
        config.sources.pubmed.email = "not-an-email".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.search.per_source_timeout_secs, 30);
    }

    #[test]
    fn test_configured_max_results_is_the_fallback() {
        let mut config = Config::default();
        config.search.default_max_results = 40;

        assert_eq!(config.search.resolve_max_results(None), 40);
        assert_eq!(config.search.resolve_max_results(Some(5)), 5);
    }
}

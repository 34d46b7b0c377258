use crate::models::{DateRange, Paper, Source};
use async_trait::async_trait;
use thiserror::Error;

/// Per-request context threaded through every adapter
///
/// All adapters receive the same context; sources that don't need a field
/// ignore it. Only the Google Scholar adapter reads `user_id` today, for its
/// per-user daily quota.
#[derive(Debug, Clone)]
pub struct SearchContext {
    /// User on whose behalf the search runs
    pub user_id: String,
}

impl SearchContext {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Errors that can occur inside a source adapter
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Source error: {0}")]
    Other(String),
}

/// Trait for paper catalog adapters
///
/// Adapters translate a free-text query plus constraints into provider
/// calls and map the heterogeneous responses onto the canonical [`Paper`]
/// entity. Record-level problems fail closed: the bad record is skipped and
/// logged, the rest of the page survives. Adapter-level failures surface as
/// [`SourceError`]; the aggregator converts them into an empty contribution
/// so one failing source never fails the aggregate search.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Catalog this adapter fronts
    fn source(&self) -> Source;

    /// Human-readable description of the catalog
    fn description(&self) -> &str;

    /// Search the catalog
    ///
    /// Returns at most `max_results` papers, filtered to `date_range`
    /// (bounds inclusive) when one is given.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        date_range: Option<&DateRange>,
        ctx: &SearchContext,
    ) -> Result<Vec<Paper>, SourceError>;
}

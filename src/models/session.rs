use super::paper::{SortBy, Source};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a search session
///
/// Transitions are monotonic: `Pending -> Processing -> {Completed, Failed}`.
/// Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    const fn rank(&self) -> u8 {
        match self {
            SessionStatus::Pending => 0,
            SessionStatus::Processing => 1,
            SessionStatus::Completed | SessionStatus::Failed => 2,
        }
    }

    /// Whether moving to `next` respects the monotonic lifecycle
    #[must_use]
    pub const fn can_transition_to(&self, next: SessionStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Inclusive publication date range filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    /// Earliest publication date to include
    pub start: Option<NaiveDate>,
    /// Latest publication date to include
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(Error::InvalidInput {
                    field: "date_range".to_string(),
                    reason: "end date must not precede start date".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whether `date` falls within the range, bounds inclusive
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start)
            && self.end.map_or(true, |end| date <= end)
    }
}

/// Parameters of one aggregated search request
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// Free-text search query
    pub query: String,
    /// Catalogs to fan out to
    pub sources: Vec<Source>,
    /// Overall results budget
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Sort order for the aggregated list
    #[serde(default)]
    pub sort_by: SortBy,
    /// Optional publication date filter
    pub date_range: Option<DateRange>,
    /// Whether to run AI enrichment on the results
    #[serde(default = "default_generate_analysis")]
    pub generate_analysis: bool,
}

const fn default_max_results() -> usize {
    20
}

const fn default_generate_analysis() -> bool {
    true
}

impl SearchRequest {
    /// Create a request with defaults for everything but the query
    #[must_use]
    pub fn new(query: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            query: query.into(),
            sources,
            max_results: default_max_results(),
            sort_by: SortBy::default(),
            date_range: None,
            generate_analysis: default_generate_analysis(),
        }
    }

    /// Validate request parameters before any session is created
    pub fn validate(&self) -> Result<()> {
        let query = self.query.trim();
        if query.len() < 3 {
            return Err(Error::InvalidInput {
                field: "query".to_string(),
                reason: "query must be at least 3 characters".to_string(),
            });
        }
        if query.len() > 500 {
            return Err(Error::InvalidInput {
                field: "query".to_string(),
                reason: "query too long (max 500 characters)".to_string(),
            });
        }
        if self.sources.is_empty() {
            return Err(Error::InvalidInput {
                field: "sources".to_string(),
                reason: "at least one source must be specified".to_string(),
            });
        }
        if self.max_results == 0 || self.max_results > 100 {
            return Err(Error::InvalidInput {
                field: "max_results".to_string(),
                reason: "max_results must be between 1 and 100".to_string(),
            });
        }
        if let Some(range) = &self.date_range {
            range.validate()?;
        }
        Ok(())
    }
}

/// Record of one aggregated search invocation and its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchSession {
    /// Unique session identifier
    pub session_id: String,
    /// User who created the session
    pub user_id: String,
    /// Search query
    pub query: String,
    /// Catalogs searched
    pub sources: Vec<Source>,
    /// Results budget requested
    pub max_results: usize,
    /// Requested sort order
    pub sort_by: SortBy,
    /// Date range filter, if any
    pub date_range: Option<DateRange>,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Number of results found
    pub results_count: usize,
    /// Error or informational message
    pub error_message: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Completion timestamp, set when the session reaches a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl SearchSession {
    /// Create a fresh Pending session for a validated request
    #[must_use]
    pub fn new(user_id: impl Into<String>, request: &SearchRequest) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            query: request.query.clone(),
            sources: request.sources.clone(),
            max_results: request.max_results,
            sort_by: request.sort_by,
            date_range: request.date_range,
            status: SessionStatus::Pending,
            results_count: 0,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

//! Aggregated academic paper search
//!
//! Fans a free-text query out to arXiv, PubMed, and Google Scholar,
//! merges the results into one deduplicated, sorted list, optionally
//! enriches each paper with an AI analysis, and tracks every invocation
//! as a session with a monotonic lifecycle.
//!
//! The pipeline is degradation-first: a failing or slow source
//! contributes nothing instead of failing the search, and a failing
//! enrichment backend costs papers their analyses, never the results.

pub mod client;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod models;
pub mod session;
pub mod storage;

pub use client::{
    DailyRateLimiter, InMemoryRateLimitStore, RateLimitStore, SearchAggregator, SearchContext,
    SourceAdapter, SourceError, UsageRecord,
};
pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use models::{
    DateRange, Paper, PaperAnalysis, PaperWithAnalysis, SearchRequest, SearchSession,
    SessionStatus, SortBy, Source,
};
pub use session::SessionOrchestrator;
pub use storage::{InMemorySessionStore, SessionStore};

/// User agent sent with every outbound provider request
pub const USER_AGENT: &str = concat!(
    "research-aggregator/",
    env!("CARGO_PKG_VERSION"),
    " (academic paper search)"
);

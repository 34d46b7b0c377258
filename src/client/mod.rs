//! Search clients: source adapters, the aggregator, and rate limiting

pub mod aggregator;
pub mod providers;
pub mod rate_limiter;

pub use aggregator::SearchAggregator;
pub use providers::{SearchContext, SourceAdapter, SourceError};
pub use rate_limiter::{DailyRateLimiter, InMemoryRateLimitStore, RateLimitStore, UsageRecord};

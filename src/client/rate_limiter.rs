use crate::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Per-user usage record for one quota window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Calendar date (UTC) of the most recent recorded search
    pub last_search_date: NaiveDate,
    /// Searches recorded on that date
    pub usage_count: u32,
}

/// Key-value collaborator backing the rate limiter
///
/// Implementations only need get/put semantics; the limiter owns the
/// day-window and counting logic.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UsageRecord>>;
    async fn put(&self, user_id: &str, record: UsageRecord) -> Result<()>;
}

/// In-memory rate limit store
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: RwLock<HashMap<String, UsageRecord>>,
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, user_id: &str) -> Result<Option<UsageRecord>> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, record: UsageRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(user_id.to_string(), record);
        Ok(())
    }
}

/// Per-user daily rate limiter
///
/// The quota window is the UTC calendar date: a record whose
/// `last_search_date` differs from today-UTC is treated as reset. Callers
/// use check-then-record; the pair is not atomic, so concurrent requests
/// from one user can briefly exceed the limit (accepted under low
/// concurrency). Store failures fail open with a warning so that a broken
/// bookkeeping backend cannot take the source offline.
pub struct DailyRateLimiter {
    store: Arc<dyn RateLimitStore>,
    daily_limit: u32,
}

impl DailyRateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, daily_limit: u32) -> Self {
        Self { store, daily_limit }
    }

    #[must_use]
    pub const fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Whether `user_id` may perform another search today (UTC)
    pub async fn check(&self, user_id: &str) -> bool {
        self.check_on(user_id, today_utc()).await
    }

    /// Record one search for `user_id` against today's (UTC) quota
    pub async fn record_usage(&self, user_id: &str) {
        self.record_usage_on(user_id, today_utc()).await;
    }

    async fn check_on(&self, user_id: &str, today: NaiveDate) -> bool {
        match self.store.get(user_id).await {
            Ok(Some(record)) => {
                if record.last_search_date != today {
                    // New day, quota resets
                    return true;
                }
                record.usage_count < self.daily_limit
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Rate limit check failed for user {}: {}", user_id, e);
                true
            }
        }
    }

    async fn record_usage_on(&self, user_id: &str, today: NaiveDate) {
        let updated = match self.store.get(user_id).await {
            Ok(Some(record)) if record.last_search_date == today => UsageRecord {
                last_search_date: today,
                usage_count: record.usage_count + 1,
            },
            Ok(_) => UsageRecord {
                last_search_date: today,
                usage_count: 1,
            },
            Err(e) => {
                warn!("Rate limit read failed for user {}: {}", user_id, e);
                UsageRecord {
                    last_search_date: today,
                    usage_count: 1,
                }
            }
        };

        debug!(
            "Recording usage for user {}: {}/{} on {}",
            user_id, updated.usage_count, self.daily_limit, today
        );

        if let Err(e) = self.store.put(user_id, updated).await {
            warn!("Rate limit update failed for user {}: {}", user_id, e);
        }
    }
}

fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

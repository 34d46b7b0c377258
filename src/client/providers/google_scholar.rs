use super::traits::{SearchContext, SourceAdapter, SourceError};
use crate::client::rate_limiter::DailyRateLimiter;
use crate::models::{DateRange, Paper, Source};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://serpapi.com/search";

/// Google Scholar caps results per request
const RESULTS_PER_PAGE: usize = 20;

/// Hard stop for pagination offsets to avoid excessive requests
const MAX_OFFSET: usize = 100;

/// Delay between paginated requests
const PAGE_DELAY: Duration = Duration::from_secs(1);

/// SERP API response envelope
#[derive(Debug, Deserialize)]
struct ScholarResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    #[serde(default)]
    publication_info: PublicationInfo,
    #[serde(default)]
    resources: Vec<ScholarResource>,
    inline_links: Option<InlineLinks>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicationInfo {
    summary: Option<String>,
    #[serde(default)]
    authors: Vec<ScholarAuthor>,
}

#[derive(Debug, Deserialize)]
struct ScholarAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScholarResource {
    file_format: Option<String>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InlineLinks {
    cited_by: Option<CitedBy>,
}

#[derive(Debug, Deserialize)]
struct CitedBy {
    total: Option<u32>,
}

/// Google Scholar adapter backed by the SERP API
///
/// The upstream quota is expensive, so this adapter is gated by a per-user
/// daily rate limit. When the limit is exhausted the search returns empty
/// immediately, without touching the upstream or consuming a credit.
/// Scholar often reports only a publication year; the date defaults to
/// January 1 of the best available year.
pub struct GoogleScholarAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    limiter: Arc<DailyRateLimiter>,
    year_re: Regex,
    doi_path_re: Regex,
    doi_param_re: Regex,
}

impl GoogleScholarAdapter {
    /// Create a new Google Scholar adapter
    pub fn new(
        api_key: Option<String>,
        limiter: Arc<DailyRateLimiter>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            limiter,
            year_re: Regex::new(r"\b((?:19|20)\d{2})\b")
                .map_err(|e| SourceError::Other(format!("Invalid year regex: {e}")))?,
            doi_path_re: Regex::new(r"doi\.org/(.+)")
                .map_err(|e| SourceError::Other(format!("Invalid DOI regex: {e}")))?,
            doi_param_re: Regex::new(r"(?i)doi[=/]([^&\s]+)")
                .map_err(|e| SourceError::Other(format!("Invalid DOI regex: {e}")))?,
        })
    }

    /// Point the adapter at a different endpoint (used by tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_page_url(
        &self,
        api_key: &str,
        query: &str,
        num: usize,
        start: usize,
        date_range: Option<&DateRange>,
    ) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceError::Other(format!("Invalid base URL: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("engine", "google_scholar")
                .append_pair("q", query)
                .append_pair("num", &num.to_string())
                .append_pair("start", &start.to_string())
                .append_pair("api_key", api_key)
                .append_pair("hl", "en");

            // Scholar filters at year granularity only
            if let Some(range) = date_range {
                if let Some(start_date) = range.start {
                    pairs.append_pair("as_ylo", &start_date.year().to_string());
                }
                if let Some(end_date) = range.end {
                    pairs.append_pair("as_yhi", &end_date.year().to_string());
                }
            }
        }

        Ok(url)
    }

    async fn fetch_page(
        &self,
        api_key: &str,
        query: &str,
        num: usize,
        start: usize,
        date_range: Option<&DateRange>,
    ) -> Result<Vec<Paper>, SourceError> {
        let url = self.build_page_url(api_key, query, num, start, date_range)?;
        debug!("Google Scholar page request: start={}", start);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Network(format!("Request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(match status.as_u16() {
                401 | 403 => SourceError::Auth(format!("SERP API rejected request: {status}")),
                429 => SourceError::RateLimit,
                _ => SourceError::Network(format!("HTTP {status}")),
            });
        }

        let body: ScholarResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse SERP JSON: {e}")))?;

        if body.organic_results.is_empty() {
            debug!("No organic results in Google Scholar response");
        }

        Ok(body
            .organic_results
            .into_iter()
            .filter_map(|result| self.parse_result(result))
            .collect())
    }

    /// Map one organic result onto the canonical paper, failing closed when
    /// the title is missing
    fn parse_result(&self, result: OrganicResult) -> Option<Paper> {
        let title = result.title.filter(|t| !t.trim().is_empty())?;

        let authors = result
            .publication_info
            .authors
            .into_iter()
            .map(|a| a.name)
            .collect();

        let summary = result.publication_info.summary.unwrap_or_default();
        let published = self.extract_publication_date(&summary);

        let pdf_url = result
            .resources
            .into_iter()
            .find(|r| r.file_format.as_deref() == Some("PDF"))
            .and_then(|r| r.link);

        let citation_count = result
            .inline_links
            .and_then(|links| links.cited_by)
            .and_then(|cited| cited.total);

        let doi = result.link.as_deref().and_then(|link| self.extract_doi(link));
        let is_open_access = pdf_url.is_some();

        Some(Paper {
            id: scholar_result_id(&title),
            title,
            abstract_text: result.snippet.unwrap_or_default(),
            authors,
            published,
            pdf_url,
            source: Source::GoogleScholar,
            doi,
            citation_count,
            venue: if summary.is_empty() { None } else { Some(summary) },
            keywords: Vec::new(),
            is_open_access,
        })
    }

    /// Scholar mostly reports a bare year; default to January 1 of it
    fn extract_publication_date(&self, summary: &str) -> String {
        if let Some(captures) = self.year_re.captures(summary) {
            return format!("{}-01-01T00:00:00Z", &captures[1]);
        }
        format!("{}-01-01T00:00:00Z", Utc::now().year())
    }

    /// Best-effort DOI extraction from the result URL
    fn extract_doi(&self, link: &str) -> Option<String> {
        if link.is_empty() {
            return None;
        }
        if let Some(captures) = self.doi_path_re.captures(link) {
            return Some(captures[1].to_string());
        }
        self.doi_param_re
            .captures(link)
            .map(|captures| captures[1].to_string())
    }
}

/// Stable source-scoped id derived from the result title
fn scholar_result_id(title: &str) -> String {
    let digest = Sha256::digest(format!("scholar_{title}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl SourceAdapter for GoogleScholarAdapter {
    fn source(&self) -> Source {
        Source::GoogleScholar
    }

    fn description(&self) -> &str {
        "Google Scholar via SERP API - Broad scholarly index with citation counts"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        date_range: Option<&DateRange>,
        ctx: &SearchContext,
    ) -> Result<Vec<Paper>, SourceError> {
        // Quota gate: exhausted users get an empty result without an
        // upstream call, and without consuming a credit.
        if !self.limiter.check(&ctx.user_id).await {
            warn!(
                "Google Scholar daily rate limit exceeded for user {}",
                ctx.user_id
            );
            return Ok(Vec::new());
        }

        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SourceError::Auth(
                "SERP API key not configured".to_string(),
            ));
        };

        self.limiter.record_usage(&ctx.user_id).await;

        info!(
            "Google Scholar search for user {}: '{}' (max: {})",
            ctx.user_id, query, max_results
        );

        let mut papers: Vec<Paper> = Vec::new();
        let mut start = 0;

        while papers.len() < max_results && start < MAX_OFFSET {
            if start > 0 {
                tokio::time::sleep(PAGE_DELAY).await;
            }

            let num = RESULTS_PER_PAGE.min(max_results - papers.len());
            let page = self
                .fetch_page(api_key, query, num, start, date_range)
                .await?;

            if page.is_empty() {
                break;
            }

            // Advance by what the page actually held, not the page size,
            // so a short page does not skip offsets
            start += page.len();
            papers.extend(page);
        }

        papers.truncate(max_results);
        info!(
            "Found {} papers from Google Scholar for user {}",
            papers.len(),
            ctx.user_id
        );
        Ok(papers)
    }
}

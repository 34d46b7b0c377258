use super::traits::{SearchContext, SourceAdapter, SourceError};
use crate::models::{DateRange, Paper, Source};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_BASE_URL: &str = "http://export.arxiv.org/api/query";

/// arXiv Atom API adapter
///
/// arXiv exposes no DOI or citation data and every paper is open access.
/// The API cannot filter by publication date, so date ranges are applied
/// client-side after the fetch.
pub struct ArxivAdapter {
    client: Client,
    base_url: String,
}

impl ArxivAdapter {
    /// Create a new arXiv adapter
    pub fn new() -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the adapter at a different endpoint (used by tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the arXiv API URL for a relevance-sorted search
    fn build_search_url(&self, query: &str, max_results: usize) -> Result<String, SourceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceError::Other(format!("Invalid base URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("search_query", &format!("all:\"{query}\""))
            .append_pair("start", "0")
            .append_pair("max_results", &max_results.to_string())
            .append_pair("sortBy", "relevance")
            .append_pair("sortOrder", "descending");

        Ok(url.to_string())
    }

    /// Parse an arXiv Atom feed into canonical papers
    fn parse_response(&self, response_text: &str) -> Result<Vec<Paper>, SourceError> {
        let doc = roxmltree::Document::parse(response_text)
            .map_err(|e| SourceError::Parse(format!("Failed to parse Atom XML: {e}")))?;

        let mut papers = Vec::new();

        for entry in doc.descendants().filter(|n| n.has_tag_name("entry")) {
            let mut id = None;
            let mut title = None;
            let mut abstract_text = String::new();
            let mut authors = Vec::new();
            let mut published = None;
            let mut pdf_url = None;
            let mut keywords = Vec::new();

            for child in entry.children().filter(roxmltree::Node::is_element) {
                match child.tag_name().name() {
                    "id" => id = child.text().map(|t| t.trim().to_string()),
                    "title" => {
                        title = child
                            .text()
                            .map(|t| collapse_whitespace(t.trim()));
                    }
                    "summary" => {
                        if let Some(summary) = child.text() {
                            abstract_text = collapse_whitespace(summary.trim());
                        }
                    }
                    "published" => published = child.text().map(|t| t.trim().to_string()),
                    "author" => {
                        for name in child.descendants().filter(|n| n.has_tag_name("name")) {
                            if let Some(author) = name.text() {
                                authors.push(author.trim().to_string());
                            }
                        }
                    }
                    "link" => {
                        if child.attribute("type") == Some("application/pdf") {
                            pdf_url = child.attribute("href").map(String::from);
                        }
                    }
                    "category" => {
                        if let Some(term) = child.attribute("term") {
                            keywords.push(term.to_string());
                        }
                    }
                    _ => {}
                }
            }

            // Fail closed on records missing required fields
            let (Some(id), Some(title)) = (id, title) else {
                warn!("Skipping arXiv entry without id or title");
                continue;
            };
            let Some(published) = published else {
                warn!("Skipping arXiv entry without publication date: {}", id);
                continue;
            };

            papers.push(Paper {
                id,
                title,
                abstract_text,
                authors,
                published,
                pdf_url,
                source: Source::Arxiv,
                doi: None,
                citation_count: None,
                venue: Some("arXiv".to_string()),
                keywords,
                is_open_access: true,
            });
        }

        debug!("Parsed {} papers from arXiv response", papers.len());
        Ok(papers)
    }

    /// Apply a date range client-side; arXiv cannot filter upstream
    fn filter_by_date(papers: Vec<Paper>, range: &DateRange) -> Vec<Paper> {
        papers
            .into_iter()
            .filter(|paper| match published_date(&paper.published) {
                Some(date) => range.contains(date),
                None => {
                    warn!(
                        "Dropping arXiv paper with unparsable date '{}': {}",
                        paper.published, paper.id
                    );
                    false
                }
            })
            .collect()
    }
}

/// Extract the calendar date from an ISO-8601 date-time string
fn published_date(published: &str) -> Option<NaiveDate> {
    published
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn source(&self) -> Source {
        Source::Arxiv
    }

    fn description(&self) -> &str {
        "arXiv.org - Open access e-prints in physics, mathematics, computer science, and more"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        date_range: Option<&DateRange>,
        _ctx: &SearchContext,
    ) -> Result<Vec<Paper>, SourceError> {
        info!("Searching arXiv for: '{}' (max: {})", query, max_results);

        let url = self.build_search_url(query, max_results)?;
        debug!("arXiv search URL: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else if e.is_connect() {
                SourceError::Network(format!("Connection failed: {e}"))
            } else {
                SourceError::Network(format!("Request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(match status.as_u16() {
                429 => SourceError::RateLimit,
                503 => SourceError::ServiceUnavailable(
                    "arXiv service temporarily unavailable".to_string(),
                ),
                _ => SourceError::Network(format!("HTTP {status}")),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {e}")))?;

        let mut papers = self.parse_response(&response_text)?;
        if let Some(range) = date_range {
            papers = Self::filter_by_date(papers, range);
        }
        papers.truncate(max_results);

        info!("Found {} papers from arXiv", papers.len());
        Ok(papers)
    }
}

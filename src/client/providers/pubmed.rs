use super::traits::{SearchContext, SourceAdapter, SourceError};
use crate::models::{DateRange, Paper, Source};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// NCBI recommended batch size for efetch
const EFETCH_CHUNK_SIZE: usize = 200;

/// Delay between efetch chunks
const CHUNK_DELAY: Duration = Duration::from_millis(500);

/// esearch JSON envelope
#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// PubMed E-utilities adapter
///
/// Two-step search: esearch resolves the query to PMIDs, efetch retrieves
/// article XML for those PMIDs in chunks of 200 with an inter-chunk delay.
/// Date ranges are pushed upstream through the `[PDAT]` term syntax. PubMed
/// exposes no citation counts; the PDF link is a best-effort PubMed Central
/// URL that may not resolve for closed-access articles.
pub struct PubMedAdapter {
    client: Client,
    base_url: String,
    tool: String,
    email: String,
}

impl PubMedAdapter {
    /// Create a new PubMed adapter
    pub fn new(tool: impl Into<String>, email: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            tool: tool.into(),
            email: email.into(),
        })
    }

    /// Point the adapter at a different endpoint (used by tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the esearch term, folding an optional date range into `[PDAT]` syntax
    fn build_term(query: &str, date_range: Option<&DateRange>) -> String {
        let Some(range) = date_range else {
            return query.to_string();
        };
        if range.start.is_none() && range.end.is_none() {
            return query.to_string();
        }

        // Open bounds get sentinel dates PubMed accepts
        let start = range
            .start
            .map_or_else(|| "1000/01/01".to_string(), |d| d.format("%Y/%m/%d").to_string());
        let end = range
            .end
            .map_or_else(|| "3000/12/31".to_string(), |d| d.format("%Y/%m/%d").to_string());

        format!("({query}) AND {start}[PDAT]:{end}[PDAT]")
    }

    /// Resolve a query to a list of PMIDs
    async fn search_pmids(
        &self,
        query: &str,
        max_results: usize,
        date_range: Option<&DateRange>,
    ) -> Result<Vec<String>, SourceError> {
        let mut url = Url::parse(&format!("{}/esearch.fcgi", self.base_url))
            .map_err(|e| SourceError::Other(format!("Invalid base URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("db", "pubmed")
            .append_pair("term", &Self::build_term(query, date_range))
            .append_pair("retmax", &max_results.to_string())
            .append_pair("retmode", "json")
            .append_pair("sort", "relevance")
            .append_pair("tool", &self.tool)
            .append_pair("email", &self.email);

        debug!("PubMed esearch URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(SourceError::Network(format!(
                "esearch failed with status: {}",
                response.status()
            )));
        }

        let body: EsearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse esearch JSON: {e}")))?;

        Ok(body.esearchresult.idlist)
    }

    /// Fetch article details for PMIDs, chunked to respect upstream limits
    async fn fetch_paper_details(&self, pmids: &[String]) -> Result<Vec<Paper>, SourceError> {
        let mut all_papers = Vec::new();

        for (i, chunk) in pmids.chunks(EFETCH_CHUNK_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
            let papers = self.fetch_chunk_details(chunk).await?;
            all_papers.extend(papers);
        }

        Ok(all_papers)
    }

    async fn fetch_chunk_details(&self, pmids: &[String]) -> Result<Vec<Paper>, SourceError> {
        let mut url = Url::parse(&format!("{}/efetch.fcgi", self.base_url))
            .map_err(|e| SourceError::Other(format!("Invalid base URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("db", "pubmed")
            .append_pair("id", &pmids.join(","))
            .append_pair("retmode", "xml")
            .append_pair("rettype", "abstract")
            .append_pair("tool", &self.tool)
            .append_pair("email", &self.email);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(SourceError::Network(format!(
                "efetch failed with status: {}",
                response.status()
            )));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {e}")))?;

        parse_pubmed_xml(&xml)
    }
}

fn map_request_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else if e.is_connect() {
        SourceError::Network(format!("Connection failed: {e}"))
    } else {
        SourceError::Network(format!("Request failed: {e}"))
    }
}

/// Parse an efetch XML response into canonical papers
fn parse_pubmed_xml(xml: &str) -> Result<Vec<Paper>, SourceError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| SourceError::Parse(format!("Failed to parse efetch XML: {e}")))?;

    let mut papers = Vec::new();
    for article in doc
        .descendants()
        .filter(|n| n.has_tag_name("PubmedArticle"))
    {
        match parse_single_article(article) {
            Some(paper) => papers.push(paper),
            None => warn!("Skipping PubMed article with missing required fields"),
        }
    }

    debug!("Parsed {} papers from PubMed response", papers.len());
    Ok(papers)
}

fn parse_single_article(article: roxmltree::Node<'_, '_>) -> Option<Paper> {
    let pmid = find_text(article, "PMID")?;
    let title = find_text(article, "ArticleTitle")?;

    // Abstracts can be split into labeled sections
    let abstract_text = article
        .descendants()
        .filter(|n| n.has_tag_name("AbstractText"))
        .filter_map(|n| {
            let text = n.text()?.trim();
            if text.is_empty() {
                return None;
            }
            Some(match n.attribute("Label") {
                Some(label) => format!("{label}: {text}"),
                None => text.to_string(),
            })
        })
        .collect::<Vec<_>>()
        .join(" ");

    let authors = article
        .descendants()
        .filter(|n| n.has_tag_name("Author"))
        .filter_map(|author| {
            let last = author
                .children()
                .find(|n| n.has_tag_name("LastName"))
                .and_then(|n| n.text());
            let first = author
                .children()
                .find(|n| n.has_tag_name("ForeName"))
                .and_then(|n| n.text());
            match (first, last) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                (None, Some(last)) => Some(last.to_string()),
                _ => None,
            }
        })
        .collect();

    let doi = article
        .descendants()
        .filter(|n| n.has_tag_name("ArticleId"))
        .find(|n| n.attribute("IdType") == Some("doi"))
        .and_then(|n| n.text())
        .map(str::to_string);

    let venue = article
        .descendants()
        .find(|n| n.has_tag_name("Journal"))
        .and_then(|journal| {
            journal
                .descendants()
                .find(|n| n.has_tag_name("Title"))
                .and_then(|n| n.text())
        })
        .map(str::to_string);

    let keywords = article
        .descendants()
        .filter(|n| n.has_tag_name("DescriptorName"))
        .filter_map(|n| n.text())
        .map(str::to_string)
        .collect();

    // Best-effort PMC link; not every article has a free PDF
    let pdf_url = Some(format!(
        "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{pmid}/pdf/"
    ));

    Some(Paper {
        id: format!("pubmed_{pmid}"),
        title,
        abstract_text,
        authors,
        published: extract_publication_date(article),
        pdf_url,
        source: Source::Pubmed,
        doi,
        citation_count: None,
        venue,
        keywords,
        is_open_access: false,
    })
}

fn find_text(article: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    article
        .descendants()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extract a zero-padded ISO date from whichever date element is present
fn extract_publication_date(article: roxmltree::Node<'_, '_>) -> String {
    for tag in ["PubDate", "ArticleDate", "DateCompleted"] {
        let Some(date_elem) = article.descendants().find(|n| n.has_tag_name(tag)) else {
            continue;
        };

        let part = |name: &str| {
            date_elem
                .children()
                .find(|n| n.has_tag_name(name))
                .and_then(|n| n.text())
                .map(str::trim)
        };

        let Some(year) = part("Year").and_then(|y| y.parse::<i32>().ok()) else {
            continue;
        };
        let month = part("Month").map_or(1, parse_month);
        let day = part("Day")
            .and_then(|d| d.parse::<u32>().ok())
            .unwrap_or(1);

        return format!("{year:04}-{month:02}-{day:02}T00:00:00Z");
    }

    // No usable date element at all
    format!("{:04}-01-01T00:00:00Z", Utc::now().year())
}

/// PubMed months come as digits or English abbreviations
fn parse_month(month: &str) -> u32 {
    if let Ok(n) = month.parse::<u32>() {
        if (1..=12).contains(&n) {
            return n;
        }
    }
    match month {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => 1,
    }
}

#[async_trait]
impl SourceAdapter for PubMedAdapter {
    fn source(&self) -> Source {
        Source::Pubmed
    }

    fn description(&self) -> &str {
        "PubMed - Biomedical literature from MEDLINE and life science journals"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        date_range: Option<&DateRange>,
        _ctx: &SearchContext,
    ) -> Result<Vec<Paper>, SourceError> {
        info!("Searching PubMed for: '{}' (max: {})", query, max_results);

        let pmids = self.search_pmids(query, max_results, date_range).await?;
        if pmids.is_empty() {
            info!("No PMIDs found for query");
            return Ok(Vec::new());
        }

        let papers = self.fetch_paper_details(&pmids).await?;
        info!("Found {} papers from PubMed", papers.len());
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE_ARTICLE_SET: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">12345678</PMID>
      <Article>
        <Journal><Title>Journal of Examples</Title></Journal>
        <ArticleTitle>CRISPR Screening at Scale</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Screens are useful.</AbstractText>
          <AbstractText Label="RESULTS">They scale.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author>
            <LastName>Doe</LastName>
            <ForeName>Jane</ForeName>
          </Author>
          <Author>
            <LastName>Consortium</LastName>
          </Author>
        </AuthorList>
      </Article>
      <MeshHeadingList>
        <MeshHeading><DescriptorName>Gene Editing</DescriptorName></MeshHeading>
        <MeshHeading><DescriptorName>Genomics</DescriptorName></MeshHeading>
      </MeshHeadingList>
    </MedlineCitation>
    <PubmedData>
      <History>
        <PubMedPubDate PubStatus="pubmed"><Year>2021</Year></PubMedPubDate>
      </History>
      <ArticleIdList>
        <ArticleId IdType="pubmed">12345678</ArticleId>
        <ArticleId IdType="doi">10.1000/example.2021.001</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">87654321</PMID>
      <Article>
        <ArticleTitle>Dated With Month Name</ArticleTitle>
        <Journal>
          <JournalIssue>
            <PubDate><Year>2019</Year><Month>Sep</Month><Day>3</Day></PubDate>
          </JournalIssue>
          <Title>Another Journal</Title>
        </Journal>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_pubmed_xml() {
        let papers = parse_pubmed_xml(SAMPLE_ARTICLE_SET).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.id, "pubmed_12345678");
        assert_eq!(first.title, "CRISPR Screening at Scale");
        assert_eq!(
            first.abstract_text,
            "BACKGROUND: Screens are useful. RESULTS: They scale."
        );
        assert_eq!(first.authors, vec!["Jane Doe", "Consortium"]);
        assert_eq!(first.doi.as_deref(), Some("10.1000/example.2021.001"));
        assert_eq!(first.venue.as_deref(), Some("Journal of Examples"));
        assert_eq!(first.keywords, vec!["Gene Editing", "Genomics"]);
        assert!(first.citation_count.is_none());
        assert_eq!(first.source, Source::Pubmed);
        assert!(first
            .pdf_url
            .as_deref()
            .unwrap()
            .contains("PMC12345678"));
    }

    #[test]
    fn test_month_name_date_is_zero_padded() {
        let papers = parse_pubmed_xml(SAMPLE_ARTICLE_SET).unwrap();
        assert_eq!(papers[1].published, "2019-09-03T00:00:00Z");
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("3"), 3);
        assert_eq!(parse_month("Sep"), 9);
        assert_eq!(parse_month("12"), 12);
        assert_eq!(parse_month("bogus"), 1);
        assert_eq!(parse_month("13"), 1);
    }

    #[test]
    fn test_build_term_with_date_range() {
        let range = DateRange {
            start: Some(NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()),
            end: Some(NaiveDate::from_ymd_opt(2022, 6, 30).unwrap()),
        };
        assert_eq!(
            PubMedAdapter::build_term("cancer immunotherapy", Some(&range)),
            "(cancer immunotherapy) AND 2020/01/15[PDAT]:2022/06/30[PDAT]"
        );

        let start_only = DateRange {
            start: Some(NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()),
            end: None,
        };
        assert_eq!(
            PubMedAdapter::build_term("cancer", Some(&start_only)),
            "(cancer) AND 2020/01/15[PDAT]:3000/12/31[PDAT]"
        );

        assert_eq!(PubMedAdapter::build_term("cancer", None), "cancer");
    }
}

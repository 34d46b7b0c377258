use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Supported paper catalogs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Arxiv,
    GoogleScholar,
    Pubmed,
    /// Reserved - no adapter is registered for IEEE
    Ieee,
}

impl Source {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Source::Arxiv => "arxiv",
            Source::GoogleScholar => "google_scholar",
            Source::Pubmed => "pubmed",
            Source::Ieee => "ieee",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sort order for aggregated results
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Preserve per-source relevance order, interleaved across sources
    #[default]
    Relevance,
    /// Newest publication date first
    Recent,
    /// Highest citation count first
    Cited,
}

/// Canonical paper entity produced by the source adapters
///
/// `id` is unique only within one source's result set for a single search
/// call. The same real-world paper can carry different ids across sources;
/// deduplication resolves that through `doi` and title similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Paper {
    /// Source-scoped identifier
    pub id: String,
    /// Paper title
    pub title: String,
    /// Abstract/summary text
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Author display names, in publication order
    pub authors: Vec<String>,
    /// Publication date-time, ISO-8601 UTC with zero padding. The fixed
    /// format makes lexicographic order equal to chronological order.
    pub published: String,
    /// Direct PDF link, when the source exposes one
    pub pdf_url: Option<String>,
    /// Catalog that produced this record
    pub source: Source,
    /// Digital Object Identifier - globally unique per real paper
    pub doi: Option<String>,
    /// Citation count, absent for sources that do not expose it
    pub citation_count: Option<u32>,
    /// Publication venue
    pub venue: Option<String>,
    /// Keywords, categories, or MeSH descriptors
    pub keywords: Vec<String>,
    /// Whether the full text is freely accessible
    pub is_open_access: bool,
}

/// AI-generated analysis attached 1:1 to a paper by `paper_id`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaperAnalysis {
    /// Reference to the analyzed paper
    pub paper_id: String,
    /// Concise summary of the paper's contribution
    pub summary: String,
    /// Strong points of the research
    pub strengths: Vec<String>,
    /// Limitations or areas for improvement
    pub weaknesses: Vec<String>,
    /// Gaps the paper reveals
    pub research_gaps: Vec<String>,
    /// Potential research directions building on this work
    pub future_scope: Vec<String>,
    /// Specific contributions to the field
    pub key_contributions: Vec<String>,
    /// Methodology overview
    pub methodology: String,
    /// Key findings or results
    pub main_findings: Vec<String>,
    /// When the analysis was generated
    pub generated_at: DateTime<Utc>,
}

impl PaperAnalysis {
    /// Create an analysis shell for a paper with only a summary filled in
    #[must_use]
    pub fn new(paper_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            summary: summary.into(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            research_gaps: Vec::new(),
            future_scope: Vec::new(),
            key_contributions: Vec::new(),
            methodology: String::new(),
            main_findings: Vec::new(),
            generated_at: Utc::now(),
        }
    }
}

/// Paper paired with its optional analysis
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaperWithAnalysis {
    pub paper: Paper,
    pub analysis: Option<PaperAnalysis>,
}

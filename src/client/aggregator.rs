use crate::client::providers::{SearchContext, SourceAdapter};
use crate::models::{Paper, SearchRequest, SortBy, Source};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Two titles above this Jaccard similarity are treated as the same paper
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Default ceiling on each source's wall-clock time
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fan-out search across multiple paper catalogs
///
/// Each requested source gets its own task with its own timeout and an
/// equal share of the result budget. A failing or slow source contributes
/// nothing; it never aborts its siblings and never fails the aggregate.
/// The merged list is deduplicated, sorted per the requested order, and
/// truncated to the requested size.
pub struct SearchAggregator {
    adapters: HashMap<Source, Arc<dyn SourceAdapter>>,
    per_source_timeout: Duration,
}

impl SearchAggregator {
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.source(), adapter))
            .collect();
        Self {
            adapters,
            per_source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_source_timeout(mut self, per_source_timeout: Duration) -> Self {
        self.per_source_timeout = per_source_timeout;
        self
    }

    /// Sources this aggregator can serve
    #[must_use]
    pub fn available_sources(&self) -> Vec<Source> {
        self.adapters.keys().copied().collect()
    }

    /// Registered sources with their catalog descriptions
    #[must_use]
    pub fn describe_sources(&self) -> Vec<(Source, String)> {
        let mut described: Vec<(Source, String)> = self
            .adapters
            .values()
            .map(|adapter| (adapter.source(), adapter.description().to_string()))
            .collect();
        described.sort_by_key(|(source, _)| source.as_str());
        described
    }

    /// Run the search against every requested source and merge the results
    ///
    /// Infallible by design: the worst case is an empty list.
    pub async fn search_all_sources(
        &self,
        request: &SearchRequest,
        ctx: &SearchContext,
    ) -> Vec<Paper> {
        let selected: Vec<Arc<dyn SourceAdapter>> = request
            .sources
            .iter()
            .filter_map(|source| {
                let adapter = self.adapters.get(source).cloned();
                if adapter.is_none() {
                    warn!("No adapter registered for source {}, skipping", source);
                }
                adapter
            })
            .collect();

        if selected.is_empty() {
            warn!("No usable sources for query '{}'", request.query);
            return Vec::new();
        }

        // Equal budget split; every source gets at least one slot
        let per_source_budget = (request.max_results / selected.len()).max(1);
        info!(
            "Searching {} sources for '{}' ({} results each)",
            selected.len(),
            request.query,
            per_source_budget
        );

        let mut handles = Vec::with_capacity(selected.len());
        for adapter in selected {
            let source = adapter.source();
            let query = request.query.clone();
            let date_range = request.date_range;
            let ctx = ctx.clone();
            let per_source_timeout = self.per_source_timeout;

            handles.push((
                source,
                tokio::spawn(async move {
                    let search = adapter.search(&query, per_source_budget, date_range.as_ref(), &ctx);
                    match timeout(per_source_timeout, search).await {
                        Ok(Ok(papers)) => {
                            debug!("{} returned {} papers", source, papers.len());
                            papers
                        }
                        Ok(Err(e)) => {
                            warn!("{} search failed: {}", source, e);
                            Vec::new()
                        }
                        Err(_) => {
                            warn!(
                                "{} search timed out after {:?}",
                                source, per_source_timeout
                            );
                            Vec::new()
                        }
                    }
                }),
            ));
        }

        // Await in spawn order so relevance interleaving is deterministic
        let mut papers = Vec::new();
        for (source, handle) in handles {
            match handle.await {
                Ok(contribution) => papers.extend(contribution),
                Err(e) => warn!("{} search task panicked: {}", source, e),
            }
        }

        let before = papers.len();
        let mut papers = deduplicate_papers(papers);
        if papers.len() < before {
            debug!("Removed {} duplicate papers", before - papers.len());
        }

        papers = sort_papers(papers, request.sort_by);
        papers.truncate(request.max_results);

        info!(
            "Aggregated {} papers for query '{}'",
            papers.len(),
            request.query
        );
        papers
    }
}

/// Remove cross-source duplicates, keeping the first occurrence
///
/// Two papers are duplicates when they share a non-empty DOI, or when their
/// normalized titles exceed the similarity threshold.
#[must_use]
pub fn deduplicate_papers(papers: Vec<Paper>) -> Vec<Paper> {
    let mut kept: Vec<Paper> = Vec::with_capacity(papers.len());
    let mut kept_titles: Vec<HashSet<String>> = Vec::with_capacity(papers.len());
    let mut seen_dois: HashSet<String> = HashSet::new();

    for paper in papers {
        let doi = paper.doi.as_deref().filter(|d| !d.is_empty());
        if doi.is_some_and(|d| seen_dois.contains(d)) {
            continue;
        }

        let words = title_word_set(&paper.title);
        if kept_titles
            .iter()
            .any(|existing| jaccard_similarity(existing, &words) > TITLE_SIMILARITY_THRESHOLD)
        {
            continue;
        }

        // Only kept papers reserve their DOI; a paper dropped for title
        // similarity must not shadow a later, unrelated paper
        if let Some(doi) = doi {
            seen_dois.insert(doi.to_string());
        }
        kept_titles.push(words);
        kept.push(paper);
    }

    kept
}

/// Order the merged list per the requested sort
#[must_use]
pub fn sort_papers(mut papers: Vec<Paper>, sort_by: SortBy) -> Vec<Paper> {
    match sort_by {
        SortBy::Recent => {
            // Fixed-format ISO strings order correctly lexicographically
            papers.sort_by(|a, b| b.published.cmp(&a.published));
            papers
        }
        SortBy::Cited => {
            papers.sort_by(|a, b| {
                let cited = |p: &Paper| p.citation_count.map_or(-1, i64::from);
                cited(b)
                    .cmp(&cited(a))
                    .then_with(|| b.published.cmp(&a.published))
            });
            papers
        }
        SortBy::Relevance => interleave_by_source(papers),
    }
}

/// Round-robin across sources, preserving each source's own order
///
/// Each provider already returns its results in relevance order; a
/// cross-source relevance score does not exist, so the fairest merge is
/// taking one paper from each source in turn.
fn interleave_by_source(papers: Vec<Paper>) -> Vec<Paper> {
    let mut source_order: Vec<Source> = Vec::new();
    let mut queues: HashMap<Source, VecDeque<Paper>> = HashMap::new();

    for paper in papers {
        let queue = queues.entry(paper.source).or_insert_with(|| {
            source_order.push(paper.source);
            VecDeque::new()
        });
        queue.push_back(paper);
    }

    let mut interleaved = Vec::new();
    loop {
        let mut emitted = false;
        for source in &source_order {
            if let Some(paper) = queues.get_mut(source).and_then(VecDeque::pop_front) {
                interleaved.push(paper);
                emitted = true;
            }
        }
        if !emitted {
            break;
        }
    }
    interleaved
}

fn title_word_set(title: &str) -> HashSet<String> {
    normalize_title(title)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Lowercase, strip punctuation, collapse whitespace
fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

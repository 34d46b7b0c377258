//! AI enrichment of aggregated papers

use crate::models::{Paper, PaperAnalysis};
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Papers analyzed concurrently per batch
const BATCH_SIZE: usize = 3;

/// Pause between batches to stay under backend quotas
const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Backend that produces an analysis for a single paper
///
/// Enrichment is strictly best-effort: a failing analyzer costs the paper
/// its analysis, never the search.
#[async_trait]
pub trait PaperAnalyzer: Send + Sync {
    async fn analyze_paper(&self, paper: &Paper) -> Result<PaperAnalysis>;
}

/// Analyze papers in small concurrent batches
///
/// Papers are processed [`BATCH_SIZE`] at a time with a pause between
/// batches. Failed analyses are dropped with a warning, so the returned
/// list can be shorter than the input; callers match analyses back to
/// papers by `paper_id`.
pub async fn analyze_papers_batch(
    analyzer: &dyn PaperAnalyzer,
    papers: &[Paper],
) -> Vec<PaperAnalysis> {
    if papers.is_empty() {
        return Vec::new();
    }

    info!("Analyzing {} papers in batches of {}", papers.len(), BATCH_SIZE);
    let mut analyses = Vec::with_capacity(papers.len());

    for (batch_index, batch) in papers.chunks(BATCH_SIZE).enumerate() {
        if batch_index > 0 {
            tokio::time::sleep(BATCH_DELAY).await;
        }
        debug!("Analyzing batch {} ({} papers)", batch_index, batch.len());

        let results = join_all(batch.iter().map(|paper| analyzer.analyze_paper(paper))).await;
        for (paper, result) in batch.iter().zip(results) {
            match result {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => warn!("Analysis failed for paper {}: {}", paper.id, e),
            }
        }
    }

    info!(
        "Generated {} analyses out of {} papers",
        analyses.len(),
        papers.len()
    );
    analyses
}

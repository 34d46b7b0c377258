//! Search session orchestration

use crate::client::{SearchAggregator, SearchContext};
use crate::enrichment::{analyze_papers_batch, PaperAnalyzer};
use crate::models::{
    PaperAnalysis, PaperWithAnalysis, SearchRequest, SearchSession, SessionStatus,
};
use crate::storage::SessionStore;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Message stored on sessions that complete with zero results
const NO_RESULTS_MESSAGE: &str = "No papers found for the given query";

/// Drives a search request through its full session lifecycle
///
/// Create Pending, mark Processing, aggregate, optionally enrich, persist
/// results, and land on a terminal status. Any failure after session
/// creation marks the session Failed with the error message; the session
/// record always reflects what actually happened.
pub struct SessionOrchestrator {
    aggregator: Arc<SearchAggregator>,
    store: Arc<dyn SessionStore>,
    analyzer: Option<Arc<dyn PaperAnalyzer>>,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(
        aggregator: Arc<SearchAggregator>,
        store: Arc<dyn SessionStore>,
        analyzer: Option<Arc<dyn PaperAnalyzer>>,
    ) -> Self {
        Self {
            aggregator,
            store,
            analyzer,
        }
    }

    /// Run one aggregated search end to end
    ///
    /// Returns the final session record. Validation failures surface as
    /// errors before any session exists; once the session is created, later
    /// failures are recorded on it and the Failed session is returned, so
    /// callers always get a record of what happened.
    #[instrument(skip(self, request), fields(user_id = %user_id, query = %request.query))]
    pub async fn run(&self, user_id: &str, request: &SearchRequest) -> Result<SearchSession> {
        request.validate()?;

        let session = SearchSession::new(user_id, request);
        let session_id = session.session_id.clone();
        self.store.create_session(&session).await?;
        info!("Created session {}", session_id);

        if let Err(e) = self.process(user_id, &session_id, request).await {
            error!("Session {} failed: {}", session_id, e);
            // Recording the failure is best-effort
            if let Err(store_err) = self
                .store
                .update_session_status(
                    user_id,
                    &session_id,
                    SessionStatus::Failed,
                    None,
                    Some(e.to_string()),
                )
                .await
            {
                warn!(
                    "Failed to mark session {} as failed: {}",
                    session_id, store_err
                );
            }
        }

        self.store
            .get_session(user_id, &session_id)
            .await?
            .ok_or_else(|| Error::Session(format!("session {session_id} vanished from store")))
    }

    async fn process(
        &self,
        user_id: &str,
        session_id: &str,
        request: &SearchRequest,
    ) -> Result<()> {
        self.store
            .update_session_status(user_id, session_id, SessionStatus::Processing, None, None)
            .await?;

        let ctx = SearchContext::new(user_id);
        let papers = self.aggregator.search_all_sources(request, &ctx).await;

        if papers.is_empty() {
            info!("Session {} found no papers", session_id);
            return self
                .store
                .update_session_status(
                    user_id,
                    session_id,
                    SessionStatus::Completed,
                    Some(0),
                    Some(NO_RESULTS_MESSAGE.to_string()),
                )
                .await;
        }

        let mut analyses: HashMap<String, PaperAnalysis> = HashMap::new();
        if request.generate_analysis {
            if let Some(analyzer) = &self.analyzer {
                analyses = analyze_papers_batch(analyzer.as_ref(), &papers)
                    .await
                    .into_iter()
                    .map(|analysis| (analysis.paper_id.clone(), analysis))
                    .collect();
            } else {
                warn!("Analysis requested but no analyzer is configured");
            }
        }

        let results: Vec<PaperWithAnalysis> = papers
            .into_iter()
            .map(|paper| {
                let analysis = analyses.remove(&paper.id);
                PaperWithAnalysis { paper, analysis }
            })
            .collect();

        self.store
            .store_papers(user_id, session_id, &results)
            .await?;
        self.store
            .update_session_status(
                user_id,
                session_id,
                SessionStatus::Completed,
                Some(results.len()),
                None,
            )
            .await?;

        info!(
            "Session {} completed with {} papers",
            session_id,
            results.len()
        );
        Ok(())
    }
}

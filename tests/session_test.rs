//! End-to-end session lifecycle tests

use async_trait::async_trait;
use research_aggregator::client::providers::{SearchContext, SourceAdapter, SourceError};
use research_aggregator::enrichment::PaperAnalyzer;
use research_aggregator::storage::SessionStore;
use research_aggregator::{
    DateRange, Error, InMemorySessionStore, Paper, PaperAnalysis, PaperWithAnalysis,
    SearchAggregator, SearchRequest, SearchSession, SessionOrchestrator, SessionStatus, Source,
};
use std::sync::Arc;

struct FixedAdapter {
    source: Source,
    papers: Vec<Paper>,
}

#[async_trait]
impl SourceAdapter for FixedAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn description(&self) -> &str {
        "fixed adapter"
    }

    async fn search(
        &self,
        _query: &str,
        max_results: usize,
        _date_range: Option<&DateRange>,
        _ctx: &SearchContext,
    ) -> Result<Vec<Paper>, SourceError> {
        let mut papers = self.papers.clone();
        papers.truncate(max_results);
        Ok(papers)
    }
}

/// Analyzer that fails for the ids it is told to fail for
struct StubAnalyzer {
    failing: Vec<String>,
}

#[async_trait]
impl PaperAnalyzer for StubAnalyzer {
    async fn analyze_paper(
        &self,
        paper: &Paper,
    ) -> research_aggregator::Result<PaperAnalysis> {
        if self.failing.contains(&paper.id) {
            return Err(Error::Enrichment("backend rejected paper".to_string()));
        }
        Ok(PaperAnalysis::new(&paper.id, format!("Summary of {}", paper.title)))
    }
}

/// Store that fails exactly one operation, delegating the rest
struct FlakyStore {
    inner: InMemorySessionStore,
    fail_store_papers: bool,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn create_session(&self, session: &SearchSession) -> research_aggregator::Result<()> {
        self.inner.create_session(session).await
    }

    async fn update_session_status(
        &self,
        user_id: &str,
        session_id: &str,
        status: SessionStatus,
        results_count: Option<usize>,
        error_message: Option<String>,
    ) -> research_aggregator::Result<()> {
        self.inner
            .update_session_status(user_id, session_id, status, results_count, error_message)
            .await
    }

    async fn store_papers(
        &self,
        user_id: &str,
        session_id: &str,
        papers: &[PaperWithAnalysis],
    ) -> research_aggregator::Result<()> {
        if self.fail_store_papers {
            return Err(Error::Storage {
                operation: "store_papers".to_string(),
                reason: "backend unavailable".to_string(),
            });
        }
        self.inner.store_papers(user_id, session_id, papers).await
    }

    async fn get_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> research_aggregator::Result<Option<SearchSession>> {
        self.inner.get_session(user_id, session_id).await
    }

    async fn get_session_papers(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> research_aggregator::Result<Vec<PaperWithAnalysis>> {
        self.inner.get_session_papers(user_id, session_id).await
    }

    async fn get_user_sessions(
        &self,
        user_id: &str,
        limit: usize,
        status_filter: Option<SessionStatus>,
    ) -> research_aggregator::Result<Vec<SearchSession>> {
        self.inner
            .get_user_sessions(user_id, limit, status_filter)
            .await
    }
}

fn paper(id: &str, title: &str) -> Paper {
    Paper {
        id: id.to_string(),
        title: title.to_string(),
        abstract_text: String::new(),
        authors: Vec::new(),
        published: "2023-01-01T00:00:00Z".to_string(),
        pdf_url: None,
        source: Source::Arxiv,
        doi: None,
        citation_count: None,
        venue: None,
        keywords: Vec::new(),
        is_open_access: true,
    }
}

fn orchestrator_with(
    papers: Vec<Paper>,
    store: Arc<dyn SessionStore>,
    analyzer: Option<Arc<dyn PaperAnalyzer>>,
) -> SessionOrchestrator {
    let adapter = Arc::new(FixedAdapter {
        source: Source::Arxiv,
        papers,
    });
    let aggregator = Arc::new(SearchAggregator::new(vec![adapter]));
    SessionOrchestrator::new(aggregator, store, analyzer)
}

#[tokio::test]
async fn successful_search_completes_with_analyses() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let analyzer: Arc<dyn PaperAnalyzer> = Arc::new(StubAnalyzer { failing: vec![] });
    let orchestrator = orchestrator_with(
        vec![paper("a1", "First Paper"), paper("a2", "Second Paper")],
        Arc::clone(&store),
        Some(analyzer),
    );

    let request = SearchRequest::new("quantum computing", vec![Source::Arxiv]);
    let session = orchestrator.run("alice", &request).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results_count, 2);
    assert!(session.error_message.is_none());
    assert!(session.completed_at.is_some());

    let papers = store
        .get_session_papers("alice", &session.session_id)
        .await
        .unwrap();
    assert_eq!(papers.len(), 2);
    assert!(papers.iter().all(|p| p.analysis.is_some()));
    assert_eq!(
        papers[0].analysis.as_ref().unwrap().paper_id,
        papers[0].paper.id
    );
}

#[tokio::test]
async fn empty_result_completes_with_message() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let orchestrator = orchestrator_with(vec![], Arc::clone(&store), None);

    let request = SearchRequest::new("nothing matches this", vec![Source::Arxiv]);
    let session = orchestrator.run("alice", &request).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results_count, 0);
    assert_eq!(
        session.error_message.as_deref(),
        Some("No papers found for the given query")
    );
}

#[tokio::test]
async fn failed_analysis_costs_only_that_paper() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let analyzer: Arc<dyn PaperAnalyzer> = Arc::new(StubAnalyzer {
        failing: vec!["a1".to_string()],
    });
    let orchestrator = orchestrator_with(
        vec![paper("a1", "Broken Paper"), paper("a2", "Good Paper")],
        Arc::clone(&store),
        Some(analyzer),
    );

    let request = SearchRequest::new("mixed results", vec![Source::Arxiv]);
    let session = orchestrator.run("alice", &request).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.results_count, 2);

    let papers = store
        .get_session_papers("alice", &session.session_id)
        .await
        .unwrap();
    let a1 = papers.iter().find(|p| p.paper.id == "a1").unwrap();
    let a2 = papers.iter().find(|p| p.paper.id == "a2").unwrap();
    assert!(a1.analysis.is_none());
    assert!(a2.analysis.is_some());
}

#[tokio::test]
async fn analysis_can_be_opted_out() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let analyzer: Arc<dyn PaperAnalyzer> = Arc::new(StubAnalyzer { failing: vec![] });
    let orchestrator = orchestrator_with(
        vec![paper("a1", "A Paper")],
        Arc::clone(&store),
        Some(analyzer),
    );

    let mut request = SearchRequest::new("no analysis please", vec![Source::Arxiv]);
    request.generate_analysis = false;

    let session = orchestrator.run("alice", &request).await.unwrap();
    let papers = store
        .get_session_papers("alice", &session.session_id)
        .await
        .unwrap();
    assert!(papers[0].analysis.is_none());
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_session_exists() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let orchestrator = orchestrator_with(vec![], Arc::clone(&store), None);

    let request = SearchRequest::new("ab", vec![Source::Arxiv]);
    let result = orchestrator.run("alice", &request).await;
    assert!(matches!(result, Err(Error::InvalidInput { .. })));

    let sessions = store.get_user_sessions("alice", 10, None).await.unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn storage_failure_marks_session_failed() {
    let store: Arc<dyn SessionStore> = Arc::new(FlakyStore {
        inner: InMemorySessionStore::new(),
        fail_store_papers: true,
    });
    let orchestrator = orchestrator_with(
        vec![paper("a1", "Doomed Paper")],
        Arc::clone(&store),
        None,
    );

    let request = SearchRequest::new("storage outage", vec![Source::Arxiv]);
    let session = orchestrator.run("alice", &request).await.unwrap();

    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session
        .error_message
        .as_deref()
        .unwrap()
        .contains("store_papers"));
    assert!(session.completed_at.is_some());

    let sessions = store.get_user_sessions("alice", 10, None).await.unwrap();
    assert_eq!(sessions.len(), 1);
}

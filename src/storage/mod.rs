//! Session and result persistence

use crate::models::{PaperWithAnalysis, SearchSession, SessionStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Persistence collaborator for search sessions and their results
///
/// Sessions are scoped per user: every accessor takes the `user_id`, and a
/// session is only visible to its owner. Status updates must respect the
/// monotonic lifecycle; implementations reject regressions and any change
/// to a terminal session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a freshly created session
    async fn create_session(&self, session: &SearchSession) -> Result<()>;

    /// Advance a session's lifecycle status
    ///
    /// `results_count` and `error_message` are applied only when given, so
    /// moving to Processing does not clobber fields set later.
    async fn update_session_status(
        &self,
        user_id: &str,
        session_id: &str,
        status: SessionStatus,
        results_count: Option<usize>,
        error_message: Option<String>,
    ) -> Result<()>;

    /// Attach the final result set to a session
    async fn store_papers(
        &self,
        user_id: &str,
        session_id: &str,
        papers: &[PaperWithAnalysis],
    ) -> Result<()>;

    /// Fetch one session by id
    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<SearchSession>>;

    /// Fetch the stored results for a session
    async fn get_session_papers(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<PaperWithAnalysis>>;

    /// List a user's sessions, newest first, optionally filtered by status
    async fn get_user_sessions(
        &self,
        user_id: &str,
        limit: usize,
        status_filter: Option<SessionStatus>,
    ) -> Result<Vec<SearchSession>>;
}

#[derive(Debug, Default)]
struct UserSessions {
    sessions: HashMap<String, SearchSession>,
    papers: HashMap<String, Vec<PaperWithAnalysis>>,
}

/// In-memory session store
///
/// Backs tests and single-process deployments; state is lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    users: RwLock<HashMap<String, UserSessions>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing_session(session_id: &str) -> Error {
    Error::Storage {
        operation: "update_session".to_string(),
        reason: format!("session {session_id} not found"),
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: &SearchSession) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users.entry(session.user_id.clone()).or_default();

        if user.sessions.contains_key(&session.session_id) {
            return Err(Error::Storage {
                operation: "create_session".to_string(),
                reason: format!("session {} already exists", session.session_id),
            });
        }

        debug!(
            "Created session {} for user {}",
            session.session_id, session.user_id
        );
        user.sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn update_session_status(
        &self,
        user_id: &str,
        session_id: &str,
        status: SessionStatus,
        results_count: Option<usize>,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut users = self.users.write().await;
        let session = users
            .get_mut(user_id)
            .and_then(|user| user.sessions.get_mut(session_id))
            .ok_or_else(|| missing_session(session_id))?;

        if !session.status.can_transition_to(status) {
            return Err(Error::Session(format!(
                "invalid status transition {} -> {} for session {}",
                session.status, status, session_id
            )));
        }

        info!("Session {} status: {} -> {}", session_id, session.status, status);
        session.status = status;
        if let Some(count) = results_count {
            session.results_count = count;
        }
        if let Some(message) = error_message {
            session.error_message = Some(message);
        }
        if status.is_terminal() {
            session.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn store_papers(
        &self,
        user_id: &str,
        session_id: &str,
        papers: &[PaperWithAnalysis],
    ) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| missing_session(session_id))?;
        if !user.sessions.contains_key(session_id) {
            return Err(missing_session(session_id));
        }

        debug!(
            "Storing {} papers for session {}",
            papers.len(),
            session_id
        );
        user.papers.insert(session_id.to_string(), papers.to_vec());
        Ok(())
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<SearchSession>> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .and_then(|user| user.sessions.get(session_id))
            .cloned())
    }

    async fn get_session_papers(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<PaperWithAnalysis>> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .and_then(|user| user.papers.get(session_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_user_sessions(
        &self,
        user_id: &str,
        limit: usize,
        status_filter: Option<SessionStatus>,
    ) -> Result<Vec<SearchSession>> {
        let users = self.users.read().await;
        let mut sessions: Vec<SearchSession> = users
            .get(user_id)
            .map(|user| {
                user.sessions
                    .values()
                    .filter(|session| {
                        status_filter.map_or(true, |status| session.status == status)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Paper, SearchRequest, Source};

    fn request() -> SearchRequest {
        SearchRequest::new("quantum computing", vec![Source::Arxiv])
    }

    fn sample_paper(id: &str) -> PaperWithAnalysis {
        PaperWithAnalysis {
            paper: Paper {
                id: id.to_string(),
                title: "Test".to_string(),
                abstract_text: String::new(),
                authors: vec![],
                published: "2023-01-01T00:00:00Z".to_string(),
                pdf_url: None,
                source: Source::Arxiv,
                doi: None,
                citation_count: None,
                venue: None,
                keywords: vec![],
                is_open_access: true,
            },
            analysis: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = InMemorySessionStore::new();
        let session = SearchSession::new("alice", &request());

        store.create_session(&session).await.unwrap();
        let fetched = store
            .get_session("alice", &session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.session_id, session.session_id);
        assert_eq!(fetched.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn test_sessions_are_user_scoped() {
        let store = InMemorySessionStore::new();
        let session = SearchSession::new("alice", &request());
        store.create_session(&session).await.unwrap();

        let other = store
            .get_session("bob", &session.session_id)
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected() {
        let store = InMemorySessionStore::new();
        let session = SearchSession::new("alice", &request());
        store.create_session(&session).await.unwrap();
        assert!(store.create_session(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_status_lifecycle() {
        let store = InMemorySessionStore::new();
        let session = SearchSession::new("alice", &request());
        store.create_session(&session).await.unwrap();

        store
            .update_session_status(
                "alice",
                &session.session_id,
                SessionStatus::Processing,
                None,
                None,
            )
            .await
            .unwrap();

        store
            .update_session_status(
                "alice",
                &session.session_id,
                SessionStatus::Completed,
                Some(7),
                None,
            )
            .await
            .unwrap();

        let fetched = store
            .get_session("alice", &session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.status, SessionStatus::Completed);
        assert_eq!(fetched.results_count, 7);
        assert!(fetched.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_session_is_immutable() {
        let store = InMemorySessionStore::new();
        let session = SearchSession::new("alice", &request());
        store.create_session(&session).await.unwrap();

        store
            .update_session_status(
                "alice",
                &session.session_id,
                SessionStatus::Failed,
                None,
                Some("boom".to_string()),
            )
            .await
            .unwrap();

        let result = store
            .update_session_status(
                "alice",
                &session.session_id,
                SessionStatus::Completed,
                None,
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::Session(_))));
    }

    #[tokio::test]
    async fn test_status_regression_is_rejected() {
        let store = InMemorySessionStore::new();
        let session = SearchSession::new("alice", &request());
        store.create_session(&session).await.unwrap();

        store
            .update_session_status(
                "alice",
                &session.session_id,
                SessionStatus::Processing,
                None,
                None,
            )
            .await
            .unwrap();

        let result = store
            .update_session_status(
                "alice",
                &session.session_id,
                SessionStatus::Pending,
                None,
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::Session(_))));
    }

    #[tokio::test]
    async fn test_store_and_get_papers() {
        let store = InMemorySessionStore::new();
        let session = SearchSession::new("alice", &request());
        store.create_session(&session).await.unwrap();

        let papers = vec![sample_paper("p1"), sample_paper("p2")];
        store
            .store_papers("alice", &session.session_id, &papers)
            .await
            .unwrap();

        let fetched = store
            .get_session_papers("alice", &session.session_id)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].paper.id, "p1");

        // Unknown session yields an empty list, not an error
        let none = store.get_session_papers("alice", "missing").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_store_papers_for_unknown_session_errors() {
        let store = InMemorySessionStore::new();
        let result = store
            .store_papers("alice", "missing", &[sample_paper("p1")])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_user_sessions_newest_first_with_filter() {
        let store = InMemorySessionStore::new();

        let first = SearchSession::new("alice", &request());
        store.create_session(&first).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = SearchSession::new("alice", &request());
        store.create_session(&second).await.unwrap();

        store
            .update_session_status(
                "alice",
                &first.session_id,
                SessionStatus::Failed,
                None,
                Some("boom".to_string()),
            )
            .await
            .unwrap();

        let all = store.get_user_sessions("alice", 10, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].session_id, second.session_id);

        let failed = store
            .get_user_sessions("alice", 10, Some(SessionStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].session_id, first.session_id);

        let limited = store.get_user_sessions("alice", 1, None).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}

//! Conversation sessions: one active session per identity, its mode, and its stored transcript.
//!
//! Resume picks the most recently created session for the identity; a new one is created only
//! when the identity has none. Stored modes are validated on load and fall back to the default.

use crate::auth::Identity;
use crate::mode::Mode;
use crate::store::{MessageRecord, Persistence, SessionRecord, StoreError};
use crate::transcript::Message;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Unique session identifier (opaque string).
pub type SessionId = String;

/// A conversation session owned by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session with a random id and the default mode. Not stored.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            mode: Mode::default(),
            created_at: Utc::now(),
        }
    }

    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            mode: Mode::from_stored(&record.mode),
            id: record.id,
            user_id: record.user_id,
            created_at: record.created_at,
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            mode: self.mode.as_str().to_string(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] StoreError),
}

/// Session lifecycle over a [`Persistence`] backend.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Persistence>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Most recent session for the identity, or a newly stored one with the default mode.
    pub async fn resume_or_create(&self, identity: &Identity) -> Result<Session, SessionError> {
        if let Some(record) = self.store.latest_session(&identity.user_id).await? {
            log::debug!("resuming session {} for {}", record.id, identity.user_id);
            return Ok(Session::from_record(record));
        }
        let session = Session::new(identity.user_id.clone());
        self.store.insert_session(&session.to_record()).await?;
        log::info!("created session {} for {}", session.id, identity.user_id);
        Ok(session)
    }

    /// Persist the new mode, then apply it to `session`. On failure the session is unchanged.
    pub async fn set_mode(&self, session: &mut Session, mode: Mode) -> Result<(), SessionError> {
        self.store
            .update_session_mode(&session.id, &session.user_id, mode.as_str())
            .await?;
        session.mode = mode;
        Ok(())
    }

    /// Stored transcript in ascending timestamp order, whatever order the backend returned.
    pub async fn load_history(&self, session: &Session) -> Result<Vec<Message>, SessionError> {
        let mut messages: Vec<Message> = self
            .store
            .list_messages(&session.id, &session.user_id)
            .await?
            .into_iter()
            .map(MessageRecord::into_message)
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    /// Store one message of the session.
    pub async fn record(&self, session: &Session, message: &Message) -> Result<(), SessionError> {
        self.store
            .insert_message(&MessageRecord::from_message(message, session.user_id.clone()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transcript::Role;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn alice() -> Identity {
        Identity {
            user_id: "alice".to_string(),
            email: None,
        }
    }

    /// Backend that fails every call.
    struct Down;

    #[async_trait]
    impl Persistence for Down {
        async fn latest_session(&self, _: &str) -> Result<Option<SessionRecord>, StoreError> {
            Err(StoreError::NotFound("down".to_string()))
        }
        async fn insert_session(&self, _: &SessionRecord) -> Result<(), StoreError> {
            Err(StoreError::NotFound("down".to_string()))
        }
        async fn update_session_mode(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::NotFound("down".to_string()))
        }
        async fn insert_message(&self, _: &MessageRecord) -> Result<(), StoreError> {
            Err(StoreError::NotFound("down".to_string()))
        }
        async fn list_messages(&self, _: &str, _: &str) -> Result<Vec<MessageRecord>, StoreError> {
            Err(StoreError::NotFound("down".to_string()))
        }
    }

    #[tokio::test]
    async fn creates_then_resumes_same_session() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let first = manager.resume_or_create(&alice()).await.unwrap();
        assert_eq!(first.mode, Mode::Tutor);
        assert_eq!(first.user_id, "alice");
        let again = manager.resume_or_create(&alice()).await.unwrap();
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn new_session_has_empty_history() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let session = manager.resume_or_create(&alice()).await.unwrap();
        assert!(manager.load_history(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resume_prefers_most_recent_session() {
        let store = Arc::new(MemoryStore::new());
        for (id, secs) in [("old", 100), ("new", 200)] {
            store
                .insert_session(&SessionRecord {
                    id: id.to_string(),
                    user_id: "alice".to_string(),
                    mode: "writer".to_string(),
                    created_at: Utc.timestamp_opt(secs, 0).unwrap(),
                })
                .await
                .unwrap();
        }
        let manager = SessionManager::new(store);
        let session = manager.resume_or_create(&alice()).await.unwrap();
        assert_eq!(session.id, "new");
        assert_eq!(session.mode, Mode::Writer);
    }

    #[tokio::test]
    async fn unknown_stored_mode_loads_as_default() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_session(&SessionRecord {
                id: "s1".to_string(),
                user_id: "alice".to_string(),
                mode: "pirate".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let manager = SessionManager::new(store);
        let session = manager.resume_or_create(&alice()).await.unwrap();
        assert_eq!(session.mode, Mode::Tutor);
    }

    #[tokio::test]
    async fn set_mode_persists() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone());
        let mut session = manager.resume_or_create(&alice()).await.unwrap();
        manager.set_mode(&mut session, Mode::Support).await.unwrap();
        assert_eq!(session.mode, Mode::Support);
        let stored = store.latest_session("alice").await.unwrap().unwrap();
        assert_eq!(stored.mode, "support");
    }

    #[tokio::test]
    async fn history_is_sorted_regardless_of_row_order() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone());
        let session = manager.resume_or_create(&alice()).await.unwrap();
        for (secs, content) in [(300, "third"), (100, "first"), (200, "second"), (400, "fourth")] {
            store
                .insert_message(&MessageRecord {
                    session_id: session.id.clone(),
                    user_id: "alice".to_string(),
                    role: Role::User,
                    content: content.to_string(),
                    created_at: Utc.timestamp_opt(secs, 0).unwrap(),
                })
                .await
                .unwrap();
        }
        let history = manager.load_history(&session).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third", "fourth"]);
    }

    #[tokio::test]
    async fn store_failures_surface_as_persistence_unavailable() {
        let manager = SessionManager::new(Arc::new(Down));
        assert!(matches!(
            manager.resume_or_create(&alice()).await,
            Err(SessionError::PersistenceUnavailable(_))
        ));
        let mut session = Session::new("alice");
        assert!(manager.set_mode(&mut session, Mode::Writer).await.is_err());
        assert_eq!(session.mode, Mode::Tutor);
    }
}

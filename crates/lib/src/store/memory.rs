//! In-memory store (tests and throwaway runs).

use super::{MessageRecord, Persistence, SessionRecord, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Both tables; also the on-disk document of the JSON file store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct Tables {
    pub sessions: Vec<SessionRecord>,
    pub messages: Vec<MessageRecord>,
}

impl Tables {
    pub fn latest_session(&self, user_id: &str) -> Option<SessionRecord> {
        // max_by_key returns the last of equal maxima, so ties resolve to the latest insert.
        self.sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned()
    }

    pub fn update_session_mode(
        &mut self,
        session_id: &str,
        user_id: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;
        session.mode = mode.to_string();
        Ok(())
    }

    pub fn list_messages(&self, session_id: &str, user_id: &str) -> Vec<MessageRecord> {
        self.messages
            .iter()
            .filter(|m| m.session_id == session_id && m.user_id == user_id)
            .cloned()
            .collect()
    }
}

/// Sessions and messages held in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn latest_session(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.inner.read().await.latest_session(user_id))
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.inner.write().await.sessions.push(record.clone());
        Ok(())
    }

    async fn update_session_mode(
        &self,
        session_id: &str,
        user_id: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .update_session_mode(session_id, user_id, mode)
    }

    async fn insert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.inner.write().await.messages.push(record.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        Ok(self.inner.read().await.list_messages(session_id, user_id))
    }
}

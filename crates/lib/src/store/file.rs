//! JSON file store: both tables in one document, rewritten after every change.
//!
//! A change is applied to a copy of the tables and only becomes visible once the file has been
//! written, so a failed write leaves memory and disk in agreement.

use super::memory::Tables;
use super::{MessageRecord, Persistence, SessionRecord, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub struct JsonFileStore {
    path: PathBuf,
    tables: RwLock<Tables>,
}

impl JsonFileStore {
    /// Load the document at `path`. A missing file starts empty; a corrupt file is an error so
    /// existing history is never silently overwritten.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let tables = match tokio::fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => Tables::default(),
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            tables: RwLock::new(tables),
        })
    }

    /// Apply `change` to a copy of the tables, write it, then swap it in.
    async fn commit<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Tables) -> Result<(), StoreError>,
    {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        change(&mut next)?;
        self.save(&next).await?;
        *tables = next;
        Ok(())
    }

    async fn save(&self, tables: &Tables) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(tables)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for JsonFileStore {
    async fn latest_session(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.tables.read().await.latest_session(user_id))
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.commit(|tables| {
            tables.sessions.push(record.clone());
            Ok(())
        })
        .await
    }

    async fn update_session_mode(
        &self,
        session_id: &str,
        user_id: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        self.commit(|tables| tables.update_session_mode(session_id, user_id, mode))
            .await
    }

    async fn insert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.commit(|tables| {
            tables.messages.push(record.clone());
            Ok(())
        })
        .await
    }

    async fn list_messages(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        Ok(self.tables.read().await.list_messages(session_id, user_id))
    }
}

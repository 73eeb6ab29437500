//! Persistence for sessions and messages.
//!
//! Two logical tables: sessions (id, owner, mode, created-at) and messages (session id, owner,
//! role, content, created-at). Backends: in-memory, a local JSON file, and a PostgREST
//! (Supabase REST) endpoint.

mod file;
mod memory;
mod postgrest;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

use crate::config::{self, Config, StorageBackend};
use crate::transcript::{Message, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Row in the sessions table. `mode` is kept as the raw stored text; it is validated on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub mode: String,
    pub created_at: DateTime<Utc>,
}

/// Row in the messages table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn from_message(message: &Message, user_id: impl Into<String>) -> Self {
        Self {
            session_id: message.session_id.clone(),
            user_id: user_id.into(),
            role: message.role,
            content: message.content.clone(),
            created_at: message.timestamp,
        }
    }

    pub fn into_message(self) -> Message {
        Message {
            session_id: self.session_id,
            role: self.role,
            content: self.content,
            timestamp: self.created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage data invalid: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage api error: {status} {message}")]
    Api { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
}

/// Backend for the sessions and messages tables. Every query is scoped by owner.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Most recently created session for `user_id`, if any.
    async fn latest_session(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn update_session_mode(
        &self,
        session_id: &str,
        user_id: &str,
        mode: &str,
    ) -> Result<(), StoreError>;

    async fn insert_message(&self, record: &MessageRecord) -> Result<(), StoreError>;

    /// Messages of one session. Row order is backend-defined; callers sort.
    async fn list_messages(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<MessageRecord>, StoreError>;
}

/// Open the configured backend. `access_token` is forwarded to PostgREST so row-level security
/// sees the signed-in user.
pub async fn open(
    config: &Config,
    config_path: &Path,
    access_token: Option<&str>,
) -> Result<Arc<dyn Persistence>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => {
            let path = config::resolve_storage_path(config, config_path);
            let store = JsonFileStore::open(&path)
                .await
                .with_context(|| format!("opening history file {}", path.display()))?;
            log::debug!("using history file {}", path.display());
            Ok(Arc::new(store))
        }
        StorageBackend::Postgrest => {
            let url = config::resolve_supabase_url(config)
                .context("storage.backend is \"postgrest\" but no supabase url is configured")?;
            let key = config::resolve_supabase_key(config)
                .context("storage.backend is \"postgrest\" but no supabase key is configured")?;
            Ok(Arc::new(PostgrestStore::new(
                url,
                key,
                access_token.map(str::to_string),
                config.storage.sessions_table.clone(),
                config.storage.messages_table.clone(),
            )))
        }
    }
}

//! PostgREST (Supabase REST) store.
//!
//! Uses `{url}/rest/v1/{table}` with `eq.` filters. Requests carry the project key in `apikey` and
//! the user's access token (or the project key) as the bearer, so row-level security applies.

use super::{MessageRecord, Persistence, SessionRecord, StoreError};
use async_trait::async_trait;
use serde_json::json;

#[derive(Clone)]
pub struct PostgrestStore {
    rest_url: String,
    api_key: String,
    access_token: Option<String>,
    sessions_table: String,
    messages_table: String,
    client: reqwest::Client,
}

impl PostgrestStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: Option<String>,
        sessions_table: impl Into<String>,
        messages_table: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            access_token,
            sessions_table: sessions_table.into(),
            messages_table: messages_table.into(),
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

async fn check(res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let message = res.text().await.unwrap_or_default();
    Err(StoreError::Api { status, message })
}

#[async_trait]
impl Persistence for PostgrestStore {
    async fn latest_session(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let res = self
            .request(reqwest::Method::GET, &self.sessions_table)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<SessionRecord> = check(res).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let res = self
            .request(reqwest::Method::POST, &self.sessions_table)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn update_session_mode(
        &self,
        session_id: &str,
        user_id: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        let res = self
            .request(reqwest::Method::PATCH, &self.sessions_table)
            .query(&[("id", eq(session_id)), ("user_id", eq(user_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "mode": mode }))
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn insert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let res = self
            .request(reqwest::Method::POST, &self.messages_table)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let res = self
            .request(reqwest::Method::GET, &self.messages_table)
            .query(&[
                ("select", "session_id,user_id,role,content,created_at".to_string()),
                ("session_id", eq(session_id)),
                ("user_id", eq(user_id)),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }
}

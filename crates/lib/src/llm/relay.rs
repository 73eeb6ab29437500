//! Relay client: sends the conversation to the gateway's `POST /chat` with the user's bearer
//! credential. The gateway re-validates the credential and adds the system prompt.

use super::{CompletionClient, CompletionError, CompletionRequest};
use crate::gateway::{ErrorBody, RelayRequest, RelayResponse};
use async_trait::async_trait;

#[derive(Clone)]
pub struct RelayClient {
    chat_url: String,
    token: String,
    client: reqwest::Client,
}

impl RelayClient {
    /// `gateway_url` is the gateway base (e.g. `http://127.0.0.1:15151`).
    pub fn new(gateway_url: impl AsRef<str>, token: impl Into<String>) -> Self {
        Self {
            chat_url: format!("{}/chat", gateway_url.as_ref().trim_end_matches('/')),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn relay_body(request: &CompletionRequest) -> RelayRequest {
        RelayRequest {
            messages: request.turns().to_vec(),
            mode: request.mode().as_str().to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for RelayClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = Self::relay_body(request);
        let res = self
            .client
            .post(&self.chat_url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CompletionError::Unauthorized);
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let data: RelayResponse = res.json().await?;
        Ok(data.response)
    }
}

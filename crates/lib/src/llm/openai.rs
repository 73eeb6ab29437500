//! OpenAI-compatible upstream client (POST {base}/chat/completions).
//! Holds the secret API key; only the gateway constructs one.

use super::{ChatMessage, CompletionClient, CompletionError, CompletionRequest, FALLBACK_REPLY};
use crate::config::CompletionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// First candidate's text, or the fallback reply when there is none.
    fn into_reply(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: request.messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        log::debug!(
            "completion: {} message(s) to {} ({} mode)",
            request.turns().len() + 1,
            self.model,
            request.mode()
        );
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let message = res.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, message });
        }
        let data: ChatCompletionResponse = res.json().await?;
        Ok(data.into_reply())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    #[test]
    fn no_choices_yields_fallback() {
        let r: ChatCompletionResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert_eq!(r.into_reply(), FALLBACK_REPLY);
        let r: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(r.into_reply(), FALLBACK_REPLY);
        let r: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": null } }] }))
                .unwrap();
        assert_eq!(r.into_reply(), FALLBACK_REPLY);
    }

    #[test]
    fn first_choice_wins() {
        let r: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "one" } },
                { "message": { "role": "assistant", "content": "two" } }
            ]
        }))
        .unwrap();
        assert_eq!(r.into_reply(), "one");
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/v1", addr)
    }

    #[tokio::test]
    async fn sends_sampling_settings_and_key() {
        async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
            assert_eq!(body["model"], "gpt-4o");
            assert_eq!(body["max_tokens"], 800);
            assert_eq!(body["messages"][0]["role"], "system");
            let last = body["messages"].as_array().unwrap().last().unwrap().clone();
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": format!("echo: {}", last["content"].as_str().unwrap()) } }]
            }))
        }
        let base = spawn(Router::new().route("/v1/chat/completions", post(completions))).await;
        let config = CompletionConfig {
            base_url: base,
            ..CompletionConfig::default()
        };
        let client = OpenAiClient::new(&config, Some("sk-test".to_string()));
        let req = CompletionRequest::build(Mode::Writer, &[], "draft a haiku");
        assert_eq!(client.complete(&req).await.unwrap(), "echo: draft a haiku");
    }

    #[tokio::test]
    async fn upstream_error_is_api_error() {
        let base = spawn(Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        ))
        .await;
        let config = CompletionConfig {
            base_url: base,
            ..CompletionConfig::default()
        };
        let client = OpenAiClient::new(&config, None);
        let req = CompletionRequest::build(Mode::Tutor, &[], "hi");
        match client.complete(&req).await {
            Err(CompletionError::Api { status, .. }) => assert_eq!(status, 429),
            other => panic!("expected api error, got {:?}", other),
        }
    }
}

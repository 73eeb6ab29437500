//! Shared helpers: a fake upstream completion server and a gateway started on a free port.

#![allow(dead_code)]

use axum::{http::StatusCode, routing::post, Json, Router};
use lib::config::Config;
use lib::gateway;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "alice-token";
pub const USER: &str = "alice";

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

pub fn temp_config_dir() -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("modechat-gateway-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create config dir");
    let config_path = dir.join("config.json");
    std::fs::File::create(&config_path)
        .and_then(|mut f| f.write_all(b"{}"))
        .expect("write config.json");
    (dir, config_path)
}

/// Request bodies received by the fake upstream.
pub type Seen = Arc<Mutex<Vec<Value>>>;

/// Fake OpenAI-compatible upstream. Replies `"{system prompt} | {last message}"`; the last message
/// `"say nothing"` yields no choices and `"explode"` yields a 500.
pub async fn spawn_upstream() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(body): Json<Value>| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(body.clone());
                let messages = body["messages"].as_array().cloned().unwrap_or_default();
                let system = messages.first().and_then(|m| m["content"].as_str()).unwrap_or("");
                let last = messages.last().and_then(|m| m["content"].as_str()).unwrap_or("");
                match last {
                    "say nothing" => (StatusCode::OK, Json(json!({ "choices": [] }))),
                    "explode" => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": { "message": "boom" } })),
                    ),
                    _ => (
                        StatusCode::OK,
                        Json(json!({
                            "choices": [{ "message": { "role": "assistant", "content": format!("{} | {}", system, last) } }]
                        })),
                    ),
                }
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}/v1", addr), seen)
}

/// Start the gateway against `upstream` and wait until GET / answers. Returns (base url, config, config path).
pub async fn spawn_gateway(upstream: &str) -> (String, Config, PathBuf) {
    let port = free_port();
    let (_dir, config_path) = temp_config_dir();

    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.completion.base_url = upstream.to_string();
    config.completion.api_key = Some("sk-test".to_string());
    config.auth.tokens.insert(TOKEN.to_string(), USER.to_string());

    let gateway_config = config.clone();
    let gateway_path = config_path.clone();
    tokio::spawn(async move {
        let _ = gateway::run_gateway(gateway_config, gateway_path).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/", base)).send().await {
            if resp.status().is_success() {
                return (base, config, config_path);
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway on {} did not become healthy within 5s", base);
}

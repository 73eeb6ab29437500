//! Gateway HTTP server (single port).

use crate::auth::{self, bearer_token, AuthError, IdentityProvider};
use crate::config::{self, Config};
use crate::gateway::protocol::{ErrorBody, RelayRequest, RelayResponse};
use crate::init;
use crate::llm::{CompletionClient, CompletionRequest, OpenAiClient};
use crate::mode::Mode;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

const PROTOCOL_VERSION: u32 = 1;

/// Shared state for the gateway.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Validates every request's bearer credential.
    pub identity: Arc<dyn IdentityProvider>,
    /// Upstream completion backend (holds the secret API key).
    pub completion: Arc<dyn CompletionClient>,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(error))).into_response()
}

/// Permissive CORS so browser-origin clients can call the gateway; answers OPTIONS preflights.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

/// Routes with state applied; used by [`run_gateway`] and handy for embedding.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/chat", post(chat_http))
        .layer(cors_layer())
        .with_state(state)
}

pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    init::require_initialized(&config_path)?;

    let identity = auth::from_config(&config)?;
    let api_key = config::resolve_completion_api_key(&config);
    if api_key.is_none() {
        log::warn!("no completion api key configured (completion.apiKey or OPENAI_API_KEY); upstream calls are sent without one");
    }
    let upstream = OpenAiClient::new(&config.completion, api_key);
    log::info!(
        "relaying completions to {} (model {})",
        config.completion.base_url,
        upstream.model()
    );

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState {
        config: Arc::new(config),
        identity,
        completion: Arc::new(upstream),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "protocol": PROTOCOL_VERSION,
        "port": state.config.gateway.port,
    }))
}

/// POST /chat: validate the bearer credential, add the mode's system prompt, relay upstream.
async fn chat_http(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = match bearer_token(header_value) {
        Ok(t) => t,
        Err(_) => return error_response(StatusCode::UNAUTHORIZED, "Missing Authorization header"),
    };
    let identity = match state.identity.verify(token).await {
        Ok(identity) => identity,
        Err(AuthError::Unavailable(e)) => {
            log::warn!("chat: identity provider unavailable: {}", e);
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Identity provider unavailable");
        }
        Err(e) => {
            log::debug!("chat: rejected credential: {}", e);
            return error_response(StatusCode::UNAUTHORIZED, "Invalid token or user not found");
        }
    };

    let request: RelayRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)),
    };
    let mode: Mode = match request.mode.parse() {
        Ok(m) => m,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if request.messages.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "messages must not be empty");
    }

    let completion = CompletionRequest::from_turns(mode, request.messages);
    log::debug!(
        "chat: {} turn(s) for {} in {} mode",
        completion.turns().len(),
        identity.user_id,
        mode
    );
    match state.completion.complete(&completion).await {
        Ok(response) => Json(RelayResponse {
            response,
            user_id: identity.user_id,
        })
        .into_response(),
        Err(e) => {
            log::warn!("chat: completion failed for {}: {}", identity.user_id, e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

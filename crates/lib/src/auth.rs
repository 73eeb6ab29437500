//! Bearer credential validation.
//!
//! The gateway never trusts an identity field supplied by the caller: every request's token is
//! resolved to an [`Identity`] through an [`IdentityProvider`].

use crate::config::{self, AuthProviderKind, Config};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,
    #[error("invalid token or user not found")]
    Invalid,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Extract the token from an Authorization header value (`Bearer <token>` or a bare token).
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.map(str::trim).unwrap_or("");
    let token = match value.get(..6) {
        Some(scheme)
            if scheme.eq_ignore_ascii_case("bearer")
                && value[6..].chars().next().map_or(true, char::is_whitespace) =>
        {
            value[6..].trim()
        }
        _ => value,
    };
    if token.is_empty() {
        Err(AuthError::Missing)
    } else {
        Ok(token)
    }
}

/// Resolves a bearer token to an identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Fixed token table from config (token -> user id).
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .get(token)
            .map(|user_id| Identity {
                user_id: user_id.clone(),
                email: None,
            })
            .ok_or(AuthError::Invalid)
    }
}

/// Supabase auth: GET {url}/auth/v1/user with the project key and the user's access token.
#[derive(Clone)]
pub struct SupabaseAuthProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseAuthProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthProvider {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let res = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        let status = res.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::Invalid);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AuthError::Unavailable(format!("{} {}", status, body)));
        }
        let user: SupabaseUser = res
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        if user.id.is_empty() {
            return Err(AuthError::Invalid);
        }
        Ok(Identity {
            user_id: user.id,
            email: user.email,
        })
    }
}

/// Build the configured identity provider.
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    match config.auth.provider {
        AuthProviderKind::Static => {
            let provider = StaticTokenProvider::new(config.auth.tokens.clone());
            if provider.is_empty() {
                log::warn!("auth.provider is \"static\" but auth.tokens is empty; every request will be rejected");
            }
            Ok(Arc::new(provider))
        }
        AuthProviderKind::Supabase => {
            let url = config::resolve_supabase_url(config).ok_or_else(|| {
                anyhow::anyhow!("auth.provider is \"supabase\" but no supabase url is configured (auth.supabaseUrl or SUPABASE_URL)")
            })?;
            let key = config::resolve_supabase_key(config).ok_or_else(|| {
                anyhow::anyhow!("auth.provider is \"supabase\" but no supabase key is configured (auth.supabaseKey or SUPABASE_KEY)")
            })?;
            Ok(Arc::new(SupabaseAuthProvider::new(url, key)))
        }
    }
}

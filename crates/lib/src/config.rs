//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.modechat/config.json`) and environment.
//! Secrets (upstream API key, Supabase key, client token) can come from either; env wins.

use crate::mode::Mode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Upstream completion backend (used by the gateway only).
    #[serde(default)]
    pub completion: CompletionConfig,

    /// How bearer credentials are validated.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Where sessions and messages are stored.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Settings for the interactive chat client.
    #[serde(default)]
    pub client: ClientConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 15151).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    15151
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint and sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    /// API base including the version segment (default "https://api.openai.com/v1").
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output length cap sent as max_tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upstream API key. Overridden by OPENAI_API_KEY env.
    pub api_key: Option<String>,
}

fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    800
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProviderKind {
    /// Tokens listed in `auth.tokens` (token -> user id).
    #[default]
    Static,

    /// Supabase auth: tokens are validated with GET /auth/v1/user.
    Supabase,
}

/// Identity provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default)]
    pub provider: AuthProviderKind,

    /// Static bearer tokens mapped to user ids. Only used by the static provider.
    #[serde(default)]
    pub tokens: HashMap<String, String>,

    /// Supabase project URL. Overridden by SUPABASE_URL env.
    pub supabase_url: Option<String>,

    /// Supabase project key (anon key for clients, service key for the gateway). Overridden by SUPABASE_KEY env.
    pub supabase_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON document on disk (default `history.json` next to the config file).
    #[default]
    File,

    /// Process memory only; history is lost on exit.
    Memory,

    /// Supabase REST tables.
    Postgrest,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// History file for the file backend. Relative paths are resolved against the config file's parent.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_sessions_table")]
    pub sessions_table: String,

    #[serde(default = "default_messages_table")]
    pub messages_table: String,
}

fn default_sessions_table() -> String {
    "chat_sessions".to_string()
}

fn default_messages_table() -> String {
    "chat_messages".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            sessions_table: default_sessions_table(),
            messages_table: default_messages_table(),
        }
    }
}

/// Interactive client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Gateway base URL (default http://{gateway.bind}:{gateway.port}).
    pub gateway_url: Option<String>,

    /// Bearer credential sent to the gateway. Overridden by MODECHAT_TOKEN env.
    pub token: Option<String>,

    /// Mode to switch to when a chat starts (leaves the session's mode alone when absent).
    pub default_mode: Option<Mode>,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the upstream completion API key: env OPENAI_API_KEY overrides config.
pub fn resolve_completion_api_key(config: &Config) -> Option<String> {
    non_empty_env("OPENAI_API_KEY").or_else(|| non_empty(&config.completion.api_key))
}

/// Resolve the client bearer token: env MODECHAT_TOKEN overrides config.
pub fn resolve_client_token(config: &Config) -> Option<String> {
    non_empty_env("MODECHAT_TOKEN").or_else(|| non_empty(&config.client.token))
}

/// Resolve the Supabase project URL: env SUPABASE_URL overrides config.
pub fn resolve_supabase_url(config: &Config) -> Option<String> {
    non_empty_env("SUPABASE_URL").or_else(|| non_empty(&config.auth.supabase_url))
}

/// Resolve the Supabase project key: env SUPABASE_KEY overrides config.
pub fn resolve_supabase_key(config: &Config) -> Option<String> {
    non_empty_env("SUPABASE_KEY").or_else(|| non_empty(&config.auth.supabase_key))
}

/// Gateway base URL the chat client talks to.
pub fn resolve_gateway_url(config: &Config) -> String {
    non_empty(&config.client.gateway_url)
        .map(|u| u.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("http://{}:{}", config.gateway.bind.trim(), config.gateway.port))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MODECHAT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".modechat").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// History file for the file backend: `storage.path` if set (relative to the config file's parent),
/// otherwise `history.json` next to the config file.
pub fn resolve_storage_path(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.storage.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                parent.join(p)
            }
        }
        _ => parent.join("history.json"),
    }
}

/// Load config from the default path (or MODECHAT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_settings() {
        let c = Config::default();
        assert_eq!(c.gateway.port, 15151);
        assert_eq!(c.gateway.bind, "127.0.0.1");
        assert_eq!(c.completion.model, "gpt-4o");
        assert_eq!(c.completion.max_tokens, 800);
        assert!((c.completion.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(c.storage.backend, StorageBackend::File);
        assert_eq!(c.auth.provider, AuthProviderKind::Static);
    }

    #[test]
    fn parses_camel_case_file() {
        let c: Config = serde_json::from_str(
            r#"{
                "gateway": { "port": 9000 },
                "completion": { "baseUrl": "http://localhost:1234/v1", "maxTokens": 64 },
                "auth": { "provider": "supabase", "supabaseUrl": "https://x.supabase.co" },
                "storage": { "backend": "postgrest", "messagesTable": "msgs" },
                "client": { "defaultMode": "developer" }
            }"#,
        )
        .unwrap();
        assert_eq!(c.gateway.port, 9000);
        assert_eq!(c.gateway.bind, "127.0.0.1");
        assert_eq!(c.completion.base_url, "http://localhost:1234/v1");
        assert_eq!(c.completion.max_tokens, 64);
        assert_eq!(c.completion.model, "gpt-4o");
        assert_eq!(c.auth.provider, AuthProviderKind::Supabase);
        assert_eq!(c.storage.backend, StorageBackend::Postgrest);
        assert_eq!(c.storage.sessions_table, "chat_sessions");
        assert_eq!(c.storage.messages_table, "msgs");
        assert_eq!(c.client.default_mode, Some(Mode::Developer));
    }

    #[test]
    fn gateway_url_defaults_to_bind_and_port() {
        let mut c = Config::default();
        assert_eq!(resolve_gateway_url(&c), "http://127.0.0.1:15151");
        c.client.gateway_url = Some("https://chat.example.com/".to_string());
        assert_eq!(resolve_gateway_url(&c), "https://chat.example.com");
    }

    #[test]
    fn storage_path_default_and_relative() {
        let mut c = Config::default();
        let path = Path::new("/home/user/.modechat/config.json");
        assert_eq!(
            resolve_storage_path(&c, path),
            PathBuf::from("/home/user/.modechat/history.json")
        );
        c.storage.path = Some(PathBuf::from("data/chat.json"));
        assert_eq!(
            resolve_storage_path(&c, path),
            PathBuf::from("/home/user/.modechat/data/chat.json")
        );
        c.storage.path = Some(PathBuf::from("/var/lib/chat.json"));
        assert_eq!(resolve_storage_path(&c, path), PathBuf::from("/var/lib/chat.json"));
    }
}

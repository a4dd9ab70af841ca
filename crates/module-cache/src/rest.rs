//! REST key/value store client
//!
//! Speaks the Redis-over-HTTP protocol used by Upstash-style stores: each
//! command is POSTed as a JSON array (`["GET", key]`) and the reply is
//! `{"result": ...}` or `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::kv::KvStore;

/// REST store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestKvConfig {
    /// Store endpoint URL
    pub url: String,
    /// Bearer token; never serialized
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Per-command timeout
    pub timeout: Duration,
}

impl Default for RestKvConfig {
    fn default() -> Self {
        RestKvConfig {
            url: std::env::var("APPLET_CACHE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8079".to_string()),
            token: std::env::var("APPLET_CACHE_TOKEN").ok(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl RestKvConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint
    pub fn new(url: &str) -> Self {
        RestKvConfig {
            url: url.to_string(),
            token: None,
            timeout: Duration::from_secs(5),
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

/// Key/value store reached over HTTP
pub struct RestKvStore {
    config: RestKvConfig,
    http_client: reqwest::Client,
}

impl RestKvStore {
    /// Create a new REST store client
    pub fn new(config: RestKvConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("applet-module-cache/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(RestKvStore {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(RestKvConfig::from_env())
    }

    async fn command(&self, args: Value) -> Result<Value> {
        debug!(url = %self.config.url, command = %args[0], "kv command");
        let mut request = self.http_client.post(&self.config.url).json(&args);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let reply: Reply = match response.json().await {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => {
                return Err(CacheError::Http(format!("store answered HTTP {status}")))
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(error) = reply.error {
            return Err(CacheError::Backend(error));
        }
        if !status.is_success() {
            return Err(CacheError::Http(format!("store answered HTTP {status}")));
        }
        Ok(reply.result)
    }
}

#[async_trait]
impl KvStore for RestKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(CacheError::Backend(format!(
                "unexpected GET result: {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.command(json!(["SET", key, value])).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let result = self.command(json!(["EXPIRE", key, seconds])).await?;
        Ok(result.as_i64() == Some(1))
    }
}

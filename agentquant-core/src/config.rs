use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::stream::Framing;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerCfg {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AgentCfg {
    /// Base URL of the agent exposing `/v1/chat/completions`.
    #[serde(default = "default_agent_base")]
    pub base_url: String,
}

impl Default for AgentCfg {
    fn default() -> Self {
        Self {
            base_url: default_agent_base(),
        }
    }
}

fn default_agent_base() -> String {
    "http://localhost:8000".into()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BackendCfg {
    /// Base URL of the service exposing `/data/{key}` and `/result/{id}`.
    #[serde(default = "default_backend_base")]
    pub base_url: String,
}

impl Default for BackendCfg {
    fn default() -> Self {
        Self {
            base_url: default_backend_base(),
        }
    }
}

fn default_backend_base() -> String {
    "http://localhost:8080".into()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamCfg {
    #[serde(default)]
    pub framing: Framing,
    /// Classify an unterminated final line when the upstream ends cleanly.
    #[serde(default = "default_flush_trailing")]
    pub flush_trailing_line: bool,
    /// Ceiling for one whole transcoding operation.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Events buffered between the transcoder task and the response body.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamCfg {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            flush_trailing_line: default_flush_trailing(),
            max_duration_secs: default_max_duration_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_flush_trailing() -> bool {
    true
}
fn default_max_duration_secs() -> u64 {
    60
}
fn default_channel_capacity() -> usize {
    64
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds (default 60000ms)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub agent: AgentCfg,
    #[serde(default)]
    pub backend: BackendCfg,
    #[serde(default)]
    pub stream: StreamCfg,
    /// HTTP client configuration (timeouts, pooling). Missing in older configs → defaults.
    #[serde(default)]
    pub http: HttpCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::GatewayError::from)?;
        let s =
            std::str::from_utf8(&bytes).map_err(|e| crate::error::GatewayError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::GatewayError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::GatewayError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::GatewayError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::GatewayError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> crate::error::CoreResult<()> {
        self.apply_env_with(|k| std::env::var(k).ok())
    }

    /// Apply overrides from an arbitrary lookup. `MCP_SERVER_URL` is the
    /// name the backend deployment already exports.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> crate::error::CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AGENT_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.agent.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("MCP_SERVER_URL").filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("AGENTQUANT_PORT") {
            self.server.port = v.trim().parse().map_err(|_| {
                crate::error::GatewayError::Validation(format!("invalid AGENTQUANT_PORT '{v}'"))
            })?;
        }
        Ok(())
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::models::Language;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_semantic_path")]
    pub semantic_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_language")]
    pub default_language: Language,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            stream_path: default_stream_path(),
            semantic_path: default_semantic_path(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            default_language: default_language(),
        }
    }
}

impl SearchConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn default_stream_path() -> String {
    "/api/search/stream".to_string()
}
fn default_semantic_path() -> String {
    "/api/search/semantic".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_language() -> Language {
    Language::Latin
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate server
    let base = config.server.base_url.trim();
    if base.is_empty() {
        anyhow::bail!("server.base_url must not be empty");
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        anyhow::bail!(
            "server.base_url must start with http:// or https://, got '{}'",
            base
        );
    }

    // Validate search
    for (name, path) in [
        ("search.stream_path", &config.search.stream_path),
        ("search.semantic_path", &config.search.semantic_path),
    ] {
        if !path.starts_with('/') {
            anyhow::bail!("{} must start with '/', got '{}'", name, path);
        }
    }
    if config.search.timeout_secs == 0 {
        anyhow::bail!("search.timeout_secs must be > 0");
    }
    if config.search.connect_timeout_secs == 0 {
        anyhow::bail!("search.connect_timeout_secs must be > 0");
    }
    if config.search.tick_interval_ms == 0 {
        anyhow::bail!("search.tick_interval_ms must be > 0");
    }

    Ok(config)
}

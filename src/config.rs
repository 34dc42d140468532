//! TOML configuration.
//!
//! Every section is optional; a missing config file yields [`Config::default`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when the stored API key is empty.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/products.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_llm_timeout_secs(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_excerpt_chars: default_max_excerpt_chars(),
        }
    }
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        .to_string()
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_k() -> u32 {
    40
}
fn default_top_p() -> f32 {
    0.8
}
fn default_max_excerpt_chars() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    concat!("pcmp/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let llm = &config.llm;

    if llm.max_excerpt_chars == 0 {
        anyhow::bail!("llm.max_excerpt_chars must be > 0");
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if !(0.0..=1.0).contains(&llm.top_p) {
        anyhow::bail!("llm.top_p must be in [0.0, 1.0]");
    }
    if llm.top_k == 0 {
        anyhow::bail!("llm.top_k must be >= 1");
    }
    if llm.endpoint.trim().is_empty() {
        anyhow::bail!("llm.endpoint must not be empty");
    }

    Ok(())
}

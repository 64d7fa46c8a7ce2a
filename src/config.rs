use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::clean::CleanOptions;
use crate::fetcher::FetchOptions;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub default_comment_limit: i64,
    pub max_comment_limit: i64,
    pub youtube: YouTubeConfig,
    pub cleaning: CleanOptions,
    pub toxicity: ToxicityConfig,
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            default_comment_limit: 100,
            max_comment_limit: 5000,
            youtube: YouTubeConfig::default(),
            cleaning: CleanOptions::default(),
            toxicity: ToxicityConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub max_attempts: u32,
    pub backoff_base: u32,
    pub backoff_unit_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base: 2,
            backoff_unit_ms: 500,
            request_timeout_secs: 10,
        }
    }
}

impl YouTubeConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            retry: RetryPolicy::new(
                self.max_attempts,
                self.backoff_base,
                Duration::from_millis(self.backoff_unit_ms),
            ),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToxicityBackend {
    /// Pretrained classifier behind an inference endpoint
    Classifier,
    /// Hosted moderation API
    Perspective,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToxicityConfig {
    pub backend: ToxicityBackend,
    /// Comments scoring at or above this are reported
    pub threshold: f64,
    pub model: String,
    pub endpoint: String,
    pub toxic_label: String,
    pub timeout_secs: u64,
}

impl Default for ToxicityConfig {
    fn default() -> Self {
        Self {
            backend: ToxicityBackend::Classifier,
            threshold: 0.5,
            model: "cardiffnlp/twitter-roberta-base-offensive".to_string(),
            endpoint: "https://api-inference.huggingface.co/models".to_string(),
            toxic_label: "offensive".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 90,
        }
    }
}

impl Config {
    /// Load config from `path`, or ~/.config/ytca/config.toml if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config =
                toml::from_str(&content).wrap_err_with(|| format!("invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    /// Clamp a requested comment count to the configured maximum
    pub fn clamp_limit(&self, requested: i64) -> i64 {
        requested.min(self.max_comment_limit)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytca")
        .join("config.toml")
}

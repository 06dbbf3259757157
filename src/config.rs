//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (SEQMINE_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [storage]
//! data_dir = "/var/lib/seqmine/data"
//!
//! [crawler]
//! fetch_interval_secs = 60
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SEQMINE_STORAGE__DATA_DIR=/custom/path
//! SEQMINE_SERVER__PORT=8080
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub submissions: SubmissionsConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow cross-origin requests from any origin. Mining workers run
    /// everywhere, so this defaults to on.
    #[serde(default = "default_true")]
    pub cors_allow_all: bool,
}

/// Storage layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the mirrored catalog, stats, and checkpoints
    pub data_dir: PathBuf,
}

/// Crawler pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Run the crawler loop at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Polite pause between fetches, in seconds
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_secs: u64,

    /// Flush all lists every this many fetches
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u32,

    /// Re-randomize the walk every this many fetches
    #[serde(default = "default_reinit_interval")]
    pub reinit_interval: u32,

    /// Consider refilling the directed-fetch queue every this many
    /// fetches
    #[serde(default = "default_ids_cache_size")]
    pub ids_cache_size: u32,

    /// Probability of actually refilling when considered
    #[serde(default = "default_ids_fetch_ratio")]
    pub ids_fetch_ratio: f64,

    /// Pause before restarting a stopped crawler, in seconds
    #[serde(default = "default_restart_pause")]
    pub restart_pause_secs: u64,

    /// Directed-fetch queue capacity
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

/// Upstream catalog endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Submission maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionsConfig {
    /// Checkpoint/metrics/user-stats cadence, in seconds
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval_secs: u64,
}

/// External evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Miner binary invoked for eval/export
    #[serde(default = "default_tool_binary")]
    pub binary: PathBuf,

    /// Scratch directory for program files handed to the binary
    #[serde(default = "default_tool_work_dir")]
    pub work_dir: PathBuf,

    /// Concurrent invocation cap
    #[serde(default = "default_tool_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Default number of terms for evaluation requests
    #[serde(default = "default_num_terms")]
    pub num_terms: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for daily-rolling log files; logs go to stdout when
    /// unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_fetch_interval() -> u64 {
    60
}
fn default_flush_interval() -> u32 {
    100
}
fn default_reinit_interval() -> u32 {
    10_000
}
fn default_ids_cache_size() -> u32 {
    100
}
fn default_ids_fetch_ratio() -> f64 {
    0.5
}
fn default_restart_pause() -> u64 {
    600
}
fn default_max_queue_size() -> usize {
    1_000
}
fn default_base_url() -> String {
    "https://oeis.org".to_string()
}
fn default_checkpoint_interval() -> u64 {
    600
}
fn default_tool_binary() -> PathBuf {
    PathBuf::from("loda")
}
fn default_tool_work_dir() -> PathBuf {
    PathBuf::from("./scratch")
}
fn default_tool_concurrent() -> usize {
    2
}
fn default_tool_timeout() -> u64 {
    120
}
fn default_num_terms() -> u32 {
    8
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (SEQMINE_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("SEQMINE_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SEQMINE_").split("__"))
            .extract()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            cors_allow_all: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        CrawlerConfig {
            enabled: true,
            fetch_interval_secs: default_fetch_interval(),
            flush_interval: default_flush_interval(),
            reinit_interval: default_reinit_interval(),
            ids_cache_size: default_ids_cache_size(),
            ids_fetch_ratio: default_ids_fetch_ratio(),
            restart_pause_secs: default_restart_pause(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: default_base_url(),
        }
    }
}

impl Default for SubmissionsConfig {
    fn default() -> Self {
        SubmissionsConfig {
            checkpoint_interval_secs: default_checkpoint_interval(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            binary: default_tool_binary(),
            work_dir: default_tool_work_dir(),
            max_concurrent: default_tool_concurrent(),
            timeout_secs: default_tool_timeout(),
            num_terms: default_num_terms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
            dir: None,
        }
    }
}

use std::path::PathBuf;

use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database holding the `pods` and `rating_comments` tables
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./pods.db")
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Storage configuration (optional - defaults to SQLite)
    pub storage: Option<StorageConfig>,

    /// Offline geo database (optional - geolocation is skipped without it)
    pub geo: Option<GeoConfig>,

    #[serde(default)]
    pub monitors: MonitorConfig,

    #[serde(default)]
    pub master_version: MasterVersionConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Head,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Pods historically expect a POST for `statistics.json`
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    /// Stop reading a response body after this many bytes
    pub max_body_bytes: Option<usize>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            method: default_method(),
            max_body_bytes: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_method() -> HttpMethod {
    HttpMethod::Post
}

fn default_user_agent() -> String {
    format!("podmon/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GeoConfig {
    /// Path to a MaxMind-format city database
    pub database: PathBuf,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_uptimerobot_api_url")]
    pub uptimerobot_api_url: String,
    /// Monitor URLs containing this marker are scraped as legacy dashboards
    #[serde(default = "default_legacy_host_marker")]
    pub legacy_host_marker: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            uptimerobot_api_url: default_uptimerobot_api_url(),
            legacy_host_marker: default_legacy_host_marker(),
        }
    }
}

fn default_uptimerobot_api_url() -> String {
    String::from("http://api.uptimerobot.com/getMonitors")
}

fn default_legacy_host_marker() -> String {
    String::from("pingdom.com")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MasterVersionConfig {
    #[serde(default = "default_master_version_url")]
    pub url: String,
}

impl Default for MasterVersionConfig {
    fn default() -> Self {
        Self {
            url: default_master_version_url(),
        }
    }
}

fn default_master_version_url() -> String {
    String::from("https://raw.github.com/diaspora/diaspora/master/config/defaults.yml")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PipelineConfig {
    /// Number of pods processed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_reachable_bonus")]
    pub reachable_bonus: i32,
    #[serde(default = "default_unreachable_penalty")]
    pub unreachable_penalty: i32,
    /// Log a summary of every stage for every pod
    #[serde(default)]
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            reachable_bonus: default_reachable_bonus(),
            unreachable_penalty: default_unreachable_penalty(),
            verbose: false,
        }
    }
}

fn default_workers() -> usize {
    8
}

fn default_reachable_bonus() -> i32 {
    1
}

fn default_unreachable_penalty() -> i32 {
    1
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

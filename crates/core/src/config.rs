use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// Seed URLs to start the crawl from when no checkpoint exists.
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_run_time_budget_secs")]
    pub run_time_budget_secs: u64,
    #[serde(default = "default_thinness_threshold_bytes")]
    pub thinness_threshold_bytes: usize,
    #[serde(default = "default_crawl_delay_secs")]
    pub default_crawl_delay_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_render_min_delay_secs")]
    pub render_min_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub postgres_url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_warn_log_path")]
    pub warn_log_path: String,
    #[serde(default = "default_error_log_path")]
    pub error_log_path: String,
}

fn default_workers() -> usize {
    10
}
fn default_run_time_budget_secs() -> u64 {
    7 * 60
}
fn default_thinness_threshold_bytes() -> usize {
    25_000
}
fn default_crawl_delay_secs() -> u64 {
    5
}
fn default_http_timeout_secs() -> u64 {
    30
}
fn default_max_body_size_mb() -> usize {
    50
}
fn default_checkpoint_path() -> String {
    "checkpoint.json".to_string()
}
fn default_user_agent() -> String {
    "fri-wier-threadripercki".to_string()
}
fn default_render_min_delay_secs() -> u64 {
    5
}
fn default_pool_size() -> u32 {
    20
}
fn default_warn_log_path() -> String {
    "warn.log".to_string()
}
fn default_error_log_path() -> String {
    "error.log".to_string()
}

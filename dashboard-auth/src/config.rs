use dashboard_core::config::load_configuration;
use dashboard_core::error::CoreError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub session: SessionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    /// Dashboard API origin that relative request paths are resolved against.
    pub base_url: String,
    /// Login endpoint. Also an allow-list pattern for the public-endpoint classifier.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Token refresh endpoint. Also an allow-list pattern.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Secondary header that carries the refresh token next to `Authorization`.
    #[serde(default = "default_refresh_header")]
    pub refresh_header: String,
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_header() -> String {
    "x-refresh-token".to_string()
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve a path against `base_url`; absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    /// File backing the persistent ("remember me") session.
    pub storage_path: PathBuf,
    /// Persist sessions created by login across restarts.
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// OTLP/gRPC collector; spans are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, CoreError> {
    load_configuration("dashboard-auth")
}

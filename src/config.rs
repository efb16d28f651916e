//! Runtime configuration.
//!
//! Read from `aquamon.toml` (every section optional), then overridden by
//! environment variables, which may come from a `.env` file:
//!
//! | variable       | overrides                 |
//! |----------------|---------------------------|
//! | `DATABASE_URL` | `database.url`            |
//! | `DATABASE_TLS` | `database.tls`            |
//! | `DEVICE_ID`    | `device_id`               |
//! | `TTN_APP_ID`   | `upstream.app_id`         |
//! | `TTN_API_KEY`  | `upstream.api_key`        |
//! | `TTN_REGION`   | `upstream.region`         |
//! | `AQUAMON_BIND` | `server.bind`             |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::model::DEFAULT_DEVICE_ID;
use crate::store::TlsMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Device served by the dashboard endpoints.
    pub device_id: String,
    pub resolver: ResolverConfig,
    pub upstream: UpstreamConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum age of a stored reading before upstream is consulted.
    pub freshness_window_minutes: i64,
    /// Whether a stale stored reading triggers an upstream query.
    pub refresh_stale_from_upstream: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TTN cluster, e.g. "eu1", "nam1", "au1".
    pub region: String,
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Replaces `https://{region}.cloud.thethings.network`, for private
    /// deployments and local stand-ins.
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    /// `disable`, `prefer` or `require`. Unset means the URL's `sslmode`.
    pub tls: Option<TlsMode>,
}

impl DatabaseConfig {
    pub fn tls_mode(&self) -> TlsMode {
        TlsMode::select(self.tls, self.url.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID.to_string(),
            resolver: ResolverConfig::default(),
            upstream: UpstreamConfig::default(),
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            freshness_window_minutes: 15,
            refresh_stale_from_upstream: true,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            region: "eu1".to_string(),
            app_id: None,
            api_key: None,
            timeout_secs: 5,
            base_url: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { default_limit: 20, max_limit: 100 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None }
    }
}

impl ResolverConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.freshness_window_minutes.max(0))
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// API root without a trailing slash.
    pub fn api_base(&self) -> String {
        match self.base_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.cloud.thethings.network", self.region),
        }
    }
}

impl HistoryConfig {
    /// Requested limit, defaulted when absent and capped at `max_limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text. Missing sections take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` if given, else from `aquamon.toml` or
    /// `config/aquamon.toml` when present, else defaults. Environment
    /// overrides are applied in every case.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => {
                let candidates = [
                    PathBuf::from("aquamon.toml"),
                    PathBuf::from("config").join("aquamon.toml"),
                ];
                match candidates.iter().find(|p| p.exists()) {
                    Some(p) => Self::load(p)?,
                    None => Self::default(),
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies environment-style overrides. `lookup` returns the value of a
    /// variable if set; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Some(mode) = get("DATABASE_TLS").as_deref().and_then(TlsMode::parse) {
            self.database.tls = Some(mode);
        }
        if let Some(v) = get("DEVICE_ID") {
            self.device_id = v;
        }
        if let Some(v) = get("TTN_APP_ID") {
            self.upstream.app_id = Some(v);
        }
        if let Some(v) = get("TTN_API_KEY") {
            self.upstream.api_key = Some(v);
        }
        if let Some(v) = get("TTN_REGION") {
            self.upstream.region = v;
        }
        if let Some(v) = get("AQUAMON_BIND") {
            self.server.bind = v;
        }
    }

    /// One-line-per-setting summary for startup logs. Secrets are masked.
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("device: {}", self.device_id),
            format!("freshness window: {} min", self.resolver.freshness_window_minutes),
            format!(
                "upstream: region={} app={} key={} timeout={}s",
                self.upstream.region,
                self.upstream.app_id.as_deref().unwrap_or("<unset>"),
                if self.upstream.api_key.is_some() { "<set>" } else { "<unset>" },
                self.upstream.timeout_secs
            ),
            format!(
                "database: {}",
                if self.database.url.is_some() { "configured" } else { "<unset>" }
            ),
            format!("bind: {}", self.server.bind),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_takes_all_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.device_id, "water-monitor");
        assert_eq!(config.resolver.freshness_window_minutes, 15);
        assert!(config.resolver.refresh_stale_from_upstream);
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.upstream.region, "eu1");
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            device_id = "kitchen-tap"

            [resolver]
            freshness_window_minutes = 30

            [upstream]
            app_id = "water-app"
            "#,
        )
        .unwrap();
        assert_eq!(config.device_id, "kitchen-tap");
        assert_eq!(config.resolver.freshness_window_minutes, 30);
        assert!(config.resolver.refresh_stale_from_upstream);
        assert_eq!(config.upstream.app_id.as_deref(), Some("water-app"));
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = ServiceConfig::from_toml_str(include_str!("../aquamon.toml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ServiceConfig::from_toml_str("[resolver\nfreshness = ").is_err());
    }

    #[test]
    fn test_environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("DEVICE_ID", "garden-well"),
            ("TTN_API_KEY", "NNSXS.secret"),
            ("TTN_REGION", "nam1"),
            ("DATABASE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.device_id, "garden-well");
        assert_eq!(config.upstream.api_key.as_deref(), Some("NNSXS.secret"));
        assert_eq!(config.upstream.region, "nam1");
        assert_eq!(config.database.url, None, "empty values are ignored");
    }

    #[test]
    fn test_history_limit_is_defaulted_and_capped() {
        let history = HistoryConfig::default();
        assert_eq!(history.clamp_limit(None), 20);
        assert_eq!(history.clamp_limit(Some(5)), 5);
        assert_eq!(history.clamp_limit(Some(10_000)), 100);
        assert_eq!(history.clamp_limit(Some(0)), 1);
    }

    #[test]
    fn test_database_tls_from_file_env_or_url() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [database]
            url = "postgres://app@localhost/water"
            tls = "require"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.tls_mode(), TlsMode::Require);

        let mut config = ServiceConfig::default();
        config.database.url = Some("postgres://app@db.example.com/water?sslmode=require".into());
        assert_eq!(config.database.tls_mode(), TlsMode::Require);

        config.apply_overrides(|k| (k == "DATABASE_TLS").then(|| "disable".to_string()));
        assert_eq!(config.database.tls_mode(), TlsMode::Disable);

        assert_eq!(DatabaseConfig::default().tls_mode(), TlsMode::Disable);
    }

    #[test]
    fn test_upstream_base_url_override() {
        let mut upstream = UpstreamConfig::default();
        assert_eq!(upstream.api_base(), "https://eu1.cloud.thethings.network");

        upstream.base_url = Some("http://127.0.0.1:8080/".into());
        assert_eq!(upstream.api_base(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_summary_masks_api_key() {
        let mut config = ServiceConfig::default();
        config.upstream.api_key = Some("NNSXS.secret".into());
        let summary = config.summary().join("\n");
        assert!(!summary.contains("NNSXS.secret"));
        assert!(summary.contains("key=<set>"));
    }
}

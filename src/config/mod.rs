use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Credentials required on push and delete when configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Repository configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Directory backing the filesystem blob store.
    pub storage_path: PathBuf,
    /// Listen address of the chart API.
    pub bind_addr: String,
    /// Listen address of the metrics endpoint; `None` disables it.
    pub metrics_addr: Option<String>,
    /// Prefix composed into every record's `urls[0]`.
    pub base_url: String,
    /// Basic auth for mutating requests; anonymous when unset.
    pub auth: Option<BasicAuth>,
    /// Upper bound on accepted upload bodies, in bytes.
    pub max_upload_bytes: usize,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";
const DEFAULT_STORAGE_PATH: &str = "./chartdock-data";
const DEFAULT_BASE_URL: &str = "http://localhost:8080/";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            metrics_addr: Some(DEFAULT_METRICS_ADDR.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl RepoConfig {
    /// Load configuration from `CHARTDOCK_*` environment variables, falling
    /// back to defaults. An empty `CHARTDOCK_METRICS_ADDR` disables metrics.
    pub fn from_env() -> Self {
        let auth = match (
            parse_optional_string("CHARTDOCK_USERNAME"),
            parse_optional_string("CHARTDOCK_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BasicAuth { username, password }),
            _ => None,
        };

        let metrics_addr = match env::var("CHARTDOCK_METRICS_ADDR") {
            Ok(v) if v.is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some(DEFAULT_METRICS_ADDR.to_string()),
        };

        let config = Self {
            storage_path: parse_optional_string("CHARTDOCK_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH)),
            bind_addr: parse_optional_string("CHARTDOCK_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            metrics_addr,
            base_url: parse_optional_string("CHARTDOCK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth,
            max_upload_bytes: parse_usize("CHARTDOCK_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        };

        debug!("Loaded configuration: {:?}", config);
        config
    }
}

fn parse_optional_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RepoConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.base_url, "http://localhost:8080/");
        assert!(config.auth.is_none());
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.metrics_addr.is_some());
    }

    #[test]
    fn test_parse_usize() {
        // Env-dependent paths are covered by from_env in deployment; here the
        // fallback behavior is what matters
        assert_eq!(parse_usize("CHARTDOCK_TEST_UNSET_KEY", 42), 42);
    }
}

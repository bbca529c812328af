use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::filter::ViewTuning;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub memviz: MemvizConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// MemViz-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemvizConfig {
    /// Directory holding batch export files (shared-memory-<team>.json and
    /// friends). Optional: without it only uploads and the gateway feed the
    /// viewer.
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    /// Preference / baseline store location.
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Remote query service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the query service. None disables online mode.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gateway_max_retries")]
    pub max_retries: usize,
}

/// Presentation tuning. These are view constants, not correctness knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_hub_degree_threshold")]
    pub hub_degree_threshold: usize,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_view_cache_capacity")]
    pub cache_capacity: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Export-directory watcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    10
}

fn default_gateway_max_retries() -> usize {
    2
}

fn default_hub_degree_threshold() -> usize {
    crate::filter::DEFAULT_HUB_DEGREE_THRESHOLD
}

fn default_max_zoom() -> f64 {
    1.5
}

fn default_view_cache_capacity() -> usize {
    64
}

fn default_http_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    // Default empty — set allowed_origins in config.toml for production
    vec![]
}

fn default_watch_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_gateway_timeout_secs(),
            max_retries: default_gateway_max_retries(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            hub_degree_threshold: default_hub_degree_threshold(),
            max_zoom: default_max_zoom(),
            cache_capacity: default_view_cache_capacity(),
        }
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in MEMVIZ_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("MEMVIZ_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if let Some(export_dir) = &self.memviz.export_dir {
            if !export_dir.exists() {
                anyhow::bail!(
                    "export_dir path does not exist: {}. Set export_dir in config.toml to your knowledge-export directory, or remove it.",
                    export_dir.display()
                );
            }
            if !export_dir.is_dir() {
                anyhow::bail!(
                    "export_dir must be a directory, not a file: {}",
                    export_dir.display()
                );
            }
        }

        if let Some(base_url) = &self.gateway.base_url {
            url::Url::parse(base_url)
                .with_context(|| format!("gateway.base_url is not a valid URL: {}", base_url))?;
        }

        if self.view.hub_degree_threshold == 0 {
            anyhow::bail!("view.hub_degree_threshold must be greater than 0");
        }

        if self.view.max_zoom < 1.0 {
            anyhow::bail!("view.max_zoom must be at least 1.0");
        }

        if self.gateway.timeout_secs == 0 {
            anyhow::bail!("gateway.timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get store path
    pub fn db_path(&self) -> &Path {
        &self.memviz.db_path
    }

    /// Get the batch export directory, if configured
    pub fn export_dir(&self) -> Option<&Path> {
        self.memviz.export_dir.as_deref()
    }

    /// Filter-pipeline tuning derived from the view section
    pub fn tuning(&self) -> ViewTuning {
        ViewTuning {
            hub_degree_threshold: self.view.hub_degree_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn create_test_config(temp_dir: &TempDir) -> String {
        let export_dir = temp_dir.path().canonicalize().unwrap();
        let export_dir_str = export_dir.to_str().unwrap().replace('\\', "\\\\");
        format!(
            r#"
[memviz]
export_dir = "{}"
db_path = "./test.db"
log_level = "debug"

[gateway]
base_url = "http://localhost:8081"
timeout_secs = 5

[view]
hub_degree_threshold = 4
max_zoom = 2.0

[http_server]
port = 9090
"#,
            export_dir_str
        )
    }

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(std::path::PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: &std::path::Path, f: impl FnOnce()) {
        let original = std::env::var("MEMVIZ_CONFIG").ok();
        std::env::set_var("MEMVIZ_CONFIG", config_path.to_str().unwrap());
        f();
        std::env::remove_var("MEMVIZ_CONFIG");
        if let Some(val) = original {
            std::env::set_var("MEMVIZ_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_content = create_test_config(&temp_dir);
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        let config_path = config_path.canonicalize().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir.clone());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.memviz.log_level, "debug");
            assert_eq!(config.view.hub_degree_threshold, 4);
            assert_eq!(config.http_server.port, 9090);
            assert_eq!(config.gateway.timeout_secs, 5);
            assert_eq!(config.tuning().hub_degree_threshold, 4);
        });
    }

    #[test]
    fn test_config_defaults_applied() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[memviz]
db_path = "./test.db"
"#,
        )
        .unwrap();
        let config_path = config_path.canonicalize().unwrap();
        with_config_env(&config_path, || {
            let config = Config::load().unwrap();
            assert!(config.memviz.export_dir.is_none());
            assert!(config.gateway.base_url.is_none());
            assert_eq!(config.view.hub_degree_threshold, 3);
            assert_eq!(config.view.max_zoom, 1.5);
            assert_eq!(config.http_server.port, 8080);
            assert!(config.watch.enabled);
        });
    }

    #[test]
    fn test_config_rejects_bad_gateway_url() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[memviz]
db_path = "./test.db"

[gateway]
base_url = "not a url"
"#,
        )
        .unwrap();
        let config_path = config_path.canonicalize().unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config
                .unwrap_err()
                .to_string()
                .contains("gateway.base_url"));
        });
    }

    #[test]
    fn test_config_rejects_zero_threshold() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[memviz]
db_path = "./test.db"

[view]
hub_degree_threshold = 0
"#,
        )
        .unwrap();
        let config_path = config_path.canonicalize().unwrap();
        with_config_env(&config_path, || {
            assert!(Config::load().is_err());
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("MEMVIZ_CONFIG").ok();
        std::env::set_var("MEMVIZ_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("MEMVIZ_CONFIG");
        if let Some(v) = original {
            std::env::set_var("MEMVIZ_CONFIG", v);
        }
    }
}

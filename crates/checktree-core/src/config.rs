use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config as cfg;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; created on first start.
    pub path: String,
    /// Tree file imported on startup when the database holds no nodes.
    pub seed_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "checktree.db".into(),
            seed_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn filter_directive(&self, crate_names: &[&str]) -> String {
        let mut directives: Vec<String> = crate_names
            .iter()
            .map(|name| format!("{}={}", name, self.level))
            .collect();
        directives.push(format!("tower_http={}", self.level));
        directives.join(",")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "SecurityConfig::default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "SecurityConfig::default_allow_credentials")]
    pub allow_credentials: bool,
}

impl SecurityConfig {
    fn default_allowed_origins() -> Vec<String> {
        vec!["http://localhost:5173".to_string()]
    }

    fn default_allow_credentials() -> bool {
        true
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Self::default_allowed_origins(),
            allow_credentials: Self::default_allow_credentials(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        env::var("APP_ENV")
            .ok()
            .or_else(|| env::var("RUST_ENV").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.server.host.trim().is_empty(),
            "server.host cannot be empty"
        );
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        anyhow::ensure!(
            !self.database.path.trim().is_empty(),
            "database.path cannot be empty"
        );
        for origin in &self.security.allowed_origins {
            anyhow::ensure!(
                is_origin(origin),
                "security.allowed_origins entry {:?} is not a scheme://host[:port] origin",
                origin
            );
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Accepts `scheme://host[:port]` with nothing after the authority.
fn is_origin(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && !value.ends_with('/')
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}

/// Loads [`Settings`] from layered sources.
///
/// Order, later wins: `default.*`, `{env}.*`, `local.toml`, then
/// `CHECKTREE__SECTION__KEY` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings: Settings,
    config_dir: PathBuf,
    env: String,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::from_dir(Self::default_config_dir(), None)
    }

    pub fn from_dir(config_dir: PathBuf, env_override: Option<String>) -> Result<Self> {
        let env_name = env_override.unwrap_or_else(Settings::default_env);
        let mut settings = Self::load_from_sources(&config_dir, &env_name)?;
        settings.env = env_name.clone();
        settings.validate()?;
        Ok(Self {
            settings,
            config_dir,
            env: env_name,
        })
    }

    /// Wraps already-built settings, e.g. in tests.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let env = settings.env.clone();
        Ok(Self {
            settings,
            config_dir: PathBuf::from("."),
            env,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// Get the default configuration directory.
    ///
    /// Priority order:
    /// 1. ~/.checktree/
    /// 2. ./config/
    /// 3. Current directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".checktree");
            if user_dir.exists() {
                info!("Using config directory: {:?}", user_dir);
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            info!("Using config directory: {:?}", project_config);
            return project_config;
        }

        info!("Using config directory: {:?}", cwd);
        cwd
    }

    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let mut builder = cfg::Config::builder();
        for stem in ["default", env_name] {
            for ext in ["toml", "yaml", "yml", "json"] {
                builder = builder.add_source(
                    cfg::File::from(config_dir.join(format!("{}.{}", stem, ext))).required(false),
                );
            }
        }
        let settings: Settings = builder
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix("CHECKTREE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.bind_address(), "127.0.0.1:8000");
        assert_eq!(
            settings.security.allowed_origins,
            vec!["http://localhost:5173".to_string()]
        );
    }

    #[test]
    fn env_file_overrides_default_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[server]\nport = 9100\n\n[database]\npath = \"base.db\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            "[database]\npath = \"staging.db\"\nseed_path = \"seed.json\"\n",
        )
        .unwrap();

        let manager = ConfigManager::from_dir(dir.path().to_path_buf(), Some("staging".into())).unwrap();
        let settings = manager.settings();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.database.path, "staging.db");
        assert_eq!(settings.database.seed_path.as_deref(), Some("seed.json"));
        assert_eq!(manager.env(), "staging");
        assert_eq!(settings.env, "staging");
        assert_eq!(manager.config_dir(), dir.path());
    }

    #[test]
    fn rejects_malformed_origins() {
        let mut settings = Settings::default();
        settings.security.allowed_origins = vec!["localhost:5173/app".into()];
        assert!(settings.validate().is_err());

        settings.security.allowed_origins = vec!["https://checks.example.com".into()];
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn filter_directive_covers_crates_and_http_layer() {
        let logging = LoggingConfig {
            level: "debug".into(),
        };
        assert_eq!(
            logging.filter_directive(&["checktree_api", "checktree_store"]),
            "checktree_api=debug,checktree_store=debug,tower_http=debug"
        );
    }
}

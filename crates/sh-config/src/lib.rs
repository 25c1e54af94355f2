//! StoreHooks Configuration
//!
//! Configuration is read from a TOML file, every section falls back to its
//! defaults, and `SH_*` environment variables override individual values.
//!
//! ```toml
//! [general]
//! enabled = true
//! default_store_id = 1
//!
//! [http]
//! connect_timeout_ms = 10000
//! request_timeout_ms = 30000
//!
//! [database]
//! kind = "sqlite"
//! url = "sqlite://storehooks.db"
//!
//! [[hooks]]
//! id = 1
//! name = "CRM new customer"
//! enabled = true
//! hook_type = "new_customer"
//! payload_url = "https://crm.example.com/customers/{{ item.entity_id }}"
//! method = "POST"
//! body = "{\"email\": \"{{ item.email }}\"}"
//! ```

use serde::{Deserialize, Serialize};
use sh_common::Hook;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Global switch; when off no hook fires
    pub enabled: bool,
    /// Store used when an entity carries no `store_id`
    pub default_store_id: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_store_id: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// Hooks come from `[[hooks]]`, history is kept in process
    #[default]
    Memory,
    Sqlite,
    Postgres,
}

impl FromStr for DatabaseKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(DatabaseKind::Memory),
            "sqlite" => Ok(DatabaseKind::Sqlite),
            "postgres" | "postgresql" => Ok(DatabaseKind::Postgres),
            other => Err(ConfigError::Invalid(format!(
                "Unknown database kind: {}. Use memory, sqlite, or postgres",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreHooksConfig {
    pub general: GeneralConfig,
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    /// Seed hooks for the memory backend
    pub hooks: Vec<Hook>,
}

impl StoreHooksConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: StoreHooksConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: StoreHooksConfig = toml::from_str(&raw)?;
        info!(path = %path.display(), hooks = config.hooks.len(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults, then
    /// apply environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SH_*` overrides read through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SH_ENABLED") {
            self.general.enabled = parse_env("SH_ENABLED", &v)?;
        }
        if let Some(v) = lookup("SH_DEFAULT_STORE_ID") {
            self.general.default_store_id = parse_env("SH_DEFAULT_STORE_ID", &v)?;
        }
        if let Some(v) = lookup("SH_HTTP_CONNECT_TIMEOUT_MS") {
            self.http.connect_timeout_ms = parse_env("SH_HTTP_CONNECT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("SH_HTTP_REQUEST_TIMEOUT_MS") {
            self.http.request_timeout_ms = parse_env("SH_HTTP_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("SH_DB_KIND") {
            self.database.kind = v.parse()?;
        }
        if let Some(v) = lookup("SH_DB_URL") {
            self.database.url = Some(v);
        }
        if let Some(v) = lookup("SH_PORT") {
            self.server.port = parse_env("SH_PORT", &v)?;
        }
        debug!("Applied environment overrides");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.kind != DatabaseKind::Memory && self.database.url.is_none() {
            return Err(ConfigError::Invalid(format!(
                "database.url is required for {:?}",
                self.database.kind
            )));
        }

        let mut seen = HashSet::new();
        for hook in &self.hooks {
            if !seen.insert(hook.id) {
                return Err(ConfigError::Invalid(format!("Duplicate hook id {}", hook.id)));
            }
            if hook.payload_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("Hook {} has no payload_url", hook.id)));
            }
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sh_common::{Authentication, HookType, HttpMethod};
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
[general]
enabled = true
default_store_id = 2

[[hooks]]
id = 7
name = "Order shipped"
enabled = true
hook_type = "order"
store_ids = [0]
order_status = ["complete"]
priority = 5
payload_url = "https://erp.example.com/orders/{{ item.increment_id }}"
method = "POST"
authentication = "basic"
username = "erp"
password = "secret"
content_type = "application/json"
body = "{\"status\": \"{{ item.status }}\"}"

[[hooks.headers]]
name = "X-Source"
value = "storehooks"
"#;

    #[test]
    fn test_defaults() {
        let config = StoreHooksConfig::default();
        assert!(config.general.enabled);
        assert_eq!(config.general.default_store_id, 1);
        assert_eq!(config.database.kind, DatabaseKind::Memory);
        assert_eq!(config.http.request_timeout(), Duration::from_secs(30));
        assert!(config.hooks.is_empty());
    }

    #[test]
    fn test_parse_hooks() {
        let config = StoreHooksConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.general.default_store_id, 2);
        assert_eq!(config.hooks.len(), 1);

        let hook = &config.hooks[0];
        assert_eq!(hook.hook_type, HookType::Order);
        assert_eq!(hook.method, HttpMethod::Post);
        assert_eq!(hook.authentication, Authentication::Basic);
        assert_eq!(hook.order_status, vec!["complete".to_string()]);
        assert_eq!(hook.headers[0].name, "X-Source");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = StoreHooksConfig::load(file.path()).unwrap();
        assert_eq!(config.hooks[0].id, 7);
    }

    #[test]
    fn test_missing_file() {
        let err = StoreHooksConfig::load("/nonexistent/storehooks.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SH_ENABLED", "false"),
            ("SH_DB_KIND", "sqlite"),
            ("SH_DB_URL", "sqlite::memory:"),
            ("SH_PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = StoreHooksConfig::default();
        config.apply_env_with(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert!(!config.general.enabled);
        assert_eq!(config.database.kind, DatabaseKind::Sqlite);
        assert_eq!(config.server.port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = StoreHooksConfig::default();
        let err = config
            .apply_env_with(|k| (k == "SH_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_sql_backend_requires_url() {
        let mut config = StoreHooksConfig::default();
        config.database.kind = DatabaseKind::Postgres;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_hook_ids_rejected() {
        let raw = format!("{}\n{}", SAMPLE, SAMPLE.split("[[hooks]]").nth(1).map(|s| format!("[[hooks]]{}", s)).unwrap());
        let err = StoreHooksConfig::from_toml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

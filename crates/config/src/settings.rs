// Service settings
// Loaded from ~/.config/bovinext/settings.toml, then overridden by BOVINEXT_* env vars

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_BIND: &str = "BOVINEXT_BIND";
pub const ENV_DATABASE: &str = "BOVINEXT_DATABASE";
pub const ENV_AUTH_URL: &str = "BOVINEXT_AUTH_URL";
pub const ENV_AUTH_ANON_KEY: &str = "BOVINEXT_AUTH_ANON_KEY";
pub const ENV_LEDGER_URL: &str = "BOVINEXT_LEDGER_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address the HTTP server listens on
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1:3001".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    /// Keep everything in process memory (nothing survives a restart)
    pub in_memory: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bovinext")
                .join("bovinext.db"),
            in_memory: false,
        }
    }
}

/// A token accepted without asking the auth provider. Local development only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Base URL of the managed auth provider; None = static tokens only
    pub url: Option<String>,
    pub anon_key: String,
    pub timeout_secs: u64,
    pub static_tokens: Vec<StaticToken>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: String::new(),
            timeout_secs: 10,
            static_tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Base URL of the ledger node; None = offline ledger
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self { url: None, timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub ledger: LedgerSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bovinext")
            .join("settings.toml")
    }

    /// Load settings and apply environment overrides.
    ///
    /// With no explicit path a missing default file means defaults. An
    /// explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let p = Self::config_path();
                if p.exists() {
                    Self::from_file(&p)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());

        if let Some(bind) = get(ENV_BIND) {
            self.server.bind = bind;
        }
        if let Some(path) = get(ENV_DATABASE) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(url) = get(ENV_AUTH_URL) {
            self.auth.url = Some(url);
        }
        if let Some(key) = get(ENV_AUTH_ANON_KEY) {
            self.auth.anon_key = key;
        }
        if let Some(url) = get(ENV_LEDGER_URL) {
            self.ledger.url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "server.bind",
                reason: "must not be empty".into(),
            });
        }
        if self.auth.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "auth.timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.ledger.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "ledger.timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.auth.url.is_none() && self.auth.static_tokens.is_empty() {
            return Err(ConfigError::Invalid {
                key: "auth",
                reason: "set auth.url or at least one auth.static_tokens entry".into(),
            });
        }
        if self.auth.url.is_some() && self.auth.anon_key.is_empty() {
            return Err(ConfigError::Invalid {
                key: "auth.anon_key",
                reason: "required when auth.url is set".into(),
            });
        }
        Ok(())
    }
}

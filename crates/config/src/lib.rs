// Configuration loading

pub mod settings;

pub use settings::{
    AuthSettings, ConfigError, DatabaseSettings, LedgerSettings, LogFormat, LogSettings,
    ServerSettings, Settings, StaticToken,
};

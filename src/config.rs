//! Process configuration.
//!
//! Layered with figment, lowest to highest priority:
//! - compiled defaults
//! - `order-desk.toml` (or the file named by `ORDER_DESK_CONFIG`)
//! - the legacy `SERVER_API_KEY` variable
//! - `ORDER_DESK_*` variables, nested with `__` (e.g. `ORDER_DESK_DATABASE__HOST`)
//!
//! The loaded [`Config`] is plain data; the gate and the importer receive the
//! pieces they need at construction time.

use crate::db::DatabaseTarget;
use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::sqlite::SqliteConnectOptions;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "order-desk.toml";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const MICROSOFT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
pub const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub api_key: Option<String>,
    pub loglevel: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            api_key: None,
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    Oauth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authorize_url: Url,
    pub token_url: Url,
    pub redirect_url: Url,
    pub cookie_secret: Option<String>,
    pub insecure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::ApiKey,
            client_id: None,
            client_secret: None,
            authorize_url: Url::parse(MICROSOFT_AUTHORIZE_URL).expect("static URL"),
            token_url: Url::parse(MICROSOFT_TOKEN_URL).expect("static URL"),
            redirect_url: Url::parse("http://localhost:8080/auth").expect("static URL"),
            cookie_secret: None,
            insecure_cookie: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL (`postgres://...` or `sqlite:...`). Overrides the parts below.
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub sslmode: String,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: 5432,
            dbname: None,
            user: None,
            password: None,
            sslmode: "prefer".to_string(),
            connect_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sslmode", &self.sslmode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Config {
    /// The layered figment this process reads its configuration from.
    pub fn figment() -> Figment {
        let file = std::env::var("ORDER_DESK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(
                Env::raw()
                    .only(&["SERVER_API_KEY"])
                    .map(|_| "server.api_key".into()),
            )
            .merge(Env::prefixed("ORDER_DESK_").split("__"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::figment().extract()?)
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn target(&self) -> Result<DatabaseTarget, ConfigError> {
        if let Some(url) = self.url.as_deref() {
            return if url.starts_with("sqlite:") {
                SqliteConnectOptions::from_str(url)
                    .map(DatabaseTarget::Sqlite)
                    .map_err(|source| ConfigError::Database {
                        setting: "url",
                        source,
                    })
            } else {
                PgConnectOptions::from_str(url)
                    .map(DatabaseTarget::Postgres)
                    .map_err(|source| ConfigError::Database {
                        setting: "url",
                        source,
                    })
            };
        }

        let host = self
            .host
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseSetting("host"))?;
        let dbname = self
            .dbname
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseSetting("dbname"))?;
        let user = self
            .user
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseSetting("user"))?;
        let ssl_mode =
            PgSslMode::from_str(&self.sslmode).map_err(|source| ConfigError::Database {
                setting: "sslmode",
                source,
            })?;

        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(self.port)
            .database(dbname)
            .username(user)
            .ssl_mode(ssl_mode);
        if let Some(password) = self.password.as_deref() {
            opts = opts.password(password);
        }
        Ok(DatabaseTarget::Postgres(opts))
    }
}

/// The shared secret callers present in `x-api-key`.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
        let value = value.as_ref();
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(Arc::from(value)))
    }

    /// Exact, case-sensitive comparison in constant time.
    pub fn matches(&self, presented: &[u8]) -> bool {
        bool::from(presented.ct_eq(self.0.as_bytes()))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

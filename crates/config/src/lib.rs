use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// MongoDB with a TTL index on `created_at`.
    Mongo,
    /// Process-local store, expired rows removed by the sweeper.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub url: String,
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: "mongodb://localhost:27017".to_string(),
            name: "studyroom".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    /// Lifetime of tokens issued by this service, in seconds.
    pub access_token_ttl_secs: i64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            issuer: "studyroom".to_string(),
            access_token_ttl_secs: 3600,
        }
    }
}

/// Policy knobs for the chat room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Hard lifetime of a message, counted from `created_at`.
    pub message_ttl_secs: u64,
    /// How long a non-admin author may still edit their message.
    pub edit_window_secs: u64,
    pub max_content_chars: usize,
    pub default_page_size: u64,
    pub max_page_size: u64,
    /// Period of the expiry sweeper. Zero disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            message_ttl_secs: 24 * 60 * 60,
            edit_window_secs: 15 * 60,
            max_content_chars: 1000,
            default_page_size: 50,
            max_page_size: 100,
            sweep_interval_secs: 60,
        }
    }
}

impl Settings {
    /// Layers `config/default`, `config/local` and `STUDYROOM__*` environment
    /// variables (e.g. `STUDYROOM__APP__PORT=8080`) over the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("STUDYROOM")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("app.cors_origins"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

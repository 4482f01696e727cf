use serde::Deserialize;
use std::env;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("MONGODB_URI environment variable is required")]
    MissingMongoUri,

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    /// `None` means the database named in `mongo_uri`.
    pub mongo_database: Option<String>,
    pub host: String,
    pub port: u16,
    pub default_page_limit: u64,
    pub cascade_delete_answers: bool,
    pub metrics_enabled: bool,
}

impl Config {
    /// Defaults for everything except the connection string.
    pub fn new(mongo_uri: impl Into<String>) -> Self {
        Self {
            mongo_uri: mongo_uri.into(),
            mongo_database: None,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            cascade_delete_answers: true,
            metrics_enabled: false,
        }
    }

    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml is optional, APP__SECTION__KEY overrides it
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .ok()
            .or_else(|| env::var("MONGODB_URI").ok())
            .or_else(|| env::var("MONGO_URI").ok())
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(ConfigError::MissingMongoUri)?;

        let mut config = Config::new(mongo_uri);

        config.mongo_database = settings
            .get_string("database.mongo_database")
            .ok()
            .or_else(|| env::var("MONGO_DATABASE").ok())
            .filter(|name| !name.is_empty());

        if let Ok(host) = settings.get_string("server.host") {
            config.host = host;
        }

        let port = settings
            .get_string("server.port")
            .ok()
            .or_else(|| env::var("PORT").ok());
        if let Some(port) = port {
            config.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "server.port",
                value: port.clone(),
            })?;
        }

        if let Ok(limit) = settings.get_int("query.default_page_limit") {
            config.default_page_limit = u64::try_from(limit)
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::Invalid {
                    key: "query.default_page_limit",
                    value: limit.to_string(),
                })?;
        }

        if let Ok(cascade) = settings.get_bool("query.cascade_delete_answers") {
            config.cascade_delete_answers = cascade;
        }

        if let Ok(enabled) = settings.get_bool("metrics.enabled") {
            config.metrics_enabled = enabled;
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

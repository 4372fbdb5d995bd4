//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub xendit: XenditConfig,
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build provider redirect URLs.
    pub public_base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub schema: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Xendit gateway configuration
#[derive(Debug, Clone)]
pub struct XenditConfig {
    pub base_url: String,
    pub api_version: String,
    pub secret_key: String,
    /// Symmetric key used to decrypt inbound callback payloads.
    pub callback_key: String,
    pub statement_descriptor: String,
    /// Static return URLs used when per-session URL construction fails.
    pub success_url: String,
    pub failed_url: String,
    pub request_timeout: u64, // seconds
}

/// Admin authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub reset_token_expiry_minutes: i64,
    /// When both are set, the first admin account is created at startup
    /// if the user table is empty.
    pub bootstrap_email: Option<String>,
    pub bootstrap_password: Option<String>,
}

const RESET_EXPIRY_MIN: i64 = 5;
const RESET_EXPIRY_MAX: i64 = 240;

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            xendit: XenditConfig::from_env()?,
            auth: AuthConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.xendit.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        if !self.public_base_url.starts_with("http://")
            && !self.public_base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue(
                "PUBLIC_BASE_URL must be a valid URL".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            schema: env::var("DB_SCHEMA").unwrap_or_else(|_| "kasirka".to_string()),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        // The schema name is interpolated into provisioning SQL, so it must
        // stay a plain identifier.
        if self.schema.is_empty()
            || !self
                .schema
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidValue(
                "DB_SCHEMA must be a plain identifier".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl XenditConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let public_base =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());

        Ok(XenditConfig {
            base_url: env::var("XENDIT_BASE_URL")
                .unwrap_or_else(|_| "https://api.xendit.co".to_string()),
            api_version: env::var("XENDIT_API_VERSION")
                .unwrap_or_else(|_| "2020-05-19".to_string()),
            secret_key: env::var("XENDIT_SECRET_KEY")
                .map_err(|_| ConfigError::MissingVariable("XENDIT_SECRET_KEY".to_string()))?,
            callback_key: env::var("XENDIT_CALLBACK_KEY").unwrap_or_default(),
            statement_descriptor: env::var("XENDIT_STATEMENT_DESCRIPTOR")
                .unwrap_or_else(|_| "KASIRKA".to_string()),
            success_url: env::var("PAYMENT_SUCCESS_URL")
                .unwrap_or_else(|_| format!("{}/payment/success", public_base)),
            failed_url: env::var("PAYMENT_FAILED_URL")
                .unwrap_or_else(|_| format!("{}/payment/failed", public_base)),
            request_timeout: env::var("XENDIT_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("XENDIT_REQUEST_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty()
            || (!self.base_url.starts_with("http://") && !self.base_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue(
                "XENDIT_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("XENDIT_SECRET_KEY".to_string()));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "XENDIT_REQUEST_TIMEOUT".to_string(),
            ));
        }

        Ok(())
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: i64 = env::var("RESET_TOKEN_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("RESET_TOKEN_EXPIRY_MINUTES".to_string()))?;

        Ok(AuthConfig {
            reset_token_expiry_minutes: raw.clamp(RESET_EXPIRY_MIN, RESET_EXPIRY_MAX),
            bootstrap_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            bootstrap_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

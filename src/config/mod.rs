//! Configuration module for the Electrostore backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default request body cap (10 MiB), sized for a single product image.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format
    pub log_json: bool,
    /// Secret used to sign session tokens
    pub session_secret: Option<String>,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
    /// Name of the cookie carrying the session token
    pub session_cookie: String,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    /// Path prefix that requires a valid session
    pub protected_prefix: String,
    /// Where unauthenticated requests are sent
    pub login_path: String,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
    /// Remote image host credentials
    pub cloudinary: Option<CloudinaryConfig>,
}

/// Credentials and placement for the remote image host.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder uploaded images are placed in
    pub folder: String,
    /// Base URL of the upload API
    pub api_base: String,
}

/// A configuration variable held a value that could not be used.
#[derive(Debug)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("STORE_DB_PATH")
            .unwrap_or_else(|_| "./data/store.sqlite".to_string())
            .into();

        let bind_addr = parse_var("STORE_BIND_ADDR", "127.0.0.1:8080")?;
        let log_level = env::var("STORE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = parse_var("STORE_LOG_JSON", "false")?;

        let session_secret = env::var("STORE_SESSION_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let session_ttl_hours = parse_var("STORE_SESSION_TTL_HOURS", "24")?;
        let session_cookie =
            env::var("STORE_SESSION_COOKIE").unwrap_or_else(|_| "session-token".to_string());
        let cookie_secure = parse_var("STORE_COOKIE_SECURE", "false")?;

        let protected_prefix =
            env::var("STORE_PROTECTED_PREFIX").unwrap_or_else(|_| "/dashboard".to_string());
        let login_path = env::var("STORE_LOGIN_PATH").unwrap_or_else(|_| "/login".to_string());

        let max_upload_bytes = parse_var(
            "STORE_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_json,
            session_secret,
            session_ttl_hours,
            session_cookie,
            cookie_secure,
            protected_prefix,
            login_path,
            max_upload_bytes,
            cloudinary: CloudinaryConfig::from_env(),
        })
    }
}

impl CloudinaryConfig {
    /// Returns `None` unless cloud name, key and secret are all set.
    fn from_env() -> Option<Self> {
        let cloud_name = env::var("CLOUDINARY_CLOUD_NAME").ok()?;
        let api_key = env::var("CLOUDINARY_API_KEY").ok()?;
        let api_secret = env::var("CLOUDINARY_API_SECRET").ok()?;

        Some(Self {
            cloud_name,
            api_key,
            api_secret,
            folder: env::var("CLOUDINARY_FOLDER")
                .unwrap_or_else(|_| "electrostore/products".to_string()),
            api_base: env::var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|_| "https://api.cloudinary.com".to_string()),
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(var).unwrap_or_else(|_| default.to_string());
    value.trim().parse().map_err(|_| ConfigError { var, value })
}

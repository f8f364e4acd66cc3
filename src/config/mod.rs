//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden through
//! `TRIPDESK_<SECTION>_<KEY>` environment variables. Every section and field
//! has a default so a missing or empty file yields a runnable setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TRIPDESK";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin (the public site, cookies are sent cross-origin)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

// ============================================================================
// Database
// ============================================================================

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/tripdesk.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

// ============================================================================
// Cache
// ============================================================================

/// In-process cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied to cached public listings
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

// ============================================================================
// Upload / storage
// ============================================================================

/// File storage configuration for package images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory uploaded files are written to
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix the directory is served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
        "image/avif".to_string(),
    ]
}

impl UploadConfig {
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(mime_type))
    }

    /// File extension used when storing a file of the given MIME type
    pub fn extension_for(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/avif" => "avif",
            _ => "bin",
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Session and cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Adds the `Secure` attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
        }
    }
}

fn default_session_days() -> i64 {
    7
}

fn default_cookie_name() -> String {
    "session".to_string()
}

// ============================================================================
// Payments
// ============================================================================

/// Hosted payment processor (Stripe Checkout) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Signing secret for the webhook endpoint (`whsec_...`)
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// ISO currency code used for checkout sessions
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Public site base URL used to build success and cancel URLs
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Public base URL serving `/uploads`, used to make relative package
    /// images absolute for the hosted checkout page. Defaults to `app_url`.
    #[serde(default)]
    pub asset_url: Option<String>,
    /// Maximum accepted age of a webhook signature timestamp
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_key: None,
            webhook_secret: None,
            api_base: default_api_base(),
            currency: default_currency(),
            app_url: default_app_url(),
            asset_url: None,
            signature_tolerance_secs: default_signature_tolerance(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "mxn".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_signature_tolerance() -> i64 {
    300
}

// ============================================================================
// Chat relay
// ============================================================================

/// Chat widget relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// External automation webhook; when unset the relay answers with
    /// `unavailable_message`
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
    /// Messages accepted per chat session per minute
    #[serde(default = "default_chat_rate_limit")]
    pub messages_per_minute: usize,
    #[serde(default = "default_unavailable_message")]
    pub unavailable_message: String,
    #[serde(default = "default_timeout_message")]
    pub timeout_message: String,
    #[serde(default = "default_empty_reply_message")]
    pub empty_reply_message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_chat_timeout(),
            messages_per_minute: default_chat_rate_limit(),
            unavailable_message: default_unavailable_message(),
            timeout_message: default_timeout_message(),
            empty_reply_message: default_empty_reply_message(),
        }
    }
}

fn default_chat_timeout() -> u64 {
    10
}

fn default_chat_rate_limit() -> usize {
    20
}

fn default_unavailable_message() -> String {
    "El servicio de chat no está disponible en este momento. Por favor, contáctanos por email."
        .to_string()
}

fn default_timeout_message() -> String {
    "La solicitud tardó demasiado. Por favor, intenta de nuevo.".to_string()
}

fn default_empty_reply_message() -> String {
    "Lo siento, no pude procesar tu mensaje.".to_string()
}

// ============================================================================
// Loading
// ============================================================================

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing or blank file yields the defaults. Malformed YAML is reported
    /// with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration and apply `TRIPDESK_*` environment overrides.
    ///
    /// Recognised variables: `TRIPDESK_SERVER_HOST`, `TRIPDESK_SERVER_PORT`,
    /// `TRIPDESK_SERVER_CORS_ORIGIN`, `TRIPDESK_DATABASE_DRIVER`,
    /// `TRIPDESK_DATABASE_URL`, `TRIPDESK_CACHE_TTL_SECONDS`,
    /// `TRIPDESK_UPLOAD_PATH`, `TRIPDESK_PAYMENTS_ENABLED`,
    /// `TRIPDESK_PAYMENTS_SECRET_KEY`, `TRIPDESK_PAYMENTS_WEBHOOK_SECRET`,
    /// `TRIPDESK_PAYMENTS_API_BASE`, `TRIPDESK_PAYMENTS_APP_URL`,
    /// `TRIPDESK_PAYMENTS_ASSET_URL`,
    /// `TRIPDESK_CHAT_WEBHOOK_URL`, `TRIPDESK_CHAT_TIMEOUT_SECS`.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payments.enabled {
            if self.payments.secret_key.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::ValidationError(
                    "payments.secret_key is required when payments are enabled".to_string(),
                ));
            }
            if self.payments.webhook_secret.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::ValidationError(
                    "payments.webhook_secret is required when payments are enabled".to_string(),
                ));
            }
        }
        if self.chat.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "chat.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.upload.allowed_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.allowed_types cannot be empty".to_string(),
            ));
        }
        if self.auth.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(host) = env_var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("SERVER_PORT") {
            self.server.port = port;
        }
        if let Some(origin) = env_var("SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        if let Some(driver) = env_var("DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Some(url) = env_var("DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(ttl) = env_parse::<u64>("CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }

        if let Some(path) = env_var("UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Some(enabled) = env_parse::<bool>("PAYMENTS_ENABLED") {
            self.payments.enabled = enabled;
        }
        if let Some(key) = env_var("PAYMENTS_SECRET_KEY") {
            self.payments.secret_key = Some(key);
        }
        if let Some(secret) = env_var("PAYMENTS_WEBHOOK_SECRET") {
            self.payments.webhook_secret = Some(secret);
        }
        if let Some(base) = env_var("PAYMENTS_API_BASE") {
            self.payments.api_base = base;
        }
        if let Some(app_url) = env_var("PAYMENTS_APP_URL") {
            self.payments.app_url = app_url;
        }
        if let Some(asset_url) = env_var("PAYMENTS_ASSET_URL") {
            self.payments.asset_url = if asset_url.trim().is_empty() { None } else { Some(asset_url) };
        }

        if let Some(url) = env_var("CHAT_WEBHOOK_URL") {
            self.chat.webhook_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        if let Some(timeout) = env_parse::<u64>("CHAT_TIMEOUT_SECS") {
            self.chat.timeout_secs = timeout;
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.trim().parse().ok())
}

fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Environment variables are process-global; tests that touch them serialize here.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const OVERRIDE_KEYS: &[&str] = &[
    "SERVER_HOST",
    "SERVER_PORT",
    "SERVER_CORS_ORIGIN",
    "DATABASE_DRIVER",
    "DATABASE_URL",
    "CACHE_TTL_SECONDS",
    "UPLOAD_PATH",
    "PAYMENTS_ENABLED",
    "PAYMENTS_SECRET_KEY",
    "PAYMENTS_WEBHOOK_SECRET",
    "PAYMENTS_API_BASE",
    "PAYMENTS_APP_URL",
    "PAYMENTS_ASSET_URL",
    "CHAT_WEBHOOK_URL",
    "CHAT_TIMEOUT_SECS",
];

#[cfg(test)]
fn clear_env_overrides() {
    for key in OVERRIDE_KEYS {
        std::env::remove_var(format!("{}_{}", ENV_PREFIX, key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = Config::load(std::path::Path::new("nonexistent_tripdesk.yml")).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.payments.currency, "mxn");
        assert_eq!(config.chat.timeout_secs, 10);
        assert!(config.chat.webhook_url.is_none());
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.session_days, 7);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "server:\n  port: 9000\nchat:\n  webhook_url: http://n8n.local/hook\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.chat.webhook_url.as_deref(), Some("http://n8n.local/hook"));
        assert_eq!(config.chat.timeout_secs, 10);
        assert!(config.chat.timeout_message.starts_with("La solicitud"));
    }

    #[test]
    fn test_load_full_payments_section() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
payments:
  enabled: true
  secret_key: sk_test_123
  webhook_secret: whsec_abc
  currency: usd
  app_url: https://travel.example.com
  signature_tolerance_secs: 60
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.payments.enabled);
        assert_eq!(config.payments.secret_key.as_deref(), Some("sk_test_123"));
        assert_eq!(config.payments.currency, "usd");
        assert_eq!(config.payments.signature_tolerance_secs, 60);
        assert_eq!(config.payments.api_base, "https://api.stripe.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: [not a port\n").unwrap();
        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_wrong_type_reports_location() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: eighty\n").unwrap();
        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("line"));
    }

    #[test]
    fn test_validate_requires_secrets_when_payments_enabled() {
        let mut config = Config::default();
        config.payments.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.payments.secret_key = Some("sk_test".to_string());
        assert!(config.validate().is_err());

        config.payments.webhook_secret = Some("whsec".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chat_timeout() {
        let mut config = Config::default();
        config.chat.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upload_type_checks() {
        let upload = UploadConfig::default();
        assert!(upload.is_type_allowed("image/png"));
        assert!(upload.is_type_allowed("IMAGE/JPEG"));
        assert!(!upload.is_type_allowed("application/pdf"));
        assert_eq!(upload.extension_for("image/jpeg"), "jpg");
        assert_eq!(upload.extension_for("text/plain"), "bin");
    }

    #[test]
    fn test_env_override_server_and_database() {
        let _guard = lock_env();
        clear_env_overrides();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8000\n").unwrap();

        std::env::set_var("TRIPDESK_SERVER_PORT", "4000");
        std::env::set_var("TRIPDESK_DATABASE_DRIVER", "MySQL");
        std::env::set_var("TRIPDESK_DATABASE_URL", "mysql://root@localhost/trips");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://root@localhost/trips");

        clear_env_overrides();
    }

    #[test]
    fn test_env_override_payments_and_chat() {
        let _guard = lock_env();
        clear_env_overrides();

        let file = NamedTempFile::new().unwrap();

        std::env::set_var("TRIPDESK_PAYMENTS_ENABLED", "true");
        std::env::set_var("TRIPDESK_PAYMENTS_SECRET_KEY", "sk_live_x");
        std::env::set_var("TRIPDESK_PAYMENTS_WEBHOOK_SECRET", "whsec_y");
        std::env::set_var("TRIPDESK_CHAT_WEBHOOK_URL", "https://n8n.example.com/webhook/chat");
        std::env::set_var("TRIPDESK_CHAT_TIMEOUT_SECS", "3");

        let config = Config::load_with_env(file.path()).unwrap();
        assert!(config.payments.enabled);
        assert_eq!(config.payments.secret_key.as_deref(), Some("sk_live_x"));
        assert_eq!(config.payments.webhook_secret.as_deref(), Some("whsec_y"));
        assert_eq!(
            config.chat.webhook_url.as_deref(),
            Some("https://n8n.example.com/webhook/chat")
        );
        assert_eq!(config.chat.timeout_secs, 3);

        clear_env_overrides();
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();
        clear_env_overrides();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8181\n").unwrap();

        std::env::set_var("TRIPDESK_SERVER_PORT", "not_a_number");
        std::env::set_var("TRIPDESK_DATABASE_DRIVER", "postgres");
        std::env::set_var("TRIPDESK_PAYMENTS_ENABLED", "maybe");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert!(!config.payments.enabled);

        clear_env_overrides();
    }

    #[test]
    fn test_env_blank_chat_url_disables_relay() {
        let _guard = lock_env();
        clear_env_overrides();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "chat:\n  webhook_url: http://relay.local\n").unwrap();
        std::env::set_var("TRIPDESK_CHAT_WEBHOOK_URL", "  ");

        let config = Config::load_with_env(file.path()).unwrap();
        assert!(config.chat.webhook_url.is_none());

        clear_env_overrides();
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn server_strategy() -> impl Strategy<Value = ServerConfig> {
        ("[a-z][a-z0-9]{0,10}", 1u16..=65535, "https?://[a-z]{3,10}\\.com").prop_map(
            |(host, port, cors_origin)| ServerConfig {
                host,
                port,
                cors_origin,
            },
        )
    }

    fn payments_strategy() -> impl Strategy<Value = PaymentsConfig> {
        (
            any::<bool>(),
            proptest::option::of("sk_test_[a-zA-Z0-9]{8}"),
            proptest::option::of("whsec_[a-zA-Z0-9]{8}"),
            prop_oneof![Just("mxn".to_string()), Just("usd".to_string()), Just("eur".to_string())],
            1i64..3600,
        )
            .prop_map(|(enabled, secret_key, webhook_secret, currency, tolerance)| PaymentsConfig {
                enabled,
                secret_key,
                webhook_secret,
                currency,
                signature_tolerance_secs: tolerance,
                ..PaymentsConfig::default()
            })
    }

    fn config_strategy() -> impl Strategy<Value = Config> {
        (server_strategy(), payments_strategy(), 1u64..120, 1u64..86400).prop_map(
            |(server, payments, chat_timeout, ttl)| {
                let mut config = Config {
                    server,
                    payments,
                    ..Config::default()
                };
                config.chat.timeout_secs = chat_timeout;
                config.cache.ttl_seconds = ttl;
                config
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn config_yaml_roundtrip(config in config_strategy()) {
            let yaml = serde_yaml::to_string(&config).unwrap();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();

            let loaded = Config::load(file.path()).unwrap();
            prop_assert_eq!(loaded.server.host, config.server.host);
            prop_assert_eq!(loaded.server.port, config.server.port);
            prop_assert_eq!(loaded.payments.enabled, config.payments.enabled);
            prop_assert_eq!(loaded.payments.secret_key, config.payments.secret_key);
            prop_assert_eq!(loaded.payments.currency, config.payments.currency);
            prop_assert_eq!(loaded.chat.timeout_secs, config.chat.timeout_secs);
            prop_assert_eq!(loaded.cache.ttl_seconds, config.cache.ttl_seconds);
        }

        #[test]
        fn env_port_always_wins_over_file(file_port in 1u16..=65535, env_port in 1u16..=65535) {
            let _guard = lock_env();
            clear_env_overrides();

            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", file_port).unwrap();
            std::env::set_var("TRIPDESK_SERVER_PORT", env_port.to_string());

            let config = Config::load_with_env(file.path()).unwrap();
            clear_env_overrides();
            prop_assert_eq!(config.server.port, env_port);
        }
    }
}

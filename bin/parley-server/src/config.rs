//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Runtime configuration for parley-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://parley.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rotated log files. Console only when unset.
    pub log_dir: Option<String>,

    /// Comma-separated list of allowed CORS origins; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    /// Mount Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    /// Request header carrying the identity established by the upstream
    /// authentication layer.
    pub identity_header: String,

    /// Messages a user may send per calendar week.
    pub weekly_message_limit: i64,

    pub gemini: GeminiConfig,
}

/// Connection settings for the Gemini generation API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key; generation fails at setup time when missing.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Maximum wait for the first streamed chunk.
    pub first_chunk_timeout: Duration,
    /// Maximum idle gap between two streamed chunks.
    pub chunk_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_owned(),
            first_chunk_timeout: Duration::from_secs(60),
            chunk_timeout: Duration::from_secs(30),
        }
    }
}

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_WEEKLY_MESSAGE_LIMIT: i64 = 15;

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("PARLEY_BIND", "0.0.0.0:3000"),
            database_url: env_or("PARLEY_DATABASE_URL", "sqlite://parley.db?mode=rwc"),
            log_level: env_or("PARLEY_LOG", "info"),
            log_json: env_flag("PARLEY_LOG_JSON", false),
            log_dir: std::env::var("PARLEY_LOG_DIR").ok().filter(|v| !v.is_empty()),
            cors_allowed_origins: std::env::var("PARLEY_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("PARLEY_ENABLE_SWAGGER", true),
            identity_header: env_or("PARLEY_IDENTITY_HEADER", "x-authenticated-user")
                .to_ascii_lowercase(),
            weekly_message_limit: parse_env(
                "PARLEY_WEEKLY_MESSAGE_LIMIT",
                DEFAULT_WEEKLY_MESSAGE_LIMIT,
            ),
            gemini: GeminiConfig {
                api_key: std::env::var("GEMINI_API_KEY").ok().filter(|v| !v.is_empty()),
                base_url: env_or("PARLEY_GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
                first_chunk_timeout: Duration::from_secs(parse_env(
                    "PARLEY_PROVIDER_FIRST_CHUNK_TIMEOUT_SECS",
                    60,
                )),
                chunk_timeout: Duration::from_secs(parse_env(
                    "PARLEY_PROVIDER_CHUNK_TIMEOUT_SECS",
                    30,
                )),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_owned(),
            database_url: "sqlite::memory:".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: false,
            identity_header: "x-authenticated-user".to_owned(),
            weekly_message_limit: DEFAULT_WEEKLY_MESSAGE_LIMIT,
            gemini: GeminiConfig::default(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Parses `var` (or `default` when unset) into `T`, mapping failures to
/// [`ConfigError::InvalidEnvVar`].
fn parse_or<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SIFT_ENV", "development"));
    let bind_addr: SocketAddr = parse_or(&lookup, "SIFT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("SIFT_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default("SIFT_SOURCES_PATH", "./config/sources.yaml"));

    let db_max_connections = parse_or(&lookup, "SIFT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_or(&lookup, "SIFT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_or(&lookup, "SIFT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let llm_base_url = or_default("SIFT_LLM_BASE_URL", "https://api.openai.com/v1");
    let llm_api_key = lookup("SIFT_LLM_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let llm_model = or_default("SIFT_LLM_MODEL", "gpt-4o-mini");
    let llm_timeout_secs = parse_or(&lookup, "SIFT_LLM_TIMEOUT_SECS", "120")?;
    let llm_max_retries = parse_or(&lookup, "SIFT_LLM_MAX_RETRIES", "3")?;

    let rate_requests_per_minute = parse_or(&lookup, "SIFT_RATE_REQUESTS_PER_MINUTE", "50")?;
    let rate_tokens_per_minute = parse_or(&lookup, "SIFT_RATE_TOKENS_PER_MINUTE", "150000")?;
    let rate_max_wait_secs = parse_or(&lookup, "SIFT_RATE_MAX_WAIT_SECS", "300")?;

    let budget_daily_usd: Decimal = parse_or(&lookup, "SIFT_BUDGET_DAILY_USD", "5.00")?;
    let budget_monthly_usd: Decimal = parse_or(&lookup, "SIFT_BUDGET_MONTHLY_USD", "100.00")?;
    if budget_daily_usd.is_sign_negative() || budget_monthly_usd.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar {
            var: "SIFT_BUDGET_DAILY_USD/SIFT_BUDGET_MONTHLY_USD".to_string(),
            reason: "budget ceilings must not be negative".to_string(),
        });
    }

    let fetch_timeout_secs = parse_or(&lookup, "SIFT_FETCH_TIMEOUT_SECS", "30")?;
    let fetch_user_agent = or_default("SIFT_FETCH_USER_AGENT", "sift/0.1 (content-pipeline)");
    let fetch_max_retries = parse_or(&lookup, "SIFT_FETCH_MAX_RETRIES", "3")?;
    let fetch_backoff_base_ms = parse_or(&lookup, "SIFT_FETCH_BACKOFF_BASE_MS", "1000")?;

    let min_words_article = parse_or(&lookup, "SIFT_MIN_WORDS_ARTICLE", "100")?;
    let min_words_transcript = parse_or(&lookup, "SIFT_MIN_WORDS_TRANSCRIPT", "300")?;
    let max_item_attempts = parse_or(&lookup, "SIFT_MAX_ITEM_ATTEMPTS", "3")?;
    let batch_delay_ms = parse_or(&lookup, "SIFT_BATCH_DELAY_MS", "500")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        sources_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        llm_base_url,
        llm_api_key,
        llm_model,
        llm_timeout_secs,
        llm_max_retries,
        rate_requests_per_minute,
        rate_tokens_per_minute,
        rate_max_wait_secs,
        budget_daily_usd,
        budget_monthly_usd,
        fetch_timeout_secs,
        fetch_user_agent,
        fetch_max_retries,
        fetch_backoff_base_ms,
        min_words_article,
        min_words_transcript,
        max_item_attempts,
        batch_delay_ms,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

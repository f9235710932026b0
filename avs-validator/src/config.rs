//! Service configuration resolution
//!
//! Every setting resolves with priority ENV → TOML → compiled default.
//! Provider credentials have no default: a service without them fails at
//! startup with a configuration error instead of failing every request.

use crate::breaker::BreakerConfig;
use crate::error::ValidationError;
use crate::provider::smarty::{SmartyConfig, DEFAULT_BASE_URL};
use avs_common::config::TomlConfig;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_AUTH_ID: &str = "AVS_AUTH_ID";
pub const ENV_AUTH_TOKEN: &str = "AVS_AUTH_TOKEN";
pub const ENV_PROVIDER_URL: &str = "AVS_PROVIDER_URL";
pub const ENV_TIMEOUT_MS: &str = "AVS_TIMEOUT_MS";
pub const ENV_ERROR_THRESHOLD: &str = "AVS_ERROR_THRESHOLD_PERCENTAGE";
pub const ENV_RESET_TIMEOUT_MS: &str = "AVS_RESET_TIMEOUT_MS";
pub const ENV_MAX_CANDIDATES: &str = "AVS_MAX_CANDIDATES";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "AVS_REQUEST_TIMEOUT_MS";
pub const ENV_MAX_REQUESTS_PER_SECOND: &str = "AVS_MAX_REQUESTS_PER_SECOND";

pub const DEFAULT_BIND: &str = "127.0.0.1:5780";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ERROR_THRESHOLD: u8 = 50;
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_ROLLING_WINDOW_MS: u64 = 10_000;
pub const DEFAULT_ROLLING_BUCKETS: u32 = 10;
pub const DEFAULT_VOLUME_THRESHOLD: u32 = 5;
pub const DEFAULT_MAX_CANDIDATES: u32 = 1;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const MAX_CANDIDATES_LIMIT: u32 = 10;

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub provider: SmartyConfig,
    pub breaker: BreakerConfig,
    pub max_candidates: u32,
    /// Whole-request timeout enforced by the HTTP layer
    pub request_timeout: Duration,
}

/// Credential is usable (non-empty, non-whitespace)
pub fn is_valid_credential(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve the bind address: CLI/ENV (via clap) → TOML → default
pub fn resolve_bind(cli_bind: Option<&str>, toml_config: &TomlConfig) -> String {
    cli_bind
        .map(str::to_string)
        .or_else(|| toml_config.server.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string())
}

/// Resolve and validate the service configuration
pub fn resolve_service_config(toml_config: &TomlConfig) -> Result<ServiceConfig, ValidationError> {
    let provider_section = &toml_config.provider;
    let breaker_section = &toml_config.breaker;

    let auth_id = resolve_credential(ENV_AUTH_ID, provider_section.auth_id.as_deref(), "auth_id")?;
    let auth_token =
        resolve_credential(ENV_AUTH_TOKEN, provider_section.auth_token.as_deref(), "auth_token")?;

    let base_url = env_value(ENV_PROVIDER_URL)
        .or_else(|| provider_section.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ValidationError::configuration(format!(
            "Provider URL must start with http:// or https://, got '{}'",
            base_url
        )));
    }

    let max_requests_per_second = resolve_number(
        ENV_MAX_REQUESTS_PER_SECOND,
        provider_section.max_requests_per_second,
        0u32,
    )?;

    let timeout_ms =
        resolve_number(ENV_TIMEOUT_MS, breaker_section.timeout_ms, DEFAULT_TIMEOUT_MS)?;
    let error_threshold_percentage = resolve_number(
        ENV_ERROR_THRESHOLD,
        breaker_section.error_threshold_percentage,
        DEFAULT_ERROR_THRESHOLD,
    )?;
    let reset_timeout_ms = resolve_number(
        ENV_RESET_TIMEOUT_MS,
        breaker_section.reset_timeout_ms,
        DEFAULT_RESET_TIMEOUT_MS,
    )?;
    let rolling_window_ms = breaker_section
        .rolling_window_ms
        .unwrap_or(DEFAULT_ROLLING_WINDOW_MS);
    let rolling_buckets = breaker_section
        .rolling_buckets
        .unwrap_or(DEFAULT_ROLLING_BUCKETS);
    let volume_threshold = breaker_section
        .volume_threshold
        .unwrap_or(DEFAULT_VOLUME_THRESHOLD);

    let max_candidates = resolve_number(
        ENV_MAX_CANDIDATES,
        provider_section.max_candidates,
        DEFAULT_MAX_CANDIDATES,
    )?;
    let request_timeout_ms = resolve_number(
        ENV_REQUEST_TIMEOUT_MS,
        toml_config.server.request_timeout_ms,
        DEFAULT_REQUEST_TIMEOUT_MS,
    )?;

    if timeout_ms == 0 {
        return Err(ValidationError::configuration("timeout_ms must be greater than 0"));
    }
    if !(1..=100).contains(&error_threshold_percentage) {
        return Err(ValidationError::configuration(format!(
            "error_threshold_percentage must be 1-100, got {}",
            error_threshold_percentage
        )));
    }
    if reset_timeout_ms == 0 {
        return Err(ValidationError::configuration("reset_timeout_ms must be greater than 0"));
    }
    if rolling_buckets == 0 || rolling_window_ms < u64::from(rolling_buckets) {
        return Err(ValidationError::configuration(format!(
            "rolling_window_ms ({}) must be at least rolling_buckets ({}) and buckets must be non-zero",
            rolling_window_ms, rolling_buckets
        )));
    }
    if !(1..=MAX_CANDIDATES_LIMIT).contains(&max_candidates) {
        return Err(ValidationError::configuration(format!(
            "max_candidates must be 1-{}, got {}",
            MAX_CANDIDATES_LIMIT, max_candidates
        )));
    }
    if request_timeout_ms == 0 {
        return Err(ValidationError::configuration("request_timeout_ms must be greater than 0"));
    }
    if request_timeout_ms <= timeout_ms {
        warn!(
            "request_timeout_ms ({}) is not above timeout_ms ({}); requests may be abandoned before the provider call times out",
            request_timeout_ms, timeout_ms
        );
    }

    info!(
        timeout_ms,
        error_threshold_percentage,
        reset_timeout_ms,
        max_candidates,
        "Service configuration resolved"
    );

    Ok(ServiceConfig {
        provider: SmartyConfig {
            auth_id,
            auth_token,
            base_url,
            max_requests_per_second: (max_requests_per_second > 0)
                .then_some(max_requests_per_second),
        },
        breaker: BreakerConfig {
            call_timeout: Duration::from_millis(timeout_ms),
            error_threshold_percentage,
            reset_timeout: Duration::from_millis(reset_timeout_ms),
            rolling_window: Duration::from_millis(rolling_window_ms),
            rolling_buckets,
            volume_threshold,
        },
        max_candidates,
        request_timeout: Duration::from_millis(request_timeout_ms),
    })
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_valid_credential(v))
}

fn resolve_number<T>(
    env_name: &str,
    toml_value: Option<T>,
    default: T,
) -> Result<T, ValidationError>
where
    T: FromStr,
    T::Err: Display,
{
    // Set but blank is a mistake, not "unset"
    if let Ok(raw) = std::env::var(env_name) {
        return raw.trim().parse().map_err(|e| {
            ValidationError::configuration(format!(
                "{} has invalid value '{}': {}",
                env_name, raw, e
            ))
        });
    }
    Ok(toml_value.unwrap_or(default))
}

/// Resolve one provider credential
///
/// **Priority:** ENV → TOML
fn resolve_credential(
    env_name: &str,
    toml_value: Option<&str>,
    toml_key: &str,
) -> Result<String, ValidationError> {
    let env_key = env_value(env_name);
    let toml_key_value = toml_value.filter(|v| is_valid_credential(v));

    if env_key.is_some() && toml_key_value.is_some() {
        warn!(
            "Provider {} found in both environment and TOML. Using environment (highest priority).",
            toml_key
        );
    }

    if let Some(value) = env_key {
        info!("Provider {} loaded from environment variable", toml_key);
        return Ok(value);
    }

    if let Some(value) = toml_key_value {
        info!("Provider {} loaded from TOML config", toml_key);
        return Ok(value.to_string());
    }

    Err(ValidationError::configuration(format!(
        "Provider {} not configured. Set one of:\n\
         1. Environment: {}=...\n\
         2. TOML config: [provider] {} = \"...\"",
        toml_key, env_name, toml_key
    )))
}

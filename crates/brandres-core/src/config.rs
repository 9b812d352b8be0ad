use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files. Useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("BRANDRES_ENV", "development"))?;
    let log_level = or_default("BRANDRES_LOG_LEVEL", "info");
    let brands_path = PathBuf::from(or_default("BRANDRES_BRANDS_PATH", "./config/brands.yaml"));
    let state_dir = PathBuf::from(or_default("BRANDRES_STATE_DIR", "./data"));

    let request_timeout_secs = parse_u64("BRANDRES_REQUEST_TIMEOUT_SECS", "12")?;
    if !(1..=120).contains(&request_timeout_secs) {
        return Err(ConfigError::InvalidEnvVar {
            var: "BRANDRES_REQUEST_TIMEOUT_SECS".to_string(),
            reason: format!("{request_timeout_secs} is outside 1..=120"),
        });
    }
    let user_agent = or_default("BRANDRES_USER_AGENT", "brandres/0.1 (brand-asset-resolution)");
    let max_concurrent_brands = parse_usize("BRANDRES_MAX_CONCURRENT_BRANDS", "2")?;
    let validation_workers = parse_usize("BRANDRES_VALIDATION_WORKERS", "4")?;
    let host_spacing_ms = parse_u64("BRANDRES_HOST_SPACING_MS", "750")?;
    let max_retries = parse_u32("BRANDRES_MAX_RETRIES", "2")?;
    let retry_backoff_ms = parse_u64("BRANDRES_RETRY_BACKOFF_MS", "1000")?;

    let logo_api_base_url = or_default("BRANDRES_LOGO_API_BASE_URL", "https://img.logo.dev");
    let logo_api_token = optional("BRANDRES_LOGO_API_TOKEN");
    let logo_search_url = or_default("BRANDRES_LOGO_SEARCH_URL", "https://api.logo.dev/search");
    let logo_search_key = optional("BRANDRES_LOGO_SEARCH_KEY");
    let search_base_url = or_default("BRANDRES_SEARCH_BASE_URL", "https://html.duckduckgo.com/html/");

    Ok(AppConfig {
        env,
        log_level,
        brands_path,
        state_dir,
        request_timeout_secs,
        user_agent,
        max_concurrent_brands,
        validation_workers,
        host_spacing_ms,
        max_retries,
        retry_backoff_ms,
        logo_api_base_url,
        logo_api_token,
        logo_search_url,
        logo_search_key,
        search_base_url,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BRANDRES_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

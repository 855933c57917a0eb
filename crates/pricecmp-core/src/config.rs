use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but holds an invalid value.
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
/// Returns `ConfigError` if a variable is present but holds an invalid value.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let chains_path = PathBuf::from(or_default("PRICECMP_CHAINS_PATH", "./config/chains.yaml"));
    let download_dir = PathBuf::from(or_default("PRICECMP_DOWNLOAD_DIR", "./Downloads"));
    let log_level = or_default("PRICECMP_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("PRICECMP_REQUEST_TIMEOUT_SECS", "60")?;
    let user_agent = or_default("PRICECMP_USER_AGENT", "pricecmp/0.1 (price-transparency)");

    let max_concurrent_chains = parse_usize("PRICECMP_MAX_CONCURRENT_CHAINS", "3")?;
    if max_concurrent_chains == 0 {
        return Err(invalid(
            "PRICECMP_MAX_CONCURRENT_CHAINS",
            "must be at least 1".to_string(),
        ));
    }

    let max_attempts = parse_u32("PRICECMP_MAX_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(invalid(
            "PRICECMP_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }

    let retry_delay_base_ms = parse_u64("PRICECMP_RETRY_DELAY_BASE_MS", "1000")?;
    let run_timeout_secs = match parse_u64("PRICECMP_RUN_TIMEOUT_SECS", "3600")? {
        0 => None,
        secs => Some(secs),
    };

    Ok(AppConfig {
        chains_path,
        download_dir,
        log_level,
        request_timeout_secs,
        user_agent,
        max_concurrent_chains,
        max_attempts,
        retry_delay_base_ms,
        run_timeout_secs,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

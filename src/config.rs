use std::env;
use std::time::Duration;

use crate::fetch::{FetchConfig, DEFAULT_BTC_URL, DEFAULT_FX_URL};

pub const DEFAULT_YEAR: i32 = 2019;

/// Service configuration read from the environment (a `.env` file is honoured).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    /// `memory`, or a SQLite URL such as `sqlite://cache.db?mode=rwc`
    pub cache_url: String,
    pub default_year: i32,
    pub fetch: FetchConfig,
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env_opt(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={:?}", name, raw);
            default
        }),
        None => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!("Failed to load .env: {}", err);
            }
        }

        Self {
            bind: env_str("PRICES_BIND", "0.0.0.0"),
            port: env_parse("PRICES_PORT", 8000),
            cache_url: env_str("PRICES_CACHE_URL", "memory"),
            default_year: env_parse("PRICES_DEFAULT_YEAR", DEFAULT_YEAR),
            fetch: FetchConfig {
                btc_url: env_str("PRICES_BTC_URL", DEFAULT_BTC_URL),
                fx_url: env_str("PRICES_FX_URL", DEFAULT_FX_URL),
                fx_api_key: env_opt("QUANDL_API_KEY"),
                timeout: Duration::from_secs(env_parse("PRICES_HTTP_TIMEOUT_SECS", 10)),
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            cache_url: "memory".to_string(),
            default_year: DEFAULT_YEAR,
            fetch: FetchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(env_str("PRICES_TEST_SURELY_UNSET", "x"), "x");
        assert_eq!(env_parse("PRICES_TEST_SURELY_UNSET", 42u16), 42);
        assert!(env_opt("PRICES_TEST_SURELY_UNSET").is_none());
    }

    #[test]
    fn blank_and_bad_values_are_ignored() {
        env::set_var("PRICES_TEST_BLANK", "   ");
        env::set_var("PRICES_TEST_BAD_PORT", "eighty");

        assert!(env_opt("PRICES_TEST_BLANK").is_none());
        assert_eq!(env_parse("PRICES_TEST_BAD_PORT", 8000u16), 8000);
    }

    #[test]
    fn default_config_points_at_public_apis() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.default_year, 2019);
        assert_eq!(cfg.fetch.btc_url, DEFAULT_BTC_URL);
        assert!(cfg.fetch.fx_api_key.is_none());
    }
}

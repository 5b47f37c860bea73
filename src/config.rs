use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::application::sync_service::{SyncSettings, MAX_PAGE_SIZE};
use crate::infrastructure::woo_client::{RetryPolicy, WooCommerceCredentials};
use crate::reporting::exclusions::ExclusionList;

pub const DEFAULT_BASE_URL: &str = "https://online.paideiainstitute.org";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable '{0}'")]
    MissingVar(&'static str),

    #[error("Invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Cannot load excluded products from {path}: {reason}")]
    Exclusions { path: String, reason: String },

    #[error("Cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub credentials: WooCommerceCredentials,
    pub orders_file: PathBuf,
    pub exclusions: ExclusionList,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub sync: SyncSettings,
    pub retry: RetryPolicy,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Reads the process environment only; `main` loads `.env` beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build the configuration from any variable source; unset and empty
    /// values are treated alike.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str| get(var).ok_or(ConfigError::MissingVar(var));

        let credentials = WooCommerceCredentials {
            consumer_key: required("WOOCOMMERCE_CONSUMER_KEY")?,
            consumer_secret: required("WOOCOMMERCE_CONSUMER_SECRET")?,
        };
        let base_url = get("WOOCOMMERCE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let orders_file = PathBuf::from(get("ORDERS_FILE").unwrap_or_else(|| "Woo.json".to_string()));

        let exclusions = match get("EXCLUDED_PRODUCTS_FILE") {
            Some(path) => load_exclusions(&path)?,
            None => ExclusionList::default(),
        };

        let per_page: u32 = parse_or(get("API_PER_PAGE"), "API_PER_PAGE", MAX_PAGE_SIZE)?;
        let config = Self {
            base_url,
            credentials,
            orders_file,
            exclusions,
            cache_ttl: Duration::from_secs(parse_or(get("CACHE_TTL_SECS"), "CACHE_TTL_SECS", 300)?),
            request_timeout: Duration::from_secs(parse_or(
                get("API_TIMEOUT_SECS"),
                "API_TIMEOUT_SECS",
                60,
            )?),
            sync: SyncSettings {
                per_page: per_page.clamp(1, MAX_PAGE_SIZE),
                page_delay: Duration::from_millis(parse_or(get("API_DELAY_MS"), "API_DELAY_MS", 50)?),
            },
            retry: RetryPolicy {
                max_retries: parse_or(get("API_MAX_RETRIES"), "API_MAX_RETRIES", 3)?,
                base_delay: Duration::from_millis(parse_or(
                    get("API_BACKOFF_MS"),
                    "API_BACKOFF_MS",
                    1000,
                )?),
            },
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), "PORT", 8080)?,
        };

        log::info!(
            "Configuration loaded: {} orders per page from {}, store {}",
            config.sync.per_page,
            config.base_url,
            config.orders_file.display()
        );
        Ok(config)
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("'{}': {}", raw, e),
        }),
        None => Ok(default),
    }
}

fn load_exclusions(path: &str) -> Result<ExclusionList, ConfigError> {
    let fail = |reason: String| ConfigError::Exclusions {
        path: path.to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
    let list = ExclusionList::from_json(&raw).map_err(|e| fail(e.to_string()))?;
    log::info!("Loaded {} excluded product names from {}", list.len(), path);
    Ok(list)
}

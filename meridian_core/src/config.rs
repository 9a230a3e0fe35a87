use std::path::PathBuf;
use std::time::Duration;

use crate::Result;

/// Default multiplier for the estimated-GDP derivation.
///
/// `estimated_gdp = population * gdp_per_capita_factor / exchange_rate`.
/// The factor is a stand-in for a per-capita output figure the providers do
/// not supply; it is configurable so operators can recalibrate without a code
/// change, and fixed per process so a refresh is reproducible.
pub const DEFAULT_GDP_PER_CAPITA_FACTOR: f64 = 1500.0;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the country-reference feed.
    pub countries_url: String,
    /// Base URL of the exchange-rate feed.
    pub rates_url: String,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt, on transient failures only.
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database file path.
    pub db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Upper bound on a whole refresh operation (fetch through commit).
    pub deadline: Duration,
    pub gdp_per_capita_factor: f64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
            gdp_per_capita_factor: DEFAULT_GDP_PER_CAPITA_FACTOR,
        }
    }
}

/// Process-wide configuration, sourced from `MERIDIAN_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub providers: ProviderConfig,
    pub store: StoreConfig,
    pub refresh: RefreshConfig,
}

impl Config {
    #[tracing::instrument(level = "debug")]
    pub fn from_env() -> Result<Self> {
        let countries_url = std::env::var("MERIDIAN_COUNTRIES_API_URL")
            .unwrap_or_else(|_| "https://restcountries.com".to_string());
        let rates_url = std::env::var("MERIDIAN_RATES_API_URL")
            .unwrap_or_else(|_| "https://open.er-api.com".to_string());
        let timeout_ms = std::env::var("MERIDIAN_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15_000);
        let max_retries = std::env::var("MERIDIAN_HTTP_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(2);

        let db_path = std::env::var("MERIDIAN_DB_PATH")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/meridian.db"));

        let deadline_ms = std::env::var("MERIDIAN_REFRESH_DEADLINE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60_000);
        let gdp_per_capita_factor = std::env::var("MERIDIAN_GDP_PER_CAPITA_FACTOR")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(DEFAULT_GDP_PER_CAPITA_FACTOR);

        Ok(Self {
            providers: ProviderConfig {
                countries_url,
                rates_url,
                timeout: Duration::from_millis(timeout_ms),
                max_retries,
            },
            store: StoreConfig { db_path },
            refresh: RefreshConfig {
                deadline: Duration::from_millis(deadline_ms),
                gdp_per_capita_factor,
            },
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw country row as pulled from the country-reference provider.
///
/// Fields the provider may omit stay optional here; records missing `name`
/// or `population` are skipped (and counted) during reconciliation rather
/// than failing the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCountryRecord {
    pub name: Option<String>,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: Option<u64>,
    /// Three-letter code of the country's primary currency, when reported.
    pub currency_code: Option<String>,
    pub flag_url: Option<String>,
}

/// A single currency quote from the exchange-rate provider, relative to the
/// provider's base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRateRecord {
    pub code: String,
    pub rate: f64,
}

/// Pipeline stage labels used in log events and failure diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Fetching,
    Reconciling,
    Committing,
    Done,
}

impl RefreshPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshPhase::Idle => "idle",
            RefreshPhase::Fetching => "fetching",
            RefreshPhase::Reconciling => "reconciling",
            RefreshPhase::Committing => "committing",
            RefreshPhase::Done => "done",
        }
    }
}

/// Outcome of a successful refresh, with aggregate counters for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub total_countries: u64,
    pub last_refreshed_at: DateTime<Utc>,
    pub countries_fetched: u64,
    pub rates_fetched: u64,
    pub records_skipped: u64,
    pub records_upserted: u64,
}

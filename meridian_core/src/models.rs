use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// A normalized country row as persisted by the store.
///
/// `name` is the natural key; `id` is a store-stable surrogate assigned on
/// first insert and preserved across upserts of the same name.
/// `exchange_rate` and `estimated_gdp` are always both present or both
/// absent: a country whose currency had no matching rate keeps both `None`
/// rather than being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub id: Uuid,
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: u64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    /// Batch timestamp: identical for every record written by one refresh.
    pub last_refreshed_at: DateTime<Utc>,
}

impl CountryRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        capital: Option<String>,
        region: Option<String>,
        population: u64,
        currency_code: Option<String>,
        exchange_rate: Option<f64>,
        estimated_gdp: Option<f64>,
        flag_url: Option<String>,
        last_refreshed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("country name is empty".to_string()));
        }
        if exchange_rate.is_none() != estimated_gdp.is_none() {
            return Err(Error::InvalidInput(
                "exchange_rate and estimated_gdp must be set together".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            capital,
            region,
            population,
            currency_code,
            exchange_rate,
            estimated_gdp,
            flag_url,
            last_refreshed_at,
        })
    }
}

/// Aggregate view over the persisted dataset.
///
/// `last_refreshed_at` is the batch timestamp of the most recent successful
/// commit, tracked in a meta row updated transactionally with the batch; it
/// is `None` until the first refresh completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub total_countries: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Injectable time source so refresh batch timestamps are reproducible in
/// tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

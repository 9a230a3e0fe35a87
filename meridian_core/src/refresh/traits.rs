use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CountryRecord;
use crate::refresh::models::{RawCountryRecord, RawRateRecord};
use crate::Result;

/// Pulls the raw country-reference dataset from an external provider.
///
/// Each call is independent and stateless; retry and timeout policy is owned
/// by the implementation. Implementations live in `meridian_integrations` or
/// caller code.
#[async_trait]
pub trait CountrySource: Send + Sync {
    /// Provider identifier used in error reporting and logs.
    fn provider(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<RawCountryRecord>>;
}

/// Pulls the raw exchange-rate dataset from an external provider.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<RawRateRecord>>;
}

/// Condensed view of the committed dataset handed to the summary collaborator
/// after a successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_countries: u64,
    pub last_refreshed_at: DateTime<Utc>,
    /// Highest-GDP records, descending, GDP-less countries excluded.
    pub top_by_gdp: Vec<CountryRecord>,
}

/// External collaborator that turns the committed dataset into a rendered
/// artifact (summary image or similar). Invoked after commit; failures are
/// logged by the engine and never fail the refresh.
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn publish(&self, summary: &DatasetSummary) -> Result<()>;
}

/// Default sink: records the summary as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSummarySink;

#[async_trait]
impl SummarySink for LoggingSummarySink {
    async fn publish(&self, summary: &DatasetSummary) -> Result<()> {
        tracing::info!(
            total_countries = summary.total_countries,
            last_refreshed_at = %summary.last_refreshed_at.to_rfc3339(),
            top = summary.top_by_gdp.len(),
            "dataset summary"
        );
        Ok(())
    }
}

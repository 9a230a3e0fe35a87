use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::CountryRecord;
use crate::refresh::models::{RawCountryRecord, RawRateRecord};
use crate::Result;

/// Knobs for the derivation step.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// See [`crate::config::DEFAULT_GDP_PER_CAPITA_FACTOR`].
    pub gdp_per_capita_factor: f64,
}

/// Result of joining the two raw feeds: normalized records plus the counters
/// the engine reports.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub records: Vec<CountryRecord>,
    /// Country rows dropped for missing `name` or `population`.
    pub skipped: u64,
    /// Records that found a matching exchange rate.
    pub matched: u64,
}

/// Joins the country feed against the rate feed by currency code.
///
/// Pure function, no I/O. On duplicate codes in the rate feed the first
/// occurrence wins. Countries whose code is absent or unquoted are kept with
/// `exchange_rate`/`estimated_gdp` both `None`. Every output record carries
/// `batch_time` as its `last_refreshed_at`.
pub fn reconcile(
    countries: &[RawCountryRecord],
    rates: &[RawRateRecord],
    batch_time: DateTime<Utc>,
    opts: ReconcileOptions,
) -> Result<ReconcileOutcome> {
    let mut rate_by_code: HashMap<&str, f64> = HashMap::with_capacity(rates.len());
    for r in rates {
        // First-wins: later duplicates of a code never overwrite.
        rate_by_code.entry(r.code.as_str()).or_insert(r.rate);
    }

    let mut records = Vec::with_capacity(countries.len());
    let mut skipped = 0u64;
    let mut matched = 0u64;

    for raw in countries {
        let (name, population) = match (&raw.name, raw.population) {
            (Some(name), Some(population)) if !name.trim().is_empty() => {
                (name.clone(), population)
            }
            _ => {
                skipped += 1;
                tracing::warn!(
                    name = raw.name.as_deref().unwrap_or("<missing>"),
                    "skipping country record with missing required fields"
                );
                continue;
            }
        };

        let rate = raw
            .currency_code
            .as_deref()
            .and_then(|code| rate_by_code.get(code).copied());
        let estimated_gdp = rate.map(|rate| {
            matched += 1;
            population as f64 * opts.gdp_per_capita_factor / rate
        });

        records.push(CountryRecord::new(
            name,
            raw.capital.clone(),
            raw.region.clone(),
            population,
            raw.currency_code.clone(),
            rate,
            estimated_gdp,
            raw.flag_url.clone(),
            batch_time,
        )?);
    }

    Ok(ReconcileOutcome {
        records,
        skipped,
        matched,
    })
}

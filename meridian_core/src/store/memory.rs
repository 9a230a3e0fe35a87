use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::models::{CountryRecord, StatusSnapshot};
use crate::store::{CountryStore, GdpSort, ListFilter};
use crate::{Error, Result};

/// In-memory CountryStore for local development and unit tests.
///
/// The single mutex makes every batch visible to readers all at once, the
/// same contract the SQLite transaction provides.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<CountryRecord>,
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn gdp_cmp(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

#[async_trait]
impl CountryStore for MemoryStore {
    async fn upsert_all(&self, records: &[CountryRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.lock().await;
        for rec in records {
            match inner.rows.iter_mut().find(|r| r.name == rec.name) {
                Some(existing) => {
                    // Keep the stored surrogate id across refreshes.
                    let id = existing.id;
                    *existing = rec.clone();
                    existing.id = id;
                }
                None => inner.rows.push(rec.clone()),
            }
        }
        inner.last_refreshed_at = Some(records[0].last_refreshed_at);
        Ok(records.len() as u64)
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<CountryRecord>> {
        let inner = self.inner.lock().await;
        let mut out: Vec<CountryRecord> = inner
            .rows
            .iter()
            .filter(|r| match &filter.region {
                Some(region) => r.region.as_deref() == Some(region.as_str()),
                None => true,
            })
            .filter(|r| match &filter.currency_code {
                Some(code) => r.currency_code.as_deref() == Some(code.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        match filter.sort {
            GdpSort::None => out.sort_by(|a, b| a.name.cmp(&b.name)),
            GdpSort::Asc => out.sort_by(|a, b| gdp_cmp(a.estimated_gdp, b.estimated_gdp)),
            GdpSort::Desc => out.sort_by(|a, b| gdp_cmp(b.estimated_gdp, a.estimated_gdp)),
        }

        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn get_by_name(&self, name: &str) -> Result<CountryRecord> {
        let inner = self.inner.lock().await;
        inner
            .rows
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("country '{name}' not found")))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let before = inner.rows.len();
        inner.rows.retain(|r| r.name != name);
        if inner.rows.len() == before {
            return Err(Error::NotFound(format!("country '{name}' not found")));
        }
        Ok(())
    }

    async fn status(&self) -> Result<StatusSnapshot> {
        let inner = self.inner.lock().await;
        Ok(StatusSnapshot {
            total_countries: inner.rows.len() as u64,
            last_refreshed_at: inner.last_refreshed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    fn record(name: &str, region: &str, code: &str, gdp: Option<f64>) -> CountryRecord {
        CountryRecord::new(
            name,
            None,
            Some(region.to_string()),
            100,
            Some(code.to_string()),
            gdp.map(|_| 1.0),
            gdp,
            None,
            t0(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn filters_are_and_combined() {
        let store = MemoryStore::new();
        store
            .upsert_all(&[
                record("Nigeria", "Africa", "NGN", Some(1.0)),
                record("Ghana", "Africa", "GHS", Some(2.0)),
                record("France", "Europe", "EUR", Some(3.0)),
            ])
            .await
            .unwrap();

        let out = store
            .list(ListFilter {
                region: Some("Africa".to_string()),
                currency_code: Some("NGN".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Nigeria");
    }

    #[tokio::test]
    async fn desc_sort_puts_gdpless_last_and_respects_limit() {
        let store = MemoryStore::new();
        store
            .upsert_all(&[
                record("NoGdp", "X", "AAA", None),
                record("Mid", "X", "BBB", Some(5.0)),
                record("Top", "X", "CCC", Some(9.0)),
            ])
            .await
            .unwrap();

        let out = store
            .list(ListFilter {
                sort: GdpSort::Desc,
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Top", "Mid"]);
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_name() {
        let store = MemoryStore::new();
        let first = record("Nigeria", "Africa", "NGN", Some(1.0));
        store
            .upsert_all(std::slice::from_ref(&first))
            .await
            .unwrap();
        store
            .upsert_all(&[record("Nigeria", "Africa", "NGN", Some(7.0))])
            .await
            .unwrap();

        let status = store.status().await.unwrap();
        assert_eq!(status.total_countries, 1);
        let got = store.get_by_name("Nigeria").await.unwrap();
        assert_eq!(got.estimated_gdp, Some(7.0));
        assert_eq!(got.id, first.id);
    }
}

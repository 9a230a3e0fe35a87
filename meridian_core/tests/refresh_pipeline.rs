//! End-to-end pipeline behavior over stub providers and the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Mutex, Notify, Semaphore};

use meridian_core::refresh::traits::{DatasetSummary, LoggingSummarySink};
use meridian_core::store::GdpSort;
use meridian_core::{
    Clock, CountryRecord, CountrySource, CountryStore, Error, ListFilter, MemoryStore, RateSource,
    RawCountryRecord, RawRateRecord, RefreshConfig, RefreshEngine, StatusSnapshot, SummarySink,
};

fn t(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, day, 12, 0, 0).unwrap()
}

fn config() -> RefreshConfig {
    RefreshConfig {
        deadline: Duration::from_secs(5),
        gdp_per_capita_factor: 1500.0,
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct StubCountries(Vec<RawCountryRecord>);

#[async_trait]
impl CountrySource for StubCountries {
    fn provider(&self) -> &'static str {
        "stub-countries"
    }

    async fn fetch(&self) -> meridian_core::Result<Vec<RawCountryRecord>> {
        Ok(self.0.clone())
    }
}

struct StubRates(Vec<RawRateRecord>);

#[async_trait]
impl RateSource for StubRates {
    fn provider(&self) -> &'static str {
        "stub-rates"
    }

    async fn fetch(&self) -> meridian_core::Result<Vec<RawRateRecord>> {
        Ok(self.0.clone())
    }
}

fn country(name: &str, population: u64, code: Option<&str>) -> RawCountryRecord {
    RawCountryRecord {
        name: Some(name.to_string()),
        capital: Some("Abuja".to_string()),
        region: Some("Africa".to_string()),
        population: Some(population),
        currency_code: code.map(str::to_string),
        flag_url: None,
    }
}

fn rate(code: &str, value: f64) -> RawRateRecord {
    RawRateRecord {
        code: code.to_string(),
        rate: value,
    }
}

fn engine_with(
    countries: Vec<RawCountryRecord>,
    rates: Vec<RawRateRecord>,
    store: Arc<dyn CountryStore>,
    at: DateTime<Utc>,
) -> RefreshEngine {
    RefreshEngine::new(
        Arc::new(StubCountries(countries)),
        Arc::new(StubRates(rates)),
        store,
        config(),
    )
    .with_clock(Arc::new(FixedClock(at)))
}

#[tokio::test]
async fn matched_country_gets_rate_and_gdp() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(
        vec![country("Nigeria", 200_000_000, Some("NGN"))],
        vec![rate("NGN", 1500.0)],
        store.clone(),
        t(1),
    )
    .with_summary_sink(Arc::new(LoggingSummarySink));

    let report = engine.refresh().await.unwrap();
    assert_eq!(report.total_countries, 1);
    assert_eq!(report.last_refreshed_at, t(1));

    let rec = store.get_by_name("Nigeria").await.unwrap();
    assert_eq!(rec.exchange_rate, Some(1500.0));
    // estimated_gdp = population * factor / rate
    assert_eq!(rec.estimated_gdp, Some(200_000_000.0 * 1500.0 / 1500.0));
    assert_eq!(rec.capital.as_deref(), Some("Abuja"));
}

#[tokio::test]
async fn unmatched_country_is_kept_with_null_derivations() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(
        vec![country("Atlantis", 1000, Some("ATL"))],
        vec![],
        store.clone(),
        t(1),
    );

    engine.refresh().await.unwrap();

    let rec = store.get_by_name("Atlantis").await.unwrap();
    assert_eq!(rec.exchange_rate, None);
    assert_eq!(rec.estimated_gdp, None);
}

#[tokio::test]
async fn derived_fields_are_paired_and_timestamps_uniform() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(
        vec![
            country("Nigeria", 200_000_000, Some("NGN")),
            country("Atlantis", 1000, Some("ATL")),
            country("Kosovo", 1_800_000, None),
        ],
        vec![rate("NGN", 1500.0)],
        store.clone(),
        t(1),
    );

    engine.refresh().await.unwrap();

    let all = store.list(ListFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    for rec in &all {
        assert_eq!(rec.exchange_rate.is_none(), rec.estimated_gdp.is_none());
        assert_eq!(rec.last_refreshed_at, t(1));
    }
}

#[tokio::test]
async fn refresh_is_idempotent_up_to_timestamp() {
    let store = Arc::new(MemoryStore::new());
    let countries = vec![
        country("Nigeria", 200_000_000, Some("NGN")),
        country("Ghana", 33_000_000, Some("GHS")),
    ];
    let rates = vec![rate("NGN", 1500.0), rate("GHS", 15.0)];

    engine_with(countries.clone(), rates.clone(), store.clone(), t(1))
        .refresh()
        .await
        .unwrap();
    let first = store.list(ListFilter::default()).await.unwrap();

    engine_with(countries, rates, store.clone(), t(2))
        .refresh()
        .await
        .unwrap();
    let second = store.list(ListFilter::default()).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        let mut b = b.clone();
        assert_eq!(b.last_refreshed_at, t(2));
        b.last_refreshed_at = a.last_refreshed_at;
        assert_eq!(*a, b);
    }
}

#[tokio::test]
async fn delete_then_lookup_fails_and_count_drops() {
    let store = Arc::new(MemoryStore::new());
    engine_with(
        vec![
            country("Nigeria", 200_000_000, Some("NGN")),
            country("Ghana", 33_000_000, Some("GHS")),
        ],
        vec![rate("NGN", 1500.0)],
        store.clone(),
        t(1),
    )
    .refresh()
    .await
    .unwrap();

    store.delete("Nigeria").await.unwrap();
    assert!(matches!(
        store.get_by_name("Nigeria").await,
        Err(Error::NotFound(_))
    ));

    let StatusSnapshot {
        total_countries,
        last_refreshed_at,
    } = store.status().await.unwrap();
    assert_eq!(total_countries, 1);
    assert_eq!(last_refreshed_at, Some(t(1)));
}

/// Country source that signals when a fetch has started and then waits to be
/// released, so a second refresh can be issued mid-flight.
struct GatedCountries {
    records: Vec<RawCountryRecord>,
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

#[async_trait]
impl CountrySource for GatedCountries {
    fn provider(&self) -> &'static str {
        "gated-countries"
    }

    async fn fetch(&self) -> meridian_core::Result<Vec<RawCountryRecord>> {
        self.entered.notify_one();
        let _permit = self.release.acquire().await.expect("semaphore open");
        Ok(self.records.clone())
    }
}

#[tokio::test]
async fn concurrent_refresh_is_rejected_without_disturbing_the_first() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Semaphore::new(0));
    let store = Arc::new(MemoryStore::new());

    let engine = Arc::new(
        RefreshEngine::new(
            Arc::new(GatedCountries {
                records: vec![country("Nigeria", 200_000_000, Some("NGN"))],
                entered: entered.clone(),
                release: release.clone(),
            }),
            Arc::new(StubRates(vec![rate("NGN", 1500.0)])),
            store.clone(),
            config(),
        )
        .with_clock(Arc::new(FixedClock(t(1)))),
    );

    let running = engine.clone();
    let first = tokio::spawn(async move { running.refresh().await });

    entered.notified().await;
    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, Error::RefreshInProgress));

    release.add_permits(1);
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.total_countries, 1);
    assert_eq!(store.status().await.unwrap().total_countries, 1);
}

struct HangingCountries;

#[async_trait]
impl CountrySource for HangingCountries {
    fn provider(&self) -> &'static str {
        "hanging-countries"
    }

    async fn fetch(&self) -> meridian_core::Result<Vec<RawCountryRecord>> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

#[tokio::test]
async fn deadline_expiry_abandons_fetches_and_leaves_store_untouched() {
    let store = Arc::new(MemoryStore::new());
    let engine = RefreshEngine::new(
        Arc::new(HangingCountries),
        Arc::new(StubRates(vec![])),
        store.clone(),
        RefreshConfig {
            deadline: Duration::from_millis(50),
            gdp_per_capita_factor: 1500.0,
        },
    );

    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded(_)));
    assert!(err.is_unavailable());

    let status = store.status().await.unwrap();
    assert_eq!(status.total_countries, 0);
    assert_eq!(status.last_refreshed_at, None);
}

struct FailingSource;

#[async_trait]
impl RateSource for FailingSource {
    fn provider(&self) -> &'static str {
        "failing-rates"
    }

    async fn fetch(&self) -> meridian_core::Result<Vec<RawRateRecord>> {
        Err(Error::FetchStatus {
            provider: "failing-rates".to_string(),
            status: 503,
        })
    }
}

#[tokio::test]
async fn fetch_failure_surfaces_as_unavailable_and_commits_nothing() {
    let store = Arc::new(MemoryStore::new());
    let engine = RefreshEngine::new(
        Arc::new(StubCountries(vec![country("Nigeria", 1, Some("NGN"))])),
        Arc::new(FailingSource),
        store.clone(),
        config(),
    );

    let err = engine.refresh().await.unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(store.status().await.unwrap().total_countries, 0);
}

/// Store whose commit path fails while reads pass through, to separate the
/// storage outage class from the fetch outage class.
struct BrokenCommitStore(MemoryStore);

#[async_trait]
impl CountryStore for BrokenCommitStore {
    async fn upsert_all(&self, _records: &[CountryRecord]) -> meridian_core::Result<u64> {
        Err(Error::StorageMessage("disk full".to_string()))
    }

    async fn list(&self, filter: ListFilter) -> meridian_core::Result<Vec<CountryRecord>> {
        self.0.list(filter).await
    }

    async fn get_by_name(&self, name: &str) -> meridian_core::Result<CountryRecord> {
        self.0.get_by_name(name).await
    }

    async fn delete(&self, name: &str) -> meridian_core::Result<()> {
        self.0.delete(name).await
    }

    async fn status(&self) -> meridian_core::Result<StatusSnapshot> {
        self.0.status().await
    }
}

#[tokio::test]
async fn commit_failure_is_a_storage_error_and_prior_state_survives() {
    let memory = MemoryStore::new();
    engine_with(
        vec![country("Nigeria", 200_000_000, Some("NGN"))],
        vec![rate("NGN", 1500.0)],
        Arc::new(memory.clone()),
        t(1),
    )
    .refresh()
    .await
    .unwrap();

    let engine = engine_with(
        vec![country("Wakanda", 6_000_000, Some("WKD"))],
        vec![rate("WKD", 3.0)],
        Arc::new(BrokenCommitStore(memory.clone())),
        t(2),
    );

    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Storage { .. } | Error::StorageMessage(_)
    ));
    assert!(!err.is_unavailable());

    // Prior batch is fully intact.
    let status = memory.status().await.unwrap();
    assert_eq!(status.total_countries, 1);
    assert_eq!(status.last_refreshed_at, Some(t(1)));
    assert!(memory.get_by_name("Nigeria").await.is_ok());
    assert!(memory.get_by_name("Wakanda").await.is_err());
}

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Vec<DatasetSummary>>>);

#[async_trait]
impl SummarySink for RecordingSink {
    async fn publish(&self, summary: &DatasetSummary) -> meridian_core::Result<()> {
        self.0.lock().await.push(summary.clone());
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl SummarySink for FailingSink {
    async fn publish(&self, _summary: &DatasetSummary) -> meridian_core::Result<()> {
        Err(Error::StorageMessage("renderer offline".to_string()))
    }
}

#[tokio::test]
async fn summary_sink_receives_top_countries_by_gdp() {
    let store = Arc::new(MemoryStore::new());
    let sink = RecordingSink::default();
    let engine = engine_with(
        vec![
            country("Nigeria", 200_000_000, Some("NGN")),
            country("Ghana", 33_000_000, Some("GHS")),
            country("Atlantis", 1000, Some("ATL")),
        ],
        vec![rate("NGN", 1500.0), rate("GHS", 15.0)],
        store.clone(),
        t(1),
    )
    .with_summary_sink(Arc::new(sink.clone()));

    engine.refresh().await.unwrap();

    let published = sink.0.lock().await;
    assert_eq!(published.len(), 1);
    let summary = &published[0];
    assert_eq!(summary.total_countries, 3);
    assert_eq!(summary.last_refreshed_at, t(1));
    // GDP-less countries are excluded from the top list.
    let names: Vec<_> = summary.top_by_gdp.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Ghana", "Nigeria"]);
}

#[tokio::test]
async fn summary_sink_failure_does_not_fail_the_refresh() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(
        vec![country("Nigeria", 200_000_000, Some("NGN"))],
        vec![rate("NGN", 1500.0)],
        store,
        t(1),
    )
    .with_summary_sink(Arc::new(FailingSink));

    let report = engine.refresh().await.unwrap();
    assert_eq!(report.total_countries, 1);
}

#[tokio::test]
async fn sort_order_is_exposed_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    engine_with(
        vec![
            country("Nigeria", 200_000_000, Some("NGN")),
            country("Ghana", 33_000_000, Some("GHS")),
            country("Atlantis", 1000, Some("ATL")),
        ],
        vec![rate("NGN", 1500.0), rate("GHS", 15.0)],
        store.clone(),
        t(1),
    )
    .refresh()
    .await
    .unwrap();

    let desc = store
        .list(ListFilter {
            sort: GdpSort::Desc,
            ..Default::default()
        })
        .await
        .unwrap();
    let names: Vec<_> = desc.iter().map(|r| r.name.as_str()).collect();
    // Ghana: 33M * 1500 / 15 = 3.3e9; Nigeria: 200M * 1500 / 1500 = 2e8.
    assert_eq!(names, vec!["Ghana", "Nigeria", "Atlantis"]);
}

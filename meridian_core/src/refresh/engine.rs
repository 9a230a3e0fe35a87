use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::RefreshConfig;
use crate::models::{Clock, SystemClock};
use crate::refresh::models::{RefreshPhase, RefreshReport};
use crate::refresh::reconcile::{reconcile, ReconcileOptions, ReconcileOutcome};
use crate::refresh::traits::{CountrySource, DatasetSummary, RateSource, SummarySink};
use crate::store::{CountryStore, GdpSort, ListFilter};
use crate::{Error, Result};

/// Coordinates one refresh end to end: concurrent fetch of both providers,
/// reconciliation, atomic commit, and post-commit summary notification.
///
/// At most one refresh runs per engine at a time; a second call while one is
/// in flight is rejected with [`Error::RefreshInProgress`]. The whole
/// fetch-through-commit sequence is bounded by `config.deadline`; on expiry
/// the outstanding fetches are abandoned and the store is left untouched.
pub struct RefreshEngine {
    countries: Arc<dyn CountrySource>,
    rates: Arc<dyn RateSource>,
    store: Arc<dyn CountryStore>,
    summary_sink: Option<Arc<dyn SummarySink>>,
    clock: Arc<dyn Clock>,
    config: RefreshConfig,
    inflight: Mutex<()>,
}

impl RefreshEngine {
    pub fn new(
        countries: Arc<dyn CountrySource>,
        rates: Arc<dyn RateSource>,
        store: Arc<dyn CountryStore>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            countries,
            rates,
            store,
            summary_sink: None,
            clock: Arc::new(SystemClock),
            config,
            inflight: Mutex::new(()),
        }
    }

    /// Set the collaborator notified with the committed dataset after a
    /// successful refresh.
    pub fn with_summary_sink(mut self, sink: Arc<dyn SummarySink>) -> Self {
        self.summary_sink = Some(sink);
        self
    }

    /// Replace the wall clock (fixed clocks in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one refresh. Returns [`Error::RefreshInProgress`] if another
    /// refresh is already running on this engine.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let _guard = self
            .inflight
            .try_lock()
            .map_err(|_| Error::RefreshInProgress)?;

        // Batch timestamp is taken at orchestration start, not at commit
        // time, so every record of the batch carries the same value.
        let batch_time = self.clock.now();
        let deadline = self.config.deadline;

        let report = tokio::time::timeout(deadline, self.run_pipeline(batch_time))
            .await
            .map_err(|_| {
                tracing::warn!(deadline_ms = deadline.as_millis() as u64, "refresh timed out");
                Error::DeadlineExceeded(deadline)
            })??;

        // Post-commit collaborator call, outside the deadline: a slow sink
        // must not turn an already-committed refresh into a failure.
        self.notify_summary_sink(&report).await;

        Ok(report)
    }

    async fn run_pipeline(&self, batch_time: DateTime<Utc>) -> Result<RefreshReport> {
        tracing::debug!(phase = RefreshPhase::Fetching.as_str(), "refresh phase");
        let (countries, rates) =
            tokio::try_join!(self.countries.fetch(), self.rates.fetch())?;
        let countries_fetched = countries.len() as u64;
        let rates_fetched = rates.len() as u64;

        tracing::debug!(phase = RefreshPhase::Reconciling.as_str(), "refresh phase");
        let ReconcileOutcome {
            records,
            skipped,
            matched,
        } = reconcile(
            &countries,
            &rates,
            batch_time,
            ReconcileOptions {
                gdp_per_capita_factor: self.config.gdp_per_capita_factor,
            },
        )?;

        tracing::debug!(
            phase = RefreshPhase::Committing.as_str(),
            records = records.len(),
            skipped,
            matched,
            "refresh phase"
        );
        let records_upserted = self.store.upsert_all(&records).await?;

        let status = self.store.status().await?;
        tracing::info!(
            phase = RefreshPhase::Done.as_str(),
            total_countries = status.total_countries,
            records_upserted,
            records_skipped = skipped,
            "refresh committed"
        );

        Ok(RefreshReport {
            total_countries: status.total_countries,
            last_refreshed_at: batch_time,
            countries_fetched,
            rates_fetched,
            records_skipped: skipped,
            records_upserted,
        })
    }

    async fn notify_summary_sink(&self, report: &RefreshReport) {
        let Some(sink) = &self.summary_sink else {
            return;
        };

        let summary = match self.build_summary(report).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build dataset summary");
                return;
            }
        };

        if let Err(e) = sink.publish(&summary).await {
            tracing::warn!(error = %e, "summary sink failed");
        }
    }

    async fn build_summary(&self, report: &RefreshReport) -> Result<DatasetSummary> {
        let mut top_by_gdp = self
            .store
            .list(ListFilter {
                region: None,
                currency_code: None,
                sort: GdpSort::Desc,
                limit: Some(5),
            })
            .await?;
        top_by_gdp.retain(|r| r.estimated_gdp.is_some());

        Ok(DatasetSummary {
            total_countries: report.total_countries,
            last_refreshed_at: report.last_refreshed_at,
            top_by_gdp,
        })
    }
}

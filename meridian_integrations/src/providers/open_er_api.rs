//! Exchange-rate provider client (open.er-api.com shape).

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use meridian_core::config::ProviderConfig;
use meridian_core::refresh::models::RawRateRecord;
use meridian_core::refresh::traits::RateSource;
use meridian_core::{Error, Result};

use crate::resilience::{classify_send, classify_status, fetch_with_retry, AttemptFailure, RetryPolicy};

const PROVIDER: &str = "open-er-api";

#[derive(Debug, Deserialize)]
struct WireRates {
    #[serde(default)]
    result: Option<String>,
    /// Quotes keyed by currency code, relative to the requested base.
    /// A BTreeMap keeps the flattened record order deterministic.
    #[serde(default)]
    rates: BTreeMap<String, f64>,
}

#[derive(Clone)]
pub struct OpenErApiClient {
    client: Client,
    url: String,
    policy: RetryPolicy,
}

impl OpenErApiClient {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::fetch(PROVIDER, "build http client", e))?;

        Ok(Self {
            client,
            url: format!("{}/v6/latest/USD", cfg.rates_url.trim_end_matches('/')),
            policy: RetryPolicy {
                timeout: cfg.timeout,
                max_retries: cfg.max_retries,
                ..RetryPolicy::default()
            },
        })
    }
}

fn flatten(wire: WireRates) -> Result<Vec<RawRateRecord>> {
    if let Some(result) = &wire.result {
        if result != "success" {
            return Err(Error::FetchMessage {
                provider: PROVIDER.to_string(),
                message: format!("provider reported result '{result}'"),
            });
        }
    }

    let mut out = Vec::with_capacity(wire.rates.len());
    for (code, rate) in wire.rates {
        if !(rate.is_finite() && rate > 0.0) {
            tracing::warn!(code = %code, rate, "dropping non-positive exchange rate");
            continue;
        }
        out.push(RawRateRecord { code, rate });
    }
    Ok(out)
}

#[async_trait]
impl RateSource for OpenErApiClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn fetch(&self) -> Result<Vec<RawRateRecord>> {
        let wire: WireRates = fetch_with_retry(&self.policy, PROVIDER, || {
            let client = self.client.clone();
            let url = self.url.clone();
            async move {
                let resp = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| classify_send(PROVIDER, e))?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(classify_status(PROVIDER, status.as_u16()));
                }

                resp.json().await.map_err(|e| {
                    AttemptFailure::Fatal(Error::fetch(PROVIDER, "decode rates payload", e))
                })
            }
        })
        .await?;

        let records = flatten(wire)?;
        tracing::debug!(count = records.len(), "fetched exchange rates");
        Ok(records)
    }
}

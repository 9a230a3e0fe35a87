//! Country-reference provider client (restcountries v2 API shape).
//!
//! Decodes the upstream payload into typed wire structs at the boundary;
//! rows missing fields survive as `None` and are handled by the reconciler's
//! skip policy, never by failing the fetch.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use meridian_core::config::ProviderConfig;
use meridian_core::refresh::models::RawCountryRecord;
use meridian_core::refresh::traits::CountrySource;
use meridian_core::{Error, Result};

use crate::resilience::{classify_send, classify_status, fetch_with_retry, AttemptFailure, RetryPolicy};

const PROVIDER: &str = "restcountries";

#[derive(Debug, Deserialize, Clone)]
struct WireCurrency {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct WireCountry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    capital: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    population: Option<u64>,
    #[serde(default)]
    flag: Option<String>,
    #[serde(default)]
    currencies: Vec<WireCurrency>,
}

impl WireCountry {
    fn into_raw(self) -> RawCountryRecord {
        RawCountryRecord {
            name: self.name,
            capital: self.capital,
            region: self.region,
            population: self.population,
            // The upstream reports a list; the first entry is the country's
            // primary currency.
            currency_code: self.currencies.into_iter().find_map(|c| c.code),
            flag_url: self.flag,
        }
    }
}

#[derive(Clone)]
pub struct RestCountriesClient {
    client: Client,
    url: String,
    policy: RetryPolicy,
}

impl RestCountriesClient {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::fetch(PROVIDER, "build http client", e))?;

        Ok(Self {
            client,
            url: format!(
                "{}/v2/all?fields=name,capital,region,population,flag,currencies",
                cfg.countries_url.trim_end_matches('/')
            ),
            policy: RetryPolicy {
                timeout: cfg.timeout,
                max_retries: cfg.max_retries,
                ..RetryPolicy::default()
            },
        })
    }
}

#[async_trait]
impl CountrySource for RestCountriesClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn fetch(&self) -> Result<Vec<RawCountryRecord>> {
        let wire: Vec<WireCountry> = fetch_with_retry(&self.policy, PROVIDER, || {
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
                    AttemptFailure::Fatal(Error::fetch(PROVIDER, "decode countries payload", e))
                })
            }
        })
        .await?;

        tracing::debug!(count = wire.len(), "fetched country records");
        Ok(wire.into_iter().map(WireCountry::into_raw).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_decoding_takes_first_currency() {
        let payload = r#"[{
            "name": "Nigeria",
            "capital": "Abuja",
            "region": "Africa",
            "population": 200000000,
            "flag": "https://flagcdn.com/ng.svg",
            "currencies": [{"code": "NGN", "name": "Nigerian naira"}, {"code": "USD"}]
        }]"#;

        let wire: Vec<WireCountry> = serde_json::from_str(payload).unwrap();
        let raw = wire.into_iter().next().unwrap().into_raw();
        assert_eq!(raw.name.as_deref(), Some("Nigeria"));
        assert_eq!(raw.currency_code.as_deref(), Some("NGN"));
        assert_eq!(raw.population, Some(200_000_000));
        assert_eq!(raw.flag_url.as_deref(), Some("https://flagcdn.com/ng.svg"));
    }

    #[test]
    fn wire_decoding_tolerates_missing_fields() {
        let payload = r#"[{"region": "Polar"}, {"name": "Atlantis", "currencies": []}]"#;

        let wire: Vec<WireCountry> = serde_json::from_str(payload).unwrap();
        let raws: Vec<_> = wire.into_iter().map(WireCountry::into_raw).collect();
        assert_eq!(raws[0].name, None);
        assert_eq!(raws[1].name.as_deref(), Some("Atlantis"));
        assert_eq!(raws[1].currency_code, None);
    }

    #[test]
    fn currency_without_code_falls_through_to_next_entry() {
        let payload = r#"[{
            "name": "Edge",
            "population": 1,
            "currencies": [{"name": "codeless"}, {"code": "EUR"}]
        }]"#;

        let wire: Vec<WireCountry> = serde_json::from_str(payload).unwrap();
        let raw = wire.into_iter().next().unwrap().into_raw();
        assert_eq!(raw.currency_code.as_deref(), Some("EUR"));
    }
}

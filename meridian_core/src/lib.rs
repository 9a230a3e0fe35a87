//! Meridian core library: the country-dataset refresh pipeline and its store.

pub mod config;
pub mod error;
pub mod models;
pub mod refresh;
pub mod store;

pub use config::{Config, ProviderConfig, RefreshConfig, StoreConfig};
pub use error::{Error, Result};
pub use models::{Clock, CountryRecord, StatusSnapshot, SystemClock};
pub use refresh::{
    CountrySource, RateSource, RawCountryRecord, RawRateRecord, RefreshEngine, RefreshReport,
    SummarySink,
};
pub use store::{CountryStore, GdpSort, ListFilter, MemoryStore, SqliteStore};

//! Durable keyed storage for the normalized country dataset.
//!
//! Two implementations: [`SqliteStore`] for production and [`MemoryStore`]
//! for local development and unit tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{CountryRecord, StatusSnapshot};
use crate::Result;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Ordering over `estimated_gdp`.
///
/// NULL placement is pinned here rather than left to the storage engine:
/// records without a GDP sort first under `Asc` and last under `Desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GdpSort {
    #[default]
    None,
    Asc,
    Desc,
}

/// Listing parameters. `region` and `currency_code` are AND-combined,
/// case-sensitive exact matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    pub region: Option<String>,
    pub currency_code: Option<String>,
    #[serde(default)]
    pub sort: GdpSort,
    pub limit: Option<usize>,
}

/// Keyed record set over [`CountryRecord`], unique by name.
///
/// `upsert_all` is atomic with respect to concurrent readers: until it
/// returns, readers observe the prior state; afterwards, the whole batch.
#[async_trait]
pub trait CountryStore: Send + Sync {
    /// Inserts or updates every record in one atomic batch, keyed by name.
    /// Existing rows keep their surrogate `id`; all other fields are
    /// replaced. Updates the status row's `last_refreshed_at` to the batch
    /// timestamp in the same transaction. Returns the number of records
    /// written.
    async fn upsert_all(&self, records: &[CountryRecord]) -> Result<u64>;

    async fn list(&self, filter: ListFilter) -> Result<Vec<CountryRecord>>;

    /// Exact-match point lookup; `NotFound` when absent.
    async fn get_by_name(&self, name: &str) -> Result<CountryRecord>;

    /// Removes one record by name; `NotFound` when absent. Does not touch
    /// the status row's timestamp.
    async fn delete(&self, name: &str) -> Result<()>;

    async fn status(&self) -> Result<StatusSnapshot>;
}

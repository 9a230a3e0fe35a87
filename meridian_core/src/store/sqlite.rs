//! SQLite-backed CountryStore implementation.
//!
//! Single WAL-mode SQLite file; suitable for single-node deployments and
//! local development. Batch upserts run in one transaction, so concurrent
//! readers observe either the full prior state or the full new batch.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{CountryRecord, StatusSnapshot};
use crate::store::{CountryStore, GdpSort, ListFilter};
use crate::{Error, Result};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create (or open) the store at the given file path.
    ///
    /// Creates the file and parent directories if they don't exist and runs
    /// the internal schema setup.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage("sqlite_store mkdir", e))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
            .map_err(|e| Error::storage("sqlite_store connect options", e))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| Error::storage("sqlite_store connect", e))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::storage("sqlite_store schema", e))?;

        Ok(Self { pool })
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meridian_countries (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  capital TEXT NULL,
  region TEXT NULL,
  population INTEGER NOT NULL,
  currency_code TEXT NULL,
  exchange_rate REAL NULL,
  estimated_gdp REAL NULL,
  flag_url TEXT NULL,
  last_refreshed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS mc_region_idx ON meridian_countries(region);
CREATE INDEX IF NOT EXISTS mc_currency_idx ON meridian_countries(currency_code);
CREATE INDEX IF NOT EXISTS mc_gdp_idx ON meridian_countries(estimated_gdp);

CREATE TABLE IF NOT EXISTS meridian_refresh_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  last_refreshed_at TEXT NOT NULL
);
"#;

#[async_trait]
impl CountryStore for SqliteStore {
    #[tracing::instrument(level = "debug", skip(self, records), fields(batch = records.len()))]
    async fn upsert_all(&self, records: &[CountryRecord]) -> Result<u64> {
        // An empty batch carries no timestamp, so there is nothing to write,
        // meta row included.
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::storage("upsert_all begin", e))?;

        for rec in records {
            sqlx::query(
                r#"
INSERT INTO meridian_countries
  (id, name, capital, region, population, currency_code,
   exchange_rate, estimated_gdp, flag_url, last_refreshed_at)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(name) DO UPDATE SET
  capital = excluded.capital,
  region = excluded.region,
  population = excluded.population,
  currency_code = excluded.currency_code,
  exchange_rate = excluded.exchange_rate,
  estimated_gdp = excluded.estimated_gdp,
  flag_url = excluded.flag_url,
  last_refreshed_at = excluded.last_refreshed_at
"#,
            )
            .bind(rec.id.to_string())
            .bind(&rec.name)
            .bind(&rec.capital)
            .bind(&rec.region)
            .bind(rec.population as i64)
            .bind(&rec.currency_code)
            .bind(rec.exchange_rate)
            .bind(rec.estimated_gdp)
            .bind(&rec.flag_url)
            .bind(rec.last_refreshed_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::storage("upsert_all insert", e))?;
        }

        // Batch-consistent timestamp; the reconciler stamps every record of
        // one refresh with the same value.
        let batch_time = records[0].last_refreshed_at;
        sqlx::query(
            r#"
INSERT INTO meridian_refresh_meta (id, last_refreshed_at)
VALUES (1, ?1)
ON CONFLICT(id) DO UPDATE SET last_refreshed_at = excluded.last_refreshed_at
"#,
        )
        .bind(batch_time.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::storage("upsert_all meta", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::storage("upsert_all commit", e))?;

        Ok(records.len() as u64)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list(&self, filter: ListFilter) -> Result<Vec<CountryRecord>> {
        let mut conditions: Vec<String> = Vec::new();
        let mut next_param = 1;

        if filter.region.is_some() {
            conditions.push(format!("region = ?{next_param}"));
            next_param += 1;
        }
        if filter.currency_code.is_some() {
            conditions.push(format!("currency_code = ?{next_param}"));
            next_param += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        // NULL placement is pinned explicitly; SQLite's default would put
        // NULL first in both directions.
        let order_clause = match filter.sort {
            GdpSort::None => " ORDER BY name ASC",
            GdpSort::Asc => " ORDER BY (estimated_gdp IS NULL) DESC, estimated_gdp ASC",
            GdpSort::Desc => " ORDER BY (estimated_gdp IS NULL) ASC, estimated_gdp DESC",
        };

        let limit_clause = match filter.limit {
            Some(_) => format!(" LIMIT ?{next_param}"),
            None => String::new(),
        };

        let sql = format!(
            "SELECT id, name, capital, region, population, currency_code,
                    exchange_rate, estimated_gdp, flag_url, last_refreshed_at
             FROM meridian_countries{where_clause}{order_clause}{limit_clause}"
        );

        let mut q = sqlx::query(&sql);
        if let Some(region) = &filter.region {
            q = q.bind(region.clone());
        }
        if let Some(code) = &filter.currency_code {
            q = q.bind(code.clone());
        }
        if let Some(limit) = filter.limit {
            q = q.bind(limit as i64);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::storage("list countries", e))?;

        rows.iter().map(row_to_country).collect()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_by_name(&self, name: &str) -> Result<CountryRecord> {
        let row = sqlx::query(
            "SELECT id, name, capital, region, population, currency_code,
                    exchange_rate, estimated_gdp, flag_url, last_refreshed_at
             FROM meridian_countries WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::storage("get country", e))?;

        match row {
            Some(row) => row_to_country(&row),
            None => Err(Error::NotFound(format!("country '{name}' not found"))),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM meridian_countries WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::storage("delete country", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("country '{name}' not found")));
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn status(&self) -> Result<StatusSnapshot> {
        let count_row = sqlx::query("SELECT COUNT(*) AS n FROM meridian_countries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::storage("count countries", e))?;
        let total: i64 = count_row.get("n");

        let meta = sqlx::query("SELECT last_refreshed_at FROM meridian_refresh_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::storage("read refresh meta", e))?;

        let last_refreshed_at = meta
            .map(|row| parse_dt(row.get::<String, _>("last_refreshed_at").as_str()))
            .transpose()?;

        Ok(StatusSnapshot {
            total_countries: total.max(0) as u64,
            last_refreshed_at,
        })
    }
}

fn row_to_country(row: &sqlx::sqlite::SqliteRow) -> Result<CountryRecord> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| Error::storage("parse country id", e))?;
    let last_refreshed_at = parse_dt(row.get::<String, _>("last_refreshed_at").as_str())?;

    Ok(CountryRecord {
        id,
        name: row.get("name"),
        capital: row.get("capital"),
        region: row.get("region"),
        population: row.get::<i64, _>("population").max(0) as u64,
        currency_code: row.get("currency_code"),
        exchange_rate: row.get("exchange_rate"),
        estimated_gdp: row.get("estimated_gdp"),
        flag_url: row.get("flag_url"),
        last_refreshed_at,
    })
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::storage("parse datetime", e))
}

//! The refresh pipeline: provider seams, reconciliation, and orchestration.

pub mod engine;
pub mod models;
pub mod reconcile;
pub mod traits;

pub use engine::RefreshEngine;
pub use models::{RawCountryRecord, RawRateRecord, RefreshPhase, RefreshReport};
pub use reconcile::{reconcile, ReconcileOptions, ReconcileOutcome};
pub use traits::{CountrySource, DatasetSummary, LoggingSummarySink, RateSource, SummarySink};

//! Concrete provider clients for the refresh pipeline.
//!
//! Implements the `CountrySource` / `RateSource` seams from `meridian_core`
//! over HTTP, with bounded retries and per-attempt timeouts.

pub mod providers;
pub mod resilience;

pub use providers::{OpenErApiClient, RestCountriesClient};
pub use resilience::RetryPolicy;

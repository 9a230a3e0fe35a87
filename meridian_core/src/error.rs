use std::error::Error as StdError;
use std::time::Duration;

/// Common error type for `meridian_core`.
///
/// Concrete backends (providers, stores) should preserve the underlying error
/// chain where possible via `Error::fetch` / `Error::storage`.
///
/// The refresh path distinguishes two outage classes so operators can tell
/// them apart: `Fetch*`/`DeadlineExceeded` mean an upstream data source is
/// unavailable, `Storage*` means the persistence layer failed. Neither class
/// ever leaves a partially committed batch behind.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("refresh already in progress")]
    RefreshInProgress,

    #[error("fetch error from '{provider}': {context}")]
    Fetch {
        provider: String,
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("fetch error from '{provider}': {message}")]
    FetchMessage { provider: String, message: String },

    #[error("provider '{provider}' returned status {status}")]
    FetchStatus { provider: String, status: u16 },

    #[error("refresh deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("storage error: {0}")]
    StorageMessage(String),
}

impl Error {
    pub fn fetch(
        provider: impl Into<String>,
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Fetch {
            provider: provider.into(),
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn storage(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True for the "external data source unavailable" class of failures.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Fetch { .. }
                | Error::FetchMessage { .. }
                | Error::FetchStatus { .. }
                | Error::DeadlineExceeded(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

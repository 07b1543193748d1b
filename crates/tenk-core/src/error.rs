//! Error types for ingestion operations.
//!
//! This module defines [`Error`] which covers every failure the pipeline can
//! report: fetching from the registry, parsing documents, writing to storage,
//! and loading configuration. A metric or keyword that is simply absent from a
//! document is *not* an error; extractors represent it as `None` or omit it.

use thiserror::Error;

/// Errors that can occur while ingesting filings.
#[derive(Error, Debug)]
pub enum Error {
    /// A registry request failed after exhausting its retries.
    #[error("Fetch failed for {url} after {attempts} attempt(s): {message}")]
    Fetch {
        /// The URL that could not be fetched.
        url: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },

    /// A document could not be interpreted even with fallbacks.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with the backing store.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A name outside a fixed vocabulary was encountered.
    #[error("Unknown {kind}: {name}")]
    UnknownName {
        /// The vocabulary that was consulted (e.g. "metric").
        kind: &'static str,
        /// The offending name.
        name: String,
    },
}

impl Error {
    /// Returns true if this error came from the registry fetch layer.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Returns true if this error means the document itself was unusable.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

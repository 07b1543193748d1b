//! Registry trait for fetching filings.
//!
//! A [`FilingRegistry`] lists a company's annual filings and returns raw
//! document content. Implementations are responsible for rate limiting and
//! retrying transient failures; an error returned from either method means
//! retries were exhausted.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{Company, FilingDescriptor},
};

/// Source of filings and documents.
#[async_trait]
pub trait FilingRegistry: Send + Sync + Debug {
    /// Returns the name of this registry (e.g., "SEC EDGAR").
    fn name(&self) -> &str;

    /// Lists the company's 10-K filings, most recent first.
    ///
    /// Descriptors whose document could not be resolved carry no
    /// `document_url`; the caller treats them as fetch failures.
    async fn list_filings(&self, company: &Company) -> Result<Vec<FilingDescriptor>>;

    /// Fetches the raw content (HTML or text) of a filing document.
    async fn get_document(&self, url: &str) -> Result<String>;
}

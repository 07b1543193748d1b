//! Storage trait for extraction results.
//!
//! This module defines the [`FilingStore`] trait consumed by the ingestion
//! orchestrator and by downstream readers (dashboards, exports). Every write
//! is an upsert keyed by the data model's uniqueness invariants, so calling a
//! method twice with identical input only refreshes the row's timestamp.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{
        Company, Extraction, FilingRecord, StoredCompany, StoredFiling, StoredKeyword,
        StoredMetric,
    },
    vocab::{MetricName, RiskKeyword},
};

/// Persistent store for companies, filings, metrics and keywords.
#[async_trait]
pub trait FilingStore: Send + Sync + Debug {
    /// Inserts or updates a company keyed by ticker. Returns its id.
    async fn upsert_company(&self, company: &Company) -> Result<i64>;

    /// Inserts or updates a filing keyed by
    /// (company, filing type, fiscal year, fiscal period). Returns its id.
    async fn upsert_filing(&self, filing: &FilingRecord) -> Result<i64>;

    /// Inserts or updates a metric keyed by (filing, metric name).
    ///
    /// A `None` value records that extraction was attempted and found nothing.
    async fn upsert_metric(
        &self,
        filing_id: i64,
        metric: MetricName,
        value: Option<f64>,
        unit: &str,
    ) -> Result<()>;

    /// Inserts or updates a keyword keyed by (filing, keyword, section).
    async fn upsert_keyword(
        &self,
        filing_id: i64,
        keyword: RiskKeyword,
        frequency: u32,
        section: &str,
        snippet: Option<&str>,
    ) -> Result<()>;

    /// Removes keyword rows of a filing whose (keyword, section) pair is not
    /// in `keep`.
    ///
    /// Returns the number of rows removed.
    async fn prune_keywords(&self, filing_id: i64, keep: &[(RiskKeyword, String)]) -> Result<usize>;

    /// Writes a filing and all of its extraction results.
    ///
    /// The default implementation issues the individual upserts in order;
    /// stores with transactions should override it to make the write atomic.
    async fn store_extraction(&self, filing: &FilingRecord, extraction: &Extraction) -> Result<i64> {
        let filing_id = self.upsert_filing(filing).await?;

        for metric in &extraction.metrics {
            self.upsert_metric(filing_id, metric.metric, metric.value, &metric.unit)
                .await?;
        }

        let keep: Vec<(RiskKeyword, String)> = extraction
            .keywords
            .iter()
            .map(|k| (k.keyword, k.section.clone()))
            .collect();
        self.prune_keywords(filing_id, &keep).await?;

        for hit in &extraction.keywords {
            self.upsert_keyword(
                filing_id,
                hit.keyword,
                hit.frequency,
                &hit.section,
                hit.snippet.as_deref(),
            )
            .await?;
        }

        Ok(filing_id)
    }

    /// Returns every stored company, ordered by ticker.
    async fn companies(&self) -> Result<Vec<StoredCompany>>;

    /// Returns every stored filing, ordered by id.
    async fn filings(&self) -> Result<Vec<StoredFiling>>;

    /// Returns the metric rows of a filing, in vocabulary order.
    async fn metrics(&self, filing_id: i64) -> Result<Vec<StoredMetric>>;

    /// Returns the keyword rows of a filing, ordered by frequency descending.
    async fn keywords(&self, filing_id: i64) -> Result<Vec<StoredKeyword>>;
}

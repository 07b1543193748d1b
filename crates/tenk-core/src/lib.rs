#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tenk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and traits for the tenk 10-K ingestion pipeline.
//!
//! This crate provides the shared abstractions:
//!
//! - [`FilingRegistry`](registry::FilingRegistry) - Source of filings and documents
//! - [`FilingStore`](store::FilingStore) - Upsert-only persistence of results
//! - [`MetricName`](vocab::MetricName), [`RiskKeyword`](vocab::RiskKeyword),
//!   [`UnitScale`](vocab::UnitScale) - Fixed vocabularies
//! - [`Error`](error::Error) - Error taxonomy for the pipeline

/// Error types for ingestion operations.
pub mod error;
/// Fiscal period definitions.
pub mod period;
/// Registry trait for fetching filings.
pub mod registry;
/// Storage trait for extraction results.
pub mod store;
/// Core data types (Company, Filing, extraction results).
pub mod types;
/// Fixed vocabularies (metrics, keywords, unit scales).
pub mod vocab;

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use period::{FORM_10K, FiscalPeriod, fiscal_year_from_filing_date};
pub use registry::FilingRegistry;
pub use store::FilingStore;
pub use types::{
    Cik, Company, Extraction, FilingDescriptor, FilingRecord, KeywordHit, MetricValue,
    StoredCompany, StoredFiling, StoredKeyword, StoredMetric, Ticker,
};
pub use vocab::{CANONICAL_UNIT, MetricName, RiskKeyword, UnitScale};

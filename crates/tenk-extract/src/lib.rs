#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tenk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Extraction stages for 10-K documents.
//!
//! # Example
//!
//! ```
//! use tenk_core::MetricName;
//! use tenk_extract::{Document, Extractor};
//!
//! let raw = "<p>(In thousands)</p>\
//!     <table><tr><td>Total revenues</td><td>1,234</td></tr></table>\
//!     <p>Item 1A. Risk Factors</p><p>We are exposed to inflation.</p>";
//!
//! let extractor = Extractor::new().unwrap();
//! let document = Document::parse(raw).unwrap();
//! let result = extractor.extract(&document);
//!
//! assert_eq!(result.extraction.metric(MetricName::Revenue), Some(1_234_000.0));
//! assert_eq!(result.extraction.keywords[0].frequency, 1);
//! ```

/// HTML and plain text document parsing.
pub mod document;
/// Risk keyword scanning.
pub mod keywords;
/// Financial metric extraction.
pub mod metrics;
/// Numeric token parsing.
pub mod numbers;
/// Reporting scale detection.
pub mod unit;

pub use document::{Document, Table, TableRow};
pub use keywords::{KeywordScanner, SECTION_FULL_DOCUMENT, SECTION_RISK_FACTORS};
pub use metrics::MetricExtractor;
pub use numbers::parse_amount;
pub use unit::{UnitDetection, detect_unit};

use tenk_core::{Extraction, Result};

/// All extraction stages, compiled once and shared across filings.
#[derive(Debug)]
pub struct Extractor {
    metrics: MetricExtractor,
    keywords: KeywordScanner,
}

/// Output of [`Extractor::extract`].
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentResult {
    /// Detected reporting scale.
    pub unit: UnitDetection,
    /// Metrics and keyword hits.
    pub extraction: Extraction,
}

impl Extractor {
    /// Compiles every pattern.
    ///
    /// # Errors
    /// Returns [`tenk_core::Error::Config`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            metrics: MetricExtractor::new()?,
            keywords: KeywordScanner::new()?,
        })
    }

    /// Runs unit detection, metric extraction and keyword scanning.
    #[must_use]
    pub fn extract(&self, document: &Document) -> DocumentResult {
        let unit = detect_unit(document);
        let extraction = Extraction {
            metrics: self.metrics.extract_all(document, unit.scale),
            keywords: self.keywords.scan(document.text()),
        };
        DocumentResult { unit, extraction }
    }
}

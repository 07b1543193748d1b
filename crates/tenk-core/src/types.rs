//! Core data types for filing ingestion.
//!
//! This module defines the data model shared by every crate:
//!
//! - [`Ticker`] and [`Cik`] - Company identifiers
//! - [`Company`] - A tracked company
//! - [`FilingDescriptor`] - A filing as listed by the registry
//! - [`FilingRecord`] - A filing as persisted after extraction
//! - [`MetricValue`], [`KeywordHit`], [`Extraction`] - Extraction results
//! - [`StoredCompany`], [`StoredFiling`], [`StoredMetric`], [`StoredKeyword`] - Rows read back
//!   from a store

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::period::{FORM_10K, FiscalPeriod, fiscal_year_from_filing_date};
use crate::vocab::{CANONICAL_UNIT, MetricName, RiskKeyword, UnitScale};

/// A company ticker.
///
/// Tickers are uppercased on creation and may only contain ASCII letters,
/// digits, `.` and `-` (class shares such as `BRK.B`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Creates a ticker, validating and uppercasing the input.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] for empty tickers or unsupported characters.
    pub fn new(s: impl AsRef<str>) -> Result<Self> {
        let upper = s.as_ref().trim().to_uppercase();
        if upper.is_empty() {
            return Err(Error::InvalidParameter("Empty ticker".to_string()));
        }
        if !upper
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(Error::InvalidParameter(format!("Invalid ticker: {upper}")));
        }
        Ok(Self(upper))
    }

    /// Returns the ticker as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

/// SEC Central Index Key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cik(u64);

impl Cik {
    /// Creates a CIK from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the CIK zero-padded to 10 digits, as used by the submissions API.
    #[must_use]
    pub fn padded(&self) -> String {
        format!("{:010}", self.0)
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cik {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("CIK")
            .or_else(|| trimmed.strip_prefix("cik"))
            .unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::InvalidParameter(format!("Invalid CIK: {s}")))
    }
}

impl TryFrom<String> for Cik {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Cik> for String {
    fn from(c: Cik) -> Self {
        c.0.to_string()
    }
}

/// A tracked company.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Ticker symbol (unique).
    pub ticker: Ticker,
    /// Display name.
    pub name: String,
    /// Registry identifier.
    pub cik: Cik,
    /// Sector classification.
    #[serde(default)]
    pub sector: Option<String>,
    /// Industry classification.
    #[serde(default)]
    pub industry: Option<String>,
}

impl Company {
    /// Creates a company without classification.
    #[must_use]
    pub fn new(ticker: Ticker, name: impl Into<String>, cik: Cik) -> Self {
        Self {
            ticker,
            name: name.into(),
            cik,
            sector: None,
            industry: None,
        }
    }

    /// Sets the sector.
    #[must_use]
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Sets the industry.
    #[must_use]
    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }
}

/// A filing as listed by the registry, before its document is fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingDescriptor {
    /// Form type (e.g. "10-K").
    pub form: String,
    /// Accession number in dashed form (`0000320193-23-000106`).
    pub accession_number: String,
    /// Date the filing was accepted.
    pub filing_date: NaiveDate,
    /// Period end date, when the registry reports one.
    pub report_date: Option<NaiveDate>,
    /// Primary document file name, when the registry reports one.
    pub primary_document: Option<String>,
    /// Resolved URL of the main document.
    pub document_url: Option<String>,
}

impl FilingDescriptor {
    /// Creates a 10-K descriptor with no document resolved yet.
    #[must_use]
    pub fn annual(accession_number: impl Into<String>, filing_date: NaiveDate) -> Self {
        Self {
            form: FORM_10K.to_string(),
            accession_number: accession_number.into(),
            filing_date,
            report_date: None,
            primary_document: None,
            document_url: None,
        }
    }

    /// Sets the document URL.
    #[must_use]
    pub fn with_document_url(mut self, url: impl Into<String>) -> Self {
        self.document_url = Some(url.into());
        self
    }

    /// Sets the period end date.
    #[must_use]
    pub const fn with_report_date(mut self, report_date: NaiveDate) -> Self {
        self.report_date = Some(report_date);
        self
    }

    /// Accession number without dashes, as used in archive paths.
    #[must_use]
    pub fn accession_compact(&self) -> String {
        self.accession_number.replace('-', "")
    }

    /// Fiscal year covered by this filing.
    ///
    /// The year of the period end date when known, otherwise inferred from
    /// the filing date.
    #[must_use]
    pub fn fiscal_year(&self) -> i32 {
        self.report_date.map_or_else(
            || fiscal_year_from_filing_date(self.filing_date),
            |period_end| period_end.year(),
        )
    }
}

/// A filing as persisted after extraction.
///
/// Unique on (company, filing type, fiscal year, fiscal period).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    /// Owning company's store id.
    pub company_id: i64,
    /// Form type (e.g. "10-K").
    pub filing_type: String,
    /// Filing date.
    pub filing_date: NaiveDate,
    /// Fiscal year covered.
    pub fiscal_year: i32,
    /// Fiscal period covered.
    pub fiscal_period: FiscalPeriod,
    /// Registry accession number.
    pub accession_number: String,
    /// URL of the source document.
    pub source_url: String,
    /// Reporting scale detected in the document.
    pub unit_scale: UnitScale,
    /// True when no scale declaration was found and ones were assumed.
    pub unit_ambiguous: bool,
}

impl FilingRecord {
    /// Builds the record for an annual filing of `company_id`.
    #[must_use]
    pub fn annual(
        company_id: i64,
        descriptor: &FilingDescriptor,
        source_url: impl Into<String>,
        unit_scale: UnitScale,
        unit_ambiguous: bool,
    ) -> Self {
        Self {
            company_id,
            filing_type: descriptor.form.clone(),
            filing_date: descriptor.filing_date,
            fiscal_year: descriptor.fiscal_year(),
            fiscal_period: FiscalPeriod::FullYear,
            accession_number: descriptor.accession_number.clone(),
            source_url: source_url.into(),
            unit_scale,
            unit_ambiguous,
        }
    }
}

/// Extraction result for one metric. `value` is `None` when nothing matched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// The metric.
    pub metric: MetricName,
    /// Canonical USD value, if found.
    pub value: Option<f64>,
    /// Unit label.
    pub unit: String,
}

impl MetricValue {
    /// Creates a metric value in the canonical unit.
    #[must_use]
    pub fn usd(metric: MetricName, value: Option<f64>) -> Self {
        Self {
            metric,
            value,
            unit: CANONICAL_UNIT.to_string(),
        }
    }

    /// Returns true if a value was found.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

/// Keyword frequency within a scanned section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordHit {
    /// The keyword bucket.
    pub keyword: RiskKeyword,
    /// Number of matches.
    pub frequency: u32,
    /// Label of the scanned section (e.g. "Item 1A").
    pub section: String,
    /// First sentence containing a match.
    pub snippet: Option<String>,
}

/// Everything extracted from one document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// One entry per tracked metric.
    pub metrics: Vec<MetricValue>,
    /// Keyword buckets with at least one match.
    pub keywords: Vec<KeywordHit>,
}

impl Extraction {
    /// Number of metrics with a value.
    #[must_use]
    pub fn metrics_found(&self) -> usize {
        self.metrics.iter().filter(|m| m.is_found()).count()
    }

    /// Number of metrics without a value.
    #[must_use]
    pub fn metrics_null(&self) -> usize {
        self.metrics.len() - self.metrics_found()
    }

    /// Returns the value for a metric, if extracted.
    #[must_use]
    pub fn metric(&self, metric: MetricName) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.metric == metric)
            .and_then(|m| m.value)
    }
}

/// A company row read back from a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredCompany {
    /// Store id.
    pub id: i64,
    /// The persisted company.
    pub company: Company,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

/// A filing row read back from a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredFiling {
    /// Store id.
    pub id: i64,
    /// The persisted record.
    pub record: FilingRecord,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

/// A metric row read back from a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMetric {
    /// Owning filing id.
    pub filing_id: i64,
    /// The persisted value.
    pub value: MetricValue,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

/// A keyword row read back from a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredKeyword {
    /// Owning filing id.
    pub filing_id: i64,
    /// The persisted hit.
    pub hit: KeywordHit,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

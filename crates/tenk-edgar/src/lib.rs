#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tenk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC EDGAR filing registry.
//!
//! This crate provides access to SEC EDGAR filings:
//!
//! - 10-K filing lists from the submissions API
//! - Primary document resolution, with the filing index as fallback
//! - Raw document download
//!
//! # Example
//!
//! ```no_run
//! use tenk_core::{Cik, Company, FilingRegistry, Ticker};
//! use tenk_edgar::EdgarRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = EdgarRegistry::new("MyApp/1.0 (contact@example.com)")?;
//!
//!     let company = Company::new(Ticker::new("AAPL")?, "Apple Inc.", Cik::new(320193));
//!     for filing in registry.list_filings(&company).await? {
//!         println!("{} {:?}", filing.filing_date, filing.document_url);
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Shared outbound rate gate.
pub mod gate;
/// Bounded exponential backoff for registry requests.
pub mod retry;

pub use gate::RateGate;
pub use retry::{RetryPolicy, with_retry};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tenk_core::{
    Cik, Company, Error, FORM_10K, FilingDescriptor, FilingRegistry, Result,
};
use tracing::{debug, warn};

/// SEC EDGAR API base URL
const EDGAR_DATA_URL: &str = "https://data.sec.gov";

/// SEC EDGAR archives base URL
const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov";

/// Number of recent 10-K filings listed per company by default
pub const DEFAULT_FILINGS_PER_COMPANY: usize = 3;

/// SEC EDGAR filing registry.
///
/// Lists 10-K filings and downloads documents. Every request passes through
/// the shared [`RateGate`] and is retried according to the [`RetryPolicy`].
#[derive(Debug)]
pub struct EdgarRegistry {
    client: reqwest::Client,
    gate: Arc<RateGate>,
    retry: RetryPolicy,
    filings_per_company: usize,
    data_url: String,
    archives_url: String,
}

impl EdgarRegistry {
    /// Create a new EDGAR registry with the specified user agent.
    ///
    /// The SEC requires identifying user agent headers. Format should be:
    /// "AppName/Version (contact@email.com)"
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, Arc::new(RateGate::default())))
    }

    /// Create a new EDGAR registry with a custom HTTP client and shared gate.
    ///
    /// The client must already carry an identifying user agent.
    #[must_use]
    pub fn with_client(client: reqwest::Client, gate: Arc<RateGate>) -> Self {
        Self {
            client,
            gate,
            retry: RetryPolicy::default(),
            filings_per_company: DEFAULT_FILINGS_PER_COMPANY,
            data_url: EDGAR_DATA_URL.to_string(),
            archives_url: EDGAR_ARCHIVES_URL.to_string(),
        }
    }

    /// Replace the rate gate, e.g. to share one gate between registries.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<RateGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set how many recent 10-K filings are listed per company.
    #[must_use]
    pub const fn with_filings_per_company(mut self, count: usize) -> Self {
        self.filings_per_company = count;
        self
    }

    /// Point the registry at different hosts (mirrors, test servers).
    #[must_use]
    pub fn with_base_urls(mut self, data_url: &str, archives_url: &str) -> Self {
        self.data_url = data_url.trim_end_matches('/').to_string();
        self.archives_url = archives_url.trim_end_matches('/').to_string();
        self
    }

    /// The shared rate gate.
    #[must_use]
    pub const fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    /// Archive URL of a file within a filing.
    #[must_use]
    pub fn archive_url(&self, cik: Cik, accession_compact: &str, file: &str) -> String {
        format!(
            "{}/Archives/edgar/data/{}/{}/{}",
            self.archives_url,
            cik.value(),
            accession_compact,
            file
        )
    }

    /// GET a URL as text through the gate, with retries.
    async fn get_text(&self, url: &str) -> Result<String> {
        let client = &self.client;
        with_retry(&self.retry, &self.gate, url, move || async move {
            let response = client.get(url).send().await.map_err(|e| e.to_string())?;

            if !response.status().is_success() {
                return Err(format!("HTTP {}", response.status()));
            }

            response.text().await.map_err(|e| e.to_string())
        })
        .await
    }

    /// Fetch company submissions/filings metadata.
    async fn fetch_submissions(&self, cik: Cik) -> Result<CompanySubmissions> {
        let url = format!("{}/submissions/CIK{}.json", self.data_url, cik.padded());

        debug!("Fetching company submissions from {}", url);
        let body = self.get_text(&url).await?;

        serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("Failed to parse submissions for CIK {cik}: {e}")))
    }

    /// Find the main document of a filing from its index.
    async fn resolve_from_index(&self, cik: Cik, accession_compact: &str) -> Result<Option<String>> {
        let url = self.archive_url(cik, accession_compact, "index.json");

        debug!("Fetching filing index from {}", url);
        let body = self.get_text(&url).await?;
        let index: FilingIndex = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("Failed to parse filing index {url}: {e}")))?;

        Ok(primary_from_index(&index).map(|name| self.archive_url(cik, accession_compact, name)))
    }
}

#[async_trait]
impl FilingRegistry for EdgarRegistry {
    fn name(&self) -> &str {
        "SEC EDGAR"
    }

    async fn list_filings(&self, company: &Company) -> Result<Vec<FilingDescriptor>> {
        let submissions = self.fetch_submissions(company.cik).await?;
        let mut filings =
            annual_descriptors(&submissions.filings.recent, FORM_10K, self.filings_per_company);

        debug!(
            ticker = %company.ticker,
            entity = %submissions.name,
            count = filings.len(),
            "Listed filings"
        );

        for filing in &mut filings {
            let compact = filing.accession_compact();
            filing.document_url = match &filing.primary_document {
                Some(doc) => Some(self.archive_url(company.cik, &compact, doc)),
                None => match self.resolve_from_index(company.cik, &compact).await {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(
                            ticker = %company.ticker,
                            accession = %filing.accession_number,
                            error = %e,
                            "Could not resolve filing document"
                        );
                        None
                    }
                },
            };
        }

        Ok(filings)
    }

    async fn get_document(&self, url: &str) -> Result<String> {
        debug!("Fetching document from {}", url);
        self.get_text(url).await
    }
}

/// Build descriptors for the first `limit` filings of the given form.
fn annual_descriptors(recent: &RecentFilings, form: &str, limit: usize) -> Vec<FilingDescriptor> {
    let mut filings = Vec::new();

    for (i, row_form) in recent.form.iter().enumerate() {
        if filings.len() >= limit {
            break;
        }
        if row_form != form {
            continue;
        }

        let (Some(accession), Some(date)) = (recent.accession_number.get(i), recent.filing_date.get(i))
        else {
            warn!(row = i, "Submissions row is missing accession number or filing date");
            continue;
        };

        let Ok(filing_date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            warn!(accession = %accession, date = %date, "Unparseable filing date");
            continue;
        };

        let report_date = recent
            .report_date
            .get(i)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        let primary_document = recent
            .primary_document
            .get(i)
            .filter(|d| !d.trim().is_empty())
            .cloned();

        filings.push(FilingDescriptor {
            form: row_form.clone(),
            accession_number: accession.clone(),
            filing_date,
            report_date,
            primary_document,
            document_url: None,
        });
    }

    filings
}

/// Pick the main document from a filing index.
///
/// Prefers an HTML file whose name mentions the form ("10-k"), then any HTML
/// file that is not an exhibit.
fn primary_from_index(index: &FilingIndex) -> Option<&str> {
    let html = || {
        index
            .directory
            .item
            .iter()
            .map(|item| item.name.as_str())
            .filter(|name| name.to_lowercase().ends_with(".htm"))
    };

    html()
        .find(|name| name.to_lowercase().contains("10-k"))
        .or_else(|| html().find(|name| !name.to_lowercase().contains("ex")))
}

// =============================================================================
// SEC API Response Types
// =============================================================================

/// Company submissions/filings metadata.
#[derive(Debug, Deserialize)]
struct CompanySubmissions {
    /// Company name
    #[serde(default)]
    name: String,
    /// Filing history
    filings: SubmissionFilings,
}

/// Filing history section of the submissions response.
#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    /// Most recent filings (columnar)
    recent: RecentFilings,
}

/// Columnar list of recent filings; index `i` across vectors is one filing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    #[serde(default)]
    accession_number: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    report_date: Vec<String>,
    #[serde(default)]
    form: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

/// Filing index (`index.json`).
#[derive(Debug, Deserialize)]
struct FilingIndex {
    directory: IndexDirectory,
}

#[derive(Debug, Deserialize)]
struct IndexDirectory {
    #[serde(default)]
    item: Vec<IndexItem>,
}

#[derive(Debug, Deserialize)]
struct IndexItem {
    name: String,
}

// =============================================================================
// Tests
// =============================================================================

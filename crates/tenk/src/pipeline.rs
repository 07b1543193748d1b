//! Ingestion orchestrator.
//!
//! Drives the per-company, per-filing loop: list filings, fetch each
//! document, parse it, extract metrics and keywords, and store the results.
//! Every filing is isolated; a failure is recorded in the [`IngestReport`]
//! and never stops other filings or companies.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use tenk_core::{
    Company, Error, FilingDescriptor, FilingRecord, FilingRegistry, FilingStore, Result, Ticker,
};
use tenk_extract::{Document, Extractor};

/// Largest number of filings processed concurrently for one company.
pub const MAX_CONCURRENCY: usize = 4;

/// Cooperative stop request shared between the caller and the orchestrator.
///
/// The flag is checked before each filing starts, so the filing in flight
/// always finishes and the rest are reported as skipped.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates a signal that has not been raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Processing state of one filing.
///
/// ```text
/// pending -> fetched -> parsed -> stored
///                    |         -> store_failed
///                    -> parse_failed
///         -> fetch_failed
///         -> skipped
///         -> superseded
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilingState {
    /// Not started.
    Pending,
    /// Document downloaded.
    Fetched,
    /// Document parsed and extracted.
    Parsed,
    /// Results written to the store.
    Stored,
    /// The document could not be parsed.
    ParseFailed,
    /// The document could not be fetched.
    FetchFailed,
    /// The store rejected the write.
    StoreFailed,
    /// Not started because a stop was requested.
    Skipped,
    /// Not processed because a more recent filing in the same listing
    /// covers the same fiscal year.
    Superseded,
}

impl FilingState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Parsed => "parsed",
            Self::Stored => "stored",
            Self::ParseFailed => "parse_failed",
            Self::FetchFailed => "fetch_failed",
            Self::StoreFailed => "store_failed",
            Self::Skipped => "skipped",
            Self::Superseded => "superseded",
        }
    }

    /// Returns true for states with no outgoing transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Fetched | Self::Parsed)
    }

    /// Returns true for terminal failure states.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ParseFailed | Self::FetchFailed | Self::StoreFailed
        )
    }

    /// Returns true if `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Fetched | Self::FetchFailed | Self::Skipped | Self::Superseded
            )
                | (Self::Fetched, Self::Parsed | Self::ParseFailed)
                | (Self::Parsed, Self::Stored | Self::StoreFailed)
        )
    }
}

impl fmt::Display for FilingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one filing.
#[derive(Clone, Debug, PartialEq)]
pub struct FilingOutcome {
    /// Company ticker.
    pub ticker: Ticker,
    /// Registry accession number.
    pub accession_number: String,
    /// Fiscal year of the filing.
    pub fiscal_year: i32,
    /// Final state.
    pub state: FilingState,
    /// Failure reason, for failed filings.
    pub error: Option<String>,
    /// Metrics with a value.
    pub metrics_found: usize,
    /// Metrics stored as null.
    pub metrics_null: usize,
    /// Keyword rows stored.
    pub keywords: usize,
    /// True when no unit declaration was found.
    pub unit_ambiguous: bool,
}

impl FilingOutcome {
    fn pending(ticker: &Ticker, descriptor: &FilingDescriptor) -> Self {
        Self {
            ticker: ticker.clone(),
            accession_number: descriptor.accession_number.clone(),
            fiscal_year: descriptor.fiscal_year(),
            state: FilingState::Pending,
            error: None,
            metrics_found: 0,
            metrics_null: 0,
            keywords: 0,
            unit_ambiguous: false,
        }
    }

    fn advance(&mut self, next: FilingState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(
            ticker = %self.ticker,
            accession = %self.accession_number,
            from = %self.state,
            to = %next,
            "Filing state change"
        );
        self.state = next;
    }

    fn fail(mut self, next: FilingState, error: &Error) -> Self {
        warn!(
            ticker = %self.ticker,
            accession = %self.accession_number,
            state = %next,
            error = %error,
            "Filing failed"
        );
        self.advance(next);
        self.error = Some(error.to_string());
        self
    }
}

impl fmt::Display for FilingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} FY{} {} {}",
            self.ticker, self.fiscal_year, self.accession_number, self.state
        )?;
        match self.state {
            FilingState::Stored => write!(
                f,
                " ({} metrics, {} null, {} keywords{})",
                self.metrics_found,
                self.metrics_null,
                self.keywords,
                if self.unit_ambiguous {
                    ", unit ambiguous"
                } else {
                    ""
                }
            ),
            _ => match &self.error {
                Some(error) => write!(f, ": {error}"),
                None => Ok(()),
            },
        }
    }
}

/// A company whose filings could not be processed at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompanyFailure {
    /// Company ticker.
    pub ticker: Ticker,
    /// Failure reason.
    pub error: String,
}

/// Summary of an ingestion run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IngestReport {
    /// One entry per listed filing, grouped by company in processing order.
    pub outcomes: Vec<FilingOutcome>,
    /// Companies that could not be stored or listed.
    pub company_failures: Vec<CompanyFailure>,
    /// Companies not started because a stop was requested.
    pub companies_skipped: Vec<Ticker>,
}

impl IngestReport {
    fn count(&self, state: FilingState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// Number of filings stored.
    #[must_use]
    pub fn filings_stored(&self) -> usize {
        self.count(FilingState::Stored)
    }

    /// Filings that ended in a failure state.
    pub fn failed(&self) -> impl Iterator<Item = &FilingOutcome> {
        self.outcomes.iter().filter(|o| o.state.is_failure())
    }

    /// Number of failed filings.
    #[must_use]
    pub fn filings_failed(&self) -> usize {
        self.failed().count()
    }

    /// Number of filings skipped after a stop request.
    #[must_use]
    pub fn filings_skipped(&self) -> usize {
        self.count(FilingState::Skipped)
    }

    /// Number of filings superseded by a newer filing for the same fiscal year.
    #[must_use]
    pub fn filings_superseded(&self) -> usize {
        self.count(FilingState::Superseded)
    }

    fn stored(&self) -> impl Iterator<Item = &FilingOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == FilingState::Stored)
    }

    /// Metrics with a value, across stored filings.
    #[must_use]
    pub fn metrics_found(&self) -> usize {
        self.stored().map(|o| o.metrics_found).sum()
    }

    /// Metrics stored as null, across stored filings.
    #[must_use]
    pub fn metrics_null(&self) -> usize {
        self.stored().map(|o| o.metrics_null).sum()
    }

    /// Keyword rows written, across stored filings.
    #[must_use]
    pub fn keywords_stored(&self) -> usize {
        self.stored().map(|o| o.keywords).sum()
    }

    /// Stored filings whose unit scale was assumed.
    #[must_use]
    pub fn unit_ambiguous(&self) -> usize {
        self.stored().filter(|o| o.unit_ambiguous).count()
    }

    /// True when no filing and no company failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.filings_failed() == 0 && self.company_failures.is_empty()
    }

    /// True when no filing or company was left unprocessed by a stop request.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.filings_skipped() == 0 && self.companies_skipped.is_empty()
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stored, {} failed, {} skipped, {} superseded; metrics {} found / {} null; \
             {} keyword rows; {} ambiguous unit(s); {} company failure(s)",
            self.filings_stored(),
            self.filings_failed(),
            self.filings_skipped(),
            self.filings_superseded(),
            self.metrics_found(),
            self.metrics_null(),
            self.keywords_stored(),
            self.unit_ambiguous(),
            self.company_failures.len()
        )
    }
}

/// Callback invoked with each finished filing.
pub type ProgressFn = Arc<dyn Fn(&FilingOutcome) + Send + Sync>;

/// Runs the ingestion pipeline over a set of companies.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tenk::{EdgarRegistry, Orchestrator, SqliteStore};
///
/// let registry = Arc::new(EdgarRegistry::new("MyApp/1.0 (contact@example.com)")?);
/// let store = Arc::new(SqliteStore::new("tenk.db")?);
///
/// let report = Orchestrator::new(registry, store)?
///     .with_concurrency(2)?
///     .run(&companies)
///     .await;
/// println!("{report}");
/// ```
pub struct Orchestrator {
    registry: Arc<dyn FilingRegistry>,
    store: Arc<dyn FilingStore>,
    extractor: Extractor,
    concurrency: usize,
    stop: StopSignal,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry.name())
            .field("store", &self.store)
            .field("concurrency", &self.concurrency)
            .field("stop", &self.stop)
            .field("progress", &self.progress.as_ref().map(|_| "configured"))
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator processing one filing at a time.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the extraction patterns fail to compile.
    pub fn new(registry: Arc<dyn FilingRegistry>, store: Arc<dyn FilingStore>) -> Result<Self> {
        Ok(Self {
            registry,
            store,
            extractor: Extractor::new()?,
            concurrency: 1,
            stop: StopSignal::new(),
            progress: None,
        })
    }

    /// Sets the number of filings processed concurrently per company.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] unless `1 <= concurrency <= 4`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(Error::InvalidParameter(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {concurrency}"
            )));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    /// Uses an existing stop signal.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Registers a callback invoked with each finished filing.
    #[must_use]
    pub fn on_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns a handle to this orchestrator's stop signal.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Ingests every filing of every company, in order.
    pub async fn run(&self, companies: &[Company]) -> IngestReport {
        let mut report = IngestReport::default();

        info!(
            companies = companies.len(),
            registry = self.registry.name(),
            concurrency = self.concurrency,
            "Starting ingestion"
        );

        for company in companies {
            if self.stop.is_stop_requested() {
                report.companies_skipped.push(company.ticker.clone());
                continue;
            }
            self.ingest_company(company, &mut report).await;
        }

        info!(summary = %report, "Ingestion finished");
        report
    }

    async fn ingest_company(&self, company: &Company, report: &mut IngestReport) {
        let company_id = match self.store.upsert_company(company).await {
            Ok(id) => id,
            Err(e) => {
                warn!(ticker = %company.ticker, error = %e, "Failed to store company");
                report.company_failures.push(CompanyFailure {
                    ticker: company.ticker.clone(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let filings = match self.registry.list_filings(company).await {
            Ok(filings) => filings,
            Err(e) => {
                warn!(ticker = %company.ticker, error = %e, "Failed to list filings");
                report.company_failures.push(CompanyFailure {
                    ticker: company.ticker.clone(),
                    error: e.to_string(),
                });
                return;
            }
        };

        info!(ticker = %company.ticker, filings = filings.len(), "Processing company");

        // one filing per fiscal year: the latest filed wins
        let mut newest: HashMap<i32, usize> = HashMap::new();
        for (index, descriptor) in filings.iter().enumerate() {
            newest
                .entry(descriptor.fiscal_year())
                .and_modify(|kept| {
                    if descriptor.filing_date > filings[*kept].filing_date {
                        *kept = index;
                    }
                })
                .or_insert(index);
        }
        let kept_accessions: HashMap<i32, String> = newest
            .iter()
            .map(|(year, index)| (*year, filings[*index].accession_number.clone()))
            .collect();

        let (work, superseded): (Vec<_>, Vec<_>) = filings
            .into_iter()
            .enumerate()
            .partition(|(index, d)| newest.get(&d.fiscal_year()) == Some(index));

        let mut outcomes: Vec<(usize, FilingOutcome)> = superseded
            .into_iter()
            .map(|(index, descriptor)| {
                let year = descriptor.fiscal_year();
                let kept = kept_accessions.get(&year).map_or("", String::as_str);
                let mut outcome = FilingOutcome::pending(&company.ticker, &descriptor);
                warn!(
                    ticker = %company.ticker,
                    accession = %descriptor.accession_number,
                    fiscal_year = year,
                    kept,
                    "Filing superseded by a newer filing for the same fiscal year"
                );
                outcome.advance(FilingState::Superseded);
                outcome.error = Some(format!("fiscal year {year} already covered by {kept}"));
                if let Some(progress) = &self.progress {
                    progress(&outcome);
                }
                (index, outcome)
            })
            .collect();

        let processed: Vec<(usize, FilingOutcome)> = stream::iter(work)
            .map(|(index, descriptor)| async move {
                let outcome = self.process_filing(company, company_id, descriptor).await;
                if let Some(progress) = &self.progress {
                    progress(&outcome);
                }
                (index, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        outcomes.extend(processed);
        outcomes.sort_by_key(|(index, _)| *index);
        report
            .outcomes
            .extend(outcomes.into_iter().map(|(_, outcome)| outcome));
    }

    async fn process_filing(
        &self,
        company: &Company,
        company_id: i64,
        descriptor: FilingDescriptor,
    ) -> FilingOutcome {
        let mut outcome = FilingOutcome::pending(&company.ticker, &descriptor);

        if self.stop.is_stop_requested() {
            outcome.advance(FilingState::Skipped);
            return outcome;
        }

        let Some(url) = descriptor.document_url.as_deref() else {
            let error = Error::Fetch {
                url: descriptor.accession_number.clone(),
                attempts: 0,
                message: "primary document could not be resolved".to_string(),
            };
            return outcome.fail(FilingState::FetchFailed, &error);
        };

        let raw = match self.registry.get_document(url).await {
            Ok(raw) => raw,
            Err(e) => return outcome.fail(FilingState::FetchFailed, &e),
        };
        outcome.advance(FilingState::Fetched);

        let document = match Document::parse(&raw) {
            Ok(document) => document,
            Err(e) => return outcome.fail(FilingState::ParseFailed, &e),
        };
        let result = self.extractor.extract(&document);
        outcome.advance(FilingState::Parsed);

        let record = FilingRecord::annual(
            company_id,
            &descriptor,
            url,
            result.unit.scale,
            result.unit.ambiguous,
        );

        if let Err(e) = self.store.store_extraction(&record, &result.extraction).await {
            return outcome.fail(FilingState::StoreFailed, &e);
        }
        outcome.advance(FilingState::Stored);

        outcome.metrics_found = result.extraction.metrics_found();
        outcome.metrics_null = result.extraction.metrics_null();
        outcome.keywords = result.extraction.keywords.len();
        outcome.unit_ambiguous = result.unit.ambiguous;

        info!(
            ticker = %company.ticker,
            fiscal_year = record.fiscal_year,
            unit = %result.unit.scale,
            metrics_found = outcome.metrics_found,
            keywords = outcome.keywords,
            "Stored filing"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tenk_core::{
        Cik, Extraction, MetricName, RiskKeyword, StoredCompany, StoredFiling, StoredKeyword,
        StoredMetric,
    };
    use tenk_store::InMemoryStore;

    const DOC_2023: &str = "<html><body>\
        <p>ACME CORP ANNUAL REPORT</p>\
        <p>Item 1A. Risk Factors</p>\
        <p>A cybersecurity incident could disrupt operations. We are party to litigation.</p>\
        <p>Our cybersecurity controls may fail.</p>\
        <p>Item 1B. Unresolved Staff Comments</p>\
        <p>CONSOLIDATED STATEMENTS OF OPERATIONS (In thousands)</p>\
        <table><tr><td>Total revenues</td><td>1,234</td><td>1,100</td></tr>\
        <tr><td>Net income</td><td>56</td><td>40</td></tr></table>\
        </body></html>";

    const DOC_2022: &str = "<p>(in millions)</p><p>Total assets $ 5</p>";

    /// Registry serving canned documents; URLs listed in `failing` error out.
    #[derive(Debug, Default)]
    struct FakeRegistry {
        filings: HashMap<String, Vec<FilingDescriptor>>,
        documents: HashMap<String, String>,
        failing: HashSet<String>,
        unlisted: HashSet<String>,
        fetches: Mutex<Vec<String>>,
    }

    impl FakeRegistry {
        fn with_filing(mut self, ticker: &str, accession: &str, date: (i32, u32, u32), body: &str) -> Self {
            let url = format!("https://fake/{ticker}/{accession}.htm");
            let descriptor = FilingDescriptor::annual(
                accession,
                NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            )
            .with_document_url(&url);
            self.filings.entry(ticker.to_string()).or_default().push(descriptor);
            self.documents.insert(url, body.to_string());
            self
        }

        fn failing(mut self, ticker: &str, accession: &str) -> Self {
            self.failing.insert(format!("https://fake/{ticker}/{accession}.htm"));
            self
        }

        fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FilingRegistry for FakeRegistry {
        fn name(&self) -> &str {
            "fake"
        }

        async fn list_filings(&self, company: &Company) -> Result<Vec<FilingDescriptor>> {
            if self.unlisted.contains(company.ticker.as_str()) {
                return Err(Error::Fetch {
                    url: "https://fake/submissions".to_string(),
                    attempts: 3,
                    message: "HTTP 503".to_string(),
                });
            }
            Ok(self
                .filings
                .get(company.ticker.as_str())
                .cloned()
                .unwrap_or_default())
        }

        async fn get_document(&self, url: &str) -> Result<String> {
            self.fetches.lock().unwrap().push(url.to_string());
            if self.failing.contains(url) {
                return Err(Error::Fetch {
                    url: url.to_string(),
                    attempts: 3,
                    message: "connection reset".to_string(),
                });
            }
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Fetch {
                    url: url.to_string(),
                    attempts: 3,
                    message: "HTTP 404".to_string(),
                })
        }
    }

    /// Store whose filing writes always fail.
    #[derive(Debug, Default)]
    struct BrokenStore(InMemoryStore);

    #[async_trait]
    impl FilingStore for BrokenStore {
        async fn upsert_company(&self, company: &Company) -> Result<i64> {
            self.0.upsert_company(company).await
        }
        async fn upsert_filing(&self, _filing: &FilingRecord) -> Result<i64> {
            Err(Error::Storage("disk full".to_string()))
        }
        async fn upsert_metric(
            &self,
            filing_id: i64,
            metric: MetricName,
            value: Option<f64>,
            unit: &str,
        ) -> Result<()> {
            self.0.upsert_metric(filing_id, metric, value, unit).await
        }
        async fn upsert_keyword(
            &self,
            filing_id: i64,
            keyword: RiskKeyword,
            frequency: u32,
            section: &str,
            snippet: Option<&str>,
        ) -> Result<()> {
            self.0
                .upsert_keyword(filing_id, keyword, frequency, section, snippet)
                .await
        }
        async fn prune_keywords(&self, filing_id: i64, keep: &[(RiskKeyword, String)]) -> Result<usize> {
            self.0.prune_keywords(filing_id, keep).await
        }
        async fn companies(&self) -> Result<Vec<StoredCompany>> {
            self.0.companies().await
        }
        async fn filings(&self) -> Result<Vec<StoredFiling>> {
            self.0.filings().await
        }
        async fn metrics(&self, filing_id: i64) -> Result<Vec<StoredMetric>> {
            self.0.metrics(filing_id).await
        }
        async fn keywords(&self, filing_id: i64) -> Result<Vec<StoredKeyword>> {
            self.0.keywords(filing_id).await
        }
    }

    fn company(ticker: &str) -> Company {
        Company::new(Ticker::new(ticker).unwrap(), ticker, Cik::new(1))
    }

    fn acme_registry() -> FakeRegistry {
        FakeRegistry::default()
            .with_filing("ACME", "0000000001-24-000001", (2024, 2, 1), DOC_2023)
            .with_filing("ACME", "0000000001-22-000001", (2022, 11, 1), DOC_2022)
    }

    async fn snapshot(store: &dyn FilingStore) -> Vec<(StoredFiling, Extraction)> {
        let mut rows = Vec::new();
        for filing in store.filings().await.unwrap() {
            let metrics = store.metrics(filing.id).await.unwrap();
            let keywords = store.keywords(filing.id).await.unwrap();
            rows.push((
                filing,
                Extraction {
                    metrics: metrics.into_iter().map(|m| m.value).collect(),
                    keywords: keywords.into_iter().map(|k| k.hit).collect(),
                },
            ));
        }
        rows
    }

    #[tokio::test]
    async fn test_ingest_stores_metrics_and_keywords() {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = Orchestrator::new(Arc::new(acme_registry()), store.clone()).unwrap();

        let report = orchestrator.run(&[company("ACME")]).await;

        assert!(report.is_success(), "{report}");
        assert_eq!(report.filings_stored(), 2);
        assert_eq!(report.unit_ambiguous(), 0);

        let rows = snapshot(store.as_ref()).await;
        assert_eq!(rows.len(), 2);

        let (filing, extraction) = &rows[0];
        assert_eq!(filing.record.fiscal_year, 2023);
        assert_eq!(extraction.metric(MetricName::Revenue), Some(1_234_000.0));
        assert_eq!(extraction.metric(MetricName::NetIncome), Some(56_000.0));
        assert_eq!(extraction.metrics.len(), 5);

        let keywords: Vec<(RiskKeyword, u32)> = extraction
            .keywords
            .iter()
            .map(|k| (k.keyword, k.frequency))
            .collect();
        assert_eq!(
            keywords,
            vec![(RiskKeyword::Cybersecurity, 2), (RiskKeyword::Litigation, 1)]
        );
        assert!(extraction.keywords.iter().all(|k| k.snippet.is_some()));
        assert!(extraction.keywords.iter().all(|k| k.section == "Item 1A"));

        let (filing, extraction) = &rows[1];
        assert_eq!(filing.record.fiscal_year, 2022);
        assert_eq!(extraction.metric(MetricName::TotalAssets), Some(5_000_000.0));
    }

    #[tokio::test]
    async fn test_same_fiscal_year_keeps_newest_filing() {
        let store = Arc::new(InMemoryStore::new());
        // late filer: both filing dates infer fiscal year 2023
        let registry = Arc::new(
            FakeRegistry::default()
                .with_filing("ACME", "0000000001-23-000001", (2023, 4, 15), DOC_2022)
                .with_filing("ACME", "0000000001-24-000001", (2024, 3, 20), DOC_2023),
        );

        let report = Orchestrator::new(registry.clone(), store.clone())
            .unwrap()
            .run(&[company("ACME")])
            .await;

        assert_eq!(report.filings_stored(), 1);
        assert_eq!(report.filings_superseded(), 1);
        assert!(report.is_success());
        assert_eq!(report.outcomes[0].state, FilingState::Superseded);
        assert_eq!(report.outcomes[0].accession_number, "0000000001-23-000001");
        assert!(report.outcomes[0].error.as_deref().unwrap().contains("0000000001-24-000001"));
        assert_eq!(registry.fetch_count(), 1);

        let filings = store.filings().await.unwrap();
        assert_eq!(filings.len(), 1);
        assert_eq!(filings[0].record.accession_number, "0000000001-24-000001");
        assert_eq!(filings[0].record.fiscal_year, 2023);
    }

    #[tokio::test]
    async fn test_report_dates_separate_late_filings() {
        let store = Arc::new(InMemoryStore::new());
        let mut registry = FakeRegistry::default();
        for (accession, filed, period_end, body) in [
            ("0000000001-24-000001", (2024, 3, 20), (2023, 12, 31), DOC_2023),
            ("0000000001-23-000001", (2023, 4, 15), (2022, 12, 31), DOC_2022),
        ] {
            let url = format!("https://fake/ACME/{accession}.htm");
            let descriptor = FilingDescriptor::annual(
                accession,
                NaiveDate::from_ymd_opt(filed.0, filed.1, filed.2).unwrap(),
            )
            .with_report_date(NaiveDate::from_ymd_opt(period_end.0, period_end.1, period_end.2).unwrap())
            .with_document_url(&url);
            registry.filings.entry("ACME".to_string()).or_default().push(descriptor);
            registry.documents.insert(url, body.to_string());
        }

        let report = Orchestrator::new(Arc::new(registry), store.clone())
            .unwrap()
            .run(&[company("ACME")])
            .await;

        assert_eq!(report.filings_stored(), 2);
        let years: Vec<i32> = store
            .filings()
            .await
            .unwrap()
            .iter()
            .map(|f| f.record.fiscal_year)
            .collect();
        assert_eq!(years, vec![2023, 2022]);
    }

    #[tokio::test]
    async fn test_missing_metrics_are_stored_as_null() {
        let store = Arc::new(InMemoryStore::new());
        let registry = FakeRegistry::default().with_filing(
            "ACME",
            "0000000001-24-000001",
            (2024, 2, 1),
            "Nothing numeric in this filing.",
        );
        let report = Orchestrator::new(Arc::new(registry), store.clone())
            .unwrap()
            .run(&[company("ACME")])
            .await;

        assert_eq!(report.filings_stored(), 1);
        assert_eq!(report.metrics_null(), 5);
        assert_eq!(report.unit_ambiguous(), 1);

        let filing = &store.filings().await.unwrap()[0];
        assert!(filing.record.unit_ambiguous);
        let metrics = store.metrics(filing.id).await.unwrap();
        assert_eq!(metrics.len(), 5);
        assert!(metrics.iter().all(|m| m.value.value.is_none()));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = Arc::new(tenk_store::SqliteStore::in_memory().unwrap());
        let orchestrator = Orchestrator::new(Arc::new(acme_registry()), store.clone()).unwrap();

        orchestrator.run(&[company("ACME")]).await;
        let first = snapshot(store.as_ref()).await;

        orchestrator.run(&[company("ACME")]).await;
        let second = snapshot(store.as_ref()).await;

        assert_eq!(first.len(), second.len());
        assert_eq!(store.companies().await.unwrap().len(), 1);
        for ((f1, e1), (f2, e2)) in first.iter().zip(&second) {
            assert_eq!(f1.id, f2.id);
            assert_eq!(f1.record, f2.record);
            assert_eq!(e1, e2);
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let store = Arc::new(InMemoryStore::new());
        let registry = acme_registry()
            .failing("ACME", "0000000001-24-000001")
            .with_filing("BETA", "0000000002-24-000001", (2024, 5, 1), DOC_2022);

        let report = Orchestrator::new(Arc::new(registry), store.clone())
            .unwrap()
            .run(&[company("ACME"), company("BETA")])
            .await;

        assert!(!report.is_success());
        assert_eq!(report.filings_stored(), 2);
        assert_eq!(report.filings_failed(), 1);

        let failed: Vec<&FilingOutcome> = report.failed().collect();
        assert_eq!(failed[0].state, FilingState::FetchFailed);
        assert_eq!(failed[0].accession_number, "0000000001-24-000001");
        assert!(failed[0].error.as_deref().unwrap().contains("connection reset"));

        // no filing row for the failed document
        let filings = store.filings().await.unwrap();
        assert_eq!(filings.len(), 2);
        assert!(
            filings
                .iter()
                .all(|f| f.record.accession_number != "0000000001-24-000001")
        );
    }

    #[tokio::test]
    async fn test_parse_failure_stores_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let registry = FakeRegistry::default()
            .with_filing("ACME", "0000000001-24-000001", (2024, 2, 1), "binary\0blob")
            .with_filing("ACME", "0000000001-23-000001", (2023, 2, 1), DOC_2022);

        let report = Orchestrator::new(Arc::new(registry), store.clone())
            .unwrap()
            .run(&[company("ACME")])
            .await;

        assert_eq!(report.outcomes[0].state, FilingState::ParseFailed);
        assert_eq!(report.outcomes[1].state, FilingState::Stored);
        assert_eq!(store.filings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_url_is_fetch_failure() {
        let mut registry = FakeRegistry::default();
        registry.filings.insert(
            "ACME".to_string(),
            vec![FilingDescriptor::annual(
                "0000000001-24-000001",
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            )],
        );
        let registry = Arc::new(registry);

        let report = Orchestrator::new(registry.clone(), Arc::new(InMemoryStore::new()))
            .unwrap()
            .run(&[company("ACME")])
            .await;

        assert_eq!(report.outcomes[0].state, FilingState::FetchFailed);
        assert_eq!(registry.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_recorded() {
        let report = Orchestrator::new(Arc::new(acme_registry()), Arc::new(BrokenStore::default()))
            .unwrap()
            .run(&[company("ACME")])
            .await;

        assert_eq!(report.filings_failed(), 2);
        assert!(report.failed().all(|o| o.state == FilingState::StoreFailed));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_listing_failure_is_company_failure() {
        let mut registry = acme_registry();
        registry.unlisted.insert("ACME".to_string());

        let report = Orchestrator::new(Arc::new(registry), Arc::new(InMemoryStore::new()))
            .unwrap()
            .run(&[company("ACME")])
            .await;

        assert!(report.outcomes.is_empty());
        assert_eq!(report.company_failures.len(), 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_stop_signal_skips_remaining_filings() {
        let registry = Arc::new(acme_registry());
        let orchestrator =
            Orchestrator::new(registry.clone(), Arc::new(InMemoryStore::new())).unwrap();

        // stop after the first filing finishes
        let stop = orchestrator.stop_signal();
        let orchestrator = orchestrator.on_progress(Arc::new(move |_: &FilingOutcome| stop.request_stop()));

        let report = orchestrator.run(&[company("ACME"), company("BETA")]).await;

        assert_eq!(report.filings_stored(), 1);
        assert_eq!(report.filings_skipped(), 1);
        assert_eq!(report.outcomes[1].state, FilingState::Skipped);
        assert_eq!(report.companies_skipped.len(), 1);
        assert_eq!(registry.fetch_count(), 1);
        assert!(report.is_success());
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_concurrent_workers_preserve_listing_order() {
        let store = Arc::new(InMemoryStore::new());
        let mut registry = FakeRegistry::default();
        for year in 2019..2024 {
            registry = registry.with_filing(
                "ACME",
                &format!("0000000001-{}-000001", year % 100),
                (year, 6, 1),
                DOC_2022,
            );
        }

        let report = Orchestrator::new(Arc::new(registry), store.clone())
            .unwrap()
            .with_concurrency(4)
            .unwrap()
            .run(&[company("ACME")])
            .await;

        let years: Vec<i32> = report.outcomes.iter().map(|o| o.fiscal_year).collect();
        assert_eq!(years, vec![2019, 2020, 2021, 2022, 2023]);
        assert_eq!(store.filings().await.unwrap().len(), 5);
    }

    #[test]
    fn test_concurrency_bounds() {
        let make = || {
            Orchestrator::new(
                Arc::new(FakeRegistry::default()),
                Arc::new(InMemoryStore::new()),
            )
            .unwrap()
        };
        assert!(make().with_concurrency(0).is_err());
        assert!(make().with_concurrency(5).is_err());
        assert!(make().with_concurrency(4).is_ok());
    }

    #[test]
    fn test_state_machine() {
        use FilingState::*;

        assert!(Pending.can_transition_to(Fetched));
        assert!(Pending.can_transition_to(FetchFailed));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Fetched.can_transition_to(ParseFailed));
        assert!(Parsed.can_transition_to(Stored));
        assert!(!Pending.can_transition_to(Stored));
        assert!(!Stored.can_transition_to(Pending));
        assert!(!FetchFailed.can_transition_to(Fetched));

        assert!(Pending.can_transition_to(Superseded));
        assert!(!Fetched.can_transition_to(Superseded));

        for state in [Stored, ParseFailed, FetchFailed, StoreFailed, Skipped, Superseded] {
            assert!(state.is_terminal());
        }
        assert!(!Skipped.is_failure());
        assert!(!Superseded.is_failure());
        assert_eq!(ParseFailed.to_string(), "parse_failed");
    }

    #[test]
    fn test_report_summary() {
        let outcome = |state, found| FilingOutcome {
            ticker: Ticker::new("ACME").unwrap(),
            accession_number: "a".to_string(),
            fiscal_year: 2023,
            state,
            error: None,
            metrics_found: found,
            metrics_null: 5 - found,
            keywords: 2,
            unit_ambiguous: false,
        };
        let report = IngestReport {
            outcomes: vec![
                outcome(FilingState::Stored, 3),
                outcome(FilingState::FetchFailed, 0),
            ],
            ..Default::default()
        };

        // counters only include stored filings
        assert_eq!(report.metrics_null(), 2);
        assert_eq!(report.keywords_stored(), 2);
        assert_eq!(
            report.to_string(),
            "1 stored, 1 failed, 0 skipped, 0 superseded; metrics 3 found / 2 null; \
             2 keyword rows; 0 ambiguous unit(s); 0 company failure(s)"
        );
        assert!(report.is_complete());
    }
}

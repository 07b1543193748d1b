//! In-memory filing store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tenk_core::{
    Company, Error, Extraction, FilingRecord, FilingStore, FiscalPeriod, KeywordHit, MetricName,
    MetricValue, Result, RiskKeyword, StoredCompany, StoredFiling, StoredKeyword, StoredMetric,
    Ticker,
};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Key for filing rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FilingKey {
    company_id: i64,
    filing_type: String,
    fiscal_year: i32,
    fiscal_period: FiscalPeriod,
}

impl FilingKey {
    fn of(record: &FilingRecord) -> Self {
        Self {
            company_id: record.company_id,
            filing_type: record.filing_type.clone(),
            fiscal_year: record.fiscal_year,
            fiscal_period: record.fiscal_period,
        }
    }
}

/// Key for keyword rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeywordKey {
    filing_id: i64,
    keyword: RiskKeyword,
    section: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    companies: HashMap<Ticker, StoredCompany>,
    filings: HashMap<FilingKey, StoredFiling>,
    metrics: HashMap<(i64, MetricName), StoredMetric>,
    keywords: HashMap<KeywordKey, StoredKeyword>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn upsert_filing(&mut self, record: &FilingRecord, now: DateTime<Utc>) -> Result<i64> {
        if !self.companies.values().any(|c| c.id == record.company_id) {
            return Err(Error::Storage(format!(
                "Unknown company id {}",
                record.company_id
            )));
        }

        let key = FilingKey::of(record);
        if let Some(existing) = self.filings.get_mut(&key) {
            existing.record = record.clone();
            existing.updated_at = now;
            return Ok(existing.id);
        }

        let id = self.allocate_id();
        self.filings.insert(
            key,
            StoredFiling {
                id,
                record: record.clone(),
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn check_filing(&self, filing_id: i64) -> Result<()> {
        if self.filings.values().any(|f| f.id == filing_id) {
            Ok(())
        } else {
            Err(Error::Storage(format!("Unknown filing id {filing_id}")))
        }
    }

    fn upsert_metric(
        &mut self,
        filing_id: i64,
        metric: MetricName,
        value: Option<f64>,
        unit: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.check_filing(filing_id)?;
        self.metrics.insert(
            (filing_id, metric),
            StoredMetric {
                filing_id,
                value: MetricValue {
                    metric,
                    value,
                    unit: unit.to_string(),
                },
                updated_at: now,
            },
        );
        Ok(())
    }

    fn upsert_keyword(&mut self, filing_id: i64, hit: KeywordHit, now: DateTime<Utc>) -> Result<()> {
        self.check_filing(filing_id)?;
        let key = KeywordKey {
            filing_id,
            keyword: hit.keyword,
            section: hit.section.clone(),
        };
        self.keywords.insert(
            key,
            StoredKeyword {
                filing_id,
                hit,
                updated_at: now,
            },
        );
        Ok(())
    }

    fn prune_keywords(&mut self, filing_id: i64, keep: &[(RiskKeyword, String)]) -> usize {
        let before = self.keywords.len();
        self.keywords.retain(|key, _| {
            key.filing_id != filing_id
                || keep
                    .iter()
                    .any(|(k, s)| *k == key.keyword && *s == key.section)
        });
        before - self.keywords.len()
    }
}

/// Simple in-memory store for testing and development.
///
/// All rows live behind one `RwLock` and are lost when the store is dropped.
/// Ids are allocated from a single counter, so they are unique across tables.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilingStore for InMemoryStore {
    #[instrument(skip(self, company), fields(ticker = %company.ticker))]
    async fn upsert_company(&self, company: &Company) -> Result<i64> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        if let Some(existing) = state.companies.get_mut(&company.ticker) {
            existing.company = company.clone();
            existing.updated_at = now;
            return Ok(existing.id);
        }

        let id = state.allocate_id();
        state.companies.insert(
            company.ticker.clone(),
            StoredCompany {
                id,
                company: company.clone(),
                updated_at: now,
            },
        );
        debug!(id, "Inserted company");
        Ok(id)
    }

    #[instrument(skip(self, filing), fields(accession = %filing.accession_number))]
    async fn upsert_filing(&self, filing: &FilingRecord) -> Result<i64> {
        self.state.write().await.upsert_filing(filing, Utc::now())
    }

    #[instrument(skip(self, value, unit), fields(metric = %metric))]
    async fn upsert_metric(
        &self,
        filing_id: i64,
        metric: MetricName,
        value: Option<f64>,
        unit: &str,
    ) -> Result<()> {
        self.state
            .write()
            .await
            .upsert_metric(filing_id, metric, value, unit, Utc::now())
    }

    #[instrument(skip(self, frequency, snippet), fields(keyword = %keyword))]
    async fn upsert_keyword(
        &self,
        filing_id: i64,
        keyword: RiskKeyword,
        frequency: u32,
        section: &str,
        snippet: Option<&str>,
    ) -> Result<()> {
        let hit = KeywordHit {
            keyword,
            frequency,
            section: section.to_string(),
            snippet: snippet.map(str::to_string),
        };
        self.state
            .write()
            .await
            .upsert_keyword(filing_id, hit, Utc::now())
    }

    #[instrument(skip(self, keep))]
    async fn prune_keywords(&self, filing_id: i64, keep: &[(RiskKeyword, String)]) -> Result<usize> {
        Ok(self.state.write().await.prune_keywords(filing_id, keep))
    }

    #[instrument(skip(self, filing, extraction), fields(accession = %filing.accession_number))]
    async fn store_extraction(&self, filing: &FilingRecord, extraction: &Extraction) -> Result<i64> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let filing_id = state.upsert_filing(filing, now)?;
        for metric in &extraction.metrics {
            state.upsert_metric(filing_id, metric.metric, metric.value, &metric.unit, now)?;
        }

        let keep: Vec<(RiskKeyword, String)> = extraction
            .keywords
            .iter()
            .map(|k| (k.keyword, k.section.clone()))
            .collect();
        state.prune_keywords(filing_id, &keep);

        for hit in &extraction.keywords {
            state.upsert_keyword(filing_id, hit.clone(), now)?;
        }

        debug!(filing_id, "Stored extraction");
        Ok(filing_id)
    }

    async fn companies(&self) -> Result<Vec<StoredCompany>> {
        let state = self.state.read().await;
        let mut companies: Vec<StoredCompany> = state.companies.values().cloned().collect();
        companies.sort_by(|a, b| a.company.ticker.cmp(&b.company.ticker));
        Ok(companies)
    }

    async fn filings(&self) -> Result<Vec<StoredFiling>> {
        let state = self.state.read().await;
        let mut filings: Vec<StoredFiling> = state.filings.values().cloned().collect();
        filings.sort_by_key(|f| f.id);
        Ok(filings)
    }

    async fn metrics(&self, filing_id: i64) -> Result<Vec<StoredMetric>> {
        let state = self.state.read().await;
        let mut metrics: Vec<StoredMetric> = state
            .metrics
            .values()
            .filter(|m| m.filing_id == filing_id)
            .cloned()
            .collect();
        metrics.sort_by_key(|m| m.value.metric);
        Ok(metrics)
    }

    async fn keywords(&self, filing_id: i64) -> Result<Vec<StoredKeyword>> {
        let state = self.state.read().await;
        let mut keywords: Vec<StoredKeyword> = state
            .keywords
            .values()
            .filter(|k| k.filing_id == filing_id)
            .cloned()
            .collect();
        keywords.sort_by(|a, b| {
            b.hit
                .frequency
                .cmp(&a.hit.frequency)
                .then(a.hit.keyword.cmp(&b.hit.keyword))
        });
        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tenk_core::{Cik, FilingDescriptor, UnitScale};

    fn company(ticker: &str) -> Company {
        Company::new(Ticker::new(ticker).unwrap(), ticker, Cik::new(1))
    }

    fn record(company_id: i64, year: i32) -> FilingRecord {
        let descriptor = FilingDescriptor::annual(
            format!("0000000001-{}-000001", year % 100),
            NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
        );
        FilingRecord::annual(company_id, &descriptor, "https://x", UnitScale::Thousands, true)
    }

    #[tokio::test]
    async fn test_in_memory_company_upsert() {
        let store = InMemoryStore::new();
        let a = store.upsert_company(&company("MSFT")).await.unwrap();
        let b = store.upsert_company(&company("AAPL")).await.unwrap();
        let again = store.upsert_company(&company("msft")).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(a, again);

        let companies = store.companies().await.unwrap();
        let tickers: Vec<&str> = companies.iter().map(|c| c.company.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn test_in_memory_filing_keyed_by_fiscal_year() {
        let store = InMemoryStore::new();
        let company_id = store.upsert_company(&company("AAPL")).await.unwrap();

        let first = store.upsert_filing(&record(company_id, 2023)).await.unwrap();
        let other_year = store.upsert_filing(&record(company_id, 2022)).await.unwrap();
        let again = store.upsert_filing(&record(company_id, 2023)).await.unwrap();

        assert_ne!(first, other_year);
        assert_eq!(first, again);
        assert_eq!(store.filings().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_rejects_unknown_parents() {
        let store = InMemoryStore::new();
        assert!(store.upsert_filing(&record(42, 2023)).await.is_err());
        assert!(
            store
                .upsert_metric(7, MetricName::Revenue, None, "USD")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_in_memory_store_extraction_prunes_keywords() {
        let store = InMemoryStore::new();
        let company_id = store.upsert_company(&company("AAPL")).await.unwrap();
        let hit = |keyword, frequency| KeywordHit {
            keyword,
            frequency,
            section: "Item 1A".to_string(),
            snippet: None,
        };

        let extraction = Extraction {
            metrics: vec![MetricValue::usd(MetricName::Revenue, None)],
            keywords: vec![hit(RiskKeyword::Inflation, 4), hit(RiskKeyword::Climate, 1)],
        };
        let filing_id = store
            .store_extraction(&record(company_id, 2023), &extraction)
            .await
            .unwrap();

        let rerun = Extraction {
            keywords: vec![hit(RiskKeyword::Inflation, 5)],
            ..extraction
        };
        store
            .store_extraction(&record(company_id, 2023), &rerun)
            .await
            .unwrap();

        let keywords = store.keywords(filing_id).await.unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].hit.frequency, 5);

        let metrics = store.metrics(filing_id).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].value.value, None);
    }
}

//! SQLite-based filing store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::Mutex;
use tenk_core::{
    Cik, Company, Error, Extraction, FilingRecord, FilingStore, KeywordHit, MetricName,
    MetricValue, Result, RiskKeyword, StoredCompany, StoredFiling, StoredKeyword, StoredMetric,
};
use tracing::{debug, instrument};

/// SQLite-based store for ingestion results.
///
/// This store keeps companies, filings, metrics and risk keywords in a SQLite
/// database file. Every write is an `INSERT ... ON CONFLICT DO UPDATE` keyed
/// by the table's unique constraint, so re-ingesting a filing updates its
/// rows in place.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Storage(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Storage(e.to_string()))?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                cik TEXT NOT NULL,
                sector TEXT,
                industry TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS filings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                filing_type TEXT NOT NULL,
                filing_date TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                fiscal_period TEXT NOT NULL,
                accession_number TEXT NOT NULL,
                source_url TEXT NOT NULL,
                unit_scale TEXT NOT NULL,
                unit_ambiguous INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (company_id, filing_type, fiscal_year, fiscal_period)
            );

            CREATE TABLE IF NOT EXISTS financial_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filing_id INTEGER NOT NULL REFERENCES filings(id),
                metric_name TEXT NOT NULL,
                metric_value REAL,
                unit TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (filing_id, metric_name)
            );

            CREATE TABLE IF NOT EXISTS risk_keywords (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filing_id INTEGER NOT NULL REFERENCES filings(id),
                keyword TEXT NOT NULL,
                section TEXT NOT NULL,
                frequency INTEGER NOT NULL CHECK (frequency >= 0),
                context TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE (filing_id, keyword, section)
            );

            CREATE INDEX IF NOT EXISTS idx_filings_company
                ON filings(company_id);
            CREATE INDEX IF NOT EXISTS idx_metrics_filing
                ON financial_metrics(filing_id);
            CREATE INDEX IF NOT EXISTS idx_keywords_filing
                ON risk_keywords(filing_id);",
        )
        .map_err(|e| Error::Storage(e.to_string()))?;

        debug!("SQLite store schema initialized");
        Ok(())
    }

    /// Lock the connection.
    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| Error::Storage(e.to_string()))
    }
}

// =============================================================================
// Row writers, shared by the single-row methods and the transactional path
// =============================================================================

fn write_filing(conn: &Connection, filing: &FilingRecord, now: &str) -> Result<i64> {
    conn.query_row(
        "INSERT INTO filings
         (company_id, filing_type, filing_date, fiscal_year, fiscal_period,
          accession_number, source_url, unit_scale, unit_ambiguous, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT (company_id, filing_type, fiscal_year, fiscal_period) DO UPDATE SET
            filing_date = excluded.filing_date,
            accession_number = excluded.accession_number,
            source_url = excluded.source_url,
            unit_scale = excluded.unit_scale,
            unit_ambiguous = excluded.unit_ambiguous,
            updated_at = excluded.updated_at
         RETURNING id",
        params![
            filing.company_id,
            filing.filing_type,
            filing.filing_date.to_string(),
            filing.fiscal_year,
            filing.fiscal_period.as_str(),
            filing.accession_number,
            filing.source_url,
            filing.unit_scale.as_str(),
            filing.unit_ambiguous,
            now
        ],
        |row| row.get(0),
    )
    .map_err(|e| Error::Storage(e.to_string()))
}

fn write_metric(
    conn: &Connection,
    filing_id: i64,
    metric: MetricName,
    value: Option<f64>,
    unit: &str,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO financial_metrics (filing_id, metric_name, metric_value, unit, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (filing_id, metric_name) DO UPDATE SET
            metric_value = excluded.metric_value,
            unit = excluded.unit,
            updated_at = excluded.updated_at",
        params![filing_id, metric.as_str(), value, unit, now],
    )
    .map_err(|e| Error::Storage(e.to_string()))?;
    Ok(())
}

fn write_keyword(
    conn: &Connection,
    filing_id: i64,
    keyword: RiskKeyword,
    frequency: u32,
    section: &str,
    snippet: Option<&str>,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO risk_keywords (filing_id, keyword, section, frequency, context, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (filing_id, keyword, section) DO UPDATE SET
            frequency = excluded.frequency,
            context = excluded.context,
            updated_at = excluded.updated_at",
        params![filing_id, keyword.as_str(), section, frequency, snippet, now],
    )
    .map_err(|e| Error::Storage(e.to_string()))?;
    Ok(())
}

fn delete_stale_keywords(
    conn: &Connection,
    filing_id: i64,
    keep: &[(RiskKeyword, String)],
) -> Result<usize> {
    let mut stmt = conn
        .prepare("SELECT id, keyword, section FROM risk_keywords WHERE filing_id = ?1")
        .map_err(|e| Error::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(params![filing_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(|e| Error::Storage(e.to_string()))?;

    let mut stale = Vec::new();
    for row in rows {
        let (id, keyword, section) = row.map_err(|e| Error::Storage(e.to_string()))?;
        let kept = keep
            .iter()
            .any(|(k, s)| k.as_str() == keyword && *s == section);
        if !kept {
            stale.push(id);
        }
    }

    for id in &stale {
        conn.execute("DELETE FROM risk_keywords WHERE id = ?1", params![id])
            .map_err(|e| Error::Storage(e.to_string()))?;
    }

    Ok(stale.len())
}

// =============================================================================
// Row readers
// =============================================================================

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid timestamp {s}: {e}")))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Storage(format!("Invalid date {s}: {e}")))
}

/// Raw filing columns, converted after the statement finishes.
type FilingColumns = (i64, i64, String, String, i32, String, String, String, String, bool, String);

fn filing_columns(row: &Row<'_>) -> rusqlite::Result<FilingColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn stored_filing(columns: FilingColumns) -> Result<StoredFiling> {
    let (
        id,
        company_id,
        filing_type,
        filing_date,
        fiscal_year,
        fiscal_period,
        accession_number,
        source_url,
        unit_scale,
        unit_ambiguous,
        updated_at,
    ) = columns;

    Ok(StoredFiling {
        id,
        record: FilingRecord {
            company_id,
            filing_type,
            filing_date: parse_date(&filing_date)?,
            fiscal_year,
            fiscal_period: fiscal_period.parse()?,
            accession_number,
            source_url,
            unit_scale: unit_scale.parse()?,
            unit_ambiguous,
        },
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl FilingStore for SqliteStore {
    #[instrument(skip(self, company), fields(ticker = %company.ticker))]
    async fn upsert_company(&self, company: &Company) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.connection()?;

        let id = conn
            .query_row(
                "INSERT INTO companies (ticker, name, cik, sector, industry, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (ticker) DO UPDATE SET
                    name = excluded.name,
                    cik = excluded.cik,
                    sector = excluded.sector,
                    industry = excluded.industry,
                    updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    company.ticker.as_str(),
                    company.name,
                    company.cik.to_string(),
                    company.sector,
                    company.industry,
                    now
                ],
                |row| row.get(0),
            )
            .map_err(|e| Error::Storage(e.to_string()))?;

        debug!(id, "Upserted company");
        Ok(id)
    }

    #[instrument(skip(self, filing), fields(accession = %filing.accession_number))]
    async fn upsert_filing(&self, filing: &FilingRecord) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.connection()?;
        let id = write_filing(&conn, filing, &now)?;
        debug!(id, "Upserted filing");
        Ok(id)
    }

    #[instrument(skip(self, value, unit), fields(metric = %metric))]
    async fn upsert_metric(
        &self,
        filing_id: i64,
        metric: MetricName,
        value: Option<f64>,
        unit: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.connection()?;
        write_metric(&conn, filing_id, metric, value, unit, &now)
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
        let now = Utc::now().to_rfc3339();
        let conn = self.connection()?;
        write_keyword(&conn, filing_id, keyword, frequency, section, snippet, &now)
    }

    #[instrument(skip(self, keep))]
    async fn prune_keywords(&self, filing_id: i64, keep: &[(RiskKeyword, String)]) -> Result<usize> {
        let conn = self.connection()?;
        let removed = delete_stale_keywords(&conn, filing_id, keep)?;
        if removed > 0 {
            debug!(removed, "Pruned stale keyword rows");
        }
        Ok(removed)
    }

    #[instrument(skip(self, filing, extraction), fields(accession = %filing.accession_number))]
    async fn store_extraction(&self, filing: &FilingRecord, extraction: &Extraction) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.connection()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let filing_id = write_filing(&tx, filing, &now)?;

        for metric in &extraction.metrics {
            write_metric(&tx, filing_id, metric.metric, metric.value, &metric.unit, &now)?;
        }

        let keep: Vec<(RiskKeyword, String)> = extraction
            .keywords
            .iter()
            .map(|k| (k.keyword, k.section.clone()))
            .collect();
        delete_stale_keywords(&tx, filing_id, &keep)?;

        for hit in &extraction.keywords {
            write_keyword(
                &tx,
                filing_id,
                hit.keyword,
                hit.frequency,
                &hit.section,
                hit.snippet.as_deref(),
                &now,
            )?;
        }

        tx.commit().map_err(|e| Error::Storage(e.to_string()))?;
        debug!(
            filing_id,
            metrics = extraction.metrics.len(),
            keywords = extraction.keywords.len(),
            "Stored extraction"
        );
        Ok(filing_id)
    }

    #[instrument(skip(self))]
    async fn companies(&self) -> Result<Vec<StoredCompany>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, ticker, name, cik, sector, industry, updated_at
                 FROM companies ORDER BY ticker",
            )
            .map_err(|e| Error::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(|e| Error::Storage(e.to_string()))?;

        let mut companies = Vec::new();
        for row in rows {
            let (id, ticker, name, cik, sector, industry, updated_at) =
                row.map_err(|e| Error::Storage(e.to_string()))?;
            companies.push(StoredCompany {
                id,
                company: Company {
                    ticker: ticker.parse()?,
                    name,
                    cik: cik.parse::<Cik>()?,
                    sector,
                    industry,
                },
                updated_at: parse_timestamp(&updated_at)?,
            });
        }

        Ok(companies)
    }

    #[instrument(skip(self))]
    async fn filings(&self) -> Result<Vec<StoredFiling>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, company_id, filing_type, filing_date, fiscal_year, fiscal_period,
                        accession_number, source_url, unit_scale, unit_ambiguous, updated_at
                 FROM filings ORDER BY id",
            )
            .map_err(|e| Error::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], filing_columns)
            .map_err(|e| Error::Storage(e.to_string()))?;

        let mut filings = Vec::new();
        for row in rows {
            let columns = row.map_err(|e| Error::Storage(e.to_string()))?;
            filings.push(stored_filing(columns)?);
        }

        debug!("Found {} stored filings", filings.len());
        Ok(filings)
    }

    #[instrument(skip(self))]
    async fn metrics(&self, filing_id: i64) -> Result<Vec<StoredMetric>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT metric_name, metric_value, unit, updated_at
                 FROM financial_metrics WHERE filing_id = ?1",
            )
            .map_err(|e| Error::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![filing_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| Error::Storage(e.to_string()))?;

        let mut metrics = Vec::new();
        for row in rows {
            let (name, value, unit, updated_at) = row.map_err(|e| Error::Storage(e.to_string()))?;
            metrics.push(StoredMetric {
                filing_id,
                value: MetricValue {
                    metric: name.parse()?,
                    value,
                    unit,
                },
                updated_at: parse_timestamp(&updated_at)?,
            });
        }

        metrics.sort_by_key(|m| m.value.metric);
        Ok(metrics)
    }

    #[instrument(skip(self))]
    async fn keywords(&self, filing_id: i64) -> Result<Vec<StoredKeyword>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT keyword, frequency, section, context, updated_at
                 FROM risk_keywords WHERE filing_id = ?1",
            )
            .map_err(|e| Error::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![filing_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| Error::Storage(e.to_string()))?;

        let mut keywords = Vec::new();
        for row in rows {
            let (keyword, frequency, section, snippet, updated_at) =
                row.map_err(|e| Error::Storage(e.to_string()))?;
            keywords.push(StoredKeyword {
                filing_id,
                hit: KeywordHit {
                    keyword: keyword.parse()?,
                    frequency,
                    section,
                    snippet,
                },
                updated_at: parse_timestamp(&updated_at)?,
            });
        }

        keywords.sort_by(|a, b| {
            b.hit
                .frequency
                .cmp(&a.hit.frequency)
                .then(a.hit.keyword.cmp(&b.hit.keyword))
        });
        Ok(keywords)
    }
}

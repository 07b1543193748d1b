//! Tabular views of stored results.

use polars::prelude::*;
use std::collections::HashMap;
use tenk_core::{Error, FilingStore, Result};

/// Ticker and fiscal year of every stored filing, by filing id.
async fn filing_labels(store: &dyn FilingStore) -> Result<Vec<(i64, String, i32)>> {
    let tickers: HashMap<i64, String> = store
        .companies()
        .await?
        .into_iter()
        .map(|c| (c.id, c.company.ticker.to_string()))
        .collect();

    let mut labels: Vec<(i64, String, i32)> = store
        .filings()
        .await?
        .into_iter()
        .map(|f| {
            let ticker = tickers
                .get(&f.record.company_id)
                .cloned()
                .unwrap_or_default();
            (f.id, ticker, f.record.fiscal_year)
        })
        .collect();

    // ticker ascending, most recent year first
    labels.sort_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)));
    Ok(labels)
}

/// Stored metrics as a `DataFrame` with columns
/// `ticker`, `fiscal_year`, `metric`, `value` and `unit`.
///
/// Metrics that were not found have a null `value`.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub async fn metrics_frame(store: &dyn FilingStore) -> Result<DataFrame> {
    let mut tickers = Vec::new();
    let mut years = Vec::new();
    let mut names = Vec::new();
    let mut values: Vec<Option<f64>> = Vec::new();
    let mut units = Vec::new();

    for (filing_id, ticker, year) in filing_labels(store).await? {
        for metric in store.metrics(filing_id).await? {
            tickers.push(ticker.clone());
            years.push(year);
            names.push(metric.value.metric.as_str().to_string());
            values.push(metric.value.value);
            units.push(metric.value.unit);
        }
    }

    DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        Column::new("fiscal_year".into(), years),
        Column::new("metric".into(), names),
        Column::new("value".into(), values),
        Column::new("unit".into(), units),
    ])
    .map_err(|e| Error::Storage(e.to_string()))
}

/// Stored risk keywords as a `DataFrame` with columns
/// `ticker`, `fiscal_year`, `keyword`, `frequency` and `section`.
///
/// # Errors
/// Returns an error if the store cannot be read.
pub async fn keywords_frame(store: &dyn FilingStore) -> Result<DataFrame> {
    let mut tickers = Vec::new();
    let mut years = Vec::new();
    let mut keywords = Vec::new();
    let mut frequencies = Vec::new();
    let mut sections = Vec::new();

    for (filing_id, ticker, year) in filing_labels(store).await? {
        for row in store.keywords(filing_id).await? {
            tickers.push(ticker.clone());
            years.push(year);
            keywords.push(row.hit.keyword.as_str().to_string());
            frequencies.push(i64::from(row.hit.frequency));
            sections.push(row.hit.section);
        }
    }

    DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        Column::new("fiscal_year".into(), years),
        Column::new("keyword".into(), keywords),
        Column::new("frequency".into(), frequencies),
        Column::new("section".into(), sections),
    ])
    .map_err(|e| Error::Storage(e.to_string()))
}

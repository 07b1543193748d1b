//! Financial metric extraction.
//!
//! Each tracked metric has an ordered list of label patterns, most specific
//! first, and optional exclusion patterns. Candidates come from two places:
//!
//! - table rows whose label starts with a pattern (the row's first amount
//!   is the candidate, which is the current-year column in 10-K statements)
//! - running text where a label is immediately followed by an amount
//!
//! Among all candidates the largest by absolute value wins. This picks the
//! consolidated total over segment subtotals, and is known to misattribute a
//! large segment figure or a prior-year column in some filings.

use regex::Regex;
use tenk_core::{Error, MetricName, MetricValue, Result, UnitScale};
use tracing::debug;

use crate::document::Document;
use crate::numbers::parse_amount;

/// Amount following a label in running text.
const TEXT_AMOUNT: &str =
    r"\s*:?\s*(?P<amount>\$?\s*\(?\s*[-\x{2212}]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?\s*\)?)";

/// Text before a label match checked against exclusions.
const CONTEXT_BYTES: usize = 40;

/// A label pattern and where it applies.
#[derive(Clone, Copy, Debug)]
struct LabelSpec {
    pattern: &'static str,
    tables_only: bool,
}

const fn label(pattern: &'static str) -> LabelSpec {
    LabelSpec {
        pattern,
        tables_only: false,
    }
}

const fn table_label(pattern: &'static str) -> LabelSpec {
    LabelSpec {
        pattern,
        tables_only: true,
    }
}

const REVENUE_LABELS: &[LabelSpec] = &[
    label(r"total\s+net\s+revenues?"),
    label(r"total\s+revenues?"),
    label(r"total\s+net\s+sales"),
    label(r"net\s+revenues?"),
    label(r"net\s+sales"),
    table_label(r"revenues?"),
];

const NET_INCOME_LABELS: &[LabelSpec] = &[
    label(r"net\s+income\s+attributable\s+to"),
    label(r"net\s+income\s*\(loss\)"),
    label(r"net\s+income"),
    label(r"net\s+earnings"),
    table_label(r"net\s+loss"),
];

const TOTAL_ASSETS_LABELS: &[LabelSpec] = &[label(r"total\s+assets")];

const TOTAL_LIABILITIES_LABELS: &[LabelSpec] = &[label(r"total\s+liabilities")];

const CASH_LABELS: &[LabelSpec] = &[
    label(r"cash\s+and\s+cash\s+equivalents"),
    label(r"cash,?\s+cash\s+equivalents"),
    label(r"cash\s+and\s+equivalents"),
];

const fn label_specs(metric: MetricName) -> &'static [LabelSpec] {
    match metric {
        MetricName::Revenue => REVENUE_LABELS,
        MetricName::NetIncome => NET_INCOME_LABELS,
        MetricName::TotalAssets => TOTAL_ASSETS_LABELS,
        MetricName::TotalLiabilities => TOTAL_LIABILITIES_LABELS,
        MetricName::CashAndEquivalents => CASH_LABELS,
    }
}

fn exclusion_specs(metric: MetricName) -> &'static [&'static str] {
    match metric {
        MetricName::Revenue => &[r"\bcost\s+of\b", r"\bper\s+share\b"],
        MetricName::NetIncome => &[
            r"\bper\s+(?:basic\s+|diluted\s+)?(?:common\s+)?share\b",
            r"\bmargin\b",
            r"\bnon-?controlling\b",
        ],
        MetricName::TotalAssets => &[r"\bacquired\b"],
        MetricName::TotalLiabilities => &[r"\bequity\b", r"\bdeficit\b"],
        MetricName::CashAndEquivalents => &[r"\bbeginning\s+of\b"],
    }
}

#[derive(Debug)]
struct MetricRule {
    metric: MetricName,
    row_labels: Vec<Regex>,
    text_labels: Vec<Regex>,
    exclusions: Vec<Regex>,
}

impl MetricRule {
    fn compile(metric: MetricName) -> Result<Self> {
        let build = |source: String| {
            Regex::new(&source)
                .map_err(|e| Error::Config(format!("Invalid pattern for {metric}: {e}")))
        };

        let specs = label_specs(metric);
        let row_labels = specs
            .iter()
            .map(|s| build(format!(r"(?i)^(?:{})(?:[^a-z]|$)", s.pattern)))
            .collect::<Result<Vec<_>>>()?;
        let text_labels = specs
            .iter()
            .filter(|s| !s.tables_only)
            .map(|s| build(format!(r"(?i)\b(?:{}){TEXT_AMOUNT}", s.pattern)))
            .collect::<Result<Vec<_>>>()?;
        let exclusions = exclusion_specs(metric)
            .iter()
            .map(|p| build(format!("(?i){p}")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            metric,
            row_labels,
            text_labels,
            exclusions,
        })
    }

    fn claims_label(&self, label: &str) -> bool {
        self.row_labels.iter().any(|r| r.is_match(label))
            && !self.exclusions.iter().any(|r| r.is_match(label))
    }

    fn candidates(&self, document: &Document) -> Vec<f64> {
        let mut candidates = Vec::new();

        for table in document.tables() {
            for row in &table.rows {
                let Some(label) = row.label() else { continue };
                if self.claims_label(label) {
                    if let Some(amount) = row.first_amount() {
                        candidates.push(amount);
                    }
                }
            }
        }

        let text = document.text();
        for regex in &self.text_labels {
            for caps in regex.captures_iter(text) {
                let (Some(whole), Some(amount)) = (caps.get(0), caps.name("amount")) else {
                    continue;
                };
                let context = leading_context(text, whole.start(), whole.end());
                if self.exclusions.iter().any(|r| r.is_match(context)) {
                    continue;
                }
                if let Some(value) = parse_amount(amount.as_str()) {
                    candidates.push(value);
                }
            }
        }

        candidates
    }
}

/// Extracts the tracked financial metrics from a document.
#[derive(Debug)]
pub struct MetricExtractor {
    rules: Vec<MetricRule>,
}

impl MetricExtractor {
    /// Compiles the label patterns of every tracked metric.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        let rules = MetricName::ALL
            .into_iter()
            .map(MetricRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Extracts one metric, in canonical USD.
    ///
    /// Returns `None` when no label matched an amount.
    #[must_use]
    pub fn extract(&self, document: &Document, scale: UnitScale, metric: MetricName) -> Option<f64> {
        let rule = self.rules.iter().find(|r| r.metric == metric)?;
        let candidates = rule.candidates(document);
        let chosen = select_largest(&candidates)?;

        debug!(
            metric = %metric,
            candidates = candidates.len(),
            raw = chosen,
            scale = %scale,
            "Selected metric value"
        );

        Some(scale.to_usd(chosen))
    }

    /// Extracts every tracked metric. The result always has one entry per
    /// metric, with `None` for metrics that were not found.
    #[must_use]
    pub fn extract_all(&self, document: &Document, scale: UnitScale) -> Vec<MetricValue> {
        MetricName::ALL
            .into_iter()
            .map(|metric| MetricValue::usd(metric, self.extract(document, scale, metric)))
            .collect()
    }
}

/// The match plus up to [`CONTEXT_BYTES`] of the same line before it.
fn leading_context(text: &str, start: usize, end: usize) -> &str {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let mut from = start.saturating_sub(CONTEXT_BYTES).max(line_start);
    while !text.is_char_boundary(from) {
        from += 1;
    }
    &text[from..end]
}

/// The candidate with the largest absolute value.
fn select_largest(candidates: &[f64]) -> Option<f64> {
    candidates
        .iter()
        .copied()
        .reduce(|best, c| if c.abs() > best.abs() { c } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::detect_unit;

    fn extractor() -> MetricExtractor {
        MetricExtractor::new().unwrap()
    }

    fn run(raw: &str, metric: MetricName) -> Option<f64> {
        let doc = Document::parse(raw).unwrap();
        let unit = detect_unit(&doc);
        extractor().extract(&doc, unit.scale, metric)
    }

    #[test]
    fn test_thousands_table_value() {
        let html = "<p>(In thousands)</p>\
            <table><tr><td>Total revenues</td><td>$</td><td>1,234</td><td>$</td><td>999</td></tr></table>";
        assert_eq!(run(html, MetricName::Revenue), Some(1_234_000.0));
    }

    #[test]
    fn test_millions_text_value() {
        assert_eq!(
            run("(in millions)\nTotal revenues $ 5", MetricName::Revenue),
            Some(5_000_000.0)
        );
    }

    #[test]
    fn test_largest_candidate_wins() {
        let html = "<table>\
            <tr><td>Net revenues</td><td>1,000,000</td></tr>\
            <tr><td>Total net revenues</td><td>50,000,000</td></tr>\
            </table>";
        assert_eq!(run(html, MetricName::Revenue), Some(50_000_000.0));
    }

    #[test]
    fn test_negative_net_income() {
        let html = "<p>(in thousands)</p><table>\
            <tr><td>Net loss</td><td>(56</td><td>)</td><td>(12</td><td>)</td></tr>\
            <tr><td>Net loss per share</td><td>(0.45</td><td>)</td></tr>\
            </table>";
        assert_eq!(run(html, MetricName::NetIncome), Some(-56_000.0));
    }

    #[test]
    fn test_net_loss_with_split_parentheses() {
        let html = "<table>\
            <tr><td>Net loss</td><td>$</td><td>(</td><td>1,000</td><td>)</td></tr>\
            </table>";
        assert_eq!(run(html, MetricName::NetIncome), Some(-1_000.0));
    }

    #[test]
    fn test_exclusions() {
        let html = "<table>\
            <tr><td>Total liabilities</td><td>290,437</td></tr>\
            <tr><td>Total liabilities and shareholders' equity</td><td>352,583</td></tr>\
            <tr><td>Net income per diluted share</td><td>6,130</td></tr>\
            <tr><td>Net income</td><td>96,995</td></tr>\
            <tr><td>Cost of net sales</td><td>900,000</td></tr>\
            <tr><td>Net sales</td><td>383,285</td></tr>\
            </table>";
        assert_eq!(run(html, MetricName::TotalLiabilities), Some(290_437.0));
        assert_eq!(run(html, MetricName::NetIncome), Some(96_995.0));
        assert_eq!(run(html, MetricName::Revenue), Some(383_285.0));
    }

    #[test]
    fn test_bare_revenue_label_only_in_tables() {
        let table = "<table><tr><td>Revenues</td><td>7,000</td></tr></table>";
        assert_eq!(run(table, MetricName::Revenue), Some(7_000.0));

        assert_eq!(run("Revenues 7,000 were recognized", MetricName::Revenue), None);
    }

    #[test]
    fn test_years_are_skipped() {
        let html = "<table>\
            <tr><td>Total assets</td><td>2023</td><td>2022</td></tr>\
            <tr><td>Total assets</td><td>352,755</td><td>352,583</td></tr>\
            </table>";
        assert_eq!(run(html, MetricName::TotalAssets), Some(352_755.0));
    }

    #[test]
    fn test_extract_all_reports_missing_as_none() {
        let doc = Document::parse("(in millions)\nTotal assets $ 10\nCash and cash equivalents: 2").unwrap();
        let values = extractor().extract_all(&doc, UnitScale::Millions);

        assert_eq!(values.len(), MetricName::ALL.len());
        let get = |m: MetricName| values.iter().find(|v| v.metric == m).unwrap().value;
        assert_eq!(get(MetricName::TotalAssets), Some(10_000_000.0));
        assert_eq!(get(MetricName::CashAndEquivalents), Some(2_000_000.0));
        assert_eq!(get(MetricName::Revenue), None);
        assert_eq!(get(MetricName::NetIncome), None);
        assert!(values.iter().all(|v| v.unit == "USD"));
    }

    #[test]
    fn test_leading_context() {
        let text = "first line\nCost of net sales 900";
        let start = text.find("net sales").unwrap();
        assert_eq!(leading_context(text, start, text.len()), "Cost of net sales 900");
    }

    #[test]
    fn test_select_largest() {
        assert_eq!(select_largest(&[]), None);
        assert_eq!(select_largest(&[3.0, -10.0, 7.0]), Some(-10.0));
        assert_eq!(select_largest(&[1.0, 1.0]), Some(1.0));
    }
}

//! Risk keyword scanning.
//!
//! The scanner counts each [`RiskKeyword`] bucket inside the Item 1A (Risk
//! Factors) section of a 10-K. When no such section can be located the whole
//! document is scanned and the hits are labeled accordingly.

use regex::Regex;
use tenk_core::{Error, KeywordHit, Result, RiskKeyword};
use tracing::debug;

/// Section label for hits found in Item 1A.
pub const SECTION_RISK_FACTORS: &str = "Item 1A";

/// Section label for hits found by scanning the whole document.
pub const SECTION_FULL_DOCUMENT: &str = "Full Document";

/// Maximum snippet length, in characters.
pub const SNIPPET_CHARS: usize = 300;

const RISK_FACTORS_HEADING: &str =
    r"(?im)^[ \t]*item\s*1a\b\.?\s*[:.\-\x{2013}\x{2014}]?\s*risk\s+factors";
const ITEM_HEADING: &str = r"(?im)^[ \t]*item\s*(\d{1,2}[a-c]?)\b";

/// The part of a document that was scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Section<'a> {
    /// Section label stored with each hit.
    pub label: &'static str,
    /// Section text.
    pub text: &'a str,
}

/// Counts risk keyword buckets in document text.
#[derive(Debug)]
pub struct KeywordScanner {
    buckets: Vec<(RiskKeyword, Regex)>,
    risk_factors: Regex,
    item_heading: Regex,
}

impl KeywordScanner {
    /// Compiles the bucket and heading patterns.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        let compile = |source: &str| {
            Regex::new(source).map_err(|e| Error::Config(format!("Invalid keyword pattern: {e}")))
        };

        let buckets = RiskKeyword::ALL
            .into_iter()
            .map(|keyword| {
                // alternation is leftmost-first, so longer terms listed first win
                let terms: Vec<String> = keyword.terms().iter().map(|t| regex::escape(t)).collect();
                compile(&format!("(?i)(?:{})", terms.join("|"))).map(|r| (keyword, r))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            buckets,
            risk_factors: compile(RISK_FACTORS_HEADING)?,
            item_heading: compile(ITEM_HEADING)?,
        })
    }

    /// Locates the Item 1A section.
    ///
    /// Every "Item 1A. Risk Factors" heading starts a candidate that runs to
    /// the next item heading. The longest candidate wins, which skips the
    /// table of contents entry. Without any heading the whole text is used.
    #[must_use]
    pub fn locate_section<'a>(&self, text: &'a str) -> Section<'a> {
        let longest = self
            .risk_factors
            .find_iter(text)
            .map(|start| {
                let body = start.end();
                let end = self
                    .item_heading
                    .captures_iter(&text[body..])
                    .filter(|caps| {
                        caps.get(1)
                            .is_some_and(|id| !id.as_str().eq_ignore_ascii_case("1a"))
                    })
                    .find_map(|caps| caps.get(0))
                    .map_or(text.len(), |m| body + m.start());
                (start.start(), end)
            })
            .max_by_key(|(start, end)| end - start);

        match longest {
            Some((start, end)) => Section {
                label: SECTION_RISK_FACTORS,
                text: &text[start..end],
            },
            None => Section {
                label: SECTION_FULL_DOCUMENT,
                text,
            },
        }
    }

    /// Scans document text for risk keywords.
    ///
    /// Buckets without matches are omitted. Hits are ordered by frequency,
    /// highest first, then by vocabulary order.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<KeywordHit> {
        let section = self.locate_section(text);
        debug!(
            section = section.label,
            chars = section.text.len(),
            "Scanning for risk keywords"
        );

        let mut hits: Vec<KeywordHit> = self
            .buckets
            .iter()
            .filter_map(|(keyword, regex)| {
                let mut matches = regex.find_iter(section.text);
                let first = matches.next()?;
                let count = 1 + matches.count();
                Some(KeywordHit {
                    keyword: *keyword,
                    frequency: u32::try_from(count).unwrap_or(u32::MAX),
                    section: section.label.to_string(),
                    snippet: Some(snippet(section.text, first.start(), first.end())),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        hits
    }
}

/// The sentence containing `start..end`, whitespace-collapsed and truncated.
fn snippet(text: &str, start: usize, end: usize) -> String {
    let is_boundary = |c: char| matches!(c, '.' | '!' | '?' | '\n');

    let from = text[..start]
        .rfind(is_boundary)
        .map_or(0, |i| i + 1);
    let to = text[end..]
        .find(is_boundary)
        .map_or(text.len(), |i| {
            let at = end + i;
            // keep the terminating punctuation, but not a line break
            if text[at..].starts_with('\n') { at } else { at + 1 }
        });

    let sentence = text[from..to].split_whitespace().collect::<Vec<_>>().join(" ");
    sentence.chars().take(SNIPPET_CHARS).collect()
}

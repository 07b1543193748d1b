//! Raw filing document to text and table rows.
//!
//! 10-K documents are HTML (often inline XBRL). Parsing keeps the readable
//! text, one line per block element, and collects every table row as a list
//! of cell strings together with the text that precedes the table.

use scraper::{ElementRef, Html};
use tenk_core::{Error, Result};

use crate::numbers::parse_amount;

/// Number of characters before a table kept as its caption.
pub const CAPTION_CHARS: usize = 400;

/// Elements whose content is never text.
const SKIPPED: &[&str] = &["script", "style", "noscript", "head", "ix:header"];

/// Elements that start a new line of text.
const BLOCKS: &[&str] = &[
    "p", "div", "br", "tr", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "table",
    "section", "article", "center", "hr", "dt", "dd", "pre", "blockquote",
];

/// A parsed filing document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    text: String,
    tables: Vec<Table>,
}

/// A table found in a document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    /// Text immediately preceding the table.
    pub caption: String,
    /// Rows with at least one non-empty cell.
    pub rows: Vec<TableRow>,
}

/// One table row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableRow {
    /// Non-empty cell texts, whitespace-collapsed.
    pub cells: Vec<String>,
}

impl TableRow {
    /// Creates a row from cell texts.
    #[must_use]
    pub fn new<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    /// The row label: the first cell that is not an amount.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.cells
            .iter()
            .map(String::as_str)
            .find(|c| parse_amount(c).is_none())
    }

    /// The first amount following the label.
    #[must_use]
    pub fn first_amount(&self) -> Option<f64> {
        let label_at = self.cells.iter().position(|c| parse_amount(c).is_none())?;
        self.cells[label_at + 1..].iter().find_map(|c| parse_amount(c))
    }
}

impl Document {
    /// Parses a raw document.
    ///
    /// Content without markup is treated as plain text and has no tables.
    ///
    /// # Errors
    /// Returns [`Error::Parse`] if the content contains NUL bytes or has no
    /// text once markup is removed.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.contains('\0') {
            return Err(Error::Parse("document contains NUL bytes".to_string()));
        }

        let document = if raw.contains('<') {
            let html = Html::parse_document(raw);
            let mut out = TextBuilder::default();
            let mut tables = Vec::new();
            walk(html.root_element(), &mut out, &mut tables, false);
            Self {
                text: out.finish(),
                tables,
            }
        } else {
            let mut out = TextBuilder::default();
            for line in raw.lines() {
                out.push_text(line);
                out.newline();
            }
            Self {
                text: out.finish(),
                tables: Vec::new(),
            }
        };

        if document.text.is_empty() {
            return Err(Error::Parse(
                "document has no text after markup removal".to_string(),
            ));
        }

        Ok(document)
    }

    /// Document text, one line per block, whitespace-collapsed.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tables in document order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}

/// Appends the text and tables under `element`. Inside `<pre>` line breaks
/// are kept, since plain-text filings are often wrapped in one.
fn walk(element: ElementRef<'_>, out: &mut TextBuilder, tables: &mut Vec<Table>, pre: bool) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            if pre {
                out.push_lines(text);
            } else {
                out.push_text(text);
            }
            continue;
        }
        let Some(el) = ElementRef::wrap(child) else {
            continue;
        };

        let name = el.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }

        if name == "table" {
            out.newline();
            let caption = out.tail(CAPTION_CHARS);
            let rows = table_rows(el);
            for row in &rows {
                out.push_text(&row.cells.join(" "));
                out.newline();
            }
            tables.push(Table { caption, rows });
            continue;
        }

        let block = BLOCKS.contains(&name);
        if block {
            out.newline();
        }
        walk(el, out, tables, pre || name == "pre");
        if block {
            out.newline();
        }
    }
}

fn table_rows(table: ElementRef<'_>) -> Vec<TableRow> {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr")
        .filter_map(|tr| {
            let mut cells: Vec<String> = Vec::new();
            let mut open: Option<String> = None;
            for cell in tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|e| matches!(e.value().name(), "td" | "th"))
            {
                let text = collapse(&cell.text().collect::<String>());
                match text.as_str() {
                    "" | "$" => {}
                    // closing parenthesis or percent sign split into its own cell
                    ")" | "%" | ")%" => match cells.last_mut() {
                        Some(prev) => prev.push_str(&text),
                        None => cells.push(text),
                    },
                    // opening parenthesis split from the amount it belongs to
                    _ if text.ends_with('(') && text.trim_start_matches(['$', ' ']) == "(" => {
                        open = Some(text);
                    }
                    _ => match open.take() {
                        Some(prefix) => cells.push(prefix + &text),
                        None => cells.push(text),
                    },
                }
            }
            if let Some(prefix) = open {
                cells.push(prefix);
            }
            (!cells.is_empty()).then(|| TableRow { cells })
        })
        .collect()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accumulates text, collapsing whitespace runs into single spaces.
#[derive(Debug, Default)]
struct TextBuilder {
    buf: String,
    pending_space: bool,
}

impl TextBuilder {
    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && !self.buf.is_empty() && !self.buf.ends_with('\n') {
                self.buf.push(' ');
            }
            self.pending_space = false;
            self.buf.push(c);
        }
    }

    /// Like [`Self::push_text`], but line breaks start new lines.
    fn push_lines(&mut self, text: &str) {
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.newline();
            }
            self.push_text(line);
        }
    }

    fn newline(&mut self) {
        if !self.buf.is_empty() && !self.buf.ends_with('\n') {
            self.buf.push('\n');
        }
        self.pending_space = false;
    }

    /// The last `chars` characters written so far.
    fn tail(&self, chars: usize) -> String {
        let start = self
            .buf
            .char_indices()
            .rev()
            .nth(chars.saturating_sub(1))
            .map_or(0, |(i, _)| i);
        self.buf[start..].trim().to_string()
    }

    fn finish(self) -> String {
        self.buf.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILING: &str = r#"<html><head><title>10-K</title><style>p { color: red }</style></head>
    <body>
      <div style="display:none"><ix:header>hidden 999,999</ix:header></div>
      <p>ACME CORP</p>
      <p>Annual   Report&nbsp;on Form 10-K</p>
      <script>var x = 1;</script>
      <p>CONSOLIDATED STATEMENTS OF OPERATIONS<br>(In thousands, except per share amounts)</p>
      <table>
        <tr><th></th><th>2023</th><th>2022</th></tr>
        <tr><td>Total net revenues</td><td>$</td><td>1,234</td><td>$</td><td>1,100</td></tr>
        <tr><td>Net loss</td><td>(56</td><td>)</td><td>(12</td><td>)</td></tr>
        <tr><td>&nbsp;</td></tr>
      </table>
      <p>Item 1A. Risk Factors</p>
    </body></html>"#;

    #[test]
    fn test_parse_html_text() {
        let doc = Document::parse(FILING).unwrap();
        let text = doc.text();

        assert!(text.contains("ACME CORP\nAnnual Report on Form 10-K"));
        assert!(text.contains("(In thousands, except per share amounts)"));
        assert!(text.contains("Total net revenues 1,234 1,100"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("999,999"));
        assert!(text.ends_with("Item 1A. Risk Factors"));
    }

    #[test]
    fn test_parse_tables() {
        let doc = Document::parse(FILING).unwrap();
        assert_eq!(doc.tables().len(), 1);

        let table = &doc.tables()[0];
        assert!(table.caption.ends_with("(In thousands, except per share amounts)"));
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].cells, vec!["2023", "2022"]);
        assert_eq!(table.rows[1].cells, vec!["Total net revenues", "1,234", "1,100"]);
        assert_eq!(table.rows[2].cells, vec!["Net loss", "(56)", "(12)"]);
    }

    #[test]
    fn test_row_label_and_amount() {
        let row = TableRow::new(["Total net revenues", "1,234", "1,100"]);
        assert_eq!(row.label(), Some("Total net revenues"));
        assert_eq!(row.first_amount(), Some(1234.0));

        let negative = TableRow::new(["Net loss", "(56)", "(12)"]);
        assert_eq!(negative.first_amount(), Some(-56.0));

        // header rows of years have no amounts
        let years = TableRow::new(["2023", "2022"]);
        assert_eq!(years.label(), Some("2023"));
        assert_eq!(years.first_amount(), None);
        assert_eq!(TableRow::new(["Revenue", "—"]).first_amount(), None);
    }

    #[test]
    fn test_split_opening_parenthesis() {
        let html = "<table><tr><td>Net loss</td><td>$</td><td>(</td><td>1,000</td><td>)</td>\
            <td>$ (</td><td>800</td><td>)</td></tr></table>";
        let doc = Document::parse(html).unwrap();
        let row = &doc.tables()[0].rows[0];
        assert_eq!(row.cells, vec!["Net loss", "(1,000)", "$ (800)"]);
        assert_eq!(row.first_amount(), Some(-1000.0));
    }

    #[test]
    fn test_preformatted_lines_are_kept() {
        let html = "<html><body><pre>\nItem 1. Business\nWe face competition.\n\n\
            Item 1A.   Risk Factors\nA cybersecurity incident could harm us.\n</pre></body></html>";
        let doc = Document::parse(html).unwrap();
        assert_eq!(
            doc.text(),
            "Item 1. Business\nWe face competition.\nItem 1A. Risk Factors\n\
             A cybersecurity incident could harm us."
        );
    }

    #[test]
    fn test_plain_text_document() {
        let doc = Document::parse("Total revenues   $ 5\n\n  Item 1A.  Risk Factors ").unwrap();
        assert_eq!(doc.text(), "Total revenues $ 5\nItem 1A. Risk Factors");
        assert!(doc.tables().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let err = Document::parse("abc\0def").unwrap_err();
        assert!(err.is_parse());

        let err = Document::parse("<html><body><script>x()</script></body></html>").unwrap_err();
        assert!(err.is_parse());

        assert!(Document::parse("   \n ").is_err());
    }

    #[test]
    fn test_caption_is_bounded() {
        let long = "x".repeat(1000);
        let html = format!("<p>{long}</p><p>(in millions)</p><table><tr><td>A</td><td>1</td></tr></table>");
        let doc = Document::parse(&html).unwrap();
        let caption = &doc.tables()[0].caption;
        assert!(caption.chars().count() <= CAPTION_CHARS);
        assert!(caption.ends_with("(in millions)"));
    }
}

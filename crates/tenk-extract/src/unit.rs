//! Reporting scale detection.

use tenk_core::UnitScale;
use tracing::debug;

use crate::document::Document;

/// Number of leading characters searched for a scale declaration.
pub const HEADER_CHARS: usize = 5_000;

/// Scale declarations, matched case-insensitively.
const DECLARATIONS: &[(&str, UnitScale)] = &[
    ("in millions", UnitScale::Millions),
    ("in thousands", UnitScale::Thousands),
    ("(000s)", UnitScale::Thousands),
    ("(000's)", UnitScale::Thousands),
    ("$000s", UnitScale::Thousands),
    ("$000's", UnitScale::Thousands),
];

/// Result of scale detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnitDetection {
    /// Detected scale.
    pub scale: UnitScale,
    /// True when no declaration was found and [`UnitScale::Ones`] was assumed.
    pub ambiguous: bool,
}

/// Detects the declared reporting scale of a document.
///
/// The document header is searched first, then the caption of each table in
/// order. Within one region the earliest declaration wins. Without any
/// declaration the scale is [`UnitScale::Ones`] and the result is flagged
/// ambiguous.
#[must_use]
pub fn detect_unit(document: &Document) -> UnitDetection {
    let text = document.text();
    let header_end = text
        .char_indices()
        .nth(HEADER_CHARS)
        .map_or(text.len(), |(i, _)| i);

    let regions = std::iter::once(&text[..header_end])
        .chain(document.tables().iter().map(|t| t.caption.as_str()));

    for (index, region) in regions.enumerate() {
        if let Some(scale) = earliest_declaration(region) {
            debug!(scale = %scale, region = index, "Detected unit scale");
            return UnitDetection {
                scale,
                ambiguous: false,
            };
        }
    }

    debug!("No unit declaration found, assuming ones");
    UnitDetection {
        scale: UnitScale::Ones,
        ambiguous: true,
    }
}

fn earliest_declaration(region: &str) -> Option<UnitScale> {
    let lower = region.to_lowercase();
    DECLARATIONS
        .iter()
        .filter_map(|(pattern, scale)| lower.find(pattern).map(|pos| (pos, *scale)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, scale)| scale)
}

//! Numeric token parsing for financial statements.

/// Parses a financial amount as printed in a 10-K.
///
/// Accepts thousands separators, a leading `$`, negatives written as
/// `(1,234)` or `-1,234`, and decimal fractions. Dashes, percentages,
/// malformed grouping and bare years (`2023`) are not amounts.
///
/// ```
/// use tenk_extract::parse_amount;
///
/// assert_eq!(parse_amount("$ 1,234"), Some(1234.0));
/// assert_eq!(parse_amount("(56.5)"), Some(-56.5));
/// assert_eq!(parse_amount("—"), None);
/// assert_eq!(parse_amount("2023"), None);
/// ```
#[must_use]
pub fn parse_amount(token: &str) -> Option<f64> {
    if token.contains('%') {
        return None;
    }

    let mut negative = false;
    let mut currency = false;
    let mut s = token.trim();

    loop {
        if let Some(rest) = s.strip_prefix('$') {
            currency = true;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('(') {
            negative = true;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('-').or_else(|| s.strip_prefix('\u{2212}')) {
            negative = true;
            s = rest;
        } else {
            break;
        }
        s = s.trim_start();
    }
    let trimmed = s.trim_end();
    let s = match trimmed.strip_suffix(')') {
        // a closing parenthesis alone still marks an accounting negative
        Some(rest) => {
            negative = true;
            rest.trim_end()
        }
        None => trimmed,
    };

    let (integer, fraction) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };

    if !valid_integer_part(integer) {
        return None;
    }
    if let Some(f) = fraction {
        if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    if fraction.is_none() && !currency && !negative && is_year(integer) {
        return None;
    }

    let digits: String = s.chars().filter(|c| *c != ',').collect();
    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Digits, optionally grouped by commas in threes (`1,234,567`).
fn valid_integer_part(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let mut groups = s.split(',');
    let Some(first) = groups.next() else {
        return false;
    };
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if !s.contains(',') {
        return true;
    }
    first.len() <= 3 && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

fn is_year(s: &str) -> bool {
    s.len() == 4 && s.parse::<u32>().is_ok_and(|y| (1900..=2099).contains(&y))
}

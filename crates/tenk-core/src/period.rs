//! Fiscal period definitions.
//!
//! This module defines [`FiscalPeriod`], the period component of the filing
//! uniqueness key, and the fiscal-year heuristic applied to annual filings.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Form type of an annual report.
pub const FORM_10K: &str = "10-K";

/// Fiscal period covered by a filing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FiscalPeriod {
    /// Full fiscal year (annual report).
    #[default]
    FullYear,
    /// First fiscal quarter.
    Q1,
    /// Second fiscal quarter.
    Q2,
    /// Third fiscal quarter.
    Q3,
    /// Fourth fiscal quarter.
    Q4,
}

impl FiscalPeriod {
    /// Returns the registry code for this period ("FY", "Q1", ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullYear => "FY",
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FiscalPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FY" => Ok(Self::FullYear),
            "Q1" => Ok(Self::Q1),
            "Q2" => Ok(Self::Q2),
            "Q3" => Ok(Self::Q3),
            "Q4" => Ok(Self::Q4),
            _ => Err(Error::UnknownName {
                kind: "fiscal period",
                name: s.to_string(),
            }),
        }
    }
}

/// Infers the fiscal year an annual report covers from its filing date.
///
/// 10-Ks filed in January through March almost always cover the previous
/// calendar year (December fiscal year ends), so those map to `year - 1`.
#[must_use]
pub fn fiscal_year_from_filing_date(filing_date: NaiveDate) -> i32 {
    if filing_date.month() <= 3 {
        filing_date.year() - 1
    } else {
        filing_date.year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fiscal_period_round_trip_names() {
        for period in [
            FiscalPeriod::FullYear,
            FiscalPeriod::Q1,
            FiscalPeriod::Q2,
            FiscalPeriod::Q3,
            FiscalPeriod::Q4,
        ] {
            assert_eq!(period.as_str().parse::<FiscalPeriod>().unwrap(), period);
        }
        assert!("H1".parse::<FiscalPeriod>().is_err());
    }

    #[test]
    fn test_fiscal_year_early_filing_maps_to_prior_year() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        assert_eq!(fiscal_year_from_filing_date(date), 2023);
    }

    #[test]
    fn test_fiscal_year_late_filing_keeps_year() {
        // Apple files in late October/November for a September year end.
        let date = NaiveDate::from_ymd_opt(2023, 11, 3).unwrap();
        assert_eq!(fiscal_year_from_filing_date(date), 2023);
    }
}

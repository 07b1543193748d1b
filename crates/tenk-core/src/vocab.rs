//! Fixed vocabularies tracked by the pipeline.
//!
//! Metric names, risk keyword buckets and reporting scales are closed sets.
//! They are modeled as enums so every stored row references a known name;
//! parsing an unknown name fails with [`Error::UnknownName`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Unit label stored with every metric after scale conversion.
pub const CANONICAL_UNIT: &str = "USD";

/// A tracked financial metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    /// Consolidated total revenue / net sales.
    Revenue,
    /// Net income (loss).
    NetIncome,
    /// Total assets.
    TotalAssets,
    /// Total liabilities.
    TotalLiabilities,
    /// Cash and cash equivalents.
    CashAndEquivalents,
}

impl MetricName {
    /// Every tracked metric, in extraction order.
    pub const ALL: [Self; 5] = [
        Self::Revenue,
        Self::NetIncome,
        Self::TotalAssets,
        Self::TotalLiabilities,
        Self::CashAndEquivalents,
    ];

    /// Returns the stored name of this metric.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::NetIncome => "net_income",
            Self::TotalAssets => "total_assets",
            Self::TotalLiabilities => "total_liabilities",
            Self::CashAndEquivalents => "cash_and_equivalents",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnknownName {
                kind: "metric",
                name: s.to_string(),
            })
    }
}

/// A tracked risk keyword bucket.
///
/// Each bucket groups the terms that count toward it, e.g. "cyber" and
/// "cyber security" both count as [`RiskKeyword::Cybersecurity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKeyword {
    /// Supply chain disruption.
    SupplyChain,
    /// Inflation.
    Inflation,
    /// Cybersecurity incidents.
    Cybersecurity,
    /// Litigation.
    Litigation,
    /// Regulation and regulatory change.
    Regulation,
    /// Competition.
    Competition,
    /// Climate change.
    Climate,
    /// Pandemics.
    Pandemic,
    /// Geopolitical events.
    Geopolitical,
    /// Interest rates.
    InterestRate,
    /// Currency and foreign exchange.
    Currency,
    /// Tariffs and trade wars.
    Tariff,
    /// Recession.
    Recession,
    /// Labor and workforce.
    Labor,
}

impl RiskKeyword {
    /// Every tracked keyword bucket, in reporting order.
    pub const ALL: [Self; 14] = [
        Self::SupplyChain,
        Self::Inflation,
        Self::Cybersecurity,
        Self::Litigation,
        Self::Regulation,
        Self::Competition,
        Self::Climate,
        Self::Pandemic,
        Self::Geopolitical,
        Self::InterestRate,
        Self::Currency,
        Self::Tariff,
        Self::Recession,
        Self::Labor,
    ];

    /// Returns the stored name of this keyword bucket.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SupplyChain => "supply chain",
            Self::Inflation => "inflation",
            Self::Cybersecurity => "cybersecurity",
            Self::Litigation => "litigation",
            Self::Regulation => "regulation",
            Self::Competition => "competition",
            Self::Climate => "climate",
            Self::Pandemic => "pandemic",
            Self::Geopolitical => "geopolitical",
            Self::InterestRate => "interest rate",
            Self::Currency => "currency",
            Self::Tariff => "tariff",
            Self::Recession => "recession",
            Self::Labor => "labor",
        }
    }

    /// Lowercase terms counted toward this bucket, longest first.
    #[must_use]
    pub const fn terms(&self) -> &'static [&'static str] {
        match self {
            Self::SupplyChain => &["supply chain"],
            Self::Inflation => &["inflation"],
            Self::Cybersecurity => &["cyber-security", "cyber security", "cybersecurity", "cyber"],
            Self::Litigation => &["litigation"],
            Self::Regulation => &["regulation", "regulatory"],
            Self::Competition => &["competition", "competitive", "competitor"],
            Self::Climate => &["climate"],
            Self::Pandemic => &["pandemic"],
            Self::Geopolitical => &["geopolitical"],
            Self::InterestRate => &["interest rate"],
            Self::Currency => &["foreign exchange", "currencies", "currency"],
            Self::Tariff => &["trade war", "tariff"],
            Self::Recession => &["recession"],
            Self::Labor => &["workforce", "labour", "labor"],
        }
    }
}

impl fmt::Display for RiskKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskKeyword {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownName {
                kind: "risk keyword",
                name: s.to_string(),
            })
    }
}

/// Declared reporting scale of the numeric tables in a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitScale {
    /// Whole dollars.
    #[default]
    Ones,
    /// Thousands of dollars.
    Thousands,
    /// Millions of dollars.
    Millions,
}

impl UnitScale {
    /// Multiplier converting a raw table value to whole dollars.
    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::Ones => 1.0,
            Self::Thousands => 1_000.0,
            Self::Millions => 1_000_000.0,
        }
    }

    /// Converts a raw value in this scale to canonical USD.
    #[must_use]
    pub fn to_usd(&self, raw: f64) -> f64 {
        raw * self.multiplier()
    }

    /// Returns the stored name of this scale.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ones => "ones",
            Self::Thousands => "thousands",
            Self::Millions => "millions",
        }
    }
}

impl fmt::Display for UnitScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitScale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ones" => Ok(Self::Ones),
            "thousands" => Ok(Self::Thousands),
            "millions" => Ok(Self::Millions),
            _ => Err(Error::UnknownName {
                kind: "unit scale",
                name: s.to_string(),
            }),
        }
    }
}

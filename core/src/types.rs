//! Shared primitive types used across the entire pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Customer account identifier, as it appears on the invoice.
pub type AccountId = String;

/// First day of a calendar month.
pub type Month = chrono::NaiveDate;

/// A discrete health label for one customer-month.
///
/// Black/Red/Yellow are alert tiers, Blue/Green/Light-Green growth tiers.
/// Declaration order is severity order: worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Black,
    Red,
    Yellow,
    Blue,
    Green,
    #[serde(rename = "Light-Green")]
    LightGreen,
}

/// Rank given to rows with no tier when sorting worst-first.
pub const UNTIERED_RANK: u8 = 6;

impl Tier {
    pub const ALERT: [Tier; 3] = [Tier::Black, Tier::Red, Tier::Yellow];
    pub const GROWTH: [Tier; 3] = [Tier::Blue, Tier::Green, Tier::LightGreen];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Black      => "Black",
            Self::Red        => "Red",
            Self::Yellow     => "Yellow",
            Self::Blue       => "Blue",
            Self::Green      => "Green",
            Self::LightGreen => "Light-Green",
        }
    }

    /// Severity rank, 0 = Black ... 5 = Light-Green.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Black | Self::Red | Self::Yellow)
    }

    /// Weight used by the alert severity score.
    pub fn alert_weight(&self) -> f64 {
        match self {
            Self::Black  => 3.0,
            Self::Red    => 2.0,
            Self::Yellow => 1.0,
            _            => 0.0,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank of an optional tier; untiered rows sort last.
pub fn tier_rank(tier: Option<Tier>) -> u8 {
    tier.map(|t| t.rank()).unwrap_or(UNTIERED_RANK)
}

/// Purchase cadence of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyerType {
    Regular,
    Sporadic,
}

impl BuyerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular  => "regular",
            Self::Sporadic => "sporadic",
        }
    }
}

/// Decline-risk model verdict for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredStatus {
    #[serde(rename = "Likely-Decline")]
    LikelyDecline,
    #[serde(rename = "Likely-Stable")]
    LikelyStable,
}

impl PredStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LikelyDecline => "Likely-Decline",
            Self::LikelyStable  => "Likely-Stable",
        }
    }
}

/// Ratio that falls back to 1.0 when the denominator is zero or undefined.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        1.0
    } else {
        numerator / denominator
    }
}

/// Median of a slice; 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

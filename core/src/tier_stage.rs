//! Tier classification — six mutually exclusive health labels.
//!
//! The decision is an ordered list of checks evaluated in sequence;
//! the first check that fires wins. Alert checks run first
//! (Black → Red → Yellow, OR of drop and gap signals). Only when no
//! alert fires are growth checks run (Blue → Green → Light-Green,
//! AND of rise and gap signals). An alert always suppresses growth.

use crate::{
    config::{TierRule, TierRules},
    monthly_stage::MonthlyAggregate,
    types::{safe_ratio, Tier},
};

// ── Signals ──────────────────────────────────────────────────────────────────

/// Ratios derived from one monthly row, shared by every tier check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierSignals {
    /// min(tons / avg6m_tons, net_sales / avg6m_sales)
    pub drop_ratio: f64,
    /// max(tons / avg6m_tons, net_sales / avg6m_sales)
    pub rise_ratio: f64,
    /// gap_days / median_gap, 0 when median_gap is zero
    pub gap_ratio:  f64,
    /// gap_days - median_gap; negative means buying sooner than usual
    pub gap_delta:  f64,
    /// True when a zero or undefined baseline was replaced by ratio 1.0.
    pub substituted: bool,
}

impl TierSignals {
    pub fn from_values(
        tons: f64,
        avg_tons: f64,
        net_sales: f64,
        avg_sales: f64,
        gap_days: f64,
        median_gap: f64,
    ) -> Self {
        let tons_ratio = safe_ratio(tons, avg_tons);
        let sales_ratio = safe_ratio(net_sales, avg_sales);
        let substituted = !is_usable_baseline(avg_tons) || !is_usable_baseline(avg_sales);

        let gap_ratio = if median_gap > 0.0 && median_gap.is_finite() {
            gap_days / median_gap
        } else {
            0.0
        };

        Self {
            drop_ratio: tons_ratio.min(sales_ratio),
            rise_ratio: tons_ratio.max(sales_ratio),
            gap_ratio,
            gap_delta: gap_days - median_gap,
            substituted,
        }
    }

    pub fn from_aggregate(row: &MonthlyAggregate) -> Self {
        Self::from_values(
            row.tons,
            row.avg6m_tons,
            row.net_sales,
            row.avg6m_sales,
            row.gap_days as f64,
            row.median_gap,
        )
    }
}

fn is_usable_baseline(value: f64) -> bool {
    value != 0.0 && value.is_finite()
}

// ── Checks ───────────────────────────────────────────────────────────────────

type Trigger = fn(&TierRule, &TierSignals) -> bool;

/// Alert: drop below threshold OR gap ratio above the gap limit.
fn alert_trigger(rule: &TierRule, s: &TierSignals) -> bool {
    s.drop_ratio < rule.threshold || s.gap_ratio > rule.gap
}

/// Growth: rise at or above threshold AND gap delta at or below the limit.
fn growth_trigger(rule: &TierRule, s: &TierSignals) -> bool {
    s.rise_ratio >= rule.threshold && s.gap_delta <= rule.gap
}

#[derive(Clone, Copy)]
pub struct TierCheck {
    pub tier: Tier,
    pub rule: TierRule,
    trigger:  Trigger,
}

impl TierCheck {
    pub fn fires(&self, signals: &TierSignals) -> bool {
        (self.trigger)(&self.rule, signals)
    }
}

/// Result of classifying one row. At most one field is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierAssignment {
    pub alert_tier:  Option<Tier>,
    pub growth_tier: Option<Tier>,
}

impl TierAssignment {
    /// Alert tier if present, else growth tier.
    pub fn label(&self) -> Option<Tier> {
        self.alert_tier.or(self.growth_tier)
    }
}

/// The ordered rule set built from configuration.
pub struct TierClassifier {
    alert_checks:  Vec<TierCheck>,
    growth_checks: Vec<TierCheck>,
}

impl TierClassifier {
    pub fn new(rules: &TierRules) -> Self {
        let build = |tiers: [Tier; 3], trigger: Trigger| -> Vec<TierCheck> {
            tiers
                .iter()
                .map(|&tier| TierCheck { tier, rule: rules.rule(tier), trigger })
                .collect()
        };
        Self {
            alert_checks:  build(Tier::ALERT, alert_trigger),
            growth_checks: build(Tier::GROWTH, growth_trigger),
        }
    }

    /// Checks in evaluation order: alerts, then growth.
    pub fn checks(&self) -> impl Iterator<Item = &TierCheck> {
        self.alert_checks.iter().chain(self.growth_checks.iter())
    }

    pub fn alert_tier(&self, signals: &TierSignals) -> Option<Tier> {
        first_match(&self.alert_checks, signals)
    }

    pub fn growth_tier(&self, signals: &TierSignals) -> Option<Tier> {
        first_match(&self.growth_checks, signals)
    }

    pub fn classify(&self, signals: &TierSignals) -> TierAssignment {
        match self.alert_tier(signals) {
            Some(alert) => TierAssignment { alert_tier: Some(alert), growth_tier: None },
            None => TierAssignment { alert_tier: None, growth_tier: self.growth_tier(signals) },
        }
    }

    pub fn classify_row(&self, row: &MonthlyAggregate) -> TierAssignment {
        self.classify(&TierSignals::from_aggregate(row))
    }
}

fn first_match(checks: &[TierCheck], signals: &TierSignals) -> Option<Tier> {
    checks.iter().find(|c| c.fires(signals)).map(|c| c.tier)
}

//! Pipeline configuration — every threshold the stages consume.
//!
//! RULE: No stage hardcodes a threshold. Everything lives here,
//! with defaults that match the documented tier and alert policy.
//! A config file may be partial; missing fields take the defaults.

use crate::{
    error::{HealthError, HealthResult},
    types::Tier,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Tier rules ─────────────────────────────────────────────────────

/// One tier's trigger pair.
///
/// Alert tiers: `threshold` is the drop ratio below which the tier fires,
/// `gap` the gap ratio (gap_days / median_gap) above which it fires.
/// Growth tiers: `threshold` is the minimum rise ratio, `gap` the maximum
/// signed gap delta (gap_days - median_gap) in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRule {
    pub threshold: f64,
    pub gap: f64,
}

impl TierRule {
    pub const fn new(threshold: f64, gap: f64) -> Self {
        Self { threshold, gap }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierRules {
    #[serde(rename = "Black")]
    pub black: TierRule,
    #[serde(rename = "Red")]
    pub red: TierRule,
    #[serde(rename = "Yellow")]
    pub yellow: TierRule,
    #[serde(rename = "Blue")]
    pub blue: TierRule,
    #[serde(rename = "Green")]
    pub green: TierRule,
    #[serde(rename = "Light-Green")]
    pub light_green: TierRule,
}

impl Default for TierRules {
    fn default() -> Self {
        Self {
            black:       TierRule::new(0.50, 9.0),
            red:         TierRule::new(0.70, 3.0),
            yellow:      TierRule::new(0.85, 1.75),
            blue:        TierRule::new(1.35, -30.0),
            green:       TierRule::new(1.25, -20.0),
            light_green: TierRule::new(1.10, -10.0),
        }
    }
}

impl TierRules {
    pub fn rule(&self, tier: Tier) -> TierRule {
        match tier {
            Tier::Black      => self.black,
            Tier::Red        => self.red,
            Tier::Yellow     => self.yellow,
            Tier::Blue       => self.blue,
            Tier::Green      => self.green,
            Tier::LightGreen => self.light_green,
        }
    }
}

// ── Cadence ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// A regular buyer's median gap must not exceed this many days.
    pub max_median_gap_days: f64,
    pub min_invoices: usize,
    pub min_months: usize,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            max_median_gap_days: 40.0,
            min_invoices: 3,
            min_months: 2,
        }
    }
}

// ── Decline-risk model ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Months ahead used to build the training label.
    pub lookahead_months: usize,
    /// Future sales-vs-baseline ratio below which a row counts as a decline.
    pub decline_ratio: f64,
    /// prob_decline at or above this is reported as Likely-Decline.
    pub prob_cutoff: f64,
    /// Number of forward-chaining validation folds.
    pub cv_splits: usize,
    /// Inverse regularisation strength (larger = weaker L2 penalty).
    pub l2_strength: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            lookahead_months: 3,
            decline_ratio: 0.70,
            prob_cutoff: 0.45,
            cv_splits: 4,
            l2_strength: 1.0,
            max_iterations: 1000,
            tolerance: 1e-8,
        }
    }
}

// ── Alerts ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Days beyond the usual gap that count as unusual silence.
    pub quiet_days: f64,
    /// Sales-vs-baseline percentage below which sales count as dropped.
    pub sales_drop_pct: f64,
    /// prob_decline at or above this flags the account on its own.
    pub probability_limit: f64,
    pub max_rows: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            quiet_days: 45.0,
            sales_drop_pct: -50.0,
            probability_limit: 0.60,
            max_rows: 200,
        }
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Trailing window, in monthly records, for the tons/sales baselines.
    pub baseline_window_months: usize,
    pub tiers: TierRules,
    pub cadence: CadenceConfig,
    pub model: ModelConfig,
    pub alerts: AlertConfig,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            baseline_window_months: 6,
            tiers: TierRules::default(),
            cadence: CadenceConfig::default(),
            model: ModelConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl HealthConfig {
    /// Load from a JSON file. Fields absent from the file keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> HealthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: HealthConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could sensibly use.
    pub fn validate(&self) -> HealthResult<()> {
        if self.baseline_window_months == 0 {
            return Err(HealthError::invalid_config("baseline_window_months", "must be at least 1"));
        }

        for tier in Tier::ALERT {
            let rule = self.tiers.rule(tier);
            let field = format!("tiers.{tier}");
            if !(rule.threshold.is_finite() && rule.threshold > 0.0) {
                return Err(HealthError::invalid_config(&field, "drop threshold must be positive"));
            }
            if !(rule.gap.is_finite() && rule.gap > 0.0) {
                return Err(HealthError::invalid_config(&field, "gap ratio must be positive"));
            }
        }
        for tier in Tier::GROWTH {
            let rule = self.tiers.rule(tier);
            let field = format!("tiers.{tier}");
            if !(rule.threshold.is_finite() && rule.threshold > 0.0) {
                return Err(HealthError::invalid_config(&field, "rise threshold must be positive"));
            }
            if !rule.gap.is_finite() {
                return Err(HealthError::invalid_config(&field, "gap delta must be finite"));
            }
        }

        if !(self.cadence.max_median_gap_days >= 0.0) {
            return Err(HealthError::invalid_config("cadence.max_median_gap_days", "must be non-negative"));
        }

        let m = &self.model;
        if m.lookahead_months == 0 {
            return Err(HealthError::invalid_config("model.lookahead_months", "must be at least 1"));
        }
        if !(m.decline_ratio > 0.0 && m.decline_ratio.is_finite()) {
            return Err(HealthError::invalid_config("model.decline_ratio", "must be positive"));
        }
        if !(0.0..=1.0).contains(&m.prob_cutoff) {
            return Err(HealthError::invalid_config("model.prob_cutoff", "must lie in [0, 1]"));
        }
        if m.cv_splits < 2 {
            return Err(HealthError::invalid_config("model.cv_splits", "must be at least 2"));
        }
        if !(m.l2_strength > 0.0 && m.l2_strength.is_finite()) {
            return Err(HealthError::invalid_config("model.l2_strength", "must be positive"));
        }
        if m.max_iterations == 0 {
            return Err(HealthError::invalid_config("model.max_iterations", "must be at least 1"));
        }

        let a = &self.alerts;
        if !(a.quiet_days.is_finite() && a.sales_drop_pct.is_finite()) {
            return Err(HealthError::invalid_config("alerts", "thresholds must be finite"));
        }
        if !(0.0..=1.0).contains(&a.probability_limit) {
            return Err(HealthError::invalid_config("alerts.probability_limit", "must lie in [0, 1]"));
        }
        if a.max_rows == 0 {
            return Err(HealthError::invalid_config("alerts.max_rows", "must be at least 1"));
        }

        Ok(())
    }
}

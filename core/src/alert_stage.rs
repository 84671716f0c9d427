//! Rep contact alerts — who should a sales rep call first?
//!
//! An account is flagged when ANY of three independent signals fires:
//!   1. its latest tier is Black
//!   2. unusual silence AND a deep sales drop (combo drop)
//!   3. the decline-risk model's probability reaches the limit
//!
//! Flagged accounts are ranked by
//!   severity = tier_weight·100 + max(gap_vs_median, 0) + |min(sales_vs_baseline_%, 0)|
//! and truncated to `max_rows`.
//!
//! Reads: customer_health_full (required), customer_decline_probs (optional).
//! Writes: rep_contact_list (CSV and HTML).

use crate::{
    config::{AlertConfig, HealthConfig},
    decline_stage::DeclineRiskRecord,
    error::{HealthError, HealthResult},
    health_stage::{latest_per_account, HealthRecord},
    report::render_alert_document,
    stage::{PipelineStage, StageReport},
    store::{HealthStore, TABLE_HEALTH},
    types::{AccountId, Tier},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub account_name: AccountId,
    pub tier_label:   Option<Tier>,
    pub gap_days:     i64,
    #[serde(rename = "sales_vs_baseline_%")]
    pub sales_vs_baseline_pct: f64,
    pub prob_decline: f64,
    pub severity:     f64,
    pub rep_message:  String,
}

/// Why an account made the list. First applicable reason wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertReason {
    BlackTier,
    SilenceAndDrop,
    PredictedDecline,
}

impl AlertReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlackTier        => "Black tier customer",
            Self::SilenceAndDrop   => "Unusual silence + sales drop",
            Self::PredictedDecline => "Predicted decline (ML)",
        }
    }
}

/// Per-account inputs to the flagging rule, derived from the latest record.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSignals {
    pub tier_label:            Option<Tier>,
    pub gap_days:              i64,
    pub median_gap:            f64,
    pub gap_vs_median:         f64,
    pub sales_vs_baseline_pct: f64,
    pub prob_decline:          f64,
}

impl AlertSignals {
    pub fn from_record(record: &HealthRecord, prob_decline: Option<f64>) -> Self {
        Self {
            tier_label:            record.tier_label,
            gap_days:              record.gap_days,
            median_gap:            record.median_gap,
            gap_vs_median:         record.gap_days as f64 - record.median_gap,
            sales_vs_baseline_pct: sales_vs_baseline_pct(record.net_sales, record.avg6m_sales),
            prob_decline:          prob_decline.unwrap_or(0.0),
        }
    }

    pub fn is_black(&self) -> bool {
        self.tier_label == Some(Tier::Black)
    }

    pub fn is_combo_drop(&self, cfg: &AlertConfig) -> bool {
        self.gap_vs_median > cfg.quiet_days && self.sales_vs_baseline_pct < cfg.sales_drop_pct
    }

    pub fn is_ml_flagged(&self, cfg: &AlertConfig) -> bool {
        self.prob_decline >= cfg.probability_limit
    }

    /// Union of the three signals.
    pub fn is_flagged(&self, cfg: &AlertConfig) -> bool {
        self.is_black() || self.is_combo_drop(cfg) || self.is_ml_flagged(cfg)
    }

    pub fn severity(&self) -> f64 {
        let tier_weight = self.tier_label.map(|t| t.alert_weight()).unwrap_or(0.0);
        tier_weight * 100.0 + self.gap_vs_median.max(0.0) + self.sales_vs_baseline_pct.min(0.0).abs()
    }

    pub fn reason(&self, cfg: &AlertConfig) -> AlertReason {
        if self.is_black() {
            AlertReason::BlackTier
        } else if self.is_combo_drop(cfg) {
            AlertReason::SilenceAndDrop
        } else {
            AlertReason::PredictedDecline
        }
    }

    /// Rep-facing one-liner: reason, actual vs. typical gap, sales deviation.
    pub fn rep_message(&self, cfg: &AlertConfig) -> String {
        let arrow = if self.sales_vs_baseline_pct < 0.0 { "⬇︎" } else { "⬆︎" };
        format!(
            "{} • Last order {}d (typ {}d) • Sales {}{:.0}% vs. norm",
            self.reason(cfg).as_str(),
            self.gap_days,
            self.median_gap as i64,
            arrow,
            self.sales_vs_baseline_pct.abs(),
        )
    }
}

/// (net_sales / avg6m_sales − 1) × 100; 0 when the ratio is undefined.
pub fn sales_vs_baseline_pct(net_sales: f64, avg6m_sales: f64) -> f64 {
    let ratio = net_sales / avg6m_sales;
    if ratio.is_finite() {
        (ratio - 1.0) * 100.0
    } else {
        0.0
    }
}

// ── Composition ──────────────────────────────────────────────────────────────

/// Flag, rank and truncate. An absent risk table means no ML signal.
pub fn compose_alerts(
    health: &[HealthRecord],
    risk: Option<&[DeclineRiskRecord]>,
    cfg: &AlertConfig,
) -> Vec<AlertRecord> {
    let probs: HashMap<&str, f64> = risk
        .unwrap_or_default()
        .iter()
        .map(|r| (r.account_name.as_str(), r.prob_decline))
        .collect();

    let mut flagged: Vec<AlertRecord> = latest_per_account(health)
        .into_iter()
        .filter_map(|record| {
            let prob = probs.get(record.account_name.as_str()).copied();
            let signals = AlertSignals::from_record(record, prob);
            if !signals.is_flagged(cfg) {
                return None;
            }
            Some(AlertRecord {
                account_name:          record.account_name.clone(),
                tier_label:            signals.tier_label,
                gap_days:              signals.gap_days,
                sales_vs_baseline_pct: signals.sales_vs_baseline_pct,
                prob_decline:          signals.prob_decline,
                severity:              signals.severity(),
                rep_message:           signals.rep_message(cfg),
            })
        })
        .collect();

    // Stable: equal severities keep account-name order.
    flagged.sort_by(|a, b| b.severity.partial_cmp(&a.severity).unwrap_or(Ordering::Equal));
    flagged.truncate(cfg.max_rows);
    flagged
}

// ── Stage ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct AlertStage;

impl AlertStage {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStage for AlertStage {
    fn name(&self) -> &'static str { "alerts" }

    fn run(&self, store: &mut HealthStore, config: &HealthConfig) -> HealthResult<StageReport> {
        let health = store
            .load_health_table()?
            .ok_or_else(|| HealthError::missing_input(TABLE_HEALTH))?;
        let risk = store.load_decline_table()?;
        if risk.is_none() {
            log::warn!("alerts: no decline-risk table, ML signal disabled for this run");
        }

        let alerts = compose_alerts(&health, risk.as_deref(), &config.alerts);
        let document = render_alert_document(&alerts);
        store.save_alert_table(&alerts, &document)?;

        log::info!("alerts: {} accounts flagged for rep contact", alerts.len());
        Ok(StageReport::new(self.name(), alerts.len()))
    }
}

//! Health stage — builds the Monthly Health table.
//!
//! Execution: first stage of every run.
//!   1. Monthly aggregation with trailing baselines
//!   2. Tier classification per customer-month
//!   3. Cadence label per account, joined onto every month
//!   4. Sort worst tier first, then tons desc, then net_sales desc
//!
//! Reads: the tidy invoice table held by the engine.
//! Writes: customer_health_full.

use crate::{
    cadence_stage::classify_accounts,
    config::HealthConfig,
    error::{HealthError, HealthResult},
    invoice::InvoiceRecord,
    monthly_stage::{aggregate_monthly, MonthlyAggregate},
    stage::{PipelineStage, StageReport},
    store::{HealthStore, TABLE_INVOICES},
    tier_stage::{TierAssignment, TierClassifier, TierSignals},
    types::{tier_rank, AccountId, BuyerType, Month, Tier},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ── Public types ─────────────────────────────────────────────────────────────

/// One customer-month of the health table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub account_name: AccountId,
    pub month:        Month,
    pub tons:         f64,
    pub net_sales:    f64,
    pub avg6m_tons:   f64,
    pub avg6m_sales:  f64,
    pub gap_days:     i64,
    pub median_gap:   f64,
    pub alert_tier:   Option<Tier>,
    pub growth_tier:  Option<Tier>,
    pub tier_label:   Option<Tier>,
    pub buyer_type:   BuyerType,
}

impl HealthRecord {
    pub fn from_parts(row: MonthlyAggregate, tiers: TierAssignment, buyer_type: BuyerType) -> Self {
        Self {
            account_name: row.account_name,
            month:        row.month,
            tons:         row.tons,
            net_sales:    row.net_sales,
            avg6m_tons:   row.avg6m_tons,
            avg6m_sales:  row.avg6m_sales,
            gap_days:     row.gap_days,
            median_gap:   row.median_gap,
            alert_tier:   tiers.alert_tier,
            growth_tier:  tiers.growth_tier,
            tier_label:   tiers.label(),
            buyer_type,
        }
    }

    /// net_sales / avg6m_sales; NaN when the baseline is zero or undefined.
    pub fn sales_vs_baseline(&self) -> f64 {
        if self.avg6m_sales == 0.0 || !self.avg6m_sales.is_finite() {
            f64::NAN
        } else {
            self.net_sales / self.avg6m_sales
        }
    }

    pub fn signals(&self) -> TierSignals {
        TierSignals::from_values(
            self.tons,
            self.avg6m_tons,
            self.net_sales,
            self.avg6m_sales,
            self.gap_days as f64,
            self.median_gap,
        )
    }
}

// ── Table construction ───────────────────────────────────────────────────────

/// Build the full, sorted health table from tidy invoices.
pub fn build_health_table(
    invoices: &[InvoiceRecord],
    config: &HealthConfig,
) -> Vec<HealthRecord> {
    let monthly = aggregate_monthly(invoices, config.baseline_window_months);
    let cadence = classify_accounts(invoices, &monthly, &config.cadence);
    let classifier = TierClassifier::new(&config.tiers);

    let mut substitutions = 0usize;
    let mut rows: Vec<HealthRecord> = monthly
        .into_iter()
        .map(|row| {
            let signals = TierSignals::from_aggregate(&row);
            if signals.substituted {
                substitutions += 1;
            }
            let tiers = classifier.classify(&signals);
            let buyer_type = cadence
                .get(&row.account_name)
                .map(|c| c.buyer_type)
                .unwrap_or(BuyerType::Sporadic);
            HealthRecord::from_parts(row, tiers, buyer_type)
        })
        .collect();

    if substitutions > 0 {
        log::debug!("{substitutions} monthly rows had a zero baseline; ratio taken as 1.0");
    }

    sort_worst_first(&mut rows);
    rows
}

/// Worst tier first, then tons desc, then net_sales desc.
///
/// The sort is stable, so rows that tie on all three keep their
/// (account, month) order.
pub fn sort_worst_first(rows: &mut [HealthRecord]) {
    rows.sort_by(|a, b| {
        tier_rank(a.tier_label)
            .cmp(&tier_rank(b.tier_label))
            .then_with(|| desc(a.tons, b.tons))
            .then_with(|| desc(a.net_sales, b.net_sales))
    });
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Most recent record per account, ordered by account name.
pub fn latest_per_account(rows: &[HealthRecord]) -> Vec<&HealthRecord> {
    let mut latest: std::collections::BTreeMap<&str, &HealthRecord> =
        std::collections::BTreeMap::new();
    for row in rows {
        latest
            .entry(row.account_name.as_str())
            .and_modify(|cur| {
                if row.month > cur.month {
                    *cur = row;
                }
            })
            .or_insert(row);
    }
    latest.into_values().collect()
}

// ── Stage ────────────────────────────────────────────────────────────────────

pub struct HealthStage {
    invoices: Vec<InvoiceRecord>,
}

impl HealthStage {
    pub fn new(invoices: Vec<InvoiceRecord>) -> Self {
        Self { invoices }
    }
}

impl PipelineStage for HealthStage {
    fn name(&self) -> &'static str { "health" }

    fn run(&self, store: &mut HealthStore, config: &HealthConfig) -> HealthResult<StageReport> {
        if self.invoices.is_empty() {
            return Err(HealthError::missing_input(TABLE_INVOICES));
        }

        let rows = build_health_table(&self.invoices, config);
        store.save_health_table(&rows)?;

        let alerts = rows.iter().filter(|r| r.alert_tier.is_some()).count();
        let growth = rows.iter().filter(|r| r.growth_tier.is_some()).count();
        log::info!(
            "health: {} monthly rows ({alerts} alert-tier, {growth} growth-tier)",
            rows.len(),
        );

        Ok(StageReport::new(self.name(), rows.len()))
    }
}

//! Monthly aggregation — invoices rolled up to one row per customer-month.
//!
//! For each account's series (ordered by month):
//!   1. tons / net_sales are summed per calendar month
//!   2. avg6m_* are trailing means over the current row and up to
//!      `window - 1` prior rows (minimum one observation)
//!   3. gap_days is the day distance to the previous monthly row (0 first)
//!   4. median_gap is the median of the account's gap_days, broadcast
//!
//! Output is sorted by account, then month ascending.

use crate::{
    invoice::InvoiceRecord,
    types::{median, AccountId, Month},
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub account_name: AccountId,
    pub month:        Month,
    pub tons:         f64,
    pub net_sales:    f64,
    pub avg6m_tons:   f64,
    pub avg6m_sales:  f64,
    pub gap_days:     i64,
    pub median_gap:   f64,
}

/// First day of the month containing `date`.
pub fn month_start(date: chrono::NaiveDate) -> Month {
    date.with_day(1).unwrap_or(date)
}

/// Roll invoices up into monthly aggregates with trailing baselines.
pub fn aggregate_monthly(invoices: &[InvoiceRecord], window: usize) -> Vec<MonthlyAggregate> {
    let window = window.max(1);

    // BTreeMap keeps (account, month) ordered, which is the output order.
    let mut totals: BTreeMap<(AccountId, Month), (f64, f64)> = BTreeMap::new();
    for inv in invoices {
        let entry = totals
            .entry((inv.account_name.clone(), month_start(inv.date)))
            .or_insert((0.0, 0.0));
        entry.0 += inv.shipped_weight;
        entry.1 += inv.net_sales;
    }

    let mut out: Vec<MonthlyAggregate> = Vec::with_capacity(totals.len());
    let mut series: Vec<((AccountId, Month), (f64, f64))> = Vec::new();
    let mut current: Option<AccountId> = None;

    for (key, sums) in totals {
        if current.as_ref() != Some(&key.0) {
            flush_series(&mut series, window, &mut out);
            current = Some(key.0.clone());
        }
        series.push((key, sums));
    }
    flush_series(&mut series, window, &mut out);

    log::debug!(
        "aggregated {} invoices into {} monthly rows (window={window})",
        invoices.len(),
        out.len(),
    );
    out
}

/// Compute baselines and gaps for one account's ordered series, then drain it.
fn flush_series(
    series: &mut Vec<((AccountId, Month), (f64, f64))>,
    window: usize,
    out: &mut Vec<MonthlyAggregate>,
) {
    if series.is_empty() {
        return;
    }

    let tons: Vec<f64> = series.iter().map(|(_, (t, _))| *t).collect();
    let sales: Vec<f64> = series.iter().map(|(_, (_, s))| *s).collect();
    let avg_tons = trailing_mean(&tons, window);
    let avg_sales = trailing_mean(&sales, window);

    let gaps: Vec<i64> = series
        .iter()
        .enumerate()
        .map(|(i, ((_, month), _))| {
            if i == 0 {
                0
            } else {
                (*month - series[i - 1].0 .1).num_days()
            }
        })
        .collect();
    let median_gap = median(&gaps.iter().map(|g| *g as f64).collect::<Vec<_>>());

    for (i, ((account, month), (t, s))) in series.drain(..).enumerate() {
        out.push(MonthlyAggregate {
            account_name: account,
            month,
            tons: t,
            net_sales: s,
            avg6m_tons: avg_tons[i],
            avg6m_sales: avg_sales[i],
            gap_days: gaps[i],
            median_gap,
        });
    }
}

/// Rolling mean over the current value and up to `window - 1` prior values.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

//! Cadence classification — regular vs. sporadic buyers.
//!
//! A customer is regular when its median gap between monthly records is
//! short AND it has either enough invoices or enough distinct months.
//! The label is account-level; it never varies by month.

use crate::{
    config::CadenceConfig,
    invoice::InvoiceRecord,
    monthly_stage::{month_start, MonthlyAggregate},
    types::{AccountId, BuyerType, Month},
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct AccountCadence {
    pub account_name: AccountId,
    pub n_invoices:   usize,
    pub n_months:     usize,
    pub median_gap:   f64,
    pub buyer_type:   BuyerType,
}

/// Label one account from its counts and median gap.
pub fn classify_buyer(
    n_invoices: usize,
    n_months: usize,
    median_gap: f64,
    config: &CadenceConfig,
) -> BuyerType {
    let short_gap = median_gap <= config.max_median_gap_days;
    let enough_history = n_invoices >= config.min_invoices || n_months >= config.min_months;
    if short_gap && enough_history {
        BuyerType::Regular
    } else {
        BuyerType::Sporadic
    }
}

/// Per-account cadence, keyed by account name.
///
/// Invoice and month counts come from the raw invoices; median_gap comes
/// from the monthly aggregates so it matches the health table exactly.
pub fn classify_accounts(
    invoices: &[InvoiceRecord],
    monthly: &[MonthlyAggregate],
    config: &CadenceConfig,
) -> BTreeMap<AccountId, AccountCadence> {
    let mut counts: BTreeMap<&str, (usize, BTreeSet<Month>)> = BTreeMap::new();
    for inv in invoices {
        let entry = counts.entry(inv.account_name.as_str()).or_default();
        entry.0 += 1;
        entry.1.insert(month_start(inv.date));
    }

    let mut median_gaps: BTreeMap<&str, f64> = BTreeMap::new();
    for row in monthly {
        median_gaps.entry(row.account_name.as_str()).or_insert(row.median_gap);
    }

    counts
        .into_iter()
        .map(|(account, (n_invoices, months))| {
            let median_gap = median_gaps.get(account).copied().unwrap_or(0.0);
            let n_months = months.len();
            let cadence = AccountCadence {
                account_name: account.to_string(),
                n_invoices,
                n_months,
                median_gap,
                buyer_type: classify_buyer(n_invoices, n_months, median_gap, config),
            };
            (account.to_string(), cadence)
        })
        .collect()
}

//! Mock tidy invoices for demos and tests.
//!
//! Accounts cycle through a handful of buying profiles so every tier
//! and both cadence labels show up in a generated set. Output is fully
//! determined by the seed.

use crate::{invoice::InvoiceRecord, rng::SeededRng};
use chrono::{Datelike, Months, NaiveDate};

const PREFIXES: [&str; 8] = [
    "Lone Star", "Trinity", "Redbird", "Prairie", "Bluebonnet", "Gulf", "Summit", "Ironside",
];
const SUFFIXES: [&str; 6] = [
    "Fabrication", "Metals", "Welding", "Supply", "Machining", "Structures",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyingProfile {
    /// Steady monthly orders.
    Steady,
    /// Volume falls away over the last third of the window.
    Declining,
    /// Volume and frequency climb over the last third.
    Growing,
    /// Orders only some months.
    Sporadic,
    /// Stops ordering partway through.
    Lapsed,
}

impl BuyingProfile {
    const ALL: [BuyingProfile; 5] = [
        Self::Steady,
        Self::Declining,
        Self::Growing,
        Self::Sporadic,
        Self::Lapsed,
    ];

    pub fn for_index(i: usize) -> Self {
        Self::ALL[i % Self::ALL.len()]
    }
}

#[derive(Debug, Clone)]
pub struct MockSpec {
    pub seed:     u64,
    pub accounts: usize,
    pub months:   u32,
    pub start:    NaiveDate,
}

impl Default for MockSpec {
    fn default() -> Self {
        Self {
            seed: 42,
            accounts: 40,
            months: 24,
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
        }
    }
}

pub fn account_name(i: usize) -> String {
    format!(
        "{} {} {:03}",
        PREFIXES[i % PREFIXES.len()],
        SUFFIXES[(i / PREFIXES.len()) % SUFFIXES.len()],
        i + 1
    )
}

/// Generate the invoice table described by `spec`.
pub fn generate_invoices(spec: &MockSpec) -> Vec<InvoiceRecord> {
    let mut out = Vec::new();
    for i in 0..spec.accounts {
        let mut rng = SeededRng::new(spec.seed, i as u64);
        let profile = BuyingProfile::for_index(i);
        generate_account(&account_name(i), profile, spec, &mut rng, &mut out);
    }
    out
}

fn generate_account(
    name: &str,
    profile: BuyingProfile,
    spec: &MockSpec,
    rng: &mut SeededRng,
    out: &mut Vec<InvoiceRecord>,
) {
    let base_tons = rng.uniform(5.0, 60.0);
    let price_per_ton = rng.uniform(1800.0, 2400.0);
    let turn = spec.months * 2 / 3;

    for m in 0..spec.months {
        let Some(month) = spec.start.checked_add_months(Months::new(m)) else { continue };
        let late = m >= turn;

        let (volume_factor, order_chance, max_invoices) = match profile {
            BuyingProfile::Steady => (1.0, 0.95, 3),
            BuyingProfile::Declining if late => (0.25, 0.7, 2),
            BuyingProfile::Declining => (1.0, 0.95, 3),
            BuyingProfile::Growing if late => (1.6, 1.0, 5),
            BuyingProfile::Growing => (1.0, 0.8, 2),
            BuyingProfile::Sporadic => (0.8, 0.25, 1),
            BuyingProfile::Lapsed if late => (0.0, 0.0, 0),
            BuyingProfile::Lapsed => (1.0, 0.9, 2),
        };

        if max_invoices == 0 || !rng.chance(order_chance) {
            continue;
        }

        let n_invoices = 1 + rng.next_u64_below(max_invoices);
        let month_tons = (base_tons * volume_factor * rng.normal(1.0, 0.1)).max(0.5);
        for _ in 0..n_invoices {
            let day = 1 + rng.next_u64_below(28) as u32;
            let date = NaiveDate::from_ymd_opt(month.year(), month.month(), day).unwrap_or(month);
            let tons = round2(month_tons / n_invoices as f64);
            let net_sales = round2(tons * price_per_ton * rng.uniform(0.95, 1.05));
            out.push(InvoiceRecord::new(name, date, tons, net_sales));
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

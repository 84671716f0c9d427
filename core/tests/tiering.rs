//! Tier classification tests — priority order, exclusivity, thresholds.

use account_health_core::{
    config::{TierRule, TierRules},
    health_stage::{sort_worst_first, HealthRecord},
    tier_stage::{TierClassifier, TierSignals},
    types::{BuyerType, Tier},
};
use chrono::NaiveDate;

fn classifier() -> TierClassifier {
    TierClassifier::new(&TierRules::default())
}

/// Signals for a row whose tons and sales move by the same ratio.
fn signals(ratio: f64, gap_days: f64, median_gap: f64) -> TierSignals {
    TierSignals::from_values(10.0 * ratio, 10.0, 1000.0 * ratio, 1000.0, gap_days, median_gap)
}

// ── Alert tiers ──────────────────────────────────────────────────────────────

/// A row that satisfies both the Black and the Red trigger is Black.
#[test]
fn black_wins_over_red() {
    let s = signals(0.40, 30.0, 30.0);
    assert_eq!(classifier().alert_tier(&s), Some(Tier::Black));
}

#[test]
fn drop_ratio_bands_map_to_alert_tiers() {
    let c = classifier();
    assert_eq!(c.alert_tier(&signals(0.49, 30.0, 30.0)), Some(Tier::Black));
    assert_eq!(c.alert_tier(&signals(0.50, 30.0, 30.0)), Some(Tier::Red));
    assert_eq!(c.alert_tier(&signals(0.69, 30.0, 30.0)), Some(Tier::Red));
    assert_eq!(c.alert_tier(&signals(0.70, 30.0, 30.0)), Some(Tier::Yellow));
    assert_eq!(c.alert_tier(&signals(0.84, 30.0, 30.0)), Some(Tier::Yellow));
    assert_eq!(c.alert_tier(&signals(0.85, 30.0, 30.0)), None);
}

/// The gap ratio alone can trigger every alert tier.
#[test]
fn gap_ratio_alone_triggers_alerts() {
    let c = classifier();
    assert_eq!(c.alert_tier(&signals(1.0, 60.0, 30.0)), Some(Tier::Yellow)); // 2.0
    assert_eq!(c.alert_tier(&signals(1.0, 100.0, 30.0)), Some(Tier::Red)); // 3.33
    assert_eq!(c.alert_tier(&signals(1.0, 300.0, 30.0)), Some(Tier::Black)); // 10.0
    assert_eq!(c.alert_tier(&signals(1.0, 52.5, 30.0)), None); // exactly 1.75
}

/// drop_ratio is the worse of the tons and sales ratios.
#[test]
fn drop_ratio_takes_the_worse_signal() {
    let s = TierSignals::from_values(10.0, 10.0, 450.0, 1000.0, 30.0, 30.0);
    assert_eq!(s.drop_ratio, 0.45);
    assert_eq!(s.rise_ratio, 1.0);
    assert_eq!(classifier().classify(&s).alert_tier, Some(Tier::Black));
}

/// A zero baseline gives ratio 1.0 for that signal and never triggers a tier.
#[test]
fn zero_baseline_is_neutral() {
    let s = TierSignals::from_values(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    assert!(s.substituted);
    assert_eq!(s.drop_ratio, 1.0);
    assert_eq!(s.gap_ratio, 0.0, "median_gap 0 gives gap ratio 0");
    assert_eq!(classifier().classify(&s).label(), None);
}

// ── Growth tiers ─────────────────────────────────────────────────────────────

/// Growth needs the rise AND the earlier-than-usual purchase.
#[test]
fn growth_requires_both_conditions() {
    let c = classifier();
    assert_eq!(c.growth_tier(&signals(1.40, 30.0, 30.0)), None, "gap_delta 0");
    assert_eq!(c.growth_tier(&signals(1.05, 0.0, 60.0)), None, "rise too small");
}

#[test]
fn growth_bands_in_priority_order() {
    let c = classifier();
    assert_eq!(c.growth_tier(&signals(1.40, 0.0, 30.0)), Some(Tier::Blue));
    assert_eq!(c.growth_tier(&signals(1.30, 5.0, 30.0)), Some(Tier::Green));
    // Blue fails on gap (-15 > -30), Green fails on gap (-15 > -20).
    assert_eq!(c.growth_tier(&signals(1.40, 15.0, 30.0)), Some(Tier::LightGreen));
    assert_eq!(c.growth_tier(&signals(1.10, 20.0, 30.0)), Some(Tier::LightGreen));
}

/// When an alert fires the growth tier is suppressed, even if the growth
/// conditions hold on their own.
#[test]
fn alert_suppresses_growth() {
    // tons halved, sales doubled: drop 0.5 → Red, rise 2.0
    let s = TierSignals::from_values(5.0, 10.0, 2000.0, 1000.0, 0.0, 60.0);
    let c = classifier();
    assert_eq!(c.growth_tier(&s), Some(Tier::Blue));

    let assigned = c.classify(&s);
    assert_eq!(assigned.alert_tier, Some(Tier::Red));
    assert_eq!(assigned.growth_tier, None);
    assert_eq!(assigned.label(), Some(Tier::Red));
}

/// Sweep a grid of signals: alert and growth tiers are never both set.
#[test]
fn alert_and_growth_never_both_present() {
    let c = classifier();
    for ratio in [0.1, 0.45, 0.6, 0.8, 0.9, 1.0, 1.15, 1.3, 1.5, 3.0] {
        for gap in [0.0, 5.0, 20.0, 30.0, 60.0, 120.0, 400.0] {
            for median in [0.0, 15.0, 30.0, 60.0] {
                let a = c.classify(&signals(ratio, gap, median));
                assert!(
                    !(a.alert_tier.is_some() && a.growth_tier.is_some()),
                    "both tiers set for ratio={ratio} gap={gap} median={median}"
                );
            }
        }
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

#[test]
fn thresholds_come_from_configuration() {
    let rules = TierRules {
        black: TierRule::new(0.90, 9.0),
        ..TierRules::default()
    };
    let c = TierClassifier::new(&rules);
    assert_eq!(c.alert_tier(&signals(0.80, 30.0, 30.0)), Some(Tier::Black));
    assert_eq!(classifier().alert_tier(&signals(0.80, 30.0, 30.0)), Some(Tier::Yellow));
}

#[test]
fn checks_evaluate_alerts_before_growth() {
    let order: Vec<Tier> = classifier().checks().map(|c| c.tier).collect();
    assert_eq!(
        order,
        vec![Tier::Black, Tier::Red, Tier::Yellow, Tier::Blue, Tier::Green, Tier::LightGreen]
    );
}

// ── Sorting ──────────────────────────────────────────────────────────────────

fn record(account: &str, tier: Option<Tier>, tons: f64, net_sales: f64) -> HealthRecord {
    HealthRecord {
        account_name: account.into(),
        month:        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        tons,
        net_sales,
        avg6m_tons:   tons,
        avg6m_sales:  net_sales,
        gap_days:     0,
        median_gap:   0.0,
        alert_tier:   tier.filter(|t| t.is_alert()),
        growth_tier:  tier.filter(|t| !t.is_alert()),
        tier_label:   tier,
        buyer_type:   BuyerType::Regular,
    }
}

/// Worst tier first, then tons desc, then net_sales desc; untiered last.
#[test]
fn health_rows_sort_worst_tier_first() {
    let mut rows = vec![
        record("untiered", None, 99.0, 9900.0),
        record("light", Some(Tier::LightGreen), 5.0, 500.0),
        record("red-small", Some(Tier::Red), 1.0, 100.0),
        record("black", Some(Tier::Black), 1.0, 100.0),
        record("red-big", Some(Tier::Red), 8.0, 100.0),
        record("red-big-rich", Some(Tier::Red), 8.0, 900.0),
        record("blue", Some(Tier::Blue), 2.0, 200.0),
    ];

    sort_worst_first(&mut rows);

    let order: Vec<&str> = rows.iter().map(|r| r.account_name.as_str()).collect();
    assert_eq!(
        order,
        vec!["black", "red-big-rich", "red-big", "red-small", "blue", "light", "untiered"]
    );
}

//! Rep alert tests — flagging union, severity ranking, messages, document.

use account_health_core::{
    alert_stage::{compose_alerts, sales_vs_baseline_pct, AlertReason, AlertRecord, AlertSignals},
    config::AlertConfig,
    decline_stage::DeclineRiskRecord,
    health_stage::HealthRecord,
    report::render_alert_document,
    store::TABLE_ALERTS,
    types::{BuyerType, PredStatus, Tier},
    HealthStore,
};
use chrono::NaiveDate;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn record(
    account: &str,
    month: u32,
    tier: Option<Tier>,
    gap_days: i64,
    median_gap: f64,
    net_sales: f64,
    avg6m_sales: f64,
) -> HealthRecord {
    HealthRecord {
        account_name: account.into(),
        month:        NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
        tons:         net_sales / 100.0,
        net_sales,
        avg6m_tons:   avg6m_sales / 100.0,
        avg6m_sales,
        gap_days,
        median_gap,
        alert_tier:   tier.filter(|t| t.is_alert()),
        growth_tier:  tier.filter(|t| !t.is_alert()),
        tier_label:   tier,
        buyer_type:   BuyerType::Regular,
    }
}

fn risk(account: &str, prob_decline: f64) -> DeclineRiskRecord {
    DeclineRiskRecord {
        account_name: account.into(),
        prob_decline,
        pred_status: if prob_decline >= 0.45 {
            PredStatus::LikelyDecline
        } else {
            PredStatus::LikelyStable
        },
    }
}

// ── Flagging ─────────────────────────────────────────────────────────────────

/// Silence plus a deep drop flags an untiered account with no model score.
#[test]
fn combo_drop_flags_without_tier_or_model() {
    let cfg = AlertConfig::default();
    let health = vec![record("Quiet", 6, None, 80, 30.0, 400.0, 1000.0)];

    let alerts = compose_alerts(&health, None, &cfg);

    assert_eq!(alerts.len(), 1);
    let a = &alerts[0];
    assert_eq!(a.prob_decline, 0.0, "absent risk counts as probability 0");
    assert!(close(a.sales_vs_baseline_pct, -60.0));
    assert!(a.rep_message.starts_with(AlertReason::SilenceAndDrop.as_str()));
}

#[test]
fn combo_drop_needs_both_conditions() {
    let cfg = AlertConfig::default();
    let quiet_only = AlertSignals::from_record(&record("A", 6, None, 80, 30.0, 900.0, 1000.0), None);
    let drop_only = AlertSignals::from_record(&record("B", 6, None, 30, 30.0, 100.0, 1000.0), None);
    // gap_vs_median exactly 45 is not "more than" the quiet limit
    let at_limit = AlertSignals::from_record(&record("C", 6, None, 75, 30.0, 100.0, 1000.0), None);

    assert!(!quiet_only.is_flagged(&cfg));
    assert!(!drop_only.is_flagged(&cfg));
    assert!(!at_limit.is_flagged(&cfg));
}

#[test]
fn red_tier_alone_is_not_flagged() {
    let health = vec![record("Dip", 6, Some(Tier::Red), 30, 30.0, 600.0, 1000.0)];
    assert!(compose_alerts(&health, None, &AlertConfig::default()).is_empty());
}

#[test]
fn probability_limit_is_inclusive() {
    let cfg = AlertConfig::default();
    let health = vec![
        record("AtLimit", 6, None, 30, 30.0, 1000.0, 1000.0),
        record("Below", 6, None, 30, 30.0, 1000.0, 1000.0),
    ];
    let probs = vec![risk("AtLimit", 0.60), risk("Below", 0.59)];

    let alerts = compose_alerts(&health, Some(&probs), &cfg);

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].account_name, "AtLimit");
    assert!(alerts[0].rep_message.starts_with("Predicted decline (ML)"));
}

/// An earlier Black month does not flag an account that has recovered.
#[test]
fn only_latest_record_per_account_counts() {
    let health = vec![
        record("Recovered", 3, Some(Tier::Black), 200, 30.0, 100.0, 1000.0),
        record("Recovered", 4, None, 31, 30.0, 1000.0, 1000.0),
    ];
    assert!(compose_alerts(&health, None, &AlertConfig::default()).is_empty());
}

// ── Severity and ordering ────────────────────────────────────────────────────

#[test]
fn severity_combines_tier_gap_and_drop() {
    let s = AlertSignals::from_record(&record("A", 6, Some(Tier::Red), 80, 30.0, 400.0, 1000.0), None);
    assert!(close(s.severity(), 200.0 + 50.0 + 60.0), "got {}", s.severity());

    // buying early and selling above norm add nothing
    let s = AlertSignals::from_record(&record("B", 6, Some(Tier::Blue), 10, 30.0, 1500.0, 1000.0), None);
    assert_eq!(s.severity(), 0.0);
}

#[test]
fn alerts_sorted_by_severity_and_truncated() {
    let cfg = AlertConfig { max_rows: 3, ..AlertConfig::default() };
    let health: Vec<HealthRecord> = [10, 90, 40, 70, 20]
        .iter()
        .enumerate()
        .map(|(i, gap)| {
            record(&format!("Black {i}"), 6, Some(Tier::Black), *gap, 0.0, 1000.0, 1000.0)
        })
        .collect();

    let alerts = compose_alerts(&health, None, &cfg);

    let order: Vec<&str> = alerts.iter().map(|a| a.account_name.as_str()).collect();
    assert_eq!(order, vec!["Black 1", "Black 3", "Black 2"]);
    assert!(alerts.windows(2).all(|w| w[0].severity >= w[1].severity));
}

#[test]
fn equal_severity_keeps_account_order() {
    let health = vec![
        record("Charlie", 6, Some(Tier::Black), 30, 30.0, 1000.0, 1000.0),
        record("Alpha", 6, Some(Tier::Black), 30, 30.0, 1000.0, 1000.0),
        record("Bravo", 6, Some(Tier::Black), 30, 30.0, 1000.0, 1000.0),
    ];

    let alerts = compose_alerts(&health, None, &AlertConfig::default());

    let order: Vec<&str> = alerts.iter().map(|a| a.account_name.as_str()).collect();
    assert_eq!(order, vec!["Alpha", "Bravo", "Charlie"]);
}

// ── Messages ─────────────────────────────────────────────────────────────────

#[test]
fn black_tier_message_text() {
    let s = AlertSignals::from_record(&record("A", 6, Some(Tier::Black), 95, 30.5, 300.0, 1000.0), None);
    assert_eq!(
        s.rep_message(&AlertConfig::default()),
        "Black tier customer • Last order 95d (typ 30d) • Sales ⬇︎70% vs. norm"
    );
}

#[test]
fn positive_deviation_uses_up_arrow() {
    let s = AlertSignals::from_record(&record("A", 6, None, 20, 30.0, 1500.0, 1000.0), Some(0.9));
    assert_eq!(
        s.rep_message(&AlertConfig::default()),
        "Predicted decline (ML) • Last order 20d (typ 30d) • Sales ⬆︎50% vs. norm"
    );
}

#[test]
fn zero_baseline_reads_as_no_deviation() {
    assert_eq!(sales_vs_baseline_pct(0.0, 0.0), 0.0);
    assert_eq!(sales_vs_baseline_pct(50.0, 0.0), 0.0);

    let health = vec![record("New", 1, Some(Tier::Black), 0, 0.0, 0.0, 0.0)];
    let alerts = compose_alerts(&health, None, &AlertConfig::default());
    assert_eq!(alerts[0].sales_vs_baseline_pct, 0.0);
    assert!(alerts[0].rep_message.ends_with("Sales ⬆︎0% vs. norm"));
}

// ── Document ─────────────────────────────────────────────────────────────────

#[test]
fn document_lists_every_alert_with_escaped_text() {
    let alerts = vec![
        AlertRecord {
            account_name:          "Smith & <Sons>".into(),
            tier_label:            Some(Tier::Black),
            gap_days:              80,
            sales_vs_baseline_pct: -60.0,
            prob_decline:          0.754,
            severity:              410.0,
            rep_message:           "Black tier customer".into(),
        },
        AlertRecord {
            account_name:          "Quiet Co".into(),
            tier_label:            None,
            gap_days:              20,
            sales_vs_baseline_pct: 12.34,
            prob_decline:          0.6,
            severity:              0.0,
            rep_message:           "Predicted decline (ML)".into(),
        },
    ];

    let html = render_alert_document(&alerts);

    assert!(html.contains("<title>Rep Alerts</title>"));
    assert!(html.contains("Customers That May Need Attention (2)"));
    assert!(html.contains("Smith &amp; &lt;Sons&gt;"));
    assert!(!html.contains("<Sons>"));
    assert!(html.contains("<td>-60.0%</td>"));
    assert!(html.contains("<td>+12.3%</td>"));
    assert!(html.contains("<td>0.75</td>"));
    assert!(html.contains("<td>410.0</td>"));
    assert_eq!(html.matches("<tr><td>").count(), 2);
    assert!(html.find("Smith").unwrap() < html.find("Quiet Co").unwrap(), "CSV order kept");
}

#[test]
fn empty_document_still_renders() {
    let html = render_alert_document(&[]);
    assert!(html.contains("Customers That May Need Attention (0)"));
    assert!(html.contains("<th>sales_vs_baseline_%</th>"));
}

/// The document carries the same columns, in the same order, as the CSV table.
#[test]
fn document_columns_match_csv_header() {
    let alert = AlertRecord {
        account_name:          "Acme".into(),
        tier_label:            Some(Tier::Black),
        gap_days:              31,
        sales_vs_baseline_pct: -66.0,
        prob_decline:          0.1,
        severity:              467.0,
        rep_message:           "Black tier customer".into(),
    };
    let alerts = vec![alert];
    let html = render_alert_document(&alerts);
    let mut store = HealthStore::in_memory();
    store.save_alert_table(&alerts, &html).unwrap();
    let csv = String::from_utf8(store.raw(TABLE_ALERTS).unwrap().unwrap()).unwrap();
    let header = csv.lines().next().unwrap();

    let expected: String = header.split(',').map(|c| format!("<th>{c}</th>")).collect();
    assert!(html.contains(&format!("<tr>{expected}</tr>")), "header {header} not mirrored in {html}");
}

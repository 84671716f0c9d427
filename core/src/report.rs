//! Human-readable rendering of the rep alert list.
//!
//! Same rows, same order as the CSV table; only presentation differs.

use std::fmt::Write;

use crate::alert_stage::AlertRecord;

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 6px 8px; }
th { background: #f0f0f0; text-align: left; }";

const COLUMNS: [&str; 7] = [
    "account_name",
    "tier_label",
    "gap_days",
    "sales_vs_baseline_%",
    "prob_decline",
    "severity",
    "rep_message",
];

pub fn render_alert_document(alerts: &[AlertRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "<!doctype html>");
    let _ = writeln!(output, "<html><head><meta charset='utf-8'><title>Rep Alerts</title>");
    let _ = writeln!(output, "<style>\n{STYLE}\n</style></head><body>");
    let _ = writeln!(
        output,
        "<h2>Customers That May Need Attention ({})</h2>",
        alerts.len()
    );

    let _ = writeln!(output, "<table>");
    let _ = write!(output, "<thead><tr>");
    for col in COLUMNS {
        let _ = write!(output, "<th>{}</th>", escape_html(col));
    }
    let _ = writeln!(output, "</tr></thead>");

    let _ = writeln!(output, "<tbody>");
    for alert in alerts {
        let tier = alert.tier_label.map(|t| t.as_str()).unwrap_or("");
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:+.1}%</td><td>{:.2}</td><td>{:.1}</td><td>{}</td></tr>",
            escape_html(&alert.account_name),
            tier,
            alert.gap_days,
            alert.sales_vs_baseline_pct,
            alert.prob_decline,
            alert.severity,
            escape_html(&alert.rep_message),
        );
    }
    let _ = writeln!(output, "</tbody>");
    let _ = writeln!(output, "</table>");
    let _ = writeln!(output, "</body></html>");

    output
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&'  => escaped.push_str("&amp;"),
            '<'  => escaped.push_str("&lt;"),
            '>'  => escaped.push_str("&gt;"),
            '"'  => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _    => escaped.push(c),
        }
    }
    escaped
}

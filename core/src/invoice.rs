//! Tidy invoice table — the input handed over by the cleaning step.
//!
//! One row per shipment event. Duplicates have already been removed
//! upstream; this module only checks shape and parses values.

use crate::{
    error::{HealthError, HealthResult},
    types::AccountId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

pub const COL_ACCOUNT: &str = "account_name";
pub const COL_DATE: &str = "date";
pub const COL_WEIGHT: &str = "shipped_weight";
pub const COL_SALES: &str = "net_sales";

const REQUIRED: &[&str] = &[COL_ACCOUNT, COL_DATE, COL_WEIGHT, COL_SALES];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub account_name: AccountId,
    pub date: NaiveDate,
    pub shipped_weight: f64,
    pub net_sales: f64,
}

impl InvoiceRecord {
    pub fn new(account: &str, date: NaiveDate, shipped_weight: f64, net_sales: f64) -> Self {
        Self {
            account_name: account.to_string(),
            date,
            shipped_weight,
            net_sales,
        }
    }
}

/// Read a tidy invoice CSV from disk.
pub fn read_invoices(path: impl AsRef<Path>) -> HealthResult<Vec<InvoiceRecord>> {
    let file = std::fs::File::open(path.as_ref())?;
    read_invoices_from(file)
}

/// Read a tidy invoice CSV from any reader.
///
/// Header names are matched case-insensitively after trimming. Extra
/// columns are ignored; missing required ones abort with `MissingColumns`.
pub fn read_invoices_from<R: Read>(reader: R) -> HealthResult<Vec<InvoiceRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let indices: HashMap<String, usize> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();

    let missing: Vec<String> = REQUIRED
        .iter()
        .filter(|c| !indices.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(HealthError::MissingColumns(missing));
    }

    let idx = |col: &str| indices[col];
    let (i_acct, i_date, i_weight, i_sales) =
        (idx(COL_ACCOUNT), idx(COL_DATE), idx(COL_WEIGHT), idx(COL_SALES));

    let mut out = Vec::new();
    for (n, result) in rdr.records().enumerate() {
        let record = result?;
        let line = n as u64 + 1;
        let field = |i: usize| record.get(i).unwrap_or("");

        let account = field(i_acct);
        if account.is_empty() {
            return Err(HealthError::InvalidRecord { line, reason: "empty account_name".into() });
        }
        let date = parse_date(field(i_date))
            .ok_or_else(|| HealthError::InvalidRecord {
                line,
                reason: format!("unparsable date '{}'", field(i_date)),
            })?;
        let shipped_weight = parse_number(field(i_weight), line, COL_WEIGHT)?;
        let net_sales = parse_number(field(i_sales), line, COL_SALES)?;

        out.push(InvoiceRecord::new(account, date, shipped_weight, net_sales));
    }

    log::debug!("read {} invoice rows", out.len());
    Ok(out)
}

/// Write a tidy invoice table, e.g. a generated mock set.
pub fn write_invoices(path: impl AsRef<Path>, invoices: &[InvoiceRecord]) -> HealthResult<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    for invoice in invoices {
        wtr.serialize(invoice)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.split(|c: char| c == 'T' || c.is_whitespace()).next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_number(raw: &str, line: u64, column: &str) -> HealthResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| HealthError::InvalidRecord {
            line,
            reason: format!("{column} '{raw}' is not a number"),
        })
}

//! Table persistence at stage boundaries.
//!
//! RULE: Only store.rs reads or writes output tables.
//! Stages call store methods — they never touch files directly.
//!
//! Every save replaces a whole table. On disk the bytes go to a
//! temporary file first and are renamed into place, so a failed write
//! never leaves a half-written table behind.

use crate::{
    alert_stage::AlertRecord,
    decline_stage::DeclineRiskRecord,
    error::HealthResult,
    health_stage::HealthRecord,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const TABLE_INVOICES: &str = "invoices_clean.csv";
pub const TABLE_HEALTH: &str = "customer_health_full.csv";
pub const TABLE_DECLINE: &str = "customer_decline_probs.csv";
pub const TABLE_ALERTS: &str = "rep_contact_list.csv";
pub const DOC_ALERTS: &str = "rep_contact_list.html";

enum Backend {
    Directory(PathBuf),
    Memory(BTreeMap<&'static str, Vec<u8>>),
}

pub struct HealthStore {
    backend: Backend,
}

impl HealthStore {
    /// Store tables as files under `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> HealthResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { backend: Backend::Directory(dir) })
    }

    /// Keep tables in memory (used in tests).
    pub fn in_memory() -> Self {
        Self { backend: Backend::Memory(BTreeMap::new()) }
    }

    /// Where a table lives on disk, if this store is directory-backed.
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        match &self.backend {
            Backend::Directory(dir) => Some(dir.join(name)),
            Backend::Memory(_) => None,
        }
    }

    // ── Raw bytes ──────────────────────────────────────────────

    /// The exact persisted bytes of a table, `None` if never written.
    pub fn raw(&self, name: &'static str) -> HealthResult<Option<Vec<u8>>> {
        match &self.backend {
            Backend::Directory(dir) => {
                let path = dir.join(name);
                if !path.exists() {
                    return Ok(None);
                }
                Ok(Some(std::fs::read(path)?))
            }
            Backend::Memory(tables) => Ok(tables.get(name).cloned()),
        }
    }

    fn put(&mut self, name: &'static str, bytes: Vec<u8>) -> HealthResult<()> {
        match &mut self.backend {
            Backend::Directory(dir) => {
                let path = dir.join(name);
                let tmp = dir.join(format!("{name}.tmp"));
                std::fs::write(&tmp, &bytes)?;
                std::fs::rename(&tmp, &path)?;
            }
            Backend::Memory(tables) => {
                tables.insert(name, bytes);
            }
        }
        Ok(())
    }

    fn save_rows<T: Serialize>(&mut self, name: &'static str, rows: &[T]) -> HealthResult<()> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in rows {
            wtr.serialize(row)?;
        }
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
        self.put(name, bytes)
    }

    fn load_rows<T: DeserializeOwned>(&self, name: &'static str) -> HealthResult<Option<Vec<T>>> {
        let Some(bytes) = self.raw(name)? else {
            return Ok(None);
        };
        let mut rdr = csv::Reader::from_reader(bytes.as_slice());
        let rows = rdr.deserialize().collect::<Result<Vec<T>, _>>()?;
        Ok(Some(rows))
    }

    // ── Monthly health ─────────────────────────────────────────

    pub fn save_health_table(&mut self, rows: &[HealthRecord]) -> HealthResult<()> {
        self.save_rows(TABLE_HEALTH, rows)
    }

    pub fn load_health_table(&self) -> HealthResult<Option<Vec<HealthRecord>>> {
        self.load_rows(TABLE_HEALTH)
    }

    // ── Decline risk ───────────────────────────────────────────

    pub fn save_decline_table(&mut self, rows: &[DeclineRiskRecord]) -> HealthResult<()> {
        self.save_rows(TABLE_DECLINE, rows)
    }

    pub fn load_decline_table(&self) -> HealthResult<Option<Vec<DeclineRiskRecord>>> {
        self.load_rows(TABLE_DECLINE)
    }

    // ── Alerts ─────────────────────────────────────────────────

    /// Save both renderings of the alert list together.
    pub fn save_alert_table(&mut self, rows: &[AlertRecord], document: &str) -> HealthResult<()> {
        self.save_rows(TABLE_ALERTS, rows)?;
        self.put(DOC_ALERTS, document.as_bytes().to_vec())
    }

    pub fn load_alert_table(&self) -> HealthResult<Option<Vec<AlertRecord>>> {
        self.load_rows(TABLE_ALERTS)
    }
}

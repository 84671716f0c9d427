//! Stage trait.
//!
//! RULE: Every pipeline stage implements PipelineStage.
//! A stage reads its full input tables from the store, computes in
//! memory and writes its full output table back. Stages never call
//! each other; the store is the only handoff.

use crate::{config::HealthConfig, error::HealthResult, store::HealthStore};

/// The contract every stage must fulfill.
pub trait PipelineStage {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Run the stage to completion. On error nothing is written.
    fn run(&self, store: &mut HealthStore, config: &HealthConfig) -> HealthResult<StageReport>;
}

/// What a completed stage reports back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: &'static str,
    pub rows:  usize,
    /// Mean held-out AUC, decline-risk stage only.
    pub mean_auc: Option<f64>,
}

impl StageReport {
    pub fn new(stage: &'static str, rows: usize) -> Self {
        Self { stage, rows, mean_auc: None }
    }

    pub fn with_auc(mut self, auc: Option<f64>) -> Self {
        self.mean_auc = auc;
        self
    }
}

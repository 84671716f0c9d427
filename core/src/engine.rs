//! The pipeline engine.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Health stage        (aggregate → tier → cadence)
//!   2. Decline-risk stage  (train on history, score latest month)
//!   3. Alert stage         (union of signals, rank, truncate)
//!
//! RULES:
//!   - Stages execute in registration order, each to completion.
//!   - A stage reads only tables written by earlier stages.
//!   - The first failing stage halts the run; tables written by
//!     stages that already completed stay in the store.
//!   - Configuration is validated before any stage runs.

use crate::{
    alert_stage::AlertStage,
    config::HealthConfig,
    decline_stage::DeclineRiskStage,
    error::HealthResult,
    health_stage::HealthStage,
    invoice::InvoiceRecord,
    stage::{PipelineStage, StageReport},
    store::HealthStore,
};

/// Per-stage outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<StageReport>,
}

impl RunSummary {
    pub fn rows_for(&self, stage: &str) -> Option<usize> {
        self.reports.iter().find(|r| r.stage == stage).map(|r| r.rows)
    }

    pub fn mean_auc(&self) -> Option<f64> {
        self.reports.iter().find_map(|r| r.mean_auc)
    }
}

pub struct HealthEngine {
    config: HealthConfig,
    store:  HealthStore,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl HealthEngine {
    pub fn new(config: HealthConfig, store: HealthStore) -> Self {
        Self { config, store, stages: Vec::new() }
    }

    /// Build a fully wired engine with all stages registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(config: HealthConfig, store: HealthStore, invoices: Vec<InvoiceRecord>) -> Self {
        let mut engine = HealthEngine::new(config, store);
        // EXECUTION ORDER — fixed, documented, never reordered.
        engine.register(Box::new(HealthStage::new(invoices)));
        engine.register(Box::new(DeclineRiskStage::new()));
        engine.register(Box::new(AlertStage::new()));
        engine
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, stage: Box<dyn PipelineStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn store(&self) -> &HealthStore {
        &self.store
    }

    pub fn into_store(self) -> HealthStore {
        self.store
    }

    /// Run every registered stage in order.
    pub fn run(&mut self) -> HealthResult<RunSummary> {
        self.config.validate()?;

        let mut summary = RunSummary::default();
        for stage in &self.stages {
            log::debug!("stage {} starting", stage.name());
            match stage.run(&mut self.store, &self.config) {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    log::error!("stage {} failed: {e}; run halted", stage.name());
                    return Err(e);
                }
            }
        }
        Ok(summary)
    }
}

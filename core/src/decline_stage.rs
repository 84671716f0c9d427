//! Decline-risk model — will this customer's sales fall off soon?
//!
//! This stage:
//!   1. Extracts one feature row per monthly health record
//!   2. Labels each row by looking `lookahead_months` rows ahead in the
//!      same account's series (1 = future sales below the decline ratio)
//!   3. Validates with forward-chaining folds over month-ordered rows
//!   4. Refits on the whole training set
//!   5. Scores only each account's most recent record
//!
//! Training and scoring share `feature_row`, so both always see the
//! same features.
//!
//! Reads: customer_health_full. Writes: customer_decline_probs.

use crate::{
    config::{HealthConfig, ModelConfig},
    error::{HealthError, HealthResult},
    health_stage::{latest_per_account, HealthRecord},
    linear_model::{forward_chaining_splits, roc_auc, LinearPipeline, LogisticParams},
    stage::{PipelineStage, StageReport},
    store::{HealthStore, TABLE_HEALTH},
    types::{AccountId, PredStatus},
};
use ndarray::{arr2, s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FeatureRow = [f64; 6];

pub const FEATURE_NAMES: [&str; 6] = [
    "sales_vs_baseline",
    "gap_days",
    "tons",
    "avg6m_sales",
    "avg6m_tons",
    "median_gap",
];

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclineRiskRecord {
    pub account_name: AccountId,
    pub prob_decline: f64,
    pub pred_status:  PredStatus,
}

/// One row per labelled record, columns in `FEATURE_NAMES` order.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub records: Array2<f64>,
    pub labels:  Array1<bool>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|y| **y).count()
    }
}

#[derive(Debug, Clone)]
pub struct DeclineModel {
    pub pipeline:      LinearPipeline,
    pub fold_aucs:     Vec<f64>,
    pub mean_auc:      Option<f64>,
    pub training_rows: usize,
    pub positives:     usize,
}

// ── Features and labels ──────────────────────────────────────────────────────

/// Feature vector for one record; non-finite values become NaN (missing).
pub fn feature_row(r: &HealthRecord) -> FeatureRow {
    [
        r.net_sales / r.avg6m_sales,
        r.gap_days as f64,
        r.tons,
        r.avg6m_sales,
        r.avg6m_tons,
        r.median_gap,
    ]
    .map(|v| if v.is_finite() { v } else { f64::NAN })
}

/// Records grouped per account, each series ordered by month.
fn account_series(rows: &[HealthRecord]) -> BTreeMap<&str, Vec<&HealthRecord>> {
    let mut series: BTreeMap<&str, Vec<&HealthRecord>> = BTreeMap::new();
    for row in rows {
        series.entry(row.account_name.as_str()).or_default().push(row);
    }
    for list in series.values_mut() {
        list.sort_by_key(|r| r.month);
    }
    series
}

/// Forward label for `series[i]`; `None` past the end of the series or
/// when the future ratio is undefined.
pub fn forward_label(series: &[&HealthRecord], i: usize, cfg: &ModelConfig) -> Option<bool> {
    let future = i
        .checked_add(cfg.lookahead_months)
        .and_then(|j| series.get(j))?;
    let ratio = future.net_sales / future.avg6m_sales;
    if !ratio.is_finite() {
        return None;
    }
    Some(ratio < cfg.decline_ratio)
}

/// Rows with a defined label and all-finite features, ordered by month
/// then account so that validation folds never train on the future.
pub fn build_training_set(rows: &[HealthRecord], cfg: &ModelConfig) -> TrainingSet {
    let mut labelled: Vec<(&HealthRecord, FeatureRow, bool)> = Vec::new();
    for series in account_series(rows).values() {
        for (i, record) in series.iter().enumerate() {
            let Some(label) = forward_label(series, i, cfg) else { continue };
            let features = feature_row(record);
            if features.iter().all(|v| v.is_finite()) {
                labelled.push((record, features, label));
            }
        }
    }

    labelled.sort_by(|a, b| {
        a.0.month
            .cmp(&b.0.month)
            .then_with(|| a.0.account_name.cmp(&b.0.account_name))
    });

    let (features, labels): (Vec<FeatureRow>, Vec<bool>) =
        labelled.into_iter().map(|(_, f, y)| (f, y)).unzip();
    TrainingSet { records: arr2(features.as_slice()), labels: Array1::from(labels) }
}

// ── Training and scoring ─────────────────────────────────────────────────────

fn logistic_params(cfg: &ModelConfig) -> LogisticParams {
    LogisticParams {
        alpha: 1.0 / cfg.l2_strength,
        max_iterations: cfg.max_iterations,
        gradient_tolerance: cfg.tolerance,
    }
}

/// Validate with forward-chaining folds, then refit on everything.
pub fn train_decline_model(rows: &[HealthRecord], cfg: &ModelConfig) -> HealthResult<DeclineModel> {
    let training = build_training_set(rows, cfg);
    let params = logistic_params(cfg);

    let mut fold_aucs = Vec::new();
    for (fold, (train, test)) in forward_chaining_splits(training.len(), cfg.cv_splits)
        .into_iter()
        .enumerate()
    {
        let fitted = match LinearPipeline::fit(
            training.records.slice(s![train.clone(), ..]),
            training.labels.slice(s![train]),
            &params,
        ) {
            Ok(p) => p,
            Err(HealthError::DegenerateTrainingSet { .. }) => {
                log::warn!("decline: fold {fold} skipped, training slice holds one class");
                continue;
            }
            Err(e) => return Err(e),
        };

        let scores = fitted.predict_proba(training.records.slice(s![test.clone(), ..]));
        match roc_auc(training.labels.slice(s![test]), scores.view()) {
            Some(auc) => {
                log::debug!("decline: fold {fold} held-out AUC {auc:.3}");
                fold_aucs.push(auc);
            }
            None => log::warn!("decline: fold {fold} skipped, test slice holds one class"),
        }
    }

    let mean_auc = if fold_aucs.is_empty() {
        None
    } else {
        Some(fold_aucs.iter().sum::<f64>() / fold_aucs.len() as f64)
    };

    let pipeline = LinearPipeline::fit(training.records.view(), training.labels.view(), &params)?;

    Ok(DeclineModel {
        pipeline,
        fold_aucs,
        mean_auc,
        training_rows: training.len(),
        positives: training.positives(),
    })
}

/// Score each account's most recent record.
///
/// Every account is scored: missing features on the latest record are
/// filled with the training medians.
pub fn score_latest(
    model: &DeclineModel,
    rows: &[HealthRecord],
    cfg: &ModelConfig,
) -> Vec<DeclineRiskRecord> {
    let latest = latest_per_account(rows);
    let features: Vec<FeatureRow> = latest.iter().copied().map(feature_row).collect();
    let probs = model.pipeline.predict_proba(arr2(features.as_slice()).view());

    latest
        .into_iter()
        .zip(probs.iter().copied())
        .map(|(record, prob_decline)| {
            let pred_status = if prob_decline >= cfg.prob_cutoff {
                PredStatus::LikelyDecline
            } else {
                PredStatus::LikelyStable
            };
            DeclineRiskRecord {
                account_name: record.account_name.clone(),
                prob_decline,
                pred_status,
            }
        })
        .collect()
}

// ── Stage ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct DeclineRiskStage;

impl DeclineRiskStage {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStage for DeclineRiskStage {
    fn name(&self) -> &'static str { "decline_risk" }

    fn run(&self, store: &mut HealthStore, config: &HealthConfig) -> HealthResult<StageReport> {
        let health = store
            .load_health_table()?
            .ok_or_else(|| HealthError::missing_input(TABLE_HEALTH))?;

        let model = train_decline_model(&health, &config.model)?;
        let scored = score_latest(&model, &health, &config.model);
        store.save_decline_table(&scored)?;

        let flagged = scored
            .iter()
            .filter(|r| r.pred_status == PredStatus::LikelyDecline)
            .count();
        log::info!(
            "decline_risk: trained on {} rows ({} declines), scored {} accounts, {flagged} likely to decline",
            model.training_rows,
            model.positives,
            scored.len(),
        );
        match model.mean_auc {
            Some(auc) => log::info!("decline_risk: mean held-out AUC {auc:.3} over {} folds", model.fold_aucs.len()),
            None => log::warn!("decline_risk: no validation fold produced an AUC"),
        }

        Ok(StageReport::new(self.name(), scored.len()).with_auc(model.mean_auc))
    }
}

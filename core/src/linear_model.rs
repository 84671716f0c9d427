//! Small linear-classifier toolkit used by the decline-risk stage.
//!
//! Pieces, applied in this order by `LinearPipeline`:
//!   1. MedianImputer   — NaN features replaced by the training median
//!   2. LinearScaler    — divide by the population std dev, no centering
//!   3. LogisticRegression — L2-regularised, sample-weighted, Newton fit
//!
//! Everything here is deterministic: no random initialisation, no
//! shuffling. Identical inputs produce bit-identical coefficients.

use crate::{
    error::{HealthError, HealthResult},
    types::median,
};
use linfa::prelude::*;
use linfa_linalg::cholesky::InverseC;
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::ops::Range;

// ── Imputation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MedianImputer {
    pub medians: Array1<f64>,
}

impl MedianImputer {
    /// Column medians over finite values; 0.0 for a column with none.
    pub fn fit(records: ArrayView2<f64>) -> Self {
        let medians = records
            .axis_iter(Axis(1))
            .map(|col| {
                let finite: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
                median(&finite)
            })
            .collect();
        Self { medians }
    }

    pub fn transform(&self, records: ArrayView2<f64>) -> Array2<f64> {
        let mut out = records.to_owned();
        for mut row in out.rows_mut() {
            row.zip_mut_with(&self.medians, |v, m| {
                if !v.is_finite() {
                    *v = *m;
                }
            });
        }
        out
    }
}

// ── Logistic regression ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticParams {
    /// Weight of the L2 penalty on the coefficients (1 / C).
    pub alpha: f64,
    pub max_iterations: usize,
    /// Largest absolute gradient component accepted as converged.
    pub gradient_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    pub weights:    Array1<f64>,
    pub intercept:  f64,
    pub iterations: usize,
    pub converged:  bool,
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// log(1 + e^z) - y·z, computed without overflow.
fn log_loss(y: f64, z: f64) -> f64 {
    let softplus = if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
    softplus - y * z
}

/// Records with a trailing column of ones for the intercept.
fn with_intercept(records: ArrayView2<f64>) -> Array2<f64> {
    let (n, dims) = records.dim();
    Array2::from_shape_fn((n, dims + 1), |(i, j)| if j < dims { records[[i, j]] } else { 1.0 })
}

/// Sample-weighted, L2-penalised logistic objective over a design matrix
/// whose last column is the (unpenalised) intercept.
struct WeightedObjective<'a, 'w> {
    design:  &'a Array2<f64>,
    targets: Array1<f64>,
    weights: ArrayView1<'w, f64>,
    penalty: Array1<f64>,
}

impl WeightedObjective<'_, '_> {
    fn loss(&self, theta: &Array1<f64>) -> f64 {
        let z = self.design.dot(theta);
        let data: f64 = z
            .iter()
            .zip(self.targets.iter())
            .zip(self.weights.iter())
            .map(|((z, y), s)| s * log_loss(*y, *z))
            .sum();
        data + 0.5 * (&self.penalty * theta).dot(theta)
    }

    fn gradient_hessian(&self, theta: &Array1<f64>) -> (Array1<f64>, Array2<f64>) {
        let p = self.design.dot(theta).mapv(sigmoid);
        let residual = &self.weights * &(&p - &self.targets);
        let gradient = self.design.t().dot(&residual) + &self.penalty * theta;

        let curvature = &self.weights * &p.mapv(|v| v * (1.0 - v));
        let weighted = self.design * &curvature.insert_axis(Axis(1));
        let hessian = self.design.t().dot(&weighted) + Array2::from_diag(&self.penalty);
        (gradient, hessian)
    }
}

impl LogisticRegression {
    /// Minimise `0.5·alpha·‖w‖² + Σ sᵢ·logloss(yᵢ, σ(w·xᵢ + b))`.
    ///
    /// The intercept is not penalised. Newton steps with step halving
    /// keep the objective non-increasing. A step that cannot lower the
    /// objective stops the fit without marking it converged.
    pub fn fit(
        records: ArrayView2<f64>,
        labels: ArrayView1<bool>,
        sample_weight: ArrayView1<f64>,
        params: &LogisticParams,
    ) -> Self {
        let dims = records.ncols();
        let design = with_intercept(records);
        let mut penalty = Array1::from_elem(dims + 1, params.alpha);
        penalty[dims] = 0.0;
        let objective = WeightedObjective {
            design: &design,
            targets: labels.mapv(|y| if y { 1.0 } else { 0.0 }),
            weights: sample_weight,
            penalty,
        };

        let mut theta = Array1::<f64>::zeros(dims + 1);
        let mut current = objective.loss(&theta);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < params.max_iterations {
            let (gradient, hessian) = objective.gradient_hessian(&theta);
            if gradient.iter().all(|g| g.abs() < params.gradient_tolerance) {
                converged = true;
                break;
            }
            iterations += 1;

            let Ok(inverse) = hessian.invc() else { break };
            let step = inverse.dot(&gradient);

            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..30 {
                let candidate = &theta - &(&step * scale);
                let loss = objective.loss(&candidate);
                if loss <= current {
                    accepted = Some((candidate, loss));
                    break;
                }
                scale *= 0.5;
            }
            let Some((next, loss)) = accepted else { break };
            theta = next;
            current = loss;
        }

        let intercept = theta[dims];
        let weights = theta.slice_move(ndarray::s![..dims]);
        Self { weights, intercept, iterations, converged }
    }

    /// Probability of class 1 for every row.
    pub fn predict_proba(&self, records: ArrayView2<f64>) -> Array1<f64> {
        (records.dot(&self.weights) + self.intercept).mapv(sigmoid)
    }
}

// ── Class weighting ──────────────────────────────────────────────────────────

/// Weights `n / (2·count(class))`, so each class carries equal total weight.
pub fn balanced_weights(labels: ArrayView1<bool>) -> Array1<f64> {
    let n = labels.len() as f64;
    let positives = labels.iter().filter(|y| **y).count() as f64;
    let negatives = n - positives;
    let w_pos = if positives > 0.0 { n / (2.0 * positives) } else { 0.0 };
    let w_neg = if negatives > 0.0 { n / (2.0 * negatives) } else { 0.0 };
    labels.mapv(|y| if y { w_pos } else { w_neg })
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LinearPipeline {
    pub imputer: MedianImputer,
    pub scaler:  LinearScaler<f64>,
    pub model:   LogisticRegression,
}

impl LinearPipeline {
    /// Fit impute → scale → class-balanced logistic regression.
    ///
    /// Fails when the labels do not contain both classes.
    pub fn fit(
        records: ArrayView2<f64>,
        labels: ArrayView1<bool>,
        params: &LogisticParams,
    ) -> HealthResult<Self> {
        let positives = labels.iter().filter(|y| **y).count();
        if records.nrows() == 0 || positives == 0 || positives == labels.len() {
            return Err(HealthError::DegenerateTrainingSet { rows: labels.len(), positives });
        }

        let imputer = MedianImputer::fit(records);
        let dataset = DatasetBase::new(imputer.transform(records), labels.to_owned());
        let scaler = LinearScaler::standard_no_mean()
            .fit(&dataset)
            .map_err(|e| anyhow::anyhow!("feature scaling failed: {e}"))?;
        let scaled = scaler.transform(dataset.records);

        let weights = balanced_weights(labels);
        let model = LogisticRegression::fit(scaled.view(), labels, weights.view(), params);

        if !model.converged {
            log::warn!("logistic regression stopped after {} iterations without converging", model.iterations);
        }
        Ok(Self { imputer, scaler, model })
    }

    pub fn predict_proba(&self, records: ArrayView2<f64>) -> Array1<f64> {
        let scaled = self.scaler.transform(self.imputer.transform(records));
        self.model.predict_proba(scaled.view())
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Forward-chaining splits over `n` ordered samples.
///
/// Fold `i` tests on the `i`-th of `k` equal trailing blocks and trains on
/// everything before it. Returns no folds when `n < k + 1`.
pub fn forward_chaining_splits(n: usize, k: usize) -> Vec<(Range<usize>, Range<usize>)> {
    if k == 0 {
        return Vec::new();
    }
    let test_size = n / (k + 1);
    if test_size == 0 {
        return Vec::new();
    }
    let first_test = n - k * test_size;
    (0..k)
        .map(|i| {
            let start = first_test + i * test_size;
            (0..start, start..start + test_size)
        })
        .collect()
}

/// Area under the ROC curve via the rank-sum statistic (ties averaged).
///
/// `None` when `labels` holds a single class.
pub fn roc_auc(labels: ArrayView1<bool>, scores: ArrayView1<f64>) -> Option<f64> {
    let n_pos = labels.iter().filter(|y| **y).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = Array1::<f64>::zeros(scores.len());
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(ranks.iter())
        .filter(|(y, _)| **y)
        .map(|(_, r)| *r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params() -> LogisticParams {
        LogisticParams { alpha: 1.0, max_iterations: 200, gradient_tolerance: 1e-10 }
    }

    #[test]
    fn imputer_uses_finite_median() {
        let x = array![[1.0, f64::NAN], [3.0, 4.0], [f64::INFINITY, 6.0]];
        let imp = MedianImputer::fit(x.view());
        assert_eq!(imp.medians, array![2.0, 5.0]);
        assert_eq!(imp.transform(array![[f64::NAN, 1.0]].view()), array![[2.0, 1.0]]);
    }

    /// Scale-only: ratios between rows survive, nothing goes negative.
    #[test]
    fn scaling_does_not_center() {
        let x = array![[10.0, 1.0], [14.0, 3.0], [12.0, 2.0]];
        let labels = array![false, true, false];
        let p = LinearPipeline::fit(x.view(), labels.view(), &params()).unwrap();

        let scaled = p.scaler.transform(x.clone());
        assert!(scaled.iter().all(|v| *v > 0.0), "centering would make some values negative");
        assert!((scaled[[1, 1]] / scaled[[0, 1]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn splits_train_only_on_earlier_rows() {
        let folds = forward_chaining_splits(10, 4);
        assert_eq!(folds.len(), 4);
        assert_eq!(folds[0], (0..2, 2..4));
        assert_eq!(folds[3], (0..8, 8..10));
        for (train, test) in &folds {
            assert_eq!(train.end, test.start);
        }
        assert!(forward_chaining_splits(3, 4).is_empty());
    }

    #[test]
    fn auc_handles_perfect_and_tied_scores() {
        let y = array![false, false, true, true];
        assert_eq!(roc_auc(y.view(), array![0.1, 0.2, 0.8, 0.9].view()), Some(1.0));
        assert_eq!(roc_auc(array![false, true].view(), array![0.5, 0.5].view()), Some(0.5));
        assert_eq!(roc_auc(array![true, true].view(), array![0.1, 0.2].view()), None);
    }

    #[test]
    fn balanced_weights_equalise_classes() {
        let w = balanced_weights(array![true, false, false, false].view());
        assert_eq!(w, array![2.0, 2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0]);
    }

    fn step_data() -> (Array2<f64>, Array1<bool>) {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| i >= 10);
        (x, y)
    }

    #[test]
    fn logistic_separates_simple_data() {
        let (x, y) = step_data();
        let s = Array1::ones(20);
        let m = LogisticRegression::fit(x.view(), y.view(), s.view(), &params());
        assert!(m.converged);
        let p = m.predict_proba(array![[19.0], [0.0]].view());
        assert!(p[0] > 0.9, "got {}", p[0]);
        assert!(p[1] < 0.1, "got {}", p[1]);
    }

    /// Running out of iterations is reported, not mistaken for convergence.
    #[test]
    fn exhausted_budget_is_not_converged() {
        let (x, y) = step_data();
        let s = Array1::ones(20);
        let budget = LogisticParams { max_iterations: 1, ..params() };

        let m = LogisticRegression::fit(x.view(), y.view(), s.view(), &budget);

        assert_eq!(m.iterations, 1);
        assert!(!m.converged);
    }

    #[test]
    fn pipeline_rejects_single_class() {
        let x = array![[1.0], [2.0]];
        let err = LinearPipeline::fit(x.view(), array![false, false].view(), &params()).unwrap_err();
        assert!(matches!(err, HealthError::DegenerateTrainingSet { rows: 2, positives: 0 }));
    }
}

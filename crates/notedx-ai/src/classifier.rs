//! Linear classifiers over sparse TF-IDF rows.
//!
//! Two strategies share one weight layout ([`LinearWeights`], one row per
//! class in sorted class order):
//!
//! - multinomial logistic regression, full-batch gradient descent with an L2
//!   penalty, native softmax probabilities;
//! - one-vs-rest linear SVM, hinge-loss SGD with a seeded shuffle, optionally
//!   wrapped in cross-validated per-class sigmoid calibration.

use notedx_core::{ClassifierConfig, ClassifierStrategy};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::{self, CalibratedFold};
use crate::vectorizer::SparseVec;

/// Fixed gradient descent step. Rows are unit length, so the softmax loss
/// gradient is 1-Lipschitz and this step stays inside the stable region.
const LOGISTIC_STEP: f64 = 1.0;

/// Logistic descent stops early once every gradient entry is below this.
const LOGISTIC_TOL: f64 = 1e-6;

/// Intercept updates are damped by this factor in SGD (sparse inputs).
const SGD_INTERCEPT_DECAY: f64 = 0.01;

/// Lazy weight scale is folded back into the weights below this value.
const MIN_WEIGHT_SCALE: f64 = 1e-9;

/// Dense coefficients plus intercepts, one row per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearWeights {
    fn zeros(n_classes: usize, n_features: usize) -> Self {
        Self {
            coef: vec![vec![0.0; n_features]; n_classes],
            intercept: vec![0.0; n_classes],
        }
    }

    /// One score per class: `w_k · x + b_k`.
    pub fn decision(&self, x: &SparseVec) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(w, b)| dot(w, x) + b)
            .collect()
    }
}

/// A fitted classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassifierModel {
    Logistic(LinearWeights),
    LinearSvm {
        weights: LinearWeights,
        /// Calibrated fold models when calibrated; `None` means the model
        /// only has margins.
        calibration: Option<Vec<CalibratedFold>>,
    },
}

impl ClassifierModel {
    /// Fit the strategy named in `config`. `y` holds class indices in
    /// `0..n_classes`.
    pub fn fit(
        x: &[SparseVec],
        y: &[usize],
        n_classes: usize,
        n_features: usize,
        config: &ClassifierConfig,
        seed: u64,
    ) -> Self {
        match config.strategy {
            ClassifierStrategy::Logistic => {
                Self::Logistic(fit_logistic(x, y, n_classes, n_features, config))
            }
            ClassifierStrategy::LinearSvm => {
                let weights = fit_linear_svm(x, y, n_classes, n_features, config, seed);
                let calibration = config.calibrate.then(|| {
                    calibration::fit_calibrated_folds(
                        x,
                        y,
                        n_classes,
                        n_features,
                        config,
                        seed,
                        &weights,
                    )
                });
                Self::LinearSvm {
                    weights,
                    calibration,
                }
            }
        }
    }

    pub fn strategy(&self) -> ClassifierStrategy {
        match self {
            Self::Logistic(_) => ClassifierStrategy::Logistic,
            Self::LinearSvm { .. } => ClassifierStrategy::LinearSvm,
        }
    }

    pub fn supports_proba(&self) -> bool {
        match self {
            Self::Logistic(_) => true,
            Self::LinearSvm { calibration, .. } => calibration.is_some(),
        }
    }

    pub fn decision(&self, x: &SparseVec) -> Vec<f64> {
        match self {
            Self::Logistic(weights) | Self::LinearSvm { weights, .. } => weights.decision(x),
        }
    }

    /// Unnormalized per-class probability scores, or `None` without
    /// probability support. Callers renormalize.
    pub fn raw_proba(&self, x: &SparseVec) -> Option<Vec<f64>> {
        match self {
            Self::Logistic(weights) => Some(softmax(&weights.decision(x))),
            Self::LinearSvm {
                calibration: Some(folds),
                ..
            } => Some(calibration::ensemble_proba(folds, x)),
            Self::LinearSvm {
                calibration: None, ..
            } => None,
        }
    }
}

// ── Logistic regression ──

/// Minimize `(1/n) Σ CE(softmax(W x_i + b), y_i) + ||W||² / (2 C n)`.
pub(crate) fn fit_logistic(
    x: &[SparseVec],
    y: &[usize],
    n_classes: usize,
    n_features: usize,
    config: &ClassifierConfig,
) -> LinearWeights {
    let mut weights = LinearWeights::zeros(n_classes, n_features);
    let n = x.len().max(1) as f64;
    let l2 = 1.0 / (config.c * n);

    let mut iterations = 0;
    for _ in 0..config.max_iter {
        iterations += 1;
        let mut grad_coef = vec![vec![0.0; n_features]; n_classes];
        let mut grad_intercept = vec![0.0; n_classes];

        for (row, &label) in x.iter().zip(y) {
            let probs = softmax(&weights.decision(row));
            for (k, p) in probs.into_iter().enumerate() {
                let residual = p - if k == label { 1.0 } else { 0.0 };
                grad_intercept[k] += residual / n;
                for &(j, v) in row {
                    grad_coef[k][j] += residual * v / n;
                }
            }
        }

        let mut max_grad = 0.0f64;
        for k in 0..n_classes {
            for j in 0..n_features {
                let g = grad_coef[k][j] + l2 * weights.coef[k][j];
                max_grad = max_grad.max(g.abs());
                weights.coef[k][j] -= LOGISTIC_STEP * g;
            }
            max_grad = max_grad.max(grad_intercept[k].abs());
            weights.intercept[k] -= LOGISTIC_STEP * grad_intercept[k];
        }

        if max_grad < LOGISTIC_TOL {
            break;
        }
    }

    debug!(iterations, n_classes, n_features, "fitted logistic regression");
    weights
}

// ── Linear SVM ──

/// One-vs-rest hinge-loss SGD with step `1 / (alpha (t0 + t))`.
pub(crate) fn fit_linear_svm(
    x: &[SparseVec],
    y: &[usize],
    n_classes: usize,
    n_features: usize,
    config: &ClassifierConfig,
    seed: u64,
) -> LinearWeights {
    let mut weights = LinearWeights::zeros(n_classes, n_features);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..x.len()).collect();

    // One shuffle sequence shared by all binary problems.
    let mut epochs: Vec<Vec<usize>> = Vec::with_capacity(config.sgd_epochs);
    for _ in 0..config.sgd_epochs {
        order.shuffle(&mut rng);
        epochs.push(order.clone());
    }

    for k in 0..n_classes {
        let (coef, intercept) = fit_binary_hinge(x, y, k, n_features, config.sgd_alpha, &epochs);
        weights.coef[k] = coef;
        weights.intercept[k] = intercept;
    }

    debug!(
        epochs = config.sgd_epochs,
        n_classes, n_features, "fitted linear svm"
    );
    weights
}

fn fit_binary_hinge(
    x: &[SparseVec],
    y: &[usize],
    positive: usize,
    n_features: usize,
    alpha: f64,
    epochs: &[Vec<usize>],
) -> (Vec<f64>, f64) {
    // w = scale * v, so the L2 shrink is O(1) per step.
    let mut v = vec![0.0; n_features];
    let mut scale = 1.0;
    let mut intercept = 0.0;
    let t0 = schedule_offset(alpha);
    let mut t = 0.0;

    for order in epochs {
        for &i in order {
            let eta = 1.0 / (alpha * (t0 + t));
            t += 1.0;
            let target = if y[i] == positive { 1.0 } else { -1.0 };
            let margin = target * (scale * dot(&v, &x[i]) + intercept);

            scale *= 1.0 - eta * alpha;
            if margin < 1.0 {
                let step = eta * target / scale;
                for &(j, value) in &x[i] {
                    v[j] += step * value;
                }
                intercept += SGD_INTERCEPT_DECAY * eta * target;
            }

            if scale < MIN_WEIGHT_SCALE {
                v.iter_mut().for_each(|w| *w *= scale);
                scale = 1.0;
            }
        }
    }

    v.iter_mut().for_each(|w| *w *= scale);
    (v, intercept)
}

/// Offset `t0` of the step schedule. The first step equals
/// `sqrt(1 / sqrt(alpha))`, the expected size of a weight, which bounds the
/// intercept moves to `SGD_INTERCEPT_DECAY` times that.
fn schedule_offset(alpha: f64) -> f64 {
    let typical_weight = (1.0 / alpha.sqrt()).sqrt();
    1.0 / (typical_weight * alpha)
}

// ── Helpers ──

fn dot(dense: &[f64], sparse: &SparseVec) -> f64 {
    sparse.iter().map(|&(j, v)| dense[j] * v).sum()
}

pub(crate) fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

//! Sigmoid (Platt) calibration of SVM margins.
//!
//! The SVM is refit on `k - 1` stratified folds, and one sigmoid per class
//! is fitted on its margins for the held-out fold. Each fold keeps its own
//! SVM next to its sigmoids. A prediction averages the per-fold
//! probabilities, so a sigmoid only ever sees margins from the SVM it was
//! fitted against.

use notedx_core::ClassifierConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::{LinearWeights, fit_linear_svm};
use crate::pipeline::renormalize;
use crate::vectorizer::SparseVec;

const NEWTON_MAX_ITER: usize = 100;
const NEWTON_MIN_STEP: f64 = 1e-10;
const NEWTON_SIGMA: f64 = 1e-12;
const NEWTON_EPS: f64 = 1e-5;

/// `P(class | margin) = 1 / (1 + exp(a * margin + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sigmoid {
    pub a: f64,
    pub b: f64,
}

impl Sigmoid {
    pub fn apply(&self, margin: f64) -> f64 {
        let z = self.a * margin + self.b;
        if z >= 0.0 {
            let e = (-z).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + z.exp())
        }
    }

    /// Newton's method with backtracking on the regularized targets of
    /// Lin, Lin and Weng (2007).
    pub fn fit(margins: &[f64], positive: &[bool]) -> Self {
        let n_pos = positive.iter().filter(|&&p| p).count() as f64;
        let n_neg = positive.len() as f64 - n_pos;
        let hi = (n_pos + 1.0) / (n_pos + 2.0);
        let lo = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = positive.iter().map(|&p| if p { hi } else { lo }).collect();

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        let mut fval = objective(margins, &targets, a, b);

        for _ in 0..NEWTON_MAX_ITER {
            let (mut h11, mut h22, mut h21) = (NEWTON_SIGMA, NEWTON_SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (&f, &t) in margins.iter().zip(&targets) {
                let (p, q) = probs(f * a + b);
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < NEWTON_EPS && g2.abs() < NEWTON_EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= NEWTON_MIN_STEP {
                let (new_a, new_b) = (a + step * da, b + step * db);
                let new_f = objective(margins, &targets, new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    (a, b, fval) = (new_a, new_b, new_f);
                    break;
                }
                step /= 2.0;
            }
            if step < NEWTON_MIN_STEP {
                break;
            }
        }

        Self { a, b }
    }
}

/// `(p, 1 - p)` for `p = 1 / (1 + exp(z))`, computed without overflow.
fn probs(z: f64) -> (f64, f64) {
    if z >= 0.0 {
        let e = (-z).exp();
        (e / (1.0 + e), 1.0 / (1.0 + e))
    } else {
        let e = z.exp();
        (1.0 / (1.0 + e), e / (1.0 + e))
    }
}

/// Cross-entropy of the targets under the sigmoid.
fn objective(margins: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    margins
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let z = f * a + b;
            if z >= 0.0 {
                t * z + (-z).exp().ln_1p()
            } else {
                (t - 1.0) * z + z.exp().ln_1p()
            }
        })
        .sum()
}

/// Fold index per sample: class members take folds round-robin in input order.
pub(crate) fn stratified_folds(y: &[usize], n_classes: usize, k: usize) -> Vec<usize> {
    let mut seen = vec![0usize; n_classes];
    y.iter()
        .map(|&label| {
            let fold = seen[label] % k;
            seen[label] += 1;
            fold
        })
        .collect()
}

/// An SVM fitted without one fold, with the per-class sigmoids fitted on its
/// margins for that fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedFold {
    pub weights: LinearWeights,
    pub sigmoids: Vec<Sigmoid>,
}

impl CalibratedFold {
    fn fit(weights: LinearWeights, x: &[SparseVec], y: &[usize], rows: &[usize]) -> Self {
        let margins: Vec<Vec<f64>> = rows.iter().map(|&i| weights.decision(&x[i])).collect();
        let sigmoids = (0..weights.intercept.len())
            .map(|class| {
                let class_margins: Vec<f64> = margins.iter().map(|m| m[class]).collect();
                let positive: Vec<bool> = rows.iter().map(|&i| y[i] == class).collect();
                Sigmoid::fit(&class_margins, &positive)
            })
            .collect();
        Self { weights, sigmoids }
    }

    /// Per-class probabilities from this fold alone, summing to 1.
    pub fn proba(&self, x: &SparseVec) -> Vec<f64> {
        let scores = self
            .weights
            .decision(x)
            .iter()
            .zip(&self.sigmoids)
            .map(|(&margin, sigmoid)| sigmoid.apply(margin))
            .collect();
        renormalize(scores)
    }
}

/// Mean of the per-fold probabilities.
pub(crate) fn ensemble_proba(folds: &[CalibratedFold], x: &SparseVec) -> Vec<f64> {
    let mut mean = Vec::new();
    for fold in folds {
        let probs = fold.proba(x);
        if mean.is_empty() {
            mean = vec![0.0; probs.len()];
        }
        for (m, p) in mean.iter_mut().zip(probs) {
            *m += p;
        }
    }
    let n = folds.len().max(1) as f64;
    mean.into_iter().map(|m| m / n).collect()
}

/// Fit one [`CalibratedFold`] per stratified fold.
///
/// The fold count is capped by the smallest class. When some class has a
/// single example there is nothing to hold out, and a single fold is built
/// from `full`, the SVM fitted on all data, with sigmoids on its in-sample
/// margins.
pub(crate) fn fit_calibrated_folds(
    x: &[SparseVec],
    y: &[usize],
    n_classes: usize,
    n_features: usize,
    config: &ClassifierConfig,
    seed: u64,
    full: &LinearWeights,
) -> Vec<CalibratedFold> {
    let mut class_sizes = vec![0usize; n_classes];
    for &label in y {
        class_sizes[label] += 1;
    }
    let smallest = class_sizes.iter().copied().min().unwrap_or(0);
    let k = config.calibration_folds.min(smallest);

    if k < 2 {
        warn!(
            smallest_class = smallest,
            "too few examples per class to cross-validate; calibrating on in-sample margins"
        );
        let rows: Vec<usize> = (0..x.len()).collect();
        return vec![CalibratedFold::fit(full.clone(), x, y, &rows)];
    }

    let folds = stratified_folds(y, n_classes, k);
    let calibrated: Vec<CalibratedFold> = (0..k)
        .map(|fold| {
            let (held_out, train): (Vec<usize>, Vec<usize>) =
                (0..x.len()).partition(|&i| folds[i] == fold);
            let train_x: Vec<SparseVec> = train.iter().map(|&i| x[i].clone()).collect();
            let train_y: Vec<usize> = train.iter().map(|&i| y[i]).collect();
            let weights = fit_linear_svm(&train_x, &train_y, n_classes, n_features, config, seed);
            CalibratedFold::fit(weights, x, y, &held_out)
        })
        .collect();
    debug!(folds = k, "fitted calibrated folds");
    calibrated
}

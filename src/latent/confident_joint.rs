//! Confident counting of (observed label, true label) pairs.
use ndarray::prelude::*;
use ordered_float::OrderedFloat;

use crate::error::{Error, LearningResult};
use crate::latent::algebra::{compute_py, converge_estimates, inverse_noise_matrix_from_joint,
                             noise_matrix_from_joint, Convergence, LatentEstimates, PyMethod};


/// Slack on the comparison `psx[[i, k]] >= threshold[k]`, absorbing the
/// rounding error of the mean that defines the threshold.
pub const CONFIDENCE_TOLERANCE: f64 = 1e-6;

/// Number of examples carrying each label `0..n_labels`.
pub fn value_counts(labels: &ArrayView1<usize>, n_labels: usize) -> Array1<usize> {
    let mut counts = Array1::zeros(n_labels);
    for &y in labels {
        counts[y] += 1;
    }
    counts
}

/// Checks that `psx` has one row per label and one column per class.
pub(crate) fn check_probabilities(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                                  n_labels: usize) -> LearningResult<()> {
    if psx.dim() != (labels.len(), n_labels) {
        return Err(Error::InputValidation(
            format!("psx has shape {:?}, expected ({}, {})", psx.dim(), labels.len(), n_labels)));
    }
    check_label_range(labels, n_labels)
}

fn check_label_range(labels: &ArrayView1<usize>, n_labels: usize) -> LearningResult<()> {
    if let Some(&y) = labels.iter().find(|&&y| y >= n_labels) {
        return Err(Error::InputValidation(
            format!("label {} out of range for {} labels", y, n_labels)));
    }
    Ok(())
}

/// Per-class thresholds: `threshold[k]` is the mean of `psx[[i, k]]` over
/// the examples `i` with observed label `k`.
///
/// The threshold of a class without examples is undefined (NaN); such a
/// class is never confidently assigned.
pub fn expected_self_confidence(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                                n_labels: usize) -> Array1<f64> {
    use statrs::statistics::Statistics;

    (0..n_labels).map(|k| {
                     let self_confidence = labels.iter()
                                                 .zip(psx.outer_iter())
                                                 .filter(|&(&y, _)| y == k)
                                                 .map(|(_, p)| p[k])
                                                 .collect::<Vec<_>>();
                     if self_confidence.is_empty() {
                         warn!("No example has label {}; its threshold is undefined", k);
                         f64::NAN
                     } else {
                         self_confidence.iter().mean()
                     }
                 })
                 .collect::<Array1<_>>()
}

/// Infers a true label for every example, or `None` when no class is
/// confident for it.
///
/// Class `k` is confident for example `i` if `psx[[i, k]]` reaches
/// `thresholds[k]`. Among several confident classes the observed label
/// wins; otherwise the most probable one does, the lowest class index
/// breaking exact ties.
pub fn confident_labels(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                        thresholds: &ArrayView1<f64>) -> Vec<Option<usize>> {
    labels.iter()
          .zip(psx.outer_iter())
          .map(|(&s, p)| {
              let confident = thresholds.iter()
                                        .enumerate()
                                        .filter(|&(k, t)| !t.is_nan()
                                                          && p[k] >= t - CONFIDENCE_TOLERANCE)
                                        .map(|(k, _)| k)
                                        .collect::<Vec<_>>();
              match confident.len() {
                  0 => None,
                  1 => Some(confident[0]),
                  _ if confident.contains(&s) => Some(s),
                  _ => confident.iter()
                                .rev()
                                .max_by_key(|&&k| OrderedFloat(p[k]))
                                .cloned(),
              }
          })
          .collect()
}

/// Computes the confident joint, a `(n_labels, n_labels)` matrix where
/// entry `[[k_s, k_y]]` counts the examples with observed label `k_s`
/// whose confidently inferred true label is `k_y`.
///
/// # Arguments
///
/// * `labels` - Observed (noisy) labels.
/// * `psx` - Out-of-fold predicted probabilities, shape `(n, n_labels)`.
/// * `n_labels` - Number of classes.
/// * `thresholds` - Per-class thresholds; if `None` the expected
///                  self-confidence of each class is used.
///
/// # Examples
///
/// ```
/// extern crate ndarray;
/// extern crate rank_pruning;
///
/// # fn main() {
/// use ndarray::array;
/// use rank_pruning::latent::compute_confident_joint;
///
/// let labels = array![0, 0, 1, 1];
/// let psx = array![[0.9, 0.1],
///                  [0.2, 0.8],
///                  [0.1, 0.9],
///                  [0.3, 0.7]];
/// let cj = compute_confident_joint(&labels.view(), &psx.view(), 2, None)
///              .expect("Failed to count");
/// assert!(cj == array![[1, 1],
///                      [0, 1]]);
/// # }
/// ```
pub fn compute_confident_joint(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                               n_labels: usize, thresholds: Option<&ArrayView1<f64>>)
        -> LearningResult<Array2<usize>> {
    check_probabilities(labels, psx, n_labels)?;

    let thresholds = match thresholds {
        Some(t) if t.len() != n_labels => {
            return Err(Error::InputValidation(
                format!("{} thresholds for {} labels", t.len(), n_labels)));
        },
        Some(t) => t.to_owned(),
        None => expected_self_confidence(labels, psx, n_labels),
    };
    debug!("Confident thresholds: {}", thresholds);

    let mut confident_joint = Array2::zeros((n_labels, n_labels));
    for (&s, y) in labels.iter().zip(confident_labels(labels, psx, &thresholds.view())) {
        if let Some(y) = y {
            confident_joint[[s, y]] += 1;
        }
    }

    Ok(confident_joint)
}

/// Rescales each row of the confident joint so that it sums to the
/// number of examples observed with that label.
///
/// A row without confident examples gives no evidence of noise: its
/// whole count is put on the diagonal.
pub fn calibrate_confident_joint(confident_joint: &ArrayView2<usize>,
                                 label_counts: &ArrayView1<usize>) -> Array2<f64> {
    let mut calibrated = Array2::zeros(confident_joint.dim());

    for (s, row) in confident_joint.outer_iter().enumerate() {
        let row_total = row.sum();
        if row_total == 0 {
            calibrated[[s, s]] = label_counts[s] as f64;
        } else {
            let scale = label_counts[s] as f64 / row_total as f64;
            calibrated.row_mut(s)
                      .assign(&row.mapv(|c| c as f64 * scale));
        }
    }

    calibrated
}

/// Estimates the joint distribution P(s, y) from the confident joint.
pub fn estimate_joint(confident_joint: &ArrayView2<usize>,
                      label_counts: &ArrayView1<usize>) -> Array2<f64> {
    let n = label_counts.sum() as f64;
    calibrate_confident_joint(confident_joint, label_counts) / n
}

/// Estimates `ps`, `py`, the noise matrix and the inverse noise matrix
/// from a confident joint.
///
/// If `convergence` is given, the estimates are then reconciled with
/// `converge_estimates()`.
pub fn estimate_latent(confident_joint: &ArrayView2<usize>, labels: &ArrayView1<usize>,
                       py_method: PyMethod, convergence: Option<&Convergence>)
        -> LearningResult<LatentEstimates> {
    let n_labels = confident_joint.nrows();
    if confident_joint.ncols() != n_labels {
        return Err(Error::InputValidation(
            format!("confident joint has shape {:?}, expected a square matrix",
                    confident_joint.dim())));
    }
    check_label_range(labels, n_labels)?;

    let label_counts = value_counts(labels, n_labels);
    let ps = label_counts.mapv(|c| c as f64 / labels.len() as f64);

    let joint = estimate_joint(confident_joint, &label_counts.view());
    let noise_matrix = noise_matrix_from_joint(&joint.view());
    let inverse_noise_matrix = inverse_noise_matrix_from_joint(&joint.view());
    let py = compute_py(&ps.view(), &noise_matrix.view(), &inverse_noise_matrix.view(), py_method)?;

    let estimates = LatentEstimates {
        ps: ps,
        py: py,
        noise_matrix: noise_matrix,
        inverse_noise_matrix: inverse_noise_matrix,
    };

    Ok(match convergence {
        Some(convergence) => converge_estimates(estimates, convergence).estimates,
        None => estimates,
    })
}

/// Computes the confident joint from out-of-fold probabilities and
/// derives all latent estimates from it.
///
/// Returns the latent estimates together with the confident joint.
pub fn estimate_py_and_noise_matrices_from_probabilities(labels: &ArrayView1<usize>,
                                                         psx: &ArrayView2<f64>,
                                                         n_labels: usize,
                                                         thresholds: Option<&ArrayView1<f64>>,
                                                         py_method: PyMethod,
                                                         convergence: Option<&Convergence>)
        -> LearningResult<(LatentEstimates, Array2<usize>)> {
    let confident_joint = compute_confident_joint(labels, psx, n_labels, thresholds)?;
    debug!("Confident joint:\n{}", confident_joint);

    let estimates = estimate_latent(&confident_joint.view(), labels, py_method, convergence)?;

    Ok((estimates, confident_joint))
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn noisy_binary() -> (Array1<usize>, Array2<f64>) {
        // Examples 3 and 7 are mislabeled.
        let labels = array![0, 0, 0, 1, 1, 1, 1, 0];
        let psx = array![[0.9, 0.1],
                         [0.8, 0.2],
                         [0.7, 0.3],
                         [0.9, 0.1],
                         [0.2, 0.8],
                         [0.1, 0.9],
                         [0.3, 0.7],
                         [0.15, 0.85]];
        (labels, psx)
    }

    /// Thresholds are the mean self-confidence of each class.
    #[test]
    fn thresholds() {
        let (labels, psx) = noisy_binary();
        let thresholds = expected_self_confidence(&labels.view(), &psx.view(), 3);

        assert_abs_diff_eq!(thresholds[0], (0.9 + 0.8 + 0.7 + 0.15) / 4., epsilon = 1e-12);
        assert_abs_diff_eq!(thresholds[1], (0.1 + 0.8 + 0.9 + 0.7) / 4., epsilon = 1e-12);
        assert!(thresholds[2].is_nan());
    }

    /// Observed label wins ties; otherwise the most probable confident
    /// class, then the lowest index.
    #[test]
    fn tie_breaking() {
        let thresholds = array![0.3, 0.3, 0.3];
        let labels = array![1, 0, 2, 0];
        let psx = array![[0.35, 0.35, 0.3],
                         [0.1, 0.45, 0.45],
                         [0.5, 0.3, 0.2],
                         [0.2, 0.2, 0.2]];

        let inferred = confident_labels(&labels.view(), &psx.view(), &thresholds.view());
        assert_eq!(inferred, vec![Some(1), Some(1), Some(0), None]);
    }

    /// Confident counting on a small noisy dataset.
    #[test]
    fn confident_joint() {
        let (labels, psx) = noisy_binary();
        let cj = compute_confident_joint(&labels.view(), &psx.view(), 2, None)
                    .expect("Failed to compute the confident joint");

        // threshold = [0.6375, 0.625].
        assert!(cj == array![[3, 1],
                             [1, 3]]);
    }

    /// Counting twice gives the same matrix.
    #[test]
    fn deterministic() {
        let (labels, psx) = noisy_binary();
        let thresholds = array![0.5, 0.5];
        let first = compute_confident_joint(&labels.view(), &psx.view(), 2,
                                            Some(&thresholds.view())).unwrap();
        let second = compute_confident_joint(&labels.view(), &psx.view(), 2,
                                             Some(&thresholds.view())).unwrap();
        assert!(first == second);
    }

    /// Wrong shapes are rejected.
    #[test]
    fn bad_shapes() {
        let (labels, psx) = noisy_binary();
        let thresholds = array![0.5];

        assert!(compute_confident_joint(&labels.view(), &psx.view(), 3, None).is_err());
        assert!(compute_confident_joint(&labels.view(), &psx.view(), 2,
                                        Some(&thresholds.view())).is_err());
    }

    /// Labels outside the confident joint are rejected, not indexed.
    #[test]
    fn latent_bad_labels() {
        let cj = array![[3, 1],
                        [1, 3]];
        let labels = array![0, 1, 2, 1];
        let err = estimate_latent(&cj.view(), &labels.view(), PyMethod::Cnt, None);
        match err {
            Err(Error::InputValidation(_)) => (),
            _ => panic!("Expected an input validation error"),
        }

        let rectangular = array![[3, 1, 0],
                                 [1, 3, 0]];
        let labels = array![0, 1, 0, 1];
        assert!(estimate_latent(&rectangular.view(), &labels.view(), PyMethod::Cnt,
                                None).is_err());
    }

    /// Calibration matches row totals to the label counts.
    #[test]
    fn calibration() {
        let cj = array![[3, 1],
                        [0, 0]];
        let counts = array![8, 2];
        let calibrated = calibrate_confident_joint(&cj.view(), &counts.view());

        assert!(calibrated == array![[6., 2.],
                                     [0., 2.]]);

        let joint = estimate_joint(&cj.view(), &counts.view());
        assert_abs_diff_eq!(joint.sum(), 1., epsilon = 1e-12);
    }

    /// Perfect probabilities give identity noise matrices.
    #[test]
    fn no_noise() {
        let labels = array![0, 1, 2, 0, 1, 2];
        let psx = array![[1., 0., 0.],
                         [0., 1., 0.],
                         [0., 0., 1.],
                         [1., 0., 0.],
                         [0., 1., 0.],
                         [0., 0., 1.]];

        let (estimates, cj) = estimate_py_and_noise_matrices_from_probabilities(
            &labels.view(), &psx.view(), 3, None, PyMethod::Marginal, None).unwrap();

        assert!(cj == Array2::<usize>::eye(3) * 2);
        assert!(estimates.noise_matrix == Array2::<f64>::eye(3));
        assert!(estimates.inverse_noise_matrix == Array2::<f64>::eye(3));
        for k in 0..3 {
            assert_abs_diff_eq!(estimates.py[k], 1. / 3., epsilon = 1e-12);
        }
    }

    /// Latent estimates from the noisy dataset are valid distributions,
    /// with or without reconciliation.
    #[test]
    fn latent() {
        let (labels, psx) = noisy_binary();
        let convergence = Convergence::default();

        for c in &[None, Some(&convergence)] {
            let (estimates, _) = estimate_py_and_noise_matrices_from_probabilities(
                &labels.view(), &psx.view(), 2, None, PyMethod::Cnt, *c).unwrap();

            for column in estimates.noise_matrix.columns() {
                assert_abs_diff_eq!(column.sum(), 1., epsilon = 1e-6);
            }
            for column in estimates.inverse_noise_matrix.columns() {
                assert_abs_diff_eq!(column.sum(), 1., epsilon = 1e-6);
            }
            assert_abs_diff_eq!(estimates.py.sum(), 1., epsilon = 1e-9);
            assert_abs_diff_eq!(estimates.noise_matrix[[0, 0]], 0.75, epsilon = 1e-9);
        }
    }
}

//! Module selecting the examples to prune as label noise.
//!
//! The number of examples to prune for each (observed label, true label)
//! pair comes from a prune-count matrix (see `counts`), built either from
//! the inverse noise matrix or from the calibrated confident joint.
//! Examples are then ranked by their out-of-fold predicted probabilities
//! and the least trustworthy ones are marked.
pub mod counts;

use ndarray::prelude::*;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::str::FromStr;

use crate::error::{Error, LearningResult};
use crate::latent::algebra::{Convergence, PyMethod};
use crate::latent::confident_joint::{calibrate_confident_joint, check_probabilities,
                                     compute_confident_joint, value_counts};
use crate::latent::estimate_py_and_noise_matrices_from_probabilities;
use self::counts::{inverse_nm_dot_s, keep_at_least_n_per_class, reduce_prune_counts,
                   round_preserving_row_totals};


/// How examples are ranked and selected for pruning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PruneMethod {
    /// Within each observed class `s`, prune the examples least confident
    /// in `s`, as many as the row of `s` has off-diagonal counts.
    PruneByClass,
    /// For each pair `s != y`, prune the examples observed as `s` most
    /// confident in `y`, as many as the `(s, y)` count.
    PruneByNoiseRate,
    /// Prune only the examples selected by both of the above.
    Both,
}

impl Default for PruneMethod {
    fn default() -> Self {
        PruneMethod::PruneByNoiseRate
    }
}

impl FromStr for PruneMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prune_by_class" => Ok(PruneMethod::PruneByClass),
            "prune_by_noise_rate" => Ok(PruneMethod::PruneByNoiseRate),
            "both" => Ok(PruneMethod::Both),
            _ => Err(Error::InputValidation(format!("Unknown prune method: {}", s))),
        }
    }
}

/// How the prune-count matrix is generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountMethod {
    /// `inverse_noise_matrix[[y, s]]` times the number of examples
    /// observed as `s`.
    InverseNmDotS,
    /// The confident joint, rescaled so each row sums to its class count.
    CalibrateConfidentJoint,
}

impl Default for CountMethod {
    fn default() -> Self {
        CountMethod::InverseNmDotS
    }
}

impl FromStr for CountMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inverse_nm_dot_s" => Ok(CountMethod::InverseNmDotS),
            "calibrate_confident_joint" => Ok(CountMethod::CalibrateConfidentJoint),
            _ => Err(Error::InputValidation(format!("Unknown count method: {}", s))),
        }
    }
}

/// Options of `get_noise_mask()`.
#[derive(Clone, Debug, PartialEq)]
pub struct PruneOptions {
    pub prune_method: PruneMethod,
    pub count_method: CountMethod,
    /// Fraction of the estimated noise actually pruned, in [0, 1].
    pub frac_noise: f64,
    /// Minimum number of examples kept for every observed class.
    pub min_examples_per_class: usize,
    /// Used only when the inverse noise matrix has to be estimated.
    pub py_method: PyMethod,
    /// Used only when the inverse noise matrix has to be estimated.
    pub convergence: Option<Convergence>,
}

impl Default for PruneOptions {
    fn default() -> Self {
        PruneOptions {
            prune_method: PruneMethod::default(),
            count_method: CountMethod::default(),
            frac_noise: 1.,
            min_examples_per_class: 5,
            py_method: PyMethod::default(),
            convergence: None,
        }
    }
}

/// Returns a boolean mask over the examples, `true` for the examples to
/// prune as label noise.
///
/// # Arguments
///
/// * `labels` - Observed labels, in `0..psx.ncols()`.
/// * `psx` - Out-of-fold predicted probabilities.
/// * `inverse_noise_matrix` - Estimated P(y|s), needed with
///                            `CountMethod::InverseNmDotS`; computed from
///                            `psx` if `None`.
/// * `confident_joint` - Needed with `CountMethod::CalibrateConfidentJoint`;
///                       computed from `psx` if `None`.
/// * `options` - Pruning options.
///
/// Ranking ties are broken by example index, so the mask is a
/// deterministic function of the inputs.
pub fn get_noise_mask(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                      inverse_noise_matrix: Option<&ArrayView2<f64>>,
                      confident_joint: Option<&ArrayView2<usize>>,
                      options: &PruneOptions) -> LearningResult<Array1<bool>> {
    let n_labels = psx.ncols();
    check_probabilities(labels, psx, n_labels)?;
    if !(0. ..=1.).contains(&options.frac_noise) {
        return Err(Error::InputValidation(
            format!("frac_noise must be in [0, 1], got {}", options.frac_noise)));
    }

    let label_counts = value_counts(labels, n_labels);

    let prune_counts = match options.count_method {
        CountMethod::InverseNmDotS => {
            let estimated;
            let inverse = match inverse_noise_matrix {
                Some(inverse) => inverse.view(),
                None => {
                    estimated = estimate_py_and_noise_matrices_from_probabilities(
                                    labels, psx, n_labels, None, options.py_method,
                                    options.convergence.as_ref())?.0;
                    estimated.inverse_noise_matrix.view()
                },
            };
            check_square("inverse noise matrix", inverse.dim(), n_labels)?;
            inverse_nm_dot_s(&inverse, &label_counts.view())
        },
        CountMethod::CalibrateConfidentJoint => {
            let computed;
            let confident_joint = match confident_joint {
                Some(cj) => cj.view(),
                None => {
                    computed = compute_confident_joint(labels, psx, n_labels, None)?;
                    computed.view()
                },
            };
            check_square("confident joint", confident_joint.dim(), n_labels)?;
            calibrate_confident_joint(&confident_joint, &label_counts.view())
        },
    };

    let prune_counts = keep_at_least_n_per_class(&prune_counts.view(), &label_counts.view(),
                                                 options.min_examples_per_class);
    let prune_counts = reduce_prune_counts(&prune_counts.view(), options.frac_noise);
    let prune_counts = round_preserving_row_totals(&prune_counts.view());
    debug!("Prune counts:\n{}", prune_counts);

    let noise_mask = mask_from_counts(labels, psx, &prune_counts.view(), options.prune_method);
    info!("Marked {} of {} examples as label noise",
          noise_mask.iter().filter(|&&noisy| noisy).count(), labels.len());

    Ok(noise_mask)
}

fn check_square(name: &str, dim: (usize, usize), n_labels: usize) -> LearningResult<()> {
    if dim != (n_labels, n_labels) {
        return Err(Error::InputValidation(
            format!("{} has shape {:?}, expected ({}, {})", name, dim, n_labels, n_labels)));
    }
    Ok(())
}

/// Applies a prune method given integer prune counts.
fn mask_from_counts(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                    prune_counts: &ArrayView2<usize>, method: PruneMethod) -> Array1<bool> {
    match method {
        PruneMethod::PruneByClass => prune_by_class(labels, psx, prune_counts),
        PruneMethod::PruneByNoiseRate => prune_by_noise_rate(labels, psx, prune_counts),
        PruneMethod::Both => {
            let by_class = prune_by_class(labels, psx, prune_counts);
            let by_noise_rate = prune_by_noise_rate(labels, psx, prune_counts);
            by_class.iter()
                    .zip(by_noise_rate.iter())
                    .map(|(&a, &b)| a && b)
                    .collect()
        },
    }
}

/// Indices of the examples observed as `class`, in increasing order.
fn members(labels: &ArrayView1<usize>, class: usize) -> Vec<usize> {
    labels.iter()
          .enumerate()
          .filter(|&(_, &s)| s == class)
          .map(|(i, _)| i)
          .collect()
}

fn prune_by_class(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                  prune_counts: &ArrayView2<usize>) -> Array1<bool> {
    let mut noise_mask = Array1::from_elem(labels.len(), false);

    for (s, row) in prune_counts.outer_iter().enumerate() {
        let n_prune = row.sum() - row[s];
        if n_prune == 0 {
            continue;
        }

        let mut ranked = members(labels, s);
        ranked.sort_by_key(|&i| (OrderedFloat(psx[[i, s]]), i));
        for &i in ranked.iter().take(n_prune) {
            noise_mask[i] = true;
        }
    }

    noise_mask
}

fn prune_by_noise_rate(labels: &ArrayView1<usize>, psx: &ArrayView2<f64>,
                       prune_counts: &ArrayView2<usize>) -> Array1<bool> {
    let mut noise_mask = Array1::from_elem(labels.len(), false);

    for (s, row) in prune_counts.outer_iter().enumerate() {
        let candidates = members(labels, s);

        for (y, &n_prune) in row.iter().enumerate() {
            if y == s || n_prune == 0 {
                continue;
            }

            let mut ranked = candidates.clone();
            ranked.sort_by_key(|&i| (Reverse(OrderedFloat(psx[[i, y]])), i));
            for &i in ranked.iter().take(n_prune) {
                noise_mask[i] = true;
            }
        }
    }

    noise_mask
}

//! Module implementing Rank Pruning.
//!
//! `RankPruning` wraps a classifier. Its `fit()` method estimates the
//! label noise of a dataset, prunes the examples likely to be mislabeled,
//! and trains the wrapped classifier on the remaining ones, reweighted to
//! compensate for what was removed.
pub mod rank_pruning;

use ndarray::prelude::*;

use crate::latent::algebra::{Convergence, PyMethod};
use crate::pruning::{CountMethod, PruneMethod, PruneOptions};

pub use self::rank_pruning::RankPruning;

/// Configuration of a `fit()` call.
///
/// Build it with struct update syntax:
///
/// ```
/// use rank_pruning::pruning::PruneMethod;
/// use rank_pruning::rp::FitConfig;
///
/// let config = FitConfig {
///     cv_n_folds: 3,
///     prune_method: PruneMethod::Both,
///     ..FitConfig::default()
/// };
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FitConfig {
    /// Number of cross-validation folds used to estimate `psx`.
    pub cv_n_folds: usize,
    /// Class known to be free of label noise (PU learning).
    pub pulearning: Option<usize>,
    pub prune_method: PruneMethod,
    pub count_method: CountMethod,
    /// Reconcile `py` and the noise matrices with each other after
    /// estimating them.
    pub converge_latent_estimates: bool,
    pub py_method: PyMethod,
    /// Fraction of the estimated noise to prune.
    pub frac_noise: f64,
    /// Minimum number of examples kept for every class.
    pub min_examples_per_class: usize,
    pub convergence_tolerance: f64,
    pub max_convergence_iterations: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            cv_n_folds: 5,
            pulearning: None,
            prune_method: PruneMethod::default(),
            count_method: CountMethod::default(),
            converge_latent_estimates: false,
            py_method: PyMethod::default(),
            frac_noise: 1.,
            min_examples_per_class: 5,
            convergence_tolerance: 1e-8,
            max_convergence_iterations: 50,
        }
    }
}

impl FitConfig {
    /// Stopping rule of the reconciliation, if it is enabled.
    pub fn convergence(&self) -> Option<Convergence> {
        if self.converge_latent_estimates {
            Some(Convergence {
                tolerance: self.convergence_tolerance,
                max_iterations: self.max_convergence_iterations,
            })
        } else {
            None
        }
    }

    pub fn prune_options(&self) -> PruneOptions {
        PruneOptions {
            prune_method: self.prune_method,
            count_method: self.count_method,
            frac_noise: self.frac_noise,
            min_examples_per_class: self.min_examples_per_class,
            py_method: self.py_method,
            convergence: self.convergence(),
        }
    }
}

/// What the caller already knows about the noise of the dataset, and so
/// which estimates `fit()` has to compute.
#[derive(Clone, Debug)]
pub enum Estimation<'a> {
    /// Nothing is known: `psx` is estimated by cross-validation, then the
    /// noise matrices from `psx`.
    RawData {
        /// Per-class confidence thresholds; the expected self-confidence
        /// of each class if `None`.
        thresholds: Option<ArrayView1<'a, f64>>,
    },
    /// Out-of-fold predicted probabilities are supplied; the noise
    /// matrices are estimated from them.
    ProbabilitiesProvided {
        psx: ArrayView2<'a, f64>,
        thresholds: Option<ArrayView1<'a, f64>>,
    },
    /// At least one of the noise matrices is supplied, and the other is
    /// derived from it. `psx` is still needed to rank the examples, and
    /// is estimated by cross-validation if not supplied.
    MatricesProvided {
        noise_matrix: Option<ArrayView2<'a, f64>>,
        inverse_noise_matrix: Option<ArrayView2<'a, f64>>,
        psx: Option<ArrayView2<'a, f64>>,
    },
}

impl<'a> Default for Estimation<'a> {
    fn default() -> Self {
        Estimation::RawData { thresholds: None }
    }
}

/// Everything estimated by one `fit()` call.
///
/// The matrices describe the dataset before pruning.
#[derive(Clone, Debug)]
pub struct FitResult {
    pub n_labels: usize,
    /// Observed label prior P(s).
    pub ps: Array1<f64>,
    /// True label prior P(y).
    pub py: Array1<f64>,
    /// P(s|y), indexed `[[k_s, k_y]]`.
    pub noise_matrix: Array2<f64>,
    /// P(y|s), indexed `[[k_y, k_s]]`.
    pub inverse_noise_matrix: Array2<f64>,
    /// `None` when the noise matrices were supplied.
    pub confident_joint: Option<Array2<usize>>,
    pub psx: Array2<f64>,
    /// `true` for the pruned examples.
    pub noise_mask: Array1<bool>,
    /// Weights of the kept examples, in their original order.
    pub sample_weight: Array1<f64>,
}

impl FitResult {
    /// Number of pruned examples.
    pub fn num_pruned(&self) -> usize {
        self.noise_mask.iter().filter(|&&noisy| noisy).count()
    }
}

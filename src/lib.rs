//! The rank-pruning crate.
//!
//! A crate implementing Rank Pruning, a confident learning method for
//! training classifiers on datasets whose labels are partly wrong.
//! Given out-of-fold predicted probabilities of any probabilistic
//! classifier, it estimates how labels were corrupted (the noise
//! matrix P(s|y), its inverse P(y|s) and the true label prior),
//! prunes the examples most likely to be mislabeled, and retrains the
//! classifier on the remaining ones with weights compensating for the
//! pruning.
//!
//! # Goals
//! * Work with any classifier implementing the `Classifier` trait.
//! * Expose every intermediate estimate (confident joint, noise
//!   matrices, priors, noise mask) for inspection.
//! * Deterministic results for a given seed.
//!
//! # Examples
//!
//! Fit a k-NN classifier, `k=3`, on two clusters where one example of
//! each cluster carries the wrong label. Here the out-of-fold predicted
//! probabilities are supplied; by default they are estimated with
//! cross-validation.
//!
//! ```
//! extern crate ndarray;
//! extern crate rank_pruning;
//!
//! # fn main() {
//! use ndarray::array;
//! use ndarray::prelude::*;
//! use rank_pruning::classifier::KNN;
//! use rank_pruning::rp::{Estimation, FitConfig, RankPruning};
//!
//! let inputs = Array2::from_shape_fn((12, 1), |(i, _)| {
//!     (i / 6) as f64 * 10. + (i % 6) as f64 / 10.
//! });
//! let labels = array![0, 0, 0, 0, 0, 1,
//!                     1, 1, 1, 1, 1, 0];
//! let psx = Array2::from_shape_fn((12, 2), |(i, k)| {
//!     if k == i / 6 { 0.9 } else { 0.1 }
//! });
//!
//! let mut rp = RankPruning::new(KNN::new(3));
//! let estimation = Estimation::ProbabilitiesProvided {
//!     psx: psx.view(),
//!     thresholds: None,
//! };
//! let result = rp.fit(&inputs.view(), &labels.view(), estimation,
//!                     &FitConfig::default())
//!                .expect("Failed to fit");
//!
//! // The two mislabeled examples are pruned.
//! let pruned = result.noise_mask
//!                    .iter()
//!                    .enumerate()
//!                    .filter(|&(_, &noisy)| noisy)
//!                    .map(|(i, _)| i)
//!                    .collect::<Vec<_>>();
//! assert_eq!(pruned, vec![5, 11]);
//! assert!((result.noise_matrix[[0, 0]] - 5. / 6.).abs() < 1e-9);
//!
//! let preds = rp.predict(&array![[0.2], [10.2]].view())
//!               .expect("Failed to predict");
//! assert!(preds == array![0, 1]);
//! # }
//! ```
//!
//! The building blocks (cross-validated probabilities, confident joint,
//! latent estimates, noise mask) are available on their own in the
//! `latent` and `pruning` modules.
#[macro_use]
extern crate log;

pub mod classifier;
pub mod error;
pub mod latent;
pub mod pruning;
pub mod rp;
pub mod utils;

pub use crate::error::{Error, LearningResult};

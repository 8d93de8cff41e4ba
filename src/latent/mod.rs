//! Module estimating the latent noise structure of a labeled dataset.
//!
//! Given the observed (noisy) labels `s` and out-of-fold predicted
//! probabilities `psx`, these routines estimate:
//!
//! * `ps`, the observed label prior P(s=k);
//! * the confident joint, counting examples by (observed label, inferred
//!   true label);
//! * `py`, the true label prior P(y=k);
//! * the noise matrix P(s=k_s|y=k_y) and the inverse noise matrix
//!   P(y=k_y|s=k_s), both stored with columns summing to 1.
//!
//! Matrices indexed by a pair of labels put the row index first:
//! `noise_matrix[[k_s, k_y]]`, `inverse_noise_matrix[[k_y, k_s]]`,
//! `confident_joint[[k_s, k_y]]`.
pub mod algebra;
pub mod confident_joint;
pub mod cross_validation;

pub use self::algebra::{Convergence, LatentEstimates, PyMethod, Reconciliation};
pub use self::confident_joint::{compute_confident_joint, estimate_latent,
                                estimate_py_and_noise_matrices_from_probabilities};
pub use self::cross_validation::estimate_cv_predicted_probabilities;

//! Closed-form relations between priors, noise matrix and inverse noise matrix.
//!
//! Everything here derives from the joint P(s=k_s, y=k_y), stored as a
//! `(K, K)` matrix with the observed label on rows:
//!
//!   joint[[s, y]] = noise_matrix[[s, y]] * py[y]
//!                 = inverse_noise_matrix[[y, s]] * ps[s]
//!
//! so that `ps` are its row sums and `py` its column sums.
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use ndarray::prelude::*;

use crate::error::{Error, LearningResult};


/// How the true label prior `py` is estimated from the other latent
/// estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyMethod {
    /// `py[k] = inverse_noise_matrix[[k, k]] / noise_matrix[[k, k]] * ps[k]`.
    Cnt,
    /// Solves `noise_matrix . py = ps`.
    Eqn,
    /// `py = inverse_noise_matrix . ps`.
    Marginal,
}

impl Default for PyMethod {
    fn default() -> Self {
        PyMethod::Marginal
    }
}

impl FromStr for PyMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cnt" => Ok(PyMethod::Cnt),
            "eqn" => Ok(PyMethod::Eqn),
            "marginal" => Ok(PyMethod::Marginal),
            _ => Err(Error::InputValidation(format!("Unknown py method: {}", s))),
        }
    }
}

/// Latent estimates of a dataset: observed prior, true prior and the two
/// noise matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentEstimates {
    pub ps: Array1<f64>,
    pub py: Array1<f64>,
    pub noise_matrix: Array2<f64>,
    pub inverse_noise_matrix: Array2<f64>,
}

/// Stopping rule of `converge_estimates()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    /// Largest entrywise change (over `py` and both matrices) below which
    /// the estimates are considered converged.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for Convergence {
    fn default() -> Self {
        Convergence {
            tolerance: 1e-8,
            max_iterations: 50,
        }
    }
}

/// Output of `converge_estimates()`.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub estimates: LatentEstimates,
    pub iterations: usize,
    pub converged: bool,
}

/// Sum of the diagonal of a square matrix.
pub fn trace(matrix: &ArrayView2<f64>) -> f64 {
    matrix.diag().sum()
}

/// Makes a matrix of conditional probabilities valid column by column.
///
/// Entries are clipped to [0, 1]. The off-diagonal entries of each column
/// are then rescaled so the column sums to 1 with its diagonal untouched;
/// a column without off-diagonal mass becomes an identity column.
pub fn clip_noise_rates(matrix: &ArrayView2<f64>) -> Array2<f64> {
    // f64::max maps NaN to 0.
    let mut clipped = matrix.mapv(|x| x.max(0.).min(1.));

    for c in 0..clipped.ncols() {
        let diagonal = clipped[[c, c]];
        let off_diagonal = clipped.column(c).sum() - diagonal;

        if off_diagonal > 0. {
            let scale = (1. - diagonal) / off_diagonal;
            for r in (0..clipped.nrows()).filter(|&r| r != c) {
                clipped[[r, c]] *= scale;
            }
        } else {
            clipped[[c, c]] = 1.;
        }
    }

    clipped
}

/// Clips a prior to [0, 1] and renormalizes it to sum to 1.
///
/// A prior with no mass left becomes uniform.
pub fn clip_py(py: &ArrayView1<f64>) -> Array1<f64> {
    let mut clipped = py.mapv(|x| x.max(0.).min(1.));
    let total = clipped.sum();

    if total > 0. {
        clipped /= total;
    } else {
        clipped.fill(1. / py.len() as f64);
    }

    clipped
}

/// Divides each column `c` of `matrix` by `denominators[c]`.
///
/// Columns with a zero denominator carry no information and are returned
/// as identity columns.
fn divide_columns(matrix: &ArrayView2<f64>, denominators: &ArrayView1<f64>) -> Array2<f64> {
    let mut divided = Array2::zeros(matrix.dim());

    for (c, &d) in denominators.iter().enumerate() {
        if d > 0. {
            divided.column_mut(c).assign(&(&matrix.column(c) / d));
        } else {
            divided[[c, c]] = 1.;
        }
    }

    divided
}

/// joint[[s, y]] = noise_matrix[[s, y]] * py[y].
pub fn joint_from_noise_matrix(py: &ArrayView1<f64>, noise_matrix: &ArrayView2<f64>) -> Array2<f64> {
    Array2::from_shape_fn(noise_matrix.dim(), |(s, y)| noise_matrix[[s, y]] * py[y])
}

/// joint[[s, y]] = inverse_noise_matrix[[y, s]] * ps[s].
pub fn joint_from_inverse(ps: &ArrayView1<f64>, inverse_noise_matrix: &ArrayView2<f64>) -> Array2<f64> {
    joint_from_noise_matrix(ps, inverse_noise_matrix).reversed_axes()
}

/// P(s|y) from a joint: each column divided by its sum `py[y]`, then clipped.
pub fn noise_matrix_from_joint(joint: &ArrayView2<f64>) -> Array2<f64> {
    let py = joint.sum_axis(Axis(0));
    clip_noise_rates(&divide_columns(joint, &py.view()).view())
}

/// P(y|s) from a joint: each row divided by its sum `ps[s]`, transposed,
/// then clipped.
pub fn inverse_noise_matrix_from_joint(joint: &ArrayView2<f64>) -> Array2<f64> {
    let ps = joint.sum_axis(Axis(1));
    clip_noise_rates(&divide_columns(&joint.t(), &ps.view()).view())
}

/// Inverse noise matrix from the true prior and the noise matrix (Bayes' rule).
pub fn compute_inv_noise_matrix(py: &ArrayView1<f64>, noise_matrix: &ArrayView2<f64>) -> Array2<f64> {
    inverse_noise_matrix_from_joint(&joint_from_noise_matrix(py, noise_matrix).view())
}

/// Noise matrix from the observed prior and the inverse noise matrix (Bayes' rule).
pub fn compute_noise_matrix_from_inverse(ps: &ArrayView1<f64>,
                                         inverse_noise_matrix: &ArrayView2<f64>) -> Array2<f64> {
    noise_matrix_from_joint(&joint_from_inverse(ps, inverse_noise_matrix).view())
}

/// Solves `noise_matrix . py = ps` for `py`.
fn solve_py(ps: &ArrayView1<f64>, noise_matrix: &ArrayView2<f64>) -> LearningResult<Array1<f64>> {
    let k = ps.len();
    let a = DMatrix::from_fn(k, k, |r, c| noise_matrix[[r, c]]);
    let b = DVector::from_iterator(k, ps.iter().cloned());

    a.lu()
     .solve(&b)
     .map(|py| py.iter().cloned().collect::<Array1<f64>>())
     .ok_or_else(|| Error::InvalidNoiseMatrix("the noise matrix is singular".to_string()))
}

/// Computes the true prior `py` and the inverse noise matrix given the
/// observed prior and the noise matrix.
///
/// # Errors
///
/// `InvalidNoiseMatrix` if the noise matrix is singular.
pub fn compute_py_inv_noise_matrix(ps: &ArrayView1<f64>, noise_matrix: &ArrayView2<f64>)
        -> LearningResult<(Array1<f64>, Array2<f64>)> {
    let py = clip_py(&solve_py(ps, noise_matrix)?.view());
    let inverse_noise_matrix = compute_inv_noise_matrix(&py.view(), noise_matrix);

    Ok((py, inverse_noise_matrix))
}

/// Estimates the true prior `py` with the chosen method; the result is
/// clipped with `clip_py()`.
pub fn compute_py(ps: &ArrayView1<f64>, noise_matrix: &ArrayView2<f64>,
                  inverse_noise_matrix: &ArrayView2<f64>, method: PyMethod)
        -> LearningResult<Array1<f64>> {
    let py = match method {
        PyMethod::Cnt => {
            Array1::from_shape_fn(ps.len(), |k| {
                let accuracy = noise_matrix[[k, k]];
                if accuracy > 0. {
                    inverse_noise_matrix[[k, k]] / accuracy * ps[k]
                } else {
                    0.
                }
            })
        },
        PyMethod::Eqn => solve_py(ps, noise_matrix)?,
        PyMethod::Marginal => inverse_noise_matrix.dot(ps),
    };

    Ok(clip_py(&py.view()))
}

/// Completes user-supplied noise matrices into a full set of latent
/// estimates, deriving whichever matrix is missing.
///
/// # Errors
///
/// `InputValidation` if neither matrix is given, `InvalidNoiseMatrix` if
/// only a singular noise matrix is given.
pub fn complete_latent_estimates(ps: Array1<f64>, noise_matrix: Option<&ArrayView2<f64>>,
                                 inverse_noise_matrix: Option<&ArrayView2<f64>>)
        -> LearningResult<LatentEstimates> {
    match (noise_matrix, inverse_noise_matrix) {
        (Some(nm), Some(inv)) => {
            let py = clip_py(&inv.dot(&ps).view());
            Ok(LatentEstimates {
                ps: ps,
                py: py,
                noise_matrix: nm.to_owned(),
                inverse_noise_matrix: inv.to_owned(),
            })
        },
        (Some(nm), None) => {
            let (py, inv) = compute_py_inv_noise_matrix(&ps.view(), nm)?;
            Ok(LatentEstimates {
                ps: ps,
                py: py,
                noise_matrix: nm.to_owned(),
                inverse_noise_matrix: inv,
            })
        },
        (None, Some(inv)) => {
            let nm = compute_noise_matrix_from_inverse(&ps.view(), inv);
            let py = clip_py(&inv.dot(&ps).view());
            Ok(LatentEstimates {
                ps: ps,
                py: py,
                noise_matrix: nm,
                inverse_noise_matrix: inv.to_owned(),
            })
        },
        (None, None) => Err(Error::InputValidation(
            "Provide a noise matrix, an inverse noise matrix or both".to_string())),
    }
}

/// Makes class `class` noise free: no example of true label `class` is
/// observed with another label, i.e., its noise matrix column becomes an
/// identity column.
pub fn remove_noise_from_class(noise_matrix: &ArrayView2<f64>, class: usize) -> Array2<f64> {
    let mut cleaned = noise_matrix.to_owned();

    cleaned.column_mut(class).fill(0.);
    cleaned[[class, class]] = 1.;

    cleaned
}

fn max_abs_change<'a, I>(before: I, after: I) -> f64 where I: IntoIterator<Item=&'a f64> {
    before.into_iter()
          .zip(after)
          .map(|(x, y)| (x - y).abs())
          .fold(0., f64::max)
}

/// Iterates `py`, the noise matrix and the inverse noise matrix against
/// each other until they satisfy their closed-form relations.
///
/// One iteration computes, in order:
///
/// * `py = inverse_noise_matrix . ps`;
/// * `noise_matrix[[s, y]] = inverse_noise_matrix[[y, s]] * ps[s] / py[y]`;
/// * the inverse noise matrix from `py` and the new noise matrix;
///
/// clipping priors and renormalizing columns each time. It stops when the
/// largest entrywise change falls below `convergence.tolerance`, or after
/// `convergence.max_iterations`, in which case the last iterate is
/// returned with `converged == false`.
pub fn converge_estimates(estimates: LatentEstimates, convergence: &Convergence) -> Reconciliation {
    let LatentEstimates { ps,
                          mut py,
                          mut noise_matrix,
                          mut inverse_noise_matrix } = estimates;

    let mut iterations = 0;
    let mut converged = false;

    while iterations < convergence.max_iterations {
        iterations += 1;

        let py_next = clip_py(&inverse_noise_matrix.dot(&ps).view());
        let joint = joint_from_inverse(&ps.view(), &inverse_noise_matrix.view());
        let noise_matrix_next = clip_noise_rates(&divide_columns(&joint.view(),
                                                                 &py_next.view()).view());
        let inverse_noise_matrix_next = compute_inv_noise_matrix(&py_next.view(),
                                                                 &noise_matrix_next.view());

        let change = max_abs_change(py.iter(), py_next.iter())
                        .max(max_abs_change(noise_matrix.iter(), noise_matrix_next.iter()))
                        .max(max_abs_change(inverse_noise_matrix.iter(),
                                            inverse_noise_matrix_next.iter()));
        trace!("Reconciling latent estimates, iteration {}: max change {:e}", iterations, change);

        py = py_next;
        noise_matrix = noise_matrix_next;
        inverse_noise_matrix = inverse_noise_matrix_next;

        if change < convergence.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        debug!("Latent estimates converged after {} iterations", iterations);
    } else {
        warn!("Latent estimates did not converge within {} iterations; using the last iterate",
              convergence.max_iterations);
    }

    Reconciliation {
        estimates: LatentEstimates {
            ps: ps,
            py: py,
            noise_matrix: noise_matrix,
            inverse_noise_matrix: inverse_noise_matrix,
        },
        iterations: iterations,
        converged: converged,
    }
}

//! Rank Pruning of a classifier trained with noisy labels.
use itertools::Itertools;
use ndarray::prelude::*;
use pcg_rand::Pcg32;
use rand::SeedableRng;

use crate::classifier::Classifier;
use crate::error::{Error, LearningResult};
use crate::latent::algebra::{complete_latent_estimates, compute_inv_noise_matrix,
                             remove_noise_from_class, trace, LatentEstimates};
use crate::latent::confident_joint::value_counts;
use crate::latent::{estimate_cv_predicted_probabilities,
                    estimate_py_and_noise_matrices_from_probabilities};
use crate::pruning::get_noise_mask;
use crate::rp::{Estimation, FitConfig, FitResult};

/// Seed of the fold assignment when none is given.
const DEFAULT_SEED: u64 = 0;


/// Rank Pruning, for some classifier C.
///
/// A `RankPruning` owns its classifier and, optionally, a seed. Both
/// persist across `fit()` calls; everything else is recomputed by each
/// call and returned in a `FitResult`.
pub struct RankPruning<C> {
    classifier: C,
    seed: Option<u64>,
}

impl<C> RankPruning<C> {
    /// Constructs Rank Pruning around a classifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use rank_pruning::classifier::KNN;
    /// use rank_pruning::rp::RankPruning;
    ///
    /// let rp = RankPruning::new(KNN::new(5));
    /// ```
    pub fn new(classifier: C) -> RankPruning<C> {
        RankPruning {
            classifier: classifier,
            seed: None,
        }
    }

    /// Constructs Rank Pruning whose cross-validation folds are drawn
    /// from a PRNG seeded with `seed`.
    pub fn new_seeded(classifier: C, seed: u64) -> RankPruning<C> {
        RankPruning {
            classifier: classifier,
            seed: Some(seed),
        }
    }

    /// The wrapped classifier; after a successful `fit()` it is trained
    /// on the pruned data.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn into_classifier(self) -> C {
        self.classifier
    }

    /// Predicts labels with the wrapped classifier.
    pub fn predict<T>(&self, inputs: &ArrayView2<T>) -> LearningResult<Array1<usize>>
            where C: Classifier<T> {
        self.classifier.predict(inputs)
    }

    /// Predicts label probabilities with the wrapped classifier.
    pub fn predict_probabilities<T>(&self, inputs: &ArrayView2<T>) -> LearningResult<Array2<f64>>
            where C: Classifier<T> {
        self.classifier.predict_probabilities(inputs)
    }

    /// Estimates the label noise of a dataset, prunes the examples
    /// believed to be mislabeled and trains the classifier on the rest.
    ///
    /// Each kept example of observed class `k` is weighted
    /// `1 / noise_matrix[[k, k]]`.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Matrix with one example per row.
    /// * `labels` - Observed labels; they must be `0, 1, ..., K-1`
    ///              with every value present, and `K >= 2`.
    /// * `estimation` - Estimates supplied by the caller.
    /// * `config` - Fit configuration.
    ///
    /// # Errors
    ///
    /// * `InputValidation` - inconsistent shapes, labels or options.
    /// * `InvalidNoiseMatrix` - a supplied matrix has trace not
    ///                          exceeding 1; raised before any training.
    /// * `InsufficientData` - a class has fewer examples than folds,
    ///                        or every example was pruned.
    /// * `DegenerateClass` - a kept class has a zero (or undefined)
    ///                       noise matrix diagonal entry.
    /// * `Classifier` - the classifier failed.
    pub fn fit<T>(&mut self, inputs: &ArrayView2<T>, labels: &ArrayView1<usize>,
                  estimation: Estimation, config: &FitConfig) -> LearningResult<FitResult>
            where T: Clone + Send + Sync,
                  C: Classifier<T> + Clone + Send + Sync {
        let n_labels = check_labels(inputs.nrows(), labels)?;
        check_config(config, n_labels)?;
        check_estimation(&estimation, labels.len(), n_labels)?;
        info!("Fitting on {} examples with {} labels", labels.len(), n_labels);

        let mut rng = Pcg32::seed_from_u64(self.seed.unwrap_or(DEFAULT_SEED));
        let convergence = config.convergence();

        let (estimates, confident_joint, psx) = match estimation {
            Estimation::RawData { thresholds } => {
                info!("Estimating psx with {}-fold cross-validation", config.cv_n_folds);
                let psx = estimate_cv_predicted_probabilities(inputs, labels, n_labels,
                                                              &self.classifier,
                                                              config.cv_n_folds, &mut rng)?;
                let (estimates, confident_joint) =
                    estimate_py_and_noise_matrices_from_probabilities(
                        labels, &psx.view(), n_labels, thresholds.as_ref(),
                        config.py_method, convergence.as_ref())?;
                (estimates, Some(confident_joint), psx)
            },
            Estimation::ProbabilitiesProvided { psx, thresholds } => {
                let (estimates, confident_joint) =
                    estimate_py_and_noise_matrices_from_probabilities(
                        labels, &psx, n_labels, thresholds.as_ref(),
                        config.py_method, convergence.as_ref())?;
                (estimates, Some(confident_joint), psx.to_owned())
            },
            Estimation::MatricesProvided { noise_matrix, inverse_noise_matrix, psx } => {
                let ps = value_counts(labels, n_labels).mapv(|c| c as f64 / labels.len() as f64);
                let estimates = complete_latent_estimates(ps, noise_matrix.as_ref(),
                                                          inverse_noise_matrix.as_ref())?;
                let psx = match psx {
                    Some(psx) => psx.to_owned(),
                    None => {
                        info!("Estimating psx with {}-fold cross-validation", config.cv_n_folds);
                        estimate_cv_predicted_probabilities(inputs, labels, n_labels,
                                                            &self.classifier,
                                                            config.cv_n_folds, &mut rng)?
                    },
                };
                (estimates, None, psx)
            },
        };

        let LatentEstimates { ps, py, mut noise_matrix, mut inverse_noise_matrix } = estimates;
        if let Some(class) = config.pulearning {
            debug!("Class {} is noise free", class);
            noise_matrix = remove_noise_from_class(&noise_matrix.view(), class);
            inverse_noise_matrix = compute_inv_noise_matrix(&py.view(), &noise_matrix.view());
        }
        debug!("Noise matrix:\n{}", noise_matrix);
        debug!("Inverse noise matrix:\n{}", inverse_noise_matrix);

        let confident_joint_view = confident_joint.as_ref().map(|cj| cj.view());
        let noise_mask = get_noise_mask(labels, &psx.view(),
                                        Some(&inverse_noise_matrix.view()),
                                        confident_joint_view.as_ref(),
                                        &config.prune_options())?;

        let kept = noise_mask.iter()
                             .enumerate()
                             .filter(|&(_, &noisy)| !noisy)
                             .map(|(i, _)| i)
                             .collect::<Vec<_>>();
        if kept.is_empty() {
            return Err(Error::InsufficientData("every example was pruned".to_string()));
        }
        let kept_labels = labels.select(Axis(0), &kept);

        for class in kept_labels.iter().unique() {
            let accuracy = noise_matrix[[*class, *class]];
            if !(accuracy > 0.) || !accuracy.is_finite() {
                return Err(Error::DegenerateClass { class: *class, accuracy: accuracy });
            }
        }
        let sample_weight = kept_labels.mapv(|k| 1. / noise_matrix[[k, k]]);

        info!("Training on {} examples after pruning {}",
              kept.len(), labels.len() - kept.len());
        self.classifier.train(&inputs.select(Axis(0), &kept).view(), &kept_labels.view(),
                              n_labels, Some(&sample_weight.view()))?;

        Ok(FitResult {
            n_labels: n_labels,
            ps: ps,
            py: py,
            noise_matrix: noise_matrix,
            inverse_noise_matrix: inverse_noise_matrix,
            confident_joint: confident_joint,
            psx: psx,
            noise_mask: noise_mask,
            sample_weight: sample_weight,
        })
    }
}

/// Returns the number of labels `K`, after checking that the labels are
/// `0, 1, ..., K-1` and match the number of examples.
fn check_labels(n_inputs: usize, labels: &ArrayView1<usize>) -> LearningResult<usize> {
    if n_inputs != labels.len() {
        return Err(Error::InputValidation(
            format!("{} examples but {} labels", n_inputs, labels.len())));
    }

    let unique_labels = labels.iter()
                              .unique()
                              .sorted()
                              .collect::<Vec<_>>();
    for (i, &&y) in unique_labels.iter().enumerate() {
        if i != y {
            return Err(Error::InputValidation(
                "Labels should be 0, 1, ..., n_labels-1, each present".to_string()));
        }
    }

    if unique_labels.len() < 2 {
        return Err(Error::InputValidation(
            format!("Need at least 2 labels, found {}", unique_labels.len())));
    }

    Ok(unique_labels.len())
}

fn check_config(config: &FitConfig, n_labels: usize) -> LearningResult<()> {
    if config.cv_n_folds < 2 {
        return Err(Error::InputValidation(
            format!("cv_n_folds must be at least 2, got {}", config.cv_n_folds)));
    }
    if let Some(class) = config.pulearning {
        if class >= n_labels {
            return Err(Error::InputValidation(
                format!("pulearning class {} out of range for {} labels", class, n_labels)));
        }
    }
    if !(0. ..=1.).contains(&config.frac_noise) {
        return Err(Error::InputValidation(
            format!("frac_noise must be in [0, 1], got {}", config.frac_noise)));
    }
    Ok(())
}

/// Checks the supplied estimates, so that a bad one fails the call
/// before any training.
fn check_estimation(estimation: &Estimation, n_examples: usize,
                    n_labels: usize) -> LearningResult<()> {
    let check_psx = |psx: &ArrayView2<f64>| {
        if psx.dim() != (n_examples, n_labels) {
            return Err(Error::InputValidation(
                format!("psx has shape {:?}, expected ({}, {})",
                        psx.dim(), n_examples, n_labels)));
        }
        Ok(())
    };
    let check_thresholds = |thresholds: &Option<ArrayView1<f64>>| {
        match thresholds {
            Some(t) if t.len() != n_labels => Err(Error::InputValidation(
                format!("{} thresholds for {} labels", t.len(), n_labels))),
            _ => Ok(()),
        }
    };
    let check_matrix = |name: &str, matrix: &ArrayView2<f64>| {
        if matrix.dim() != (n_labels, n_labels) {
            return Err(Error::InputValidation(
                format!("{} has shape {:?}, expected ({}, {})",
                        name, matrix.dim(), n_labels, n_labels)));
        }
        let t = trace(matrix);
        if !(t > 1.) {
            return Err(Error::InvalidNoiseMatrix(
                format!("trace of the {} is {}, it must exceed 1", name, t)));
        }
        Ok(())
    };

    match estimation {
        Estimation::RawData { thresholds } => check_thresholds(thresholds),
        Estimation::ProbabilitiesProvided { psx, thresholds } => {
            check_psx(psx)?;
            check_thresholds(thresholds)
        },
        Estimation::MatricesProvided { noise_matrix, inverse_noise_matrix, psx } => {
            if noise_matrix.is_none() && inverse_noise_matrix.is_none() {
                return Err(Error::InputValidation(
                    "Provide a noise matrix, an inverse noise matrix or both".to_string()));
            }
            if let Some(nm) = noise_matrix {
                check_matrix("noise matrix", nm)?;
            }
            if let Some(inv) = inverse_noise_matrix {
                check_matrix("inverse noise matrix", inv)?;
            }
            match psx {
                Some(psx) => check_psx(psx),
                None => Ok(()),
            }
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KNN;
    use ndarray::array;

    /// Labels must be dense, with at least two classes.
    #[test]
    fn labels() {
        assert_eq!(check_labels(4, &array![1, 0, 1, 0].view()).unwrap(), 2);
        assert!(check_labels(3, &array![1, 0, 1, 0].view()).is_err());
        assert!(check_labels(4, &array![0, 2, 2, 0].view()).is_err());
        assert!(check_labels(4, &array![1, 1, 1, 1].view()).is_err());
        assert!(check_labels(2, &array![0, 0].view()).is_err());
    }

    /// Option values are validated against the number of labels.
    #[test]
    fn config() {
        assert!(check_config(&FitConfig::default(), 2).is_ok());
        assert!(check_config(&FitConfig { cv_n_folds: 1, ..FitConfig::default() }, 2).is_err());
        assert!(check_config(&FitConfig { pulearning: Some(2), ..FitConfig::default() }, 2)
                .is_err());
        assert!(check_config(&FitConfig { frac_noise: 1.5, ..FitConfig::default() }, 2).is_err());
    }

    /// A supplied matrix with trace at most 1 is rejected.
    #[test]
    fn trace_check() {
        let good = array![[0.8, 0.3],
                          [0.2, 0.7]];
        let bad = array![[0.5, 0.6],
                         [0.5, 0.4]];

        let estimation = Estimation::MatricesProvided {
            noise_matrix: Some(good.view()),
            inverse_noise_matrix: None,
            psx: None,
        };
        assert!(check_estimation(&estimation, 10, 2).is_ok());

        let estimation = Estimation::MatricesProvided {
            noise_matrix: Some(good.view()),
            inverse_noise_matrix: Some(bad.view()),
            psx: None,
        };
        match check_estimation(&estimation, 10, 2) {
            Err(Error::InvalidNoiseMatrix(_)) => {},
            _ => panic!("Expected InvalidNoiseMatrix"),
        }

        let estimation = Estimation::MatricesProvided {
            noise_matrix: None,
            inverse_noise_matrix: None,
            psx: None,
        };
        assert!(check_estimation(&estimation, 10, 2).is_err());
    }

    /// A kept class with zero self-accuracy cannot be reweighted.
    #[test]
    fn degenerate_class() {
        let inputs = Array2::from_shape_fn((6, 1), |(i, _)| i as f64);
        let labels = array![0, 0, 1, 1, 2, 2];
        let psx = array![[0.8, 0.1, 0.1], [0.8, 0.1, 0.1],
                         [0.1, 0.8, 0.1], [0.1, 0.8, 0.1],
                         [0.1, 0.1, 0.8], [0.1, 0.1, 0.8]];
        let noise_matrix = array![[1.0, 0.0, 0.5],
                                  [0.0, 1.0, 0.5],
                                  [0.0, 0.0, 0.0]];
        let inverse_noise_matrix = Array2::<f64>::eye(3);
        let estimation = Estimation::MatricesProvided {
            noise_matrix: Some(noise_matrix.view()),
            inverse_noise_matrix: Some(inverse_noise_matrix.view()),
            psx: Some(psx.view()),
        };

        let mut rp = RankPruning::new(KNN::new(1));
        match rp.fit(&inputs.view(), &labels.view(), estimation, &FitConfig::default()) {
            Err(Error::DegenerateClass { class: 2, .. }) => {},
            _ => panic!("Expected DegenerateClass"),
        }
    }

    /// The same seed gives the same fit.
    #[test]
    fn seeded() {
        // Two clusters; examples 3 and 14 carry the other cluster's label.
        let inputs = Array2::from_shape_fn((20, 1), |(i, _)| (i % 10 + i / 10 * 20) as f64);
        let labels = Array1::from_shape_fn(20, |i| match i {
            3 | 14 => 1 - i / 10,
            _ => i / 10,
        });
        let config = FitConfig { cv_n_folds: 2, ..FitConfig::default() };

        let mut first = RankPruning::new_seeded(KNN::new(3), 7);
        let mut second = RankPruning::new_seeded(KNN::new(3), 7);
        let a = first.fit(&inputs.view(), &labels.view(), Estimation::default(), &config)
                     .expect("Failed to fit");
        let b = second.fit(&inputs.view(), &labels.view(), Estimation::default(), &config)
                      .expect("Failed to fit");

        assert!(a.psx == b.psx);
        assert!(a.noise_mask == b.noise_mask);
        assert!(first.predict(&inputs.view()).unwrap()
                == second.predict(&inputs.view()).unwrap());
    }
}

//! Out-of-fold predicted probabilities via stratified k-fold cross-validation.
use ndarray::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

use crate::classifier::Classifier;
use crate::error::{Error, LearningResult};
use crate::latent::confident_joint::value_counts;


/// Assigns each example to one of `n_folds` folds, so that every fold
/// holds about the same share of every class.
///
/// The examples of each class are shuffled with `rng` and dealt round
/// robin; the dealing of a class starts where the previous class stopped,
/// which also balances the fold sizes.
///
/// # Errors
///
/// `InputValidation` if `n_folds < 2`, `InsufficientData` if some class
/// has fewer than `n_folds` examples.
pub fn stratified_folds<R: Rng>(labels: &ArrayView1<usize>, n_labels: usize, n_folds: usize,
                                rng: &mut R) -> LearningResult<Array1<usize>> {
    if n_folds < 2 {
        return Err(Error::InputValidation(
            format!("cross-validation needs at least 2 folds, got {}", n_folds)));
    }
    if let Some(&y) = labels.iter().find(|&&y| y >= n_labels) {
        return Err(Error::InputValidation(
            format!("label {} out of range for {} labels", y, n_labels)));
    }

    let counts = value_counts(labels, n_labels);
    if let Some((k, &c)) = counts.iter().enumerate().find(|&(_, &c)| c < n_folds) {
        return Err(Error::InsufficientData(
            format!("class {} has {} examples, fewer than the {} folds", k, c, n_folds)));
    }

    let mut folds = Array1::zeros(labels.len());
    let mut offset = 0;

    for k in 0..n_labels {
        let mut members = labels.iter()
                                .enumerate()
                                .filter(|&(_, &y)| y == k)
                                .map(|(i, _)| i)
                                .collect::<Vec<_>>();
        members.shuffle(rng);

        for (position, &i) in members.iter().enumerate() {
            folds[i] = (offset + position) % n_folds;
        }
        offset += members.len();
    }

    Ok(folds)
}

/// Estimates `psx`, the out-of-fold predicted probabilities: row `i` is
/// predicted by a copy of `classifier` trained on the folds not holding
/// example `i`.
///
/// Folds are trained and predicted in parallel, each on its own clone of
/// `classifier`; the classifier passed in is never trained.
///
/// # Arguments
///
/// * `inputs` - Matrix with one example per row.
/// * `labels` - Observed labels, in `0..n_labels`.
/// * `n_labels` - Number of classes.
/// * `classifier` - Prototype classifier.
/// * `n_folds` - Number of cross-validation folds.
/// * `rng` - Random number generator used to assign folds.
pub fn estimate_cv_predicted_probabilities<T, C, R>(inputs: &ArrayView2<T>,
                                                    labels: &ArrayView1<usize>,
                                                    n_labels: usize, classifier: &C,
                                                    n_folds: usize, rng: &mut R)
        -> LearningResult<Array2<f64>>
        where T: Clone + Send + Sync,
              C: Classifier<T> + Clone + Send + Sync,
              R: Rng {
    if inputs.nrows() != labels.len() {
        return Err(Error::InputValidation(
            format!("{} examples but {} labels", inputs.nrows(), labels.len())));
    }

    let folds = stratified_folds(labels, n_labels, n_folds, rng)?;
    debug!("Estimating out-of-fold probabilities with {} folds", n_folds);

    let predictions = (0..n_folds).into_par_iter()
                                  .map(|fold| {
        let (holdout, train): (Vec<usize>, Vec<usize>) = (0..labels.len())
                                                            .partition(|&i| folds[i] == fold);

        let mut model = classifier.clone();
        model.train(&inputs.select(Axis(0), &train).view(),
                    &labels.select(Axis(0), &train).view(),
                    n_labels, None)?;
        let probabilities = model.predict_probabilities(&inputs.select(Axis(0), &holdout)
                                                               .view())?;

        if probabilities.dim() != (holdout.len(), n_labels) {
            return Err(Error::Classifier(
                format!("classifier returned probabilities of shape {:?}, expected ({}, {})",
                        probabilities.dim(), holdout.len(), n_labels)));
        }
        trace!("Fold {}: trained on {}, predicted {}", fold, train.len(), holdout.len());

        Ok((holdout, probabilities))
    })
                                  .collect::<LearningResult<Vec<_>>>()?;

    let mut psx = Array2::zeros((labels.len(), n_labels));
    for (holdout, probabilities) in predictions {
        for (&i, p) in holdout.iter().zip(probabilities.outer_iter()) {
            psx.row_mut(i).assign(&p);
        }
    }

    Ok(psx)
}

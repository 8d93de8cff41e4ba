//! Module defining the pluggable classifier capability.
//!
//! A `Classifier<T>` is trained on (possibly reweighted) examples and
//! returns, for new input vectors, a probability distribution over the
//! labels `0, 1, ..., n_labels-1`. Rank Pruning never inspects the
//! concrete classifier: any model implementing this trait can be
//! cleaned of label noise.
pub mod knn;

use ndarray::prelude::*;
use ordered_float::OrderedFloat;

use crate::error::LearningResult;

pub use self::knn::KNN;

/// A probabilistic classifier.
///
/// This trait is parametrized over `T`, the element type of the
/// input vectors.
pub trait Classifier<T> {
    /// Trains the classifier, discarding any previous training.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Matrix with one training vector per row.
    /// * `targets` - Labels of the training vectors, in `0..n_labels`.
    /// * `n_labels` - Number of labels of the problem. Some labels may
    ///                have no training example.
    /// * `sample_weight` - Optional per-example weight in the loss.
    fn train(&mut self, inputs: &ArrayView2<T>, targets: &ArrayView1<usize>,
             n_labels: usize, sample_weight: Option<&ArrayView1<f64>>)
             -> LearningResult<()>;

    /// Returns a `(n_inputs, n_labels)` matrix whose rows are probability
    /// distributions over the labels, in the fixed order `0..n_labels`.
    fn predict_probabilities(&self, inputs: &ArrayView2<T>) -> LearningResult<Array2<f64>>;

    /// Returns the most probable label for each input vector.
    fn predict(&self, inputs: &ArrayView2<T>) -> LearningResult<Array1<usize>> {
        let probabilities = self.predict_probabilities(inputs)?;

        Ok(probabilities.outer_iter()
                        .map(|p| argmax(&p))
                        .collect::<Array1<_>>())
    }
}

/// Index of the largest value; the lowest index wins exact ties.
pub(crate) fn argmax(values: &ArrayView1<f64>) -> usize {
    values.iter()
          .enumerate()
          .fold((0, OrderedFloat(f64::NEG_INFINITY)), |best, (k, &v)| {
              if OrderedFloat(v) > best.1 { (k, OrderedFloat(v)) } else { best }
          })
          .0
}

//! k-NN classifier.
use itertools::Itertools;
use ndarray::prelude::*;
use ordered_float::OrderedFloat;

use crate::classifier::Classifier;
use crate::error::{Error, LearningResult};


/// Returns the Euclidean distance between two vectors of f64 values.
fn euclidean_distance(v1: &ArrayView1<f64>, v2: &ArrayView1<f64>) -> f64 {
    v1.iter()
      .zip(v2.iter())
      .map(|(x,y)| (x - y).powi(2))
      .sum::<f64>()
      .sqrt()
}

/// A k-NN classifier.
///
/// The probability of label `y` for a test vector is the (sample weighted)
/// fraction of its `k` nearest training vectors that carry label `y`.
/// Equidistant neighbors are taken in training order.
#[derive(Clone)]
pub struct KNN<T> {
    k: usize,
    distance: fn(&ArrayView1<T>, &ArrayView1<T>) -> f64,
    n_labels: Option<usize>,
    train_inputs: Option<Array2<T>>,
    train_targets: Option<Array1<usize>>,
    // Uniform weights are stored explicitly, so prediction has a single path.
    train_weights: Option<Array1<f64>>,
}

impl KNN<f64> {
    /// Constructs a k-NN classifier.
    ///
    /// # Arguments
    ///
    /// `k` - Number of nearest neighbors.
    ///
    /// # Examples
    ///
    /// ```
    /// use rank_pruning::classifier::*;
    ///
    /// let k = 2;
    /// let knn = KNN::new(k);
    /// ```
    pub fn new(k: usize) -> KNN<f64> {
        KNN {
            k: k,
            distance: euclidean_distance,
            n_labels: None,
            train_inputs: None,
            train_targets: None,
            train_weights: None,
        }
    }
}

impl<T> Classifier<T> for KNN<T> where T: Clone {
    /// Trains a k-NN classifier.
    ///
    /// Training stores the training set; calling it again replaces the
    /// previously stored one.
    fn train(&mut self, inputs: &ArrayView2<T>, targets: &ArrayView1<usize>,
             n_labels: usize, sample_weight: Option<&ArrayView1<f64>>)
             -> LearningResult<()> {
        if self.k == 0 {
            return Err(Error::InputValidation("k-NN needs k > 0".to_string()));
        }
        if inputs.nrows() != targets.len() {
            return Err(Error::InputValidation(
                format!("{} training vectors but {} labels", inputs.nrows(), targets.len())));
        }
        if let Some(&y) = targets.iter().find(|&&y| y >= n_labels) {
            return Err(Error::InputValidation(
                format!("label {} out of range for {} labels", y, n_labels)));
        }

        let weights = match sample_weight {
            Some(w) if w.len() != targets.len() => {
                return Err(Error::InputValidation(
                    format!("{} sample weights for {} training vectors", w.len(), targets.len())));
            },
            Some(w) => w.to_owned(),
            None => Array1::ones(targets.len()),
        };

        self.n_labels = Some(n_labels);
        self.train_inputs = Some(inputs.to_owned());
        self.train_targets = Some(targets.to_owned());
        self.train_weights = Some(weights);

        Ok(())
    }

    /// Returns the weighted neighbor vote fractions for each test vector.
    ///
    /// If all the neighbors of a vector have zero weight (or there are no
    /// training vectors) its distribution is uniform.
    fn predict_probabilities(&self, inputs: &ArrayView2<T>) -> LearningResult<Array2<f64>> {
        let (n_labels, train_inputs, train_targets, train_weights) =
            match (self.n_labels, &self.train_inputs, &self.train_targets, &self.train_weights) {
                (Some(n), Some(x), Some(y), Some(w)) => (n, x, y, w),
                _ => return Err(Error::Classifier("You should train the model first".to_string())),
            };

        if inputs.ncols() != train_inputs.ncols() {
            return Err(Error::InputValidation(
                format!("test vectors have {} features, training vectors {}",
                        inputs.ncols(), train_inputs.ncols())));
        }

        let mut probabilities = Array2::<f64>::zeros((inputs.nrows(), n_labels));

        for (i, x) in inputs.outer_iter().enumerate() {
            let neighbors = train_inputs.outer_iter()
                                        .enumerate()
                                        .map(|(j, t)| (OrderedFloat((self.distance)(&t, &x)), j))
                                        .k_smallest(self.k);

            let mut row = probabilities.row_mut(i);
            for (_, j) in neighbors {
                row[train_targets[j]] += train_weights[j];
            }

            let total = row.sum();
            if total > 0. {
                row /= total;
            } else {
                row.fill(1. / n_labels as f64);
            }
        }

        Ok(probabilities)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Verify that k-NN training stores the training set.
    #[test]
    fn train() {
        let mut knn = KNN::new(2);
        let n_labels = 3;

        let train_inputs = array![[2., 2.],
                                  [1., 2.],
                                  [0., 0.]];
        let train_targets = array![2, 2, 0];

        knn.train(&train_inputs.view(), &train_targets.view(), n_labels, None)
           .expect("Failed to train k-NN");

        assert!(knn.train_inputs.unwrap() == train_inputs);
        assert!(knn.train_targets.unwrap() == train_targets);
        assert!(knn.train_weights.unwrap() == array![1., 1., 1.]);
    }

    /// Probabilities are the vote fractions of the k nearest neighbors.
    #[test]
    fn knn() {
        let mut knn = KNN::new(3);

        let train_inputs = array![[0., 0.],
                                  [1., 0.],
                                  [0., 1.],
                                  [5., 5.],
                                  [6., 5.],
                                  [5., 6.]];
        let train_targets = array![0, 0, 1, 1, 1, 1];
        let test_inputs = array![[0., 0.],
                                 [6., 6.]];

        knn.train(&train_inputs.view(), &train_targets.view(), 3, None)
           .expect("Failed to train k-NN");
        let probabilities = knn.predict_probabilities(&test_inputs.view())
                               .expect("Failed to predict");

        assert_eq!(probabilities.shape(), &[2, 3]);
        assert!((probabilities[[0, 0]] - 2. / 3.).abs() < 1e-12);
        assert!((probabilities[[0, 1]] - 1. / 3.).abs() < 1e-12);
        assert_eq!(probabilities[[1, 1]], 1.);
        assert_eq!(probabilities[[1, 2]], 0.);
        assert!(knn.predict(&test_inputs.view()).unwrap() == array![0, 1]);
    }

    /// Sample weights scale the votes; zero weights give a uniform row.
    #[test]
    fn weighted_votes() {
        let mut knn = KNN::new(2);

        let train_inputs = array![[0.], [1.]];
        let train_targets = array![0, 1];
        let weights = array![3., 1.];
        let test_inputs = array![[0.5]];

        knn.train(&train_inputs.view(), &train_targets.view(), 2, Some(&weights.view()))
           .unwrap();
        let probabilities = knn.predict_probabilities(&test_inputs.view()).unwrap();
        assert!(probabilities == array![[0.75, 0.25]]);

        let zeros = array![0., 0.];
        knn.train(&train_inputs.view(), &train_targets.view(), 2, Some(&zeros.view()))
           .unwrap();
        let probabilities = knn.predict_probabilities(&test_inputs.view()).unwrap();
        assert!(probabilities == array![[0.5, 0.5]]);
    }

    /// Predicting before training fails instead of panicking.
    #[test]
    fn untrained() {
        let knn = KNN::new(2);
        let test_inputs = array![[0., 1.]];

        match knn.predict_probabilities(&test_inputs.view()) {
            Err(Error::Classifier(_)) => {},
            _ => panic!("Expected a classifier error"),
        }
    }
}

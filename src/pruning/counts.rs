//! Prune-count matrices.
//!
//! A prune-count matrix `m` has one row per observed label: `m[[s, y]]`
//! (`y != s`) is the number of examples observed as `s` to remove as
//! probably belonging to class `y`; `m[[s, s]]` is the number to keep.
use ndarray::prelude::*;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;


/// Expected counts from the inverse noise matrix:
/// `m[[s, y]] = inverse_noise_matrix[[y, s]] * label_counts[s]`.
pub fn inverse_nm_dot_s(inverse_noise_matrix: &ArrayView2<f64>,
                        label_counts: &ArrayView1<usize>) -> Array2<f64> {
    let n_labels = label_counts.len();
    Array2::from_shape_fn((n_labels, n_labels),
                          |(s, y)| inverse_noise_matrix[[y, s]] * label_counts[s] as f64)
}

/// Keeps at least `min(n, label_counts[s])` examples of every observed
/// class `s`.
///
/// Whatever a diagonal entry is raised by is taken in equal parts from
/// the non-zero off-diagonal entries of its row, which are floored at 0.
/// What the floor leaves over is taken from the remaining off-diagonal
/// entries in column order, so the row total never grows.
pub fn keep_at_least_n_per_class(prune_counts: &ArrayView2<f64>,
                                 label_counts: &ArrayView1<usize>, n: usize) -> Array2<f64> {
    let mut kept = prune_counts.to_owned();

    for (s, mut row) in kept.outer_iter_mut().enumerate() {
        let target = n.min(label_counts[s]) as f64;
        let raise = target - row[s];
        if raise <= 0. {
            continue;
        }

        let n_noisy = row.iter()
                         .enumerate()
                         .filter(|&(y, &c)| y != s && c > 0.)
                         .count();
        row[s] = target;
        if n_noisy == 0 {
            continue;
        }

        let decrease = raise / n_noisy as f64;
        let mut deficit = raise;
        for (y, c) in row.iter_mut().enumerate() {
            if y != s && *c > 0. {
                let taken = c.min(decrease);
                *c -= taken;
                deficit -= taken;
            }
        }

        for (y, c) in row.iter_mut().enumerate() {
            if deficit <= 0. {
                break;
            }
            if y != s && *c > 0. {
                let taken = c.min(deficit);
                *c -= taken;
                deficit -= taken;
            }
        }
    }

    kept
}

/// Scales the off-diagonal counts by `frac_noise`, moving the difference
/// onto the diagonal.
pub fn reduce_prune_counts(prune_counts: &ArrayView2<f64>, frac_noise: f64) -> Array2<f64> {
    let mut reduced = prune_counts.to_owned();

    for (s, mut row) in reduced.outer_iter_mut().enumerate() {
        let mut moved = 0.;
        for (y, c) in row.iter_mut().enumerate() {
            if y != s {
                moved += *c * (1. - frac_noise);
                *c *= frac_noise;
            }
        }
        row[s] += moved;
    }

    reduced
}

/// Rounds to integer counts so that every row total equals its rounded
/// real total (largest remainder method; equal remainders go to the
/// lower column).
pub fn round_preserving_row_totals(prune_counts: &ArrayView2<f64>) -> Array2<usize> {
    let mut rounded = Array2::zeros(prune_counts.dim());

    for (s, row) in prune_counts.outer_iter().enumerate() {
        let row = row.mapv(|c| c.max(0.));
        let total = row.sum().round() as usize;

        let mut assigned = 0;
        for (y, c) in row.iter().enumerate() {
            rounded[[s, y]] = c.floor() as usize;
            assigned += rounded[[s, y]];
        }

        let mut by_remainder = (0..row.len()).collect::<Vec<_>>();
        by_remainder.sort_by_key(|&y| (Reverse(OrderedFloat(row[y] - row[y].floor())), y));
        for &y in by_remainder.iter().take(total.saturating_sub(assigned)) {
            rounded[[s, y]] += 1;
        }
    }

    rounded
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn assert_close(actual: Array2<f64>, expected: Array2<f64>) {
        assert_eq!(actual.dim(), expected.dim());
        for (a, b) in actual.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    /// Row s of the expected counts is column s of the inverse noise
    /// matrix times the class count.
    #[test]
    fn expected_counts() {
        let inverse = array![[0.8, 0.25],
                             [0.2, 0.75]];
        let counts = array![10, 4];
        let m = inverse_nm_dot_s(&inverse.view(), &counts.view());

        assert_close(m, array![[8., 2.], [1., 3.]]);
    }

    /// Diagonals are raised to the minimum, at the expense of the noise.
    #[test]
    fn keep_at_least() {
        let m = array![[1., 3., 2., 0.],
                       [0., 2., 0., 0.],
                       [0., 0., 6., 0.],
                       [0., 0., 0., 1.]];
        let counts = array![6, 2, 6, 1];
        let kept = keep_at_least_n_per_class(&m.view(), &counts.view(), 5);

        assert_close(kept, array![[5., 1., 0., 0.],
                                  [0., 2., 0., 0.],
                                  [0., 0., 6., 0.],
                                  [0., 0., 0., 1.]]);
    }

    /// An uneven row never ends up with more than its class count.
    #[test]
    fn keep_at_least_uneven() {
        let m = array![[1., 3.5, 0.5],
                       [0., 4., 1.],
                       [0.5, 0.5, 4.]];
        let counts = array![5, 5, 5];
        let kept = keep_at_least_n_per_class(&m.view(), &counts.view(), 5);

        assert_close(kept.clone(), array![[5., 0., 0.],
                                          [0., 5., 0.],
                                          [0., 0., 5.]]);
        for (row, &count) in kept.outer_iter().zip(counts.iter()) {
            assert!(row.sum() <= count as f64 + 1e-12);
        }
    }

    /// Reducing the noise fraction keeps the row totals.
    #[test]
    fn reduce() {
        let m = array![[6., 4.],
                       [2., 8.]];
        let reduced = reduce_prune_counts(&m.view(), 0.5);

        assert_close(reduced, array![[8., 2.], [1., 9.]]);
        assert_close(reduce_prune_counts(&m.view(), 1.), m);
    }

    /// Rounded rows sum to the rounded real row totals.
    #[test]
    fn rounding() {
        let m = array![[3.4, 3.3, 3.3],
                       [0.5, 0.5, 9.],
                       [2.6, 0.2, 0.2]];
        let rounded = round_preserving_row_totals(&m.view());

        assert!(rounded == array![[4, 3, 3],
                                  [1, 0, 9],
                                  [3, 0, 0]]);
    }
}

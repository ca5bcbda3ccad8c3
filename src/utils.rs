use ndarray::{Array2, Array3, ArrayViewMut1};

/// Viterbi back-pointer: `(prior_state_index, prior_time_index)`.
pub type BackPointer = (usize, usize);

// Every container below owns its rows, writing one row never shows up in another.

pub fn zeros_2d(rows: usize, columns: usize) -> Array2<f64> {
    Array2::zeros((rows, columns))
}

pub fn zeros_3d(x: usize, y: usize, z: usize) -> Array3<f64> {
    Array3::zeros((x, y, z))
}

pub fn pointers_2d(rows: usize, columns: usize) -> Array2<BackPointer> {
    Array2::from_elem((rows, columns), (0, 0))
}

/// Turns a row of raw counts into add-k smoothed probabilities.
///
/// `total` is the number of events counted in the row. Each entry becomes
/// `(count + k) / (total + len * k)`; an empty denominator gives a zero row.
pub fn smooth_row(mut row: ArrayViewMut1<f64>, total: f64, k_smoothing: f64) {
    let denominator = total + row.len() as f64 * k_smoothing;
    if denominator == 0.0 {
        row.fill(0.0);
        return;
    }
    row.mapv_inplace(|count| (count + k_smoothing) / denominator);
}

/// Rescales a row of non-negative weights so it sums to one.
pub fn normalize_row(mut row: ArrayViewMut1<f64>) {
    let s = row.sum();
    if s > 0.0 {
        row /= s;
    }
}

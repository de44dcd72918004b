//! Small dense linear algebra for the cost equation system.
//!
//! The system is a fixed 8x8, so rank checks and the final solve are plain
//! Gaussian elimination with partial pivoting — no external LAPACK backend.

use ndarray::{Array1, Array2, ArrayView2};
use tamarix_core::error::{Error, Result};

/// Relative pivot threshold below which a system counts as ill-conditioned.
const PIVOT_TOLERANCE: f64 = 1e-9;

/// Rank of a matrix, computed by row reduction with partial pivoting.
pub fn rank(matrix: ArrayView2<'_, f64>) -> usize {
    let (rows, cols) = matrix.dim();
    let mut work = matrix.to_owned();
    let scale = max_abs(&work).max(1.0);

    let mut rank = 0;
    let mut col = 0;
    while rank < rows && col < cols {
        // Largest remaining entry in this column.
        let mut pivot_row = rank;
        let mut pivot_val = work[[rank, col]].abs();
        for r in rank + 1..rows {
            if work[[r, col]].abs() > pivot_val {
                pivot_val = work[[r, col]].abs();
                pivot_row = r;
            }
        }
        if pivot_val <= PIVOT_TOLERANCE * scale {
            col += 1;
            continue;
        }
        if pivot_row != rank {
            swap_rows(&mut work, rank, pivot_row);
        }
        for r in rank + 1..rows {
            let factor = work[[r, col]] / work[[rank, col]];
            for c in col..cols {
                work[[r, c]] -= factor * work[[rank, c]];
            }
        }
        rank += 1;
        col += 1;
    }
    rank
}

/// Solves `matrix * x = rhs` exactly via LU with partial pivoting.
///
/// A pivot collapsing below tolerance surfaces as
/// [`Error::IllConditionedSystem`] rather than returning garbage.
pub fn solve(matrix: ArrayView2<'_, f64>, rhs: &Array1<f64>) -> Result<Array1<f64>> {
    let (rows, cols) = matrix.dim();
    debug_assert_eq!(rows, cols);
    debug_assert_eq!(rows, rhs.len());

    let mut work = matrix.to_owned();
    let mut b = rhs.clone();
    let scale = max_abs(&work).max(1.0);

    // Forward elimination.
    for k in 0..rows {
        let mut pivot_row = k;
        let mut pivot_val = work[[k, k]].abs();
        for r in k + 1..rows {
            if work[[r, k]].abs() > pivot_val {
                pivot_val = work[[r, k]].abs();
                pivot_row = r;
            }
        }
        if pivot_val <= PIVOT_TOLERANCE * scale {
            return Err(Error::IllConditionedSystem(format!(
                "pivot {:.3e} at column {} below tolerance",
                pivot_val, k
            )));
        }
        if pivot_row != k {
            swap_rows(&mut work, k, pivot_row);
            b.swap(k, pivot_row);
        }
        for r in k + 1..rows {
            let factor = work[[r, k]] / work[[k, k]];
            for c in k..cols {
                work[[r, c]] -= factor * work[[k, c]];
            }
            b[r] -= factor * b[k];
        }
    }

    // Back substitution.
    let mut x = Array1::zeros(rows);
    for k in (0..rows).rev() {
        let mut sum = b[k];
        for c in k + 1..cols {
            sum -= work[[k, c]] * x[c];
        }
        x[k] = sum / work[[k, k]];
    }
    Ok(x)
}

/// Euclidean norm of a row vector.
pub fn norm(row: &Array1<f64>) -> f64 {
    row.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn max_abs(matrix: &Array2<f64>) -> f64 {
    matrix.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
}

fn swap_rows(matrix: &mut Array2<f64>, a: usize, b: usize) {
    let cols = matrix.dim().1;
    for c in 0..cols {
        let tmp = matrix[[a, c]];
        matrix[[a, c]] = matrix[[b, c]];
        matrix[[b, c]] = tmp;
    }
}

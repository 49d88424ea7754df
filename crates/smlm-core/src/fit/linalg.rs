use ndarray::Array2;

/// Solve the square system `a x = b` by Gaussian elimination with partial
/// pivoting. Returns `None` when the matrix is singular.
pub fn solve(a: &Array2<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return None;
    }
    let mut m = a.clone();
    let mut rhs = b.to_vec();

    for col in 0..n {
        let mut pivot = col;
        let mut max_val = m[[col, col]].abs();
        for row in (col + 1)..n {
            if m[[row, col]].abs() > max_val {
                max_val = m[[row, col]].abs();
                pivot = row;
            }
        }
        if max_val < 1e-12 || !max_val.is_finite() {
            return None;
        }

        if pivot != col {
            for j in 0..n {
                m.swap([col, j], [pivot, j]);
            }
            rhs.swap(col, pivot);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            for j in col..n {
                m[[row, j]] -= factor * m[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= m[[i, j]] * x[j];
        }
        x[i] = sum / m[[i, i]];
    }
    Some(x)
}

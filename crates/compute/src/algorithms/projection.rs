//! Classical multidimensional scaling to two dimensions.

const MAX_ITERATIONS: usize = 300;
const TOLERANCE: f64 = 1e-10;

/// Embed points in 2-D so Euclidean distances approximate `distances`.
///
/// Double-centres the squared distance matrix and takes its two leading
/// eigenpairs by power iteration with deflation. Non-positive eigenvalues
/// collapse their axis to zero.
pub fn classical_mds(distances: &[Vec<f64>]) -> Vec<(f64, f64)> {
    let n = distances.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![(0.0, 0.0)],
        _ => {}
    }

    let mut b = double_centre(distances);

    let (l1, v1) = leading_eigenpair(&b);
    for i in 0..n {
        for j in 0..n {
            b[i][j] -= l1 * v1[i] * v1[j];
        }
    }
    let (l2, v2) = leading_eigenpair(&b);

    let s1 = l1.max(0.0).sqrt();
    let s2 = l2.max(0.0).sqrt();
    v1.iter()
        .zip(&v2)
        .map(|(a, b)| (a * s1, b * s2))
        .collect()
}

/// `-1/2 · J D² J` with `J` the centring matrix.
fn double_centre(distances: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = distances.len();
    let squared: Vec<Vec<f64>> = distances
        .iter()
        .map(|row| row.iter().map(|d| d * d).collect())
        .collect();

    let row_means: Vec<f64> = squared
        .iter()
        .map(|row| row.iter().sum::<f64>() / n as f64)
        .collect();
    let grand_mean = row_means.iter().sum::<f64>() / n as f64;

    let mut b = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            // The matrix is symmetric, so column means equal row means.
            b[i][j] = -0.5 * (squared[i][j] - row_means[i] - row_means[j] + grand_mean);
        }
    }
    b
}

/// Largest algebraic eigenvalue of a symmetric matrix and its unit
/// eigenvector.
fn leading_eigenpair(m: &[Vec<f64>]) -> (f64, Vec<f64>) {
    let n = m.len();

    // Shift by a Gershgorin bound so every eigenvalue is non-negative and
    // power iteration converges to the largest algebraic one.
    let shift = m
        .iter()
        .map(|row| row.iter().map(|x| x.abs()).sum::<f64>())
        .fold(0.0, f64::max);

    let mut v: Vec<f64> = (0..n).map(|i| 1.0 + i as f64 / n as f64).collect();
    normalize(&mut v);

    for _ in 0..MAX_ITERATIONS {
        let mut next = multiply(m, &v);
        for (x, vi) in next.iter_mut().zip(&v) {
            *x += shift * vi;
        }
        if normalize(&mut next) <= f64::EPSILON {
            return (0.0, vec![0.0; n]);
        }
        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = next;
        if delta < TOLERANCE {
            break;
        }
    }

    let mv = multiply(m, &v);
    let eigenvalue = v.iter().zip(&mv).map(|(a, b)| a * b).sum();
    (eigenvalue, v)
}

fn multiply(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter()
        .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
        ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
    }

    #[test]
    fn trivial_inputs() {
        assert!(classical_mds(&[]).is_empty());
        assert_eq!(classical_mds(&[vec![0.0]]), vec![(0.0, 0.0)]);
    }

    #[test]
    fn two_points_keep_their_distance() {
        let points = classical_mds(&[vec![0.0, 1.0], vec![1.0, 0.0]]);
        assert_eq!(points.len(), 2);
        assert!((dist(points[0], points[1]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn collinear_points_are_recovered() {
        let d = vec![
            vec![0.0, 1.0, 2.0],
            vec![1.0, 0.0, 1.0],
            vec![2.0, 1.0, 0.0],
        ];
        let points = classical_mds(&d);
        for i in 0..3 {
            for j in 0..3 {
                assert!((dist(points[i], points[j]) - d[i][j]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn right_triangle_uses_both_axes() {
        let d = vec![
            vec![0.0, 3.0, 4.0],
            vec![3.0, 0.0, 5.0],
            vec![4.0, 5.0, 0.0],
        ];
        let points = classical_mds(&d);
        for i in 0..3 {
            for j in 0..3 {
                assert!((dist(points[i], points[j]) - d[i][j]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn identical_points_collapse() {
        let points = classical_mds(&[vec![0.0, 0.0], vec![0.0, 0.0]]);
        assert_eq!(points, vec![(0.0, 0.0), (0.0, 0.0)]);
    }
}

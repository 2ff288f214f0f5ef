//! Eigen-decomposition of symmetric 3x3 matrices.
//!
//! Thin wrapper over nalgebra's symmetric solver that validates the input,
//! snaps near-zero eigenvalues and returns the eigenvectors in a stable,
//! right-handed order.

use nalgebra::{Matrix3, Vector3};

use crate::error::{CloudlensError, Result};

/// Eigenvalues with magnitude below `EIGENVALUE_EPSILON * |m|_max` are
/// reported as exactly zero.
pub const EIGENVALUE_EPSILON: f64 = 1e-10;

/// Allowed `|m[i][j] - m[j][i]|`, relative to `|m|_max`.
pub const SYMMETRY_TOLERANCE: f64 = 1e-6;

/// Eigenvalues and eigenvectors of a symmetric 3x3 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricEigen3 {
    /// `eigenvalues[i]` belongs to column `i` of `eigenvectors`.
    pub eigenvalues: Vector3<f64>,
    /// Orthonormal eigenvectors stored as columns, with determinant +1.
    pub eigenvectors: Matrix3<f64>,
}

fn max_abs(m: &Matrix3<f64>) -> f64 {
    m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Returns whether `m` is symmetric within [`SYMMETRY_TOLERANCE`].
pub fn is_symmetric(m: &Matrix3<f64>) -> bool {
    let tol = SYMMETRY_TOLERANCE * max_abs(m);
    (0..3).all(|i| (0..3).all(|j| (m[(i, j)] - m[(j, i)]).abs() <= tol))
}

/// Decomposes `m = V * diag(lambda) * V^T`.
///
/// Eigenvectors are permuted so that each one sits in the column of the axis
/// it is most aligned with, signed so that component is positive, and the
/// last column is flipped if needed to make `V` a proper rotation. A
/// diagonal input therefore yields the identity.
pub fn symmetric_eigen(m: &Matrix3<f64>) -> Result<SymmetricEigen3> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(CloudlensError::InvalidCovariance(
            "matrix has non-finite entries".to_string(),
        ));
    }
    if !is_symmetric(m) {
        return Err(CloudlensError::InvalidCovariance(
            "matrix is not symmetric".to_string(),
        ));
    }

    let scale = max_abs(m);
    if scale <= 0.0 {
        return Ok(SymmetricEigen3 {
            eigenvalues: Vector3::zeros(),
            eigenvectors: Matrix3::identity(),
        });
    }

    let eigen = m.symmetric_eigen();
    let permutation = best_axis_permutation(&eigen.eigenvectors);

    let snap = EIGENVALUE_EPSILON * scale;
    let mut eigenvalues = Vector3::zeros();
    let mut eigenvectors = Matrix3::zeros();
    for (axis, &source) in permutation.iter().enumerate() {
        let lambda = eigen.eigenvalues[source];
        eigenvalues[axis] = if lambda.abs() < snap { 0.0 } else { lambda };

        let mut column = eigen.eigenvectors.column(source).normalize();
        if column[axis] < 0.0 {
            column = -column;
        }
        eigenvectors.set_column(axis, &column);
    }

    if eigenvectors.determinant() < 0.0 {
        let flipped = -eigenvectors.column(2).into_owned();
        eigenvectors.set_column(2, &flipped);
    }

    Ok(SymmetricEigen3 {
        eigenvalues,
        eigenvectors,
    })
}

/// Picks the column order maximizing `sum_i |V[i][perm[i]]|`.
fn best_axis_permutation(vectors: &Matrix3<f64>) -> [usize; 3] {
    const PERMUTATIONS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let alignment = |perm: &[usize; 3]| -> f64 {
        perm.iter()
            .enumerate()
            .map(|(axis, &col)| vectors[(axis, col)].abs())
            .sum()
    };

    let mut best = PERMUTATIONS[0];
    let mut best_score = alignment(&best);
    for perm in &PERMUTATIONS[1..] {
        let score = alignment(perm);
        if score > best_score + 1e-12 {
            best = *perm;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagonal_is_identity() {
        let m = Matrix3::from_diagonal(&Vector3::new(4.0, 1.0, 0.0));
        let eig = symmetric_eigen(&m).unwrap();
        assert!((eig.eigenvalues - Vector3::new(4.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((eig.eigenvectors - Matrix3::identity()).norm() < 1e-12);
    }

    #[test]
    fn test_negative_noise_snaps_to_zero() {
        let m = Matrix3::from_diagonal(&Vector3::new(2.0, -1e-14, 1.0));
        let eig = symmetric_eigen(&m).unwrap();
        assert_eq!(eig.eigenvalues[1], 0.0);
    }

    #[test]
    fn test_rotated_matrix() {
        // 45 degree rotation about Z of diag(9, 1, 4).
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let r = Matrix3::new(s, -s, 0.0, s, s, 0.0, 0.0, 0.0, 1.0);
        let m = r * Matrix3::from_diagonal(&Vector3::new(9.0, 1.0, 4.0)) * r.transpose();

        let eig = symmetric_eigen(&m).unwrap();
        let v = &eig.eigenvectors;
        assert!((v.transpose() * v - Matrix3::identity()).norm() < 1e-9);
        assert!((v.determinant() - 1.0).abs() < 1e-9);

        let rebuilt = v * Matrix3::from_diagonal(&eig.eigenvalues) * v.transpose();
        assert!((rebuilt - m).norm() < 1e-9);
    }

    #[test]
    fn test_rejects_asymmetric() {
        let m = Matrix3::new(1.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(!is_symmetric(&m));
        assert!(matches!(
            symmetric_eigen(&m),
            Err(CloudlensError::InvalidCovariance(_))
        ));
    }

    #[test]
    fn test_small_scale_asymmetry_is_rejected() {
        let m = Matrix3::new(1e-8, 9e-7, 0.0, 0.0, 1e-8, 0.0, 0.0, 0.0, 1e-8);
        assert!(!is_symmetric(&m));
        assert!(matches!(
            symmetric_eigen(&m),
            Err(CloudlensError::InvalidCovariance(_))
        ));
    }

    #[test]
    fn test_small_scale_eigenvalues_survive() {
        let m = Matrix3::from_diagonal(&Vector3::new(4e-12, 1e-12, 2e-12));
        let eig = symmetric_eigen(&m).unwrap();
        assert!((eig.eigenvalues - Vector3::new(4e-12, 1e-12, 2e-12)).norm() < 1e-20);
    }

    #[test]
    fn test_zero_matrix() {
        let eig = symmetric_eigen(&Matrix3::zeros()).unwrap();
        assert_eq!(eig.eigenvalues, Vector3::zeros());
        assert_eq!(eig.eigenvectors, Matrix3::identity());
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut m = Matrix3::identity();
        m[(1, 1)] = f64::NAN;
        assert!(symmetric_eigen(&m).is_err());
    }
}

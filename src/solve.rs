//! Direct sparse solve of the assembled global system.
//!
//! One sparse LU factorization and solve per step (or per Picard iterate).
//! The system is linear because the diffusion coefficients are frozen at
//! the prior state; the solve either succeeds for the whole network or the
//! step fails as a unit.

use faer::linalg::solvers::Solve;
use faer::sparse::SparseColMat;
use faer::Mat;

use crate::error::NumericalError;

/// Factor and solve `matrix * x = rhs`, returning the solution as a flat
/// vector of new elevations in global node order.
pub(crate) fn solve_sparse(
    matrix: &SparseColMat<usize, f64>,
    rhs: &Mat<f64>,
    step: usize,
) -> Result<Vec<f64>, NumericalError> {
    let lu = matrix
        .as_ref()
        .sp_lu()
        .map_err(|_| NumericalError::SingularSystem { step })?;
    let solution = lu.solve(rhs);
    Ok((0..solution.nrows()).map(|i| solution[(i, 0)]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::sparse::Triplet;

    #[test]
    fn test_solves_tridiagonal_system() {
        // [ 2 -1  0 ] [x]   [1]
        // [-1  2 -1 ] [y] = [0]
        // [ 0 -1  2 ] [z]   [1]
        let triplets = [
            Triplet::new(0, 0, 2.0),
            Triplet::new(0, 1, -1.0),
            Triplet::new(1, 0, -1.0),
            Triplet::new(1, 1, 2.0),
            Triplet::new(1, 2, -1.0),
            Triplet::new(2, 1, -1.0),
            Triplet::new(2, 2, 2.0),
        ];
        let matrix = SparseColMat::try_new_from_triplets(3, 3, &triplets).unwrap();
        let mut rhs = Mat::zeros(3, 1);
        rhs[(0, 0)] = 1.0;
        rhs[(2, 0)] = 1.0;

        let x = solve_sparse(&matrix, &rhs, 0).unwrap();
        let expected = [1.0, 1.0, 1.0];
        for (got, want) in x.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_identity_passthrough() {
        let triplets = [Triplet::new(0, 0, 1.0), Triplet::new(1, 1, 1.0)];
        let matrix = SparseColMat::try_new_from_triplets(2, 2, &triplets).unwrap();
        let mut rhs = Mat::zeros(2, 1);
        rhs[(0, 0)] = 4.5;
        rhs[(1, 0)] = -2.0;
        let x = solve_sparse(&matrix, &rhs, 0).unwrap();
        assert_eq!(x, vec![4.5, -2.0]);
    }
}

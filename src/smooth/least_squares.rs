#![allow(non_snake_case)]

use super::Smooth;
use crate::error::{Error, Result};
use crate::linop::DesignMatrix;
use ndarray::prelude::*;
use ndarray::NdFloat;

/// Least squares data term
///
/// ```math
/// f(x) = \frac{1}{2n} \|Ax - b\|_2^2 = \frac1n \sum_{i=1}^n \frac12 (a_i^T x - b_i)^2
/// ```
/// where $`a_i`$ is the `i`-th row of the $`n \times p`$ design matrix
/// $`A`$, dense (`Array2`) or sparse ([`CscMatrix`](crate::linop::CscMatrix)).
///
/// All Lipschitz constants are computed once at construction:
/// - $`L = \sigma_1(A)^2 / n`$,
/// - $`L_j = \|A_{:,j}\|_2^2 / n`$ for coordinate `j`,
/// - $`L_{\max} = \max_i \|a_i\|_2^2`$ for the per-sample terms.
///
/// Coordinate descent keeps the residual $`Ax - b`$ as its cache, so one
/// coordinate update costs a pass over a single column.
#[derive(Debug, Clone)]
pub struct LeastSquares<S, M = Array2<S>> {
    A: M,
    b: Array1<S>,
    lipschitz: S,
    column_lipschitz: Array1<S>,
    sample_lipschitz: S,
}

impl<S, M> LeastSquares<S, M>
where
    S: NdFloat,
    M: DesignMatrix<S>,
{
    pub fn new(A: M, b: Array1<S>) -> Result<Self> {
        let (n, p) = A.shape();
        if n == 0 || p == 0 {
            return Err(Error::invalid("least squares needs a non-empty design matrix"));
        }
        if b.len() != n {
            return Err(Error::invalid(format!(
                "least squares targets have length {} but the design matrix has {} rows",
                b.len(),
                n
            )));
        }
        let n_inv = S::one() / S::from(n).unwrap();
        let lipschitz = A.norm_squared()? * n_inv;
        let column_lipschitz = A.column_norms_squared() * n_inv;
        let sample_lipschitz = A
            .row_norms_squared()
            .fold(S::zero(), |acc, &v| if v > acc { v } else { acc });
        Ok(LeastSquares {
            A,
            b,
            lipschitz,
            column_lipschitz,
            sample_lipschitz,
        })
    }

    pub fn design(&self) -> &M {
        &self.A
    }

    pub fn targets(&self) -> ArrayView1<S> {
        self.b.view()
    }

    fn residual(&self, x: ArrayView1<S>) -> Array1<S> {
        self.A.matvec(x) - &self.b
    }

    fn n_inv(&self) -> S {
        S::one() / S::from(self.b.len()).unwrap()
    }
}

impl<S, M> Smooth<S> for LeastSquares<S, M>
where
    S: NdFloat,
    M: DesignMatrix<S>,
{
    fn dim(&self) -> Option<usize> {
        Some(self.A.shape().1)
    }

    fn value(&self, x: ArrayView1<S>) -> S {
        let r = self.residual(x);
        r.dot(&r) * self.n_inv() / S::from(2.).unwrap()
    }

    fn gradient(&self, x: ArrayView1<S>) -> Array1<S> {
        self.A.rmatvec(self.residual(x).view()) * self.n_inv()
    }

    fn value_and_gradient(&self, x: ArrayView1<S>) -> (S, Array1<S>) {
        let r = self.residual(x);
        let n_inv = self.n_inv();
        let value = r.dot(&r) * n_inv / S::from(2.).unwrap();
        (value, self.A.rmatvec(r.view()) * n_inv)
    }

    fn partial_derivative(&self, x: ArrayView1<S>, j: usize) -> S {
        let r = self.residual(x);
        self.A.column_dot_with(j, |i| r[i]) * self.n_inv()
    }

    fn coordinate_cache(&self, x: ArrayView1<S>) -> Option<Array1<S>> {
        Some(self.residual(x))
    }

    fn cached_partial_derivative(&self, residual: ArrayView1<S>, j: usize) -> Option<S> {
        Some(self.A.column_dot_with(j, |i| residual[i]) * self.n_inv())
    }

    fn update_coordinate_cache(&self, residual: &mut Array1<S>, j: usize, delta: S) {
        self.A.column_axpy(j, delta, residual);
    }

    fn lipschitz(&self) -> Option<S> {
        Some(self.lipschitz)
    }

    fn coordinate_lipschitz(&self, j: usize) -> Option<S> {
        self.column_lipschitz.get(j).copied()
    }

    fn hessian_vector_product(&self, _x: ArrayView1<S>, v: ArrayView1<S>) -> Option<Array1<S>> {
        Some(self.A.rmatvec(self.A.matvec(v).view()) * self.n_inv())
    }

    fn n_samples(&self) -> Option<usize> {
        Some(self.b.len())
    }

    fn sample_gradient(&self, x: ArrayView1<S>, i: usize) -> Option<Array1<S>> {
        Some(self.A.scaled_row(i, self.A.row_dot(i, x) - self.b[i]))
    }

    fn sample_lipschitz(&self) -> Option<S> {
        Some(self.sample_lipschitz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linop::CscMatrix;
    use approx::assert_abs_diff_eq;
    use ndarray_linalg::svd::SVD;
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;

    #[test]
    fn scalar_quadratic() {
        // f(x) = 0.5 (x - 3)^2
        let f = LeastSquares::new(array![[1.0]], array![3.0]).unwrap();
        assert_abs_diff_eq!(f.value(array![0.].view()), 4.5);
        assert_abs_diff_eq!(f.gradient(array![0.].view()), array![-3.]);
        assert_abs_diff_eq!(f.lipschitz().unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.coordinate_lipschitz(0).unwrap(), 1.0);
        assert!(f.coordinate_lipschitz(1).is_none());
    }

    #[test]
    fn gradient_matches_samples_and_partials() {
        let A = Array::random((15, 6), Normal::new(0., 1.).unwrap());
        let b = Array::random(15, Normal::new(0., 1.).unwrap());
        let x = Array::random(6, Normal::new(0., 1.).unwrap());
        let f = LeastSquares::new(A, b).unwrap();

        let grad = f.gradient(x.view());
        let avg = (0..15).fold(Array1::zeros(6), |acc, i| {
            acc + f.sample_gradient(x.view(), i).unwrap()
        }) / 15.;
        assert_abs_diff_eq!(grad, avg, epsilon = 1e-12);
        for j in 0..6 {
            assert_abs_diff_eq!(grad[j], f.partial_derivative(x.view(), j), epsilon = 1e-12);
        }
        let (v, g) = f.value_and_gradient(x.view());
        assert_abs_diff_eq!(v, f.value(x.view()), epsilon = 1e-12);
        assert_abs_diff_eq!(g, grad, epsilon = 1e-12);
    }

    #[test]
    fn cached_residual_follows_coordinate_moves() {
        let A = Array::random((12, 5), Normal::new(0., 1.).unwrap());
        let b = Array::random(12, Normal::new(0., 1.).unwrap());
        let f = LeastSquares::new(A, b).unwrap();
        let mut x = Array::random(5, Normal::new(0., 1.).unwrap());
        let mut cache = f.coordinate_cache(x.view()).unwrap();
        for &(j, delta) in &[(0, 0.5), (3, -1.25), (0, 2.0), (4, 0.1)] {
            x[j] += delta;
            f.update_coordinate_cache(&mut cache, j, delta);
            for k in 0..5 {
                assert_abs_diff_eq!(
                    f.cached_partial_derivative(cache.view(), k).unwrap(),
                    f.partial_derivative(x.view(), k),
                    epsilon = 1e-10
                );
            }
        }
    }

    #[test]
    fn lipschitz_matches_largest_singular_value() {
        // top right singular vector (1, -1) is orthogonal to the ones vector
        let A = array![[3.0, -3.0], [0.5, 0.5]];
        let sigma: f64 = A.svd(false, false).unwrap().1[0];
        let f = LeastSquares::new(A, array![0.0, 0.0]).unwrap();
        assert_abs_diff_eq!(f.lipschitz().unwrap(), sigma * sigma / 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(f.lipschitz().unwrap(), 9.0, epsilon = 1e-10);

        // block structure: the dominant block has zero column sums
        let A = array![
            [2.0, -2.0, 0.0, 0.0],
            [-2.0, 2.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 1.0],
        ];
        let f = LeastSquares::new(A, Array1::zeros(3)).unwrap();
        assert_abs_diff_eq!(f.lipschitz().unwrap(), 16.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn sparse_design_matches_dense() {
        let A = array![
            [1.0, 0.0, 0.0, 2.0],
            [0.0, 0.0, 3.0, 0.0],
            [4.0, 0.0, 5.0, 0.0],
        ];
        let b = array![1.0, -1.0, 0.5];
        let x = array![0.2, 0.7, -0.4, 1.0];
        let dense = LeastSquares::new(A.clone(), b.clone()).unwrap();
        let sparse = LeastSquares::new(CscMatrix::from_dense(A.view()), b).unwrap();
        assert_abs_diff_eq!(sparse.value(x.view()), dense.value(x.view()), epsilon = 1e-12);
        assert_abs_diff_eq!(sparse.gradient(x.view()), dense.gradient(x.view()), epsilon = 1e-12);
        assert_abs_diff_eq!(
            sparse.lipschitz().unwrap(),
            dense.lipschitz().unwrap(),
            epsilon = 1e-8
        );
        assert_eq!(sparse.sample_lipschitz(), dense.sample_lipschitz());
        for i in 0..3 {
            assert_abs_diff_eq!(
                sparse.sample_gradient(x.view(), i).unwrap(),
                dense.sample_gradient(x.view(), i).unwrap(),
                epsilon = 1e-12
            );
        }
        for j in 0..4 {
            assert_eq!(sparse.coordinate_lipschitz(j), dense.coordinate_lipschitz(j));
        }
    }

    #[test]
    fn hvp_is_normal_operator() {
        let A = array![[1., 2.], [0., 1.]];
        let f = LeastSquares::new(A, array![0., 0.]).unwrap();
        let hv = f
            .hessian_vector_product(array![0., 0.].view(), array![1., 0.].view())
            .unwrap();
        // A^T A e_1 / n = [1, 2] / 2
        assert_abs_diff_eq!(hv, array![0.5, 1.0], epsilon = 1e-12);
    }

    #[test]
    fn rejects_mismatched_targets() {
        let res = LeastSquares::new(array![[1., 2.], [3., 4.]], array![1.]);
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }
}

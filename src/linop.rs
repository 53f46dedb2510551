//! Abstract Linear Operators and Adjoints
//! building upon ndarray_linalg::operator
//!
//! Data terms such as $`\frac{1}{2n}\|Ax - b\|_2^2`$ only touch the
//! design matrix $`A`$ through the [`DesignMatrix`] trait: products with
//! $`A`$ and $`A^H`$, single rows and columns, and $`\|A\|_2^2`$. It is
//! implemented for dense `ndarray` matrices and for the compressed sparse
//! column format [`CscMatrix`].

use crate::error::{Error, Result};
use ndarray::prelude::*;
use ndarray::{Data, NdFloat};
pub use ndarray_linalg::operator::LinearOperator;
use ndarray_linalg::svd::SVD;
use ndarray_linalg::{Lapack, Scalar};
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait Adjoint<'a> {
    type Output;
    fn adj(&'a self) -> Self::Output;
}

impl<'a, A, S> Adjoint<'a> for ArrayBase<S, Ix2>
where
    A: 'a + Float,
    S: Data<Elem = A>,
{
    type Output = ArrayView<'a, A, Ix2>;

    fn adj(&'a self) -> Self::Output {
        self.t()
    }
}

/// Matrix of a linear model $`x \mapsto Ax`$ with $`n`$ rows (samples) and
/// $`p`$ columns (features).
pub trait DesignMatrix<S> {
    /// `(n, p)`
    fn shape(&self) -> (usize, usize);

    /// $`Ax`$
    fn matvec(&self, x: ArrayView1<S>) -> Array1<S>;

    /// $`A^H r`$
    fn rmatvec(&self, r: ArrayView1<S>) -> Array1<S>;

    /// $`\sum_i A_{ij} w(i)`$ over the stored entries of column `j`
    fn column_dot_with<W: Fn(usize) -> S>(&self, j: usize, weight: W) -> S;

    /// `y += alpha * A[:, j]`
    fn column_axpy(&self, j: usize, alpha: S, y: &mut Array1<S>);

    /// $`a_i^T x`$
    fn row_dot(&self, i: usize, x: ArrayView1<S>) -> S;

    /// $`\alpha a_i`$ as a dense vector
    fn scaled_row(&self, i: usize, alpha: S) -> Array1<S>;

    /// Squared Euclidean norm of every column
    fn column_norms_squared(&self) -> Array1<S>;

    /// Squared Euclidean norm of every row
    fn row_norms_squared(&self) -> Array1<S>;

    /// Squared spectral norm $`\sigma_1(A)^2`$
    fn norm_squared(&self) -> Result<S>;
}

impl<S, D> DesignMatrix<S> for ArrayBase<D, Ix2>
where
    S: NdFloat + Lapack + Scalar<Real = S>,
    D: Data<Elem = S>,
{
    fn shape(&self) -> (usize, usize) {
        self.dim()
    }

    fn matvec(&self, x: ArrayView1<S>) -> Array1<S> {
        self.apply(&x)
    }

    fn rmatvec(&self, r: ArrayView1<S>) -> Array1<S> {
        self.adj().apply(&r)
    }

    fn column_dot_with<W: Fn(usize) -> S>(&self, j: usize, weight: W) -> S {
        self.column(j)
            .iter()
            .enumerate()
            .fold(S::zero(), |acc, (i, &a)| acc + a * weight(i))
    }

    fn column_axpy(&self, j: usize, alpha: S, y: &mut Array1<S>) {
        y.scaled_add(alpha, &self.column(j));
    }

    fn row_dot(&self, i: usize, x: ArrayView1<S>) -> S {
        self.row(i).dot(&x)
    }

    fn scaled_row(&self, i: usize, alpha: S) -> Array1<S> {
        &self.row(i) * alpha
    }

    fn column_norms_squared(&self) -> Array1<S> {
        self.map_axis(Axis(0), |col| col.dot(&col))
    }

    fn row_norms_squared(&self) -> Array1<S> {
        self.map_axis(Axis(1), |row| row.dot(&row))
    }

    fn norm_squared(&self) -> Result<S> {
        if self.is_empty() {
            return Ok(S::zero());
        }
        let (_, sigma, _) = self.svd(false, false)?;
        let top = sigma
            .iter()
            .fold(S::zero(), |acc, &s| if s > acc { s } else { acc });
        Ok(top * top)
    }
}

/// Compressed storage of one orientation: entries of outer index `k` are
/// `data[indptr[k]..indptr[k + 1]]` at inner positions `indices[..]`.
#[derive(Debug, Clone, PartialEq)]
struct Compressed<S> {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<S>,
}

impl<S: Copy> Compressed<S> {
    fn outer(&self, k: usize) -> impl Iterator<Item = (usize, S)> + '_ {
        let range = self.indptr[k]..self.indptr[k + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.data[range].iter().copied())
    }

    /// Same entries, compressed along the other axis of length `n_inner`.
    fn transpose(&self, n_inner: usize) -> Compressed<S> {
        let n_outer = self.indptr.len() - 1;
        let mut counts = vec![0usize; n_inner + 1];
        for &i in &self.indices {
            counts[i + 1] += 1;
        }
        for k in 0..n_inner {
            counts[k + 1] += counts[k];
        }
        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0; self.indices.len()];
        let mut data = self.data.clone();
        for k in 0..n_outer {
            for (i, v) in self.outer(k) {
                indices[next[i]] = k;
                data[next[i]] = v;
                next[i] += 1;
            }
        }
        Compressed {
            indptr,
            indices,
            data,
        }
    }
}

/// Sparse matrix in compressed sparse column (CSC) format
///
/// Columns are stored as in the usual `(indptr, indices, data)` triplet:
/// the non-zeros of column `j` are `data[indptr[j]..indptr[j + 1]]` at rows
/// `indices[indptr[j]..indptr[j + 1]]`. A row-compressed copy is built at
/// construction so that single rows, used by the stochastic solvers, are as
/// cheap as single columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix<S> {
    nrows: usize,
    ncols: usize,
    columns: Compressed<S>,
    rows: Compressed<S>,
}

impl<S: NdFloat> CscMatrix<S> {
    pub fn new(
        shape: (usize, usize),
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<S>,
    ) -> Result<Self> {
        let (nrows, ncols) = shape;
        if indptr.len() != ncols + 1 || indptr[0] != 0 {
            return Err(Error::invalid(format!(
                "CSC indptr must start at 0 and have {} entries, got {}",
                ncols + 1,
                indptr.len()
            )));
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::invalid("CSC indptr must be non-decreasing"));
        }
        let nnz = indptr[ncols];
        if indices.len() != nnz || data.len() != nnz {
            return Err(Error::invalid(format!(
                "CSC indptr declares {} non-zeros, got {} indices and {} values",
                nnz,
                indices.len(),
                data.len()
            )));
        }
        if let Some(&i) = indices.iter().find(|&&i| i >= nrows) {
            return Err(Error::invalid(format!(
                "CSC row index {} out of bounds for {} rows",
                i, nrows
            )));
        }
        let columns = Compressed {
            indptr,
            indices,
            data,
        };
        let rows = columns.transpose(nrows);
        Ok(CscMatrix {
            nrows,
            ncols,
            columns,
            rows,
        })
    }

    /// Keep the non-zero entries of a dense matrix.
    pub fn from_dense(a: ArrayView2<S>) -> Self {
        let (nrows, ncols) = a.dim();
        let mut indptr = Vec::with_capacity(ncols + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for col in a.columns() {
            for (i, &v) in col.iter().enumerate() {
                if v != S::zero() {
                    indices.push(i);
                    data.push(v);
                }
            }
            indptr.push(indices.len());
        }
        let columns = Compressed {
            indptr,
            indices,
            data,
        };
        let rows = columns.transpose(nrows);
        CscMatrix {
            nrows,
            ncols,
            columns,
            rows,
        }
    }

    pub fn nnz(&self) -> usize {
        self.columns.data.len()
    }

    pub fn to_dense(&self) -> Array2<S> {
        let mut a = Array2::zeros((self.nrows, self.ncols));
        for j in 0..self.ncols {
            for (i, v) in self.columns.outer(j) {
                a[[i, j]] = v;
            }
        }
        a
    }
}

impl<S: NdFloat + Scalar> LinearOperator for CscMatrix<S> {
    type Elem = S;

    fn apply<D>(&self, a: &ArrayBase<D, Ix1>) -> Array1<S>
    where
        D: Data<Elem = S>,
    {
        let mut y = Array1::zeros(self.nrows);
        for (j, &xj) in a.iter().enumerate() {
            if xj != S::zero() {
                for (i, v) in self.columns.outer(j) {
                    y[i] += v * xj;
                }
            }
        }
        y
    }
}

/// $`A^H`$ of a [`CscMatrix`]: a row-wise product over its columns
#[derive(Debug, Clone, Copy)]
pub struct CscAdjoint<'a, S> {
    inner: &'a CscMatrix<S>,
}

impl<'a, S: NdFloat + Scalar> LinearOperator for CscAdjoint<'a, S> {
    type Elem = S;

    fn apply<D>(&self, a: &ArrayBase<D, Ix1>) -> Array1<S>
    where
        D: Data<Elem = S>,
    {
        Array1::from_shape_fn(self.inner.ncols, |j| {
            self.inner
                .columns
                .outer(j)
                .fold(S::zero(), |acc, (i, v)| acc + v * a[i])
        })
    }
}

impl<'a, S: 'a> Adjoint<'a> for CscMatrix<S> {
    type Output = CscAdjoint<'a, S>;

    fn adj(&'a self) -> Self::Output {
        CscAdjoint { inner: self }
    }
}

impl<S: NdFloat + Scalar> DesignMatrix<S> for CscMatrix<S> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    fn matvec(&self, x: ArrayView1<S>) -> Array1<S> {
        self.apply(&x)
    }

    fn rmatvec(&self, r: ArrayView1<S>) -> Array1<S> {
        self.adj().apply(&r)
    }

    fn column_dot_with<W: Fn(usize) -> S>(&self, j: usize, weight: W) -> S {
        self.columns
            .outer(j)
            .fold(S::zero(), |acc, (i, v)| acc + v * weight(i))
    }

    fn column_axpy(&self, j: usize, alpha: S, y: &mut Array1<S>) {
        for (i, v) in self.columns.outer(j) {
            y[i] += alpha * v;
        }
    }

    fn row_dot(&self, i: usize, x: ArrayView1<S>) -> S {
        self.rows
            .outer(i)
            .fold(S::zero(), |acc, (j, v)| acc + v * x[j])
    }

    fn scaled_row(&self, i: usize, alpha: S) -> Array1<S> {
        let mut row = Array1::zeros(self.ncols);
        for (j, v) in self.rows.outer(i) {
            row[j] = alpha * v;
        }
        row
    }

    fn column_norms_squared(&self) -> Array1<S> {
        Array1::from_shape_fn(self.ncols, |j| {
            self.columns.outer(j).fold(S::zero(), |acc, (_, v)| acc + v * v)
        })
    }

    fn row_norms_squared(&self) -> Array1<S> {
        Array1::from_shape_fn(self.nrows, |i| {
            self.rows.outer(i).fold(S::zero(), |acc, (_, v)| acc + v * v)
        })
    }

    fn norm_squared(&self) -> Result<S> {
        Ok(operator_norm_squared(
            self,
            self.ncols,
            1000,
            S::from(1e-12).unwrap(),
        ))
    }
}

/// Fixed pseudo-random unit vector of length `dim > 0`. It has a component
/// along any given direction with probability one, so power iterations
/// started from it reach the largest eigenvalue.
pub(crate) fn power_iteration_start<S: NdFloat>(dim: usize) -> Array1<S> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut v = Array1::from_shape_fn(dim, |_| S::from(rng.gen_range(-1.0f64..1.0)).unwrap());
    let norm = v.dot(&v).sqrt();
    if norm > S::zero() {
        v /= norm;
    } else {
        v.fill(S::one() / S::from(dim).unwrap().sqrt());
    }
    v
}

/// Estimate $`\|B\|_2^2`$, the largest eigenvalue of $`B^HB`$, by power iteration.
///
/// This is the Lipschitz constant of the gradient of $`\frac12\|Bx - y\|_2^2`$.
/// The iteration starts from a fixed pseudo-random vector, which has a
/// component along the top singular direction with probability one, and
/// stops after `maxiter` products or once the estimate changes by less than
/// a relative `tol`.
#[allow(non_snake_case)]
pub fn operator_norm_squared<'a, R, Q, S>(B: &'a R, dim: usize, maxiter: usize, tol: S) -> S
where
    S: NdFloat + Scalar,
    R: LinearOperator<Elem = S> + Adjoint<'a, Output = Q>,
    Q: LinearOperator<Elem = S>,
{
    if dim == 0 {
        return S::zero();
    }
    let mut v = power_iteration_start::<S>(dim);
    let mut estimate = S::zero();
    let BH = B.adj();
    for _ in 0..maxiter {
        let w = BH.apply(&B.apply(&v));
        let norm = Float::sqrt(w.dot(&w));
        if norm == S::zero() {
            return S::zero();
        }
        let previous = estimate;
        estimate = norm;
        v = w / norm;
        if Float::abs(estimate - previous) <= tol * estimate {
            break;
        }
    }
    estimate
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;

    fn sparse_example() -> (Array2<f64>, CscMatrix<f64>) {
        let A = array![
            [1., 0., 0., 2.],
            [0., 0., 3., 0.],
            [4., 0., 5., 0.],
        ];
        let C = CscMatrix::from_dense(A.view());
        (A, C)
    }

    #[test]
    fn ndarray_adj() {
        let A = array![[1., 2.], [3., 4.]];
        let B = array![[1., 3.], [2., 4.]];
        assert!(A.adj() == B);
        assert!(A.adj().adj() == A);
    }

    #[test]
    fn csc_products_match_dense() {
        let (A, C) = sparse_example();
        assert_eq!(C.nnz(), 5);
        assert_eq!(C.to_dense(), A);
        let x = array![1., -1., 2., 0.5];
        let r = array![0.5, 1., -2.];
        assert_abs_diff_eq!(C.apply(&x), A.dot(&x), epsilon = 1e-12);
        assert_abs_diff_eq!(C.adj().apply(&r), A.t().dot(&r), epsilon = 1e-12);
        assert_abs_diff_eq!(C.matvec(x.view()), A.matvec(x.view()), epsilon = 1e-12);
        assert_abs_diff_eq!(C.rmatvec(r.view()), A.rmatvec(r.view()), epsilon = 1e-12);
    }

    #[test]
    fn csc_rows_and_columns_match_dense() {
        let (A, C) = sparse_example();
        let x = array![1., -1., 2., 0.5];
        let r = array![0.5, 1., -2.];
        for i in 0..3 {
            assert_abs_diff_eq!(C.row_dot(i, x.view()), A.row_dot(i, x.view()), epsilon = 1e-12);
            assert_eq!(C.scaled_row(i, 2.), A.scaled_row(i, 2.));
        }
        for j in 0..4 {
            assert_abs_diff_eq!(
                C.column_dot_with(j, |i| r[i]),
                A.column(j).dot(&r),
                epsilon = 1e-12
            );
            let mut y_sparse = r.clone();
            let mut y_dense = r.clone();
            C.column_axpy(j, -1.5, &mut y_sparse);
            A.column_axpy(j, -1.5, &mut y_dense);
            assert_eq!(y_sparse, y_dense);
        }
        assert_eq!(C.column_norms_squared(), A.column_norms_squared());
        assert_eq!(C.row_norms_squared(), array![5., 9., 41.]);
    }

    #[test]
    fn csc_rejects_malformed_storage() {
        let bad_indptr = CscMatrix::<f64>::new((2, 2), vec![0, 1], vec![0], vec![1.]);
        assert!(matches!(bad_indptr, Err(Error::InvalidArgument(_))));
        let bad_row = CscMatrix::<f64>::new((2, 2), vec![0, 1, 1], vec![2], vec![1.]);
        assert!(matches!(bad_row, Err(Error::InvalidArgument(_))));
        let bad_nnz = CscMatrix::<f64>::new((2, 2), vec![0, 1, 2], vec![0], vec![1.]);
        assert!(matches!(bad_nnz, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn norm_matches_svd() {
        let A = Array::random((30, 20), Normal::new(0., 1.).unwrap());
        let sigma: f64 = A.svd(false, false).unwrap().1[0];
        let L = operator_norm_squared(&A, 20, 5000, 1e-14);
        assert_abs_diff_eq!(L, sigma * sigma, epsilon = 1e-6 * sigma * sigma);
        assert_abs_diff_eq!(A.norm_squared().unwrap(), sigma * sigma, epsilon = 1e-9);
    }

    #[test]
    fn top_direction_orthogonal_to_ones() {
        // A^T A has eigenvalues 18 along (1, -1) and 0.5 along (1, 1)
        let A = array![[3., -3.], [0.5, 0.5]];
        assert_abs_diff_eq!(A.norm_squared().unwrap(), 18.0, epsilon = 1e-10);
        let C = CscMatrix::from_dense(A.view());
        assert_abs_diff_eq!(C.norm_squared().unwrap(), 18.0, epsilon = 1e-8);
    }

    #[test]
    fn norm_of_zero_operator() {
        let A = Array2::<f64>::zeros((4, 3));
        assert_eq!(operator_norm_squared(&A, 3, 10, 1e-8), 0.0);
        assert_eq!(A.norm_squared().unwrap(), 0.0);
    }
}

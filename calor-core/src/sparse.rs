//! Sparse matrix operations.
//!
//! Uses CSR (Compressed Sparse Row) format for matrix-vector products and
//! compatibility with the direct and iterative solvers. Matrix-vector
//! products are row-parallel with rayon; every output entry is reduced by a
//! single thread in column order, so results do not depend on the thread
//! count.

use crate::error::{Error, Result};
use nalgebra_sparse::coo::CooMatrix;
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;
use rayon::prelude::*;

/// Compressed Sparse Row matrix.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Builder for assembling a sparse matrix from triplets (COO format).
///
/// Accumulates (row, col, value) triplets and converts to CSR when complete.
pub struct TripletMatrix {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    /// Create a new triplet matrix builder.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self::with_capacity(n_rows, n_cols, 0)
    }

    /// Create with estimated capacity.
    pub fn with_capacity(n_rows: usize, n_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: Vec::with_capacity(nnz_estimate),
            cols: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    /// Add a value at (row, col). Duplicates are summed during conversion.
    ///
    /// Explicit zeros are kept so callers can reserve pattern entries.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows, "Row index out of bounds");
        debug_assert!(col < self.n_cols, "Column index out of bounds");

        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    /// Add a dense element matrix at the given global node indices.
    ///
    /// This is the core operation for finite element assembly. Exact zeros
    /// are skipped.
    pub fn add_submatrix(&mut self, indices: &[usize], submatrix: &nalgebra::DMatrix<f64>) {
        let n = indices.len();
        debug_assert_eq!(submatrix.nrows(), n);
        debug_assert_eq!(submatrix.ncols(), n);

        for i in 0..n {
            for j in 0..n {
                let value = submatrix[(i, j)];
                if value != 0.0 {
                    self.rows.push(indices[i]);
                    self.cols.push(indices[j]);
                    self.values.push(value);
                }
            }
        }
    }

    /// Number of stored triplets.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Convert to CSR format, summing duplicate entries.
    pub fn to_csr(self) -> Result<CsrMatrix> {
        let coo = CooMatrix::try_from_triplets(
            self.n_rows,
            self.n_cols,
            self.rows,
            self.cols,
            self.values,
        )
        .map_err(|e| Error::AssemblyFailure(format!("Invalid triplet data: {}", e)))?;

        Ok(CsrMatrix::from(&coo))
    }
}

/// Nodal load accumulator: element vectors are scattered into it by
/// global node index.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalLoad(Vec<f64>);

impl NodalLoad {
    pub fn zeros(n_nodes: usize) -> Self {
        Self(vec![0.0; n_nodes])
    }

    pub fn add(&mut self, node: usize, value: f64) {
        self.0[node] += value;
    }

    /// Add `local[k]` to entry `nodes[k]`.
    pub fn scatter(&mut self, nodes: &[usize], local: &[f64]) {
        debug_assert_eq!(nodes.len(), local.len());
        for (&node, &value) in nodes.iter().zip(local) {
            self.0[node] += value;
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

/// y = A·x, row-parallel.
pub fn spmv(a: &CsrMatrix, x: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.ncols(), x.len());
    let offsets = a.row_offsets();
    let cols = a.col_indices();
    let vals = a.values();
    (0..a.nrows())
        .into_par_iter()
        .map(|i| {
            let mut sum = 0.0;
            for k in offsets[i]..offsets[i + 1] {
                sum += vals[k] * x[cols[k]];
            }
            sum
        })
        .collect()
}

/// αA + βB over the union of both sparsity patterns.
///
/// Entries present in either operand stay in the pattern even when the
/// combination cancels to zero, so repeated combinations keep a stable
/// pattern.
pub fn linear_combination(
    alpha: f64,
    a: &CsrMatrix,
    beta: f64,
    b: &CsrMatrix,
) -> Result<CsrMatrix> {
    if a.nrows() != b.nrows() || a.ncols() != b.ncols() {
        return Err(Error::AssemblyFailure(format!(
            "Cannot combine {}x{} and {}x{} matrices",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        )));
    }

    let (ao, ac, av) = (a.row_offsets(), a.col_indices(), a.values());
    let (bo, bc, bv) = (b.row_offsets(), b.col_indices(), b.values());
    let mut offsets = Vec::with_capacity(a.nrows() + 1);
    let mut cols = Vec::with_capacity(a.nnz().max(b.nnz()));
    let mut vals = Vec::with_capacity(a.nnz().max(b.nnz()));
    offsets.push(0);

    for i in 0..a.nrows() {
        let (mut p, pe) = (ao[i], ao[i + 1]);
        let (mut q, qe) = (bo[i], bo[i + 1]);
        while p < pe || q < qe {
            let ca = if p < pe { ac[p] } else { usize::MAX };
            let cb = if q < qe { bc[q] } else { usize::MAX };
            if ca == cb {
                cols.push(ca);
                vals.push(alpha * av[p] + beta * bv[q]);
                p += 1;
                q += 1;
            } else if ca < cb {
                cols.push(ca);
                vals.push(alpha * av[p]);
                p += 1;
            } else {
                cols.push(cb);
                vals.push(beta * bv[q]);
                q += 1;
            }
        }
        offsets.push(cols.len());
    }

    CsrMatrix::try_from_csr_data(a.nrows(), a.ncols(), offsets, cols, vals)
        .map_err(|e| Error::AssemblyFailure(format!("Invalid combined matrix: {}", e)))
}

/// Diagonal entries (zero where the pattern has none).
pub fn diagonal(a: &CsrMatrix) -> Vec<f64> {
    (0..a.nrows())
        .map(|i| {
            let row = a.row(i);
            row.col_indices()
                .iter()
                .position(|&c| c == i)
                .map_or(0.0, |k| row.values()[k])
        })
        .collect()
}

/// Frobenius norm of the stored values.
pub fn frobenius_norm(a: &CsrMatrix) -> f64 {
    a.values().iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Relative asymmetry ‖A − Aᵀ‖_F / ‖A‖_F (0 for the zero matrix).
pub fn asymmetry(a: &CsrMatrix) -> Result<f64> {
    let norm = frobenius_norm(a);
    if norm == 0.0 {
        return Ok(0.0);
    }
    let diff = linear_combination(1.0, a, -1.0, &a.transpose())?;
    Ok(frobenius_norm(&diff) / norm)
}

/// Whether two matrices share dimensions and sparsity pattern.
pub fn same_pattern(a: &CsrMatrix, b: &CsrMatrix) -> bool {
    a.nrows() == b.nrows()
        && a.ncols() == b.ncols()
        && a.row_offsets() == b.row_offsets()
        && a.col_indices() == b.col_indices()
}

//! Linear system solvers.
//!
//! Provides direct and iterative solvers for the constrained system A·T = b.
//!
//! # Solver Backends
//!
//! - [`DirectSolver`]: Sparse Cholesky factorization using the faer library,
//!   with the symbolic analysis cached per sparsity pattern and the numeric
//!   factor cached per matrix. A non-positive pivot falls back to faer's
//!   sparse LU with partial pivoting.
//! - [`ConjugateGradientSolver`]: Preconditioned conjugate gradient with a
//!   Jacobi or zero fill-in incomplete Cholesky preconditioner.
//!
//! Conductivity and capacity matrices are symmetric positive (semi-)definite
//! and stay symmetric after [`crate::boundary::apply_dirichlet`], so both
//! backends assume symmetry.

use crate::error::{Diagnostic, Error, Result};
use crate::settings::{Preconditioner, SolverBackend, ThermalSettings};
use crate::sparse::{spmv, CsrMatrix};
use faer::linalg::cholesky::llt::factor::LltError;
use faer::prelude::*;
use faer::sparse::linalg::solvers::{Llt, Lu, SymbolicLlt};
use faer::sparse::linalg::{LltError as SparseLltError, LuError};
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use std::time::Instant;
use tracing::debug;

/// Linear solver interface.
pub trait LinearSolver: Send {
    /// Solve the linear system Ax = b.
    ///
    /// # Arguments
    ///
    /// * `matrix` - System matrix, symmetric
    /// * `rhs` - Right-hand side vector
    ///
    /// # Returns
    ///
    /// Solution vector x
    fn solve(&mut self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>>;

    /// Solver name for diagnostics.
    fn name(&self) -> &str;

    /// Statistics of the most recent solve.
    fn stats(&self) -> Option<&SolveStats>;

    /// Drain the non-fatal findings collected so far.
    fn take_diagnostics(&mut self) -> Vec<Diagnostic>;
}

/// Solution statistics.
#[derive(Debug, Clone)]
pub struct SolveStats {
    /// Solver name used.
    pub solver: String,
    /// Number of iterations (for iterative solvers).
    pub iterations: Option<usize>,
    /// Final relative residual (for iterative solvers).
    pub residual: Option<f64>,
    /// Whether a cached factorization was reused (direct solver).
    pub reused_factor: bool,
    /// Wall-clock time in seconds.
    pub time_seconds: f64,
}

/// Build the backend selected in the settings.
pub fn select_solver(settings: &ThermalSettings) -> Box<dyn LinearSolver> {
    match settings.backend {
        SolverBackend::Direct => Box::new(DirectSolver::new()),
        SolverBackend::Iterative => Box::new(ConjugateGradientSolver::new(
            settings.convergence_tolerance,
            settings.max_iterations,
            settings.preconditioner,
        )),
    }
}

fn check_dimensions(matrix: &CsrMatrix, rhs: &[f64]) -> Result<()> {
    if matrix.nrows() != matrix.ncols() {
        return Err(Error::Solver("Matrix must be square".into()));
    }
    if matrix.nrows() != rhs.len() {
        return Err(Error::Solver("RHS size mismatch".into()));
    }
    Ok(())
}

/// Convert nalgebra-sparse CSR matrix to faer SparseColMat (CSC format).
///
/// Each CSR row becomes a CSC column of the transpose; counting entries per
/// column first gives the true CSC layout of the same matrix.
fn csr_to_faer_csc(csr: &CsrMatrix) -> SparseColMat<usize, f64> {
    let nrows = csr.nrows();
    let ncols = csr.ncols();

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    let mut col_counts = vec![0usize; ncols];
    for &col in col_indices {
        col_counts[col] += 1;
    }

    let mut col_offsets = vec![0usize; ncols + 1];
    for i in 0..ncols {
        col_offsets[i + 1] = col_offsets[i] + col_counts[i];
    }

    let nnz = values.len();
    let mut csc_row_indices = vec![0usize; nnz];
    let mut csc_values = vec![0.0f64; nnz];
    let mut col_positions = col_offsets[..ncols].to_vec();

    for row in 0..nrows {
        for idx in row_offsets[row]..row_offsets[row + 1] {
            let col = col_indices[idx];
            let pos = col_positions[col];
            csc_row_indices[pos] = row;
            csc_values[pos] = values[idx];
            col_positions[col] += 1;
        }
    }

    // SAFETY: rows are visited in ascending order, so every column's row
    // indices are sorted and unique, and col_offsets is non-decreasing.
    unsafe {
        SparseColMat::new(
            SymbolicSparseColMat::new_unchecked(nrows, ncols, col_offsets, None, csc_row_indices),
            csc_values,
        )
    }
}

enum Factor {
    Cholesky(Llt<usize, f64>),
    Lu(Lu<usize, f64>),
}

impl Factor {
    fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>> {
        let n = rhs.len();
        let mut x = faer::Mat::from_fn(n, 1, |i, _| rhs[i]);
        match self {
            Factor::Cholesky(llt) => llt.solve_in_place(x.as_mut()),
            Factor::Lu(lu) => lu.solve_in_place(x.as_mut()),
        }
        let x: Vec<f64> = (0..n).map(|i| x[(i, 0)]).collect();
        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::Singular(
                "Solution is not finite; is a temperature constraint missing?".into(),
            ));
        }
        Ok(x)
    }
}

struct CachedPattern {
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    symbolic: SymbolicLlt<usize>,
}

/// Number of numeric factors kept alive.
///
/// Adaptive stepping alternates between the full-step and half-step
/// matrices, so two slots avoid refactoring on every solve.
const FACTOR_SLOTS: usize = 2;

/// Sparse Cholesky solver using the faer library.
///
/// For repeated solves with the same sparsity pattern (every time step of a
/// transient run) the symbolic analysis is computed once. When the matrix
/// values are unchanged as well the numeric factor is reused.
pub struct DirectSolver {
    pattern: Option<CachedPattern>,
    factors: Vec<(Vec<f64>, Factor)>,
    diagnostics: Vec<Diagnostic>,
    stats: Option<SolveStats>,
}

impl DirectSolver {
    /// Create a new sparse Cholesky solver.
    pub fn new() -> Self {
        Self {
            pattern: None,
            factors: Vec::new(),
            diagnostics: Vec::new(),
            stats: None,
        }
    }

    fn symbolic_for(
        &mut self,
        matrix: &CsrMatrix,
        csc: &SparseColMat<usize, f64>,
    ) -> Result<SymbolicLlt<usize>> {
        if let Some(cached) = &self.pattern {
            if cached.row_offsets == matrix.row_offsets()
                && cached.col_indices == matrix.col_indices()
            {
                return Ok(cached.symbolic.clone());
            }
        }

        let symbolic = SymbolicLlt::try_new(csc.as_ref().symbolic(), faer::Side::Lower)
            .map_err(|_| Error::Solver("Symbolic Cholesky analysis failed".into()))?;
        debug!(n = matrix.nrows(), nnz = matrix.nnz(), "symbolic Cholesky analysis");
        self.pattern = Some(CachedPattern {
            row_offsets: matrix.row_offsets().to_vec(),
            col_indices: matrix.col_indices().to_vec(),
            symbolic: symbolic.clone(),
        });
        // Factors of another pattern are stale.
        self.factors.clear();
        Ok(symbolic)
    }

    fn factorize(&mut self, matrix: &CsrMatrix) -> Result<Factor> {
        let csc = csr_to_faer_csc(matrix);
        let symbolic = self.symbolic_for(matrix, &csc)?;

        match Llt::try_new_with_symbolic(symbolic, csc.as_ref(), faer::Side::Lower) {
            Ok(llt) => Ok(Factor::Cholesky(llt)),
            Err(SparseLltError::Numeric(LltError::NonPositivePivot { index })) => {
                self.diagnostics
                    .push(Diagnostic::FactorizationFallback { pivot: index });
                match csc.as_ref().sp_lu() {
                    Ok(lu) => Ok(Factor::Lu(lu)),
                    Err(LuError::SymbolicSingular { .. }) => Err(Error::Singular(format!(
                        "Matrix is singular (non-positive Cholesky pivot {}, LU failed)",
                        index
                    ))),
                    Err(LuError::Generic(err)) => {
                        Err(Error::Solver(format!("Sparse LU error: {:?}", err)))
                    }
                }
            }
            Err(SparseLltError::Generic(err)) => {
                Err(Error::Solver(format!("Sparse Cholesky error: {:?}", err)))
            }
        }
    }
}

impl Default for DirectSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver for DirectSolver {
    fn solve(&mut self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        check_dimensions(matrix, rhs)?;
        if rhs.is_empty() {
            return Ok(vec![]);
        }
        let start = Instant::now();

        let same_pattern = self.pattern.as_ref().is_some_and(|p| {
            p.row_offsets == matrix.row_offsets() && p.col_indices == matrix.col_indices()
        });
        let cached = if same_pattern {
            self.factors.iter().position(|(values, _)| values == matrix.values())
        } else {
            None
        };

        let slot = match cached {
            Some(slot) => slot,
            None => {
                let factor = self.factorize(matrix)?;
                if self.factors.len() == FACTOR_SLOTS {
                    self.factors.remove(0);
                }
                self.factors.push((matrix.values().to_vec(), factor));
                self.factors.len() - 1
            }
        };

        let x = self.factors[slot].1.solve(rhs)?;
        self.stats = Some(SolveStats {
            solver: self.name().to_string(),
            iterations: None,
            residual: None,
            reused_factor: cached.is_some(),
            time_seconds: start.elapsed().as_secs_f64(),
        });
        Ok(x)
    }

    fn name(&self) -> &str {
        "faer Sparse Cholesky (LLᵀ)"
    }

    fn stats(&self) -> Option<&SolveStats> {
        self.stats.as_ref()
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// Zero fill-in incomplete Cholesky factor L (A ≈ L Lᵀ), stored by rows on
/// the lower-triangle pattern of A with the diagonal last in each row.
struct IncompleteCholesky {
    offsets: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl IncompleteCholesky {
    /// Factor `a`; `Err(row)` on breakdown (missing or non-positive pivot).
    fn new(a: &CsrMatrix) -> std::result::Result<Self, usize> {
        let n = a.nrows();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut cols = Vec::new();
        let mut values = Vec::new();
        offsets.push(0);

        for i in 0..n {
            let row = a.row(i);
            let start = cols.len();
            for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                if j <= i {
                    cols.push(j);
                    values.push(v);
                }
            }
            if cols.last() != Some(&i) {
                return Err(i);
            }

            // Off-diagonal entries, left to right
            for k in start..cols.len() - 1 {
                let j = cols[k];
                let dot = sparse_dot(
                    &cols[start..k],
                    &values[start..k],
                    &cols[offsets[j]..offsets[j + 1] - 1],
                    &values[offsets[j]..offsets[j + 1] - 1],
                );
                values[k] = (values[k] - dot) / values[offsets[j + 1] - 1];
            }

            let d = cols.len() - 1;
            let sum_sq: f64 = values[start..d].iter().map(|v| v * v).sum();
            let pivot = values[d] - sum_sq;
            if !(pivot > 0.0 && pivot.is_finite()) {
                return Err(i);
            }
            values[d] = pivot.sqrt();
            offsets.push(cols.len());
        }

        Ok(Self { offsets, cols, values })
    }

    /// z = (L Lᵀ)⁻¹ r.
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n = r.len();
        // L y = r
        for i in 0..n {
            let (s, e) = (self.offsets[i], self.offsets[i + 1] - 1);
            let mut sum = r[i];
            for k in s..e {
                sum -= self.values[k] * z[self.cols[k]];
            }
            z[i] = sum / self.values[e];
        }
        // Lᵀ z = y, column sweep from the last row
        for i in (0..n).rev() {
            let (s, e) = (self.offsets[i], self.offsets[i + 1] - 1);
            z[i] /= self.values[e];
            let zi = z[i];
            for k in s..e {
                z[self.cols[k]] -= self.values[k] * zi;
            }
        }
    }
}

/// Dot product of two sorted sparse rows.
fn sparse_dot(ca: &[usize], va: &[f64], cb: &[usize], vb: &[f64]) -> f64 {
    let (mut p, mut q, mut sum) = (0, 0, 0.0);
    while p < ca.len() && q < cb.len() {
        if ca[p] == cb[q] {
            sum += va[p] * vb[q];
            p += 1;
            q += 1;
        } else if ca[p] < cb[q] {
            p += 1;
        } else {
            q += 1;
        }
    }
    sum
}

enum Preconditioning {
    Jacobi(Vec<f64>),
    Ic0(IncompleteCholesky),
}

impl Preconditioning {
    fn jacobi(a: &CsrMatrix) -> Self {
        let inverse = crate::sparse::diagonal(a)
            .into_iter()
            .map(|d| if d > 0.0 { 1.0 / d } else { 1.0 })
            .collect();
        Preconditioning::Jacobi(inverse)
    }

    fn apply(&self, r: &[f64], z: &mut [f64]) {
        match self {
            Preconditioning::Jacobi(inverse) => {
                for ((zi, ri), di) in z.iter_mut().zip(r).zip(inverse) {
                    *zi = ri * di;
                }
            }
            Preconditioning::Ic0(ic) => ic.apply(r, z),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Preconditioned conjugate gradient solver.
///
/// Matrix-vector products are row-parallel; all reductions are sequential,
/// so the iteration history is independent of the thread count.
pub struct ConjugateGradientSolver {
    tolerance: f64,
    max_iterations: usize,
    preconditioner: Preconditioner,
    diagnostics: Vec<Diagnostic>,
    stats: Option<SolveStats>,
}

impl ConjugateGradientSolver {
    /// Converge when ‖Ax − b‖₂ ≤ `tolerance`·‖b‖₂.
    pub fn new(tolerance: f64, max_iterations: usize, preconditioner: Preconditioner) -> Self {
        Self {
            tolerance,
            max_iterations,
            preconditioner,
            diagnostics: Vec::new(),
            stats: None,
        }
    }

    fn build_preconditioner(&mut self, a: &CsrMatrix) -> Preconditioning {
        match self.preconditioner {
            Preconditioner::Jacobi => Preconditioning::jacobi(a),
            Preconditioner::IncompleteCholesky => match IncompleteCholesky::new(a) {
                Ok(ic) => Preconditioning::Ic0(ic),
                Err(row) => {
                    self.diagnostics.push(Diagnostic::PreconditionerFallback { row });
                    Preconditioning::jacobi(a)
                }
            },
        }
    }
}

impl LinearSolver for ConjugateGradientSolver {
    fn solve(&mut self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        check_dimensions(matrix, rhs)?;
        let n = rhs.len();
        let start = Instant::now();

        let b_norm = dot(rhs, rhs).sqrt();
        if b_norm == 0.0 {
            return Ok(vec![0.0; n]);
        }

        let precond = self.build_preconditioner(matrix);
        let mut x = vec![0.0; n];
        let mut r = rhs.to_vec();
        let mut z = vec![0.0; n];
        precond.apply(&r, &mut z);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        let initial = b_norm;
        let mut previous = b_norm;
        let mut growth = 0;
        let mut relative = 1.0;

        for iteration in 1..=self.max_iterations {
            let q = spmv(matrix, &p);
            let pq = dot(&p, &q);
            if !(pq > 0.0 && pq.is_finite()) {
                return Err(Error::Diverged {
                    iteration,
                    residual: previous / b_norm,
                });
            }
            let alpha = rz / pq;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * q[i];
            }

            let residual = dot(&r, &r).sqrt();
            relative = residual / b_norm;
            if residual <= self.tolerance * b_norm {
                self.stats = Some(SolveStats {
                    solver: self.name().to_string(),
                    iterations: Some(iteration),
                    residual: Some(relative),
                    reused_factor: false,
                    time_seconds: start.elapsed().as_secs_f64(),
                });
                return Ok(x);
            }

            if residual > previous && residual > initial {
                growth += 1;
                if growth >= 2 {
                    return Err(Error::Diverged {
                        iteration,
                        residual: relative,
                    });
                }
            } else {
                growth = 0;
            }
            previous = residual;

            precond.apply(&r, &mut z);
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        Err(Error::NotConverged {
            iterations: self.max_iterations,
            residual: relative,
        })
    }

    fn name(&self) -> &str {
        match self.preconditioner {
            Preconditioner::Jacobi => "Conjugate Gradient (Jacobi)",
            Preconditioner::IncompleteCholesky => "Conjugate Gradient (IC0)",
        }
    }

    fn stats(&self) -> Option<&SolveStats> {
        self.stats.as_ref()
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

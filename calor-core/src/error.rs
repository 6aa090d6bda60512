//! Error and diagnostic types for thermal analysis.
//!
//! Fatal conditions are reported through [`Error`]. Conditions the solver can
//! resolve on its own (conflicting boundary conditions, a skipped degenerate
//! element, a time step accepted above tolerance) are collected as
//! [`Diagnostic`] values and returned next to a successful result.

use crate::result::ThermalResult;
use thiserror::Error;

/// Result type alias using the calor Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a thermal analysis.
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected configuration, reported before any work is done.
    #[error("invalid settings: {0}")]
    SettingsInvalid(String),

    /// Out-of-range node ids, wrong node counts, missing materials.
    #[error("mesh error: {0}")]
    MeshInvalid(String),

    /// Invalid material properties.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// Too many elements with a non-positive Jacobian were skipped.
    #[error("{count} of {total} elements are degenerate (non-positive Jacobian)")]
    DegenerateElement { count: usize, total: usize },

    /// NaN or overflow in element contributions.
    #[error("assembly error: {0}")]
    AssemblyFailure(String),

    /// Iterative solver did not reach the requested tolerance.
    #[error("solver did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },

    /// Residual kept growing in the iterative solver.
    #[error("solver diverged at iteration {iteration} (residual {residual:e})")]
    Diverged { iteration: usize, residual: f64 },

    /// Zero pivot, usually a missing temperature constraint.
    #[error("singular matrix: {0}")]
    Singular(String),

    /// Other linear solver failures (size mismatch, symbolic analysis).
    #[error("solver error: {0}")]
    Solver(String),

    /// The progress callback requested an abort.
    ///
    /// Carries every time point accepted before the request.
    #[error("analysis cancelled after {} time points", partial.time_points.len())]
    Cancelled { partial: Box<ThermalResult> },

    /// Malformed result file.
    #[error("format error: {0}")]
    Format(String),

    /// I/O errors (result export, settings files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Non-fatal findings reported alongside a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Two temperature constraints on the same node; the later one is kept.
    BcConflict { node: usize, kept: f64, discarded: f64 },
    /// A flux boundary touches a node with a prescribed temperature.
    DirichletOverridesFlux { node: usize },
    /// Element skipped because its Jacobian determinant is not positive.
    DegenerateElement { element: usize, det_j: f64 },
    /// Node attached only to skipped elements, held at a fixed temperature.
    IsolatedNode { node: usize, temperature: f64 },
    /// Adaptive stepping accepted a step at the minimum size above tolerance.
    StepToleranceExceeded { time: f64, dt: f64, error: f64 },
    /// No temperature anchor; node 0 was pinned at the ambient temperature.
    FloatingSystem { pinned_node: usize, temperature: f64 },
    /// Incomplete Cholesky broke down, Jacobi was used instead.
    PreconditionerFallback { row: usize },
    /// Cholesky hit a non-positive pivot, LU was used instead.
    FactorizationFallback { pivot: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::BcConflict { node, kept, discarded } => write!(
                f,
                "conflicting temperatures on node {node}: keeping {kept}, discarding {discarded}"
            ),
            Diagnostic::DirichletOverridesFlux { node } => {
                write!(f, "prescribed temperature overrides heat flux at node {node}")
            }
            Diagnostic::DegenerateElement { element, det_j } => {
                write!(f, "element {element} skipped (det J = {det_j:e})")
            }
            Diagnostic::IsolatedNode { node, temperature } => write!(
                f,
                "node {node} belongs only to skipped elements, held at {temperature}"
            ),
            Diagnostic::StepToleranceExceeded { time, dt, error } => write!(
                f,
                "step at t = {time} accepted at minimum dt = {dt} with error {error:e}"
            ),
            Diagnostic::FloatingSystem { pinned_node, temperature } => write!(
                f,
                "no temperature anchor, node {pinned_node} pinned at {temperature}"
            ),
            Diagnostic::PreconditionerFallback { row } => write!(
                f,
                "incomplete Cholesky breakdown at row {row}, using Jacobi"
            ),
            Diagnostic::FactorizationFallback { pivot } => write!(
                f,
                "non-positive pivot {pivot} in Cholesky, using LU"
            ),
        }
    }
}

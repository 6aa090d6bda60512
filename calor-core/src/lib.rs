//! Calor Core - thermal finite element solver
//!
//! Heat conduction analysis with:
//! - Line, surface and solid element kernels (Line2, Tri3, Quad4, Tet4, Tet10, Hex8)
//! - Parallel, reproducible assembly using Rayon
//! - Prescribed temperature, heat flux, convection and linearised radiation
//! - Steady-state and θ-method transient drivers with adaptive stepping
//! - Direct (faer Cholesky) and iterative (preconditioned CG) linear solvers
//!
//! # Architecture
//!
//! - [`Mesh`]: nodes, element connectivity, materials and named groups
//! - [`Material`]: conductivity tensor and heat capacity
//! - [`Load`] and [`BoundaryCondition`]: what drives the problem
//! - [`ThermalSolver`]: validated settings plus the analysis drivers
//! - [`LinearSolver`] trait: linear system solution strategies
//! - [`ThermalResult`]: temperatures, gradients and fluxes per time point
//!
//! Non-fatal findings are returned as [`Diagnostic`] values next to the
//! result and logged through `tracing`.

pub mod types;
pub mod error;
pub mod mesh;
pub mod material;
pub mod load;
pub mod boundary;
pub mod element;
pub mod sparse;
pub mod solver;
pub mod assembly;
pub mod settings;
pub mod progress;
pub mod analysis;
pub mod postprocess;
pub mod result;

pub use types::{Point3, STEFAN_BOLTZMANN};
pub use error::{Diagnostic, Error, Result};
pub use mesh::{ElementType, Facet, Mesh, SolidKind, SurfacePatch};
pub use material::{Conductivity, Material};
pub use load::{Load, TimeProfile};
pub use boundary::BoundaryCondition;
pub use sparse::CsrMatrix;
pub use solver::LinearSolver;
pub use assembly::AssembledSystem;
pub use settings::{AnalysisType, MassLumping, Preconditioner, SolverBackend, ThermalSettings};
pub use progress::{AssemblyStage, Progress, ProgressEvent};
pub use analysis::{Solution, ThermalSolver};
pub use result::ThermalResult;

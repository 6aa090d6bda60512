//! Thermal analysis drivers.
//!
//! [`ThermalSolver`] validates its settings once and then runs any number of
//! independent solves. Every solve borrows the mesh, boundary conditions and
//! loads, rebuilds the assembled operators, and returns a fresh
//! [`Solution`]; nothing is kept between calls.

mod steady;
mod transient;

use crate::assembly::{assemble, AssembledSystem, LoadAssembler};
use crate::boundary::{BoundaryCondition, DirichletSet};
use crate::error::{Diagnostic, Error, Result};
use crate::load::Load;
use crate::mesh::Mesh;
use crate::postprocess;
use crate::progress::{Progress, Reporter};
use crate::result::ThermalResult;
use crate::settings::{AnalysisType, ThermalSettings};
use crate::solver::{select_solver, LinearSolver};
use crate::sparse::{linear_combination, CsrMatrix};
use tracing::{debug, info, instrument, warn};

/// A successful analysis: the result and the non-fatal findings.
#[derive(Debug, Clone)]
pub struct Solution {
    pub result: ThermalResult,
    pub diagnostics: Vec<Diagnostic>,
}

/// Entry point for steady-state and transient thermal analyses.
///
/// # Example
///
/// ```ignore
/// use calor_core::{BoundaryCondition, Material, Mesh, ThermalSettings, ThermalSolver};
///
/// let mesh = Mesh::line(1.0, 10, Material::steel(), 1e-4)?;
/// let bcs = vec![
///     BoundaryCondition::temperature(vec![0], 100.0),
///     BoundaryCondition::temperature(vec![10], 0.0),
/// ];
/// let solver = ThermalSolver::new(ThermalSettings::steady())?;
/// let solution = solver.solve(&mesh, &bcs, &[], None)?;
/// ```
#[derive(Debug, Clone)]
pub struct ThermalSolver {
    settings: ThermalSettings,
}

impl ThermalSolver {
    /// Validate the settings and create a solver.
    pub fn new(settings: ThermalSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &ThermalSettings {
        &self.settings
    }

    /// Run the analysis selected by `settings.analysis_type`.
    ///
    /// Transient analyses start from the uniform ambient temperature.
    #[instrument(
        skip_all,
        fields(
            analysis = ?self.settings.analysis_type,
            nodes = mesh.n_nodes(),
            elements = mesh.n_elements()
        )
    )]
    pub fn solve(
        &self,
        mesh: &Mesh,
        bcs: &[BoundaryCondition],
        loads: &[Load],
        progress: Progress<'_>,
    ) -> Result<Solution> {
        match self.settings.analysis_type {
            AnalysisType::Steady => self.solve_steady_state(mesh, bcs, loads, progress),
            AnalysisType::Transient => self.solve_transient(mesh, bcs, loads, &[], progress),
        }
    }

    /// Solve K·T = F, with time-dependent inputs evaluated at t = 0.
    ///
    /// Radiation makes the problem nonlinear; it is re-linearised about the
    /// latest iterate until the temperature change falls below
    /// `convergence_tolerance`.
    #[instrument(skip_all, fields(nodes = mesh.n_nodes(), elements = mesh.n_elements()))]
    pub fn solve_steady_state(
        &self,
        mesh: &Mesh,
        bcs: &[BoundaryCondition],
        loads: &[Load],
        progress: Progress<'_>,
    ) -> Result<Solution> {
        let settings = ThermalSettings {
            analysis_type: AnalysisType::Steady,
            ..self.settings.clone()
        };
        let mut reporter = Reporter::new(progress);
        let mut model = Model::build(mesh, &settings, bcs, loads, false, &mut reporter)?;
        let mut solver = select_solver(&settings);
        info!(solver = solver.name(), "steady-state analysis");

        let temperatures = steady::run(&mut model, solver.as_mut(), &mut reporter)?;

        let mut result =
            ThermalResult::new(AnalysisType::Steady, mesh.n_nodes(), mesh.n_elements());
        let (gradients, fluxes) = postprocess::element_fields(mesh, &temperatures)?;
        result.push(0.0, temperatures, gradients, fluxes)?;

        model.diagnostics.extend(solver.take_diagnostics());
        Ok(finish(result, model.diagnostics))
    }

    /// Integrate C·dT/dt + K·T = F with the θ-method over
    /// `[start_time, end_time]`.
    ///
    /// `initial` holds one temperature per node, or is empty for a uniform
    /// field at `ambient_temperature`. Prescribed temperatures at
    /// `start_time` override it.
    #[instrument(skip_all, fields(nodes = mesh.n_nodes(), elements = mesh.n_elements()))]
    pub fn solve_transient(
        &self,
        mesh: &Mesh,
        bcs: &[BoundaryCondition],
        loads: &[Load],
        initial: &[f64],
        progress: Progress<'_>,
    ) -> Result<Solution> {
        let settings = ThermalSettings {
            analysis_type: AnalysisType::Transient,
            ..self.settings.clone()
        };
        settings.validate()?;
        if !initial.is_empty() && initial.len() != mesh.n_nodes() {
            return Err(Error::MeshInvalid(format!(
                "initial field has {} values for {} nodes",
                initial.len(),
                mesh.n_nodes()
            )));
        }

        let mut reporter = Reporter::new(progress);
        let mut model = Model::build(mesh, &settings, bcs, loads, true, &mut reporter)?;
        let mut solver = select_solver(&settings);
        info!(
            solver = solver.name(),
            theta = settings.theta,
            adaptive = settings.adaptive_time_step,
            "transient analysis"
        );

        let result = transient::run(&mut model, solver.as_mut(), initial, &mut reporter)?;

        model.diagnostics.extend(solver.take_diagnostics());
        Ok(finish(result, model.diagnostics))
    }

    /// Assemble the conductivity and capacity matrices without solving.
    ///
    /// The returned matrices are the unconstrained K and C; boundary
    /// conditions and surface exchange are not included.
    pub fn assemble(&self, mesh: &Mesh, progress: Progress<'_>) -> Result<AssembledSystem> {
        let mut reporter = Reporter::new(progress);
        assemble(mesh, &self.settings, true, &mut reporter)
    }

    /// Heat injected at each node to hold `temperatures` at time `time`.
    ///
    /// Computes R = A·T − F with the unconstrained operator (conduction plus
    /// surface exchange, radiation linearised about `temperatures`). Free
    /// nodes give approximately zero; the entries at prescribed-temperature
    /// nodes are the heat flowing in through those constraints.
    pub fn heat_reactions(
        &self,
        mesh: &Mesh,
        bcs: &[BoundaryCondition],
        loads: &[Load],
        temperatures: &[f64],
        time: f64,
    ) -> Result<Vec<f64>> {
        if temperatures.len() != mesh.n_nodes() {
            return Err(Error::MeshInvalid(format!(
                "{} temperatures for {} nodes",
                temperatures.len(),
                mesh.n_nodes()
            )));
        }
        let mut reporter = Reporter::new(None);
        let model = Model::build(mesh, &self.settings, bcs, loads, false, &mut reporter)?;
        let (a, f) = model.operator(time, temperatures)?;
        Ok(postprocess::heat_reactions(&a, temperatures, &f))
    }
}

fn finish(result: ThermalResult, mut diagnostics: Vec<Diagnostic>) -> Solution {
    diagnostics.dedup();
    for diagnostic in &diagnostics {
        warn!(%diagnostic, "thermal analysis");
    }
    Solution { result, diagnostics }
}

/// Assembled state of one solve.
pub(crate) struct Model<'a> {
    mesh: &'a Mesh,
    settings: &'a ThermalSettings,
    system: AssembledSystem,
    loading: LoadAssembler<'a>,
    dirichlet: DirichletSet,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Model<'a> {
    fn build(
        mesh: &'a Mesh,
        settings: &'a ThermalSettings,
        bcs: &'a [BoundaryCondition],
        loads: &'a [Load],
        with_capacity: bool,
        reporter: &mut Reporter<'_>,
    ) -> Result<Self> {
        let system = assemble(mesh, settings, with_capacity, reporter)?;
        let (mut dirichlet, bc_diagnostics) =
            DirichletSet::resolve(mesh, bcs, settings.start_time)?;
        let loading = LoadAssembler::new(mesh, &system.degenerate, bcs, loads)?;

        let mut diagnostics = system.diagnostics.clone();
        diagnostics.extend(bc_diagnostics);
        let ambient = settings.ambient_temperature;
        for &node in &system.isolated {
            if !dirichlet.contains(node) {
                dirichlet.pin(node, ambient);
                diagnostics.push(Diagnostic::IsolatedNode {
                    node,
                    temperature: ambient,
                });
            }
        }
        debug!(
            constrained = dirichlet.len(),
            exchange = loading.has_exchange(),
            radiation = loading.has_radiation(),
            "model built"
        );

        Ok(Self {
            mesh,
            settings,
            system,
            loading,
            dirichlet,
            diagnostics,
        })
    }

    fn n_nodes(&self) -> usize {
        self.mesh.n_nodes()
    }

    fn is_isolated(&self, node: usize) -> bool {
        self.system.isolated.binary_search(&node).is_ok()
    }

    /// Whether some prescribed temperature acts on an assembled element.
    fn anchored(&self) -> bool {
        self.dirichlet.nodes().any(|node| !self.is_isolated(node))
    }

    /// Total load at time `t`, radiation linearised about `field`.
    fn load(&self, t: f64, field: &[f64]) -> Result<Vec<f64>> {
        let mut f = self.loading.external(t)?;
        if self.loading.has_exchange() {
            let (_, g) = self.loading.exchange(t, field)?;
            for (fi, gi) in f.iter_mut().zip(g) {
                *fi += gi;
            }
        }
        Ok(f)
    }

    /// Unconstrained operator K + H and load F at time `t`.
    fn operator(&self, t: f64, field: &[f64]) -> Result<(CsrMatrix, Vec<f64>)> {
        let mut f = self.loading.external(t)?;
        if !self.loading.has_exchange() {
            return Ok((self.system.conductivity.clone(), f));
        }
        let (h, g) = self.loading.exchange(t, field)?;
        for (fi, gi) in f.iter_mut().zip(g) {
            *fi += gi;
        }
        Ok((linear_combination(1.0, &self.system.conductivity, 1.0, &h)?, f))
    }

    /// A result holding every snapshot accepted so far, for cancellation.
    fn cancelled(&self, partial: ThermalResult) -> Error {
        info!(time_points = partial.n_time_points(), "analysis cancelled");
        Error::Cancelled {
            partial: Box::new(partial),
        }
    }

    fn snapshot(
        &self,
        result: &mut ThermalResult,
        time: f64,
        temperatures: Vec<f64>,
    ) -> Result<()> {
        let (gradients, fluxes) = postprocess::element_fields(self.mesh, &temperatures)?;
        result.push(time, temperatures, gradients, fluxes)
    }
}

/// Solve with the selected backend and log its statistics.
fn linear_solve(solver: &mut dyn LinearSolver, a: &CsrMatrix, b: &[f64]) -> Result<Vec<f64>> {
    let x = solver.solve(a, b)?;
    if let Some(stats) = solver.stats() {
        debug!(
            solver = %stats.solver,
            iterations = ?stats.iterations,
            residual = ?stats.residual,
            reused = stats.reused_factor,
            seconds = stats.time_seconds,
            "linear solve"
        );
    }
    Ok(x)
}

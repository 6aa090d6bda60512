//! Steady-state driver.

use super::{linear_solve, Model};
use crate::boundary::{anchor_floating, apply_dirichlet};
use crate::error::{Error, Result};
use crate::progress::{ProgressEvent, Reporter};
use crate::result::ThermalResult;
use crate::settings::AnalysisType;
use crate::solver::LinearSolver;
use tracing::debug;

/// Steady temperatures at t = 0.
pub(super) fn run(
    model: &mut Model<'_>,
    solver: &mut dyn LinearSolver,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<f64>> {
    let ambient = model.settings.ambient_temperature;
    let n = model.n_nodes();

    if !model.anchored() && !model.loading.has_exchange() {
        let mut f = model.load(0.0, &[])?;
        for &node in &model.system.isolated {
            f[node] = 0.0;
        }
        let node = (0..n).find(|&i| !model.is_isolated(i)).unwrap_or(0);
        let diagnostic = anchor_floating(&mut model.dirichlet, &f, node, ambient)?;
        model.diagnostics.push(diagnostic);
    }
    let fixed = model.dirichlet.values(0.0);

    if !model.loading.has_radiation() {
        let (mut a, mut b) = model.operator(0.0, &[])?;
        apply_dirichlet(&mut a, &mut b, &fixed)?;
        return linear_solve(solver, &a, &b);
    }

    // Newton-like re-linearisation of the T⁴ term about the last iterate
    let mut field = vec![ambient; n];
    for &(node, value) in &fixed {
        field[node] = value;
    }

    let tolerance = model.settings.convergence_tolerance;
    let mut relative = f64::INFINITY;
    for iteration in 1..=model.settings.max_iterations {
        let (mut a, mut b) = model.operator(0.0, &field)?;
        apply_dirichlet(&mut a, &mut b, &fixed)?;
        let next = linear_solve(solver, &a, &b)?;

        let change = next
            .iter()
            .zip(&field)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        let scale = next.iter().map(|x| x.abs()).fold(1.0, f64::max);
        relative = change / scale;
        field = next;
        debug!(iteration, change, "radiation iteration");

        if reporter
            .report(ProgressEvent::Iteration { iteration, change })
            .is_break()
        {
            return Err(model.cancelled(ThermalResult::new(
                AnalysisType::Steady,
                n,
                model.mesh.n_elements(),
            )));
        }
        if relative <= tolerance {
            return Ok(field);
        }
    }

    Err(Error::NotConverged {
        iterations: model.settings.max_iterations,
        residual: relative,
    })
}

#[cfg(test)]
mod tests {
    use crate::analysis::ThermalSolver;
    use crate::boundary::BoundaryCondition;
    use crate::error::{Diagnostic, Error};
    use crate::load::Load;
    use crate::material::Material;
    use crate::mesh::{ElementType, Mesh, SolidKind, SurfacePatch};
    use crate::progress::ProgressEvent;
    use crate::settings::{SolverBackend, ThermalSettings};
    use crate::types::STEFAN_BOLTZMANN;
    use approx::assert_relative_eq;
    use std::ops::ControlFlow;

    fn bar(n: usize) -> Mesh {
        Mesh::line(1.0, n, Material::new(2.0, 1.0, 1.0).unwrap(), 0.5).unwrap()
    }

    #[test]
    fn test_floating_balanced_system_is_anchored() {
        let mesh = bar(4);
        let solver = ThermalSolver::new(ThermalSettings::steady()).unwrap();
        let loads = vec![Load::point(0, 5.0), Load::point(4, -5.0)];
        let solution = solver.solve(&mesh, &[], &loads, None).unwrap();

        assert_eq!(
            solution.diagnostics,
            vec![Diagnostic::FloatingSystem {
                pinned_node: 0,
                temperature: 20.0
            }]
        );
        let t = &solution.result.temperatures[0];
        assert_relative_eq!(t[0], 20.0, epsilon = 1e-12);
        // Gradient −q/(kA) = −5 K/m
        assert_relative_eq!(t[4], 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_floating_anchor_skips_isolated_nodes() {
        // Zero-length bar on nodes 0 and 1, then a 100-element bar on 2..=102
        let mut mesh = Mesh::new();
        mesh.add_material(Material::new(1.0, 1.0, 1.0).unwrap());
        mesh.add_nodes((0..2).map(|_| nalgebra::Vector3::zeros()));
        mesh.add_nodes((0..=100).map(|i| nalgebra::Vector3::new(i as f64 * 0.01, 0.0, 0.0)));
        mesh.add_element(ElementType::Line2, vec![0, 1], 0).unwrap();
        for i in 0..100 {
            mesh.add_element(ElementType::Line2, vec![2 + i, 3 + i], 0).unwrap();
        }
        let loads = vec![Load::point(2, 1.0), Load::point(102, -1.0)];

        let solution = ThermalSolver::new(ThermalSettings::steady())
            .unwrap()
            .solve(&mesh, &[], &loads, None)
            .unwrap();
        assert!(solution.diagnostics.contains(&Diagnostic::IsolatedNode {
            node: 0,
            temperature: 20.0
        }));
        assert!(solution.diagnostics.contains(&Diagnostic::FloatingSystem {
            pinned_node: 2,
            temperature: 20.0
        }));
        let t = &solution.result.temperatures[0];
        assert_relative_eq!(t[2], 20.0, epsilon = 1e-12);
        // 1 W through a unit bar of k = 1, A = 1
        assert_relative_eq!(t[102], 19.0, epsilon = 1e-9);
    }

    #[test]
    fn test_floating_unbalanced_system_is_singular() {
        let mesh = bar(2);
        let solver = ThermalSolver::new(ThermalSettings::steady()).unwrap();
        let loads = vec![Load::point(0, 1.0)];
        assert!(matches!(
            solver.solve(&mesh, &[], &loads, None),
            Err(Error::Singular(_))
        ));
    }

    #[test]
    fn test_convection_only_anchor() {
        // Convection at one end, flux at the other: T(0) = T∞ + q/h
        let mesh = bar(5);
        let bcs = vec![
            BoundaryCondition::convection(vec![SurfacePatch::side(0, 0)], 10.0, 20.0),
            BoundaryCondition::heat_flux(vec![SurfacePatch::side(4, 1)], 100.0),
        ];
        let solver = ThermalSolver::new(ThermalSettings::steady()).unwrap();
        let solution = solver.solve(&mesh, &bcs, &[], None).unwrap();
        let t = &solution.result.temperatures[0];
        assert_relative_eq!(t[0], 30.0, epsilon = 1e-9);
        // q·L/k = 50 K over the bar
        assert_relative_eq!(t[5], 80.0, epsilon = 1e-9);
        assert!(solution.diagnostics.is_empty());
    }

    #[test]
    fn test_radiation_balance() {
        // Fixed 500 K on one face, radiating opposite face.
        let material = Material::new(1.0, 1.0, 1.0).unwrap();
        let mesh = Mesh::cuboid(0.1, 1.0, 1.0, 4, 1, 1, material, SolidKind::Hex8).unwrap();
        let hot = mesh.node_group("xmin").unwrap().to_vec();
        let patches = mesh.boundary_patches_in_group("xmax").unwrap();
        let bcs = vec![
            BoundaryCondition::temperature(hot, 500.0),
            BoundaryCondition::radiation(patches, 0.9, 300.0),
        ];
        let mut settings = ThermalSettings::steady();
        settings.ambient_temperature = 300.0;
        settings.convergence_tolerance = 1e-12;

        let solution = ThermalSolver::new(settings).unwrap().solve(&mesh, &bcs, &[], None).unwrap();
        let t = &solution.result.temperatures[0];
        let cold = mesh.node_group("xmax").unwrap();
        let ts = t[cold[0]];
        // Conduction through the slab equals the radiated flux
        let conducted = (500.0 - ts) / 0.1;
        let radiated = 0.9 * STEFAN_BOLTZMANN * (ts.powi(4) - 300.0_f64.powi(4));
        assert_relative_eq!(conducted, radiated, max_relative = 1e-8);
        assert!(ts > 300.0 && ts < 500.0);
    }

    #[test]
    fn test_radiation_iterations_reported_and_cancellable() {
        let material = Material::new(1.0, 1.0, 1.0).unwrap();
        let mesh = Mesh::cuboid(0.1, 1.0, 1.0, 2, 1, 1, material, SolidKind::Hex8).unwrap();
        let hot = mesh.node_group("xmin").unwrap().to_vec();
        let patches = mesh.boundary_patches_in_group("xmax").unwrap();
        let bcs = vec![
            BoundaryCondition::temperature(hot, 600.0),
            BoundaryCondition::radiation(patches, 1.0, 300.0),
        ];
        let solver = ThermalSolver::new(ThermalSettings::steady()).unwrap();

        let mut iterations = 0;
        let mut count = |e: ProgressEvent| {
            if matches!(e, ProgressEvent::Iteration { .. }) {
                iterations += 1;
            }
            ControlFlow::Continue(())
        };
        solver.solve(&mesh, &bcs, &[], Some(&mut count)).unwrap();
        assert!(iterations >= 2);

        let mut stop = |e: ProgressEvent| match e {
            ProgressEvent::Iteration { .. } => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        };
        assert!(matches!(
            solver.solve(&mesh, &bcs, &[], Some(&mut stop)),
            Err(Error::Cancelled { .. })
        ));

        let mut settings = ThermalSettings::steady();
        settings.max_iterations = 1;
        let limited = ThermalSolver::new(settings).unwrap();
        assert!(matches!(
            limited.solve(&mesh, &bcs, &[], None),
            Err(Error::NotConverged { iterations: 1, .. })
        ));
    }

    #[test]
    fn test_backends_agree() {
        let mesh =
            Mesh::cuboid(1.0, 1.0, 1.0, 3, 3, 3, Material::copper(), SolidKind::Tet4).unwrap();
        let bcs = vec![
            BoundaryCondition::temperature(mesh.node_group("zmin").unwrap().to_vec(), 0.0),
            BoundaryCondition::heat_flux(mesh.boundary_patches_in_group("zmax").unwrap(), 1000.0),
        ];
        let direct = ThermalSolver::new(ThermalSettings::steady())
            .unwrap()
            .solve(&mesh, &bcs, &[], None)
            .unwrap();

        let mut settings = ThermalSettings::steady();
        settings.backend = SolverBackend::Iterative;
        let iterative = ThermalSolver::new(settings)
            .unwrap()
            .solve(&mesh, &bcs, &[], None)
            .unwrap();

        for (a, b) in direct.result.temperatures[0]
            .iter()
            .zip(&iterative.result.temperatures[0])
        {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}

//! Parallel finite element assembly.
//!
//! Assembles the global conductivity and capacity matrices and the load
//! vector from element contributions. Element matrices are computed in
//! parallel with Rayon and collected in element order, then scattered
//! sequentially, so the assembled values do not depend on the thread count.

use crate::boundary::{surface_exchanges, surface_fluxes, BoundaryCondition, ExchangeKind};
use crate::element::kernel::{self, KernelResult};
use crate::error::{Diagnostic, Error, Result};
use crate::load::{Load, TimeProfile};
use crate::mesh::{ElementConnectivity, Mesh, ResolvedFacet};
use crate::progress::{AssemblyStage, Reporter};
use crate::result::ThermalResult;
use crate::settings::ThermalSettings;
use crate::sparse::{CsrMatrix, NodalLoad, TripletMatrix};
use crate::types::{Point3, STEFAN_BOLTZMANN};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Assembled volumetric operators, rebuilt for every solve.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    /// Global conductivity matrix K (symmetric, every diagonal stored).
    pub conductivity: CsrMatrix,
    /// Global capacity matrix C (transient analyses only).
    pub capacity: Option<CsrMatrix>,
    /// Elements skipped because of a non-positive Jacobian, ascending.
    pub degenerate: Vec<usize>,
    /// Nodes attached only to skipped elements. Their rows hold nothing
    /// but the reserved zero diagonal until a temperature is imposed.
    pub isolated: Vec<usize>,
    /// Smallest explicit stability estimate over the assembled elements.
    pub critical_time_step: f64,
    /// Non-fatal findings (skipped elements).
    pub diagnostics: Vec<Diagnostic>,
}

fn gather_coords(mesh: &Mesh, nodes: &[usize]) -> Vec<Point3> {
    nodes.iter().map(|&n| mesh.nodes()[n]).collect()
}

fn cancelled(mesh: &Mesh, settings: &ThermalSettings) -> Error {
    Error::Cancelled {
        partial: Box::new(ThermalResult::new(
            settings.analysis_type,
            mesh.n_nodes(),
            mesh.n_elements(),
        )),
    }
}

fn check_finite(matrix: &DMatrix<f64>, what: &str, element: usize) -> Result<()> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::AssemblyFailure(format!(
            "element {} produced a non-finite {} entry",
            element, what
        )))
    }
}

/// Triplet builder with every diagonal reserved, so Dirichlet rows always
/// have a diagonal slot and K, C and exchange terms share a pattern base.
fn triplets_with_diagonal(n: usize, nnz_estimate: usize) -> TripletMatrix {
    let mut triplet = TripletMatrix::with_capacity(n, n, nnz_estimate + n);
    for i in 0..n {
        triplet.add(i, i, 0.0);
    }
    triplet
}

fn nnz_estimate(mesh: &Mesh) -> usize {
    mesh.elements().iter().map(|e| e.nodes.len().pow(2)).sum()
}

/// Elements computed in parallel between two progress checks.
const BATCH: usize = 256;

/// Compute one block per element in parallel batches and hand the blocks to
/// `scatter` in element order.
///
/// Progress counts scattered elements; cancellation is honoured between
/// elements, so at most one batch is computed after a `Break`.
fn for_each_block<T, C, S>(
    mesh: &Mesh,
    settings: &ThermalSettings,
    stage: AssemblyStage,
    reporter: &mut Reporter<'_>,
    compute: C,
    mut scatter: S,
) -> Result<()>
where
    T: Send,
    C: Fn(usize, &ElementConnectivity) -> T + Sync,
    S: FnMut(usize, &ElementConnectivity, T) -> Result<()>,
{
    let elements = mesh.elements();
    let total = elements.len();
    for first in (0..total).step_by(BATCH) {
        let batch = &elements[first..(first + BATCH).min(total)];
        let blocks: Vec<T> = batch
            .par_iter()
            .enumerate()
            .map(|(i, conn)| compute(first + i, conn))
            .collect();
        for (i, (conn, block)) in batch.iter().zip(blocks).enumerate() {
            let idx = first + i;
            scatter(idx, conn, block)?;
            if reporter.assembly(stage, idx + 1, total).is_break() {
                return Err(cancelled(mesh, settings));
            }
        }
    }
    Ok(())
}

/// Nodes touched only by skipped elements, ascending.
fn isolated_nodes(mesh: &Mesh, degenerate: &[usize]) -> Vec<usize> {
    if degenerate.is_empty() {
        return Vec::new();
    }
    let mut live = vec![false; mesh.n_nodes()];
    for (idx, conn) in mesh.elements().iter().enumerate() {
        if degenerate.binary_search(&idx).is_err() {
            for &n in &conn.nodes {
                live[n] = true;
            }
        }
    }
    (0..live.len()).filter(|&n| !live[n]).collect()
}

/// Assemble K (and C when `with_capacity`) for a validated mesh.
///
/// Elements with a non-positive Jacobian are skipped with a diagnostic as
/// long as their number stays within `settings.degenerate_tolerance` of the
/// element count. Nodes left without any assembled element are listed in
/// [`AssembledSystem::isolated`].
pub(crate) fn assemble(
    mesh: &Mesh,
    settings: &ThermalSettings,
    with_capacity: bool,
    reporter: &mut Reporter<'_>,
) -> Result<AssembledSystem> {
    mesh.validate()?;
    for (id, material) in mesh.materials().iter().enumerate() {
        material
            .validate()
            .map_err(|e| Error::InvalidMaterial(format!("material {}: {}", id, e)))?;
    }

    let n = mesh.n_nodes();
    let total = mesh.n_elements();
    let estimate = nnz_estimate(mesh);

    let mut triplet = triplets_with_diagonal(n, estimate);
    let mut degenerate = Vec::new();
    let mut diagnostics = Vec::new();
    let mut critical_time_step = f64::INFINITY;

    for_each_block(
        mesh,
        settings,
        AssemblyStage::Conductivity,
        reporter,
        |_, conn| -> KernelResult<(DMatrix<f64>, f64)> {
            let coords = gather_coords(mesh, &conn.nodes);
            let material = &mesh.materials()[conn.material];
            let ke = kernel::conductivity_matrix(
                conn.element_type.shape(),
                &coords,
                &material.conductivity_tensor(),
                conn.section,
            )?;
            Ok((ke, kernel::critical_time_step(&coords, material)))
        },
        |idx, conn, block| {
            match block {
                Ok((ke, dt)) => {
                    check_finite(&ke, "conductivity", idx)?;
                    triplet.add_submatrix(&conn.nodes, &ke);
                    critical_time_step = critical_time_step.min(dt);
                }
                Err(bad) => {
                    degenerate.push(idx);
                    diagnostics.push(Diagnostic::DegenerateElement {
                        element: idx,
                        det_j: bad.det_j,
                    });
                }
            }
            Ok(())
        },
    )?;

    if degenerate.len() as f64 > settings.degenerate_tolerance * total as f64 {
        return Err(Error::DegenerateElement {
            count: degenerate.len(),
            total,
        });
    }
    let isolated = isolated_nodes(mesh, &degenerate);
    if !degenerate.is_empty() {
        warn!(
            skipped = degenerate.len(),
            isolated = isolated.len(),
            total,
            "skipping degenerate elements"
        );
    }
    let conductivity = triplet.to_csr()?;

    let capacity = if with_capacity {
        Some(assemble_capacity(mesh, settings, &degenerate, estimate, reporter)?)
    } else {
        None
    };

    debug!(
        nodes = n,
        elements = total,
        nnz = conductivity.nnz(),
        "assembled conductivity matrix"
    );

    Ok(AssembledSystem {
        conductivity,
        capacity,
        degenerate,
        isolated,
        critical_time_step,
        diagnostics,
    })
}

fn assemble_capacity(
    mesh: &Mesh,
    settings: &ThermalSettings,
    degenerate: &[usize],
    estimate: usize,
    reporter: &mut Reporter<'_>,
) -> Result<CsrMatrix> {
    let mut triplet = triplets_with_diagonal(mesh.n_nodes(), estimate);
    for_each_block(
        mesh,
        settings,
        AssemblyStage::Capacity,
        reporter,
        |idx, conn| -> Option<KernelResult<DMatrix<f64>>> {
            if degenerate.binary_search(&idx).is_ok() {
                return None;
            }
            let material = &mesh.materials()[conn.material];
            Some(kernel::capacity_matrix(
                conn.element_type.shape(),
                &gather_coords(mesh, &conn.nodes),
                material.volumetric_heat_capacity(),
                conn.section,
                settings.mass_lumping,
            ))
        },
        |idx, conn, block| {
            if let Some(block) = block {
                // The capacity rule samples points the conductivity rule did not
                let ce = block.map_err(|bad| {
                    Error::AssemblyFailure(format!(
                        "element {} has det J = {:e} at a capacity quadrature point",
                        idx, bad.det_j
                    ))
                })?;
                check_finite(&ce, "capacity", idx)?;
                triplet.add_submatrix(&conn.nodes, &ce);
            }
            Ok(())
        },
    )?;
    triplet.to_csr()
}

/// A resolved facet with its coordinates.
struct FacetGeometry {
    element: usize,
    facet: ResolvedFacet,
    coords: Vec<Point3>,
}

struct FluxTerm<'a> {
    facets: Vec<FacetGeometry>,
    flux: f64,
    profile: &'a TimeProfile,
}

struct ExchangeTerm<'a> {
    facets: Vec<FacetGeometry>,
    kind: ExchangeKind,
    ambient: f64,
    profile: &'a TimeProfile,
}

struct VolumeTerm<'a> {
    elements: &'a [usize],
    power_density: f64,
    profile: &'a TimeProfile,
}

/// Time- and temperature-dependent right-hand side and surface exchange.
///
/// Patches are resolved once; evaluation at a time (and, for radiation, a
/// linearisation field) only integrates.
pub(crate) struct LoadAssembler<'a> {
    mesh: &'a Mesh,
    degenerate: Vec<usize>,
    points: Vec<(usize, f64, &'a TimeProfile)>,
    volumes: Vec<VolumeTerm<'a>>,
    fluxes: Vec<FluxTerm<'a>>,
    exchanges: Vec<ExchangeTerm<'a>>,
}

impl<'a> LoadAssembler<'a> {
    pub(crate) fn new(
        mesh: &'a Mesh,
        degenerate: &[usize],
        bcs: &'a [BoundaryCondition],
        loads: &'a [Load],
    ) -> Result<Self> {
        let resolve = |patches: &[crate::mesh::SurfacePatch]| -> Result<Vec<FacetGeometry>> {
            patches
                .iter()
                .map(|patch| {
                    let facet = mesh.resolve_patch(patch)?;
                    let coords = gather_coords(mesh, &facet.nodes);
                    Ok(FacetGeometry {
                        element: patch.element,
                        facet,
                        coords,
                    })
                })
                .collect()
        };

        let mut points = Vec::new();
        let mut volumes = Vec::new();
        for load in loads {
            match load {
                Load::Point { node, watts, profile } => {
                    if *node >= mesh.n_nodes() {
                        return Err(Error::MeshInvalid(format!(
                            "Point load on node {} (mesh has {} nodes)",
                            node,
                            mesh.n_nodes()
                        )));
                    }
                    points.push((*node, *watts, profile));
                }
                Load::Volume {
                    elements,
                    power_density,
                    profile,
                } => {
                    if let Some(&bad) = elements.iter().find(|&&e| e >= mesh.n_elements()) {
                        return Err(Error::MeshInvalid(format!(
                            "Volume load on element {} (mesh has {} elements)",
                            bad,
                            mesh.n_elements()
                        )));
                    }
                    volumes.push(VolumeTerm {
                        elements,
                        power_density: *power_density,
                        profile,
                    });
                }
                _ => {}
            }
        }

        let fluxes = surface_fluxes(bcs, loads)
            .into_iter()
            .map(|f| {
                Ok(FluxTerm {
                    facets: resolve(f.patches)?,
                    flux: f.flux,
                    profile: f.profile,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exchanges = surface_exchanges(bcs, loads)?
            .into_iter()
            .map(|x| {
                Ok(ExchangeTerm {
                    facets: resolve(x.patches)?,
                    kind: x.kind,
                    ambient: x.ambient,
                    profile: x.profile,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mesh,
            degenerate: degenerate.to_vec(),
            points,
            volumes,
            fluxes,
            exchanges,
        })
    }

    /// Whether any convective or radiative exchange is present.
    pub(crate) fn has_exchange(&self) -> bool {
        !self.exchanges.is_empty()
    }

    /// Whether the operator depends on the temperature field.
    pub(crate) fn has_radiation(&self) -> bool {
        self.exchanges
            .iter()
            .any(|x| matches!(x.kind, ExchangeKind::Radiation { .. }))
    }

    /// Contributions of skipped elements are dropped; any other element
    /// failing an integral is an assembly error.
    fn skipped_or_fail(&self, element: usize, what: &str, det_j: f64) -> Result<()> {
        if self.degenerate.binary_search(&element).is_ok() {
            return Ok(());
        }
        Err(Error::AssemblyFailure(format!(
            "{} of element {} is degenerate (det J = {:e})",
            what, element, det_j
        )))
    }

    /// Point, volume and surface flux loads at time `t`.
    pub(crate) fn external(&self, t: f64) -> Result<Vec<f64>> {
        let mut f = NodalLoad::zeros(self.mesh.n_nodes());

        for &(node, watts, profile) in &self.points {
            f.add(node, watts * profile.value(t));
        }

        for term in &self.volumes {
            let s = term.power_density * term.profile.value(t);
            if s == 0.0 {
                continue;
            }
            let contributions: Vec<(usize, KernelResult<DVector<f64>>)> = term
                .elements
                .par_iter()
                .map(|&e| {
                    let conn: &ElementConnectivity = &self.mesh.elements()[e];
                    let coords = gather_coords(self.mesh, &conn.nodes);
                    let shape = conn.element_type.shape();
                    (e, kernel::source_vector(shape, &coords, s, conn.section))
                })
                .collect();
            for (e, fe) in contributions {
                match fe {
                    Ok(fe) => f.scatter(&self.mesh.elements()[e].nodes, fe.as_slice()),
                    Err(bad) => self.skipped_or_fail(e, "volume source", bad.det_j)?,
                }
            }
        }

        for term in &self.fluxes {
            let q = term.flux * term.profile.value(t);
            for geometry in &term.facets {
                match kernel::facet_integrals(
                    geometry.facet.shape,
                    &geometry.coords,
                    geometry.facet.scale,
                    &[],
                    |_| (0.0, q),
                ) {
                    Ok((_, fe)) => f.scatter(&geometry.facet.nodes, fe.as_slice()),
                    Err(bad) => self.skipped_or_fail(geometry.element, "surface facet", bad.det_j)?,
                }
            }
        }

        let f = f.into_vec();
        if f.iter().any(|v| !v.is_finite()) {
            return Err(Error::AssemblyFailure("non-finite load vector".into()));
        }
        Ok(f)
    }

    /// Exchange matrix H and vector g at time `t`.
    ///
    /// Convection contributes ∫h N Nᵀ and ∫h T∞ N. Radiation is linearised
    /// about `field` (kelvin): ∫4εσT̂³ N Nᵀ and ∫εσ(3T̂⁴ + T∞⁴) N. The field
    /// is ignored when no radiation is present and may then be empty.
    pub(crate) fn exchange(&self, t: f64, field: &[f64]) -> Result<(CsrMatrix, Vec<f64>)> {
        let n = self.mesh.n_nodes();
        if self.has_radiation() && field.len() != n {
            return Err(Error::AssemblyFailure(format!(
                "radiation needs a linearisation field of {} temperatures, got {}",
                n,
                field.len()
            )));
        }
        let mut h = TripletMatrix::new(n, n);
        let mut g = NodalLoad::zeros(n);

        for term in &self.exchanges {
            let ambient = term.ambient * term.profile.value(t);
            for geometry in &term.facets {
                let integrals = match term.kind {
                    ExchangeKind::Convection { film_coefficient } => kernel::facet_integrals(
                        geometry.facet.shape,
                        &geometry.coords,
                        geometry.facet.scale,
                        &[],
                        |_| (film_coefficient, film_coefficient * ambient),
                    ),
                    ExchangeKind::Radiation { emissivity } => {
                        let local: Vec<f64> =
                            geometry.facet.nodes.iter().map(|&i| field[i]).collect();
                        let es = emissivity * STEFAN_BOLTZMANN;
                        kernel::facet_integrals(
                            geometry.facet.shape,
                            &geometry.coords,
                            geometry.facet.scale,
                            &local,
                            |tl| (4.0 * es * tl.powi(3), es * (3.0 * tl.powi(4) + ambient.powi(4))),
                        )
                    }
                };
                match integrals {
                    Ok((he, ge)) => {
                        check_finite(&he, "exchange", geometry.element)?;
                        // Full blocks keep the pattern independent of T̂
                        let nodes = &geometry.facet.nodes;
                        for (i, &ni) in nodes.iter().enumerate() {
                            for (j, &nj) in nodes.iter().enumerate() {
                                h.add(ni, nj, he[(i, j)]);
                            }
                        }
                        g.scatter(nodes, ge.as_slice());
                    }
                    Err(bad) => self.skipped_or_fail(geometry.element, "surface facet", bad.det_j)?,
                }
            }
        }

        let g = g.into_vec();
        if g.iter().any(|v| !v.is_finite()) {
            return Err(Error::AssemblyFailure("non-finite exchange load".into()));
        }
        Ok((h.to_csr()?, g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::mesh::{ElementType, SolidKind, SurfacePatch};
    use crate::progress::ProgressEvent;
    use crate::sparse::asymmetry;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::ops::ControlFlow;

    fn silent() -> Reporter<'static> {
        Reporter::new(None)
    }

    fn row_sums(a: &CsrMatrix) -> Vec<f64> {
        crate::sparse::spmv(a, &vec![1.0; a.ncols()])
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let mesh = Mesh::new();
        let settings = ThermalSettings::default();
        assert!(matches!(
            assemble(&mesh, &settings, false, &mut silent()),
            Err(Error::MeshInvalid(_))
        ));
    }

    #[test]
    fn test_single_tet4_assembly() {
        let mut mesh = Mesh::new();
        mesh.add_node(Vector3::new(0.0, 0.0, 0.0));
        mesh.add_node(Vector3::new(1.0, 0.0, 0.0));
        mesh.add_node(Vector3::new(0.0, 1.0, 0.0));
        mesh.add_node(Vector3::new(0.0, 0.0, 1.0));
        mesh.add_material(Material::new(2.0, 1.0, 3.0).unwrap());
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0).unwrap();

        let system = assemble(&mesh, &ThermalSettings::default(), true, &mut silent()).unwrap();
        let k = nalgebra::DMatrix::from(&system.conductivity);
        for i in 0..4 {
            assert!(k[(i, i)] > 0.0, "Diagonal {} is not positive", i);
        }
        // Constant field is in the null space of K
        for s in row_sums(&system.conductivity) {
            assert_relative_eq!(s, 0.0, epsilon = 1e-12);
        }
        // Total capacity ρcₚV = 3 · 1/6
        let total: f64 = row_sums(system.capacity.as_ref().unwrap()).iter().sum();
        assert_relative_eq!(total, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_cuboid_symmetry() {
        for solid in [SolidKind::Hex8, SolidKind::Tet4] {
            let mesh = Mesh::cuboid(1.0, 2.0, 0.5, 2, 2, 2, Material::aluminum(), solid).unwrap();
            let system = assemble(&mesh, &ThermalSettings::default(), true, &mut silent()).unwrap();
            assert!(asymmetry(&system.conductivity).unwrap() < 1e-12);
            assert!(asymmetry(system.capacity.as_ref().unwrap()).unwrap() < 1e-12);
            assert!(system.diagnostics.is_empty());
        }
    }

    #[test]
    fn test_degenerate_elements() {
        let mut mesh =
            Mesh::cuboid(1.0, 1.0, 1.0, 1, 1, 2, Material::steel(), SolidKind::Tet4).unwrap();
        // Flat tetrahedron made of four coplanar corner nodes
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0).unwrap();

        let mut settings = ThermalSettings::default();
        assert!(matches!(
            assemble(&mesh, &settings, false, &mut silent()),
            Err(Error::DegenerateElement { count: 1, total: 13 })
        ));

        settings.degenerate_tolerance = 0.1;
        let system = assemble(&mesh, &settings, false, &mut silent()).unwrap();
        assert_eq!(system.degenerate, vec![12]);
        assert!(matches!(
            system.diagnostics.as_slice(),
            [Diagnostic::DegenerateElement { element: 12, .. }]
        ));
    }

    #[test]
    fn test_invalid_material_rejected() {
        let mut mesh = Mesh::line(1.0, 2, Material::steel(), 1.0).unwrap();
        mesh.add_material(Material {
            density: -1.0,
            ..Material::steel()
        });
        assert!(matches!(
            assemble(&mesh, &ThermalSettings::default(), false, &mut silent()),
            Err(Error::InvalidMaterial(_))
        ));
    }

    #[test]
    fn test_assembly_progress_and_cancel() {
        // More elements than one parallel batch
        let mesh =
            Mesh::cuboid(1.0, 1.0, 3.0, 5, 5, 12, Material::steel(), SolidKind::Hex8).unwrap();
        assert!(mesh.n_elements() > BATCH);
        let mut fractions = Vec::new();
        let mut callback = |e: ProgressEvent| {
            if let ProgressEvent::Assembly { fraction, .. } = e {
                fractions.push(fraction);
            }
            ControlFlow::Continue(())
        };
        let mut reporter = Reporter::new(Some(&mut callback));
        assemble(&mesh, &ThermalSettings::default(), true, &mut reporter).unwrap();
        drop(reporter);
        assert!(fractions.len() >= 100);
        assert_eq!(fractions.iter().filter(|&&f| f == 1.0).count(), 2);

        let mut events = 0;
        let mut stop = |_: ProgressEvent| {
            events += 1;
            ControlFlow::Break(())
        };
        let mut reporter = Reporter::new(Some(&mut stop));
        assert!(matches!(
            assemble(&mesh, &ThermalSettings::default(), false, &mut reporter),
            Err(Error::Cancelled { .. })
        ));
        drop(reporter);
        assert_eq!(events, 1);
    }

    #[test]
    fn test_isolated_nodes() {
        let mut mesh =
            Mesh::cuboid(1.0, 1.0, 1.0, 1, 1, 1, Material::steel(), SolidKind::Tet4).unwrap();
        let first = mesh.add_node(Vector3::new(2.0, 0.0, 0.0));
        mesh.add_node(Vector3::new(3.0, 0.0, 0.0));
        mesh.add_node(Vector3::new(2.0, 1.0, 0.0));
        mesh.add_node(Vector3::new(3.0, 1.0, 0.0));
        mesh.add_element(ElementType::Tet4, (first..first + 4).collect(), 0).unwrap();

        let settings = ThermalSettings {
            degenerate_tolerance: 0.5,
            ..ThermalSettings::default()
        };
        let system = assemble(&mesh, &settings, true, &mut silent()).unwrap();
        assert_eq!(system.degenerate, vec![6]);
        assert_eq!(system.isolated, vec![8, 9, 10, 11]);
        // Nothing but the reserved diagonal on isolated rows
        let k = nalgebra::DMatrix::from(&system.conductivity);
        let c = nalgebra::DMatrix::from(system.capacity.as_ref().unwrap());
        for i in 8..12 {
            assert!(k.row(i).iter().all(|&v| v == 0.0));
            assert!(c.row(i).iter().all(|&v| v == 0.0));
        }

        let healthy =
            Mesh::cuboid(1.0, 1.0, 1.0, 1, 1, 1, Material::steel(), SolidKind::Tet4).unwrap();
        let system = assemble(&healthy, &settings, false, &mut silent()).unwrap();
        assert!(system.isolated.is_empty());
    }

    #[test]
    fn test_volume_source_on_degenerate_element() {
        let mut mesh =
            Mesh::cuboid(1.0, 1.0, 1.0, 1, 1, 1, Material::steel(), SolidKind::Tet4).unwrap();
        // Nodes 0..4 lie in the z = 0 plane
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0).unwrap();
        let loads = vec![Load::volume(vec![0, 6], 6.0)];

        let unrecorded = LoadAssembler::new(&mesh, &[], &[], &loads).unwrap();
        assert!(matches!(
            unrecorded.external(0.0),
            Err(Error::AssemblyFailure(_))
        ));

        let skipped = LoadAssembler::new(&mesh, &[6], &[], &loads).unwrap();
        let f = skipped.external(0.0).unwrap();
        // Only element 0 (volume 1/6) contributes
        assert_relative_eq!(f.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_loads() {
        let mesh = Mesh::line(2.0, 4, Material::steel(), 0.5).unwrap();
        let loads = vec![
            Load::point(4, 3.0),
            Load::volume(vec![0, 1, 2, 3], 10.0)
                .with_profile(TimeProfile::Ramp { start: 0.0, end: 2.0 }),
        ];
        let bcs = vec![BoundaryCondition::heat_flux(vec![SurfacePatch::side(0, 0)], 8.0)];
        let loading = LoadAssembler::new(&mesh, &[], &bcs, &loads).unwrap();
        let f = loading.external(1.0).unwrap();
        // Volume: 10 · 0.5 · (2 · 0.5) = 5 W; flux 8 · 0.5 = 4 W; point 3 W
        assert_relative_eq!(f.iter().sum::<f64>(), 12.0, epsilon = 1e-12);
        assert_relative_eq!(f[0], 4.0 + 0.625, epsilon = 1e-12);
        assert_relative_eq!(f[4], 3.0 + 0.625, epsilon = 1e-12);
        assert!(!loading.has_exchange());

        let bad = vec![Load::point(9, 1.0)];
        assert!(LoadAssembler::new(&mesh, &[], &[], &bad).is_err());
    }

    #[test]
    fn test_convection_exchange() {
        // Plate face convection: H sums to h·A, g to h·T∞·A
        let mesh = Mesh::rectangle(2.0, 1.0, 2, 1, Material::steel(), 0.1).unwrap();
        let patches = vec![SurfacePatch::face(0), SurfacePatch::face(1)];
        let loads = vec![Load::convective(patches, 5.0, 300.0)];
        let loading = LoadAssembler::new(&mesh, &[], &[], &loads).unwrap();
        assert!(loading.has_exchange() && !loading.has_radiation());
        let (h, g) = loading.exchange(0.0, &[]).unwrap();
        assert_relative_eq!(row_sums(&h).iter().sum::<f64>(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(g.iter().sum::<f64>(), 3000.0, epsilon = 1e-9);
        assert!(asymmetry(&h).unwrap() < 1e-14);
    }

    #[test]
    fn test_radiation_linearisation() {
        // At T̂ = T∞ the linearised flux vanishes: H·T̂ = g
        let mesh =
            Mesh::cuboid(1.0, 1.0, 1.0, 1, 1, 1, Material::steel(), SolidKind::Hex8).unwrap();
        let patches = mesh.boundary_patches_in_group("zmax").unwrap();
        let bcs = vec![BoundaryCondition::radiation(patches, 0.8, 400.0)];
        let loading = LoadAssembler::new(&mesh, &[], &bcs, &[]).unwrap();
        assert!(loading.has_radiation());
        let field = vec![400.0; mesh.n_nodes()];
        let (h, g) = loading.exchange(0.0, &field).unwrap();
        let ht = crate::sparse::spmv(&h, &field);
        for (a, b) in ht.iter().zip(&g) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
        let expected = 4.0 * 0.8 * STEFAN_BOLTZMANN * 400.0_f64.powi(4);
        assert_relative_eq!(g.iter().sum::<f64>(), expected, max_relative = 1e-12);
    }
}

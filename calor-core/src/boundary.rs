//! Boundary conditions and their application.
//!
//! Temperature constraints are resolved once per solve into a
//! [`DirichletSet`] and imposed on the assembled system by
//! [`apply_dirichlet`]. Flux and exchange conditions given as boundary
//! conditions or as loads are gathered into the same surface terms, so the
//! assembler has a single code path for each.

use crate::error::{Diagnostic, Error, Result};
use crate::load::{Load, TimeProfile};
use crate::mesh::{Mesh, SurfacePatch};
use crate::sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A thermal boundary condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    /// Prescribed temperature (Dirichlet).
    Temperature {
        nodes: Vec<usize>,
        value: f64,
        profile: TimeProfile,
    },
    /// Prescribed heat flux into the body, W/m² (Neumann).
    HeatFlux {
        patches: Vec<SurfacePatch>,
        flux: f64,
        profile: TimeProfile,
    },
    /// Convective exchange h·(T∞ − T).
    Convection {
        patches: Vec<SurfacePatch>,
        film_coefficient: f64,
        ambient: f64,
        profile: TimeProfile,
    },
    /// Linearised radiative exchange εσ·(T∞⁴ − T⁴).
    Radiation {
        patches: Vec<SurfacePatch>,
        emissivity: f64,
        ambient: f64,
        profile: TimeProfile,
    },
}

impl BoundaryCondition {
    /// Constant prescribed temperature on `nodes`.
    pub fn temperature(nodes: Vec<usize>, value: f64) -> Self {
        BoundaryCondition::Temperature {
            nodes,
            value,
            profile: TimeProfile::Constant,
        }
    }

    /// Constant heat flux through `patches`.
    pub fn heat_flux(patches: Vec<SurfacePatch>, flux: f64) -> Self {
        BoundaryCondition::HeatFlux {
            patches,
            flux,
            profile: TimeProfile::Constant,
        }
    }

    /// Convection to a constant ambient temperature.
    pub fn convection(patches: Vec<SurfacePatch>, film_coefficient: f64, ambient: f64) -> Self {
        BoundaryCondition::Convection {
            patches,
            film_coefficient,
            ambient,
            profile: TimeProfile::Constant,
        }
    }

    /// Radiation to a constant ambient temperature (kelvin).
    pub fn radiation(patches: Vec<SurfacePatch>, emissivity: f64, ambient: f64) -> Self {
        BoundaryCondition::Radiation {
            patches,
            emissivity,
            ambient,
            profile: TimeProfile::Constant,
        }
    }

    /// Replace the time profile.
    pub fn with_profile(mut self, new_profile: TimeProfile) -> Self {
        match &mut self {
            BoundaryCondition::Temperature { profile, .. }
            | BoundaryCondition::HeatFlux { profile, .. }
            | BoundaryCondition::Convection { profile, .. }
            | BoundaryCondition::Radiation { profile, .. } => *profile = new_profile,
        }
        self
    }
}

#[derive(Debug, Clone)]
struct Prescribed {
    node: usize,
    value: f64,
    profile: TimeProfile,
}

/// Resolved temperature constraints, one per node, sorted by node.
#[derive(Debug, Clone, Default)]
pub struct DirichletSet {
    entries: Vec<Prescribed>,
}

impl DirichletSet {
    /// Resolve every `Temperature` condition against a mesh.
    ///
    /// A node constrained twice keeps the later condition; differing values
    /// at `start_time` produce a `BcConflict` diagnostic. Flux conditions
    /// touching a constrained node produce one `DirichletOverridesFlux`
    /// diagnostic per node.
    pub fn resolve(
        mesh: &Mesh,
        bcs: &[BoundaryCondition],
        start_time: f64,
    ) -> Result<(Self, Vec<Diagnostic>)> {
        let mut by_node: BTreeMap<usize, Prescribed> = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for bc in bcs {
            if let BoundaryCondition::Temperature { nodes, value, profile } = bc {
                if !value.is_finite() {
                    return Err(Error::SettingsInvalid(format!(
                        "prescribed temperature must be finite, got {}",
                        value
                    )));
                }
                for &node in nodes {
                    if node >= mesh.n_nodes() {
                        return Err(Error::MeshInvalid(format!(
                            "Temperature condition on node {} (mesh has {} nodes)",
                            node,
                            mesh.n_nodes()
                        )));
                    }
                    let entry = Prescribed {
                        node,
                        value: *value,
                        profile: profile.clone(),
                    };
                    if let Some(previous) = by_node.insert(node, entry) {
                        let discarded = previous.value * previous.profile.value(start_time);
                        let kept = value * profile.value(start_time);
                        if discarded != kept {
                            diagnostics.push(Diagnostic::BcConflict {
                                node,
                                kept,
                                discarded,
                            });
                        }
                    }
                }
            }
        }

        let set = Self {
            entries: by_node.into_values().collect(),
        };

        let mut reported = vec![false; mesh.n_nodes()];
        for bc in bcs {
            if let BoundaryCondition::HeatFlux { patches, .. } = bc {
                for patch in patches {
                    for node in mesh.resolve_patch(patch)?.nodes {
                        if set.contains(node) && !reported[node] {
                            reported[node] = true;
                            diagnostics.push(Diagnostic::DirichletOverridesFlux { node });
                        }
                    }
                }
            }
        }

        Ok((set, diagnostics))
    }

    /// Constrain a single node to a constant value.
    pub(crate) fn pin(&mut self, node: usize, value: f64) {
        match self.entries.binary_search_by_key(&node, |p| p.node) {
            Ok(i) => self.entries[i].value = value,
            Err(i) => self.entries.insert(
                i,
                Prescribed {
                    node,
                    value,
                    profile: TimeProfile::Constant,
                },
            ),
        }
    }

    /// Whether `node` has a prescribed temperature.
    pub fn contains(&self, node: usize) -> bool {
        self.entries.binary_search_by_key(&node, |p| p.node).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Constrained nodes in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|p| p.node)
    }

    /// (node, temperature) pairs at time `t`.
    pub fn values(&self, t: f64) -> Vec<(usize, f64)> {
        self.entries
            .iter()
            .map(|p| (p.node, p.value * p.profile.value(t)))
            .collect()
    }
}

/// Impose prescribed temperatures on A·x = b in place.
///
/// Constrained rows and columns are zeroed with a unit diagonal, the column
/// contributions move to the right-hand side and b[i] = T̄ᵢ. Symmetry is
/// preserved and applying the same constraints twice changes nothing.
pub fn apply_dirichlet(a: &mut CsrMatrix, rhs: &mut [f64], fixed: &[(usize, f64)]) -> Result<()> {
    let n = a.nrows();
    if rhs.len() != n {
        return Err(Error::Solver(format!(
            "RHS size mismatch: {} for a {}x{} matrix",
            rhs.len(),
            n,
            a.ncols()
        )));
    }

    let mut prescribed: Vec<Option<f64>> = vec![None; n];
    for &(node, value) in fixed {
        if node >= n {
            return Err(Error::MeshInvalid(format!(
                "Constrained node {} out of range ({} equations)",
                node, n
            )));
        }
        prescribed[node] = Some(value);
    }

    for (r, mut row) in a.row_iter_mut().enumerate() {
        let (cols, vals) = row.cols_and_values_mut();
        let mut has_diagonal = false;
        for (&c, v) in cols.iter().zip(vals.iter_mut()) {
            if c == r {
                if prescribed[r].is_some() {
                    *v = 1.0;
                    has_diagonal = true;
                }
                continue;
            }
            match (prescribed[r], prescribed[c]) {
                (None, Some(vc)) => {
                    rhs[r] -= *v * vc;
                    *v = 0.0;
                }
                (Some(_), _) => *v = 0.0,
                (None, None) => {}
            }
        }
        if let Some(value) = prescribed[r] {
            if !has_diagonal {
                return Err(Error::Singular(format!(
                    "Constrained row {} has no diagonal entry",
                    r
                )));
            }
            rhs[r] = value;
        }
    }
    Ok(())
}

/// Surface exchange law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ExchangeKind {
    Convection { film_coefficient: f64 },
    Radiation { emissivity: f64 },
}

/// Convective or radiative exchange over a set of patches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfaceExchange<'a> {
    pub patches: &'a [SurfacePatch],
    pub kind: ExchangeKind,
    pub ambient: f64,
    pub profile: &'a TimeProfile,
}

impl SurfaceExchange<'_> {
    pub fn is_radiative(&self) -> bool {
        matches!(self.kind, ExchangeKind::Radiation { .. })
    }
}

/// Prescribed flux over a set of patches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfaceFlux<'a> {
    pub patches: &'a [SurfacePatch],
    pub flux: f64,
    pub profile: &'a TimeProfile,
}

/// Gather exchange terms from conditions and loads, conditions first.
pub(crate) fn surface_exchanges<'a>(
    bcs: &'a [BoundaryCondition],
    loads: &'a [Load],
) -> Result<Vec<SurfaceExchange<'a>>> {
    let mut out = Vec::new();
    let convection = |film_coefficient: &f64| ExchangeKind::Convection {
        film_coefficient: *film_coefficient,
    };
    let radiation = |emissivity: &f64| ExchangeKind::Radiation {
        emissivity: *emissivity,
    };
    let from_bcs = bcs.iter().filter_map(|bc| match bc {
        BoundaryCondition::Convection {
            patches,
            film_coefficient,
            ambient,
            profile,
        } => Some((patches, convection(film_coefficient), *ambient, profile)),
        BoundaryCondition::Radiation {
            patches,
            emissivity,
            ambient,
            profile,
        } => Some((patches, radiation(emissivity), *ambient, profile)),
        _ => None,
    });
    let from_loads = loads.iter().filter_map(|load| match load {
        Load::Convective {
            patches,
            film_coefficient,
            ambient,
            profile,
        } => Some((patches, convection(film_coefficient), *ambient, profile)),
        Load::Radiative {
            patches,
            emissivity,
            ambient,
            profile,
        } => Some((patches, radiation(emissivity), *ambient, profile)),
        _ => None,
    });

    for (patches, kind, ambient, profile) in from_bcs.chain(from_loads) {
        match kind {
            ExchangeKind::Convection { film_coefficient } => {
                if !(film_coefficient >= 0.0 && film_coefficient.is_finite()) {
                    return Err(Error::SettingsInvalid(format!(
                        "film coefficient must be non-negative, got {}",
                        film_coefficient
                    )));
                }
            }
            ExchangeKind::Radiation { emissivity } => {
                if !(0.0..=1.0).contains(&emissivity) {
                    return Err(Error::SettingsInvalid(format!(
                        "emissivity must lie in [0, 1], got {}",
                        emissivity
                    )));
                }
            }
        }
        if !ambient.is_finite() {
            return Err(Error::SettingsInvalid("ambient temperature must be finite".into()));
        }
        out.push(SurfaceExchange {
            patches: patches.as_slice(),
            kind,
            ambient,
            profile,
        });
    }
    Ok(out)
}

/// Gather prescribed fluxes from conditions and loads.
pub(crate) fn surface_fluxes<'a>(
    bcs: &'a [BoundaryCondition],
    loads: &'a [Load],
) -> Vec<SurfaceFlux<'a>> {
    let from_bcs = bcs.iter().filter_map(|bc| match bc {
        BoundaryCondition::HeatFlux { patches, flux, profile } => Some(SurfaceFlux {
            patches,
            flux: *flux,
            profile,
        }),
        _ => None,
    });
    let from_loads = loads.iter().filter_map(|load| match load {
        Load::Surface { patches, flux, profile } => Some(SurfaceFlux {
            patches,
            flux: *flux,
            profile,
        }),
        _ => None,
    });
    from_bcs.chain(from_loads).collect()
}

/// Anchor a system that has no prescribed temperature and no exchange.
///
/// Pins `node` at `ambient` and returns the diagnostic when the net load
/// `f` is balanced, `Singular` otherwise (the steady problem has no
/// solution).
pub(crate) fn anchor_floating(
    dirichlet: &mut DirichletSet,
    f: &[f64],
    node: usize,
    ambient: f64,
) -> Result<Diagnostic> {
    let net: f64 = f.iter().sum();
    let gross: f64 = f.iter().map(|v| v.abs()).sum();
    if net.abs() > 1e-12 * gross.max(1.0) {
        return Err(Error::Singular(format!(
            "No temperature constraint or surface exchange and \
             net heat input {:e} W is not zero",
            net
        )));
    }
    dirichlet.pin(node, ambient);
    Ok(Diagnostic::FloatingSystem {
        pinned_node: node,
        temperature: ambient,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::sparse::{asymmetry, TripletMatrix};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn bar(n: usize) -> Mesh {
        Mesh::line(1.0, n, Material::steel(), 1.0).unwrap()
    }

    fn laplacian(n: usize) -> CsrMatrix {
        let mut triplet = TripletMatrix::new(n, n);
        for i in 0..n {
            triplet.add(i, i, 2.0);
            if i + 1 < n {
                triplet.add(i, i + 1, -1.0);
                triplet.add(i + 1, i, -1.0);
            }
        }
        triplet.to_csr().unwrap()
    }

    #[test]
    fn test_later_condition_wins() {
        let mesh = bar(2);
        let bcs = vec![
            BoundaryCondition::temperature(vec![0], 50.0),
            BoundaryCondition::temperature(vec![0, 2], 80.0),
        ];
        let (set, diagnostics) = DirichletSet::resolve(&mesh, &bcs, 0.0).unwrap();
        assert_eq!(set.values(0.0), vec![(0, 80.0), (2, 80.0)]);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::BcConflict {
                node: 0,
                kept: 80.0,
                discarded: 50.0
            }]
        );
    }

    #[test]
    fn test_identical_repeat_is_not_a_conflict() {
        let mesh = bar(2);
        let bcs = vec![
            BoundaryCondition::temperature(vec![1], 10.0),
            BoundaryCondition::temperature(vec![1], 10.0),
        ];
        let (set, diagnostics) = DirichletSet::resolve(&mesh, &bcs, 0.0).unwrap();
        assert_eq!(set.len(), 1);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_out_of_range_node() {
        let mesh = bar(2);
        let bcs = vec![BoundaryCondition::temperature(vec![9], 1.0)];
        assert!(matches!(
            DirichletSet::resolve(&mesh, &bcs, 0.0),
            Err(Error::MeshInvalid(_))
        ));
    }

    #[test]
    fn test_flux_on_constrained_node() {
        let mesh = bar(2);
        let bcs = vec![
            BoundaryCondition::temperature(vec![2], 1.0),
            BoundaryCondition::heat_flux(vec![SurfacePatch::side(1, 1)], 100.0),
            BoundaryCondition::heat_flux(vec![SurfacePatch::side(1, 1)], 50.0),
        ];
        let (_, diagnostics) = DirichletSet::resolve(&mesh, &bcs, 0.0).unwrap();
        assert_eq!(diagnostics, vec![Diagnostic::DirichletOverridesFlux { node: 2 }]);
    }

    #[test]
    fn test_profiled_values() {
        let mesh = bar(1);
        let bcs = vec![BoundaryCondition::temperature(vec![1], 100.0)
            .with_profile(TimeProfile::Ramp { start: 0.0, end: 10.0 })];
        let (set, _) = DirichletSet::resolve(&mesh, &bcs, 0.0).unwrap();
        assert_eq!(set.values(5.0), vec![(1, 50.0)]);
    }

    #[test]
    fn test_apply_dirichlet() {
        let mut a = laplacian(3);
        let mut rhs = vec![0.0, 1.0, 0.0];
        apply_dirichlet(&mut a, &mut rhs, &[(0, 10.0)]).unwrap();

        let dense = DMatrix::from(&a);
        assert_relative_eq!(dense[(0, 0)], 1.0);
        assert_relative_eq!(dense[(0, 1)], 0.0);
        assert_relative_eq!(dense[(1, 0)], 0.0);
        assert_relative_eq!(dense[(1, 1)], 2.0);
        assert_eq!(rhs, vec![10.0, 11.0, 0.0]);
        assert_eq!(asymmetry(&a).unwrap(), 0.0);
    }

    #[test]
    fn test_apply_dirichlet_idempotent() {
        let mut a = laplacian(4);
        let mut rhs = vec![1.0, 2.0, 3.0, 4.0];
        let fixed = [(0, 5.0), (3, -1.0)];
        apply_dirichlet(&mut a, &mut rhs, &fixed).unwrap();
        let (a1, rhs1) = (a.clone(), rhs.clone());
        apply_dirichlet(&mut a, &mut rhs, &fixed).unwrap();
        assert_eq!(a, a1);
        assert_eq!(rhs, rhs1);
    }

    #[test]
    fn test_missing_diagonal_is_singular() {
        let mut triplet = TripletMatrix::new(2, 2);
        triplet.add(0, 1, 1.0);
        triplet.add(1, 0, 1.0);
        let mut a = triplet.to_csr().unwrap();
        let mut rhs = vec![0.0, 0.0];
        assert!(matches!(
            apply_dirichlet(&mut a, &mut rhs, &[(0, 1.0)]),
            Err(Error::Singular(_))
        ));
    }

    #[test]
    fn test_exchange_sources_share_path() {
        let patches = vec![SurfacePatch::side(0, 0)];
        let bcs = vec![BoundaryCondition::convection(patches.clone(), 10.0, 20.0)];
        let loads = vec![Load::radiative(patches.clone(), 0.8, 300.0), Load::point(0, 1.0)];
        let exchanges = surface_exchanges(&bcs, &loads).unwrap();
        assert_eq!(exchanges.len(), 2);
        assert!(!exchanges[0].is_radiative());
        assert!(exchanges[1].is_radiative());

        let bad = vec![BoundaryCondition::radiation(patches, 1.5, 300.0)];
        assert!(surface_exchanges(&bad, &[]).is_err());
    }

    #[test]
    fn test_floating_anchor() {
        let mut set = DirichletSet::default();
        let diagnostic = anchor_floating(&mut set, &[1.0, -1.0, 0.0], 1, 20.0).unwrap();
        assert_eq!(
            diagnostic,
            Diagnostic::FloatingSystem {
                pinned_node: 1,
                temperature: 20.0
            }
        );
        assert_eq!(set.values(0.0), vec![(1, 20.0)]);

        let mut set = DirichletSet::default();
        assert!(matches!(
            anchor_floating(&mut set, &[1.0, 0.0], 0, 20.0),
            Err(Error::Singular(_))
        ));
    }
}

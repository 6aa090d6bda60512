//! Gradient and heat flux recovery.

use crate::element::kernel;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::sparse::{spmv, CsrMatrix};
use crate::types::ConductivityMatrix;
use rayon::prelude::*;

/// Per-element gradient and flux triples for a nodal temperature field.
///
/// Returns `(gradients, fluxes)`, each of length 3·E. The gradient is
/// averaged over the element's conductivity quadrature rule and the flux is
/// q = −D·∇T. Degenerate elements report zeros.
pub fn element_fields(mesh: &Mesh, temperatures: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if temperatures.len() != mesh.n_nodes() {
        return Err(Error::MeshInvalid(format!(
            "{} temperatures for {} nodes",
            temperatures.len(),
            mesh.n_nodes()
        )));
    }

    let per_element: Vec<([f64; 3], [f64; 3])> = mesh
        .elements()
        .par_iter()
        .enumerate()
        .map(|(idx, conn)| {
            let coords = mesh.element_coords(idx).unwrap_or_default();
            let local: Vec<f64> = conn.nodes.iter().map(|&n| temperatures[n]).collect();
            match kernel::gradient(conn.element_type.shape(), &coords, &local) {
                Ok(g) => {
                    let d = mesh
                        .material(conn.material)
                        .map(|m| m.conductivity_tensor())
                        .unwrap_or_else(ConductivityMatrix::zeros);
                    let q = -(d * g);
                    ([g.x, g.y, g.z], [q.x, q.y, q.z])
                }
                Err(_) => ([0.0; 3], [0.0; 3]),
            }
        })
        .collect();

    let mut gradients = Vec::with_capacity(3 * per_element.len());
    let mut fluxes = Vec::with_capacity(3 * per_element.len());
    for (g, q) in per_element {
        gradients.extend_from_slice(&g);
        fluxes.extend_from_slice(&q);
    }
    Ok((gradients, fluxes))
}

/// Nodal heat reactions R = A·T − F.
///
/// `a` and `f` are the unconstrained operator and load. Rows of free nodes
/// are zero up to solver tolerance; rows of prescribed nodes give the heat
/// (W) the constraint injects into the body, negative when heat leaves.
pub fn heat_reactions(a: &CsrMatrix, temperatures: &[f64], f: &[f64]) -> Vec<f64> {
    spmv(a, temperatures)
        .into_iter()
        .zip(f)
        .map(|(at, fi)| at - fi)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Conductivity, Material};
    use crate::mesh::{ElementType, SolidKind};
    use crate::sparse::TripletMatrix;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_linear_field_recovery() {
        // T = 3x − 2y + z on an orthotropic cube
        let material =
            Material::with_conductivity(Conductivity::Orthotropic([1.0, 2.0, 4.0]), 1.0, 1.0)
                .unwrap();
        for solid in [SolidKind::Hex8, SolidKind::Tet4] {
            let mesh = Mesh::cuboid(1.0, 1.0, 1.0, 2, 2, 2, material.clone(), solid).unwrap();
            let temps: Vec<f64> = mesh
                .nodes()
                .iter()
                .map(|p| 3.0 * p.x - 2.0 * p.y + p.z)
                .collect();
            let (g, q) = element_fields(&mesh, &temps).unwrap();
            assert_eq!(g.len(), 3 * mesh.n_elements());
            for e in 0..mesh.n_elements() {
                assert_relative_eq!(g[3 * e], 3.0, epsilon = 1e-10);
                assert_relative_eq!(g[3 * e + 1], -2.0, epsilon = 1e-10);
                assert_relative_eq!(g[3 * e + 2], 1.0, epsilon = 1e-10);
                assert_relative_eq!(q[3 * e], -3.0, epsilon = 1e-10);
                assert_relative_eq!(q[3 * e + 1], 4.0, epsilon = 1e-10);
                assert_relative_eq!(q[3 * e + 2], -4.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_degenerate_element_reports_zero() {
        let mut mesh = Mesh::new();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]] {
            mesh.add_node(Vector3::new(p[0], p[1], p[2]));
        }
        mesh.add_material(Material::steel());
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0).unwrap();
        let (g, q) = element_fields(&mesh, &[0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(g, vec![0.0; 3]);
        assert_eq!(q, vec![0.0; 3]);
        assert!(element_fields(&mesh, &[0.0]).is_err());
    }

    #[test]
    fn test_heat_reactions() {
        let mut triplet = TripletMatrix::new(2, 2);
        triplet.add(0, 0, 1.0);
        triplet.add(0, 1, -1.0);
        triplet.add(1, 0, -1.0);
        triplet.add(1, 1, 1.0);
        let k = triplet.to_csr().unwrap();
        let r = heat_reactions(&k, &[0.0, 5.0], &[0.0, 5.0]);
        assert_eq!(r, vec![-5.0, 0.0]);
    }
}

//! Element integrals for heat conduction.
//!
//! All functions are pure: they take a [`Shape`], the nodal coordinates and
//! the relevant property, and integrate with the shape's quadrature rule.
//! The `section` factor scales the measure: cross-section area for bars,
//! thickness for 2D elements and their edges, 1 for solids.

use super::{map_point, DegenerateJacobian, Rule, Shape};
use crate::material::Material;
use crate::settings::MassLumping;
use crate::types::{ConductivityMatrix, Point3, Vec3};
use nalgebra::{DMatrix, DVector};

/// Kernel result: the integral or the determinant that stopped it.
pub type KernelResult<T> = std::result::Result<T, DegenerateJacobian>;

/// Element conductivity matrix Kₑ = Σ Bᵀ D B detJ w · section.
pub fn conductivity_matrix(
    shape: Shape,
    coords: &[Point3],
    conductivity: &ConductivityMatrix,
    section: f64,
) -> KernelResult<DMatrix<f64>> {
    let n = shape.n_nodes();
    let d = DMatrix::from_column_slice(3, 3, conductivity.as_slice());
    let mut ke = DMatrix::zeros(n, n);

    for gp in shape.quadrature(Rule::Conductivity) {
        let m = map_point(shape, coords, gp.natural)?;
        let db = &d * &m.b;
        ke += m.b.transpose() * db * (m.det_j * gp.weight * section);
    }

    // Remove round-off asymmetry
    Ok((&ke + ke.transpose()) * 0.5)
}

/// Element capacity matrix Cₑ = Σ ρcₚ N Nᵀ detJ w · section.
///
/// With [`MassLumping::Lumped`] the row sums are collapsed onto the
/// diagonal. Shapes whose consistent rows do not all sum to a positive value
/// (Tet10 corner nodes) are lumped by diagonal scaling instead, which keeps
/// the total capacity and every diagonal positive.
pub fn capacity_matrix(
    shape: Shape,
    coords: &[Point3],
    rho_cp: f64,
    section: f64,
    lumping: MassLumping,
) -> KernelResult<DMatrix<f64>> {
    let n = shape.n_nodes();
    let mut ce = DMatrix::zeros(n, n);

    for gp in shape.quadrature(Rule::Capacity) {
        let m = map_point(shape, coords, gp.natural)?;
        ce += &m.n * m.n.transpose() * (rho_cp * m.det_j * gp.weight * section);
    }

    if lumping == MassLumping::Consistent {
        return Ok(ce);
    }

    let row_sums: Vec<f64> = (0..n).map(|i| ce.row(i).sum()).collect();
    if row_sums.iter().all(|&s| s > 0.0) {
        return Ok(DMatrix::from_diagonal(&DVector::from_vec(row_sums)));
    }

    let total: f64 = row_sums.iter().sum();
    let diagonal_total: f64 = ce.diagonal().sum();
    let scale = total / diagonal_total;
    Ok(DMatrix::from_diagonal(&(ce.diagonal() * scale)))
}

/// Element load vector for a volumetric source: fₑ = Σ s N detJ w · section.
pub fn source_vector(
    shape: Shape,
    coords: &[Point3],
    power_density: f64,
    section: f64,
) -> KernelResult<DVector<f64>> {
    let mut fe = DVector::zeros(shape.n_nodes());
    for gp in shape.quadrature(Rule::Capacity) {
        let m = map_point(shape, coords, gp.natural)?;
        fe += &m.n * (power_density * m.det_j * gp.weight * section);
    }
    Ok(fe)
}

/// Facet integrals ∫ a N Nᵀ dA and ∫ f N dA.
///
/// `coefficients` receives the value of `field` interpolated at each
/// quadrature point (0 when `field` is empty) and returns the pair (a, f).
/// Heat flux uses (0, q), convection (h, h T∞), linearised radiation
/// (4εσT̂³, εσ(3T̂⁴ + T∞⁴)).
pub fn facet_integrals<F>(
    shape: Shape,
    coords: &[Point3],
    scale: f64,
    field: &[f64],
    coefficients: F,
) -> KernelResult<(DMatrix<f64>, DVector<f64>)>
where
    F: Fn(f64) -> (f64, f64),
{
    let n = shape.n_nodes();
    let mut ke = DMatrix::zeros(n, n);
    let mut fe = DVector::zeros(n);

    for gp in shape.quadrature(Rule::Capacity) {
        let m = map_point(shape, coords, gp.natural)?;
        let value = if field.is_empty() {
            0.0
        } else {
            m.n.iter().zip(field).map(|(ni, ti)| ni * ti).sum::<f64>()
        };
        let (a, f) = coefficients(value);
        let dw = m.det_j * gp.weight * scale;
        if a != 0.0 {
            ke += &m.n * m.n.transpose() * (a * dw);
        }
        fe += &m.n * (f * dw);
    }
    Ok((ke, fe))
}

/// Temperature gradient ∇T averaged over the conductivity rule.
///
/// For linear simplices this is the constant element gradient.
pub fn gradient(shape: Shape, coords: &[Point3], temperatures: &[f64]) -> KernelResult<Vec3> {
    let t = DVector::from_column_slice(temperatures);
    let mut sum = Vec3::zeros();
    let mut measure = 0.0;

    for gp in shape.quadrature(Rule::Conductivity) {
        let m = map_point(shape, coords, gp.natural)?;
        let g = &m.b * &t;
        let dw = m.det_j * gp.weight;
        sum += Vec3::new(g[0], g[1], g[2]) * dw;
        measure += dw;
    }
    Ok(sum / measure)
}

/// Element size h: the minimum distance between any two of its nodes.
pub fn characteristic_length(coords: &[Point3]) -> f64 {
    let mut h = f64::INFINITY;
    for (i, a) in coords.iter().enumerate() {
        for b in &coords[i + 1..] {
            h = h.min((a - b).norm());
        }
    }
    h
}

/// Explicit stability estimate Δt_crit = h² ρcₚ / (2 k_max).
pub fn critical_time_step(coords: &[Point3], material: &Material) -> f64 {
    let h = characteristic_length(coords);
    h * h * material.volumetric_heat_capacity() / (2.0 * material.conductivity.max_principal())
}

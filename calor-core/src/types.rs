//! Core data types for thermal FEA.
//!
//! Geometric primitives and the conductivity tensor used throughout calor.

use nalgebra::{Matrix3, Vector3};

/// A point in 3D space.
pub type Point3 = Vector3<f64>;

/// A 3D vector (gradient, heat flux).
pub type Vec3 = Vector3<f64>;

/// Conductivity tensor D mapping a temperature gradient to heat flux: q = −D·∇T.
pub type ConductivityMatrix = Matrix3<f64>;

/// Stefan–Boltzmann constant (W/m²·K⁴).
pub const STEFAN_BOLTZMANN: f64 = 5.670_374_419e-8;

/// Euclidean norm of a flux or gradient triple stored in a flat array.
pub fn triple_norm(values: &[f64], index: usize) -> f64 {
    let v = Vec3::new(values[3 * index], values[3 * index + 1], values[3 * index + 2]);
    v.norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_triple_norm() {
        let flat = [0.0, 0.0, 0.0, 3.0, 4.0, 0.0];
        assert_relative_eq!(triple_norm(&flat, 0), 0.0);
        assert_relative_eq!(triple_norm(&flat, 1), 5.0, epsilon = 1e-14);
    }
}

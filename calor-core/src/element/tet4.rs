//! 4-node tetrahedron (Tet4) shape functions.
//!
//! Linear shape functions in terms of natural coordinates (ξ, η, ζ):
//! ```text
//! N1 = 1 - ξ - η - ζ,  N2 = ξ,  N3 = η,  N4 = ζ
//! ```
//! The gradient is constant, so a single integration point at the centroid
//! integrates the conductivity matrix exactly.

/// Local node indices of the four triangular faces (side i is opposite node 3 - i).
pub static FACES: [[usize; 3]; 4] = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];

/// 4-node tetrahedral shape-function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tet4;

impl Tet4 {
    /// Shape functions at (ξ, η, ζ).
    pub fn shape_functions(xi: f64, eta: f64, zeta: f64) -> [f64; 4] {
        [1.0 - xi - eta - zeta, xi, eta, zeta]
    }

    /// Shape function derivatives (constant).
    pub fn shape_derivatives() -> [[f64; 4]; 3] {
        [
            [-1.0, 1.0, 0.0, 0.0],
            [-1.0, 0.0, 1.0, 0.0],
            [-1.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Natural coordinates of node `i`.
    pub fn node_natural(i: usize) -> [f64; 3] {
        [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ][i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tet4_kronecker_delta() {
        for i in 0..4 {
            let [xi, eta, zeta] = Tet4::node_natural(i);
            let n = Tet4::shape_functions(xi, eta, zeta);
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(n[j], expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_tet4_partition_of_unity() {
        let n = Tet4::shape_functions(0.1, 0.2, 0.3);
        assert_relative_eq!(n.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_tet4_faces_exclude_opposite_node() {
        for (side, face) in FACES.iter().enumerate() {
            assert!(!face.contains(&(3 - side)));
        }
    }
}

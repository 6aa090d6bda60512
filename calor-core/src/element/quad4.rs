//! 4-node quadrilateral (Quad4) shape functions.
//!
//! Bilinear quadrilateral on (ξ, η) ∈ [-1, 1]² with 2×2 Gauss integration.
//! Used for in-plane conduction (section value = thickness) and as the face
//! facet of Hex8 elements.
//!
//! ```text
//!   3 ------- 2
//!   |         |
//!   |         |
//!   0 ------- 1
//! ```

const XI: [f64; 4] = [-1.0, 1.0, 1.0, -1.0];
const ETA: [f64; 4] = [-1.0, -1.0, 1.0, 1.0];

/// Local node indices of the four edges.
pub static EDGES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];

/// 4-node quadrilateral shape-function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad4;

impl Quad4 {
    /// Shape functions at (ξ, η).
    pub fn shape_functions(xi: f64, eta: f64) -> [f64; 4] {
        let mut n = [0.0; 4];
        for i in 0..4 {
            n[i] = 0.25 * (1.0 + XI[i] * xi) * (1.0 + ETA[i] * eta);
        }
        n
    }

    /// dN/dξ and dN/dη.
    pub fn shape_derivatives(xi: f64, eta: f64) -> [[f64; 4]; 2] {
        let mut dn = [[0.0; 4]; 2];
        for i in 0..4 {
            dn[0][i] = 0.25 * XI[i] * (1.0 + ETA[i] * eta);
            dn[1][i] = 0.25 * (1.0 + XI[i] * xi) * ETA[i];
        }
        dn
    }

    /// Natural coordinates of node `i`.
    pub fn node_natural(i: usize) -> [f64; 3] {
        [XI[i], ETA[i], 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quad4_kronecker_delta() {
        for i in 0..4 {
            let n = Quad4::shape_functions(XI[i], ETA[i]);
            for j in 0..4 {
                assert_relative_eq!(n[j], if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_quad4_derivatives_sum_to_zero() {
        let dn = Quad4::shape_derivatives(0.3, -0.6);
        for row in &dn {
            assert_relative_eq!(row.iter().sum::<f64>(), 0.0, epsilon = 1e-15);
        }
    }
}

//! 10-node tetrahedron (Tet10) shape functions.
//!
//! Quadratic tetrahedron with 4-point integration of the conductivity matrix
//! and the 14-point rule for the capacity matrix.
//!
//! # Shape Functions
//!
//! In barycentric coordinates (L1, L2, L3, L4) with L1 = 1 - ξ - η - ζ,
//! L2 = ξ, L3 = η, L4 = ζ:
//! - Corner nodes (1-4): N_i = L_i * (2*L_i - 1)
//! - Midside nodes (5-10): N_ij = 4 * L_i * L_j
//!
//! # Node Numbering
//!
//! ```text
//! Vertices:
//!   Node 1: (1, 0, 0, 0)
//!   Node 2: (0, 1, 0, 0)
//!   Node 3: (0, 0, 1, 0)
//!   Node 4: (0, 0, 0, 1)
//!
//! Edge midpoints:
//!   Node 5: edge 1-2    Node 8:  edge 1-4
//!   Node 6: edge 2-3    Node 9:  edge 2-4
//!   Node 7: edge 1-3    Node 10: edge 3-4
//! ```

/// Corner pairs of the six midside nodes (0-based).
const EDGES: [(usize, usize); 6] = [(0, 1), (1, 2), (0, 2), (0, 3), (1, 3), (2, 3)];

/// Local node indices of the four Tri6 faces: corners, then the midside
/// nodes of edges (a-b, b-c, c-a). Side order matches [`super::tet4::FACES`].
pub static FACES: [[usize; 6]; 4] = [
    [0, 2, 1, 6, 5, 4],
    [0, 1, 3, 4, 8, 7],
    [0, 3, 2, 7, 9, 6],
    [1, 2, 3, 5, 9, 8],
];

/// 10-node tetrahedral shape-function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tet10;

impl Tet10 {
    fn barycentric(xi: f64, eta: f64, zeta: f64) -> [f64; 4] {
        [1.0 - xi - eta - zeta, xi, eta, zeta]
    }

    /// Shape functions at (ξ, η, ζ).
    pub fn shape_functions(xi: f64, eta: f64, zeta: f64) -> [f64; 10] {
        let l = Self::barycentric(xi, eta, zeta);
        let mut n = [0.0; 10];
        for i in 0..4 {
            n[i] = l[i] * (2.0 * l[i] - 1.0);
        }
        for (k, &(a, b)) in EDGES.iter().enumerate() {
            n[4 + k] = 4.0 * l[a] * l[b];
        }
        n
    }

    /// Shape function derivatives with respect to (ξ, η, ζ).
    ///
    /// Computed from dN/dL by the chain rule with dL1/dξ_k = -1 and
    /// dL_{k+1}/dξ_k = 1.
    pub fn shape_derivatives(xi: f64, eta: f64, zeta: f64) -> [[f64; 10]; 3] {
        let l = Self::barycentric(xi, eta, zeta);

        // dN/dL_j for each barycentric coordinate j
        let mut dn_dl = [[0.0; 10]; 4];
        for i in 0..4 {
            dn_dl[i][i] = 4.0 * l[i] - 1.0;
        }
        for (k, &(a, b)) in EDGES.iter().enumerate() {
            dn_dl[a][4 + k] = 4.0 * l[b];
            dn_dl[b][4 + k] = 4.0 * l[a];
        }

        let mut dn = [[0.0; 10]; 3];
        for d in 0..3 {
            for i in 0..10 {
                dn[d][i] = dn_dl[d + 1][i] - dn_dl[0][i];
            }
        }
        dn
    }

    /// Natural coordinates of node `i`.
    pub fn node_natural(i: usize) -> [f64; 3] {
        let corners = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        if i < 4 {
            corners[i]
        } else {
            let (a, b) = EDGES[i - 4];
            [
                0.5 * (corners[a][0] + corners[b][0]),
                0.5 * (corners[a][1] + corners[b][1]),
                0.5 * (corners[a][2] + corners[b][2]),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tet10_kronecker_delta() {
        for i in 0..10 {
            let [xi, eta, zeta] = Tet10::node_natural(i);
            let n = Tet10::shape_functions(xi, eta, zeta);
            for j in 0..10 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(n[j], expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_tet10_derivatives_match_finite_difference() {
        let (xi, eta, zeta) = (0.2, 0.15, 0.3);
        let h = 1e-6;
        let dn = Tet10::shape_derivatives(xi, eta, zeta);
        let base = [xi, eta, zeta];
        for d in 0..3 {
            let mut plus = base;
            let mut minus = base;
            plus[d] += h;
            minus[d] -= h;
            let np = Tet10::shape_functions(plus[0], plus[1], plus[2]);
            let nm = Tet10::shape_functions(minus[0], minus[1], minus[2]);
            for i in 0..10 {
                assert_relative_eq!(dn[d][i], (np[i] - nm[i]) / (2.0 * h), epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_tet10_faces_midsides_lie_on_face() {
        for face in &FACES {
            for k in 0..3 {
                let a = Tet10::node_natural(face[k]);
                let b = Tet10::node_natural(face[(k + 1) % 3]);
                let m = Tet10::node_natural(face[3 + k]);
                for d in 0..3 {
                    assert_relative_eq!(m[d], 0.5 * (a[d] + b[d]), epsilon = 1e-14);
                }
            }
        }
    }
}

//! 6-node triangle (Tri6) shape functions.
//!
//! Quadratic triangle used as the face facet of Tet10 elements. Nodes are the
//! corners a, b, c followed by the midside nodes of edges a-b, b-c, c-a.

/// 6-node triangle shape-function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tri6;

impl Tri6 {
    /// Shape functions at (ξ, η).
    pub fn shape_functions(xi: f64, eta: f64) -> [f64; 6] {
        let l = [1.0 - xi - eta, xi, eta];
        [
            l[0] * (2.0 * l[0] - 1.0),
            l[1] * (2.0 * l[1] - 1.0),
            l[2] * (2.0 * l[2] - 1.0),
            4.0 * l[0] * l[1],
            4.0 * l[1] * l[2],
            4.0 * l[2] * l[0],
        ]
    }

    /// dN/dξ and dN/dη.
    pub fn shape_derivatives(xi: f64, eta: f64) -> [[f64; 6]; 2] {
        let l0 = 1.0 - xi - eta;
        [
            [
                -(4.0 * l0 - 1.0),
                4.0 * xi - 1.0,
                0.0,
                4.0 * (l0 - xi),
                4.0 * eta,
                -4.0 * eta,
            ],
            [
                -(4.0 * l0 - 1.0),
                0.0,
                4.0 * eta - 1.0,
                -4.0 * xi,
                4.0 * xi,
                4.0 * (l0 - eta),
            ],
        ]
    }

    /// Natural coordinates of node `i`.
    pub fn node_natural(i: usize) -> [f64; 3] {
        [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.0, 0.0],
            [0.5, 0.5, 0.0],
            [0.0, 0.5, 0.0],
        ][i]
    }
}

//! 3-node triangle (Tri3) shape functions.
//!
//! Linear triangle in natural coordinates (ξ, η) on the unit triangle:
//! ```text
//! N1 = 1 - ξ - η,  N2 = ξ,  N3 = η
//!
//!   2
//!   | \
//!   |   \
//!   0 --- 1
//! ```
//! Used for in-plane conduction (section value = thickness) and as the face
//! facet of Tet4 elements.

/// Local node indices of the three edges.
pub static EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

/// 3-node triangle shape-function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tri3;

impl Tri3 {
    /// Shape functions at (ξ, η).
    pub fn shape_functions(xi: f64, eta: f64) -> [f64; 3] {
        [1.0 - xi - eta, xi, eta]
    }

    /// dN/dξ and dN/dη (constant).
    pub fn shape_derivatives() -> [[f64; 3]; 2] {
        [[-1.0, 1.0, 0.0], [-1.0, 0.0, 1.0]]
    }

    /// Natural coordinates of node `i`.
    pub fn node_natural(i: usize) -> [f64; 3] {
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]][i]
    }
}

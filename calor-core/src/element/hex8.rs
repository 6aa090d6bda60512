//! Trilinear brick (Hex8).
//!
//! Node i sits at the corner `CORNERS[i]` of the reference cube [-1, 1]³
//! and N_i = ⅛ (1 + ξ_i ξ)(1 + η_i η)(1 + ζ_i ζ).
//!
//! ```text
//!        7-------6
//!       /|      /|
//!      4-------5 |
//!      | 3-----|-2
//!      |/      |/
//!      0-------1
//! ```
//!
//! Side i is the quadrilateral `FACES[i]`, wound so that its natural normal
//! points out of the brick.

/// Reference corner of each node.
pub const CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Bottom, top, front, right, back, left.
pub static FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [3, 0, 4, 7],
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Hex8;

/// The three linear factors (1 + cᵢ xᵢ) of one node.
#[inline]
fn factors(corner: &[f64; 3], p: [f64; 3]) -> [f64; 3] {
    [
        1.0 + corner[0] * p[0],
        1.0 + corner[1] * p[1],
        1.0 + corner[2] * p[2],
    ]
}

impl Hex8 {
    pub fn shape_functions(xi: f64, eta: f64, zeta: f64) -> [f64; 8] {
        CORNERS.map(|c| {
            let [a, b, d] = factors(&c, [xi, eta, zeta]);
            0.125 * a * b * d
        })
    }

    /// Rows ∂N/∂ξ, ∂N/∂η, ∂N/∂ζ.
    pub fn shape_derivatives(xi: f64, eta: f64, zeta: f64) -> [[f64; 8]; 3] {
        let mut dn = [[0.0; 8]; 3];
        for (node, c) in CORNERS.iter().enumerate() {
            let [a, b, d] = factors(c, [xi, eta, zeta]);
            dn[0][node] = 0.125 * c[0] * b * d;
            dn[1][node] = 0.125 * a * c[1] * d;
            dn[2][node] = 0.125 * a * b * c[2];
        }
        dn
    }

    pub fn node_natural(i: usize) -> [f64; 3] {
        CORNERS[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kronecker_property() {
        for (i, c) in CORNERS.iter().enumerate() {
            let n = Hex8::shape_functions(c[0], c[1], c[2]);
            for (j, &v) in n.iter().enumerate() {
                assert_relative_eq!(v, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_partition_of_unity() {
        for p in [[0.0, 0.0, 0.0], [0.9, -0.4, 0.1], [-1.0, 1.0, 0.5]] {
            let sum: f64 = Hex8::shape_functions(p[0], p[1], p[2]).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);

            for row in Hex8::shape_derivatives(p[0], p[1], p[2]) {
                assert_relative_eq!(row.iter().sum::<f64>(), 0.0, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let p = [0.3, -0.2, 0.7];
        let h = 1e-6;
        let dn = Hex8::shape_derivatives(p[0], p[1], p[2]);
        for axis in 0..3 {
            let mut lo = p;
            let mut hi = p;
            lo[axis] -= h;
            hi[axis] += h;
            let n_lo = Hex8::shape_functions(lo[0], lo[1], lo[2]);
            let n_hi = Hex8::shape_functions(hi[0], hi[1], hi[2]);
            for node in 0..8 {
                let fd = (n_hi[node] - n_lo[node]) / (2.0 * h);
                assert_relative_eq!(dn[axis][node], fd, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_faces_lie_on_cube_sides() {
        let mut count = [0; 8];
        for face in &FACES {
            // All four corners share one fixed natural coordinate
            let fixed = (0..3).any(|axis| {
                let v = CORNERS[face[0]][axis];
                face.iter().all(|&n| CORNERS[n][axis] == v)
            });
            assert!(fixed);
            for &n in face {
                count[n] += 1;
            }
        }
        assert!(count.iter().all(|&c| c == 3));
    }
}

//! 2-node line (Line2) shape functions.
//!
//! Linear bar element on ξ ∈ [-1, 1], used for 1D conduction models where the
//! element section value is the cross-sectional area. Also serves as the edge
//! facet of Tri3 and Quad4 elements.
//!
//! ```text
//! 0 ---------- 1
//! ξ = -1      ξ = +1
//! ```

/// 2-node line shape-function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Line2;

impl Line2 {
    /// Shape functions at ξ.
    pub fn shape_functions(xi: f64) -> [f64; 2] {
        [0.5 * (1.0 - xi), 0.5 * (1.0 + xi)]
    }

    /// dN/dξ (constant).
    pub fn shape_derivatives() -> [[f64; 2]; 1] {
        [[-0.5, 0.5]]
    }

    /// Natural coordinates of node `i`.
    pub fn node_natural(i: usize) -> [f64; 3] {
        [if i == 0 { -1.0 } else { 1.0 }, 0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_line2_interpolation() {
        let n = Line2::shape_functions(0.0);
        assert_relative_eq!(n[0], 0.5);
        assert_relative_eq!(n[1], 0.5);
        let n = Line2::shape_functions(-1.0);
        assert_relative_eq!(n[0], 1.0);
        assert_relative_eq!(n[1], 0.0);
    }
}

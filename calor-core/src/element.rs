//! Element shapes and isoparametric mapping.
//!
//! Every element topology and every boundary facet is described by a
//! [`Shape`]: a tagged variant that dispatches to the topology-specific
//! shape-function tables in the submodules. The element kernel is then a pure
//! function of (shape, nodal positions, quadrature).
//!
//! # Submodules
//!
//! - [`gauss`] - Gauss quadrature rules for numerical integration
//! - [`kernel`] - Element conductivity, capacity and load integrals
//! - [`line2`], [`tri3`], [`tri6`], [`quad4`], [`tet4`], [`tet10`], [`hex8`] -
//!   shape-function tables

use crate::types::Point3;
use nalgebra::{DMatrix, DVector, Matrix3};

pub mod gauss;
pub mod hex8;
pub mod kernel;
pub mod line2;
pub mod quad4;
pub mod tet10;
pub mod tet4;
pub mod tri3;
pub mod tri6;

pub use gauss::{GaussPoint, Legendre, TetRule, TriangleRule};
pub use hex8::Hex8;
pub use line2::Line2;
pub use quad4::Quad4;
pub use tet10::Tet10;
pub use tet4::Tet4;
pub use tri3::Tri3;
pub use tri6::Tri6;

/// Reference shape of an element or boundary facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// End point of a bar.
    Point,
    /// 2-node line.
    Line2,
    /// 3-node triangle.
    Tri3,
    /// 6-node triangle (Tet10 faces only).
    Tri6,
    /// 4-node quadrilateral.
    Quad4,
    /// 4-node tetrahedron.
    Tet4,
    /// 10-node tetrahedron.
    Tet10,
    /// 8-node hexahedron.
    Hex8,
}

/// Which integrand a quadrature rule must be exact for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Bᵀ D B, also used for gradient recovery.
    Conductivity,
    /// N Nᵀ, also used for source and facet integrals.
    Capacity,
}

impl Shape {
    /// Number of nodes.
    pub fn n_nodes(self) -> usize {
        match self {
            Shape::Point => 1,
            Shape::Line2 => 2,
            Shape::Tri3 => 3,
            Shape::Tri6 => 6,
            Shape::Quad4 => 4,
            Shape::Tet4 => 4,
            Shape::Tet10 => 10,
            Shape::Hex8 => 8,
        }
    }

    /// Parametric dimension.
    pub fn dim(self) -> usize {
        match self {
            Shape::Point => 0,
            Shape::Line2 => 1,
            Shape::Tri3 | Shape::Tri6 | Shape::Quad4 => 2,
            Shape::Tet4 | Shape::Tet10 | Shape::Hex8 => 3,
        }
    }

    /// Shape function values N(ξ).
    pub fn shape_functions(self, xi: [f64; 3]) -> DVector<f64> {
        let [x, y, z] = xi;
        match self {
            Shape::Point => DVector::from_element(1, 1.0),
            Shape::Line2 => DVector::from_column_slice(&Line2::shape_functions(x)),
            Shape::Tri3 => DVector::from_column_slice(&Tri3::shape_functions(x, y)),
            Shape::Tri6 => DVector::from_column_slice(&Tri6::shape_functions(x, y)),
            Shape::Quad4 => DVector::from_column_slice(&Quad4::shape_functions(x, y)),
            Shape::Tet4 => DVector::from_column_slice(&Tet4::shape_functions(x, y, z)),
            Shape::Tet10 => DVector::from_column_slice(&Tet10::shape_functions(x, y, z)),
            Shape::Hex8 => DVector::from_column_slice(&Hex8::shape_functions(x, y, z)),
        }
    }

    /// Shape function derivatives ∂N/∂ξ as a (dim × n_nodes) matrix.
    pub fn shape_derivatives(self, xi: [f64; 3]) -> DMatrix<f64> {
        let [x, y, z] = xi;
        match self {
            Shape::Point => DMatrix::zeros(0, 1),
            Shape::Line2 => rows_to_matrix(&Line2::shape_derivatives()),
            Shape::Tri3 => rows_to_matrix(&Tri3::shape_derivatives()),
            Shape::Tri6 => rows_to_matrix(&Tri6::shape_derivatives(x, y)),
            Shape::Quad4 => rows_to_matrix(&Quad4::shape_derivatives(x, y)),
            Shape::Tet4 => rows_to_matrix(&Tet4::shape_derivatives()),
            Shape::Tet10 => rows_to_matrix(&Tet10::shape_derivatives(x, y, z)),
            Shape::Hex8 => rows_to_matrix(&Hex8::shape_derivatives(x, y, z)),
        }
    }

    /// Natural coordinates of node `i`.
    pub fn node_natural(self, i: usize) -> [f64; 3] {
        match self {
            Shape::Point => [0.0; 3],
            Shape::Line2 => Line2::node_natural(i),
            Shape::Tri3 => Tri3::node_natural(i),
            Shape::Tri6 => Tri6::node_natural(i),
            Shape::Quad4 => Quad4::node_natural(i),
            Shape::Tet4 => Tet4::node_natural(i),
            Shape::Tet10 => Tet10::node_natural(i),
            Shape::Hex8 => Hex8::node_natural(i),
        }
    }

    /// Quadrature rule for the given integrand.
    ///
    /// | Shape | Conductivity | Capacity |
    /// |-------|--------------|----------|
    /// | Line2 | 1            | 2        |
    /// | Tri3  | 1            | 3        |
    /// | Tri6  | 3            | 6        |
    /// | Quad4 | 2×2          | 2×2      |
    /// | Tet4  | 1            | 4        |
    /// | Tet10 | 4            | 14       |
    /// | Hex8  | 2×2×2        | 2×2×2    |
    pub fn quadrature(self, rule: Rule) -> Vec<GaussPoint> {
        let capacity = rule == Rule::Capacity;
        match self {
            Shape::Point => gauss::point(),
            Shape::Line2 if capacity => gauss::line(Legendre::Two),
            Shape::Line2 => gauss::line(Legendre::One),
            Shape::Tri3 if capacity => gauss::triangle(TriangleRule::EdgeMidpoints),
            Shape::Tri3 => gauss::triangle(TriangleRule::Centroid),
            Shape::Tri6 if capacity => gauss::triangle(TriangleRule::Six),
            Shape::Tri6 => gauss::triangle(TriangleRule::EdgeMidpoints),
            Shape::Quad4 => gauss::quad(Legendre::Two),
            Shape::Tet4 if capacity => gauss::tetrahedron(TetRule::Four),
            Shape::Tet4 => gauss::tetrahedron(TetRule::Centroid),
            Shape::Tet10 if capacity => gauss::tetrahedron(TetRule::Fourteen),
            Shape::Tet10 => gauss::tetrahedron(TetRule::Four),
            Shape::Hex8 => gauss::hex(Legendre::Two),
        }
    }
}

fn rows_to_matrix<const R: usize, const C: usize>(rows: &[[f64; C]; R]) -> DMatrix<f64> {
    DMatrix::from_fn(R, C, |i, j| rows[i][j])
}

/// Non-positive (or vanishing metric) Jacobian determinant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegenerateJacobian {
    /// Offending determinant.
    pub det_j: f64,
}

/// Shape data mapped to physical space at one point.
#[derive(Debug, Clone)]
pub struct MappedPoint {
    /// Shape function values.
    pub n: DVector<f64>,
    /// Physical gradients ∂N/∂x, shape (3 × n_nodes).
    pub b: DMatrix<f64>,
    /// Jacobian determinant (length, area or volume measure).
    pub det_j: f64,
}

/// Relative size below which a Jacobian determinant counts as vanishing.
const DEGENERATE_RATIO: f64 = 1e-12;

/// Map shape functions at natural coordinates `xi` to physical space.
///
/// For solids J = ∂N/∂ξ · X is square, det J must be positive and
/// B = J⁻¹ ∂N/∂ξ. Bars and 2D elements embedded in 3D use the metric
/// determinant √det(J Jᵀ) and the pseudo-inverse B = Jᵀ (J Jᵀ)⁻¹ ∂N/∂ξ, so
/// gradients lie in the element's tangent space.
pub fn map_point(
    shape: Shape,
    coords: &[Point3],
    xi: [f64; 3],
) -> Result<MappedPoint, DegenerateJacobian> {
    let n = shape.shape_functions(xi);
    let n_nodes = shape.n_nodes();
    debug_assert_eq!(coords.len(), n_nodes);

    if shape.dim() == 0 {
        return Ok(MappedPoint {
            n,
            b: DMatrix::zeros(3, n_nodes),
            det_j: 1.0,
        });
    }

    let dn = shape.shape_derivatives(xi);
    let x = DMatrix::from_fn(n_nodes, 3, |i, k| coords[i][k]);
    let j = &dn * &x;
    let scale = j.norm().powi(shape.dim() as i32);

    if shape.dim() == 3 {
        let j3 = Matrix3::from_fn(|r, c| j[(r, c)]);
        let det_j = j3.determinant();
        if !(det_j > DEGENERATE_RATIO * scale) {
            return Err(DegenerateJacobian { det_j });
        }
        let inv = j3.try_inverse().ok_or(DegenerateJacobian { det_j })?;
        let inv = DMatrix::from_fn(3, 3, |r, c| inv[(r, c)]);
        return Ok(MappedPoint {
            n,
            b: inv * dn,
            det_j,
        });
    }

    let metric = &j * j.transpose();
    let det_g = metric.determinant();
    if !(det_g > DEGENERATE_RATIO * scale * scale) {
        return Err(DegenerateJacobian {
            det_j: det_g.max(0.0).sqrt(),
        });
    }
    let metric_inv = metric.try_inverse().ok_or(DegenerateJacobian { det_j: 0.0 })?;
    Ok(MappedPoint {
        n,
        b: j.transpose() * metric_inv * dn,
        det_j: det_g.sqrt(),
    })
}

//! Gauss quadrature rules for numerical integration.
//!
//! Every rule yields [`GaussPoint`]s already expressed in the natural
//! coordinates (ξ, η, ζ) of the reference element, so callers never need to
//! know whether a rule was tabulated in barycentric form:
//!
//! - lines, quadrilaterals, hexahedra: tensor products on [-1, 1]
//! - triangles: (ξ, η) = (L₂, L₃) on the unit triangle, weights sum to ½
//! - tetrahedra: (ξ, η, ζ) = (L₂, L₃, L₄) on the unit tet, weights sum to ⅙
//!
//! ```
//! use calor_core::element::gauss::{line, tetrahedron, Legendre, TetRule};
//!
//! // ∫_{-1}^{1} x² dx with two points
//! let integral: f64 = line(Legendre::Two)
//!     .iter()
//!     .map(|gp| gp.natural[0].powi(2) * gp.weight)
//!     .sum();
//! assert!((integral - 2.0 / 3.0).abs() < 1e-14);
//!
//! let volume: f64 = tetrahedron(TetRule::Four).iter().map(|gp| gp.weight).sum();
//! assert!((volume - 1.0 / 6.0).abs() < 1e-14);
//! ```

/// One integration point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    /// (ξ, η, ζ); unused trailing coordinates are zero.
    pub natural: [f64; 3],
    pub weight: f64,
}

impl GaussPoint {
    pub fn new(natural: [f64; 3], weight: f64) -> Self {
        Self { natural, weight }
    }

    /// Point from barycentric coordinates (L₁, L₂, L₃, L₄); L₁ is implied.
    fn barycentric(l: [f64; 4], weight: f64) -> Self {
        Self::new([l[1], l[2], l[3]], weight)
    }
}

/// Number of Gauss–Legendre points per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legendre {
    /// Exact for degree 1.
    One,
    /// Exact for degree 3.
    Two,
    /// Exact for degree 5.
    Three,
}

const LEGENDRE_1: [(f64, f64); 1] = [(0.0, 2.0)];
const LEGENDRE_2: [(f64, f64); 2] = [
    (-0.577_350_269_189_625_8, 1.0),
    (0.577_350_269_189_625_8, 1.0),
];
const LEGENDRE_3: [(f64, f64); 3] = [
    (-0.774_596_669_241_483_4, 5.0 / 9.0),
    (0.0, 8.0 / 9.0),
    (0.774_596_669_241_483_4, 5.0 / 9.0),
];

impl Legendre {
    /// (abscissa, weight) pairs on [-1, 1].
    pub fn points(self) -> &'static [(f64, f64)] {
        match self {
            Legendre::One => &LEGENDRE_1,
            Legendre::Two => &LEGENDRE_2,
            Legendre::Three => &LEGENDRE_3,
        }
    }
}

/// Triangle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangleRule {
    /// 1 point, degree 1.
    Centroid,
    /// 3 edge midpoints, degree 2.
    EdgeMidpoints,
    /// 6 points, degree 4, positive weights.
    Six,
}

/// Tetrahedron rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetRule {
    /// 1 point, degree 1.
    Centroid,
    /// 4 points, degree 2.
    Four,
    /// 14 points, degree 5, positive weights.
    Fourteen,
}

/// The reference point of a zero-dimensional facet.
pub fn point() -> Vec<GaussPoint> {
    vec![GaussPoint::new([0.0; 3], 1.0)]
}

pub fn line(order: Legendre) -> Vec<GaussPoint> {
    order
        .points()
        .iter()
        .map(|&(x, w)| GaussPoint::new([x, 0.0, 0.0], w))
        .collect()
}

/// Tensor-product rule on [-1, 1]².
pub fn quad(order: Legendre) -> Vec<GaussPoint> {
    let p = order.points();
    p.iter()
        .flat_map(|&(x, wx)| p.iter().map(move |&(y, wy)| GaussPoint::new([x, y, 0.0], wx * wy)))
        .collect()
}

/// Tensor-product rule on [-1, 1]³.
pub fn hex(order: Legendre) -> Vec<GaussPoint> {
    let p = order.points();
    let mut points = Vec::with_capacity(p.len().pow(3));
    for &(x, wx) in p {
        for &(y, wy) in p {
            for &(z, wz) in p {
                points.push(GaussPoint::new([x, y, z], wx * wy * wz));
            }
        }
    }
    points
}

pub fn triangle(rule: TriangleRule) -> Vec<GaussPoint> {
    let tri = |a: f64, b: f64, c: f64, w: f64| GaussPoint::barycentric([a, b, c, 0.0], w);
    match rule {
        TriangleRule::Centroid => vec![tri(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 0.5)],
        TriangleRule::EdgeMidpoints => {
            let w = 1.0 / 6.0;
            vec![tri(0.5, 0.5, 0.0, w), tri(0.0, 0.5, 0.5, w), tri(0.5, 0.0, 0.5, w)]
        }
        TriangleRule::Six => {
            // Orbits (c, a, a) with c = 1 − 2a
            let orbits = [
                (0.445_948_490_915_965, 0.111_690_794_839_005_5),
                (0.091_576_213_509_771, 0.054_975_871_827_660_95),
            ];
            orbits
                .iter()
                .flat_map(|&(a, w)| {
                    let c = 1.0 - 2.0 * a;
                    [tri(c, a, a, w), tri(a, c, a, w), tri(a, a, c, w)]
                })
                .collect()
        }
    }
}

pub fn tetrahedron(rule: TetRule) -> Vec<GaussPoint> {
    // Orbit (c, a, a, a) with c = 1 − 3a
    let vertex_orbit = |a: f64, w: f64| {
        let c = 1.0 - 3.0 * a;
        [
            GaussPoint::barycentric([c, a, a, a], w),
            GaussPoint::barycentric([a, c, a, a], w),
            GaussPoint::barycentric([a, a, c, a], w),
            GaussPoint::barycentric([a, a, a, c], w),
        ]
    };

    match rule {
        TetRule::Centroid => vec![GaussPoint::barycentric([0.25; 4], 1.0 / 6.0)],
        TetRule::Four => vertex_orbit(0.138_196_601_125_010_5, 1.0 / 24.0).to_vec(),
        TetRule::Fourteen => {
            let mut points = Vec::with_capacity(14);
            points.extend(vertex_orbit(0.092_735_250_310_891_23, 0.012_248_840_519_393_66));
            points.extend(vertex_orbit(0.310_885_919_263_300_6, 0.018_781_320_953_002_64));
            // Edge orbit (b, b, ½ − b, ½ − b)
            let b = 0.454_496_295_874_350_36;
            let c = 0.5 - b;
            let w = 0.007_091_003_462_846_911;
            for l in [
                [b, b, c, c],
                [b, c, b, c],
                [b, c, c, b],
                [c, b, b, c],
                [c, b, c, b],
                [c, c, b, b],
            ] {
                points.push(GaussPoint::barycentric(l, w));
            }
            points
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn integrate(rule: &[GaussPoint], f: impl Fn([f64; 3]) -> f64) -> f64 {
        rule.iter().map(|gp| f(gp.natural) * gp.weight).sum()
    }

    #[test]
    fn test_legendre_exactness() {
        let orders = [(Legendre::One, 1), (Legendre::Two, 3), (Legendre::Three, 5)];
        for (order, degree) in orders {
            for k in 0..=degree {
                // ∫_{-1}^{1} x^k dx
                let exact = if k % 2 == 0 { 2.0 / (k as f64 + 1.0) } else { 0.0 };
                let got = integrate(&line(order), |p| p[0].powi(k));
                assert_relative_eq!(got, exact, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_tensor_rule_measures() {
        for order in [Legendre::One, Legendre::Two, Legendre::Three] {
            let n = order.points().len();
            assert_eq!(quad(order).len(), n * n);
            assert_eq!(hex(order).len(), n * n * n);
            assert_relative_eq!(integrate(&quad(order), |_| 1.0), 4.0, epsilon = 1e-14);
            assert_relative_eq!(integrate(&hex(order), |_| 1.0), 8.0, epsilon = 1e-14);
        }
        // x²y²z² over the cube = (2/3)³
        let got = integrate(&hex(Legendre::Two), |p| (p[0] * p[1] * p[2]).powi(2));
        assert_relative_eq!(got, 8.0 / 27.0, epsilon = 1e-14);
    }

    #[test]
    fn test_triangle_rules() {
        for rule in [TriangleRule::Centroid, TriangleRule::EdgeMidpoints, TriangleRule::Six] {
            let points = triangle(rule);
            assert_relative_eq!(integrate(&points, |_| 1.0), 0.5, epsilon = 1e-12);
            for gp in &points {
                let [x, y, _] = gp.natural;
                assert!(x >= 0.0 && y >= 0.0 && x + y <= 1.0 + 1e-14);
            }
        }
        // ∫ x² dA = 1/12
        let got = integrate(&triangle(TriangleRule::EdgeMidpoints), |p| p[0] * p[0]);
        assert_relative_eq!(got, 1.0 / 12.0, epsilon = 1e-14);
        // ∫ x⁴ dA = 4!·2!/6! · ½ = 1/30
        let got = integrate(&triangle(TriangleRule::Six), |p| p[0].powi(4));
        assert_relative_eq!(got, 1.0 / 30.0, epsilon = 1e-10);
    }

    #[test]
    fn test_tetrahedron_rules() {
        for rule in [TetRule::Centroid, TetRule::Four, TetRule::Fourteen] {
            let points = tetrahedron(rule);
            assert_relative_eq!(integrate(&points, |_| 1.0), 1.0 / 6.0, epsilon = 1e-12);
            assert!(points.iter().all(|gp| gp.weight > 0.0));
        }
        assert_eq!(tetrahedron(TetRule::Fourteen).len(), 14);

        // ∫ x² dV = 1/60
        for rule in [TetRule::Four, TetRule::Fourteen] {
            let got = integrate(&tetrahedron(rule), |p| p[0] * p[0]);
            assert_relative_eq!(got, 1.0 / 60.0, epsilon = 1e-12);
        }
        // ∫ x²y² dV = 2!2!·3!/7! · ⅙ = 1/1260
        let got = integrate(&tetrahedron(TetRule::Fourteen), |p| (p[0] * p[1]).powi(2));
        assert_relative_eq!(got, 1.0 / 1260.0, epsilon = 1e-10);
    }
}

//! Mesh data structure for thermal FEA.
//!
//! Stores nodal coordinates, element connectivity, the material table and
//! named node/element groups. Surfaces are addressed by [`SurfacePatch`]:
//! an element together with one of its facets.

use crate::element::{hex8, quad4, tet10, tet4, tri3, Shape};
use crate::error::{Error, Result};
use crate::material::Material;
use crate::types::Point3;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Supported element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 2-node bar (section = cross-section area).
    Line2,
    /// 3-node triangle (section = thickness).
    Tri3,
    /// 4-node quadrilateral (section = thickness).
    Quad4,
    /// 4-node tetrahedron (linear).
    Tet4,
    /// 10-node tetrahedron (quadratic).
    Tet10,
    /// 8-node hexahedron (linear).
    Hex8,
}

static LINE2_ENDS: [[usize; 1]; 2] = [[0], [1]];

impl ElementType {
    /// Number of nodes for this element type.
    pub fn n_nodes(self) -> usize {
        self.shape().n_nodes()
    }

    /// Spatial dimension of the element itself.
    pub fn dimension(self) -> usize {
        self.shape().dim()
    }

    /// Reference shape used by the element kernel.
    pub fn shape(self) -> Shape {
        match self {
            ElementType::Line2 => Shape::Line2,
            ElementType::Tri3 => Shape::Tri3,
            ElementType::Quad4 => Shape::Quad4,
            ElementType::Tet4 => Shape::Tet4,
            ElementType::Tet10 => Shape::Tet10,
            ElementType::Hex8 => Shape::Hex8,
        }
    }

    /// Number of local sides (bar ends, 2D edges, solid faces).
    pub fn n_sides(self) -> usize {
        match self {
            ElementType::Line2 => 2,
            ElementType::Tri3 => 3,
            ElementType::Quad4 => 4,
            ElementType::Tet4 | ElementType::Tet10 => 4,
            ElementType::Hex8 => 6,
        }
    }

    /// Facet shape and local node indices of side `i`.
    pub fn side(self, i: usize) -> Option<(Shape, &'static [usize])> {
        if i >= self.n_sides() {
            return None;
        }
        Some(match self {
            ElementType::Line2 => (Shape::Point, &LINE2_ENDS[i][..]),
            ElementType::Tri3 => (Shape::Line2, &tri3::EDGES[i][..]),
            ElementType::Quad4 => (Shape::Line2, &quad4::EDGES[i][..]),
            ElementType::Tet4 => (Shape::Tri3, &tet4::FACES[i][..]),
            ElementType::Tet10 => (Shape::Tri6, &tet10::FACES[i][..]),
            ElementType::Hex8 => (Shape::Quad4, &hex8::FACES[i][..]),
        })
    }
}

/// Element connectivity and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementConnectivity {
    /// Element type identifier.
    pub element_type: ElementType,
    /// Node indices (0-based).
    pub nodes: Vec<usize>,
    /// Index into the mesh material table.
    pub material: usize,
    /// Cross-section area (bars) or thickness (2D); 1 for solids.
    pub section: f64,
}

/// A facet of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facet {
    /// Local side: bar end, 2D edge or solid face.
    Side(usize),
    /// The in-plane face of a 2D element.
    Face,
}

/// A piece of surface: one facet of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfacePatch {
    /// Element index.
    pub element: usize,
    /// Facet of that element.
    pub facet: Facet,
}

impl SurfacePatch {
    /// Local side `side` of `element`.
    pub fn side(element: usize, side: usize) -> Self {
        Self {
            element,
            facet: Facet::Side(side),
        }
    }

    /// In-plane face of the 2D element `element`.
    pub fn face(element: usize) -> Self {
        Self {
            element,
            facet: Facet::Face,
        }
    }
}

/// Facet geometry resolved against the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFacet {
    /// Reference shape of the facet.
    pub shape: Shape,
    /// Global node indices in facet order.
    pub nodes: Vec<usize>,
    /// Measure factor (area for bar ends, thickness for 2D edges).
    pub scale: f64,
}

/// Solid element used by [`Mesh::cuboid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidKind {
    /// One hexahedron per cell.
    Hex8,
    /// Six tetrahedra per cell.
    Tet4,
}

/// Finite element mesh.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    nodes: Vec<Point3>,
    elements: Vec<ElementConnectivity>,
    materials: Vec<Material>,
    node_groups: BTreeMap<String, Vec<usize>>,
    element_groups: BTreeMap<String, Vec<usize>>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(n_nodes: usize, n_elements: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(n_nodes),
            elements: Vec::with_capacity(n_elements),
            ..Self::default()
        }
    }

    /// Add a node to the mesh, returning its index.
    pub fn add_node(&mut self, point: Point3) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(point);
        idx
    }

    /// Add multiple nodes at once.
    pub fn add_nodes(&mut self, points: impl IntoIterator<Item = Point3>) {
        self.nodes.extend(points);
    }

    /// Add a material to the table, returning its id.
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Add an element with unit section.
    pub fn add_element(
        &mut self,
        element_type: ElementType,
        nodes: Vec<usize>,
        material: usize,
    ) -> Result<usize> {
        self.add_element_with_section(element_type, nodes, material, 1.0)
    }

    /// Add an element with an explicit section value.
    pub fn add_element_with_section(
        &mut self,
        element_type: ElementType,
        nodes: Vec<usize>,
        material: usize,
        section: f64,
    ) -> Result<usize> {
        if nodes.len() != element_type.n_nodes() {
            return Err(Error::MeshInvalid(format!(
                "Element type {:?} requires {} nodes, got {}",
                element_type,
                element_type.n_nodes(),
                nodes.len()
            )));
        }

        for &node_idx in &nodes {
            if node_idx >= self.nodes.len() {
                return Err(Error::MeshInvalid(format!(
                    "Node index {} out of bounds (mesh has {} nodes)",
                    node_idx,
                    self.nodes.len()
                )));
            }
        }

        if !(section > 0.0 && section.is_finite()) {
            return Err(Error::MeshInvalid(format!(
                "Element section must be positive, got {}",
                section
            )));
        }

        let idx = self.elements.len();
        self.elements.push(ElementConnectivity {
            element_type,
            nodes,
            material,
            section,
        });
        Ok(idx)
    }

    /// Number of nodes in the mesh.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements in the mesh.
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    /// Get nodal coordinates.
    pub fn nodes(&self) -> &[Point3] {
        &self.nodes
    }

    /// Get a specific node's coordinates.
    pub fn node(&self, idx: usize) -> Option<&Point3> {
        self.nodes.get(idx)
    }

    /// Get element connectivity.
    pub fn elements(&self) -> &[ElementConnectivity] {
        &self.elements
    }

    /// Get a specific element's connectivity.
    pub fn element(&self, idx: usize) -> Option<&ElementConnectivity> {
        self.elements.get(idx)
    }

    /// Material table.
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Get a material by id.
    pub fn material(&self, id: usize) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Get coordinates for an element's nodes.
    pub fn element_coords(&self, elem_idx: usize) -> Option<Vec<Point3>> {
        let elem = self.elements.get(elem_idx)?;
        Some(elem.nodes.iter().map(|&i| self.nodes[i]).collect())
    }

    /// Compute mesh bounding box.
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        let first = *self.nodes.first()?;
        let mut min = first;
        let mut max = first;

        for node in &self.nodes[1..] {
            for i in 0..3 {
                min[i] = min[i].min(node[i]);
                max[i] = max[i].max(node[i]);
            }
        }

        Some((min, max))
    }

    /// Check the mesh is complete enough to assemble.
    ///
    /// Rejects empty meshes, unknown material ids and nodes that belong to
    /// no element (their row in K would be empty).
    pub fn validate(&self) -> Result<()> {
        if self.elements.is_empty() {
            return Err(Error::MeshInvalid("Mesh has no elements".into()));
        }

        let mut attached = vec![false; self.nodes.len()];
        for (idx, elem) in self.elements.iter().enumerate() {
            if elem.material >= self.materials.len() {
                return Err(Error::MeshInvalid(format!(
                    "Element {} references unknown material {} ({} defined)",
                    idx,
                    elem.material,
                    self.materials.len()
                )));
            }
            for &n in &elem.nodes {
                attached[n] = true;
            }
        }

        if let Some(orphan) = attached.iter().position(|&a| !a) {
            return Err(Error::MeshInvalid(format!(
                "Node {} is not attached to any element",
                orphan
            )));
        }
        Ok(())
    }

    /// Resolve a surface patch to facet shape, global nodes and measure factor.
    pub fn resolve_patch(&self, patch: &SurfacePatch) -> Result<ResolvedFacet> {
        let elem = self.elements.get(patch.element).ok_or_else(|| {
            Error::MeshInvalid(format!(
                "Surface patch references unknown element {}",
                patch.element
            ))
        })?;

        match patch.facet {
            Facet::Face => {
                if elem.element_type.dimension() != 2 {
                    return Err(Error::MeshInvalid(format!(
                        "Element {} ({:?}) has no in-plane face",
                        patch.element, elem.element_type
                    )));
                }
                Ok(ResolvedFacet {
                    shape: elem.element_type.shape(),
                    nodes: elem.nodes.clone(),
                    scale: 1.0,
                })
            }
            Facet::Side(side) => {
                let (shape, local) = elem.element_type.side(side).ok_or_else(|| {
                    Error::MeshInvalid(format!(
                        "Element {} ({:?}) has no side {}",
                        patch.element, elem.element_type, side
                    ))
                })?;
                let scale = if elem.element_type.dimension() < 3 {
                    elem.section
                } else {
                    1.0
                };
                Ok(ResolvedFacet {
                    shape,
                    nodes: local.iter().map(|&l| elem.nodes[l]).collect(),
                    scale,
                })
            }
        }
    }

    /// Every element side not shared with another element.
    ///
    /// Returned in element order, then side order.
    pub fn boundary_patches(&self) -> Vec<SurfacePatch> {
        let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
        let mut sides = Vec::new();

        for (idx, elem) in self.elements.iter().enumerate() {
            for side in 0..elem.element_type.n_sides() {
                if let Some((_, local)) = elem.element_type.side(side) {
                    let mut key: Vec<usize> = local.iter().map(|&l| elem.nodes[l]).collect();
                    key.sort_unstable();
                    *counts.entry(key.clone()).or_insert(0) += 1;
                    sides.push((SurfacePatch::side(idx, side), key));
                }
            }
        }

        sides
            .into_iter()
            .filter(|(_, key)| counts.get(key) == Some(&1))
            .map(|(patch, _)| patch)
            .collect()
    }

    /// Boundary patches whose nodes all belong to the named node group.
    pub fn boundary_patches_in_group(&self, name: &str) -> Result<Vec<SurfacePatch>> {
        let group = self
            .node_group(name)
            .ok_or_else(|| Error::MeshInvalid(format!("Unknown node group '{}'", name)))?;
        let mut member = vec![false; self.nodes.len()];
        for &n in group {
            member[n] = true;
        }

        let mut patches = Vec::new();
        for patch in self.boundary_patches() {
            let facet = self.resolve_patch(&patch)?;
            if facet.nodes.iter().all(|&n| member[n]) {
                patches.push(patch);
            }
        }
        Ok(patches)
    }

    /// Create an empty node group, replacing any group with the same name.
    pub fn create_node_group(&mut self, name: &str) {
        self.node_groups.insert(name.to_string(), Vec::new());
    }

    /// Append nodes to an existing group.
    pub fn add_to_node_group(&mut self, name: &str, nodes: &[usize]) -> Result<()> {
        if let Some(&bad) = nodes.iter().find(|&&n| n >= self.nodes.len()) {
            return Err(Error::MeshInvalid(format!(
                "Node index {} out of bounds (mesh has {} nodes)",
                bad,
                self.nodes.len()
            )));
        }
        let group = self
            .node_groups
            .get_mut(name)
            .ok_or_else(|| Error::MeshInvalid(format!("Unknown node group '{}'", name)))?;
        group.extend_from_slice(nodes);
        Ok(())
    }

    /// Nodes of a named group.
    pub fn node_group(&self, name: &str) -> Option<&[usize]> {
        self.node_groups.get(name).map(Vec::as_slice)
    }

    /// Names of all node groups.
    pub fn node_group_names(&self) -> impl Iterator<Item = &str> {
        self.node_groups.keys().map(String::as_str)
    }

    /// Create an empty element group, replacing any group with the same name.
    pub fn create_element_group(&mut self, name: &str) {
        self.element_groups.insert(name.to_string(), Vec::new());
    }

    /// Append elements to an existing group.
    pub fn add_to_element_group(&mut self, name: &str, elements: &[usize]) -> Result<()> {
        if let Some(&bad) = elements.iter().find(|&&e| e >= self.elements.len()) {
            return Err(Error::MeshInvalid(format!(
                "Element index {} out of bounds (mesh has {} elements)",
                bad,
                self.elements.len()
            )));
        }
        let group = self
            .element_groups
            .get_mut(name)
            .ok_or_else(|| Error::MeshInvalid(format!("Unknown element group '{}'", name)))?;
        group.extend_from_slice(elements);
        Ok(())
    }

    /// Elements of a named group.
    pub fn element_group(&self, name: &str) -> Option<&[usize]> {
        self.element_groups.get(name).map(Vec::as_slice)
    }
}

/// Structured mesh generators.
impl Mesh {
    /// Bar along x split into `n` Line2 elements.
    ///
    /// Node groups `xmin` and `xmax` hold the two end nodes.
    pub fn line(length: f64, n: usize, material: Material, area: f64) -> Result<Self> {
        check_extent(&[length], &[n])?;
        let mut mesh = Self::with_capacity(n + 1, n);
        let mat = mesh.add_material(material);
        for i in 0..=n {
            mesh.add_node(Vector3::new(length * i as f64 / n as f64, 0.0, 0.0));
        }
        for i in 0..n {
            mesh.add_element_with_section(ElementType::Line2, vec![i, i + 1], mat, area)?;
        }
        mesh.create_node_group("xmin");
        mesh.add_to_node_group("xmin", &[0])?;
        mesh.create_node_group("xmax");
        mesh.add_to_node_group("xmax", &[n])?;
        mesh.create_element_group("all");
        mesh.add_to_element_group("all", &(0..n).collect::<Vec<_>>())?;
        Ok(mesh)
    }

    /// Plate in the xy-plane split into `nx × ny` Quad4 elements.
    ///
    /// Node groups `xmin`, `xmax`, `ymin`, `ymax` hold the edge nodes.
    pub fn rectangle(
        lx: f64,
        ly: f64,
        nx: usize,
        ny: usize,
        material: Material,
        thickness: f64,
    ) -> Result<Self> {
        check_extent(&[lx, ly], &[nx, ny])?;
        let mut mesh = Self::with_capacity((nx + 1) * (ny + 1), nx * ny);
        let mat = mesh.add_material(material);
        let idx = |i: usize, j: usize| j * (nx + 1) + i;

        for j in 0..=ny {
            for i in 0..=nx {
                mesh.add_node(Vector3::new(
                    lx * i as f64 / nx as f64,
                    ly * j as f64 / ny as f64,
                    0.0,
                ));
            }
        }
        for j in 0..ny {
            for i in 0..nx {
                let nodes = vec![idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1)];
                mesh.add_element_with_section(ElementType::Quad4, nodes, mat, thickness)?;
            }
        }

        mesh.add_box_groups(&[(0, "xmin", "xmax"), (1, "ymin", "ymax")], &[lx, ly])?;
        mesh.create_element_group("all");
        mesh.add_to_element_group("all", &(0..nx * ny).collect::<Vec<_>>())?;
        Ok(mesh)
    }

    /// Box `[0, lx] × [0, ly] × [0, lz]` split into `nx × ny × nz` cells.
    ///
    /// Each cell becomes one Hex8 or six Tet4 sharing the cell diagonal, with
    /// every tetrahedron oriented to a positive volume. Node groups `xmin`,
    /// `xmax`, `ymin`, `ymax`, `zmin`, `zmax` hold the face nodes.
    #[allow(clippy::too_many_arguments)]
    pub fn cuboid(
        lx: f64,
        ly: f64,
        lz: f64,
        nx: usize,
        ny: usize,
        nz: usize,
        material: Material,
        solid: SolidKind,
    ) -> Result<Self> {
        check_extent(&[lx, ly, lz], &[nx, ny, nz])?;
        let per_cell = match solid {
            SolidKind::Hex8 => 1,
            SolidKind::Tet4 => 6,
        };
        let mut mesh = Self::with_capacity((nx + 1) * (ny + 1) * (nz + 1), per_cell * nx * ny * nz);
        let mat = mesh.add_material(material);
        let idx = |i: usize, j: usize, k: usize| (k * (ny + 1) + j) * (nx + 1) + i;

        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    mesh.add_node(Vector3::new(
                        lx * i as f64 / nx as f64,
                        ly * j as f64 / ny as f64,
                        lz * k as f64 / nz as f64,
                    ));
                }
            }
        }

        // Kuhn split around the 0-6 diagonal; conforming across cells.
        const TETS: [[usize; 4]; 6] = [
            [0, 1, 2, 6],
            [0, 2, 3, 6],
            [0, 3, 7, 6],
            [0, 7, 4, 6],
            [0, 4, 5, 6],
            [0, 5, 1, 6],
        ];

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let cell = [
                        idx(i, j, k),
                        idx(i + 1, j, k),
                        idx(i + 1, j + 1, k),
                        idx(i, j + 1, k),
                        idx(i, j, k + 1),
                        idx(i + 1, j, k + 1),
                        idx(i + 1, j + 1, k + 1),
                        idx(i, j + 1, k + 1),
                    ];
                    match solid {
                        SolidKind::Hex8 => {
                            mesh.add_element(ElementType::Hex8, cell.to_vec(), mat)?;
                        }
                        SolidKind::Tet4 => {
                            for tet in &TETS {
                                let mut nodes: Vec<usize> = tet.iter().map(|&l| cell[l]).collect();
                                if mesh.signed_volume(&nodes) < 0.0 {
                                    nodes.swap(1, 2);
                                }
                                mesh.add_element(ElementType::Tet4, nodes, mat)?;
                            }
                        }
                    }
                }
            }
        }

        mesh.add_box_groups(
            &[(0, "xmin", "xmax"), (1, "ymin", "ymax"), (2, "zmin", "zmax")],
            &[lx, ly, lz],
        )?;
        let n_elements = mesh.n_elements();
        mesh.create_element_group("all");
        mesh.add_to_element_group("all", &(0..n_elements).collect::<Vec<_>>())?;
        Ok(mesh)
    }

    fn signed_volume(&self, tet: &[usize]) -> f64 {
        let p0 = self.nodes[tet[0]];
        let m = Matrix3::from_columns(&[
            self.nodes[tet[1]] - p0,
            self.nodes[tet[2]] - p0,
            self.nodes[tet[3]] - p0,
        ]);
        m.determinant() / 6.0
    }

    fn add_box_groups(&mut self, axes: &[(usize, &str, &str)], extent: &[f64]) -> Result<()> {
        for &(axis, low, high) in axes {
            let tol = 1e-9 * extent[axis];
            let lows: Vec<usize> = (0..self.nodes.len())
                .filter(|&n| self.nodes[n][axis].abs() <= tol)
                .collect();
            let highs: Vec<usize> = (0..self.nodes.len())
                .filter(|&n| (self.nodes[n][axis] - extent[axis]).abs() <= tol)
                .collect();
            self.create_node_group(low);
            self.add_to_node_group(low, &lows)?;
            self.create_node_group(high);
            self.add_to_node_group(high, &highs)?;
        }
        Ok(())
    }
}

fn check_extent(lengths: &[f64], divisions: &[usize]) -> Result<()> {
    if lengths.iter().any(|&l| !(l > 0.0 && l.is_finite())) {
        return Err(Error::MeshInvalid("Mesh extents must be positive".into()));
    }
    if divisions.iter().any(|&n| n == 0) {
        return Err(Error::MeshInvalid(
            "Mesh divisions must be at least 1".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn unit_tet_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_node(Vector3::new(0.0, 0.0, 0.0));
        mesh.add_node(Vector3::new(1.0, 0.0, 0.0));
        mesh.add_node(Vector3::new(0.0, 1.0, 0.0));
        mesh.add_node(Vector3::new(0.0, 0.0, 1.0));
        mesh.add_material(Material::steel());
        mesh
    }

    #[test]
    fn test_mesh_creation() {
        let mut mesh = unit_tet_mesh();
        assert_eq!(mesh.n_nodes(), 4);

        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0).unwrap();
        assert_eq!(mesh.n_elements(), 1);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_invalid_element_node_count() {
        let mut mesh = unit_tet_mesh();
        // Tet4 needs 4 nodes, we only provide 3
        let result = mesh.add_element(ElementType::Tet4, vec![0, 1, 2], 0);
        assert!(matches!(result, Err(Error::MeshInvalid(_))));
    }

    #[test]
    fn test_invalid_node_index() {
        let mut mesh = Mesh::new();
        mesh.add_node(Vector3::new(0.0, 0.0, 0.0));

        // Node index 3 doesn't exist
        let result = mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_unknown_material() {
        let mut mesh = unit_tet_mesh();
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 3).unwrap();
        assert!(matches!(mesh.validate(), Err(Error::MeshInvalid(_))));
    }

    #[test]
    fn test_validate_orphan_node() {
        let mut mesh = unit_tet_mesh();
        mesh.add_node(Vector3::new(5.0, 5.0, 5.0));
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0).unwrap();
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_bounds() {
        let mut mesh = Mesh::new();
        mesh.add_node(Vector3::new(-1.0, -2.0, -3.0));
        mesh.add_node(Vector3::new(1.0, 2.0, 3.0));
        mesh.add_node(Vector3::new(0.0, 0.0, 0.0));

        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Vector3::new(-1.0, -2.0, -3.0));
        assert_eq!(max, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_single_tet_boundary() {
        let mut mesh = unit_tet_mesh();
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3], 0).unwrap();
        assert_eq!(mesh.boundary_patches().len(), 4);
    }

    #[test]
    fn test_cuboid_tets_are_conforming() {
        let mesh =
            Mesh::cuboid(1.0, 1.0, 1.0, 2, 2, 2, Material::steel(), SolidKind::Tet4).unwrap();
        assert_eq!(mesh.n_elements(), 48);
        for e in 0..mesh.n_elements() {
            assert!(mesh.signed_volume(&mesh.elements()[e].nodes) > 0.0);
        }
        // 6 faces × 4 cells × 2 triangles
        assert_eq!(mesh.boundary_patches().len(), 48);
        assert_eq!(mesh.node_group("xmax").unwrap().len(), 9);
    }

    #[test]
    fn test_cuboid_hex_boundary() {
        let mesh =
            Mesh::cuboid(2.0, 1.0, 1.0, 2, 1, 1, Material::steel(), SolidKind::Hex8).unwrap();
        assert_eq!(mesh.boundary_patches().len(), 10);
        assert_eq!(mesh.boundary_patches_in_group("xmax").unwrap().len(), 1);
        assert_eq!(mesh.boundary_patches_in_group("ymin").unwrap().len(), 2);
    }

    #[test]
    fn test_line_and_rectangle_groups() {
        let bar = Mesh::line(1.0, 10, Material::steel(), 0.01).unwrap();
        assert_eq!(bar.n_nodes(), 11);
        assert_eq!(bar.node_group("xmax"), Some(&[10][..]));
        assert_eq!(bar.boundary_patches().len(), 2);

        let plate = Mesh::rectangle(1.0, 2.0, 2, 4, Material::steel(), 0.01).unwrap();
        assert_eq!(plate.n_elements(), 8);
        assert_eq!(plate.node_group("ymax").unwrap().len(), 3);
        // Perimeter edges: 2 + 2 + 4 + 4
        assert_eq!(plate.boundary_patches().len(), 12);
    }

    #[test]
    fn test_resolve_patch_scales() {
        let plate = Mesh::rectangle(1.0, 1.0, 1, 1, Material::steel(), 0.05).unwrap();
        let edge = plate.resolve_patch(&SurfacePatch::side(0, 1)).unwrap();
        assert_eq!(edge.shape, Shape::Line2);
        assert_eq!(edge.nodes, vec![1, 3]);
        assert_eq!(edge.scale, 0.05);

        let face = plate.resolve_patch(&SurfacePatch::face(0)).unwrap();
        assert_eq!(face.shape, Shape::Quad4);
        assert_eq!(face.scale, 1.0);

        let cube =
            Mesh::cuboid(1.0, 1.0, 1.0, 1, 1, 1, Material::steel(), SolidKind::Hex8).unwrap();
        assert!(cube.resolve_patch(&SurfacePatch::face(0)).is_err());
        assert!(cube.resolve_patch(&SurfacePatch::side(0, 6)).is_err());
    }

    #[test]
    fn test_groups() {
        let mut mesh = unit_tet_mesh();
        mesh.create_node_group("base");
        mesh.add_to_node_group("base", &[0, 1, 2]).unwrap();
        assert_eq!(mesh.node_group("base"), Some(&[0, 1, 2][..]));
        assert!(mesh.add_to_node_group("base", &[7]).is_err());
        assert!(mesh.add_to_node_group("missing", &[0]).is_err());
        assert_eq!(mesh.node_group_names().collect::<Vec<_>>(), vec!["base"]);
    }
}

//! Extents, topologies and the procedural shapes the sample scenes use.
//!
//! - [`Aabb`]: axis-aligned bounds returned by `get_extent`
//! - [`MeshTopology`]: face-vertex counts and indices, with the invariant
//!   `sum(face_vertex_counts) == face_vertex_indices.len()`
//! - [`BasisCurvesTopology`]: per-curve vertex counts and indices
//! - [`cube`], [`grid`], [`RippleGrid`], [`PointLattice`] and [`CurveGrid`]:
//!   deterministic generators
//!
//! # Example
//!
//! ```
//! use hdpick::geometry::{self, Aabb, SubdivScheme};
//!
//! let (points, topology) = geometry::cube(SubdivScheme::CatmullClark);
//! assert_eq!(points.len(), 8);
//! assert_eq!(topology.face_count(), 6);
//!
//! let bounds = Aabb::from_points(&points);
//! assert!(points.iter().all(|p| bounds.contains(*p)));
//! ```

use glam::{Mat4, Vec3};
use thiserror::Error;

/// Errors describing a malformed [`MeshTopology`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("face vertex counts sum to {counted} but {indices} indices were supplied")]
    CountMismatch { counted: usize, indices: usize },
    #[error("face {face} has negative vertex count {count}")]
    NegativeCount { face: usize, count: i32 },
    #[error("vertex index {index} at position {position} is outside 0..{point_count}")]
    IndexOutOfRange {
        position: usize,
        index: i32,
        point_count: usize,
    },
}

/// An axis-aligned bounding box.
///
/// The default box is empty (inverted); unioning any point makes it valid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The `-1..1` box returned for prims with no geometry of their own.
    pub fn unit() -> Self {
        Self::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::EMPTY, |acc, p| acc.union_point(*p))
    }

    pub fn union_point(self, p: Vec3) -> Self {
        Self::new(self.min.min(p), self.max.max(p))
    }

    pub fn union(self, other: Aabb) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Bounds of this box after transforming all eight corners.
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        corners
            .iter()
            .fold(Self::EMPTY, |acc, c| acc.union_point(m.transform_point3(*c)))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Subdivision scheme tag carried with a topology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SubdivScheme {
    #[default]
    CatmullClark,
    Loop,
    Bilinear,
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    RightHanded,
    LeftHanded,
}

/// Face-vertex mesh topology.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshTopology {
    pub scheme: SubdivScheme,
    pub orientation: Orientation,
    face_vertex_counts: Vec<i32>,
    face_vertex_indices: Vec<i32>,
    pub refine_level: i32,
}

impl MeshTopology {
    /// Builds a topology, asserting the face-count invariant.
    ///
    /// # Panics
    ///
    /// Panics if the counts are negative or do not sum to the number of
    /// indices. Use [`try_new`](Self::try_new) for data from outside the crate.
    pub fn new(
        scheme: SubdivScheme,
        orientation: Orientation,
        face_vertex_counts: Vec<i32>,
        face_vertex_indices: Vec<i32>,
    ) -> Self {
        match Self::try_new(scheme, orientation, face_vertex_counts, face_vertex_indices) {
            Ok(topology) => topology,
            Err(e) => panic!("malformed mesh topology: {e}"),
        }
    }

    pub fn try_new(
        scheme: SubdivScheme,
        orientation: Orientation,
        face_vertex_counts: Vec<i32>,
        face_vertex_indices: Vec<i32>,
    ) -> Result<Self, TopologyError> {
        let mut counted = 0usize;
        for (face, &count) in face_vertex_counts.iter().enumerate() {
            if count < 0 {
                return Err(TopologyError::NegativeCount { face, count });
            }
            counted += count as usize;
        }
        if counted != face_vertex_indices.len() {
            return Err(TopologyError::CountMismatch {
                counted,
                indices: face_vertex_indices.len(),
            });
        }
        Ok(Self {
            scheme,
            orientation,
            face_vertex_counts,
            face_vertex_indices,
            refine_level: 0,
        })
    }

    pub fn with_refine_level(mut self, level: i32) -> Self {
        self.refine_level = level;
        self
    }

    pub fn face_vertex_counts(&self) -> &[i32] {
        &self.face_vertex_counts
    }

    pub fn face_vertex_indices(&self) -> &[i32] {
        &self.face_vertex_indices
    }

    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }

    /// Checks that every index addresses one of `point_count` points.
    pub fn validate_indices(&self, point_count: usize) -> Result<(), TopologyError> {
        for (position, &index) in self.face_vertex_indices.iter().enumerate() {
            if index < 0 || index as usize >= point_count {
                return Err(TopologyError::IndexOutOfRange {
                    position,
                    index,
                    point_count,
                });
            }
        }
        Ok(())
    }

    /// Fan-triangulates every face with three or more vertices.
    pub fn triangulate(&self) -> Vec<[u32; 3]> {
        let mut triangles = Vec::with_capacity(self.face_vertex_indices.len());
        let mut offset = 0usize;
        for &count in &self.face_vertex_counts {
            let count = count as usize;
            let face = &self.face_vertex_indices[offset..offset + count];
            for i in 1..count.saturating_sub(1) {
                triangles.push([face[0] as u32, face[i] as u32, face[i + 1] as u32]);
            }
            offset += count;
        }
        triangles
    }
}

const CUBE_POINTS: [Vec3; 8] = [
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
];

/// A cube spanning `-1..1` on every axis.
///
/// The loop scheme needs triangles, so it gets twelve of them; every other
/// scheme gets six quads.
pub fn cube(scheme: SubdivScheme) -> (Vec<Vec3>, MeshTopology) {
    let (counts, indices) = if scheme == SubdivScheme::Loop {
        (
            vec![3; 12],
            vec![
                0, 1, 2, 0, 2, 3, //
                4, 5, 6, 4, 6, 7, //
                0, 6, 5, 0, 5, 1, //
                4, 7, 3, 4, 3, 2, //
                0, 3, 7, 0, 7, 6, //
                4, 2, 1, 4, 1, 5,
            ],
        )
    } else {
        (
            vec![4; 6],
            vec![
                0, 1, 2, 3, //
                4, 5, 6, 7, //
                0, 6, 5, 1, //
                4, 7, 3, 2, //
                0, 3, 7, 6, //
                4, 2, 1, 5,
            ],
        )
    };
    (
        CUBE_POINTS.to_vec(),
        MeshTopology::new(scheme, Orientation::RightHanded, counts, indices),
    )
}

/// A flat `-1..1` plane in XY made of `nx` by `ny` quads.
pub fn grid(nx: u32, ny: u32) -> (Vec<Vec3>, MeshTopology) {
    let (nx, ny) = (nx.max(1), ny.max(1));
    let mut points = Vec::with_capacity(((nx + 1) * (ny + 1)) as usize);
    for y in 0..=ny {
        for x in 0..=nx {
            points.push(Vec3::new(
                2.0 * x as f32 / nx as f32 - 1.0,
                2.0 * y as f32 / ny as f32 - 1.0,
                0.0,
            ));
        }
    }
    (points, quad_topology(nx, ny, SubdivScheme::CatmullClark))
}

fn quad_topology(nx: u32, ny: u32, scheme: SubdivScheme) -> MeshTopology {
    let stride = (nx + 1) as i32;
    let mut counts = Vec::with_capacity((nx * ny) as usize);
    let mut indices = Vec::with_capacity((nx * ny * 4) as usize);
    for y in 0..ny as i32 {
        for x in 0..nx as i32 {
            counts.push(4);
            indices.extend_from_slice(&[
                y * stride + x,
                y * stride + x + 1,
                (y + 1) * stride + x + 1,
                (y + 1) * stride + x,
            ]);
        }
    }
    MeshTopology::new(scheme, Orientation::RightHanded, counts, indices)
}

/// An animated cloth-like sheet in the XZ plane.
///
/// Heights follow `amplitude * sin(6x - phase) * cos(6z - phase + 0.5)` over a
/// `-2..2` square, so the same `(segments, phase)` always yields the same
/// points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RippleGrid {
    pub x_segments: u32,
    pub z_segments: u32,
    pub half_size: f32,
    pub amplitude: f32,
}

impl RippleGrid {
    pub fn new(x_segments: u32, z_segments: u32) -> Self {
        Self {
            x_segments: x_segments.max(1),
            z_segments: z_segments.max(1),
            half_size: 2.0,
            amplitude: 0.1,
        }
    }

    pub fn point_count(&self) -> usize {
        ((self.x_segments + 1) * (self.z_segments + 1)) as usize
    }

    pub fn points(&self, phase: f32) -> Vec<Vec3> {
        let mut points = Vec::with_capacity(self.point_count());
        for z in 0..=self.z_segments {
            for x in 0..=self.x_segments {
                let fx = self.half_size * (2.0 * x as f32 / self.x_segments as f32 - 1.0);
                let fz = self.half_size * (2.0 * z as f32 / self.z_segments as f32 - 1.0);
                let height =
                    self.amplitude * (6.0 * fx - phase).sin() * (6.0 * fz - phase + 0.5).cos();
                points.push(Vec3::new(fx, height, fz));
            }
        }
        points
    }

    /// Flat up-facing normals, one per point.
    pub fn normals(&self) -> Vec<Vec3> {
        vec![Vec3::Y; self.point_count()]
    }

    pub fn topology(&self) -> MeshTopology {
        quad_topology(self.x_segments, self.z_segments, SubdivScheme::None)
    }
}

/// Basis used to interpret curve control points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CurveBasis {
    #[default]
    Bezier,
    BSpline,
    CatmullRom,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CurveType {
    #[default]
    Cubic,
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CurveWrap {
    #[default]
    Nonperiodic,
    Periodic,
}

/// Topology of a set of basis curves.
///
/// Same invariant as meshes: the vertex counts sum to the index count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasisCurvesTopology {
    pub curve_type: CurveType,
    pub basis: CurveBasis,
    pub wrap: CurveWrap,
    curve_vertex_counts: Vec<i32>,
    curve_indices: Vec<i32>,
}

impl BasisCurvesTopology {
    pub fn try_new(
        curve_type: CurveType,
        basis: CurveBasis,
        wrap: CurveWrap,
        curve_vertex_counts: Vec<i32>,
        curve_indices: Vec<i32>,
    ) -> Result<Self, TopologyError> {
        let mut counted = 0usize;
        for (face, &count) in curve_vertex_counts.iter().enumerate() {
            if count < 0 {
                return Err(TopologyError::NegativeCount { face, count });
            }
            counted += count as usize;
        }
        if counted != curve_indices.len() {
            return Err(TopologyError::CountMismatch {
                counted,
                indices: curve_indices.len(),
            });
        }
        Ok(Self {
            curve_type,
            basis,
            wrap,
            curve_vertex_counts,
            curve_indices,
        })
    }

    pub fn curve_vertex_counts(&self) -> &[i32] {
        &self.curve_vertex_counts
    }

    pub fn curve_indices(&self) -> &[i32] {
        &self.curve_indices
    }

    pub fn curve_count(&self) -> usize {
        self.curve_vertex_counts.len()
    }

    pub fn validate_indices(&self, point_count: usize) -> Result<(), TopologyError> {
        match self
            .curve_indices
            .iter()
            .enumerate()
            .find(|&(_, &index)| index < 0 || index as usize >= point_count)
        {
            Some((position, &index)) => Err(TopologyError::IndexOutOfRange {
                position,
                index,
                point_count,
            }),
            None => Ok(()),
        }
    }
}

/// A cube of `cells³` points spanning `size` on each axis, centred on the
/// origin, whose widths pulse along Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLattice {
    pub cells: u32,
    pub size: f32,
}

impl Default for PointLattice {
    fn default() -> Self {
        Self {
            cells: 20,
            size: 2.0,
        }
    }
}

impl PointLattice {
    pub fn new(cells: u32) -> Self {
        Self {
            cells: cells.max(1),
            ..Default::default()
        }
    }

    pub fn point_count(&self) -> usize {
        (self.cells as usize).pow(3)
    }

    pub fn points(&self) -> Vec<Vec3> {
        let cell = self.size / self.cells as f32;
        let half = Vec3::splat(0.5 * self.size);
        let mut points = Vec::with_capacity(self.point_count());
        for i in 0..self.cells {
            for j in 0..self.cells {
                for k in 0..self.cells {
                    points.push(Vec3::new(i as f32, j as f32, k as f32) * cell - half);
                }
            }
        }
        points
    }

    /// `0.02 + (0.3 sin(0.2 j + phase))²` for the point in row `j`.
    pub fn widths(&self, phase: f32) -> Vec<f32> {
        let mut widths = Vec::with_capacity(self.point_count());
        for _ in 0..self.cells {
            for j in 0..self.cells {
                let a = 0.3 * (j as f32 * 0.2 + phase).sin();
                let width = 0.02 + a * a;
                widths.extend(std::iter::repeat_n(width, self.cells as usize));
            }
        }
        widths
    }
}

/// A `cells` by `cells` field of four-point cubic curves standing up from
/// the XZ plane and swaying with the phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveGrid {
    pub cells: u32,
    pub size: f32,
}

impl Default for CurveGrid {
    fn default() -> Self {
        Self {
            cells: 20,
            size: 2.0,
        }
    }
}

impl CurveGrid {
    const VERTICES_PER_CURVE: u32 = 4;

    pub fn new(cells: u32) -> Self {
        Self {
            cells: cells.max(1),
            ..Default::default()
        }
    }

    pub fn curve_count(&self) -> usize {
        (self.cells * self.cells) as usize
    }

    pub fn points(&self, phase: f32) -> Vec<Vec3> {
        let cell = self.size / self.cells as f32;
        let half = Vec3::splat(0.5 * self.size);
        let per_curve = Self::VERTICES_PER_CURVE;
        let mut points = Vec::with_capacity(self.curve_count() * per_curve as usize);
        for i in 0..self.cells {
            for j in 0..self.cells {
                for k in 0..per_curve {
                    let sway = phase + 0.1 * (i + j + k) as f32;
                    let k = k as f32;
                    let p = Vec3::new(
                        i as f32 * cell + sway.sin() * 0.01 * k,
                        k * 0.25,
                        j as f32 * cell + sway.cos() * 0.1 * k,
                    );
                    points.push(p - half);
                }
            }
        }
        points
    }

    pub fn topology(&self) -> BasisCurvesTopology {
        let per_curve = Self::VERTICES_PER_CURVE as i32;
        let count = self.curve_count();
        BasisCurvesTopology {
            curve_type: CurveType::Cubic,
            basis: CurveBasis::Bezier,
            wrap: CurveWrap::Nonperiodic,
            curve_vertex_counts: vec![per_curve; count],
            curve_indices: (0..count as i32 * per_curve).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(topology: &MeshTopology) {
        let sum: i32 = topology.face_vertex_counts().iter().sum();
        assert_eq!(sum as usize, topology.face_vertex_indices().len());
    }

    #[test]
    fn aabb_bounds() {
        let bounds = Aabb::from_points(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-1.0, -1.0, -1.0),
        ]);
        assert_eq!(bounds.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bounds.center(), Vec3::new(0.0, 0.5, 1.0));
    }

    #[test]
    fn empty_aabb() {
        assert!(Aabb::from_points(&[]).is_empty());
        assert!(!Aabb::unit().is_empty());
        let grown = Aabb::EMPTY.union(Aabb::unit());
        assert_eq!(grown, Aabb::unit());
    }

    #[test]
    fn aabb_transform_translates() {
        let moved = Aabb::unit().transformed(&Mat4::from_translation(Vec3::new(5.0, 0.0, 5.0)));
        assert_eq!(moved.min, Vec3::new(4.0, -1.0, 4.0));
        assert_eq!(moved.max, Vec3::new(6.0, 1.0, 6.0));
    }

    #[test]
    fn cube_topologies_hold_invariant() {
        let (points, quads) = cube(SubdivScheme::CatmullClark);
        assert_eq!(quads.face_vertex_counts(), &[4, 4, 4, 4, 4, 4]);
        assert_eq!(quads.face_vertex_indices().len(), 24);
        assert_invariant(&quads);
        assert!(quads.validate_indices(points.len()).is_ok());

        let (_, tris) = cube(SubdivScheme::Loop);
        assert_eq!(tris.face_count(), 12);
        assert_invariant(&tris);
    }

    #[test]
    fn try_new_reports_mismatch() {
        let err = MeshTopology::try_new(
            SubdivScheme::None,
            Orientation::RightHanded,
            vec![4, 3],
            vec![0, 1, 2, 3, 0, 1],
        )
        .unwrap_err();
        assert_eq!(err, TopologyError::CountMismatch { counted: 7, indices: 6 });

        let err = MeshTopology::try_new(
            SubdivScheme::None,
            Orientation::RightHanded,
            vec![-1],
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, TopologyError::NegativeCount { face: 0, count: -1 });
    }

    #[test]
    #[should_panic(expected = "malformed mesh topology")]
    fn new_asserts_invariant() {
        MeshTopology::new(
            SubdivScheme::None,
            Orientation::RightHanded,
            vec![3],
            vec![0, 1],
        );
    }

    #[test]
    fn index_range_is_checked() {
        let (_, topology) = cube(SubdivScheme::CatmullClark);
        assert_eq!(
            topology.validate_indices(4),
            Err(TopologyError::IndexOutOfRange {
                position: 4,
                index: 4,
                point_count: 4
            })
        );
    }

    #[test]
    fn triangulate_fans_quads() {
        let (_, topology) = cube(SubdivScheme::CatmullClark);
        let tris = topology.triangulate();
        assert_eq!(tris.len(), 12);
        assert_eq!(tris[0], [0, 1, 2]);
        assert_eq!(tris[1], [0, 2, 3]);
    }

    #[test]
    fn grid_layout() {
        let (points, topology) = grid(2, 3);
        assert_eq!(points.len(), 12);
        assert_eq!(points[0], Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(points[11], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(topology.face_count(), 6);
        assert_invariant(&topology);
        assert!(topology.validate_indices(points.len()).is_ok());
    }

    #[test]
    fn ripple_is_deterministic_and_bounded() {
        let ripple = RippleGrid::new(10, 10);
        let a = ripple.points(0.3);
        let b = ripple.points(0.3);
        assert_eq!(a, b);
        assert_ne!(a, ripple.points(0.4));
        assert!(a.iter().all(|p| p.y.abs() <= ripple.amplitude));
        assert!(ripple.topology().validate_indices(a.len()).is_ok());
        assert_eq!(ripple.normals().len(), a.len());
    }

    #[test]
    fn curve_topology_invariant() {
        let curves = CurveGrid::new(3);
        let topology = curves.topology();
        assert_eq!(topology.curve_count(), 9);
        assert_eq!(topology.curve_indices().len(), 36);
        assert!(topology.validate_indices(curves.points(0.0).len()).is_ok());
        assert!(topology.validate_indices(35).is_err());

        let bad = BasisCurvesTopology::try_new(
            CurveType::Cubic,
            CurveBasis::Bezier,
            CurveWrap::Nonperiodic,
            vec![4, 4],
            vec![0, 1, 2, 3],
        );
        assert_eq!(
            bad,
            Err(TopologyError::CountMismatch {
                counted: 8,
                indices: 4
            })
        );
    }

    #[test]
    fn curves_sway_with_phase() {
        let curves = CurveGrid::new(2);
        assert_eq!(curves.points(0.5), curves.points(0.5));
        assert_ne!(curves.points(0.0), curves.points(0.5));
    }

    #[test]
    fn lattice_widths_follow_rows() {
        let lattice = PointLattice::new(4);
        let points = lattice.points();
        let widths = lattice.widths(0.0);
        assert_eq!(points.len(), 64);
        assert_eq!(widths.len(), 64);
        assert_eq!(points[0], Vec3::splat(-1.0));
        // Row j = 0 at phase 0 has the minimum width.
        assert_eq!(widths[0], 0.02);
        assert_eq!(widths[1], widths[0]);
        assert!(widths[4] > widths[0]);
        assert_ne!(lattice.widths(0.5), widths);
    }
}

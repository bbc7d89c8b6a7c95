//! The pull surface a render engine uses to read the scene.
//!
//! An engine never receives pushed updates. Each frame it asks a
//! [`SceneDelegate`] which objects changed (via
//! [`consume_dirty`](SceneDelegate::consume_dirty)) and re-pulls only the
//! stale attributes.
//!
//! [`StandardDelegate`] is the reusable implementation: an
//! [`AttributeValueCache`](crate::AttributeValueCache) and a
//! [`DirtyTracker`](crate::DirtyTracker) behind this trait, plus mesh,
//! point, curve, instancer, light, material and task insertion.

mod instancer;
mod standard;

pub use instancer::{InstancerError, InstancerRecord};
pub use standard::{MeshDesc, StandardDelegate};

use glam::Mat4;

use crate::dirty::DirtyBits;
use crate::geometry::{Aabb, BasisCurvesTopology, MeshTopology};
use crate::path::ScenePath;
use crate::token::Token;
use crate::value::Value;

/// The geometry type of a renderable prim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RprimKind {
    #[default]
    Mesh,
    Points,
    BasisCurves,
}

/// How a primvar's values map onto a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interpolation {
    /// One value for the whole prim.
    Constant,
    /// One value per face.
    Uniform,
    /// One value per point, linearly interpolated.
    Varying,
    /// One value per point, interpolated by the subdivision scheme.
    Vertex,
    /// One value per face corner.
    FaceVarying,
    /// One value per instance, on an instancer.
    Instance,
}

/// Semantic hint attached to a primvar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrimvarRole {
    #[default]
    None,
    Point,
    Normal,
    Color,
    TextureCoordinate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrimvarDescriptor {
    pub name: Token,
    pub interpolation: Interpolation,
    pub role: PrimvarRole,
}

impl PrimvarDescriptor {
    pub fn new(name: Token, interpolation: Interpolation, role: PrimvarRole) -> Self {
        Self {
            name,
            interpolation,
            role,
        }
    }
}

/// Read access to a scene, plus the dirty-consumption and animation hooks an
/// engine drives each frame.
///
/// Unknown ids never fail: they read as empty values, identity transforms,
/// empty topology and unit extents.
pub trait SceneDelegate {
    /// Cached or computed value of `name` on `id`, or [`Value::Empty`].
    fn get(&self, id: &ScenePath, name: &Token) -> Value;

    fn get_transform(&self, id: &ScenePath) -> Mat4;

    fn get_visible(&self, _id: &ScenePath) -> bool {
        true
    }

    /// Bounds of every point `get(id, points)` returns at the current frame.
    fn get_extent(&self, id: &ScenePath) -> Aabb;

    fn get_rprim_kind(&self, _id: &ScenePath) -> RprimKind {
        RprimKind::Mesh
    }

    fn get_mesh_topology(&self, id: &ScenePath) -> MeshTopology;

    fn get_basis_curves_topology(&self, _id: &ScenePath) -> BasisCurvesTopology {
        BasisCurvesTopology::default()
    }

    /// Primvars populated on `id` for one interpolation class.
    fn get_primvar_descriptors(
        &self,
        id: &ScenePath,
        interpolation: Interpolation,
    ) -> Vec<PrimvarDescriptor>;

    /// Instance slots of `instancer` that draw `prototype`.
    fn get_instance_indices(&self, instancer: &ScenePath, prototype: &ScenePath) -> Vec<i32>;

    fn get_instancer_transform(&self, instancer: &ScenePath) -> Mat4;

    /// The instancer drawing `prim`, if it is a prototype.
    fn get_instancer_id(&self, prim: &ScenePath) -> Option<ScenePath>;

    fn get_refine_level(&self, _id: &ScenePath) -> i32 {
        0
    }

    fn get_material_id(&self, _id: &ScenePath) -> Option<ScenePath> {
        None
    }

    fn get_camera_param_value(&self, camera: &ScenePath, name: &Token) -> Value;

    /// Render-tag filter of a render task; empty means every tag.
    fn get_task_render_tags(&self, task: &ScenePath) -> Vec<Token>;

    fn get_render_tag(&self, id: &ScenePath) -> Token;

    /// Returns and clears the pending dirty bits of `id`.
    fn consume_dirty(&mut self, id: &ScenePath) -> DirtyBits;

    /// Renderable prims in path order.
    fn rprim_ids(&self) -> Vec<ScenePath>;

    fn instancer_ids(&self) -> Vec<ScenePath>;

    fn light_ids(&self) -> Vec<ScenePath>;

    /// Steps animations by one frame and marks what they touched.
    fn advance(&mut self);
}

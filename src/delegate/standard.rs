//! The general-purpose delegate: cache-backed meshes, instancers, lights,
//! materials, cameras and render tasks.
//!
//! Every mutator follows the same two steps: write the new value, then mark
//! the owning id dirty so the next sync re-pulls it.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use hdpick::{
//!     DelegateConfig, MeshDesc, SceneDelegate, ScenePath, StandardDelegate, TokenRegistry,
//! };
//! use hdpick::geometry::SubdivScheme;
//! use glam::Vec3;
//!
//! let tokens = Rc::new(TokenRegistry::new());
//! let mut delegate = StandardDelegate::new(tokens, DelegateConfig::default());
//!
//! let cube = ScenePath::new("/cube0").unwrap();
//! delegate.add_mesh(
//!     MeshDesc::cube(cube.clone(), SubdivScheme::CatmullClark).at(Vec3::new(5.0, 0.0, 5.0)),
//! );
//!
//! assert_eq!(delegate.get_mesh_topology(&cube).face_count(), 6);
//! assert_eq!(delegate.get_transform(&cube).w_axis.truncate(), Vec3::new(5.0, 0.0, 5.0));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};

use super::instancer::{InstancerError, InstancerRecord};
use super::{Interpolation, PrimvarDescriptor, PrimvarRole, RprimKind, SceneDelegate};
use crate::cache::AttributeValueCache;
use crate::config::DelegateConfig;
use crate::dirty::{DirtyBits, DirtyTracker};
use crate::geometry::{
    self, Aabb, BasisCurvesTopology, CurveGrid, MeshTopology, Orientation, PointLattice,
    RippleGrid, SubdivScheme,
};
use crate::path::ScenePath;
use crate::task::{TaskDescriptor, TaskGraphBuilder, TaskKind};
use crate::token::{Token, TokenRegistry};
use crate::value::{ParamBlock, Value};

/// Everything needed to insert one mesh.
///
/// ```
/// use glam::{Vec3, Vec4};
/// use hdpick::{Interpolation, MeshDesc, ScenePath};
///
/// let desc = MeshDesc::grid(ScenePath::new("/floor").unwrap(), 4, 4)
///     .at(Vec3::new(0.0, -1.0, 0.0))
///     .color(Vec4::new(0.2, 0.2, 0.2, 1.0), Interpolation::Constant)
///     .double_sided();
/// ```
#[derive(Clone, Debug)]
pub struct MeshDesc {
    id: ScenePath,
    transform: Mat4,
    points: Vec<Vec3>,
    topology: MeshTopology,
    color: Value,
    color_interpolation: Interpolation,
    opacity: Value,
    opacity_interpolation: Interpolation,
    guide: bool,
    double_sided: bool,
    instancer: Option<ScenePath>,
}

impl MeshDesc {
    pub fn new(id: ScenePath, points: Vec<Vec3>, topology: MeshTopology) -> Self {
        Self {
            id,
            transform: Mat4::IDENTITY,
            points,
            topology,
            color: Value::Vec3(Vec3::ONE),
            color_interpolation: Interpolation::Constant,
            opacity: Value::Float(1.0),
            opacity_interpolation: Interpolation::Constant,
            guide: false,
            double_sided: false,
            instancer: None,
        }
    }

    /// A `-1..1` cube; the loop scheme gets triangles, others get quads.
    pub fn cube(id: ScenePath, scheme: SubdivScheme) -> Self {
        let (points, topology) = geometry::cube(scheme);
        Self::new(id, points, topology)
    }

    /// A `-1..1` plane of `nx` by `ny` quads.
    pub fn grid(id: ScenePath, nx: u32, ny: u32) -> Self {
        let (points, topology) = geometry::grid(nx, ny);
        Self::new(id, points, topology)
    }

    pub fn transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn at(self, translation: Vec3) -> Self {
        self.transform(Mat4::from_translation(translation))
    }

    pub fn color(mut self, color: impl Into<Value>, interpolation: Interpolation) -> Self {
        self.color = color.into();
        self.color_interpolation = interpolation;
        self
    }

    pub fn opacity(mut self, opacity: impl Into<Value>, interpolation: Interpolation) -> Self {
        self.opacity = opacity.into();
        self.opacity_interpolation = interpolation;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.topology.orientation = orientation;
        self
    }

    /// Tags the mesh as a guide, so only tasks asking for guides draw it.
    pub fn guide(mut self) -> Self {
        self.guide = true;
        self
    }

    pub fn double_sided(mut self) -> Self {
        self.double_sided = true;
        self
    }

    /// Makes the mesh a prototype of `instancer`.
    pub fn instancer(mut self, instancer: ScenePath) -> Self {
        self.instancer = Some(instancer);
        self
    }
}

#[derive(Clone, Debug, Default)]
struct RprimRecord {
    kind: RprimKind,
    guide: bool,
    double_sided: bool,
    instancer: Option<ScenePath>,
}

/// Everything animating one prim. `advance` marks `dirty` every frame.
#[derive(Clone, Copy, Debug, Default)]
struct Animation {
    dirty: DirtyBits,
    spin_base: Option<Mat4>,
}

fn spin_transform(base: Mat4, degrees: f32) -> Mat4 {
    let radians = degrees.to_radians();
    base * Mat4::from_rotation_y(radians) * Mat4::from_rotation_x(radians)
}

pub struct StandardDelegate {
    tokens: Rc<TokenRegistry>,
    config: DelegateConfig,
    cache: AttributeValueCache,
    dirty: DirtyTracker,
    rprims: BTreeMap<ScenePath, RprimRecord>,
    instancers: BTreeMap<ScenePath, InstancerRecord>,
    animations: BTreeMap<ScenePath, Animation>,
    primvars: HashMap<ScenePath, Vec<PrimvarDescriptor>>,
    visibility: HashMap<ScenePath, bool>,
    refine_levels: HashMap<ScenePath, i32>,
    materials: BTreeMap<ScenePath, Value>,
    material_bindings: HashMap<ScenePath, ScenePath>,
    lights: BTreeSet<ScenePath>,
    cameras: BTreeSet<ScenePath>,
    tasks: TaskGraphBuilder,
    frame: u64,
}

impl StandardDelegate {
    /// Creates an empty scene with the configured camera already present.
    pub fn new(tokens: Rc<TokenRegistry>, config: DelegateConfig) -> Self {
        let tasks = TaskGraphBuilder::new(tokens.clone(), config.camera_path.clone())
            .with_viewport(config.viewport);
        let camera = config.camera_path.clone();
        let mut delegate = Self {
            tokens,
            config,
            cache: AttributeValueCache::new(),
            dirty: DirtyTracker::new(),
            rprims: BTreeMap::new(),
            instancers: BTreeMap::new(),
            animations: BTreeMap::new(),
            primvars: HashMap::new(),
            visibility: HashMap::new(),
            refine_levels: HashMap::new(),
            materials: BTreeMap::new(),
            material_bindings: HashMap::new(),
            lights: BTreeSet::new(),
            cameras: BTreeSet::new(),
            tasks,
            frame: 0,
        };
        delegate.add_camera(camera);
        delegate
    }

    pub fn tokens(&self) -> &Rc<TokenRegistry> {
        &self.tokens
    }

    pub fn config(&self) -> &DelegateConfig {
        &self.config
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn cache(&self) -> &AttributeValueCache {
        &self.cache
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn mark_dirty(&mut self, id: &ScenePath, bits: DirtyBits) {
        self.dirty.mark_dirty(id, bits);
    }

    pub fn is_dirty(&self, id: &ScenePath, bits: DirtyBits) -> bool {
        self.dirty.is_dirty(id, bits)
    }

    // ---- meshes ----

    /// Inserts a mesh and marks it fully dirty.
    ///
    /// # Panics
    ///
    /// Panics if the topology addresses points the mesh does not have.
    pub fn add_mesh(&mut self, desc: MeshDesc) {
        if let Err(e) = desc.topology.validate_indices(desc.points.len()) {
            panic!("mesh {}: {e}", desc.id);
        }
        let t = self.tokens.clone();
        let id = desc.id;

        self.cache.set(&id, &t.transform, desc.transform);
        self.cache.set(&id, &t.points, desc.points);
        self.cache.set(&id, &t.topology, desc.topology);
        self.cache.set(&id, &t.color, desc.color);
        self.cache.set(&id, &t.opacity, desc.opacity);

        self.declare_primvar(&id, t.points.clone(), Interpolation::Vertex, PrimvarRole::Point);
        self.declare_primvar(&id, t.color.clone(), desc.color_interpolation, PrimvarRole::Color);
        self.declare_primvar(&id, t.opacity.clone(), desc.opacity_interpolation, PrimvarRole::None);

        if let Some(instancer) = &desc.instancer {
            if !self.instancers.contains_key(instancer) {
                self.add_instancer(instancer.clone(), Mat4::IDENTITY);
            }
            if let Some(record) = self.instancers.get_mut(instancer) {
                record.add_prototype(id.clone());
            }
        }

        log::debug!("inserted mesh {id}");
        self.rprims.insert(
            id.clone(),
            RprimRecord {
                kind: RprimKind::Mesh,
                guide: desc.guide,
                double_sided: desc.double_sided,
                instancer: desc.instancer,
            },
        );
        self.dirty.insert(&id);
    }

    pub fn add_cube(&mut self, id: ScenePath, transform: Mat4) {
        self.add_mesh(MeshDesc::cube(id, SubdivScheme::CatmullClark).transform(transform));
    }

    pub fn add_grid(&mut self, id: ScenePath, nx: u32, ny: u32, transform: Mat4) {
        self.add_mesh(MeshDesc::grid(id, nx, ny).transform(transform));
    }

    /// Inserts an animated ripple sheet whose points are computed per frame.
    pub fn add_ripple_grid(&mut self, id: ScenePath, ripple: RippleGrid) {
        let t = self.tokens.clone();
        let step = self.config.ripple_phase_per_frame;

        self.cache.register_fallback(&id, &t.points, move |_, frame| {
            Value::Vec3Array(ripple.points(frame as f32 * step))
        });
        self.cache.set(&id, &t.normals, ripple.normals());
        self.cache.set(&id, &t.topology, ripple.topology());
        self.cache.set(&id, &t.transform, Mat4::IDENTITY);
        self.cache.set(&id, &t.color, Vec3::new(0.8, 0.8, 0.8));

        self.declare_primvar(&id, t.points.clone(), Interpolation::Vertex, PrimvarRole::Point);
        self.declare_primvar(&id, t.normals.clone(), Interpolation::Vertex, PrimvarRole::Normal);
        self.declare_primvar(&id, t.color.clone(), Interpolation::Constant, PrimvarRole::Color);

        log::debug!("inserted ripple grid {id}");
        self.rprims.insert(id.clone(), RprimRecord::default());
        self.animate(&id, DirtyBits::POINTS | DirtyBits::EXTENT);
        self.dirty.insert(&id);
    }

    /// Inserts a point cloud whose per-point widths pulse each frame.
    pub fn add_points(&mut self, id: ScenePath, lattice: PointLattice) {
        let t = self.tokens.clone();
        let step = self.config.sway_phase_per_frame;

        self.cache.set(&id, &t.points, lattice.points());
        self.cache.register_fallback(&id, &t.widths, move |_, frame| {
            Value::FloatArray(lattice.widths(frame as f32 * step))
        });
        self.cache.set(&id, &t.transform, Mat4::IDENTITY);

        self.declare_primvar(&id, t.points.clone(), Interpolation::Vertex, PrimvarRole::Point);
        self.declare_primvar(&id, t.widths.clone(), Interpolation::Vertex, PrimvarRole::None);

        log::debug!("inserted points {id}");
        let record = RprimRecord {
            kind: RprimKind::Points,
            ..Default::default()
        };
        self.rprims.insert(id.clone(), record);
        self.animate(&id, DirtyBits::WIDTHS);
        self.dirty.insert(&id);
    }

    /// Inserts a field of cubic curves whose control points sway each frame.
    pub fn add_basis_curves(&mut self, id: ScenePath, curves: CurveGrid) {
        let t = self.tokens.clone();
        let step = self.config.sway_phase_per_frame;

        self.cache.register_fallback(&id, &t.points, move |_, frame| {
            Value::Vec3Array(curves.points(frame as f32 * step))
        });
        self.cache.set(&id, &t.topology, curves.topology());
        self.cache.set(&id, &t.transform, Mat4::IDENTITY);

        self.declare_primvar(&id, t.points.clone(), Interpolation::Vertex, PrimvarRole::Point);

        log::debug!("inserted basis curves {id}");
        let record = RprimRecord {
            kind: RprimKind::BasisCurves,
            ..Default::default()
        };
        self.rprims.insert(id.clone(), record);
        self.animate(&id, DirtyBits::POINTS | DirtyBits::EXTENT);
        self.dirty.insert(&id);
    }

    /// Removes a prim and every value, primvar, binding and animation it
    /// owns, dropping any pending dirty bits. Returns false if `id` is not a
    /// prim.
    pub fn remove_rprim(&mut self, id: &ScenePath) -> bool {
        if self.rprims.remove(id).is_none() {
            return false;
        }
        self.cache.clear_object(id);
        self.primvars.remove(id);
        self.visibility.remove(id);
        self.refine_levels.remove(id);
        self.material_bindings.remove(id);
        self.animations.remove(id);
        self.dirty.consume_dirty(id);
        log::debug!("removed {id}");
        true
    }

    fn animate(&mut self, id: &ScenePath, bits: DirtyBits) {
        self.animations.entry(id.clone()).or_default().dirty |= bits;
    }

    /// Starts spinning an existing prim about Y then X, `start_degrees` at frame 0.
    ///
    /// The prim's stored transform becomes the base the rotation is applied
    /// under. Spinning an already spinning prim restarts the angle and keeps
    /// the base. Other animations on the prim keep running. Returns false if
    /// `id` is not a prim.
    pub fn add_spin(&mut self, id: &ScenePath, start_degrees: f32) -> bool {
        if !self.rprims.contains_key(id) {
            return false;
        }
        let t = self.tokens.clone();
        let stored = self.cache.remove(id, &t.transform).and_then(|v| v.as_mat4());
        let animation = self.animations.entry(id.clone()).or_default();
        let base = stored.or(animation.spin_base).unwrap_or(Mat4::IDENTITY);
        animation.spin_base = Some(base);
        animation.dirty |= DirtyBits::TRANSFORM;

        let step = self.config.spin_degrees_per_frame;
        self.cache.register_fallback(id, &t.transform, move |_, frame| {
            Value::Mat4(spin_transform(base, start_degrees + frame as f32 * step))
        });
        self.dirty.mark_dirty(id, DirtyBits::TRANSFORM);
        true
    }

    pub fn is_double_sided(&self, id: &ScenePath) -> bool {
        self.rprims.get(id).is_some_and(|m| m.double_sided)
    }

    /// Writes an attribute and marks the category it belongs to.
    ///
    /// An explicit write wins over any procedural value, including animation.
    pub fn set_attribute(&mut self, id: &ScenePath, name: &Token, value: impl Into<Value>) {
        self.cache.set(id, name, value);
        let bits = self.dirty_bits_for_attribute(name);
        self.dirty.mark_dirty(id, bits);
    }

    pub fn update_transform(&mut self, id: &ScenePath, transform: Mat4) {
        let name = self.tokens.transform.clone();
        self.set_attribute(id, &name, transform);
    }

    /// Adds or replaces a primvar and declares it for `interpolation`.
    pub fn add_primvar(
        &mut self,
        id: &ScenePath,
        name: Token,
        value: impl Into<Value>,
        interpolation: Interpolation,
        role: PrimvarRole,
    ) {
        self.cache.set(id, &name, value);
        self.declare_primvar(id, name, interpolation, role);
        self.dirty.mark_dirty(id, DirtyBits::PRIMVAR);
    }

    pub fn set_visible(&mut self, id: &ScenePath, visible: bool) {
        self.visibility.insert(id.clone(), visible);
        self.dirty.mark_dirty(id, DirtyBits::VISIBILITY);
    }

    /// Sets the refine level used by every mesh without an override.
    pub fn set_refine_level(&mut self, level: i32) {
        self.config.refine_level = level;
        for (id, record) in &self.rprims {
            if record.kind == RprimKind::Mesh {
                self.dirty.mark_dirty(id, DirtyBits::DISPLAY_STYLE);
            }
        }
    }

    pub fn set_refine_level_for(&mut self, id: &ScenePath, level: i32) {
        self.refine_levels.insert(id.clone(), level);
        self.dirty.mark_dirty(id, DirtyBits::DISPLAY_STYLE);
    }

    fn declare_primvar(
        &mut self,
        id: &ScenePath,
        name: Token,
        interpolation: Interpolation,
        role: PrimvarRole,
    ) {
        let list = self.primvars.entry(id.clone()).or_default();
        list.retain(|d| d.name != name);
        list.push(PrimvarDescriptor::new(name, interpolation, role));
    }

    fn dirty_bits_for_attribute(&self, name: &Token) -> DirtyBits {
        let t = &self.tokens;
        if *name == t.points {
            DirtyBits::POINTS | DirtyBits::EXTENT
        } else if *name == t.normals {
            DirtyBits::NORMALS
        } else if *name == t.widths {
            DirtyBits::WIDTHS
        } else if *name == t.transform {
            DirtyBits::TRANSFORM
        } else if *name == t.topology {
            DirtyBits::TOPOLOGY
        } else if *name == t.material {
            DirtyBits::MATERIAL
        } else {
            DirtyBits::PRIMVAR
        }
    }

    // ---- instancers ----

    pub fn add_instancer(&mut self, id: ScenePath, root_transform: Mat4) {
        log::debug!("inserted instancer {id}");
        self.dirty.insert(&id);
        self.instancers
            .insert(id.clone(), InstancerRecord::new(id, root_transform));
    }

    pub fn instancer(&self, id: &ScenePath) -> Option<&InstancerRecord> {
        self.instancers.get(id)
    }

    /// Replaces the per-instance prototype indices and transforms.
    ///
    /// Also publishes `instanceIndices`, `instanceTransform` and the
    /// decomposed `translate`, `rotate` and `scale` primvars, then marks the
    /// instancer and its prototypes.
    pub fn set_instancer_properties(
        &mut self,
        id: &ScenePath,
        prototype_indices: Vec<i32>,
        transforms: Vec<Mat4>,
    ) -> Result<(), InstancerError> {
        let record = self
            .instancers
            .get_mut(id)
            .ok_or_else(|| InstancerError::UnknownInstancer(id.clone()))?;
        record.set_instances(prototype_indices.clone(), transforms.clone())?;
        let prototypes = record.prototypes().to_vec();

        let mut translate = Vec::with_capacity(transforms.len());
        let mut rotate = Vec::with_capacity(transforms.len());
        let mut scale = Vec::with_capacity(transforms.len());
        for m in &transforms {
            let (s, r, tr) = m.to_scale_rotation_translation();
            translate.push(tr);
            rotate.push(Vec4::from(r));
            scale.push(s);
        }

        let t = self.tokens.clone();
        self.cache.set(id, &t.instance_indices, prototype_indices);
        self.cache.set(id, &t.instance_transform, transforms);
        self.cache.set(id, &t.translate, translate);
        self.cache.set(id, &t.rotate, rotate);
        self.cache.set(id, &t.scale, scale);
        for name in [&t.instance_transform, &t.translate, &t.rotate, &t.scale] {
            self.declare_primvar(id, name.clone(), Interpolation::Instance, PrimvarRole::None);
        }

        self.dirty
            .mark_dirty(id, DirtyBits::INSTANCE_INDEX | DirtyBits::PRIMVAR);
        for prototype in &prototypes {
            self.dirty
                .mark_dirty(prototype, DirtyBits::INSTANCE_INDEX | DirtyBits::INSTANCER);
        }
        Ok(())
    }

    pub fn set_instancer_transform(
        &mut self,
        id: &ScenePath,
        root_transform: Mat4,
    ) -> Result<(), InstancerError> {
        let record = self
            .instancers
            .get_mut(id)
            .ok_or_else(|| InstancerError::UnknownInstancer(id.clone()))?;
        record.root_transform = root_transform;
        let prototypes = record.prototypes().to_vec();
        self.dirty.mark_dirty(id, DirtyBits::TRANSFORM);
        for prototype in &prototypes {
            self.dirty.mark_dirty(prototype, DirtyBits::INSTANCER);
        }
        Ok(())
    }

    /// Prototype path and instance transform of one flat instance slot.
    pub fn resolve_instance(
        &self,
        instancer: &ScenePath,
        slot: usize,
    ) -> Option<(ScenePath, Mat4)> {
        let record = self.instancers.get(instancer)?;
        record.resolve(slot).map(|(p, m)| (p.clone(), m))
    }

    // ---- materials and lights ----

    pub fn add_material_resource(&mut self, id: ScenePath, resource: impl Into<Value>) {
        self.dirty.insert(&id);
        self.materials.insert(id, resource.into());
    }

    pub fn get_material_resource(&self, material: &ScenePath) -> Value {
        self.materials.get(material).cloned().unwrap_or_default()
    }

    pub fn bind_material(&mut self, rprim: &ScenePath, material: ScenePath) {
        self.material_bindings.insert(rprim.clone(), material);
        self.dirty.mark_dirty(rprim, DirtyBits::MATERIAL);
    }

    /// Adds a light whose shadows cover the whole scene.
    pub fn add_simple_light(&mut self, id: ScenePath, params: ParamBlock) {
        let t = self.tokens.clone();
        let shadow_collection = ParamBlock::new()
            .with(&t.name, t.geometry.clone())
            .with(&t.repr, t.refined.clone())
            .with(&t.root_path, ScenePath::root());
        self.cache.set(&id, &t.light_params, params);
        self.cache.set(&id, &t.shadow_params, ParamBlock::new());
        self.cache.set(&id, &t.shadow_collection, shadow_collection);
        self.cache.set(&id, &t.transform, Mat4::IDENTITY);
        self.dirty.insert(&id);
        self.lights.insert(id);
    }

    // ---- cameras ----

    pub fn add_camera(&mut self, id: ScenePath) {
        let t = self.tokens.clone();
        self.cache.set(&id, &t.world_to_view_matrix, Mat4::IDENTITY);
        self.cache.set(&id, &t.projection_matrix, Mat4::IDENTITY);
        self.cache.set(&id, &t.window_policy, t.fit.clone());
        self.dirty.insert(&id);
        self.cameras.insert(id);
    }

    /// Updates the configured camera. See [`set_camera_for`](Self::set_camera_for).
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        let camera = self.config.camera_path.clone();
        self.set_camera_for(&camera, view, projection);
    }

    /// Writes a camera's matrices and window policy, then marks its
    /// transform dirty.
    ///
    /// Lighting tasks are not re-synced here. Callers that move lights with
    /// the camera must mark them themselves.
    pub fn set_camera_for(&mut self, camera: &ScenePath, view: Mat4, projection: Mat4) {
        if !self.cameras.contains(camera) {
            self.add_camera(camera.clone());
        }
        let t = self.tokens.clone();
        self.cache.set(camera, &t.world_to_view_matrix, view);
        self.cache.set(camera, &t.projection_matrix, projection);
        self.cache.set(camera, &t.window_policy, t.fit.clone());
        self.dirty.mark_dirty(camera, DirtyBits::TRANSFORM);
    }

    // ---- tasks ----

    pub fn add_task(&mut self, kind: TaskKind, id: ScenePath) -> &mut TaskDescriptor {
        self.dirty.insert(&id);
        self.tasks.add_task(kind, id)
    }

    /// Adds the usual setup, light, render, pick and colour-correction tasks
    /// and returns their ids in execution order.
    pub fn add_default_tasks(&mut self) -> Vec<ScenePath> {
        let defaults = [
            (TaskKind::RenderSetup, "/renderSetupTask"),
            (TaskKind::SimpleLight, "/simpleLightTask"),
            (TaskKind::Render, "/renderTask"),
            (TaskKind::Pick, "/pickTask"),
            (TaskKind::ColorCorrection, "/colorCorrectionTask"),
        ];
        defaults
            .into_iter()
            .map(|(kind, path)| {
                let id = ScenePath::from_static(path);
                self.add_task(kind, id.clone());
                id
            })
            .collect()
    }

    /// Writes one top-level task entry and marks the bits it implies.
    /// Returns false for unknown tasks.
    pub fn set_task_param(
        &mut self,
        task: &ScenePath,
        name: &Token,
        value: impl Into<Value>,
    ) -> bool {
        match self.tasks.set_param(task, name, value) {
            Some(bits) => {
                self.dirty.mark_dirty(task, bits);
                true
            }
            None => false,
        }
    }

    pub fn get_task_param(&self, task: &ScenePath, name: &Token) -> Value {
        self.tasks.get_param(task, name)
    }

    /// Pushes a new viewport into every render-setup task.
    pub fn set_viewport(&mut self, viewport: Vec4) {
        self.config.viewport = viewport;
        for id in self.tasks.set_viewport(viewport) {
            self.dirty.mark_dirty(&id, DirtyBits::PARAMS);
        }
    }

    pub fn task_graph(&self) -> &TaskGraphBuilder {
        &self.tasks
    }

    pub fn task_ids(&self) -> Vec<ScenePath> {
        self.tasks.ids()
    }
}

impl SceneDelegate for StandardDelegate {
    fn get(&self, id: &ScenePath, name: &Token) -> Value {
        let value = self.cache.get(id, name, self.frame);
        if !value.is_empty() {
            return value;
        }
        if self.tasks.contains(id) {
            return self.tasks.get_param(id, name);
        }
        if *name == self.tokens.material {
            if let Some(material) = self.material_bindings.get(id) {
                return Value::Path(material.clone());
            }
        }
        log::debug!("no value for {id}.{name}");
        Value::Empty
    }

    fn get_transform(&self, id: &ScenePath) -> Mat4 {
        self.get(id, &self.tokens.transform)
            .as_mat4()
            .unwrap_or(Mat4::IDENTITY)
    }

    fn get_visible(&self, id: &ScenePath) -> bool {
        self.visibility.get(id).copied().unwrap_or(true)
    }

    fn get_extent(&self, id: &ScenePath) -> Aabb {
        self.get(id, &self.tokens.points)
            .as_vec3_array()
            .map(Aabb::from_points)
            .filter(|b| !b.is_empty())
            .unwrap_or_else(Aabb::unit)
    }

    fn get_rprim_kind(&self, id: &ScenePath) -> RprimKind {
        self.rprims.get(id).map(|r| r.kind).unwrap_or_default()
    }

    fn get_mesh_topology(&self, id: &ScenePath) -> MeshTopology {
        match self.get(id, &self.tokens.topology) {
            Value::Topology(topology) => topology.with_refine_level(self.get_refine_level(id)),
            _ => MeshTopology::default(),
        }
    }

    fn get_basis_curves_topology(&self, id: &ScenePath) -> BasisCurvesTopology {
        match self.get(id, &self.tokens.topology) {
            Value::Curves(topology) => topology,
            _ => BasisCurvesTopology::default(),
        }
    }

    fn get_primvar_descriptors(
        &self,
        id: &ScenePath,
        interpolation: Interpolation,
    ) -> Vec<PrimvarDescriptor> {
        self.primvars
            .get(id)
            .map(|list| {
                list.iter()
                    .filter(|d| d.interpolation == interpolation)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_instance_indices(&self, instancer: &ScenePath, prototype: &ScenePath) -> Vec<i32> {
        self.instancers
            .get(instancer)
            .map(|r| r.instance_indices(prototype))
            .unwrap_or_default()
    }

    fn get_instancer_transform(&self, instancer: &ScenePath) -> Mat4 {
        self.instancers
            .get(instancer)
            .map(|r| r.root_transform)
            .unwrap_or(Mat4::IDENTITY)
    }

    fn get_instancer_id(&self, prim: &ScenePath) -> Option<ScenePath> {
        self.rprims.get(prim).and_then(|m| m.instancer.clone())
    }

    fn get_refine_level(&self, id: &ScenePath) -> i32 {
        self.refine_levels
            .get(id)
            .copied()
            .unwrap_or(self.config.refine_level)
    }

    fn get_material_id(&self, id: &ScenePath) -> Option<ScenePath> {
        self.material_bindings.get(id).cloned()
    }

    fn get_camera_param_value(&self, camera: &ScenePath, name: &Token) -> Value {
        self.cache.get(camera, name, self.frame)
    }

    fn get_task_render_tags(&self, task: &ScenePath) -> Vec<Token> {
        self.tasks
            .get_param(task, &self.tokens.render_tags)
            .as_token_array()
            .map(<[Token]>::to_vec)
            .unwrap_or_default()
    }

    fn get_render_tag(&self, id: &ScenePath) -> Token {
        if self.rprims.get(id).is_some_and(|m| m.guide) {
            self.tokens.guide.clone()
        } else {
            self.tokens.geometry.clone()
        }
    }

    fn consume_dirty(&mut self, id: &ScenePath) -> DirtyBits {
        self.dirty.consume_dirty(id)
    }

    fn rprim_ids(&self) -> Vec<ScenePath> {
        self.rprims.keys().cloned().collect()
    }

    fn instancer_ids(&self) -> Vec<ScenePath> {
        self.instancers.keys().cloned().collect()
    }

    fn light_ids(&self) -> Vec<ScenePath> {
        self.lights.iter().cloned().collect()
    }

    fn advance(&mut self) {
        self.frame += 1;
        for (id, animation) in &self.animations {
            self.dirty.mark_dirty(id, animation.dirty);
        }
        log::debug!("advanced to frame {}", self.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    fn delegate() -> StandardDelegate {
        StandardDelegate::new(Rc::new(TokenRegistry::new()), DelegateConfig::default())
    }

    #[test]
    fn cube_has_valid_topology_and_extent() {
        let mut d = delegate();
        let cube = path("/cube0");
        d.add_cube(cube.clone(), Mat4::IDENTITY);

        let topology = d.get_mesh_topology(&cube);
        let sum: i32 = topology.face_vertex_counts().iter().sum();
        assert_eq!(sum as usize, topology.face_vertex_indices().len());

        let extent = d.get_extent(&cube);
        let points = d.get(&cube, &d.tokens().points);
        assert!(points.as_vec3_array().unwrap().iter().all(|p| extent.contains(*p)));
    }

    #[test]
    fn unknown_ids_read_as_defaults() {
        let d = delegate();
        let ghost = path("/ghost");
        assert!(d.get(&ghost, &d.tokens().points).is_empty());
        assert_eq!(d.get_transform(&ghost), Mat4::IDENTITY);
        assert_eq!(d.get_extent(&ghost), Aabb::unit());
        assert_eq!(d.get_mesh_topology(&ghost).face_count(), 0);
        assert!(d.get_visible(&ghost));
    }

    #[test]
    fn new_meshes_are_fully_dirty() {
        let mut d = delegate();
        let cube = path("/cube0");
        d.add_cube(cube.clone(), Mat4::IDENTITY);
        assert_eq!(d.consume_dirty(&cube), DirtyBits::all());
        assert_eq!(d.consume_dirty(&cube), DirtyBits::empty());
    }

    #[test]
    fn spin_marks_transform_each_advance() {
        let mut d = delegate();
        let cube = path("/cube");
        d.add_cube(cube.clone(), Mat4::from_translation(Vec3::X));
        assert!(d.add_spin(&cube, 45.0));
        d.consume_dirty(&cube);

        let before = d.get_transform(&cube);
        d.advance();
        assert_eq!(d.consume_dirty(&cube), DirtyBits::TRANSFORM);
        let after = d.get_transform(&cube);
        assert_ne!(before, after);
        assert_eq!(after.w_axis.truncate(), Vec3::X);
        assert_eq!(after, spin_transform(Mat4::from_translation(Vec3::X), 46.0));
    }

    #[test]
    fn ripple_extent_bounds_points() {
        let mut d = delegate();
        let ripple = path("/ripple");
        d.add_ripple_grid(ripple.clone(), RippleGrid::new(20, 20));
        let points_token = d.tokens().points.clone();
        for _ in 0..3 {
            let points = d.get(&ripple, &points_token);
            let points = points.as_vec3_array().unwrap();
            let extent = d.get_extent(&ripple);
            assert!(points.iter().all(|p| extent.contains(*p)));
            d.advance();
            assert!(d.is_dirty(&ripple, DirtyBits::POINTS));
        }
        assert_eq!(
            d.get(&ripple, &points_token),
            d.get(&ripple, &points_token)
        );
    }

    #[test]
    fn constant_color_is_declared_and_present() {
        let mut d = delegate();
        let cube = path("/cube");
        d.add_mesh(
            MeshDesc::cube(cube.clone(), SubdivScheme::Loop)
                .color(Vec4::new(1.0, 0.0, 0.0, 1.0), Interpolation::Constant),
        );
        let constant = d.get_primvar_descriptors(&cube, Interpolation::Constant);
        let color = d.tokens().color.clone();
        assert!(constant.iter().any(|p| p.name == color));
        assert!(!d.get(&cube, &color).is_empty());

        let vertex = d.get_primvar_descriptors(&cube, Interpolation::Vertex);
        assert_eq!(vertex.len(), 1);
        assert_eq!(vertex[0].role, PrimvarRole::Point);
    }

    #[test]
    fn set_camera_writes_then_marks() {
        let mut d = delegate();
        let camera = d.config().camera_path.clone();
        d.add_simple_light(path("/light"), ParamBlock::new());
        d.consume_dirty(&camera);
        d.consume_dirty(&path("/light"));

        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0));
        d.set_camera(view, Mat4::IDENTITY);

        let t = d.tokens().clone();
        assert_eq!(
            d.get_camera_param_value(&camera, &t.world_to_view_matrix).as_mat4(),
            Some(view)
        );
        assert_eq!(
            d.get_camera_param_value(&camera, &t.window_policy).as_token(),
            Some(&t.fit)
        );
        assert_eq!(d.consume_dirty(&camera), DirtyBits::TRANSFORM);
        assert_eq!(d.consume_dirty(&path("/light")), DirtyBits::empty());
    }

    #[test]
    fn instancer_properties_are_published() {
        let mut d = delegate();
        let instancer = path("/instancerTop");
        let proto = path("/protoTop");
        d.add_instancer(instancer.clone(), Mat4::IDENTITY);
        d.add_mesh(
            MeshDesc::cube(proto.clone(), SubdivScheme::CatmullClark).instancer(instancer.clone()),
        );
        d.consume_dirty(&proto);

        let transforms: Vec<Mat4> = [3.0, 0.0, -3.0]
            .iter()
            .map(|x| Mat4::from_translation(Vec3::new(*x, 0.0, 2.0)))
            .collect();
        d.set_instancer_properties(&instancer, vec![0, 0, 0], transforms)
            .unwrap();

        assert_eq!(d.get_instance_indices(&instancer, &proto), vec![0, 1, 2]);
        assert_eq!(d.get_instancer_id(&proto), Some(instancer.clone()));
        assert!(d.consume_dirty(&proto).contains(DirtyBits::INSTANCE_INDEX));

        let t = d.tokens().clone();
        let translate = d.get(&instancer, &t.translate);
        assert_eq!(translate.as_vec3_array().unwrap()[2], Vec3::new(-3.0, 0.0, 2.0));
        let instance = d.get_primvar_descriptors(&instancer, Interpolation::Instance);
        assert_eq!(instance.len(), 4);

        let (resolved, xf) = d.resolve_instance(&instancer, 1).unwrap();
        assert_eq!(resolved, proto);
        assert_eq!(xf.w_axis.truncate(), Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn bad_instancer_data_is_rejected() {
        let mut d = delegate();
        let instancer = path("/instancer");
        assert!(matches!(
            d.set_instancer_properties(&instancer, vec![], vec![]),
            Err(InstancerError::UnknownInstancer(_))
        ));
        d.add_instancer(instancer.clone(), Mat4::IDENTITY);
        assert!(matches!(
            d.set_instancer_properties(&instancer, vec![0], vec![Mat4::IDENTITY]),
            Err(InstancerError::PrototypeOutOfRange { .. })
        ));
    }

    #[test]
    fn task_params_mark_bits() {
        let mut d = delegate();
        let ids = d.add_default_tasks();
        let render = path("/renderTask");
        assert_eq!(ids.len(), 5);
        d.consume_dirty(&render);

        let t = d.tokens().clone();
        assert!(d.set_task_param(&render, &t.collection, ParamBlock::new()));
        assert_eq!(d.consume_dirty(&render), DirtyBits::COLLECTION);
        assert!(d.set_task_param(&render, &t.params, ParamBlock::new()));
        assert_eq!(d.consume_dirty(&render), DirtyBits::PARAMS);
        assert!(!d.set_task_param(&path("/missing"), &t.params, ParamBlock::new()));

        assert!(d.get(&render, &t.params).as_document().is_some());
        assert!(d.get_task_render_tags(&render).is_empty());
    }

    #[test]
    fn materials_bind_and_mark() {
        let mut d = delegate();
        let cube = path("/cube");
        let material = path("/material");
        d.add_cube(cube.clone(), Mat4::IDENTITY);
        d.consume_dirty(&cube);
        let t = d.tokens().clone();
        assert!(d.get(&cube, &t.material).is_empty());

        d.add_material_resource(material.clone(), ParamBlock::new().with(&t.color, Vec3::X));
        d.bind_material(&cube, material.clone());
        assert_eq!(d.consume_dirty(&cube), DirtyBits::MATERIAL);
        assert_eq!(d.get_material_id(&cube), Some(material.clone()));
        assert_eq!(d.get(&cube, &t.material).as_path(), Some(&material));
        assert!(d.get_material_resource(&material).as_document().is_some());
    }

    #[test]
    fn refine_level_marks_every_mesh() {
        let mut d = delegate();
        let a = path("/a");
        let b = path("/b");
        d.add_cube(a.clone(), Mat4::IDENTITY);
        d.add_cube(b.clone(), Mat4::IDENTITY);
        d.consume_dirty(&a);
        d.consume_dirty(&b);

        d.set_refine_level(2);
        d.set_refine_level_for(&b, 1);
        assert_eq!(d.consume_dirty(&a), DirtyBits::DISPLAY_STYLE);
        assert_eq!(d.get_mesh_topology(&a).refine_level, 2);
        assert_eq!(d.get_mesh_topology(&b).refine_level, 1);
    }

    #[test]
    fn guides_are_tagged() {
        let mut d = delegate();
        let guide = path("/guide");
        d.add_mesh(MeshDesc::grid(guide.clone(), 2, 2).guide().double_sided());
        assert_eq!(d.get_render_tag(&guide), d.tokens().guide);
        assert!(d.is_double_sided(&guide));
    }

    #[test]
    fn explicit_points_mark_extent() {
        let mut d = delegate();
        let cube = path("/cube");
        d.add_cube(cube.clone(), Mat4::IDENTITY);
        d.consume_dirty(&cube);
        let points = d.tokens().points.clone();
        d.set_attribute(&cube, &points, vec![Vec3::splat(4.0), Vec3::splat(-4.0)]);
        assert_eq!(d.consume_dirty(&cube), DirtyBits::POINTS | DirtyBits::EXTENT);
        assert_eq!(d.get_extent(&cube).max, Vec3::splat(4.0));
    }

    #[test]
    fn spin_and_ripple_on_one_prim_both_mark() {
        let mut d = delegate();
        let ripple = path("/ripple");
        d.add_ripple_grid(ripple.clone(), RippleGrid::new(8, 8));
        assert!(d.add_spin(&ripple, 0.0));
        d.consume_dirty(&ripple);

        d.advance();
        let bits = d.consume_dirty(&ripple);
        assert!(bits.contains(DirtyBits::POINTS | DirtyBits::EXTENT));
        assert!(bits.contains(DirtyBits::TRANSFORM));
    }

    #[test]
    fn spinning_twice_keeps_the_base_translation() {
        let mut d = delegate();
        let cube = path("/cube1");
        let base = Mat4::from_translation(Vec3::new(5.0, 0.0, 5.0));
        d.add_cube(cube.clone(), base);
        assert!(d.add_spin(&cube, 0.0));
        assert!(d.add_spin(&cube, 90.0));

        let transform = d.get_transform(&cube);
        assert_eq!(transform.w_axis.truncate(), Vec3::new(5.0, 0.0, 5.0));
        assert!(transform.abs_diff_eq(spin_transform(base, 90.0), 1e-5));
    }

    #[test]
    fn points_pulse_their_widths() {
        let mut d = delegate();
        let points = path("/points");
        let lattice = PointLattice::new(4);
        d.add_points(points.clone(), lattice);
        let t = d.tokens().clone();
        assert_eq!(d.get_rprim_kind(&points), RprimKind::Points);
        assert_eq!(d.consume_dirty(&points), DirtyBits::all());

        let widths = d.get(&points, &t.widths);
        let widths = widths.as_float_array().unwrap().to_vec();
        assert_eq!(widths.len(), lattice.point_count());
        let primvars = d.get_primvar_descriptors(&points, Interpolation::Vertex);
        assert!(primvars.iter().any(|p| p.name == t.widths));

        d.advance();
        assert_eq!(d.consume_dirty(&points), DirtyBits::WIDTHS);
        assert_ne!(d.get(&points, &t.widths).as_float_array().unwrap(), &widths[..]);
    }

    #[test]
    fn curves_expose_their_topology() {
        let mut d = delegate();
        let curves = path("/curves");
        let grid = CurveGrid::new(3);
        d.add_basis_curves(curves.clone(), grid);
        assert_eq!(d.get_rprim_kind(&curves), RprimKind::BasisCurves);

        let topology = d.get_basis_curves_topology(&curves);
        assert_eq!(topology.curve_count(), grid.curve_count());
        assert_eq!(d.get_mesh_topology(&curves).face_count(), 0);
        let points = d.get(&curves, &d.tokens().points);
        assert_eq!(points.as_vec3_array().unwrap().len(), topology.curve_indices().len());

        d.consume_dirty(&curves);
        d.advance();
        assert!(d.is_dirty(&curves, DirtyBits::POINTS));
    }

    #[test]
    fn removed_prims_forget_their_values() {
        let mut d = delegate();
        let cube = path("/cube");
        d.add_cube(cube.clone(), Mat4::IDENTITY);
        d.add_spin(&cube, 0.0);
        let t = d.tokens().clone();

        assert!(d.remove_rprim(&cube));
        assert!(!d.remove_rprim(&cube));
        assert!(!d.rprim_ids().contains(&cube));
        assert!(!d.cache().contains(&cube, &t.points));
        assert!(!d.cache().contains(&cube, &t.transform));

        d.advance();
        assert!(!d.is_dirty(&cube, DirtyBits::all()));
    }
}

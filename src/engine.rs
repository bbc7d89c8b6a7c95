//! A small pull-model engine that runs a task list against a delegate.
//!
//! Tasks execute in list order and share one [`FrameContext`]: the
//! render-setup task publishes the viewport and camera, light tasks record
//! the enabled lights, render tasks sync and collect draw items, and the pick
//! task renders the ID pass when a pick was requested.
//!
//! A task's `children` run right after it. Each task runs at most once per
//! frame, so a child listed again later in the task list is skipped there.
//!
//! Syncing only re-pulls what a prim's consumed [`DirtyBits`] say is stale.
//! Camera matrices are likewise cached and only re-read when the camera is
//! marked dirty, so a camera write that skips the dirty mark goes unseen.
//! Prims the delegate no longer lists are dropped at the start of a frame.
//!
//! Pick coordinates are in window pixels. The render-setup viewport's origin
//! is subtracted before the ID buffer is read.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use glam::Mat4;
//! use hdpick::{
//!     Camera, DelegateConfig, Engine, PickConfig, ScenePath, SoftwareIdPass, StandardDelegate,
//!     TokenRegistry,
//! };
//!
//! let tokens = Rc::new(TokenRegistry::new());
//! let mut delegate = StandardDelegate::new(tokens.clone(), DelegateConfig::default());
//! delegate.add_default_tasks();
//! delegate.add_cube(ScenePath::new("/cube0").unwrap(), Mat4::IDENTITY);
//!
//! let camera = Camera::new().matrices(1.0);
//! delegate.set_camera(camera.view, camera.projection);
//!
//! let mut engine = Engine::new(tokens, SoftwareIdPass::new(), PickConfig::default());
//! engine.request_pick(256, 256);
//! let frame = engine.execute_all(&mut delegate).unwrap();
//! assert_eq!(frame.pick.unwrap().prim_path.as_str(), "/cube0");
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};

use crate::camera::CameraMatrices;
use crate::config::PickConfig;
use crate::delegate::{RprimKind, SceneDelegate, StandardDelegate};
use crate::dirty::DirtyBits;
use crate::geometry::Aabb;
use crate::path::ScenePath;
use crate::picking::{DrawItem, IdPass, PickError, PickHit, PickingResolver};
use crate::task::{TaskDescriptor, TaskKind};
use crate::token::{Token, TokenRegistry};
use crate::value::{ParamBlock, Value};

/// State written by tasks as a frame runs, returned when it finishes.
#[derive(Clone, Debug, Default)]
pub struct FrameContext {
    /// Task ids in the order they ran.
    pub executed: Vec<ScenePath>,
    /// Every non-empty set of dirty bits consumed this frame.
    pub synced: Vec<(ScenePath, DirtyBits)>,
    pub draw_items: Vec<DrawItem>,
    pub viewport: Vec4,
    pub camera_path: Option<ScenePath>,
    pub camera: CameraMatrices,
    pub lights: Vec<ScenePath>,
    pub lighting_enabled: bool,
    pub color_correction: Option<Token>,
    pub pick: Option<PickHit>,
}

impl FrameContext {
    /// Bits consumed for `id` this frame, merged.
    pub fn synced_bits(&self, id: &ScenePath) -> DirtyBits {
        self.synced
            .iter()
            .filter(|(synced, _)| synced == id)
            .fold(DirtyBits::empty(), |acc, (_, bits)| acc | *bits)
    }
}

/// The engine's copy of one prim.
struct RprimState {
    prim_id: u32,
    kind: RprimKind,
    points: Rc<[Vec3]>,
    widths: Rc<[f32]>,
    curve_count: usize,
    triangles: Rc<[[u32; 3]]>,
    transform: Mat4,
    visible: bool,
    extent: Aabb,
    refine_level: i32,
    material: Option<ScenePath>,
    instancer: Option<ScenePath>,
    /// `(slot, instancer root * instance transform)` per drawn instance.
    instances: Vec<(u32, Mat4)>,
}

/// Reads `value` through `cast`, warning when it holds some other type.
fn pull<'v, T: ?Sized>(
    id: &ScenePath,
    name: &Token,
    value: &'v Value,
    cast: impl FnOnce(&'v Value) -> Option<&'v T>,
) -> Option<&'v T> {
    let pulled = cast(value);
    if pulled.is_none() && !value.is_empty() {
        log::warn!("{id}.{name}: unexpected {}", value.type_name());
    }
    pulled
}

impl RprimState {
    fn new(prim_id: u32, kind: RprimKind) -> Self {
        Self {
            prim_id,
            kind,
            points: Rc::from(Vec::new()),
            widths: Rc::from(Vec::new()),
            curve_count: 0,
            triangles: Rc::from(Vec::new()),
            transform: Mat4::IDENTITY,
            visible: true,
            extent: Aabb::unit(),
            refine_level: 0,
            material: None,
            instancer: None,
            instances: Vec::new(),
        }
    }

    /// Only meshes are drawn into the ID pass.
    fn append_draw_items(&self, prim: &ScenePath, items: &mut Vec<DrawItem>) {
        if self.kind != RprimKind::Mesh || !self.visible || self.triangles.is_empty() {
            return;
        }
        let item = |instance_index: u32, transform: Mat4| DrawItem {
            prim: prim.clone(),
            prim_id: self.prim_id,
            instance_index,
            transform,
            points: self.points.clone(),
            triangles: self.triangles.clone(),
        };
        match self.instancer {
            None => items.push(item(0, self.transform)),
            Some(_) => items.extend(
                self.instances
                    .iter()
                    .map(|(slot, xf)| item(*slot, *xf * self.transform)),
            ),
        }
    }
}

pub struct Engine<P> {
    tokens: Rc<TokenRegistry>,
    resolver: PickingResolver<P>,
    rprims: BTreeMap<ScenePath, RprimState>,
    cameras: HashMap<ScenePath, CameraMatrices>,
    pending_pick: Option<(u32, u32)>,
    viewport_origin: (u32, u32),
}

impl<P: IdPass> Engine<P> {
    pub fn new(tokens: Rc<TokenRegistry>, pass: P, config: PickConfig) -> Self {
        Self {
            tokens,
            resolver: PickingResolver::new(pass, config),
            rprims: BTreeMap::new(),
            cameras: HashMap::new(),
            pending_pick: None,
            viewport_origin: (0, 0),
        }
    }

    pub fn resolver(&self) -> &PickingResolver<P> {
        &self.resolver
    }

    /// Asks the next pick task to render the ID pass and resolve `(x, y)`.
    pub fn request_pick(&mut self, x: u32, y: u32) {
        self.pending_pick = Some((x, y));
    }

    /// Resolves another point against the last ID render.
    pub fn pick(&self, x: u32, y: u32) -> Option<PickHit> {
        let (x, y) = self.to_viewport(x, y)?;
        self.resolver.pick(x, y)
    }

    /// Window pixel to ID-buffer pixel; `None` left of or above the viewport.
    fn to_viewport(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let (ox, oy) = self.viewport_origin;
        Some((x.checked_sub(ox)?, y.checked_sub(oy)?))
    }

    /// The pick ID a prim was given when first synced.
    pub fn prim_id(&self, prim: &ScenePath) -> Option<u32> {
        self.rprims.get(prim).map(|s| s.prim_id)
    }

    /// Extent and refine level the engine last pulled for `prim`.
    pub fn synced_extent(&self, prim: &ScenePath) -> Option<(Aabb, i32)> {
        self.rprims.get(prim).map(|s| (s.extent, s.refine_level))
    }

    pub fn synced_material(&self, prim: &ScenePath) -> Option<&ScenePath> {
        self.rprims.get(prim).and_then(|s| s.material.as_ref())
    }

    pub fn synced_kind(&self, prim: &ScenePath) -> Option<RprimKind> {
        self.rprims.get(prim).map(|s| s.kind)
    }

    /// Per-point widths last pulled for a points prim.
    pub fn synced_widths(&self, prim: &ScenePath) -> Option<&[f32]> {
        self.rprims.get(prim).map(|s| &*s.widths)
    }

    pub fn synced_curve_count(&self, prim: &ScenePath) -> Option<usize> {
        self.rprims.get(prim).map(|s| s.curve_count)
    }

    /// Runs every task of a [`StandardDelegate`] in order.
    pub fn execute_all(
        &mut self,
        delegate: &mut StandardDelegate,
    ) -> Result<FrameContext, PickError> {
        let tasks = delegate.task_graph().tasks().to_vec();
        self.execute(delegate, &tasks)
    }

    /// Runs `tasks` in order against `delegate`.
    ///
    /// Only a failing ID pass is an error; missing parameters fall back to
    /// defaults.
    pub fn execute<D: SceneDelegate>(
        &mut self,
        delegate: &mut D,
        tasks: &[TaskDescriptor],
    ) -> Result<FrameContext, PickError> {
        let mut ctx = FrameContext {
            lighting_enabled: true,
            ..Default::default()
        };
        self.drop_removed(delegate);

        let mut ran = BTreeSet::new();
        for index in 0..tasks.len() {
            self.run_with_children(delegate, tasks, index, &mut ran, &mut ctx)?;
        }
        Ok(ctx)
    }

    fn drop_removed<D: SceneDelegate>(&mut self, delegate: &D) {
        let live: BTreeSet<ScenePath> = delegate.rprim_ids().into_iter().collect();
        let removed: Vec<ScenePath> = self
            .rprims
            .keys()
            .filter(|id| !live.contains(*id))
            .cloned()
            .collect();
        for id in removed {
            self.rprims.remove(&id);
            self.resolver.registry_mut().remove(&id);
            log::debug!("dropped {id}");
        }
    }

    fn run_with_children<D: SceneDelegate>(
        &mut self,
        delegate: &mut D,
        tasks: &[TaskDescriptor],
        index: usize,
        ran: &mut BTreeSet<ScenePath>,
        ctx: &mut FrameContext,
    ) -> Result<(), PickError> {
        let task = &tasks[index];
        if !ran.insert(task.id.clone()) {
            return Ok(());
        }
        self.run_task(delegate, task, ctx)?;

        let children = delegate.get(&task.id, &self.tokens.children);
        let children = pull(&task.id, &self.tokens.children, &children, |v| v.as_path_array())
            .map(<[ScenePath]>::to_vec)
            .unwrap_or_default();
        for child in children {
            match tasks.iter().position(|t| t.id == child) {
                Some(child) => self.run_with_children(delegate, tasks, child, ran, ctx)?,
                None => log::warn!("{}: child task {child} is not scheduled", task.id),
            }
        }
        Ok(())
    }

    fn run_task<D: SceneDelegate>(
        &mut self,
        delegate: &mut D,
        task: &TaskDescriptor,
        ctx: &mut FrameContext,
    ) -> Result<(), PickError> {
        let t = self.tokens.clone();
        let bits = delegate.consume_dirty(&task.id);
        if !bits.is_empty() {
            ctx.synced.push((task.id.clone(), bits));
        }
        let params = delegate
            .get(&task.id, &t.params)
            .as_document()
            .cloned()
            .unwrap_or_default();

        match task.kind {
            TaskKind::RenderSetup => self.run_setup(delegate, &params, ctx),
            TaskKind::SimpleLight => {
                for light in delegate.light_ids() {
                    let bits = delegate.consume_dirty(&light);
                    if !bits.is_empty() {
                        ctx.synced.push((light.clone(), bits));
                    }
                    ctx.lights.push(light);
                }
            }
            TaskKind::Render => {
                if let Some(enabled) = params.get(&t.enable_lighting).as_bool() {
                    ctx.lighting_enabled = enabled;
                }
                let items = self.sync_collection(delegate, &task.id, ctx);
                ctx.draw_items.extend(items);
            }
            TaskKind::Pick => self.run_pick(delegate, &task.id, ctx)?,
            TaskKind::ColorCorrection => {
                ctx.color_correction = params.get(&t.color_correction_mode).as_token().cloned();
            }
        }
        ctx.executed.push(task.id.clone());
        Ok(())
    }

    fn run_setup<D: SceneDelegate>(
        &mut self,
        delegate: &mut D,
        params: &ParamBlock,
        ctx: &mut FrameContext,
    ) {
        let t = self.tokens.clone();
        if let Some(viewport) = params.get(&t.viewport).as_vec4() {
            ctx.viewport = viewport;
            self.viewport_origin = (viewport.x.max(0.0) as u32, viewport.y.max(0.0) as u32);
            if viewport.z >= 1.0 && viewport.w >= 1.0 {
                self.resolver.set_size(viewport.z as u32, viewport.w as u32);
            }
        }
        let Some(camera) = params.get(&t.camera).as_path() else {
            return;
        };

        let bits = delegate.consume_dirty(camera);
        if !bits.is_empty() {
            ctx.synced.push((camera.clone(), bits));
        }
        if !bits.is_empty() || !self.cameras.contains_key(camera) {
            let matrix = |name: &Token| {
                delegate
                    .get_camera_param_value(camera, name)
                    .as_mat4()
                    .unwrap_or(Mat4::IDENTITY)
            };
            let matrices = CameraMatrices {
                view: matrix(&t.world_to_view_matrix),
                projection: matrix(&t.projection_matrix),
            };
            self.cameras.insert(camera.clone(), matrices);
        }
        ctx.camera = self.cameras.get(camera).copied().unwrap_or_default();
        ctx.camera_path = Some(camera.clone());
    }

    fn run_pick<D: SceneDelegate>(
        &mut self,
        delegate: &mut D,
        task: &ScenePath,
        ctx: &mut FrameContext,
    ) -> Result<(), PickError> {
        let Some((x, y)) = self.pending_pick.take() else {
            return Ok(());
        };
        let items = self.sync_collection(delegate, task, ctx);
        self.resolver.render(&items, &ctx.camera)?;
        ctx.pick = self.pick(x, y);
        match &ctx.pick {
            Some(hit) => log::debug!(
                "picked {} instance {} at ({x}, {y})",
                hit.prim_path,
                hit.instance_index
            ),
            None => log::debug!("nothing under ({x}, {y})"),
        }
        Ok(())
    }

    /// Syncs the prims a task's collection and render tags select and
    /// returns their draw items.
    fn sync_collection<D: SceneDelegate>(
        &mut self,
        delegate: &mut D,
        task: &ScenePath,
        ctx: &mut FrameContext,
    ) -> Vec<DrawItem> {
        let t = self.tokens.clone();
        let root = delegate
            .get(task, &t.collection)
            .as_document()
            .and_then(|c| c.get(&t.root_path).as_path().cloned())
            .unwrap_or_else(ScenePath::root);
        let tags = delegate.get_task_render_tags(task);

        let mut dirty_instancers = BTreeSet::new();
        for instancer in delegate.instancer_ids() {
            let bits = delegate.consume_dirty(&instancer);
            if !bits.is_empty() {
                ctx.synced.push((instancer.clone(), bits));
                dirty_instancers.insert(instancer);
            }
        }

        let mut items = Vec::new();
        for id in delegate.rprim_ids() {
            if !id.has_prefix(&root) {
                continue;
            }
            if !tags.is_empty() && !tags.contains(&delegate.get_render_tag(&id)) {
                continue;
            }
            let forced = match self.rprims.get(&id).and_then(|s| s.instancer.as_ref()) {
                Some(instancer) if dirty_instancers.contains(instancer) => DirtyBits::INSTANCER,
                _ => DirtyBits::empty(),
            };
            let bits = self.sync_rprim(delegate, &id, forced);
            if !bits.is_empty() {
                ctx.synced.push((id.clone(), bits));
            }
            if let Some(state) = self.rprims.get(&id) {
                state.append_draw_items(&id, &mut items);
            }
        }
        items
    }

    /// Consumes `id`'s dirty bits and re-pulls what they cover. A prim seen
    /// for the first time is pulled in full. Returns the consumed bits.
    fn sync_rprim<D: SceneDelegate>(
        &mut self,
        delegate: &mut D,
        id: &ScenePath,
        forced: DirtyBits,
    ) -> DirtyBits {
        let consumed = delegate.consume_dirty(id);
        let is_new = !self.rprims.contains_key(id);
        let bits = if is_new {
            DirtyBits::all()
        } else {
            consumed | forced
        };
        if bits.is_empty() {
            return consumed;
        }

        let prim_id = self.resolver.registry_mut().insert(id);
        let t = self.tokens.clone();
        let state = self
            .rprims
            .entry(id.clone())
            .or_insert_with(|| RprimState::new(prim_id, delegate.get_rprim_kind(id)));

        if bits.contains(DirtyBits::POINTS) {
            let points = delegate.get(id, &t.points);
            let points = pull(id, &t.points, &points, |v| v.as_vec3_array());
            state.points = Rc::from(points.unwrap_or(&[]));
        }
        if bits.contains(DirtyBits::WIDTHS) {
            let widths = delegate.get(id, &t.widths);
            let widths = pull(id, &t.widths, &widths, |v| v.as_float_array());
            state.widths = Rc::from(widths.unwrap_or(&[]));
        }
        if bits.intersects(DirtyBits::TOPOLOGY | DirtyBits::DISPLAY_STYLE) {
            match state.kind {
                RprimKind::Mesh => {
                    let topology = delegate.get_mesh_topology(id);
                    state.refine_level = topology.refine_level;
                    if let Err(e) = topology.validate_indices(state.points.len()) {
                        log::warn!("{id}: {e}; not drawing");
                        state.triangles = Rc::from(Vec::new());
                    } else {
                        state.triangles = Rc::from(topology.triangulate());
                    }
                }
                RprimKind::BasisCurves => {
                    let topology = delegate.get_basis_curves_topology(id);
                    state.curve_count = match topology.validate_indices(state.points.len()) {
                        Ok(()) => topology.curve_count(),
                        Err(e) => {
                            log::warn!("{id}: {e}");
                            0
                        }
                    };
                }
                RprimKind::Points => {}
            }
        }
        if bits.contains(DirtyBits::TRANSFORM) {
            state.transform = delegate.get_transform(id);
        }
        if bits.contains(DirtyBits::VISIBILITY) {
            state.visible = delegate.get_visible(id);
        }
        if bits.contains(DirtyBits::EXTENT) {
            state.extent = delegate.get_extent(id);
        }
        if bits.contains(DirtyBits::MATERIAL) {
            state.material = delegate.get_material_id(id);
        }
        if bits.intersects(DirtyBits::INSTANCER | DirtyBits::INSTANCE_INDEX) {
            state.instancer = delegate.get_instancer_id(id);
            state.instances = match &state.instancer {
                Some(instancer) => pull_instances(delegate, &t, instancer, id),
                None => Vec::new(),
            };
        }
        log::debug!("synced {id}: {bits:?}");
        consumed
    }
}

fn pull_instances<D: SceneDelegate>(
    delegate: &D,
    tokens: &TokenRegistry,
    instancer: &ScenePath,
    prototype: &ScenePath,
) -> Vec<(u32, Mat4)> {
    let root = delegate.get_instancer_transform(instancer);
    let transforms = delegate.get(instancer, &tokens.instance_transform);
    let transforms = transforms.as_mat4_array().unwrap_or(&[]);
    delegate
        .get_instance_indices(instancer, prototype)
        .into_iter()
        .filter_map(|slot| {
            let xf = transforms.get(usize::try_from(slot).ok()?)?;
            Some((slot as u32, root * *xf))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::config::DelegateConfig;
    use crate::picking::SoftwareIdPass;

    fn path(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    fn scene() -> (StandardDelegate, Engine<SoftwareIdPass>) {
        let tokens = Rc::new(TokenRegistry::new());
        let mut delegate = StandardDelegate::new(tokens.clone(), DelegateConfig::default());
        delegate.add_default_tasks();
        let camera = Camera::new().matrices(1.0);
        delegate.set_camera(camera.view, camera.projection);
        let engine = Engine::new(tokens, SoftwareIdPass::new(), PickConfig::default());
        (delegate, engine)
    }

    #[test]
    fn tasks_run_in_order() {
        let (mut delegate, mut engine) = scene();
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.executed, delegate.task_ids());
        assert_eq!(frame.viewport, Vec4::new(0.0, 0.0, 512.0, 512.0));
        assert_eq!(frame.camera, Camera::new().matrices(1.0));
        assert_eq!(frame.color_correction, Some(delegate.tokens().srgb.clone()));
        assert!(frame.lighting_enabled);
    }

    #[test]
    fn second_frame_syncs_nothing() {
        let (mut delegate, mut engine) = scene();
        delegate.add_cube(path("/cube"), Mat4::IDENTITY);
        let first = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(first.synced_bits(&path("/cube")), DirtyBits::all());
        assert_eq!(first.draw_items.len(), 1);

        let second = engine.execute_all(&mut delegate).unwrap();
        assert!(second.synced.is_empty());
        assert_eq!(second.draw_items.len(), 1);
    }

    #[test]
    fn only_stale_attributes_are_repulled() {
        let (mut delegate, mut engine) = scene();
        let cube = path("/cube");
        delegate.add_cube(cube.clone(), Mat4::IDENTITY);
        engine.execute_all(&mut delegate).unwrap();

        let moved = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        delegate.update_transform(&cube, moved);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.synced_bits(&cube), DirtyBits::TRANSFORM);
        assert_eq!(frame.draw_items[0].transform, moved);
    }

    #[test]
    fn camera_change_without_dirty_mark_is_not_seen() {
        let (mut delegate, mut engine) = scene();
        engine.execute_all(&mut delegate).unwrap();

        let camera = delegate.config().camera_path.clone();
        let t = delegate.tokens().clone();
        let moved = Camera::new().at(0.0, 0.0, 30.0).matrices(1.0);
        delegate.set_attribute(&camera, &t.world_to_view_matrix, moved.view);
        delegate.consume_dirty(&camera);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.camera, Camera::new().matrices(1.0));

        delegate.set_camera(moved.view, moved.projection);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.camera.view, moved.view);
    }

    #[test]
    fn collection_root_filters_prims() {
        let (mut delegate, mut engine) = scene();
        delegate.add_cube(path("/inside/cube"), Mat4::IDENTITY);
        delegate.add_cube(path("/outside"), Mat4::IDENTITY);
        let t = delegate.tokens().clone();
        let collection = ParamBlock::new()
            .with(&t.name, t.geometry.clone())
            .with(&t.root_path, path("/inside"));
        delegate.set_task_param(&path("/renderTask"), &t.collection, collection);

        let frame = engine.execute_all(&mut delegate).unwrap();
        let drawn: Vec<_> = frame.draw_items.iter().map(|i| i.prim.as_str()).collect();
        assert_eq!(drawn, ["/inside/cube"]);
        assert!(delegate.is_dirty(&path("/outside"), DirtyBits::POINTS));
    }

    #[test]
    fn render_tags_filter_guides() {
        let (mut delegate, mut engine) = scene();
        delegate.add_mesh(crate::MeshDesc::grid(path("/guide"), 1, 1).guide());
        delegate.add_cube(path("/cube"), Mat4::IDENTITY);
        let t = delegate.tokens().clone();
        delegate.set_task_param(&path("/renderTask"), &t.render_tags, vec![t.geometry.clone()]);

        let frame = engine.execute_all(&mut delegate).unwrap();
        let drawn: Vec<_> = frame.draw_items.iter().map(|i| i.prim.as_str()).collect();
        assert_eq!(drawn, ["/cube"]);
    }

    #[test]
    fn hidden_prims_are_not_drawn() {
        let (mut delegate, mut engine) = scene();
        let cube = path("/cube");
        delegate.add_cube(cube.clone(), Mat4::IDENTITY);
        delegate.set_visible(&cube, false);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert!(frame.draw_items.is_empty());
        assert!(engine.prim_id(&cube).is_some());
    }

    #[test]
    fn pick_only_runs_on_request() {
        let (mut delegate, mut engine) = scene();
        delegate.add_cube(path("/cube"), Mat4::IDENTITY);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert!(frame.pick.is_none());
        assert!(engine.resolver().id_buffer().is_none());

        engine.request_pick(256, 256);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.pick.unwrap().prim_path, path("/cube"));
        assert!(engine.pick(0, 0).is_none());
    }

    #[test]
    fn lights_and_materials_are_synced() {
        let (mut delegate, mut engine) = scene();
        let cube = path("/cube");
        let material = path("/material");
        delegate.add_cube(cube.clone(), Mat4::IDENTITY);
        delegate.add_simple_light(path("/light"), ParamBlock::new());
        delegate.add_material_resource(material.clone(), ParamBlock::new());
        delegate.bind_material(&cube, material.clone());
        delegate.set_refine_level(2);

        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.lights, vec![path("/light")]);
        assert_eq!(engine.synced_material(&cube), Some(&material));
        assert_eq!(engine.synced_extent(&cube).map(|(_, level)| level), Some(2));
    }

    #[test]
    fn children_run_right_after_their_parent() {
        let (mut delegate, mut engine) = scene();
        let t = delegate.tokens().clone();
        let correction = path("/colorCorrectionTask");
        delegate.set_task_param(&path("/simpleLightTask"), &t.children, vec![correction.clone()]);

        let frame = engine.execute_all(&mut delegate).unwrap();
        let order: Vec<_> = frame.executed.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            order,
            [
                "/renderSetupTask",
                "/simpleLightTask",
                "/colorCorrectionTask",
                "/renderTask",
                "/pickTask",
            ]
        );
    }

    #[test]
    fn removed_prims_stop_drawing_and_lose_their_id() {
        let (mut delegate, mut engine) = scene();
        let cube = path("/cube");
        delegate.add_cube(cube.clone(), Mat4::IDENTITY);
        engine.request_pick(256, 256);
        engine.execute_all(&mut delegate).unwrap();
        let first_id = engine.prim_id(&cube).unwrap();

        assert!(delegate.remove_rprim(&cube));
        engine.request_pick(256, 256);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert!(frame.draw_items.is_empty());
        assert!(frame.pick.is_none());
        assert!(engine.prim_id(&cube).is_none());
        assert!(engine.resolver().registry().path(first_id).is_none());

        delegate.add_cube(cube.clone(), Mat4::IDENTITY);
        engine.execute_all(&mut delegate).unwrap();
        assert!(engine.prim_id(&cube).unwrap() > first_id);
    }

    #[test]
    fn picks_are_relative_to_the_viewport_origin() {
        let (mut delegate, mut engine) = scene();
        delegate.add_cube(path("/cube"), Mat4::IDENTITY);
        delegate.set_viewport(Vec4::new(100.0, 50.0, 512.0, 512.0));

        engine.request_pick(356, 306);
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.pick.unwrap().prim_path, path("/cube"));
        assert_eq!(engine.pick(356, 306).unwrap().prim_path, path("/cube"));
        assert!(engine.pick(50, 300).is_none());
        assert!(engine.pick(300, 20).is_none());
    }

    #[test]
    fn points_and_curves_sync_but_are_not_drawn() {
        let (mut delegate, mut engine) = scene();
        let points = path("/points");
        let curves = path("/curves");
        let grid = crate::geometry::CurveGrid::new(2);
        delegate.add_points(points.clone(), crate::geometry::PointLattice::new(3));
        delegate.add_basis_curves(curves.clone(), grid);

        let frame = engine.execute_all(&mut delegate).unwrap();
        assert!(frame.draw_items.is_empty());
        assert_eq!(engine.synced_kind(&points), Some(RprimKind::Points));
        assert_eq!(engine.synced_curve_count(&curves), Some(grid.curve_count()));
        let widths = engine.synced_widths(&points).unwrap().to_vec();
        assert_eq!(widths.len(), 27);

        delegate.advance();
        let frame = engine.execute_all(&mut delegate).unwrap();
        assert_eq!(frame.synced_bits(&points), DirtyBits::WIDTHS);
        assert!(frame.synced_bits(&curves).contains(DirtyBits::POINTS));
        assert_ne!(engine.synced_widths(&points).unwrap(), &widths[..]);
    }
}

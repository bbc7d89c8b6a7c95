//! ID-pass picking: which prim, and which instance, is under a pixel.
//!
//! Picking renders the scene once more into an offscreen target whose two
//! colour planes hold encoded IDs instead of shading:
//!
//! - plane 0: the prim's pick ID (from [`PrimIdRegistry`])
//! - plane 1: the instance index (0 for non-instanced prims)
//!
//! A depth plane is written alongside. [`PickingResolver::pick`] scans a small
//! window of the readback for the nearest fragment, decodes its IDs and maps
//! the prim ID back to a [`ScenePath`].
//!
//! Two passes implement [`IdPass`]: [`SoftwareIdPass`] rasterizes on the CPU
//! and [`GpuIdPass`] renders with wgpu. Both produce the same [`IdBuffer`].
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use glam::{Mat4, Vec3};
//! use hdpick::geometry::{self, SubdivScheme};
//! use hdpick::{Camera, DrawItem, PickConfig, PickingResolver, ScenePath, SoftwareIdPass};
//!
//! let mut resolver = PickingResolver::new(SoftwareIdPass::new(), PickConfig::default());
//! let cube = ScenePath::new("/cube0").unwrap();
//! let prim_id = resolver.registry_mut().insert(&cube);
//!
//! let (points, topology) = geometry::cube(SubdivScheme::CatmullClark);
//! let item = DrawItem {
//!     prim: cube.clone(),
//!     prim_id,
//!     instance_index: 0,
//!     transform: Mat4::IDENTITY,
//!     points: Rc::from(points),
//!     triangles: Rc::from(topology.triangulate()),
//! };
//!
//! resolver.render(&[item], &Camera::new().matrices(1.0)).unwrap();
//! let hit = resolver.pick(256, 256).unwrap();
//! assert_eq!(hit.prim_path, cube);
//! assert!(resolver.pick(0, 0).is_none());
//! ```

mod codec;
mod gpu_pass;
mod id_buffer;
mod software;

pub use codec::{PrimIdRegistry, decode_id, decode_id_color, encode_id, encode_id_color};
pub use gpu_pass::GpuIdPass;
pub use id_buffer::{IdBuffer, PickWindow, PixelHit};
pub use software::SoftwareIdPass;

use std::rc::Rc;

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::camera::CameraMatrices;
use crate::config::PickConfig;
use crate::gpu::ContextError;
use crate::path::ScenePath;

#[derive(Debug, Error)]
pub enum PickError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("ID target must be non-empty, got {width}x{height}")]
    EmptyTarget { width: u32, height: u32 },
    #[error("ID plane has {actual} pixels, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("ID readback failed: {0}")]
    Readback(String),
}

/// One draw of one prim (or one instance of a prototype) in the ID pass.
///
/// Points are in object space; `transform` takes them to world space.
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub prim: ScenePath,
    pub prim_id: u32,
    pub instance_index: u32,
    pub transform: Mat4,
    pub points: Rc<[Vec3]>,
    pub triangles: Rc<[[u32; 3]]>,
}

/// Renders draw items into an [`IdBuffer`].
pub trait IdPass {
    fn render(
        &mut self,
        items: &[DrawItem],
        camera: &CameraMatrices,
        width: u32,
        height: u32,
    ) -> Result<IdBuffer, PickError>;
}

/// A resolved pick.
#[derive(Clone, Debug, PartialEq)]
pub struct PickHit {
    pub prim_path: ScenePath,
    pub prim_id: u32,
    pub instance_index: u32,
    pub depth: f32,
}

/// Owns an ID pass, the prim-ID registry and the latest readback.
pub struct PickingResolver<P> {
    pass: P,
    config: PickConfig,
    registry: PrimIdRegistry,
    buffer: Option<IdBuffer>,
}

impl<P: IdPass> PickingResolver<P> {
    pub fn new(pass: P, config: PickConfig) -> Self {
        Self {
            pass,
            config,
            registry: PrimIdRegistry::new(),
            buffer: None,
        }
    }

    pub fn config(&self) -> &PickConfig {
        &self.config
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
    }

    pub fn registry(&self) -> &PrimIdRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PrimIdRegistry {
        &mut self.registry
    }

    /// Renders the ID pass at the configured size and keeps the readback.
    pub fn render(&mut self, items: &[DrawItem], camera: &CameraMatrices) -> Result<(), PickError> {
        let buffer = self
            .pass
            .render(items, camera, self.config.width, self.config.height)?;
        log::debug!(
            "ID pass rendered {} items at {}x{}",
            items.len(),
            buffer.width(),
            buffer.height()
        );
        self.buffer = Some(buffer);
        Ok(())
    }

    pub fn id_buffer(&self) -> Option<&IdBuffer> {
        self.buffer.as_ref()
    }

    /// Resolves the configured window centred on `(x, y)`.
    pub fn pick(&self, x: u32, y: u32) -> Option<PickHit> {
        self.pick_window(PickWindow::centered(x, y, self.config.window))
    }

    /// Resolves the nearest fragment in `window`. Misses, picks outside the
    /// target and picks before any render all give `None`.
    pub fn pick_window(&self, window: PickWindow) -> Option<PickHit> {
        let buffer = self.buffer.as_ref()?;
        let Some(pixel) = buffer.resolve(window) else {
            log::debug!("pick miss in {window:?}");
            return None;
        };
        let Some(path) = self.registry.path(pixel.prim_id) else {
            log::warn!(
                "decoded unknown prim id {} at ({}, {})",
                pixel.prim_id,
                pixel.x,
                pixel.y
            );
            return None;
        };
        Some(PickHit {
            prim_path: path.clone(),
            prim_id: pixel.prim_id,
            instance_index: pixel.instance_index,
            depth: pixel.depth,
        })
    }
}

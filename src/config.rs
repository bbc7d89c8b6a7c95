//! Builder-style configuration for delegates and picking.

use glam::Vec4;

use crate::path::ScenePath;

/// Settings applied when a [`StandardDelegate`](crate::StandardDelegate) is
/// constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct DelegateConfig {
    /// Path of the camera the render-setup task points at.
    pub camera_path: ScenePath,
    /// `(x, y, width, height)` in pixels.
    pub viewport: Vec4,
    pub refine_level: i32,
    pub spin_degrees_per_frame: f32,
    pub ripple_phase_per_frame: f32,
    /// Phase step for pulsing point widths and swaying curves.
    pub sway_phase_per_frame: f32,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            camera_path: ScenePath::from_static("/camera"),
            viewport: Vec4::new(0.0, 0.0, 512.0, 512.0),
            refine_level: 0,
            spin_degrees_per_frame: 1.0,
            ripple_phase_per_frame: 0.1,
            sway_phase_per_frame: 0.01,
        }
    }
}

impl DelegateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera_path(mut self, path: ScenePath) -> Self {
        self.camera_path = path;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Vec4::new(0.0, 0.0, width as f32, height as f32);
        self
    }

    pub fn refine_level(mut self, level: i32) -> Self {
        self.refine_level = level;
        self
    }

    pub fn spin_degrees_per_frame(mut self, degrees: f32) -> Self {
        self.spin_degrees_per_frame = degrees;
        self
    }

    pub fn ripple_phase_per_frame(mut self, phase: f32) -> Self {
        self.ripple_phase_per_frame = phase;
        self
    }

    pub fn sway_phase_per_frame(mut self, phase: f32) -> Self {
        self.sway_phase_per_frame = phase;
        self
    }
}

/// Size of the ID render and the default readback window around a pick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickConfig {
    pub width: u32,
    pub height: u32,
    /// Side length of the square window scanned around each pick point.
    pub window: u32,
    /// Depth the ID buffer is cleared to; a winning depth equal to this is a miss.
    pub clear_depth: f32,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            window: 1,
            clear_depth: 1.0,
        }
    }
}

impl PickConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Window side length, clamped to at least one pixel.
    pub fn window(mut self, side: u32) -> Self {
        self.window = side.max(1);
        self
    }
}

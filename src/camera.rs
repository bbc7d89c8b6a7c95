use glam::{Mat4, Vec2, Vec3};

/// View and projection matrices as pushed to a camera via
/// [`StandardDelegate::set_camera`](crate::StandardDelegate::set_camera).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraMatrices {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Projects a world point to pixel coordinates with a top-left origin.
    ///
    /// Returns `None` for points behind the eye.
    pub fn project(&self, world: Vec3, width: u32, height: u32) -> Option<Vec2> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x * 0.5 + 0.5) * width as f32,
            (0.5 - ndc.y * 0.5) * height as f32,
        ))
    }
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// A simple look-at perspective camera.
///
/// Produces right-handed matrices with a `0..1` depth range, matching the
/// depth the ID pass clears to.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 20.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_degrees: 45.0,
            near: 1.0,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn looking_at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.target = Vec3::new(x, y, z);
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov_degrees = fov_degrees;
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), aspect, self.near, self.far)
    }

    pub fn matrices(&self, aspect: f32) -> CameraMatrices {
        CameraMatrices {
            view: self.view_matrix(),
            projection: self.projection_matrix(aspect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_center() {
        let m = Camera::new().matrices(1.0);
        let p = m.project(Vec3::ZERO, 512, 512).unwrap();
        assert!((p.x - 256.0).abs() < 1e-3);
        assert!((p.y - 256.0).abs() < 1e-3);
    }

    #[test]
    fn left_is_left_and_up_is_up() {
        let m = Camera::new().matrices(1.0);
        let left = m.project(Vec3::new(-5.0, 0.0, 5.0), 512, 512).unwrap();
        assert!(left.x > 45.0 && left.x < 55.0);
        let up = m.project(Vec3::new(0.0, 2.0, 0.0), 512, 512).unwrap();
        assert!(up.y < 256.0);
    }

    #[test]
    fn behind_the_eye_is_rejected() {
        let m = Camera::new().matrices(1.0);
        assert!(m.project(Vec3::new(0.0, 0.0, 30.0), 512, 512).is_none());
    }
}

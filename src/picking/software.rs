use glam::{Mat4, Vec2, Vec3};

use super::id_buffer::IdBuffer;
use super::{DrawItem, IdPass, PickError};
use crate::camera::CameraMatrices;

/// A CPU rasterizer producing the same [`IdBuffer`] as the GPU pass.
///
/// Samples at pixel centres, interpolates depth linearly in screen space and
/// keeps a fragment only if it is strictly nearer than what is stored. Faces
/// are not culled. Triangles with a vertex behind the eye are skipped rather
/// than clipped.
#[derive(Clone, Copy, Debug)]
pub struct SoftwareIdPass {
    pub clear_depth: f32,
}

impl Default for SoftwareIdPass {
    fn default() -> Self {
        Self { clear_depth: 1.0 }
    }
}

impl SoftwareIdPass {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdPass for SoftwareIdPass {
    fn render(
        &mut self,
        items: &[DrawItem],
        camera: &CameraMatrices,
        width: u32,
        height: u32,
    ) -> Result<IdBuffer, PickError> {
        if width == 0 || height == 0 {
            return Err(PickError::EmptyTarget { width, height });
        }
        let mut buffer = IdBuffer::new(width, height, self.clear_depth);
        let view_projection = camera.view_projection();

        for item in items {
            let mvp = view_projection * item.transform;
            let screen: Vec<Option<Vec3>> = item
                .points
                .iter()
                .map(|p| to_screen(&mvp, *p, width, height))
                .collect();

            for tri in item.triangles.iter() {
                let corners = (
                    screen.get(tri[0] as usize).copied().flatten(),
                    screen.get(tri[1] as usize).copied().flatten(),
                    screen.get(tri[2] as usize).copied().flatten(),
                );
                if let (Some(a), Some(b), Some(c)) = corners {
                    rasterize(&mut buffer, [a, b, c], item.prim_id, item.instance_index);
                }
            }
        }
        Ok(buffer)
    }
}

/// Pixel x, pixel y (top-left origin) and NDC depth.
fn to_screen(mvp: &Mat4, p: Vec3, width: u32, height: u32) -> Option<Vec3> {
    let clip = *mvp * p.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec3::new(
        (ndc.x * 0.5 + 0.5) * width as f32,
        (0.5 - ndc.y * 0.5) * height as f32,
        ndc.z,
    ))
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn rasterize(buffer: &mut IdBuffer, v: [Vec3; 3], prim_id: u32, instance_index: u32) {
    let [a, b, c] = v.map(|p| p.truncate());
    let area = edge(a, b, c);
    if area.abs() <= f32::EPSILON {
        return;
    }
    let sign = area.signum();

    let (w, h) = (buffer.width() as f32, buffer.height() as f32);
    let min = a.min(b).min(c);
    let max = a.max(b).max(c);
    let x0 = min.x.floor().clamp(0.0, w) as u32;
    let y0 = min.y.floor().clamp(0.0, h) as u32;
    let x1 = max.x.ceil().clamp(0.0, w) as u32;
    let y1 = max.y.ceil().clamp(0.0, h) as u32;

    for py in y0..y1 {
        for px in x0..x1 {
            let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
            let w0 = edge(b, c, p) * sign;
            let w1 = edge(c, a, p) * sign;
            let w2 = edge(a, b, p) * sign;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let total = area.abs();
            let depth = (w0 * v[0].z + w1 * v[1].z + w2 * v[2].z) / total;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }
            if depth < buffer.depth_at(px, py) {
                buffer.write(px, py, prim_id, instance_index, depth);
            }
        }
    }
}

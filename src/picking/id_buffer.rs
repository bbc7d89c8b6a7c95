use super::PickError;
use super::codec::{decode_id, encode_id};

/// A rectangular region of the ID buffer, in pixels from the top-left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PickWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PickWindow {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// A `side` by `side` window centred on `(x, y)`.
    pub fn centered(x: u32, y: u32, side: u32) -> Self {
        let side = side.max(1);
        Self::new(x.saturating_sub(side / 2), y.saturating_sub(side / 2), side, side)
    }
}

/// The winning pixel of a window scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelHit {
    pub x: u32,
    pub y: u32,
    pub prim_id: u32,
    pub instance_index: u32,
    pub depth: f32,
}

/// CPU copy of the ID render: two encoded ID planes and a depth plane.
#[derive(Clone, Debug, PartialEq)]
pub struct IdBuffer {
    width: u32,
    height: u32,
    clear_depth: f32,
    prim_ids: Vec<[u8; 4]>,
    instance_ids: Vec<[u8; 4]>,
    depths: Vec<f32>,
}

impl IdBuffer {
    /// A buffer cleared to ID 0 and `clear_depth`.
    pub fn new(width: u32, height: u32, clear_depth: f32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            clear_depth,
            prim_ids: vec![[0; 4]; len],
            instance_ids: vec![[0; 4]; len],
            depths: vec![clear_depth; len],
        }
    }

    /// Wraps planes read back from a renderer.
    pub fn from_planes(
        width: u32,
        height: u32,
        clear_depth: f32,
        prim_ids: Vec<[u8; 4]>,
        instance_ids: Vec<[u8; 4]>,
        depths: Vec<f32>,
    ) -> Result<Self, PickError> {
        let expected = width as usize * height as usize;
        for actual in [prim_ids.len(), instance_ids.len(), depths.len()] {
            if actual != expected {
                return Err(PickError::BufferSize { expected, actual });
            }
        }
        Ok(Self {
            width,
            height,
            clear_depth,
            prim_ids,
            instance_ids,
            depths,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear_depth(&self) -> f32 {
        self.clear_depth
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depths[self.index(x, y)]
    }

    /// Decoded `(prim_id, instance_index)` at a pixel.
    pub fn ids_at(&self, x: u32, y: u32) -> (u32, u32) {
        let i = self.index(x, y);
        (decode_id(self.prim_ids[i]), decode_id(self.instance_ids[i]))
    }

    /// Stores a fragment unconditionally; depth testing is the caller's job.
    pub fn write(&mut self, x: u32, y: u32, prim_id: u32, instance_index: u32, depth: f32) {
        let i = self.index(x, y);
        self.prim_ids[i] = encode_id(prim_id);
        self.instance_ids[i] = encode_id(instance_index);
        self.depths[i] = depth;
    }

    /// Finds the nearest fragment in `window`.
    ///
    /// Pixels are scanned in raster order and only a strictly smaller depth
    /// replaces the current best, so equal depths resolve to the first pixel
    /// seen. A window outside the buffer, or one where every depth is at the
    /// clear value, yields `None`.
    pub fn resolve(&self, window: PickWindow) -> Option<PixelHit> {
        if window.x >= self.width || window.y >= self.height {
            return None;
        }
        let x_end = window.x.saturating_add(window.width).min(self.width);
        let y_end = window.y.saturating_add(window.height).min(self.height);

        let mut best: Option<(u32, u32)> = None;
        let mut best_depth = self.clear_depth;
        for y in window.y..y_end {
            for x in window.x..x_end {
                let depth = self.depth_at(x, y);
                if depth < best_depth {
                    best_depth = depth;
                    best = Some((x, y));
                }
            }
        }

        let (x, y) = best?;
        let (prim_id, instance_index) = self.ids_at(x, y);
        Some(PixelHit {
            x,
            y,
            prim_id,
            instance_index,
            depth: best_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_buffer_misses() {
        let buffer = IdBuffer::new(8, 8, 1.0);
        assert!(buffer.resolve(PickWindow::new(0, 0, 8, 8)).is_none());
    }

    #[test]
    fn nearest_depth_wins() {
        let mut buffer = IdBuffer::new(4, 4, 1.0);
        buffer.write(0, 0, 1, 0, 0.6);
        buffer.write(3, 3, 2, 5, 0.2);
        let hit = buffer.resolve(PickWindow::new(0, 0, 4, 4)).unwrap();
        assert_eq!((hit.prim_id, hit.instance_index), (2, 5));
        assert_eq!((hit.x, hit.y), (3, 3));
        assert_eq!(hit.depth, 0.2);
    }

    #[test]
    fn ties_go_to_first_pixel_in_raster_order() {
        let mut buffer = IdBuffer::new(4, 4, 1.0);
        buffer.write(2, 1, 7, 0, 0.5);
        buffer.write(1, 2, 8, 0, 0.5);
        buffer.write(3, 0, 9, 0, 0.5);
        let hit = buffer.resolve(PickWindow::new(0, 0, 4, 4)).unwrap();
        assert_eq!(hit.prim_id, 9);
    }

    #[test]
    fn depth_at_clear_value_is_a_miss() {
        let mut buffer = IdBuffer::new(2, 2, 1.0);
        buffer.write(0, 0, 3, 0, 1.0);
        assert!(buffer.resolve(PickWindow::new(0, 0, 2, 2)).is_none());
    }

    #[test]
    fn window_is_clipped_to_buffer() {
        let mut buffer = IdBuffer::new(4, 4, 1.0);
        buffer.write(3, 3, 4, 0, 0.1);
        assert_eq!(buffer.resolve(PickWindow::centered(3, 3, 128)).unwrap().prim_id, 4);
        assert!(buffer.resolve(PickWindow::new(4, 0, 1, 1)).is_none());
        assert!(buffer.resolve(PickWindow::new(0, 0, 3, 3)).is_none());
    }

    #[test]
    fn centered_window_clamps_at_origin() {
        assert_eq!(PickWindow::centered(1, 1, 4), PickWindow::new(0, 0, 4, 4));
        assert_eq!(PickWindow::centered(10, 10, 1), PickWindow::new(10, 10, 1, 1));
    }

    #[test]
    fn plane_sizes_are_checked() {
        let err = IdBuffer::from_planes(2, 2, 1.0, vec![[0; 4]; 4], vec![[0; 4]; 3], vec![1.0; 4])
            .unwrap_err();
        assert!(matches!(err, PickError::BufferSize { expected: 4, actual: 3 }));
    }

    #[test]
    fn plane_sizes_are_checked_past_u32() {
        let len = 1 << 16;
        let result = IdBuffer::from_planes(
            1 << 16,
            (1 << 16) + 1,
            1.0,
            vec![[0; 4]; len],
            vec![[0; 4]; len],
            vec![1.0; len],
        );
        match result {
            Err(PickError::BufferSize { expected, actual }) => {
                assert_eq!(expected, (1usize << 32) + (1 << 16));
                assert_eq!(actual, len);
            }
            other => panic!("expected a size error, got {other:?}"),
        }
    }
}

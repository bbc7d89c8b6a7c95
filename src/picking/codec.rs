//! The 4-byte ID colour encoding and the prim-ID registry.
//!
//! An ID is stored little-endian across the R, G, B and A channels of an
//! `Rgba8Unorm` pixel: `r = id & 0xff`, `g = (id >> 8) & 0xff`, and so on.
//! As a float colour each channel is `byte / 255`.

use std::collections::HashMap;

use glam::Vec4;

use crate::path::ScenePath;

pub fn encode_id(id: u32) -> [u8; 4] {
    id.to_le_bytes()
}

pub fn decode_id(rgba: [u8; 4]) -> u32 {
    u32::from_le_bytes(rgba)
}

/// The normalized colour a shader writes for `id`.
pub fn encode_id_color(id: u32) -> Vec4 {
    let [r, g, b, a] = encode_id(id);
    Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
}

/// Inverse of [`encode_id_color`], rounding each channel to the nearest byte.
pub fn decode_id_color(color: Vec4) -> u32 {
    let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    decode_id([byte(color.x), byte(color.y), byte(color.z), byte(color.w)])
}

/// Assigns pick IDs to prims as they are first seen.
///
/// IDs start at 1 (0 is the cleared background) and are never handed out
/// twice, even after a prim is removed.
#[derive(Debug)]
pub struct PrimIdRegistry {
    next: u32,
    by_path: HashMap<ScenePath, u32>,
    by_id: HashMap<u32, ScenePath>,
}

impl Default for PrimIdRegistry {
    fn default() -> Self {
        Self {
            next: 1,
            by_path: HashMap::new(),
            by_id: HashMap::new(),
        }
    }
}

impl PrimIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ID for `path`, assigning the next one if it has none.
    pub fn insert(&mut self, path: &ScenePath) -> u32 {
        if let Some(id) = self.by_path.get(path) {
            return *id;
        }
        let id = self.next;
        self.next += 1;
        self.by_path.insert(path.clone(), id);
        self.by_id.insert(id, path.clone());
        id
    }

    pub fn remove(&mut self, path: &ScenePath) -> Option<u32> {
        let id = self.by_path.remove(path)?;
        self.by_id.remove(&id);
        Some(id)
    }

    pub fn id(&self, path: &ScenePath) -> Option<u32> {
        self.by_path.get(path).copied()
    }

    pub fn path(&self, id: u32) -> Option<&ScenePath> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_is_little_endian() {
        assert_eq!(encode_id(0x0403_0201), [1, 2, 3, 4]);
        assert_eq!(decode_id([0xff, 0, 0, 0]), 255);
        assert_eq!(decode_id([0, 1, 0, 0]), 256);
    }

    #[test]
    fn every_24_bit_id_round_trips() {
        for id in 0..(1u32 << 24) {
            assert_eq!(decode_id(encode_id(id)), id);
        }
        assert_eq!(decode_id(encode_id(u32::MAX)), u32::MAX);
    }

    #[test]
    fn colors_round_trip() {
        for id in (0..(1u32 << 24)).step_by(9973).chain([1, 255, 256, (1 << 24) - 1]) {
            assert_eq!(decode_id_color(encode_id_color(id)), id);
        }
    }

    #[test]
    fn color_channels_are_normalized_bytes() {
        let c = encode_id_color(0x0000_ff01);
        assert_eq!(c, Vec4::new(1.0 / 255.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn registry_never_reuses_ids() {
        let mut registry = PrimIdRegistry::new();
        let a = ScenePath::new("/cube0").unwrap();
        let b = ScenePath::new("/cube1").unwrap();

        assert_eq!(registry.insert(&a), 1);
        assert_eq!(registry.insert(&b), 2);
        assert_eq!(registry.insert(&a), 1);
        assert_eq!(registry.path(2), Some(&b));

        assert_eq!(registry.remove(&a), Some(1));
        assert!(registry.path(1).is_none());
        assert_eq!(registry.insert(&a), 3);
        assert_eq!(registry.len(), 2);
    }
}

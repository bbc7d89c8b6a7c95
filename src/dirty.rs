//! Per-object change tracking.
//!
//! Mutations OR [`DirtyBits`] into a record; the single consumer (the engine's
//! sync step) drains them with [`DirtyTracker::consume_dirty`]. Records are
//! created on first touch and never removed.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::path::ScenePath;

bitflags! {
    /// Attribute categories that can go stale between syncs.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DirtyBits: u32 {
        const TRANSFORM = 1 << 0;
        const POINTS = 1 << 1;
        const NORMALS = 1 << 2;
        const WIDTHS = 1 << 3;
        const TOPOLOGY = 1 << 4;
        const VISIBILITY = 1 << 5;
        const EXTENT = 1 << 6;
        const PRIMVAR = 1 << 7;
        const DISPLAY_STYLE = 1 << 8;
        const MATERIAL = 1 << 9;
        const INSTANCER = 1 << 10;
        const INSTANCE_INDEX = 1 << 11;
        const PARAMS = 1 << 12;
        const COLLECTION = 1 << 13;
    }
}

#[derive(Debug, Default)]
pub struct DirtyTracker {
    records: HashMap<ScenePath, DirtyBits>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly populated object as fully dirty so its first sync
    /// pulls everything.
    pub fn insert(&mut self, id: &ScenePath) {
        self.records.insert(id.clone(), DirtyBits::all());
    }

    /// ORs `bits` into the record for `id`, creating it if needed.
    pub fn mark_dirty(&mut self, id: &ScenePath, bits: DirtyBits) {
        *self.records.entry(id.clone()).or_default() |= bits;
    }

    /// Returns the pending bits for `id` and clears them.
    pub fn consume_dirty(&mut self, id: &ScenePath) -> DirtyBits {
        match self.records.get_mut(id) {
            Some(bits) => std::mem::take(bits),
            None => DirtyBits::empty(),
        }
    }

    /// Non-consuming test for any of `bits`.
    pub fn is_dirty(&self, id: &ScenePath, bits: DirtyBits) -> bool {
        self.peek(id).intersects(bits)
    }

    pub fn peek(&self, id: &ScenePath) -> DirtyBits {
        self.records.get(id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    #[test]
    fn consume_clears() {
        let mut tracker = DirtyTracker::new();
        let cube = id("/cube0");
        tracker.mark_dirty(&cube, DirtyBits::TRANSFORM | DirtyBits::POINTS);
        assert_eq!(
            tracker.consume_dirty(&cube),
            DirtyBits::TRANSFORM | DirtyBits::POINTS
        );
        assert_eq!(tracker.consume_dirty(&cube), DirtyBits::empty());
    }

    #[test]
    fn marks_accumulate() {
        let mut tracker = DirtyTracker::new();
        let cube = id("/cube0");
        tracker.mark_dirty(&cube, DirtyBits::TRANSFORM);
        tracker.mark_dirty(&cube, DirtyBits::VISIBILITY);
        assert!(tracker.is_dirty(&cube, DirtyBits::VISIBILITY));
        assert!(!tracker.is_dirty(&cube, DirtyBits::TOPOLOGY));
        assert_eq!(tracker.peek(&cube), DirtyBits::TRANSFORM | DirtyBits::VISIBILITY);
    }

    #[test]
    fn inserted_objects_start_fully_dirty() {
        let mut tracker = DirtyTracker::new();
        let grid = id("/grid");
        tracker.insert(&grid);
        assert_eq!(tracker.consume_dirty(&grid), DirtyBits::all());
    }

    #[test]
    fn unknown_ids_read_clean() {
        let mut tracker = DirtyTracker::new();
        let ghost = id("/ghost");
        assert!(!tracker.is_dirty(&ghost, DirtyBits::all()));
        assert_eq!(tracker.consume_dirty(&ghost), DirtyBits::empty());
        assert_eq!(tracker.peek(&ghost), DirtyBits::empty());
    }
}

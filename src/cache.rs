//! Per-object, per-attribute value storage with procedural fallbacks.
//!
//! [`AttributeValueCache::get`] returns a written value when one exists and
//! otherwise asks the fallback registered for that `(id, name)` pair. Fallback
//! results are never stored; call [`set`](AttributeValueCache::set) to pin one.
//!
//! There is no eviction. Entries describe the scene and live as long as the
//! cache does.
//!
//! ```
//! use hdpick::{AttributeValueCache, ScenePath, Token, Value};
//!
//! let mut cache = AttributeValueCache::new();
//! let id = ScenePath::new("/grid").unwrap();
//! let opacity = Token::new("opacity");
//!
//! cache.register_fallback(&id, &opacity, |_, frame| Value::Float(frame as f32));
//! assert_eq!(cache.get(&id, &opacity, 3), Value::Float(3.0));
//!
//! cache.set(&id, &opacity, 0.5f32);
//! assert_eq!(cache.get(&id, &opacity, 3), Value::Float(0.5));
//! ```

use std::collections::HashMap;

use crate::path::ScenePath;
use crate::token::Token;
use crate::value::Value;

/// A procedural default for one attribute, evaluated at a frame.
///
/// Fallbacks must be pure: the same `(id, frame)` gives the same value.
pub type Fallback = Box<dyn Fn(&ScenePath, u64) -> Value>;

#[derive(Default)]
pub struct AttributeValueCache {
    entries: HashMap<ScenePath, HashMap<Token, Value>>,
    fallbacks: HashMap<ScenePath, HashMap<Token, Fallback>>,
}

impl AttributeValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, else the fallback's value at `frame`, else [`Value::Empty`].
    pub fn get(&self, id: &ScenePath, name: &Token, frame: u64) -> Value {
        if let Some(value) = self.lookup(id, name) {
            return value.clone();
        }
        match self.fallbacks.get(id).and_then(|f| f.get(name)) {
            Some(fallback) => fallback(id, frame),
            None => Value::Empty,
        }
    }

    /// The written value only, ignoring fallbacks.
    pub fn lookup(&self, id: &ScenePath, name: &Token) -> Option<&Value> {
        self.entries.get(id).and_then(|attrs| attrs.get(name))
    }

    pub fn set(&mut self, id: &ScenePath, name: &Token, value: impl Into<Value>) {
        self.entries
            .entry(id.clone())
            .or_default()
            .insert(name.clone(), value.into());
    }

    pub fn register_fallback<F>(&mut self, id: &ScenePath, name: &Token, fallback: F)
    where
        F: Fn(&ScenePath, u64) -> Value + 'static,
    {
        self.fallbacks
            .entry(id.clone())
            .or_default()
            .insert(name.clone(), Box::new(fallback));
    }

    fn has_fallback(&self, id: &ScenePath, name: &Token) -> bool {
        self.fallbacks
            .get(id)
            .is_some_and(|f| f.contains_key(name))
    }

    /// True when `get` would return something other than [`Value::Empty`]
    /// without evaluating a fallback.
    pub fn contains(&self, id: &ScenePath, name: &Token) -> bool {
        self.lookup(id, name).is_some() || self.has_fallback(id, name)
    }

    /// Drops a written value so the fallback (if any) applies again.
    pub fn remove(&mut self, id: &ScenePath, name: &Token) -> Option<Value> {
        self.entries.get_mut(id).and_then(|attrs| attrs.remove(name))
    }

    /// Forgets every value and fallback recorded for `id`.
    pub fn clear_object(&mut self, id: &ScenePath) {
        self.entries.remove(id);
        self.fallbacks.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    #[test]
    fn miss_without_fallback_is_empty() {
        let cache = AttributeValueCache::new();
        assert!(cache.get(&id("/cube0"), &Token::new("points"), 0).is_empty());
    }

    #[test]
    fn set_overrides_fallback() {
        let mut cache = AttributeValueCache::new();
        let cube = id("/cube0");
        let color = Token::new("color");
        cache.register_fallback(&cube, &color, |_, _| Value::Float(0.0));
        cache.set(&cube, &color, 1.0f32);
        assert_eq!(cache.get(&cube, &color, 0), Value::Float(1.0));

        cache.remove(&cube, &color);
        assert_eq!(cache.get(&cube, &color, 0), Value::Float(0.0));
    }

    #[test]
    fn fallback_results_are_not_memoized() {
        let mut cache = AttributeValueCache::new();
        let grid = id("/grid");
        let points = Token::new("points");
        cache.register_fallback(&grid, &points, |_, frame| Value::Int(frame as i32));

        assert_eq!(cache.get(&grid, &points, 1), Value::Int(1));
        assert_eq!(cache.get(&grid, &points, 2), Value::Int(2));
        assert!(cache.lookup(&grid, &points).is_none());
    }

    #[test]
    fn fallbacks_are_per_object() {
        let mut cache = AttributeValueCache::new();
        let points = Token::new("points");
        cache.register_fallback(&id("/a"), &points, |_, _| Value::Bool(true));
        assert!(cache.get(&id("/b"), &points, 0).is_empty());
    }

    #[test]
    fn clear_object_forgets_everything() {
        let mut cache = AttributeValueCache::new();
        let a = id("/a");
        let points = Token::new("points");
        let color = Token::new("color");
        cache.set(&a, &color, 1.0f32);
        cache.register_fallback(&a, &points, |_, _| Value::Bool(true));
        assert!(cache.contains(&a, &color));
        assert!(cache.contains(&a, &points));

        cache.clear_object(&a);
        assert!(!cache.contains(&a, &color));
        assert!(!cache.contains(&a, &points));
        assert!(cache.get(&a, &points, 0).is_empty());
    }
}

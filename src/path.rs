//! Hierarchical scene paths.
//!
//! A [`ScenePath`] is the universal key for everything a delegate describes:
//! meshes, cameras, lights, instancers and render tasks. Paths are absolute,
//! slash-separated and immutable once built.
//!
//! ```
//! use hdpick::ScenePath;
//!
//! let cube = ScenePath::new("/instancer/cube0").unwrap();
//! assert_eq!(cube.name(), "cube0");
//! assert!(cube.has_prefix(&ScenePath::new("/instancer").unwrap()));
//! assert!(ScenePath::root() < cube);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Errors produced when parsing a [`ScenePath`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("scene path must be absolute: {0:?}")]
    NotAbsolute(String),
    #[error("scene path contains an empty segment: {0:?}")]
    EmptySegment(String),
    #[error("invalid character {ch:?} in scene path {path:?}")]
    InvalidCharacter { path: String, ch: char },
}

/// An absolute, slash-delimited path identifying one scene object.
///
/// Ordering is lexicographic on the segment sequence, so the root path sorts
/// before every other path and a parent sorts before its children.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ScenePath(Arc<str>);

impl ScenePath {
    /// Parses an absolute path such as `/cube0` or `/instancerTop/proto`.
    pub fn new(path: &str) -> Result<Self, PathError> {
        validate(path)?;
        Ok(Self(Arc::from(path)))
    }

    /// The absolute root path `/`.
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    /// Builds a path from a literal the crate itself knows to be well formed.
    pub(crate) fn from_static(path: &'static str) -> Self {
        debug_assert!(validate(path).is_ok(), "malformed built-in path {path:?}");
        Self(Arc::from(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        &*self.0 == "/"
    }

    /// Iterates over the path's segments; the root has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The final segment, or an empty string for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The enclosing path, or `None` for the root.
    pub fn parent(&self) -> Option<ScenePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(Arc::from(&self.0[..idx]))),
            None => None,
        }
    }

    /// Appends one segment.
    pub fn child(&self, name: &str) -> Result<ScenePath, PathError> {
        let joined = if self.is_root() {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.0)
        };
        if name.contains('/') {
            return Err(PathError::InvalidCharacter { path: joined, ch: '/' });
        }
        Self::new(&joined)
    }

    /// True when `prefix` is this path or one of its ancestors.
    ///
    /// The comparison is segment-wise: `/cube10` does not have `/cube1` as a prefix.
    pub fn has_prefix(&self, prefix: &ScenePath) -> bool {
        let mut ours = self.segments();
        prefix.segments().all(|seg| ours.next() == Some(seg))
    }
}

fn validate(path: &str) -> Result<(), PathError> {
    if !path.starts_with('/') {
        return Err(PathError::NotAbsolute(path.to_string()));
    }
    if path == "/" {
        return Ok(());
    }
    for segment in path[1..].split('/') {
        if segment.is_empty() {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        if let Some(ch) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(PathError::InvalidCharacter {
                path: path.to_string(),
                ch,
            });
        }
    }
    Ok(())
}

impl Ord for ScenePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments().cmp(other.segments())
    }
}

impl PartialOrd for ScenePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScenePath({:?})", &*self.0)
    }
}

impl FromStr for ScenePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ScenePath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

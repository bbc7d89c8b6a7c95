//! Attribute-name tokens and the registry that hands them out.
//!
//! Tokens compare by exact string content. The [`TokenRegistry`] is built once
//! and shared (via `Rc`) with every delegate and engine that needs the
//! well-known names, so no process-wide tables exist and tests stay hermetic.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An interned attribute or parameter name such as `points` or `params`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(Arc<str>);

impl Token {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?})", &*self.0)
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// The closed-but-extensible set of names the delegate, task graph and engine
/// agree on.
///
/// Well-known names are plain fields; anything else goes through
/// [`intern`](Self::intern) before the registry is shared.
pub struct TokenRegistry {
    // Primvars
    pub points: Token,
    pub normals: Token,
    pub color: Token,
    pub opacity: Token,
    pub widths: Token,
    pub transform: Token,
    pub topology: Token,
    pub material: Token,
    pub instance_indices: Token,
    pub instance_transform: Token,
    pub translate: Token,
    pub rotate: Token,
    pub scale: Token,

    // Tasks
    pub params: Token,
    pub collection: Token,
    pub children: Token,
    pub render_tags: Token,
    pub camera: Token,
    pub viewport: Token,
    pub enable_lighting: Token,
    pub enable_id_render: Token,
    pub color_correction_mode: Token,
    pub root_path: Token,
    pub repr: Token,
    pub name: Token,

    // Cameras
    pub world_to_view_matrix: Token,
    pub projection_matrix: Token,
    pub window_policy: Token,

    // Lights
    pub light_params: Token,
    pub shadow_params: Token,
    pub shadow_collection: Token,

    // Values
    pub geometry: Token,
    pub guide: Token,
    pub smooth_hull: Token,
    pub refined: Token,
    pub fit: Token,
    pub srgb: Token,

    interned: HashMap<String, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            points: Token::new("points"),
            normals: Token::new("normals"),
            color: Token::new("color"),
            opacity: Token::new("opacity"),
            widths: Token::new("widths"),
            transform: Token::new("transform"),
            topology: Token::new("topology"),
            material: Token::new("material"),
            instance_indices: Token::new("instanceIndices"),
            instance_transform: Token::new("instanceTransform"),
            translate: Token::new("translate"),
            rotate: Token::new("rotate"),
            scale: Token::new("scale"),
            params: Token::new("params"),
            collection: Token::new("collection"),
            children: Token::new("children"),
            render_tags: Token::new("renderTags"),
            camera: Token::new("camera"),
            viewport: Token::new("viewport"),
            enable_lighting: Token::new("enableLighting"),
            enable_id_render: Token::new("enableIdRender"),
            color_correction_mode: Token::new("colorCorrectionMode"),
            root_path: Token::new("rootPath"),
            repr: Token::new("repr"),
            name: Token::new("name"),
            world_to_view_matrix: Token::new("worldToViewMatrix"),
            projection_matrix: Token::new("projectionMatrix"),
            window_policy: Token::new("windowPolicy"),
            light_params: Token::new("lightParams"),
            shadow_params: Token::new("shadowParams"),
            shadow_collection: Token::new("shadowCollection"),
            geometry: Token::new("geometry"),
            guide: Token::new("guide"),
            smooth_hull: Token::new("smoothHull"),
            refined: Token::new("refined"),
            fit: Token::new("fit"),
            srgb: Token::new("sRGB"),
            interned: HashMap::new(),
        };

        let well_known: Vec<Token> = registry.well_known().cloned().collect();
        for token in well_known {
            registry.interned.insert(token.as_str().to_string(), token);
        }
        registry
    }

    fn well_known(&self) -> impl Iterator<Item = &Token> {
        [
            &self.points,
            &self.normals,
            &self.color,
            &self.opacity,
            &self.widths,
            &self.transform,
            &self.topology,
            &self.material,
            &self.instance_indices,
            &self.instance_transform,
            &self.translate,
            &self.rotate,
            &self.scale,
            &self.params,
            &self.collection,
            &self.children,
            &self.render_tags,
            &self.camera,
            &self.viewport,
            &self.enable_lighting,
            &self.enable_id_render,
            &self.color_correction_mode,
            &self.root_path,
            &self.repr,
            &self.name,
            &self.world_to_view_matrix,
            &self.projection_matrix,
            &self.window_policy,
            &self.light_params,
            &self.shadow_params,
            &self.shadow_collection,
            &self.geometry,
            &self.guide,
            &self.smooth_hull,
            &self.refined,
            &self.fit,
            &self.srgb,
        ]
        .into_iter()
    }

    /// Returns the registry's token for `name`, adding it if unseen.
    pub fn intern(&mut self, name: &str) -> Token {
        self.interned
            .entry(name.to_string())
            .or_insert_with(|| Token::new(name))
            .clone()
    }

    pub fn lookup(&self, name: &str) -> Option<&Token> {
        self.interned.get(name)
    }

    pub fn len(&self) -> usize {
        self.interned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interned.is_empty()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_names_are_registered() {
        let tokens = TokenRegistry::new();
        assert_eq!(tokens.lookup("points"), Some(&tokens.points));
        assert_eq!(tokens.lookup("instanceTransform"), Some(&tokens.instance_transform));
        assert!(tokens.lookup("widthsScale").is_none());
    }

    #[test]
    fn intern_is_stable() {
        let mut tokens = TokenRegistry::new();
        let before = tokens.len();
        let a = tokens.intern("displayRoughness");
        let b = tokens.intern("displayRoughness");
        assert_eq!(a, b);
        assert_eq!(tokens.len(), before + 1);
        assert_eq!(tokens.intern("points"), tokens.points);
    }

    #[test]
    fn equality_is_by_content() {
        assert_eq!(Token::new("color"), Token::from("color"));
        assert_ne!(Token::new("color"), Token::new("Color"));
        assert_eq!(Token::new("widths"), "widths");
    }
}

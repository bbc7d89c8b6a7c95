//! The tagged value type returned by delegate pulls.
//!
//! A [`Value`] is either [`Value::Empty`], meaning "no opinion, fall back to a
//! default", or carries one concrete payload. Task and light parameters are
//! nested [`ParamBlock`] documents.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3, Vec4};

use crate::geometry::{BasisCurvesTopology, MeshTopology};
use crate::path::ScenePath;
use crate::token::Token;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Nothing cached and nothing computed.
    #[default]
    Empty,
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    Mat4Array(Vec<Mat4>),
    Token(Token),
    TokenArray(Vec<Token>),
    Path(ScenePath),
    PathArray(Vec<ScenePath>),
    Topology(MeshTopology),
    Curves(BasisCurvesTopology),
    Document(ParamBlock),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Short type name used in log output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Vec3(_) => "vec3",
            Value::Vec4(_) => "vec4",
            Value::Mat4(_) => "mat4",
            Value::IntArray(_) => "int[]",
            Value::FloatArray(_) => "float[]",
            Value::Vec3Array(_) => "vec3[]",
            Value::Vec4Array(_) => "vec4[]",
            Value::Mat4Array(_) => "mat4[]",
            Value::Token(_) => "token",
            Value::TokenArray(_) => "token[]",
            Value::Path(_) => "path",
            Value::PathArray(_) => "path[]",
            Value::Topology(_) => "topology",
            Value::Curves(_) => "curves",
            Value::Document(_) => "document",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Value::Vec4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            Value::Mat4(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f32]> {
        match self {
            Value::FloatArray(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_vec3_array(&self) -> Option<&[Vec3]> {
        match self {
            Value::Vec3Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_vec4_array(&self) -> Option<&[Vec4]> {
        match self {
            Value::Vec4Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_mat4_array(&self) -> Option<&[Mat4]> {
        match self {
            Value::Mat4Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Value::Token(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_token_array(&self) -> Option<&[Token]> {
        match self {
            Value::TokenArray(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&ScenePath> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_path_array(&self) -> Option<&[ScenePath]> {
        match self {
            Value::PathArray(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_topology(&self) -> Option<&MeshTopology> {
        match self {
            Value::Topology(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_curves(&self) -> Option<&BasisCurvesTopology> {
        match self {
            Value::Curves(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&ParamBlock> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut ParamBlock> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    f32 => Float,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat4 => Mat4,
    Vec<i32> => IntArray,
    Vec<f32> => FloatArray,
    Vec<Vec3> => Vec3Array,
    Vec<Vec4> => Vec4Array,
    Vec<Mat4> => Mat4Array,
    Token => Token,
    Vec<Token> => TokenArray,
    ScenePath => Path,
    Vec<ScenePath> => PathArray,
    MeshTopology => Topology,
    BasisCurvesTopology => Curves,
    ParamBlock => Document,
}

/// A nested parameter document: task params, collections, light settings.
///
/// Keys are kept sorted so two blocks with the same entries compare equal
/// and print identically.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamBlock {
    entries: BTreeMap<Token, Value>,
}

impl ParamBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &Token, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &Token, value: impl Into<Value>) {
        self.entries.insert(name.clone(), value.into());
    }

    /// Returns the entry for `name`, or [`Value::Empty`].
    pub fn get(&self, name: &Token) -> &Value {
        static EMPTY: Value = Value::Empty;
        self.entries.get(name).unwrap_or(&EMPTY)
    }

    pub fn get_mut(&mut self, name: &Token) -> Option<&mut Value> {
        self.entries.get_mut(name)
    }

    pub fn contains(&self, name: &Token) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &Token) -> Option<Value> {
        self.entries.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(Value::default().is_empty());
        assert!(!Value::from(1.0f32).is_empty());
    }

    #[test]
    fn accessors_reject_other_variants() {
        let v = Value::from(vec![Vec3::ZERO, Vec3::ONE]);
        assert_eq!(v.as_vec3_array().map(|a| a.len()), Some(2));
        assert!(v.as_vec4_array().is_none());
        assert!(v.as_mat4().is_none());
        assert_eq!(v.type_name(), "vec3[]");
    }

    #[test]
    fn param_block_missing_key_is_empty() {
        let viewport = Token::new("viewport");
        let block = ParamBlock::new().with(&viewport, Vec4::new(0.0, 0.0, 512.0, 512.0));
        assert_eq!(
            block.get(&viewport).as_vec4(),
            Some(Vec4::new(0.0, 0.0, 512.0, 512.0))
        );
        assert!(block.get(&Token::new("camera")).is_empty());
    }

    #[test]
    fn nested_documents_can_be_edited_in_place() {
        let params = Token::new("params");
        let lighting = Token::new("enableLighting");
        let mut task = ParamBlock::new().with(&params, ParamBlock::new().with(&lighting, false));

        if let Some(inner) = task.get_mut(&params).and_then(Value::as_document_mut) {
            inner.set(&lighting, true);
        }

        let inner = task.get(&params).as_document().unwrap();
        assert_eq!(inner.get(&lighting).as_bool(), Some(true));
    }
}

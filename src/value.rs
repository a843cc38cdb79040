// src/value.rs
//! Attribute values and their kinds.
//!
//! Every attribute carries exactly one of five value shapes. The enum is
//! closed on purpose: adding a kind forces every consumption site through
//! the compiler. Texture and sampler values are string-keyed handles into
//! the [`crate::resources::ResourceStore`], never raw GPU objects, so the
//! whole CPU side stays constructible without a device.

use std::fmt;

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

/// Discriminant of an [`AttributeValue`], used for mismatch checks and
/// slot accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Scalar,
    Vec4,
    Mat4,
    Texture,
    Sampler,
}

impl ValueKind {
    /// Float slots this kind occupies in a uniform pack. Scalars take a
    /// full 4-slot group so they share the vector write path and the
    /// packed layout never needs padding branches.
    pub const fn slot_cost(self) -> u32 {
        match self {
            ValueKind::Scalar | ValueKind::Vec4 => 4,
            ValueKind::Mat4 => 16,
            ValueKind::Texture | ValueKind::Sampler => 0,
        }
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Scalar | ValueKind::Vec4 | ValueKind::Mat4)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Scalar => "scalar",
            ValueKind::Vec4 => "vec4",
            ValueKind::Mat4 => "mat4",
            ValueKind::Texture => "texture",
            ValueKind::Sampler => "sampler",
        };
        f.write_str(name)
    }
}

/// String-keyed texture handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureRef(String);

impl TextureRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TextureRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// String-keyed sampler handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SamplerRef(String);

impl SamplerRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SamplerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SamplerRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One attribute value.
///
/// Serialized adjacently tagged for schema/material source files, e.g.
/// `{"type": "vec4", "value": [1.0, 0.0, 1.0, 1.0]}` or
/// `{"type": "texture", "value": "white"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Scalar(f32),
    Vec4(Vec4),
    Mat4(Mat4),
    Texture(TextureRef),
    Sampler(SamplerRef),
}

impl AttributeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            AttributeValue::Scalar(_) => ValueKind::Scalar,
            AttributeValue::Vec4(_) => ValueKind::Vec4,
            AttributeValue::Mat4(_) => ValueKind::Mat4,
            AttributeValue::Texture(_) => ValueKind::Texture,
            AttributeValue::Sampler(_) => ValueKind::Sampler,
        }
    }

    pub fn slot_cost(&self) -> u32 {
        self.kind().slot_cost()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().is_numeric()
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Scalar(v)
    }
}

impl From<Vec4> for AttributeValue {
    fn from(v: Vec4) -> Self {
        AttributeValue::Vec4(v)
    }
}

impl From<Mat4> for AttributeValue {
    fn from(v: Mat4) -> Self {
        AttributeValue::Mat4(v)
    }
}

impl From<TextureRef> for AttributeValue {
    fn from(v: TextureRef) -> Self {
        AttributeValue::Texture(v)
    }
}

impl From<SamplerRef> for AttributeValue {
    fn from(v: SamplerRef) -> Self {
        AttributeValue::Sampler(v)
    }
}

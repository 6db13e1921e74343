//! Property values attached to nodes and edges.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::field::{Field, FieldType};

/// A typed node/edge property value.
///
/// Equality and ordering compare the type first and the value second:
/// values of different types are never equal and order by type tag
/// (`Integer < Float < String`). The derives rely on the variant order
/// matching the [`FieldType`] tags.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum PropertyValue {
    /// 32-bit signed integer value.
    Integer(i32),
    /// 32-bit floating point value.
    Float(f32),
    /// String value.
    String(String),
}

impl Default for PropertyValue {
    fn default() -> Self {
        PropertyValue::Integer(0)
    }
}

impl PropertyValue {
    /// Returns the type tag of this value.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            PropertyValue::Integer(_) => FieldType::Integer,
            PropertyValue::Float(_) => FieldType::Float,
            PropertyValue::String(_) => FieldType::String,
        }
    }

    /// Attempts to extract an i32 value.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract an f32 value.
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<Field> for PropertyValue {
    fn from(field: Field) -> Self {
        match field {
            Field::Integer(i) => PropertyValue::Integer(i),
            Field::Float(f) => PropertyValue::Float(f),
            Field::String(s) => PropertyValue::String(s),
        }
    }
}

impl From<PropertyValue> for Field {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Integer(i) => Field::Integer(i),
            PropertyValue::Float(f) => Field::Float(f),
            PropertyValue::String(s) => Field::String(s),
        }
    }
}

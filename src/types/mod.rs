//! Scalar value types shared by the storage and graph layers.
//!
//! - [`Field`] / [`Tuple`]: the textual record format used by slotted pages
//! - [`PropertyValue`]: typed node/edge property values

mod field;
mod value;

pub use field::{Field, FieldType, Tuple};
pub use value::PropertyValue;

//! Field and Tuple definitions with their text serialization.
//!
//! A field serializes as `<type> <byte-length> <value> ` and a tuple as
//! `<field-count> <field0><field1>...`. String byte lengths count a trailing
//! terminator that is not written, so a string value occupies
//! `byte-length - 1` bytes on the wire. Reading strings by length rather than
//! by whitespace lets values contain spaces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PageGraphError, Result};

/// Type tag of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FieldType {
    /// 32-bit signed integer.
    Integer = 0,
    /// 32-bit floating point.
    Float = 1,
    /// UTF-8 string.
    String = 2,
}

impl FieldType {
    /// Returns the numeric tag written on the wire.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Converts a wire tag back to a `FieldType`.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FieldType::Integer),
            1 => Some(FieldType::Float),
            2 => Some(FieldType::String),
            _ => None,
        }
    }

    /// Returns the display name of the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::String => "STRING",
        }
    }
}

/// A single typed scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// 32-bit signed integer value.
    Integer(i32),
    /// 32-bit floating point value.
    Float(f32),
    /// String value.
    String(String),
}

impl Field {
    /// Returns the type tag of this field.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Integer(_) => FieldType::Integer,
            Field::Float(_) => FieldType::Float,
            Field::String(_) => FieldType::String,
        }
    }

    /// Returns the byte length recorded in the serialized form.
    ///
    /// Strings count their terminator.
    #[must_use]
    pub fn data_length(&self) -> usize {
        match self {
            Field::Integer(_) => std::mem::size_of::<i32>(),
            Field::Float(_) => std::mem::size_of::<f32>(),
            Field::String(s) => s.len() + 1,
        }
    }

    /// Attempts to extract an i32 value.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract an f32 value.
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Field::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Serializes the field as `<type> <byte-length> <value> `.
    #[must_use]
    pub fn serialize(&self) -> String {
        format!(
            "{} {} {} ",
            self.field_type().tag(),
            self.data_length(),
            self
        )
    }

    /// Deserializes one field from the start of `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is truncated or malformed.
    pub fn deserialize(input: &str) -> Result<Self> {
        let mut reader = TextReader::new(input);
        reader.read_field()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Integer(i) => write!(f, "{i}"),
            Field::Float(v) => write!(f, "{v}"),
            Field::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Integer(value)
    }
}

impl From<f32> for Field {
    fn from(value: f32) -> Self {
        Field::Float(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::String(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::String(value)
    }
}

/// An ordered sequence of fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple {
    fields: Vec<Field>,
}

impl Tuple {
    /// Creates an empty tuple.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends a field.
    pub fn add_field(&mut self, field: impl Into<Field>) {
        self.fields.push(field.into());
    }

    /// Returns the fields in order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field at `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the tuple has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serializes as `<field-count> <field0><field1>...`.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = format!("{} ", self.fields.len());
        for field in &self.fields {
            out.push_str(&field.serialize());
        }
        out
    }

    /// Deserializes a tuple from the start of `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is truncated or malformed.
    pub fn deserialize(input: &str) -> Result<Self> {
        let mut reader = TextReader::new(input);
        let count: usize = reader.parse_token("field count")?;
        let mut tuple = Tuple::default();
        for _ in 0..count {
            tuple.fields.push(reader.read_field()?);
        }
        Ok(tuple)
    }
}

impl FromIterator<Field> for Tuple {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

/// Cursor over serialized field text.
struct TextReader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TextReader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn next_token(&mut self, what: &str) -> Result<&'a str> {
        self.skip_whitespace();
        let rest = &self.input[self.pos..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return Err(PageGraphError::SerializationError(format!(
                "unexpected end of input while reading {what}"
            )));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    fn parse_token<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.next_token(what)?;
        token.parse().map_err(|_| {
            PageGraphError::SerializationError(format!("invalid {what}: {token:?}"))
        })
    }

    /// Takes exactly `len` bytes after the single separator space.
    fn take_bytes(&mut self, len: usize) -> Result<&'a str> {
        if self.input[self.pos..].starts_with(' ') {
            self.pos += 1;
        }
        let value = self
            .pos
            .checked_add(len)
            .and_then(|end| self.input.get(self.pos..end))
            .ok_or_else(|| {
                PageGraphError::SerializationError(format!(
                    "string value of {len} bytes truncated at offset {}",
                    self.pos
                ))
            })?;
        self.pos += len;
        Ok(value)
    }

    fn read_field(&mut self) -> Result<Field> {
        let tag: u8 = self.parse_token("field type")?;
        let length: usize = self.parse_token("field length")?;
        let field_type = FieldType::from_tag(tag).ok_or_else(|| {
            PageGraphError::SerializationError(format!("unknown field type tag {tag}"))
        })?;

        match field_type {
            FieldType::Integer => Ok(Field::Integer(self.parse_token("integer value")?)),
            FieldType::Float => Ok(Field::Float(self.parse_token("float value")?)),
            FieldType::String => {
                if length == 0 {
                    return Err(PageGraphError::SerializationError(
                        "string length must include the terminator".into(),
                    ));
                }
                let value = self.take_bytes(length - 1)?;
                Ok(Field::String(value.to_string()))
            }
        }
    }
}

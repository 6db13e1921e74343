//! Node and edge records and their on-page encoding.
//!
//! Every graph entity owns one page. The record sits at the start of the
//! page in this little-endian layout:
//!
//! ```text
//! [0]       kind (0 empty, 1 node, 2 edge)
//! [1]       flags (bit 0: directed)
//! [2..4]    property count (u16)
//! [4..8]    id (u32)
//! [8..12]   source (u32, edges only)
//! [12..16]  target (u32, edges only)
//! [16..20]  body length (u32)
//! [20..24]  CRC32 of the body
//! [24..]    body: per property
//!           name_len u16, name bytes, tag u8,
//!           value (i32 | f32 | len u16 + UTF-8 bytes)
//! ```
//!
//! Bytes past the body are zero. A page whose kind byte is 0 holds no
//! record.

use std::collections::HashMap;
use std::fmt;

use smallvec::SmallVec;

use crate::error::{PageGraphError, Result};
use crate::types::{FieldType, PropertyValue};

/// Node identifier; equal to the node's page id.
pub type NodeId = u32;

/// Edge identifier; equal to the edge's page id.
pub type EdgeId = u32;

/// Maximum number of properties on one node or edge.
pub const MAX_PROPERTY_COUNT: usize = 10;

/// Size of the fixed record header.
pub const RECORD_HEADER_SIZE: usize = 24;

const FLAG_DIRECTED: u8 = 0x01;

/// Record kind stored in the first byte of an entity page.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecordKind {
    Empty = 0x00,
    Node = 0x01,
    Edge = 0x02,
}

impl RecordKind {
    fn from_byte(page_id: u32, byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Empty),
            0x01 => Ok(Self::Node),
            0x02 => Ok(Self::Edge),
            other => Err(corrupted(page_id, format!("unknown record kind 0x{other:02X}"))),
        }
    }
}

fn corrupted(page_id: u32, reason: impl Into<String>) -> PageGraphError {
    PageGraphError::CorruptedPage {
        page_id,
        reason: reason.into(),
    }
}

/// Fixed-capacity property list kept as parallel name/value arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedProperties {
    names: SmallVec<[String; MAX_PROPERTY_COUNT]>,
    values: SmallVec<[PropertyValue; MAX_PROPERTY_COUNT]>,
}

impl PackedProperties {
    /// Creates an empty property list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns whether there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.values[idx])
    }

    /// Sets a property, replacing the value if the name is already present.
    ///
    /// # Errors
    ///
    /// Returns `CapacityOverflow` if a new name would exceed
    /// [`MAX_PROPERTY_COUNT`].
    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) -> Result<()> {
        let name = name.into();
        if let Some(idx) = self.names.iter().position(|n| *n == name) {
            self.values[idx] = value;
            return Ok(());
        }
        if self.names.len() >= MAX_PROPERTY_COUNT {
            return Err(PageGraphError::CapacityOverflow(format!(
                "Maximum property count ({MAX_PROPERTY_COUNT}) reached, cannot add '{name}'"
            )));
        }
        self.names.push(name);
        self.values.push(value);
        Ok(())
    }

    /// Iterates properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    /// Converts to an unpacked property map.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, PropertyValue> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for (name, value) in self.iter() {
            put_str(&mut body, name)?;
            body.push(value.field_type().tag());
            match value {
                PropertyValue::Integer(i) => body.extend_from_slice(&i.to_le_bytes()),
                PropertyValue::Float(f) => body.extend_from_slice(&f.to_le_bytes()),
                PropertyValue::String(s) => put_str(&mut body, s)?,
            }
        }
        Ok(body)
    }

    fn decode_body(page_id: u32, count: usize, body: &[u8]) -> Result<Self> {
        if count > MAX_PROPERTY_COUNT {
            return Err(corrupted(
                page_id,
                format!("property count {count} exceeds {MAX_PROPERTY_COUNT}"),
            ));
        }

        let mut reader = BodyReader {
            page_id,
            data: body,
            pos: 0,
        };
        let mut props = Self::new();
        for _ in 0..count {
            let name = reader.string()?;
            let tag = reader.u8()?;
            let value = match FieldType::from_tag(tag) {
                Some(FieldType::Integer) => PropertyValue::Integer(i32::from_le_bytes(reader.array()?)),
                Some(FieldType::Float) => PropertyValue::Float(f32::from_le_bytes(reader.array()?)),
                Some(FieldType::String) => PropertyValue::String(reader.string()?),
                None => return Err(corrupted(page_id, format!("unknown value tag {tag}"))),
            };
            props.names.push(name);
            props.values.push(value);
        }
        if reader.pos != body.len() {
            return Err(corrupted(page_id, "trailing bytes after properties"));
        }
        Ok(props)
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| PageGraphError::RecordTooLarge {
        size: s.len(),
        max: usize::from(u16::MAX),
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

struct BodyReader<'a> {
    page_id: u32,
    data: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(corrupted(self.page_id, "record body truncated"));
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn string(&mut self) -> Result<String> {
        let len = u16::from_le_bytes(self.array()?);
        let bytes = self.take(usize::from(len))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| corrupted(self.page_id, "property text is not valid UTF-8"))
    }
}

/// Node record as stored on its page.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedNode {
    pub id: NodeId,
    pub properties: PackedProperties,
}

impl PackedNode {
    /// Creates a node record with no properties.
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            properties: PackedProperties::new(),
        }
    }

    /// Converts to the unpacked form.
    #[must_use]
    pub fn unpack(&self) -> Node {
        Node {
            id: self.id,
            properties: self.properties.to_map(),
        }
    }
}

/// Edge record as stored on its page.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub directed: bool,
    pub properties: PackedProperties,
}

impl PackedEdge {
    /// Creates an edge record with no properties.
    #[must_use]
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, directed: bool) -> Self {
        Self {
            id,
            source,
            target,
            directed,
            properties: PackedProperties::new(),
        }
    }

    /// Converts to the unpacked form.
    #[must_use]
    pub fn unpack(&self) -> Edge {
        Edge {
            id: self.id,
            source: self.source,
            target: self.target,
            directed: self.directed,
            properties: self.properties.to_map(),
        }
    }
}

/// A record decoded from an entity page.
#[derive(Debug, Clone, PartialEq)]
pub enum PackedRecord {
    Node(PackedNode),
    Edge(PackedEdge),
}

impl PackedRecord {
    /// Encodes the record at the start of `page`, zeroing the remainder.
    ///
    /// # Errors
    ///
    /// Returns `RecordTooLarge` if the encoded record does not fit; `page` is
    /// left untouched in that case.
    pub fn encode_into(&self, page: &mut [u8]) -> Result<()> {
        let (kind, flags, id, source, target, props) = match self {
            PackedRecord::Node(node) => (RecordKind::Node, 0, node.id, 0, 0, &node.properties),
            PackedRecord::Edge(edge) => (
                RecordKind::Edge,
                if edge.directed { FLAG_DIRECTED } else { 0 },
                edge.id,
                edge.source,
                edge.target,
                &edge.properties,
            ),
        };

        let body = props.encode_body()?;
        let size = RECORD_HEADER_SIZE + body.len();
        if size > page.len() {
            return Err(PageGraphError::RecordTooLarge {
                size,
                max: page.len(),
            });
        }

        // Lengths are bounded by the page size checked above.
        let (count, body_len) = (props.len() as u16, body.len() as u32);

        page[0] = kind as u8;
        page[1] = flags;
        page[2..4].copy_from_slice(&count.to_le_bytes());
        page[4..8].copy_from_slice(&id.to_le_bytes());
        page[8..12].copy_from_slice(&source.to_le_bytes());
        page[12..16].copy_from_slice(&target.to_le_bytes());
        page[16..20].copy_from_slice(&body_len.to_le_bytes());
        page[20..24].copy_from_slice(&crc32fast::hash(&body).to_le_bytes());
        page[RECORD_HEADER_SIZE..size].copy_from_slice(&body);
        page[size..].fill(0);
        Ok(())
    }

    /// Decodes the record stored on page `page_id`.
    ///
    /// Returns `None` for a page that holds no record.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedPage` if the header, checksum or body is invalid.
    pub fn decode(page_id: u32, page: &[u8]) -> Result<Option<Self>> {
        if page.len() < RECORD_HEADER_SIZE {
            return Err(corrupted(page_id, "page shorter than record header"));
        }
        let kind = RecordKind::from_byte(page_id, page[0])?;
        if kind == RecordKind::Empty {
            return Ok(None);
        }

        let read_u32 = |at: usize| u32::from_le_bytes([page[at], page[at + 1], page[at + 2], page[at + 3]]);
        let flags = page[1];
        let count = usize::from(u16::from_le_bytes([page[2], page[3]]));
        let id = read_u32(4);
        let source = read_u32(8);
        let target = read_u32(12);
        let body_len = read_u32(16) as usize;
        let checksum = read_u32(20);

        let Some(body) = page.get(RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + body_len) else {
            return Err(corrupted(page_id, format!("body length {body_len} exceeds page")));
        };
        if crc32fast::hash(body) != checksum {
            return Err(corrupted(page_id, "record checksum mismatch"));
        }
        if id != page_id {
            return Err(corrupted(page_id, format!("record id {id} does not match page")));
        }

        let properties = PackedProperties::decode_body(page_id, count, body)?;
        Ok(Some(match kind {
            RecordKind::Node => PackedRecord::Node(PackedNode { id, properties }),
            _ => PackedRecord::Edge(PackedEdge {
                id,
                source,
                target,
                directed: flags & FLAG_DIRECTED != 0,
                properties,
            }),
        }))
    }
}

/// A node with its properties in a map.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub properties: HashMap<String, PropertyValue>,
}

impl Node {
    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Returns whether the node's `type` property is the string `kind`.
    #[must_use]
    pub fn is_type(&self, kind: &str) -> bool {
        self.property("type").and_then(PropertyValue::as_str) == Some(kind)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node {} [ ", self.id)?;
        write_properties(f, &self.properties)?;
        write!(f, "]")
    }
}

/// An edge with its properties in a map.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub directed: bool,
    pub properties: HashMap<String, PropertyValue>,
}

impl Edge {
    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge {} ({} -> {}) [ ", self.id, self.source, self.target)?;
        write_properties(f, &self.properties)?;
        write!(f, "]")
    }
}

fn write_properties(f: &mut fmt::Formatter<'_>, props: &HashMap<String, PropertyValue>) -> fmt::Result {
    let mut names: Vec<&String> = props.keys().collect();
    names.sort();
    for name in names {
        write!(f, "{name}: {}, ", props[name])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PAGE_SIZE;
    use proptest::prelude::*;

    fn user_node(id: NodeId) -> PackedNode {
        let mut node = PackedNode::new(id);
        node.properties.set("type", "user".into()).unwrap();
        node.properties.set("age", 31.into()).unwrap();
        node.properties.set("score", 0.5f32.into()).unwrap();
        node
    }

    #[test]
    fn test_set_replaces_existing_name() {
        let mut props = PackedProperties::new();
        props.set("likes", 1.into()).unwrap();
        props.set("likes", 7.into()).unwrap();

        assert_eq!(props.len(), 1);
        assert_eq!(props.get("likes"), Some(&PropertyValue::Integer(7)));
    }

    #[test]
    fn test_property_cap() {
        let mut props = PackedProperties::new();
        for i in 0..MAX_PROPERTY_COUNT {
            props.set(format!("p{i}"), PropertyValue::Integer(0)).unwrap();
        }

        let err = props.set("one_more", PropertyValue::Integer(0)).unwrap_err();
        assert!(matches!(err, PageGraphError::CapacityOverflow(_)));
        assert_eq!(props.len(), MAX_PROPERTY_COUNT);

        // Replacing an existing name is still allowed at the cap.
        props.set("p0", PropertyValue::Integer(1)).unwrap();
    }

    #[test]
    fn test_header_layout() {
        let mut edge = PackedEdge::new(181, 3, 9, true);
        edge.properties.set("w", 2.into()).unwrap();
        let mut page = [0xEEu8; PAGE_SIZE];
        PackedRecord::Edge(edge).encode_into(&mut page).unwrap();

        assert_eq!(page[0], 2);
        assert_eq!(page[1], FLAG_DIRECTED);
        assert_eq!(&page[2..4], &1u16.to_le_bytes());
        assert_eq!(&page[4..8], &181u32.to_le_bytes());
        assert_eq!(&page[8..12], &3u32.to_le_bytes());
        assert_eq!(&page[12..16], &9u32.to_le_bytes());
        // name_len(2) + "w"(1) + tag(1) + i32(4)
        assert_eq!(&page[16..20], &8u32.to_le_bytes());
        assert_eq!(&page[24..26], &1u16.to_le_bytes());
        assert_eq!(page[26], b'w');
        assert_eq!(page[27], FieldType::Integer.tag());
        assert!(page[32..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_page_decodes_to_none() {
        let page = [0u8; PAGE_SIZE];
        assert_eq!(PackedRecord::decode(5, &page).unwrap(), None);
    }

    #[test]
    fn test_node_decode() {
        let node = user_node(4);
        let mut page = [0u8; PAGE_SIZE];
        PackedRecord::Node(node.clone()).encode_into(&mut page).unwrap();

        let decoded = PackedRecord::decode(4, &page).unwrap();
        assert_eq!(decoded, Some(PackedRecord::Node(node)));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut page = [0u8; PAGE_SIZE];
        PackedRecord::Node(user_node(2)).encode_into(&mut page).unwrap();
        page[RECORD_HEADER_SIZE + 3] ^= 0xFF;

        assert!(matches!(
            PackedRecord::decode(2, &page),
            Err(PageGraphError::CorruptedPage { page_id: 2, .. })
        ));
    }

    #[test]
    fn test_id_mismatch_detected() {
        let mut page = [0u8; PAGE_SIZE];
        PackedRecord::Node(user_node(2)).encode_into(&mut page).unwrap();
        assert!(PackedRecord::decode(3, &page).is_err());
    }

    #[test]
    fn test_unknown_kind_detected() {
        let mut page = [0u8; PAGE_SIZE];
        page[0] = 9;
        assert!(PackedRecord::decode(1, &page).is_err());
    }

    #[test]
    fn test_oversized_record_leaves_page_untouched() {
        let mut node = PackedNode::new(1);
        for i in 0..3 {
            node.properties
                .set(format!("blob{i}"), "x".repeat(1500).into())
                .unwrap();
        }
        let mut page = [7u8; PAGE_SIZE];

        let err = PackedRecord::Node(node).encode_into(&mut page).unwrap_err();
        assert!(matches!(err, PageGraphError::RecordTooLarge { max: PAGE_SIZE, .. }));
        assert!(page.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_display_sorted_properties() {
        let node = user_node(1).unpack();
        assert_eq!(node.to_string(), "Node 1 [ age: 31, score: 0.5, type: user, ]");
        assert!(node.is_type("user"));
        assert!(!node.is_type("post"));
    }

    fn arb_value() -> impl Strategy<Value = PropertyValue> {
        prop_oneof![
            any::<i32>().prop_map(PropertyValue::Integer),
            (-1.0e6f32..1.0e6).prop_map(PropertyValue::Float),
            "[a-zA-Z0-9 ,]{0,40}".prop_map(PropertyValue::String),
        ]
    }

    proptest! {
        #[test]
        fn prop_edge_record_roundtrip(
            props in prop::collection::btree_map("[a-z_]{1,12}", arb_value(), 0..=MAX_PROPERTY_COUNT),
            source in 1u32..=180,
            target in 1u32..=180,
            directed in any::<bool>(),
        ) {
            let mut edge = PackedEdge::new(200, source, target, directed);
            for (name, value) in &props {
                edge.properties.set(name.clone(), value.clone()).unwrap();
            }
            let record = PackedRecord::Edge(edge);

            let mut page = [0u8; PAGE_SIZE];
            record.encode_into(&mut page).unwrap();
            let decoded = PackedRecord::decode(200, &page).unwrap();
            prop_assert_eq!(decoded, Some(record));
        }
    }
}

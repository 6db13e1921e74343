//! Graph layer: one page per node or edge plus an in-memory adjacency matrix.
//!
//! Node ids run `1..=max_nodes` and edge ids `max_nodes + 1..=max_nodes +
//! max_edges`, both allocated in order and never reused. An entity's page id
//! equals its id, so page 0 is never touched.
//!
//! Every operation fixes one page at a time and releases it before fixing
//! the next, so a small buffer pool is enough for any query.

mod adjacency;
mod record;

pub use adjacency::{AdjacencyMatrix, EdgeListing};
pub use record::{
    Edge, EdgeId, Node, NodeId, PackedEdge, PackedNode, PackedProperties, PackedRecord,
    RecordKind, MAX_PROPERTY_COUNT, RECORD_HEADER_SIZE,
};

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::{PageGraphError, Result};
use crate::storage::{BufferPool, PageId};
use crate::types::PropertyValue;
use crate::DatabaseConfig;

/// Direct connections of a user, bucketed by relationship.
///
/// Each entry is a neighbour's name and the total likes on that
/// neighbour's posts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionsAndLikes {
    pub colleagues: Vec<(String, i64)>,
    pub friends: Vec<(String, i64)>,
}

/// Owns the buffer pool and all graph bookkeeping.
pub struct GraphManager {
    pool: BufferPool,
    max_nodes: u32,
    max_edges: u32,
    /// Number of nodes allocated so far.
    node_count: u32,
    /// Number of edges allocated so far.
    edge_count: u32,
    adjacency: AdjacencyMatrix,
}

impl GraphManager {
    /// Creates a graph over an empty database file.
    ///
    /// Grows the file to cover every page an entity can occupy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the file cannot
    /// be extended.
    pub fn new(pool: BufferPool, config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let graph = Self {
            pool,
            max_nodes: config.max_nodes,
            max_edges: config.max_edges,
            node_count: 0,
            edge_count: 0,
            adjacency: AdjacencyMatrix::new(config.max_nodes as usize),
        };
        graph.pool.extend_to(PageId::new(graph.last_page()))?;
        Ok(graph)
    }

    /// Opens the graph stored in an existing database file.
    ///
    /// Node and edge pages are scanned in id order until the first empty
    /// page of each range; the counters and adjacency matrix are rebuilt
    /// from what is found.
    ///
    /// # Errors
    ///
    /// Returns an error if a page cannot be read or holds a record of the
    /// wrong kind or a corrupt record.
    pub fn open(pool: BufferPool, config: &DatabaseConfig) -> Result<Self> {
        let mut graph = Self::new(pool, config)?;

        for id in 1..=graph.max_nodes {
            match graph.read_record(id)? {
                Some(PackedRecord::Node(_)) => graph.node_count = id,
                None => break,
                Some(PackedRecord::Edge(_)) => return Err(wrong_kind(id, "node")),
            }
        }

        for id in graph.first_edge_id()..=graph.last_page() {
            match graph.read_record(id)? {
                Some(PackedRecord::Edge(edge)) => {
                    graph.check_endpoint(edge.source)?;
                    graph.check_endpoint(edge.target)?;
                    graph.link(&edge);
                    graph.edge_count += 1;
                }
                None => break,
                Some(PackedRecord::Node(_)) => return Err(wrong_kind(id, "edge")),
            }
        }

        info!(
            nodes = graph.node_count,
            edges = graph.edge_count,
            "graph.open"
        );
        Ok(graph)
    }

    /// Returns the configured maximum node count.
    #[must_use]
    pub fn max_nodes(&self) -> u32 {
        self.max_nodes
    }

    /// Returns the configured maximum edge count.
    #[must_use]
    pub fn max_edges(&self) -> u32 {
        self.max_edges
    }

    /// Returns the number of nodes created.
    #[must_use]
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Returns the number of edges created.
    #[must_use]
    pub fn edge_count(&self) -> u32 {
        self.edge_count
    }

    /// Returns the adjacency matrix.
    #[must_use]
    pub fn adjacency(&self) -> &AdjacencyMatrix {
        &self.adjacency
    }

    /// Returns the underlying buffer pool.
    #[must_use]
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Writes every cached page to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be written.
    pub fn flush(&self) -> Result<()> {
        self.pool.flush_all()
    }

    fn first_edge_id(&self) -> EdgeId {
        self.max_nodes + 1
    }

    fn last_page(&self) -> u32 {
        self.max_nodes + self.max_edges
    }

    /// Creates a node with the given properties.
    ///
    /// # Errors
    ///
    /// Returns `CapacityOverflow` if the graph already holds `max_nodes`
    /// nodes or more than [`MAX_PROPERTY_COUNT`] properties are supplied,
    /// and `RecordTooLarge` if the properties do not fit on a page. No id is
    /// consumed on failure.
    pub fn create_node<I, K, V>(&mut self, properties: I) -> Result<Node>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        if self.node_count >= self.max_nodes {
            return Err(PageGraphError::CapacityOverflow(format!(
                "Maximum node count ({}) reached",
                self.max_nodes
            )));
        }

        let id = self.node_count + 1;
        let mut node = PackedNode::new(id);
        for (name, value) in properties {
            node.properties.set(name, value.into())?;
        }

        let unpacked = node.unpack();
        self.write_record(id, &PackedRecord::Node(node))?;
        self.node_count = id;
        debug!(node_id = id, "graph.create_node");
        Ok(unpacked)
    }

    /// Sets a property on an existing node.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `node_id` is not an allocated node,
    /// `CapacityOverflow` if the node already has [`MAX_PROPERTY_COUNT`]
    /// properties, and `RecordTooLarge` if the record would outgrow its
    /// page.
    pub fn add_node_property(
        &self,
        node_id: NodeId,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.check_allocated_node(node_id)?;
        let mut node = self.read_node(node_id)?;
        node.properties.set(name, value.into())?;
        self.write_record(node_id, &PackedRecord::Node(node))
    }

    /// Creates an edge between two existing nodes.
    ///
    /// An undirected edge is recorded in both directions of the adjacency
    /// matrix. A later edge between the same pair replaces the matrix entry.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if an endpoint is outside `1..=max_nodes`,
    /// `ReferentialIntegrity` if an endpoint was never created,
    /// `CapacityOverflow` if the edge or property limit is reached, and
    /// `RecordTooLarge` if the properties do not fit on a page.
    pub fn create_edge<I, K, V>(
        &mut self,
        source: NodeId,
        target: NodeId,
        properties: I,
        directed: bool,
    ) -> Result<Edge>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        self.check_endpoint(source)?;
        self.check_endpoint(target)?;
        if self.edge_count >= self.max_edges {
            return Err(PageGraphError::CapacityOverflow(format!(
                "Maximum edge count ({}) reached",
                self.max_edges
            )));
        }

        let id = self.first_edge_id() + self.edge_count;
        let mut edge = PackedEdge::new(id, source, target, directed);
        for (name, value) in properties {
            edge.properties.set(name, value.into())?;
        }

        let unpacked = edge.unpack();
        self.write_record(id, &PackedRecord::Edge(edge.clone()))?;
        self.link(&edge);
        self.edge_count += 1;
        debug!(edge_id = id, source, target, directed, "graph.create_edge");
        Ok(unpacked)
    }

    /// Sets a property on an existing edge.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `edge_id` is not an allocated edge,
    /// `CapacityOverflow` if the edge already has [`MAX_PROPERTY_COUNT`]
    /// properties, and `RecordTooLarge` if the record would outgrow its
    /// page.
    pub fn add_edge_property(
        &self,
        edge_id: EdgeId,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.check_allocated_edge(edge_id)?;
        let mut edge = self.read_edge(edge_id)?;
        edge.properties.set(name, value.into())?;
        self.write_record(edge_id, &PackedRecord::Edge(edge))
    }

    /// Returns the node with id `node_id`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if the node was never created.
    pub fn node(&self, node_id: NodeId) -> Result<Node> {
        self.check_allocated_node(node_id)?;
        Ok(self.read_node(node_id)?.unpack())
    }

    /// Returns the edge with id `edge_id`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if the edge was never created.
    pub fn edge(&self, edge_id: EdgeId) -> Result<Edge> {
        self.check_allocated_edge(edge_id)?;
        Ok(self.read_edge(edge_id)?.unpack())
    }

    /// Returns the lowest-id node whose property `name` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if a node page cannot be read.
    pub fn find_node_by_property(
        &self,
        name: &str,
        value: &PropertyValue,
    ) -> Result<Option<Node>> {
        for id in 1..=self.node_count {
            let node = self.read_node(id)?;
            if node.properties.get(name) == Some(value) {
                return Ok(Some(node.unpack()));
            }
        }
        Ok(None)
    }

    /// Returns the `user` nodes exactly `degree` hops from `start`.
    ///
    /// Breadth-first over the adjacency matrix: each node is visited at its
    /// shortest distance, and nodes at `degree` are not expanded further.
    /// Results are in discovery order.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `start` is outside `1..=max_nodes` and
    /// `InvalidArgument` if `degree` is 0.
    pub fn find_nth_degree_connections(
        &self,
        start: NodeId,
        degree: usize,
    ) -> Result<Vec<NodeId>> {
        self.check_endpoint_range(start)?;
        if degree == 0 {
            return Err(PageGraphError::InvalidArgument(
                "Degree must be greater than 0".into(),
            ));
        }

        let mut visited = vec![false; self.adjacency.size()];
        let mut queue = VecDeque::new();
        let mut found = Vec::new();

        visited[start as usize - 1] = true;
        queue.push_back((start, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if depth == degree {
                if self.read_node(current)?.unpack().is_type("user") {
                    found.push(current);
                }
                continue;
            }

            for (neighbor, _) in self.adjacency.neighbors(current) {
                let seen = &mut visited[neighbor as usize - 1];
                if !*seen {
                    *seen = true;
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        Ok(found)
    }

    /// Lists a user's direct `user` neighbours with the likes on their posts.
    ///
    /// Neighbours are bucketed by the `relationship` property of the
    /// connecting edge; neighbours without a `name`, edges without a string
    /// `relationship`, and relationships other than `friends` and
    /// `colleagues` are skipped.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `user_id` is outside `1..=max_nodes`.
    pub fn find_connections_and_likes(&self, user_id: NodeId) -> Result<ConnectionsAndLikes> {
        self.check_endpoint_range(user_id)?;
        let mut result = ConnectionsAndLikes::default();

        for (neighbor, edge_id) in self.adjacency.neighbors(user_id) {
            let node = self.read_node(neighbor)?.unpack();
            if !node.is_type("user") {
                continue;
            }
            let Some(name) = node.property("name").and_then(PropertyValue::as_str) else {
                continue;
            };

            let edge = self.read_edge(edge_id)?;
            let Some(relationship) = edge
                .properties
                .get("relationship")
                .and_then(PropertyValue::as_str)
            else {
                continue;
            };

            let bucket = match relationship {
                "friends" => &mut result.friends,
                "colleagues" => &mut result.colleagues,
                _ => continue,
            };

            let mut likes = 0i64;
            for (second, _) in self.adjacency.neighbors(neighbor) {
                let post = self.read_node(second)?.unpack();
                if post.is_type("post") {
                    if let Some(count) = post.property("likes").and_then(PropertyValue::as_int) {
                        likes += i64::from(count);
                    }
                }
            }

            bucket.push((name.to_string(), likes));
        }

        Ok(result)
    }

    /// Returns every node that takes part in at least one edge, by
    /// ascending id.
    ///
    /// # Errors
    ///
    /// Returns an error if a node page cannot be read.
    pub fn list_nodes(&self) -> Result<Vec<Node>> {
        self.adjacency
            .connected_nodes()
            .into_iter()
            .map(|id| self.read_node(id).map(|node| node.unpack()))
            .collect()
    }

    /// Lists each connected node pair once.
    #[must_use]
    pub fn list_edges(&self) -> Vec<EdgeListing> {
        self.adjacency.edge_listing()
    }

    fn link(&mut self, edge: &PackedEdge) {
        self.adjacency.set(edge.source, edge.target, edge.id);
        if !edge.directed {
            self.adjacency.set(edge.target, edge.source, edge.id);
        }
    }

    fn check_endpoint_range(&self, node_id: NodeId) -> Result<()> {
        if node_id == 0 || node_id > self.max_nodes {
            return Err(PageGraphError::OutOfRange {
                kind: "Node",
                id: u64::from(node_id),
                min: 1,
                max: u64::from(self.max_nodes),
            });
        }
        Ok(())
    }

    fn check_endpoint(&self, node_id: NodeId) -> Result<()> {
        self.check_endpoint_range(node_id)?;
        if node_id > self.node_count {
            return Err(PageGraphError::ReferentialIntegrity(format!(
                "Edge endpoint {node_id} is not an existing node ({} created)",
                self.node_count
            )));
        }
        Ok(())
    }

    fn check_allocated_node(&self, node_id: NodeId) -> Result<()> {
        if node_id == 0 || node_id > self.node_count {
            return Err(PageGraphError::OutOfRange {
                kind: "Node",
                id: u64::from(node_id),
                min: 1,
                max: u64::from(self.node_count),
            });
        }
        Ok(())
    }

    fn check_allocated_edge(&self, edge_id: EdgeId) -> Result<()> {
        let first = self.first_edge_id();
        if edge_id < first || edge_id - first >= self.edge_count {
            return Err(PageGraphError::OutOfRange {
                kind: "Edge",
                id: u64::from(edge_id),
                min: u64::from(first),
                max: u64::from(first) + u64::from(self.edge_count) - 1,
            });
        }
        Ok(())
    }

    fn read_record(&self, id: u32) -> Result<Option<PackedRecord>> {
        let handle = self.pool.fix(PageId::new(id))?;
        let data = handle.data();
        PackedRecord::decode(id, &data)
    }

    fn read_node(&self, id: NodeId) -> Result<PackedNode> {
        match self.read_record(id)? {
            Some(PackedRecord::Node(node)) => Ok(node),
            Some(PackedRecord::Edge(_)) => Err(wrong_kind(id, "node")),
            None => Err(PageGraphError::NodeNotFound(id)),
        }
    }

    fn read_edge(&self, id: EdgeId) -> Result<PackedEdge> {
        match self.read_record(id)? {
            Some(PackedRecord::Edge(edge)) => Ok(edge),
            Some(PackedRecord::Node(_)) => Err(wrong_kind(id, "edge")),
            None => Err(PageGraphError::EdgeNotFound(id)),
        }
    }

    fn write_record(&self, id: u32, record: &PackedRecord) -> Result<()> {
        let page_id = PageId::new(id);
        {
            let mut handle = self.pool.fix(page_id)?;
            let mut data = handle.data_mut();
            record.encode_into(&mut data)?;
        }
        self.pool.flush(page_id)
    }
}

fn wrong_kind(page_id: u32, expected: &str) -> PageGraphError {
    PageGraphError::CorruptedPage {
        page_id,
        reason: format!("expected {expected} record"),
    }
}

impl std::fmt::Debug for GraphManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphManager")
            .field("max_nodes", &self.max_nodes)
            .field("max_edges", &self.max_edges)
            .field("node_count", &self.node_count)
            .field("edge_count", &self.edge_count)
            .finish_non_exhaustive()
    }
}

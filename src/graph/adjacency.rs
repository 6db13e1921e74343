//! Dense adjacency matrix over node ids.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::record::{EdgeId, NodeId};

/// N×N matrix of edge ids, indexed by `(source, target)` node ids.
///
/// Node ids are 1-based; cell `(s, t)` lives at row `s - 1`, column `t - 1`.
/// An undirected edge occupies both `(s, t)` and `(t, s)` with the same id.
#[derive(Debug, Clone)]
pub struct AdjacencyMatrix {
    size: usize,
    cells: Vec<Option<EdgeId>>,
}

impl AdjacencyMatrix {
    /// Creates an empty matrix for node ids `1..=size`.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Returns the number of rows (the maximum node id).
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, source: NodeId, target: NodeId) -> Option<usize> {
        let (s, t) = (source as usize, target as usize);
        if s == 0 || t == 0 || s > self.size || t > self.size {
            return None;
        }
        Some((s - 1) * self.size + (t - 1))
    }

    /// Returns the edge stored at `(source, target)`.
    ///
    /// Out-of-range ids have no edge.
    #[must_use]
    pub fn get(&self, source: NodeId, target: NodeId) -> Option<EdgeId> {
        self.index(source, target).and_then(|idx| self.cells[idx])
    }

    /// Records `edge` at `(source, target)`.
    ///
    /// # Panics
    ///
    /// Panics if either id is outside `1..=size`; callers validate ids first.
    pub fn set(&mut self, source: NodeId, target: NodeId, edge: EdgeId) {
        let idx = self
            .index(source, target)
            .unwrap_or_else(|| panic!("adjacency cell ({source}, {target}) out of range"));
        self.cells[idx] = Some(edge);
    }

    /// Iterates `(target, edge)` for every outgoing cell of `source`, in
    /// ascending target order.
    pub fn neighbors(&self, source: NodeId) -> impl Iterator<Item = (NodeId, EdgeId)> + '_ {
        let row: &[Option<EdgeId>] = match self.index(source, 1) {
            Some(start) => &self.cells[start..start + self.size],
            None => &[],
        };
        row.iter().enumerate().filter_map(|(col, cell)| {
            cell.map(|edge| (col as NodeId + 1, edge))
        })
    }

    /// Returns every node that appears in any set cell, as source or target.
    #[must_use]
    pub fn connected_nodes(&self) -> BTreeSet<NodeId> {
        let mut nodes = BTreeSet::new();
        for source in 1..=self.size as NodeId {
            for (target, _) in self.neighbors(source) {
                nodes.insert(source);
                nodes.insert(target);
            }
        }
        nodes
    }

    /// Lists each connected pair once, in row-major order of first
    /// appearance.
    ///
    /// A pair is reported as undirected when both of its cells are set.
    #[must_use]
    pub fn edge_listing(&self) -> Vec<EdgeListing> {
        let mut seen = HashSet::new();
        let mut listing = Vec::new();
        for source in 1..=self.size as NodeId {
            for (target, _) in self.neighbors(source) {
                if seen.insert((source.min(target), source.max(target))) {
                    listing.push(EdgeListing {
                        source,
                        target,
                        undirected: self.get(target, source).is_some(),
                    });
                }
            }
        }
        listing
    }
}

/// One line of the edge listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeListing {
    pub source: NodeId,
    pub target: NodeId,
    pub undirected: bool,
}

impl fmt::Display for EdgeListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge: {} -> {}", self.source, self.target)?;
        if self.undirected {
            write!(f, " (Undirected)")?;
        }
        Ok(())
    }
}

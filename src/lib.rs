//! pagegraph - a page-oriented storage engine with a graph layer on top.
//!
//! Layers, bottom up:
//! - [`types`]: fields, tuples and property values
//! - [`storage`]: 4 KiB pages, the disk manager and the buffer pool
//! - [`graph`]: one page per node or edge plus an adjacency matrix
//! - [`import`]: CSV ingestion of users, connections and posts

pub mod error;
pub mod graph;
pub mod import;
pub mod storage;
pub mod types;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

pub use error::{PageGraphError, Result};
pub use graph::{ConnectionsAndLikes, Edge, EdgeId, EdgeListing, GraphManager, Node, NodeId};
pub use import::{CsvImportConfig, GraphImporter, ImportSummary};
pub use types::{Field, FieldType, PropertyValue, Tuple};

use storage::{BufferPool, DiskManager};

/// Largest accepted `max_nodes`.
///
/// The adjacency matrix holds `max_nodes²` cells in memory.
pub const MAX_NODES_LIMIT: u32 = 4096;

/// Configuration for opening or creating a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Maximum number of nodes; also the adjacency matrix dimension (default: 180).
    pub max_nodes: u32,
    /// Maximum number of edges (default: 820).
    pub max_edges: u32,
    /// Number of pages the buffer pool caches (default: 10).
    pub buffer_pool_pages: usize,
    /// Discard any existing file contents on open (default: false).
    pub truncate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_nodes: 180,
            max_edges: 820,
            buffer_pool_pages: 10,
            truncate: false,
        }
    }
}

impl DatabaseConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any limit is zero, `max_nodes` exceeds
    /// [`MAX_NODES_LIMIT`], or `max_nodes + max_edges` reaches `u32::MAX`.
    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 {
            return Err(PageGraphError::ConfigError(
                "max_nodes must be at least 1".into(),
            ));
        }
        if self.max_edges == 0 {
            return Err(PageGraphError::ConfigError(
                "max_edges must be at least 1".into(),
            ));
        }
        if self.buffer_pool_pages == 0 {
            return Err(PageGraphError::ConfigError(
                "buffer_pool_pages must be at least 1".into(),
            ));
        }
        if self.max_nodes > MAX_NODES_LIMIT {
            return Err(PageGraphError::ConfigError(format!(
                "max_nodes must be at most {MAX_NODES_LIMIT}, got {}",
                self.max_nodes
            )));
        }
        if self
            .max_nodes
            .checked_add(self.max_edges)
            .map_or(true, |last| last == u32::MAX)
        {
            return Err(PageGraphError::ConfigError(format!(
                "max_nodes + max_edges must be below {} ({} + {})",
                u32::MAX,
                self.max_nodes,
                self.max_edges
            )));
        }
        Ok(())
    }
}

/// A graph database stored in a single page file.
///
/// Opening wires the disk manager, buffer pool and graph layer together.
/// Dropping the database flushes every cached page.
#[derive(Debug)]
pub struct Database {
    /// Path to the database file.
    path: PathBuf,
    /// Database configuration.
    config: DatabaseConfig,
    /// Graph layer, owning the buffer pool.
    graph: GraphManager,
}

impl Database {
    /// Opens or creates a database file.
    ///
    /// Existing contents are kept unless `config.truncate` is set, in which
    /// case the file starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The file cannot be opened or extended
    /// - An existing node or edge page is corrupted
    pub fn open(path: &Path, config: DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let disk_manager = DiskManager::open(path, config.truncate)?;
        let buffer_pool = BufferPool::new(config.buffer_pool_pages, disk_manager)?;
        let graph = GraphManager::open(buffer_pool, &config)?;

        info!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "database.open"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            graph,
        })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns the graph layer.
    #[must_use]
    pub fn graph(&self) -> &GraphManager {
        &self.graph
    }

    /// Returns the graph layer for mutation.
    pub fn graph_mut(&mut self) -> &mut GraphManager {
        &mut self.graph
    }

    /// Imports the users, connections and posts CSV files.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be parsed or the graph rejects a
    /// row.
    pub fn import(
        &mut self,
        users: &Path,
        connections: &Path,
        posts: &Path,
        config: CsvImportConfig,
    ) -> Result<ImportSummary> {
        GraphImporter::new(&mut self.graph, config).run(users, connections, posts)
    }

    /// Returns buffer pool statistics.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = Database::open(&path, DatabaseConfig::default())?;
    /// let stats = db.buffer_pool_stats();
    /// println!("Cache hit rate: {:?}", stats.hit_rate());
    /// println!("Evictions: {}", stats.evictions);
    /// ```
    #[must_use]
    pub fn buffer_pool_stats(&self) -> storage::BufferPoolStats {
        self.graph.buffer_pool().stats()
    }

    /// Writes every cached page to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if a page cannot be written.
    pub fn flush(&self) -> Result<()> {
        self.graph.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_nodes, 180);
        assert_eq!(config.max_edges, 820);
        assert_eq!(config.buffer_pool_pages, 10);
        assert!(!config.truncate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero_nodes = DatabaseConfig {
            max_nodes: 0,
            ..DatabaseConfig::default()
        };
        assert!(matches!(zero_nodes.validate(), Err(PageGraphError::ConfigError(_))));

        let zero_pool = DatabaseConfig {
            buffer_pool_pages: 0,
            ..DatabaseConfig::default()
        };
        assert!(zero_pool.validate().is_err());

        let overflow = DatabaseConfig {
            max_nodes: 1,
            max_edges: u32::MAX,
            ..DatabaseConfig::default()
        };
        assert!(overflow.validate().is_err());
    }

    #[test]
    fn test_config_rejects_last_page_id() {
        let config = DatabaseConfig {
            max_nodes: 1,
            max_edges: u32::MAX - 1,
            ..DatabaseConfig::default()
        };
        assert!(matches!(config.validate(), Err(PageGraphError::ConfigError(_))));

        let temp_dir = TempDir::new().unwrap();
        let err = Database::open(&temp_dir.path().join("huge.db"), config).unwrap_err();
        assert!(matches!(err, PageGraphError::ConfigError(_)));
    }

    #[test]
    fn test_config_rejects_oversized_matrix() {
        let at_limit = DatabaseConfig {
            max_nodes: MAX_NODES_LIMIT,
            ..DatabaseConfig::default()
        };
        assert!(at_limit.validate().is_ok());

        let above = DatabaseConfig {
            max_nodes: 200_000,
            ..DatabaseConfig::default()
        };
        assert!(matches!(above.validate(), Err(PageGraphError::ConfigError(_))));
    }

    #[test]
    fn test_open_persists_across_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("social.db");

        {
            let mut db = Database::open(&path, DatabaseConfig::default()).unwrap();
            let graph = db.graph_mut();
            graph.create_node([("name", "Node1"), ("type", "user")]).unwrap();
            graph.create_node([("name", "Node2"), ("type", "user")]).unwrap();
            graph
                .create_edge(1, 2, [("relationship", "friends")], false)
                .unwrap();
        }

        let db = Database::open(&path, DatabaseConfig::default()).unwrap();
        assert_eq!(db.graph().node_count(), 2);
        assert_eq!(db.graph().find_nth_degree_connections(1, 1).unwrap(), vec![2]);

        let truncated = DatabaseConfig {
            truncate: true,
            ..DatabaseConfig::default()
        };
        drop(db);
        let db = Database::open(&path, truncated).unwrap();
        assert_eq!(db.graph().node_count(), 0);
    }
}

//! CSV ingestion of the social-graph sample data.
//!
//! Three inputs are loaded in order:
//! - users: `user_id,name,age,location` become `user` nodes
//! - connections: `source,target,relationship` become undirected edges
//! - posts: `user_id,post_id,content,likes` become `post` nodes, each
//!   linked from its author by a directed `posted` edge
//!
//! User ids in the connections and posts files refer to the `user_id`
//! column of the users file, not to node ids.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PageGraphError, Result};
use crate::graph::{GraphManager, NodeId};
use crate::types::PropertyValue;

/// Configuration for CSV import operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvImportConfig {
    /// Field separator (default: ',').
    pub delimiter: u8,
    /// Whether the first row is a header (default: true).
    pub has_header: bool,
    /// Trim whitespace around fields (default: true).
    pub trim: bool,
}

impl Default for CsvImportConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            trim: true,
        }
    }
}

impl CsvImportConfig {
    /// Creates a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether the file has a header row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    fn reader(&self, path: &Path) -> Result<csv::Reader<File>> {
        let file = File::open(path).map_err(|e| {
            PageGraphError::ImportError(format!("Failed to open {}: {e}", path.display()))
        })?;
        Ok(csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_header)
            .trim(if self.trim { csv::Trim::All } else { csv::Trim::None })
            .from_reader(file))
    }
}

#[derive(Debug, Deserialize)]
struct UserRow {
    user_id: i32,
    name: String,
    age: i32,
    location: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionRow {
    source: i32,
    target: i32,
    relationship: String,
}

#[derive(Debug, Deserialize)]
struct PostRow {
    user_id: i32,
    post_id: i32,
    content: String,
    likes: i32,
}

/// Counts and lookups produced by an import.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    /// Number of user nodes created.
    pub users: usize,
    /// Number of connection edges created.
    pub connections: usize,
    /// Number of post nodes created.
    pub posts: usize,
    /// Node id of each user, keyed by name.
    pub name_to_node: HashMap<String, NodeId>,
}

/// Loads the users, connections and posts files into a graph.
pub struct GraphImporter<'g> {
    graph: &'g mut GraphManager,
    config: CsvImportConfig,
    user_nodes: HashMap<i32, NodeId>,
    summary: ImportSummary,
}

impl<'g> GraphImporter<'g> {
    /// Creates an importer writing into `graph`.
    pub fn new(graph: &'g mut GraphManager, config: CsvImportConfig) -> Self {
        Self {
            graph,
            config,
            user_nodes: HashMap::new(),
            summary: ImportSummary::default(),
        }
    }

    /// Imports all three files and returns the summary.
    ///
    /// # Errors
    ///
    /// Returns `ImportError` for unreadable files, malformed rows and rows
    /// naming an unknown user, and propagates graph errors such as
    /// `CapacityOverflow`.
    pub fn run(mut self, users: &Path, connections: &Path, posts: &Path) -> Result<ImportSummary> {
        let start = Instant::now();
        self.import_users(users)?;
        self.import_connections(connections)?;
        self.import_posts(posts)?;
        info!(
            users = self.summary.users,
            connections = self.summary.connections,
            posts = self.summary.posts,
            elapsed_ms = start.elapsed().as_millis(),
            "import.done"
        );
        Ok(self.summary)
    }

    /// Creates one `user` node per row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a node cannot be
    /// created.
    pub fn import_users(&mut self, path: &Path) -> Result<()> {
        let mut reader = self.config.reader(path)?;
        for (idx, row) in reader.deserialize::<UserRow>().enumerate() {
            let row = row.map_err(|e| row_error(path, idx, &e))?;
            let node = self.graph.create_node([
                ("type", PropertyValue::from("user")),
                ("user_id", row.user_id.into()),
                ("name", row.name.as_str().into()),
                ("age", row.age.into()),
                ("location", row.location.into()),
            ])?;
            self.user_nodes.insert(row.user_id, node.id);
            self.summary.name_to_node.insert(row.name, node.id);
            self.summary.users += 1;
        }
        info!(path = %path.display(), rows = self.summary.users, "import.users");
        Ok(())
    }

    /// Creates one undirected edge per row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a row names an unknown
    /// user, or an edge cannot be created.
    pub fn import_connections(&mut self, path: &Path) -> Result<()> {
        let mut reader = self.config.reader(path)?;
        for (idx, row) in reader.deserialize::<ConnectionRow>().enumerate() {
            let row = row.map_err(|e| row_error(path, idx, &e))?;
            let source = self.user_node(path, idx, row.source)?;
            let target = self.user_node(path, idx, row.target)?;
            self.graph
                .create_edge(source, target, [("relationship", row.relationship)], false)?;
            self.summary.connections += 1;
        }
        info!(path = %path.display(), rows = self.summary.connections, "import.connections");
        Ok(())
    }

    /// Creates one `post` node per row plus a directed edge from its author.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a row names an unknown
    /// user, or a node or edge cannot be created.
    pub fn import_posts(&mut self, path: &Path) -> Result<()> {
        let mut reader = self.config.reader(path)?;
        for (idx, row) in reader.deserialize::<PostRow>().enumerate() {
            let row = row.map_err(|e| row_error(path, idx, &e))?;
            let author = self.user_node(path, idx, row.user_id)?;
            let post = self.graph.create_node([
                ("type", PropertyValue::from("post")),
                ("post_id", row.post_id.into()),
                ("content", row.content.into()),
                ("likes", row.likes.into()),
            ])?;
            self.graph
                .create_edge(author, post.id, [("label", "posted")], true)?;
            self.summary.posts += 1;
        }
        info!(path = %path.display(), rows = self.summary.posts, "import.posts");
        Ok(())
    }

    fn user_node(&self, path: &Path, idx: usize, user_id: i32) -> Result<NodeId> {
        self.user_nodes.get(&user_id).copied().ok_or_else(|| {
            PageGraphError::ImportError(format!(
                "{} row {}: unknown user id {user_id}",
                path.display(),
                idx + 1
            ))
        })
    }
}

fn row_error(path: &Path, idx: usize, e: &csv::Error) -> PageGraphError {
    PageGraphError::ImportError(format!(
        "Failed to parse {} row {}: {e}",
        path.display(),
        idx + 1
    ))
}

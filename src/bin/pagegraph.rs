//! Command-line front end for pagegraph databases.

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pagegraph::{CsvImportConfig, Database, DatabaseConfig, NodeId, PropertyValue};

#[derive(Parser, Debug)]
#[command(
    name = "pagegraph",
    version,
    about = "Query a page-backed social graph",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(long, global = true, value_name = "FILE", default_value = "pagegraph.db", help = "Database file")]
    db: PathBuf,

    #[arg(long, global = true, help = "Maximum node count (default: 180)")]
    max_nodes: Option<u32>,

    #[arg(long, global = true, help = "Maximum edge count (default: 820)")]
    max_edges: Option<u32>,

    #[arg(long, global = true, help = "Buffer pool size in pages (default: 10)")]
    pool_pages: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load users, connections and posts from CSV files.
    Import(ImportCmd),
    /// List users exactly N hops away from a person.
    NthDegree {
        #[arg(long, help = "Name of the person")]
        name: String,
        #[arg(long, help = "Number of hops")]
        degree: usize,
    },
    /// List a person's friends and colleagues with the likes on their posts.
    Connections {
        #[arg(long, help = "Name of the person")]
        name: String,
    },
    /// Print every node that takes part in an edge.
    Nodes,
    /// Print every connected node pair.
    Edges,
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(long, value_name = "FILE", default_value = "users.csv")]
    users: PathBuf,

    #[arg(long, value_name = "FILE", default_value = "connections.csv")]
    connections: PathBuf,

    #[arg(long, value_name = "FILE", default_value = "posts.csv")]
    posts: PathBuf,

    #[arg(long, help = "Discard existing database contents first")]
    truncate: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(true)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = build_config(&cli.open);

    match cli.command {
        Command::Import(cmd) => {
            config.truncate = cmd.truncate;
            let mut db = Database::open(&cli.open.db, config)?;
            let start = Instant::now();
            let summary = db.import(&cmd.users, &cmd.connections, &cmd.posts, CsvImportConfig::default())?;
            db.flush()?;
            println!(
                "Imported {} users, {} connections and {} posts",
                summary.users, summary.connections, summary.posts
            );
            report_time("import", start);
        }
        Command::NthDegree { name, degree } => {
            let db = Database::open(&cli.open.db, config)?;
            let start_node = resolve(&db, &name)?;

            let start = Instant::now();
            let found = db.graph().find_nth_degree_connections(start_node, degree)?;
            report_time(&format!("finding {degree}-degree connections"), start);

            println!("Nodes connected to {name} within {degree} degrees:");
            for node_id in found {
                println!("{}", db.graph().node(node_id)?);
            }
        }
        Command::Connections { name } => {
            let db = Database::open(&cli.open.db, config)?;
            let user = resolve(&db, &name)?;

            let start = Instant::now();
            let result = db.graph().find_connections_and_likes(user)?;
            report_time("finding connections and likes", start);

            println!("{name}'s Colleagues:");
            for (colleague, likes) in &result.colleagues {
                println!("Name: {colleague}, Likes: {likes}");
            }
            println!("{name}'s Friends:");
            for (friend, likes) in &result.friends {
                println!("Name: {friend}, Likes: {likes}");
            }
        }
        Command::Nodes => {
            let db = Database::open(&cli.open.db, config)?;
            println!("Nodes in the graph:");
            for node in db.graph().list_nodes()? {
                println!("{node}");
            }
        }
        Command::Edges => {
            let db = Database::open(&cli.open.db, config)?;
            println!("Edges in the graph:");
            for edge in db.graph().list_edges() {
                println!("{edge}");
            }
        }
    }

    Ok(())
}

fn build_config(args: &OpenArgs) -> DatabaseConfig {
    let defaults = DatabaseConfig::default();
    DatabaseConfig {
        max_nodes: args.max_nodes.unwrap_or(defaults.max_nodes),
        max_edges: args.max_edges.unwrap_or(defaults.max_edges),
        buffer_pool_pages: args.pool_pages.unwrap_or(defaults.buffer_pool_pages),
        truncate: false,
    }
}

fn resolve(db: &Database, name: &str) -> Result<NodeId, Box<dyn Error>> {
    let value = PropertyValue::from(name);
    match db.graph().find_node_by_property("name", &value)? {
        Some(node) => Ok(node.id),
        None => Err(format!("name not found in {}: {name}", db.path().display()).into()),
    }
}

fn report_time(what: &str, start: Instant) {
    println!(
        "Execution time for {what}: {:.6} seconds",
        start.elapsed().as_secs_f64()
    );
}

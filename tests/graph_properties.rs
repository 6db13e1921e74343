//! Property tests for graph traversal.

use std::collections::{HashSet, VecDeque};

use pagegraph::{Database, DatabaseConfig};
use proptest::prelude::*;
use tempfile::TempDir;

const NODES: u32 = 12;

/// Shortest hop counts from `start` over the given directed arcs.
fn distances(arcs: &HashSet<(u32, u32)>, start: u32) -> Vec<Option<usize>> {
    let mut dist = vec![None; NODES as usize + 1];
    dist[start as usize] = Some(0);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        let d = dist[node as usize].unwrap_or(0);
        for &(s, t) in arcs {
            if s == node && dist[t as usize].is_none() {
                dist[t as usize] = Some(d + 1);
                queue.push_back(t);
            }
        }
    }
    dist
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_nth_degree_matches_shortest_distance(
        kinds in prop::collection::vec(any::<bool>(), NODES as usize),
        edges in prop::collection::vec((1..=NODES, 1..=NODES, any::<bool>()), 0..30),
        start in 1..=NODES,
        degree in 1usize..4,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            max_nodes: NODES,
            max_edges: 32,
            buffer_pool_pages: 3,
            truncate: true,
        };
        let mut db = Database::open(&temp_dir.path().join("prop.db"), config).unwrap();
        let graph = db.graph_mut();

        for &is_user in &kinds {
            let kind = if is_user { "user" } else { "post" };
            graph.create_node([("type", kind)]).unwrap();
        }

        let mut arcs = HashSet::new();
        for &(s, t, directed) in &edges {
            graph.create_edge(s, t, [("k", 0)], directed).unwrap();
            arcs.insert((s, t));
            if !directed {
                arcs.insert((t, s));
            }
        }

        let found = graph.find_nth_degree_connections(start, degree).unwrap();
        let dist = distances(&arcs, start);
        let expected: HashSet<u32> = (1..=NODES)
            .filter(|&n| dist[n as usize] == Some(degree) && kinds[n as usize - 1])
            .collect();

        let found_set: HashSet<u32> = found.iter().copied().collect();
        prop_assert_eq!(found_set.len(), found.len());
        prop_assert_eq!(found_set, expected);
    }
}

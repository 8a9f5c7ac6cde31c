//! Cluster rendering
//!
//! Writes a Graphviz DOT file with nodes coloured by cluster. Rendering is a side
//! effect of the analysis; callers treat failures as non-fatal.

use super::graph_builder::AddressGraph;
use super::types::*;
use crate::error::Result;
use petgraph::dot::{Config, Dot};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Qualitative palette, one colour per cluster id (cycled)
const PALETTE: [&str; 12] = [
    "#8dd3c7", "#ffffb3", "#bebada", "#fb8072", "#80b1d3", "#fdb462", "#b3de69", "#fccde5",
    "#d9d9d9", "#bc80bd", "#ccebc5", "#ffed6f",
];

const UNCLUSTERED_COLOR: &str = "gray";

fn short_label(address: &str) -> String {
    match address.char_indices().nth(8) {
        Some((end, _)) => format!("{}...", &address[..end]),
        None => address.to_string(),
    }
}

/// Render the graph as DOT text
pub fn render_dot(
    graph: &AddressGraph,
    assignment: &ClusterAssignment,
    label_min_degree: usize,
) -> String {
    // attribute closures are temporaries, so format within the same statement
    format!(
        "{:?}",
        Dot::with_attr_getters(
            graph.graph(),
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, edge| {
                format!(
                    "color = \"#80808060\", penwidth = {:.2}",
                    0.5 + (edge.weight().count as f64).ln_1p()
                )
            },
            &|_, (_, address)| {
                let color = assignment
                    .get(address)
                    .map(|id| PALETTE[id % PALETTE.len()])
                    .unwrap_or(UNCLUSTERED_COLOR);
                let label = if graph.degree(address) > label_min_degree {
                    short_label(address)
                } else {
                    String::new()
                };
                format!(
                    "label = {:?}, style = filled, fillcolor = {:?}, tooltip = {:?}",
                    label, color, address
                )
            },
        )
    )
}

/// Write `<output_dir>/<name>_clusters.dot`, creating the directory if needed
pub fn write_cluster_graph(
    graph: &AddressGraph,
    assignment: &ClusterAssignment,
    output_dir: &Path,
    name: &str,
    label_min_degree: usize,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}_clusters.dot", name));
    fs::write(&path, render_dot(graph, assignment, label_min_degree))?;
    info!("Cluster graph written to {}", path.display());
    Ok(path)
}

/// Like [`write_cluster_graph`], but logs and swallows failures
pub fn try_write_cluster_graph(
    graph: &AddressGraph,
    assignment: &ClusterAssignment,
    output_dir: &Path,
    name: &str,
    label_min_degree: usize,
) -> Option<PathBuf> {
    if graph.is_empty() {
        warn!("Graph '{}' is empty, nothing to render", name);
        return None;
    }

    match write_cluster_graph(graph, assignment, output_dir, name, label_min_degree) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Failed to render cluster graph '{}': {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_label() {
        assert_eq!(short_label("abc"), "abc");
        assert_eq!(short_label("0x1234567890abcdef"), "0x123456...");
    }

    #[test]
    fn test_render_dot_colours_and_labels() {
        let mut graph = AddressGraph::new();
        for leaf in ["leaf_1", "leaf_2", "leaf_3"] {
            graph.accumulate_edge("hub_address_0001", leaf, 1.0);
        }
        let mut assignment = ClusterAssignment::new();
        assignment.insert("hub_address_0001", 0);
        assignment.insert("leaf_1", 0);
        assignment.insert("leaf_2", 0);

        let dot = render_dot(&graph, &assignment, 2);
        assert!(dot.starts_with("graph {"));
        assert!(dot.contains("hub_addr..."));
        assert!(dot.contains(PALETTE[0]));
        assert!(dot.contains(UNCLUSTERED_COLOR));
        assert!(dot.contains("--"));
    }

    #[test]
    fn test_write_to_unwritable_dir_is_swallowed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut graph = AddressGraph::new();
        graph.accumulate_edge("a", "b", 1.0);

        // a regular file cannot act as a directory
        let result = try_write_cluster_graph(&graph, &ClusterAssignment::new(), file.path(), "x", 2);
        assert!(result.is_none());
    }
}

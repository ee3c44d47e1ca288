mod merge;
mod retry;
mod store;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use merge::merge_incoming;
pub use retry::{RetryPolicy, run_with_retry};
pub use store::{GraphStore, StoreEvent, StorePolicy};

pub const DEFAULT_GRAPH_LIMIT: usize = 500;
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub connections: Option<u32>,
}

impl GraphNode {
    pub fn connection_count(&self) -> u32 {
        self.connections.unwrap_or(0)
    }

    pub fn radius(&self) -> f32 {
        8.0 + (self.connection_count().min(20) as f32 * 0.5)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub value: Option<f64>,
}

impl GraphLink {
    /// Directional key used for duplicate detection: `a-b` and `b-a` differ.
    pub fn merge_key(&self) -> String {
        format!("{}-{}", self.source, self.target)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl GraphData {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.id.clone()).collect()
    }

    pub fn node_id_set(&self) -> HashSet<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    /// Links whose endpoints are not both loaded yet.
    pub fn pending_link_count(&self) -> usize {
        let ids = self.node_id_set();
        self.links
            .iter()
            .filter(|link| !ids.contains(link.source.as_str()) || !ids.contains(link.target.as_str()))
            .count()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphMetrics {
    pub total_nodes: u64,
    pub total_links: u64,
    pub max_connections: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
}

impl NoteSummary {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{graph, node};

    #[test]
    fn radius_grows_with_connections_up_to_twenty() {
        assert_eq!(node("a", 0).radius(), 8.0);
        assert_eq!(node("a", 10).radius(), 13.0);
        assert_eq!(node("a", 20).radius(), 18.0);
        assert_eq!(node("a", 90).radius(), 18.0);
    }

    #[test]
    fn pending_links_reference_unloaded_nodes() {
        let data = graph(&[("a", 1), ("b", 1)], &[("a", "b"), ("b", "c")]);
        assert_eq!(data.pending_link_count(), 1);
    }
}

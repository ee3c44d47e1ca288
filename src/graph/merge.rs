use std::collections::HashSet;

use super::GraphData;

pub fn merge_incoming(existing: &GraphData, incoming: &GraphData) -> GraphData {
    let mut node_ids = existing
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    let mut link_keys = existing
        .links
        .iter()
        .map(|link| link.merge_key())
        .collect::<HashSet<_>>();

    let mut nodes = existing.nodes.clone();
    for node in &incoming.nodes {
        if node_ids.insert(node.id.as_str()) {
            nodes.push(node.clone());
        }
    }

    let mut links = existing.links.clone();
    for link in &incoming.links {
        if link_keys.insert(link.merge_key()) {
            links.push(link.clone());
        }
    }

    GraphData { nodes, links }
}

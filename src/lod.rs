use std::collections::{HashMap, HashSet};

use crate::graph::{GraphData, GraphNode};

/// Below this zoom only hubs and interaction context stay visible.
pub const LOD_ZOOM_THRESHOLD: f32 = 0.5;
const HUB_MIN_CONNECTIONS: u32 = 10;
const LABEL_MIN_CONNECTIONS: u32 = 15;

/// Read-only subset handed to the simulation. Links index into `nodes`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibleGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<(usize, usize)>,
}

impl VisibleGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

pub fn is_reduced(zoom: f32) -> bool {
    zoom < LOD_ZOOM_THRESHOLD
}

pub fn shows_label(connections: u32, zoom: f32) -> bool {
    zoom > LOD_ZOOM_THRESHOLD && connections > LABEL_MIN_CONNECTIONS
}

pub fn visible_subset(
    data: &GraphData,
    zoom: f32,
    selected: Option<&str>,
    highlighted: &HashSet<String>,
) -> VisibleGraph {
    let reduced = is_reduced(zoom);
    let nodes = data
        .nodes
        .iter()
        .filter(|node| {
            !reduced
                || node.connection_count() > HUB_MIN_CONNECTIONS
                || highlighted.contains(&node.id)
                || selected == Some(node.id.as_str())
        })
        .cloned()
        .collect::<Vec<_>>();

    let mut index_of = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        index_of.entry(node.id.as_str()).or_insert(index);
    }

    // Links to unloaded or culled nodes never reach the simulation.
    let links = data
        .links
        .iter()
        .filter_map(|link| {
            let source = *index_of.get(link.source.as_str())?;
            let target = *index_of.get(link.target.as_str())?;
            Some((source, target))
        })
        .collect();

    VisibleGraph { nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{graph, node};

    fn ten_note_graph() -> GraphData {
        graph(
            &[
                ("hub-a", 14),
                ("hub-b", 12),
                ("c", 3),
                ("d", 2),
                ("e", 10),
                ("f", 1),
                ("g", 4),
                ("h", 2),
                ("i", 1),
                ("j", 0),
            ],
            &[
                ("hub-a", "hub-b"),
                ("hub-a", "c"),
                ("hub-a", "d"),
                ("hub-b", "e"),
                ("c", "g"),
            ],
        )
    }

    fn ids(visible: &VisibleGraph) -> Vec<&str> {
        visible.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    #[test]
    fn everything_is_visible_at_normal_zoom() {
        let data = ten_note_graph();
        for zoom in [0.5, 1.0, 4.0] {
            let visible = visible_subset(&data, zoom, None, &HashSet::new());
            assert_eq!(visible.nodes, data.nodes);
            assert_eq!(visible.link_count(), data.links.len());
        }
    }

    #[test]
    fn zoomed_out_keeps_only_hubs() {
        let data = ten_note_graph();
        let visible = visible_subset(&data, 0.2, None, &HashSet::new());

        assert_eq!(ids(&visible), vec!["hub-a", "hub-b"]);
        assert_eq!(visible.links, vec![(0, 1)]);
    }

    #[test]
    fn selection_and_highlight_survive_culling() {
        let data = ten_note_graph();
        let highlighted = HashSet::from(["d".to_owned()]);
        let visible = visible_subset(&data, 0.2, Some("j"), &highlighted);

        assert_eq!(ids(&visible), vec!["hub-a", "hub-b", "d", "j"]);
        assert_eq!(visible.links, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn reduced_set_is_a_strict_subset_unless_all_nodes_are_hubs() {
        let data = ten_note_graph();
        let reduced = visible_subset(&data, 0.49, None, &HashSet::new());
        assert!(reduced.node_count() < data.nodes.len());

        let dense = graph(&[("a", 11), ("b", 30)], &[("a", "b")]);
        let reduced = visible_subset(&dense, 0.1, None, &HashSet::new());
        assert_eq!(reduced.nodes, dense.nodes);
    }

    #[test]
    fn links_never_dangle() {
        let mut data = ten_note_graph();
        data.links.push(crate::graph::fixtures::link("hub-a", "not-loaded"));
        data.links.push(crate::graph::fixtures::link("ghost", "hub-b"));

        for zoom in [0.2, 1.0] {
            let visible = visible_subset(&data, zoom, None, &HashSet::new());
            for &(source, target) in &visible.links {
                assert!(source < visible.node_count());
                assert!(target < visible.node_count());
            }
        }
        let full = visible_subset(&data, 1.0, None, &HashSet::new());
        assert_eq!(full.link_count(), 5);
    }

    #[test]
    fn input_is_left_untouched() {
        let data = ten_note_graph();
        let before = data.clone();
        let _ = visible_subset(&data, 0.2, Some("c"), &HashSet::new());
        assert_eq!(data, before);
    }

    #[test]
    fn labels_need_density_and_zoom() {
        assert!(shows_label(node("a", 16).connection_count(), 1.0));
        assert!(!shows_label(15, 1.0));
        assert!(!shows_label(16, 0.5));
        assert!(!shows_label(40, 0.3));
    }
}

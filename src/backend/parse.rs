use std::collections::HashSet;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::graph::{GraphData, GraphMetrics, GraphNode, NoteSummary};

#[derive(Deserialize)]
struct RawNote {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn check_nodes(nodes: &[GraphNode]) -> Result<()> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if node.id.is_empty() {
            bail!("node with empty id (label {:?})", node.label);
        }
        if !seen.insert(node.id.as_str()) {
            bail!("duplicate node id {}", node.id);
        }
    }
    Ok(())
}

pub(super) fn parse_graph(value: Value) -> Result<GraphData> {
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("expected an object with `nodes` and `links`"))?;
    for field in ["nodes", "links"] {
        match object.get(field) {
            Some(Value::Array(_)) => {}
            Some(_) => bail!("`{field}` must be an array"),
            None => bail!("missing field `{field}`"),
        }
    }

    let data = GraphData::deserialize(value).context("malformed graph payload")?;
    check_nodes(&data.nodes)?;

    for link in &data.links {
        if link.source.is_empty() || link.target.is_empty() {
            bail!("link with empty endpoint ({:?} -> {:?})", link.source, link.target);
        }
    }

    Ok(data)
}

pub(super) fn parse_metrics(value: Value) -> Result<GraphMetrics> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("expected a [totalNodes, totalLinks, maxConnections] tuple"))?;
    if items.len() != 3 {
        bail!("expected 3 metric values, got {}", items.len());
    }

    // JSON numbers from some backends arrive as `12.0`; whole values are counts too.
    let field = |index: usize, name: &str| -> Result<u64> {
        let item = &items[index];
        item.as_u64()
            .or_else(|| {
                item.as_f64()
                    .filter(|value| *value >= 0.0 && value.fract() == 0.0 && *value <= u64::MAX as f64)
                    .map(|value| value as u64)
            })
            .ok_or_else(|| anyhow!("`{name}` must be a non-negative integer, got {item}"))
    };

    Ok(GraphMetrics {
        total_nodes: field(0, "totalNodes")?,
        total_links: field(1, "totalLinks")?,
        max_connections: field(2, "maxConnections")?,
    })
}

pub(super) fn parse_neighbors(value: Value) -> Result<Vec<GraphNode>> {
    if !value.is_array() {
        bail!("expected an array of nodes");
    }
    let nodes = Vec::<GraphNode>::deserialize(value).context("malformed neighbor list")?;
    check_nodes(&nodes)?;
    Ok(nodes)
}

pub(super) fn parse_note(value: Value) -> Result<NoteSummary> {
    if value.is_null() {
        bail!("note not found");
    }
    let raw = RawNote::deserialize(value).context("malformed note payload")?;
    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("note not found or invalid response"))?;

    Ok(NoteSummary {
        id,
        title: raw.title.unwrap_or_default(),
    })
}

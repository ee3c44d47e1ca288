use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::graph::{GraphLink, GraphNode};
use crate::util::stable_unit;

use super::{BackendError, BackendRequest, GraphBackend};

const MAX_GRAPH_LIMIT: usize = 10_000;
const MAX_NEIGHBOR_LIMIT: usize = 1_000;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("failed to read vault {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse vault {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VaultNote {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VaultLink {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Vault {
    pub notes: Vec<VaultNote>,
    #[serde(default)]
    pub links: Vec<VaultLink>,
}

impl Vault {
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        let raw = fs::read_to_string(path).map_err(|source| VaultError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| VaultError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Deterministic synthetic vault: a few dense hubs plus a sparse long tail.
    pub fn demo(note_count: usize) -> Self {
        let note_count = note_count.max(2);
        let hub_count = (note_count / 25).clamp(1, 40);
        let notes = (0..note_count)
            .map(|index| VaultNote {
                id: format!("note-{index:05}"),
                title: if index < hub_count {
                    format!("Hub {index}")
                } else {
                    format!("Note {index}")
                },
                folder: Some(format!("folder-{}", index % 7)),
                updated_at: Some((note_count - index) as i64),
            })
            .collect::<Vec<_>>();

        let mut links = Vec::new();
        let mut seen = HashSet::new();
        for index in 1..note_count {
            let id = &notes[index].id;
            let roll = stable_unit(id);
            let hub = ((roll * hub_count as f32) as usize).min(hub_count - 1);
            if hub != index && seen.insert((index, hub)) {
                links.push((index, hub));
            }

            let extra = stable_unit(&format!("{id}/peer"));
            if extra > 0.55 {
                let peer = ((extra * index as f32) as usize).min(index - 1);
                if peer != index && seen.insert((index, peer)) {
                    links.push((index, peer));
                }
            }
        }

        Self {
            links: links
                .into_iter()
                .map(|(source, target)| VaultLink {
                    source: notes[source].id.clone(),
                    target: notes[target].id.clone(),
                    value: None,
                })
                .collect(),
            notes,
        }
    }

    fn adjacency(&self) -> HashMap<&str, HashSet<&str>> {
        let mut neighbors: HashMap<&str, HashSet<&str>> = HashMap::new();
        for link in &self.links {
            if link.source == link.target {
                continue;
            }
            neighbors
                .entry(link.source.as_str())
                .or_default()
                .insert(link.target.as_str());
            neighbors
                .entry(link.target.as_str())
                .or_default()
                .insert(link.source.as_str());
        }
        neighbors
    }

    fn ranked_nodes(&self, excluded: &HashSet<&str>, limit: usize) -> Vec<GraphNode> {
        let adjacency = self.adjacency();
        let mut ranked = self
            .notes
            .iter()
            .filter(|note| !excluded.contains(note.id.as_str()))
            .map(|note| {
                let connections = adjacency
                    .get(note.id.as_str())
                    .map(HashSet::len)
                    .unwrap_or(0);
                (connections, note)
            })
            .collect::<Vec<_>>();

        ranked.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.updated_at.cmp(&a.1.updated_at))
        });
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(connections, note)| GraphNode {
                id: note.id.clone(),
                label: note.title.clone(),
                group: note.folder.clone(),
                connections: Some(connections as u32),
            })
            .collect()
    }

    fn links_within(&self, ids: &HashSet<&str>) -> Vec<GraphLink> {
        self.links
            .iter()
            .filter(|link| ids.contains(link.source.as_str()) && ids.contains(link.target.as_str()))
            .map(|link| GraphLink {
                source: link.source.clone(),
                target: link.target.clone(),
                value: link.value,
            })
            .collect()
    }

    pub fn graph(&self, limit: usize) -> (Vec<GraphNode>, Vec<GraphLink>) {
        let nodes = self.ranked_nodes(&HashSet::new(), limit);
        let ids = nodes.iter().map(|node| node.id.as_str()).collect::<HashSet<_>>();
        let links = self.links_within(&ids);
        (nodes, links)
    }

    pub fn graph_incremental(
        &self,
        limit: usize,
        loaded_ids: &[String],
    ) -> (Vec<GraphNode>, Vec<GraphLink>) {
        let loaded = loaded_ids.iter().map(String::as_str).collect::<HashSet<_>>();
        let nodes = self.ranked_nodes(&loaded, limit);
        if nodes.is_empty() {
            return (nodes, Vec::new());
        }

        let mut ids = loaded;
        ids.extend(nodes.iter().map(|node| node.id.as_str()));
        let links = self.links_within(&ids);
        (nodes, links)
    }

    pub fn metrics(&self) -> (usize, usize, usize) {
        let mut out_degree: HashMap<&str, usize> = HashMap::new();
        for link in &self.links {
            *out_degree.entry(link.source.as_str()).or_default() += 1;
        }
        let max_connections = out_degree.values().copied().max().unwrap_or(0);
        (self.notes.len(), self.links.len(), max_connections)
    }

    pub fn neighbors(&self, node_id: &str, limit: usize) -> Vec<GraphNode> {
        let adjacency = self.adjacency();
        let Some(neighbor_ids) = adjacency.get(node_id) else {
            return Vec::new();
        };

        self.notes
            .iter()
            .filter(|note| note.id != node_id && neighbor_ids.contains(note.id.as_str()))
            .take(limit)
            .map(|note| GraphNode {
                id: note.id.clone(),
                label: note.title.clone(),
                group: note.folder.clone(),
                connections: None,
            })
            .collect()
    }

    pub fn note(&self, id: &str) -> Option<&VaultNote> {
        self.notes.iter().find(|note| note.id == id)
    }
}

enum VaultSource {
    File(PathBuf),
    Memory(Vault),
}

/// Serves the graph RPCs from a vault file, re-read on every call.
pub struct VaultBackend {
    source: VaultSource,
}

impl VaultBackend {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: VaultSource::File(path.into()),
        }
    }

    pub fn from_vault(vault: Vault) -> Self {
        Self {
            source: VaultSource::Memory(vault),
        }
    }

    fn with_vault<T>(&self, f: impl FnOnce(&Vault) -> T) -> Result<T, BackendError> {
        match &self.source {
            VaultSource::Memory(vault) => Ok(f(vault)),
            VaultSource::File(path) => {
                let vault =
                    Vault::load(path).map_err(|error| BackendError::Transport(error.to_string()))?;
                Ok(f(&vault))
            }
        }
    }
}

fn check_limit(limit: usize, max: usize) -> Result<(), BackendError> {
    if limit == 0 || limit > max {
        return Err(BackendError::Rejected(format!(
            "Limit must be between 1 and {max}"
        )));
    }
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Result<Value, BackendError> {
    serde_json::to_value(value).map_err(|error| BackendError::Rejected(error.to_string()))
}

impl GraphBackend for VaultBackend {
    fn invoke(&self, request: &BackendRequest) -> Result<Value, BackendError> {
        debug!(command = request.command(), "serving vault request");
        match request {
            BackendRequest::Graph { limit } => {
                check_limit(*limit, MAX_GRAPH_LIMIT)?;
                let (nodes, links) = self.with_vault(|vault| vault.graph(*limit))?;
                Ok(json!({ "nodes": encode(&nodes)?, "links": encode(&links)? }))
            }
            BackendRequest::GraphIncremental { limit, loaded_ids } => {
                check_limit(*limit, MAX_GRAPH_LIMIT)?;
                let (nodes, links) =
                    self.with_vault(|vault| vault.graph_incremental(*limit, loaded_ids))?;
                Ok(json!({ "nodes": encode(&nodes)?, "links": encode(&links)? }))
            }
            BackendRequest::GraphMetrics => {
                let (nodes, links, max_connections) = self.with_vault(Vault::metrics)?;
                Ok(json!([nodes, links, max_connections]))
            }
            BackendRequest::NodeNeighbors { node_id, limit } => {
                check_limit(*limit, MAX_NEIGHBOR_LIMIT)?;
                let neighbors = self.with_vault(|vault| vault.neighbors(node_id, *limit))?;
                encode(&neighbors)
            }
            BackendRequest::Note { id } => {
                let note = self.with_vault(|vault| {
                    vault
                        .note(id)
                        .map(|note| json!({ "id": note.id, "title": note.title }))
                })?;
                note.ok_or_else(|| BackendError::Rejected(format!("note {id} not found")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;
    use crate::backend::GraphClient;

    fn note(id: &str, updated_at: i64) -> VaultNote {
        VaultNote {
            id: id.to_owned(),
            title: format!("Title {id}"),
            folder: None,
            updated_at: Some(updated_at),
        }
    }

    fn link(source: &str, target: &str) -> VaultLink {
        VaultLink {
            source: source.to_owned(),
            target: target.to_owned(),
            value: None,
        }
    }

    fn star_vault() -> Vault {
        Vault {
            notes: vec![
                note("leaf-1", 5),
                note("hub", 1),
                note("leaf-2", 9),
                note("lonely", 3),
            ],
            links: vec![link("hub", "leaf-1"), link("leaf-2", "hub")],
        }
    }

    #[test]
    fn graph_orders_by_connections_then_recency() {
        let (nodes, links) = star_vault().graph(3);
        let ids = nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();

        assert_eq!(ids, vec!["hub", "leaf-2", "leaf-1"]);
        assert_eq!(nodes[0].connections, Some(2));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn incremental_excludes_loaded_and_links_back() {
        let loaded = vec!["hub".to_owned(), "leaf-2".to_owned()];
        let (nodes, links) = star_vault().graph_incremental(10, &loaded);
        let ids = nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();

        assert_eq!(ids, vec!["leaf-1", "lonely"]);
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn metrics_use_out_degree() {
        assert_eq!(star_vault().metrics(), (4, 2, 1));
    }

    #[test]
    fn neighbors_are_undirected() {
        let neighbors = star_vault().neighbors("hub", 50);
        let mut ids = neighbors.iter().map(|node| node.id.clone()).collect::<Vec<_>>();
        ids.sort();
        assert_eq!(ids, vec!["leaf-1", "leaf-2"]);
    }

    #[test]
    fn limits_are_bounded() {
        let backend = VaultBackend::from_vault(star_vault());
        assert!(backend.invoke(&BackendRequest::Graph { limit: 10_001 }).is_err());
        assert!(
            backend
                .invoke(&BackendRequest::NodeNeighbors {
                    node_id: "hub".to_owned(),
                    limit: 1_001,
                })
                .is_err()
        );
    }

    #[test]
    fn client_reads_vault_file_on_every_call() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&star_vault()).unwrap()).unwrap();
        file.flush().unwrap();

        let client = GraphClient::new(Arc::new(VaultBackend::from_file(file.path())));
        assert_eq!(client.get_graph(500).unwrap().nodes.len(), 4);
        assert_eq!(client.get_graph_metrics().unwrap().total_links, 2);
        assert_eq!(client.get_note("hub").unwrap().title, "Title hub");
        assert!(client.get_note("missing").is_err());

        let mut grown = star_vault();
        grown.notes.push(note("late", 0));
        fs::write(file.path(), serde_json::to_string(&grown).unwrap()).unwrap();
        assert_eq!(client.get_graph(500).unwrap().nodes.len(), 5);
    }

    #[test]
    fn missing_vault_file_is_a_transport_failure() {
        let backend = VaultBackend::from_file("/nonexistent/vault.json");
        let error = backend.invoke(&BackendRequest::GraphMetrics).unwrap_err();
        assert!(matches!(error, BackendError::Transport(_)));
    }

    #[test]
    fn demo_vault_is_deterministic_and_connected() {
        let first = Vault::demo(200);
        let second = Vault::demo(200);

        assert_eq!(first.notes.len(), 200);
        assert_eq!(first.links.len(), second.links.len());
        let (nodes, _) = first.graph(10);
        assert!(nodes[0].connection_count() > 10);
    }
}

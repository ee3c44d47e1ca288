mod client;
mod parse;
mod vault;

use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
pub(crate) use client::testing;
pub use client::GraphClient;
pub use vault::{Vault, VaultBackend};
#[cfg(test)]
pub(crate) use vault::{VaultLink, VaultNote};

#[derive(Clone, Debug, PartialEq)]
pub enum BackendRequest {
    Graph { limit: usize },
    GraphIncremental { limit: usize, loaded_ids: Vec<String> },
    GraphMetrics,
    NodeNeighbors { node_id: String, limit: usize },
    Note { id: String },
}

impl BackendRequest {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Graph { .. } => "get_graph",
            Self::GraphIncremental { .. } => "get_graph_incremental",
            Self::GraphMetrics => "get_graph_metrics",
            Self::NodeNeighbors { .. } => "get_node_neighbors",
            Self::Note { .. } => "get_note",
        }
    }
}

/// Opaque request/response channel to whatever serves the graph.
pub trait GraphBackend: Send + Sync {
    fn invoke(&self, request: &BackendRequest) -> Result<Value, BackendError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{command} failed: {source}")]
    Backend {
        command: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("invalid {command} response: {message}")]
    Validation {
        command: &'static str,
        message: String,
    },
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error};

use crate::graph::{GraphData, GraphMetrics, GraphNode, NoteSummary};

use super::parse::{parse_graph, parse_metrics, parse_neighbors, parse_note};
use super::{BackendRequest, ClientError, GraphBackend};

/// Typed, validating front for a [`GraphBackend`]. Cheap to clone into workers.
#[derive(Clone)]
pub struct GraphClient {
    backend: Arc<dyn GraphBackend>,
}

impl GraphClient {
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        Self { backend }
    }

    fn call<T>(
        &self,
        request: BackendRequest,
        parse: impl FnOnce(Value) -> anyhow::Result<T>,
    ) -> Result<T, ClientError> {
        let command = request.command();
        let started = Instant::now();
        let raw = self.backend.invoke(&request).map_err(|source| {
            error!(command, %source, "backend call failed");
            ClientError::Backend { command, source }
        })?;
        debug!(
            command,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "backend call returned"
        );

        parse(raw).map_err(|parse_error| {
            let message = format!("{parse_error:#}");
            error!(command, ?request, %message, "backend response failed validation");
            ClientError::Validation { command, message }
        })
    }

    fn check_limit(limit: usize) -> Result<(), ClientError> {
        if limit == 0 {
            return Err(ClientError::InvalidRequest(
                "limit must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn get_graph(&self, limit: usize) -> Result<GraphData, ClientError> {
        Self::check_limit(limit)?;
        self.call(BackendRequest::Graph { limit }, parse_graph)
    }

    pub fn get_graph_incremental(
        &self,
        limit: usize,
        loaded_ids: &[String],
    ) -> Result<GraphData, ClientError> {
        Self::check_limit(limit)?;
        if loaded_ids.is_empty() {
            return Err(ClientError::InvalidRequest(
                "loaded ids must be a non-empty list".to_owned(),
            ));
        }
        if loaded_ids.iter().any(|id| id.is_empty()) {
            return Err(ClientError::InvalidRequest(
                "loaded ids must not contain empty strings".to_owned(),
            ));
        }

        self.call(
            BackendRequest::GraphIncremental {
                limit,
                loaded_ids: loaded_ids.to_vec(),
            },
            parse_graph,
        )
    }

    pub fn get_graph_metrics(&self) -> Result<GraphMetrics, ClientError> {
        self.call(BackendRequest::GraphMetrics, parse_metrics)
    }

    pub fn get_node_neighbors(
        &self,
        node_id: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, ClientError> {
        Self::check_limit(limit)?;
        self.call(
            BackendRequest::NodeNeighbors {
                node_id: node_id.to_owned(),
                limit,
            },
            parse_neighbors,
        )
    }

    pub fn get_note(&self, id: &str) -> Result<NoteSummary, ClientError> {
        self.call(BackendRequest::Note { id: id.to_owned() }, parse_note)
    }
}

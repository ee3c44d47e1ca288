use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::{ClientError, GraphClient};

use super::retry::{RetryPolicy, run_with_retry};
use super::{
    DEFAULT_GRAPH_LIMIT, DEFAULT_NEIGHBOR_LIMIT, GraphData, GraphMetrics, GraphNode, merge_incoming,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StorePolicy {
    pub incremental_limit: usize,
    pub stale_after: Duration,
    pub gc_after: Duration,
    pub metrics_stale_after: Duration,
    pub metrics_poll_interval: Duration,
    pub fetch_retry: RetryPolicy,
    pub metrics_retry: RetryPolicy,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            incremental_limit: 200,
            stale_after: Duration::from_secs(5 * 60),
            gc_after: Duration::from_secs(10 * 60),
            metrics_stale_after: Duration::from_secs(30),
            metrics_poll_interval: Duration::from_secs(60),
            fetch_retry: RetryPolicy::default(),
            metrics_retry: RetryPolicy::fixed(2, Duration::from_secs(1)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    Loaded { nodes: usize, links: usize },
    Refreshed { nodes: usize, links: usize },
    Merged { added_nodes: usize, added_links: usize },
    MetricsUpdated(GraphMetrics),
    NeighborsLoaded { node_id: String, count: usize },
    Evicted,
    FetchFailed(ClientError),
    RefreshFailed(ClientError),
    IncrementalFailed(ClientError),
    MetricsFailed(ClientError),
    NeighborsFailed { node_id: String, error: ClientError },
}

enum Reply {
    Fetch(Result<GraphData, ClientError>),
    Refresh(Result<GraphData, ClientError>),
    Incremental(Result<GraphData, ClientError>),
    Metrics(Result<GraphMetrics, ClientError>),
    Neighbors {
        node_id: String,
        result: Result<Vec<GraphNode>, ClientError>,
    },
}

/// Owns the in-memory graph. Backend calls run on worker threads and land
/// through [`GraphStore::poll`]; dropping the store discards late replies.
pub struct GraphStore {
    client: GraphClient,
    policy: StorePolicy,
    sleep: fn(Duration),
    tx: Sender<Reply>,
    rx: Receiver<Reply>,
    outstanding: usize,
    data: Option<GraphData>,
    revision: u64,
    fetched_at: Option<Instant>,
    last_read: Option<Instant>,
    last_limit: usize,
    error: Option<ClientError>,
    revalidation_paused: bool,
    fetch_in_flight: bool,
    refresh_in_flight: bool,
    incremental_in_flight: bool,
    metrics: Option<GraphMetrics>,
    metrics_fetched_at: Option<Instant>,
    metrics_requested_at: Option<Instant>,
    metrics_in_flight: bool,
    neighbors: Option<(String, Vec<GraphNode>)>,
    neighbors_in_flight: Option<String>,
}

impl GraphStore {
    pub fn new(client: GraphClient, policy: StorePolicy) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            client,
            policy,
            sleep: thread::sleep,
            tx,
            rx,
            outstanding: 0,
            data: None,
            revision: 0,
            fetched_at: None,
            last_read: None,
            last_limit: DEFAULT_GRAPH_LIMIT,
            error: None,
            revalidation_paused: false,
            fetch_in_flight: false,
            refresh_in_flight: false,
            incremental_in_flight: false,
            metrics: None,
            metrics_fetched_at: None,
            metrics_requested_at: None,
            metrics_in_flight: false,
            neighbors: None,
            neighbors_in_flight: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    fn spawn(&mut self, job: impl FnOnce() -> Reply + Send + 'static) {
        let tx = self.tx.clone();
        self.outstanding += 1;
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }

    pub fn fetch(&mut self, limit: usize) -> Result<(), ClientError> {
        if limit == 0 {
            return Err(ClientError::InvalidRequest(
                "limit must be greater than zero".to_owned(),
            ));
        }
        self.last_limit = limit;
        if self.fetch_in_flight {
            debug!(limit, "graph fetch already in flight");
            return Ok(());
        }

        info!(limit, "fetching graph");
        self.fetch_in_flight = true;
        let client = self.client.clone();
        let retry = self.policy.fetch_retry;
        let sleep = self.sleep;
        self.spawn(move || {
            Reply::Fetch(run_with_retry(retry, "get_graph", sleep, || {
                client.get_graph(limit)
            }))
        });
        Ok(())
    }

    /// Requests nodes beyond `loaded_ids`. Returns `Ok(false)` when a load is
    /// already in flight.
    pub fn fetch_incremental(
        &mut self,
        limit: usize,
        loaded_ids: Vec<String>,
    ) -> Result<bool, ClientError> {
        if loaded_ids.is_empty() {
            return Err(ClientError::InvalidRequest(
                "loaded ids must be a non-empty list".to_owned(),
            ));
        }
        if self.incremental_in_flight {
            return Ok(false);
        }

        info!(limit, loaded = loaded_ids.len(), "loading more nodes");
        self.incremental_in_flight = true;
        let client = self.client.clone();
        self.spawn(move || Reply::Incremental(client.get_graph_incremental(limit, &loaded_ids)));
        Ok(true)
    }

    pub fn load_more(&mut self) -> Result<bool, ClientError> {
        let loaded_ids = self
            .data
            .as_ref()
            .map(GraphData::node_ids)
            .unwrap_or_default();
        self.fetch_incremental(self.policy.incremental_limit, loaded_ids)
    }

    pub fn refresh(&mut self) {
        if self.refresh_in_flight {
            return;
        }

        let limit = self.last_limit;
        info!(limit, "refreshing graph");
        self.refresh_in_flight = true;
        let client = self.client.clone();
        let sleep = self.sleep;
        // A manual refresh reports its failure instead of retrying.
        self.spawn(move || {
            Reply::Refresh(run_with_retry(RetryPolicy::NONE, "refresh", sleep, || {
                client.get_graph(limit)
            }))
        });
    }

    pub fn request_metrics(&mut self, now: Instant) {
        if self.metrics_in_flight {
            return;
        }

        self.metrics_in_flight = true;
        self.metrics_requested_at = Some(now);
        let client = self.client.clone();
        let retry = self.policy.metrics_retry;
        let sleep = self.sleep;
        self.spawn(move || {
            Reply::Metrics(run_with_retry(retry, "get_graph_metrics", sleep, || {
                client.get_graph_metrics()
            }))
        });
    }

    pub fn request_neighbors(&mut self, node_id: &str) {
        if self.neighbors_in_flight.as_deref() == Some(node_id)
            || self
                .neighbors
                .as_ref()
                .is_some_and(|(cached, _)| cached == node_id)
        {
            return;
        }

        self.neighbors_in_flight = Some(node_id.to_owned());
        let client = self.client.clone();
        let node_id = node_id.to_owned();
        self.spawn(move || {
            let result = client.get_node_neighbors(&node_id, DEFAULT_NEIGHBOR_LIMIT);
            Reply::Neighbors { node_id, result }
        });
    }

    /// Background upkeep: revalidate stale data, drop unread data, poll metrics.
    pub fn maintain(&mut self, now: Instant) -> Option<StoreEvent> {
        let mut evicted = None;
        if let Some(last_read) = self.last_read
            && self.data.is_some()
            && !self.fetch_in_flight
            && now.saturating_duration_since(last_read) >= self.policy.gc_after
        {
            info!("evicting unread graph data");
            self.data = None;
            self.fetched_at = None;
            self.last_read = None;
            self.revision = self.revision.wrapping_add(1);
            evicted = Some(StoreEvent::Evicted);
        }

        // After a failed revalidation the cached graph is kept until a
        // refresh or fetch succeeds; retrying every frame would flood the backend.
        if self.data.is_some()
            && !self.fetch_in_flight
            && !self.revalidation_paused
            && self.is_stale(now)
        {
            debug!("graph data is stale, revalidating");
            let _ = self.fetch(self.last_limit);
        }

        let poll_due = self
            .metrics_requested_at
            .is_none_or(|at| now.saturating_duration_since(at) >= self.policy.metrics_poll_interval);
        if poll_due {
            self.request_metrics(now);
        }
        evicted
    }

    fn apply(&mut self, reply: Reply, now: Instant) -> StoreEvent {
        self.outstanding = self.outstanding.saturating_sub(1);
        match reply {
            Reply::Fetch(result) => {
                self.fetch_in_flight = false;
                match result {
                    Ok(data) => {
                        let event = StoreEvent::Loaded {
                            nodes: data.nodes.len(),
                            links: data.links.len(),
                        };
                        info!(nodes = data.nodes.len(), links = data.links.len(), "graph loaded");
                        self.replace(data, now);
                        event
                    }
                    Err(error) => {
                        warn!(%error, cached = self.data.is_some(), "graph fetch failed");
                        self.revalidation_paused = self.data.is_some();
                        self.error = Some(error.clone());
                        StoreEvent::FetchFailed(error)
                    }
                }
            }
            Reply::Refresh(result) => {
                self.refresh_in_flight = false;
                match result {
                    Ok(data) => {
                        let event = StoreEvent::Refreshed {
                            nodes: data.nodes.len(),
                            links: data.links.len(),
                        };
                        self.replace(data, now);
                        event
                    }
                    Err(error) => {
                        warn!(%error, "graph refresh failed");
                        StoreEvent::RefreshFailed(error)
                    }
                }
            }
            Reply::Incremental(result) => {
                self.incremental_in_flight = false;
                match result {
                    Ok(incoming) => {
                        let existing = self.data.take().unwrap_or_default();
                        let merged = merge_incoming(&existing, &incoming);
                        let added_nodes = merged.nodes.len() - existing.nodes.len();
                        let added_links = merged.links.len() - existing.links.len();
                        info!(added_nodes, added_links, "merged incremental batch");
                        self.data = Some(merged);
                        if added_nodes > 0 || added_links > 0 {
                            self.revision = self.revision.wrapping_add(1);
                        }
                        StoreEvent::Merged {
                            added_nodes,
                            added_links,
                        }
                    }
                    Err(error) => {
                        warn!(%error, "incremental load failed");
                        StoreEvent::IncrementalFailed(error)
                    }
                }
            }
            Reply::Metrics(result) => {
                self.metrics_in_flight = false;
                match result {
                    Ok(metrics) => {
                        self.metrics = Some(metrics);
                        self.metrics_fetched_at = Some(now);
                        StoreEvent::MetricsUpdated(metrics)
                    }
                    Err(error) => {
                        warn!(%error, "metrics fetch failed");
                        StoreEvent::MetricsFailed(error)
                    }
                }
            }
            Reply::Neighbors { node_id, result } => {
                if self.neighbors_in_flight.as_deref() == Some(node_id.as_str()) {
                    self.neighbors_in_flight = None;
                }
                match result {
                    Ok(neighbors) => {
                        let count = neighbors.len();
                        debug!(%node_id, count, "neighbors loaded");
                        self.neighbors = Some((node_id.clone(), neighbors));
                        StoreEvent::NeighborsLoaded { node_id, count }
                    }
                    Err(error) => {
                        warn!(%node_id, %error, "neighbor lookup failed");
                        StoreEvent::NeighborsFailed { node_id, error }
                    }
                }
            }
        }
    }

    fn replace(&mut self, data: GraphData, now: Instant) {
        self.data = Some(data);
        self.fetched_at = Some(now);
        self.last_read.get_or_insert(now);
        self.error = None;
        self.revalidation_paused = false;
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn poll(&mut self, now: Instant) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        while let Ok(reply) = self.rx.try_recv() {
            events.push(self.apply(reply, now));
        }
        events
    }

    #[cfg(test)]
    pub(crate) fn settle(&mut self, now: Instant) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        while self.outstanding > 0 {
            match self.rx.recv_timeout(Duration::from_secs(5)) {
                Ok(reply) => events.push(self.apply(reply, now)),
                Err(_) => break,
            }
        }
        events
    }

    /// Cached graph, marking it as read for garbage collection.
    pub fn graph(&mut self, now: Instant) -> Option<&GraphData> {
        if self.data.is_some() {
            self.last_read = Some(now);
        }
        self.data.as_ref()
    }

    pub fn data(&self) -> Option<&GraphData> {
        self.data.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        self.fetched_at
            .is_none_or(|at| now.saturating_duration_since(at) >= self.policy.stale_after)
    }

    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.fetch_in_flight && self.data.is_none()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight
    }

    pub fn is_loading_more(&self) -> bool {
        self.incremental_in_flight
    }

    /// Whether any worker reply is still outstanding.
    pub fn has_pending(&self) -> bool {
        self.outstanding > 0
    }

    pub fn metrics(&self) -> Option<GraphMetrics> {
        self.metrics
    }

    pub fn metrics_are_stale(&self, now: Instant) -> bool {
        self.metrics_fetched_at
            .is_none_or(|at| now.saturating_duration_since(at) >= self.policy.metrics_stale_after)
    }

    pub fn neighbors_of(&self, node_id: &str) -> Option<&[GraphNode]> {
        self.neighbors
            .as_ref()
            .filter(|(cached, _)| cached == node_id)
            .map(|(_, neighbors)| neighbors.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::backend::{BackendError, Vault, VaultBackend};
    use crate::graph::fixtures::graph;

    fn store() -> (Arc<ScriptedBackend>, GraphStore) {
        let backend = Arc::new(ScriptedBackend::default());
        let store = GraphStore::new(GraphClient::new(backend.clone()), StorePolicy::default())
            .with_sleep(|_| {});
        (backend, store)
    }

    fn payload(nodes: &[(&str, u32)], links: &[(&str, &str)]) -> Result<Value, BackendError> {
        Ok(serde_json::to_value(graph(nodes, links)).unwrap())
    }

    fn down() -> Result<Value, BackendError> {
        Err(BackendError::Transport("backend unavailable".to_owned()))
    }

    fn loaded(backend: &ScriptedBackend, store: &mut GraphStore, now: Instant) {
        backend.push("get_graph", payload(&[("a", 1), ("b", 1)], &[("a", "b")]));
        store.fetch(DEFAULT_GRAPH_LIMIT).unwrap();
        store.settle(now);
    }

    #[test]
    fn fetch_loads_graph_and_bumps_revision() {
        let (backend, mut store) = store();
        let now = Instant::now();
        backend.push("get_graph", payload(&[("a", 1), ("b", 1)], &[("a", "b")]));

        store.fetch(DEFAULT_GRAPH_LIMIT).unwrap();
        assert!(store.is_loading());
        let events = store.settle(now);

        assert_eq!(events, vec![StoreEvent::Loaded { nodes: 2, links: 1 }]);
        assert!(!store.is_loading());
        assert_eq!(store.revision(), 1);
        assert_eq!(store.graph(now).map(|data| data.nodes.len()), Some(2));
        assert!(store.error().is_none());
    }

    #[test]
    fn transient_failures_are_retried_three_times() {
        let (backend, mut store) = store();
        for _ in 0..4 {
            backend.push("get_graph", down());
        }

        store.fetch(DEFAULT_GRAPH_LIMIT).unwrap();
        let events = store.settle(Instant::now());

        assert!(matches!(events.as_slice(), [StoreEvent::FetchFailed(_)]));
        assert_eq!(backend.count("get_graph"), 4);
        assert!(store.error().is_some_and(ClientError::is_transient));
        assert!(store.data().is_none());
    }

    #[test]
    fn failed_revalidation_keeps_cached_data() {
        let (backend, mut store) = store();
        let now = Instant::now();
        loaded(&backend, &mut store, now);

        for _ in 0..4 {
            backend.push("get_graph", down());
        }
        store.fetch(DEFAULT_GRAPH_LIMIT).unwrap();
        store.settle(now);

        assert_eq!(store.data().map(|data| data.nodes.len()), Some(2));
        assert!(store.error().is_some());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn recovers_when_a_retry_succeeds() {
        let (backend, mut store) = store();
        backend.push("get_graph", down());
        backend.push("get_graph", payload(&[("a", 0)], &[]));

        store.fetch(DEFAULT_GRAPH_LIMIT).unwrap();
        let events = store.settle(Instant::now());

        assert_eq!(events, vec![StoreEvent::Loaded { nodes: 1, links: 0 }]);
        assert_eq!(backend.count("get_graph"), 2);
    }

    #[test]
    fn load_more_without_loaded_nodes_is_rejected_locally() {
        let (backend, mut store) = store();
        let error = store.load_more().unwrap_err();

        assert!(matches!(error, ClientError::InvalidRequest(_)));
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn only_one_incremental_load_runs_at_a_time() {
        let (backend, mut store) = store();
        let now = Instant::now();
        loaded(&backend, &mut store, now);
        backend.push(
            "get_graph_incremental",
            payload(&[("c", 1)], &[("b", "c"), ("a", "b")]),
        );

        assert!(store.load_more().unwrap());
        assert!(!store.load_more().unwrap());
        assert!(store.is_loading_more());

        let events = store.settle(now);
        assert_eq!(
            events,
            vec![StoreEvent::Merged {
                added_nodes: 1,
                added_links: 1
            }]
        );
        assert!(!store.is_loading_more());
        assert_eq!(backend.count("get_graph_incremental"), 1);
        assert_eq!(store.revision(), 2);

        let request = backend
            .requests()
            .into_iter()
            .find(|request| request.command() == "get_graph_incremental");
        assert_eq!(
            request,
            Some(crate::backend::BackendRequest::GraphIncremental {
                limit: 200,
                loaded_ids: vec!["a".to_owned(), "b".to_owned()],
            })
        );
    }

    #[test]
    fn failed_incremental_load_releases_the_guard() {
        let (backend, mut store) = store();
        let now = Instant::now();
        loaded(&backend, &mut store, now);
        backend.push("get_graph_incremental", down());

        store.load_more().unwrap();
        let events = store.settle(now);

        assert!(matches!(events.as_slice(), [StoreEvent::IncrementalFailed(_)]));
        assert!(!store.is_loading_more());
        assert_eq!(store.data().map(|data| data.nodes.len()), Some(2));
    }

    #[test]
    fn empty_incremental_batch_leaves_revision_alone() {
        let (backend, mut store) = store();
        let now = Instant::now();
        loaded(&backend, &mut store, now);
        backend.push("get_graph_incremental", payload(&[], &[]));

        store.load_more().unwrap();
        store.settle(now);

        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn refresh_replaces_instead_of_merging() {
        let (backend, mut store) = store();
        let now = Instant::now();
        loaded(&backend, &mut store, now);
        backend.push("get_graph_incremental", payload(&[("c", 0)], &[]));
        store.load_more().unwrap();
        store.settle(now);
        assert_eq!(store.data().map(|data| data.nodes.len()), Some(3));

        backend.push("get_graph", payload(&[("a", 0)], &[]));
        store.refresh();
        assert!(store.is_refreshing());
        let events = store.settle(now);

        assert_eq!(events, vec![StoreEvent::Refreshed { nodes: 1, links: 0 }]);
        assert_eq!(
            store.data().map(GraphData::node_ids),
            Some(vec!["a".to_owned()])
        );
    }

    #[test]
    fn refresh_is_not_retried() {
        let (backend, mut store) = store();
        let now = Instant::now();
        loaded(&backend, &mut store, now);
        backend.push("get_graph", down());

        store.refresh();
        let events = store.settle(now);

        assert!(matches!(events.as_slice(), [StoreEvent::RefreshFailed(_)]));
        assert_eq!(backend.count("get_graph"), 2);
        assert_eq!(store.data().map(|data| data.nodes.len()), Some(2));
    }

    #[test]
    fn stale_data_is_revalidated_in_the_background() {
        let (backend, mut store) = store();
        let start = Instant::now();
        loaded(&backend, &mut store, start);

        let fresh = start + Duration::from_secs(60);
        store.graph(fresh);
        assert!(!store.is_stale(fresh));
        assert_eq!(store.maintain(fresh), None);
        store.settle(fresh);
        assert_eq!(backend.count("get_graph"), 1);

        let later = start + Duration::from_secs(6 * 60);
        store.graph(later);
        assert!(store.is_stale(later));
        backend.push("get_graph", payload(&[("a", 1), ("b", 1), ("c", 0)], &[("a", "b")]));
        store.maintain(later);
        store.settle(later);

        assert_eq!(backend.count("get_graph"), 2);
        assert_eq!(store.data().map(|data| data.nodes.len()), Some(3));
        assert!(!store.is_stale(later));
    }

    #[test]
    fn failed_revalidation_is_not_repeated_every_frame() {
        let (backend, mut store) = store();
        let start = Instant::now();
        loaded(&backend, &mut store, start);

        let later = start + Duration::from_secs(6 * 60);
        for _ in 0..4 {
            backend.push("get_graph", down());
        }
        let mut failures = 0;
        for frame in 0..3 {
            let now = later + Duration::from_millis(16 * frame);
            store.graph(now);
            store.maintain(now);
            failures += store
                .settle(now)
                .iter()
                .filter(|event| matches!(event, StoreEvent::FetchFailed(_)))
                .count();
        }

        // One revalidation with its three retries, then nothing more.
        assert_eq!(backend.count("get_graph"), 5);
        assert_eq!(failures, 1);
        assert_eq!(store.data().map(|data| data.nodes.len()), Some(2));

        backend.push("get_graph", payload(&[("a", 1), ("b", 1)], &[("a", "b")]));
        store.refresh();
        store.settle(later);
        assert!(store.error().is_none());

        let stale_again = later + Duration::from_secs(6 * 60);
        backend.push("get_graph", payload(&[("a", 1)], &[]));
        store.graph(stale_again);
        store.maintain(stale_again);
        store.settle(stale_again);
        assert_eq!(backend.count("get_graph"), 7);
        assert_eq!(store.data().map(|data| data.nodes.len()), Some(1));
    }

    #[test]
    fn unread_data_is_evicted() {
        let (backend, mut store) = store();
        let start = Instant::now();
        loaded(&backend, &mut store, start);

        let read = start + Duration::from_secs(4 * 60);
        store.graph(read);
        assert_eq!(store.maintain(read), None);
        store.settle(read);

        let unread = read + Duration::from_secs(10 * 60);
        assert_eq!(store.maintain(unread), Some(StoreEvent::Evicted));
        store.settle(unread);

        assert!(store.data().is_none());
        assert_eq!(backend.count("get_graph"), 1);
    }

    #[test]
    fn metrics_are_polled_every_minute() {
        let (backend, mut store) = store();
        let start = Instant::now();
        backend.push("get_graph_metrics", Ok(json!([10, 15, 4])));

        store.maintain(start);
        let events = store.settle(start);
        assert_eq!(
            events,
            vec![StoreEvent::MetricsUpdated(GraphMetrics {
                total_nodes: 10,
                total_links: 15,
                max_connections: 4,
            })]
        );
        assert!(!store.metrics_are_stale(start + Duration::from_secs(29)));
        assert!(store.metrics_are_stale(start + Duration::from_secs(31)));

        store.maintain(start + Duration::from_secs(30));
        store.settle(start);
        assert_eq!(backend.count("get_graph_metrics"), 1);

        // Unscripted: the poll fails after its two fixed retries.
        store.maintain(start + Duration::from_secs(61));
        let events = store.settle(start);
        assert!(matches!(events.as_slice(), [StoreEvent::MetricsFailed(_)]));
        assert_eq!(backend.count("get_graph_metrics"), 4);
        assert_eq!(store.metrics().map(|m| m.total_nodes), Some(10));
    }

    #[test]
    fn neighbors_are_cached_per_node() {
        let (backend, mut store) = store();
        backend.push(
            "get_node_neighbors",
            Ok(json!([{"id": "b", "label": "B"}, {"id": "c", "label": "C"}])),
        );

        store.request_neighbors("a");
        store.request_neighbors("a");
        let events = store.settle(Instant::now());
        store.request_neighbors("a");

        assert_eq!(
            events,
            vec![StoreEvent::NeighborsLoaded {
                node_id: "a".to_owned(),
                count: 2
            }]
        );
        assert_eq!(backend.count("get_node_neighbors"), 1);
        assert_eq!(store.neighbors_of("a").map(<[GraphNode]>::len), Some(2));
        assert!(store.neighbors_of("b").is_none());
    }

    #[test]
    fn vault_backed_store_reports_loaded_graph_and_totals() {
        let notes = (0..10)
            .map(|index| crate::backend::VaultNote {
                id: format!("n{index}"),
                title: format!("Note {index}"),
                ..Default::default()
            })
            .collect::<Vec<_>>();
        let ring = (0..10).map(|index| (index, (index + 1) % 10));
        let chords = (0..5).map(|index| (index, index + 3));
        let links = ring
            .chain(chords)
            .map(|(source, target)| crate::backend::VaultLink {
                source: format!("n{source}"),
                target: format!("n{target}"),
                value: None,
            })
            .collect();
        let backend = VaultBackend::from_vault(Vault { notes, links });
        let mut store = GraphStore::new(GraphClient::new(Arc::new(backend)), StorePolicy::default())
            .with_sleep(|_| {});
        let now = Instant::now();

        store.fetch(DEFAULT_GRAPH_LIMIT).unwrap();
        store.request_metrics(now);
        store.settle(now);

        let data = store.graph(now).cloned().unwrap();
        assert_eq!(data.nodes.len(), 10);
        assert_eq!(data.links.len(), 15);
        assert_eq!(data.pending_link_count(), 0);
        assert_eq!(store.metrics().map(|m| m.total_nodes), Some(10));
        assert_eq!(store.metrics().map(|m| m.total_links), Some(15));
    }
}

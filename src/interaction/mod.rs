mod highlight;
mod notify;

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use eframe::egui::Vec2;
use tracing::{debug, info, warn};

use crate::backend::{ClientError, GraphClient};
use crate::graph::{GraphData, GraphStore, NoteSummary, StoreEvent};
use crate::simulation::Simulation;

pub use highlight::two_hop_neighborhood;
pub use notify::{Notice, NoticeKind, Notifications};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 4.0;
/// Zooming out past this loads more of the graph.
pub const LAZY_LOAD_ZOOM: f32 = 0.3;
const RESET_DURATION: Duration = Duration::from_millis(300);

#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub zoom: f32,
    pub pan: Vec2,
    pub selected: Option<String>,
    pub highlighted: HashSet<String>,
    pub hovered: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            selected: None,
            highlighted: HashSet::new(),
            hovered: None,
        }
    }
}

impl ViewState {
    /// Canvas-relative screen offset to layout coordinates.
    pub fn to_world(&self, screen: Vec2) -> Vec2 {
        (screen - self.pan) / self.zoom
    }

    pub fn to_screen(&self, world: Vec2) -> Vec2 {
        world * self.zoom + self.pan
    }
}

struct ResetAnimation {
    from_zoom: f32,
    from_pan: Vec2,
    started_at: Instant,
}

fn ease_cubic_in_out(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

struct NoteReply {
    node_id: String,
    result: Result<NoteSummary, ClientError>,
}

/// Owns [`ViewState`] and turns pointer and keyboard input into view
/// changes, store requests and notifications.
pub struct InteractionController {
    view: ViewState,
    client: GraphClient,
    tx: Sender<NoteReply>,
    rx: Receiver<NoteReply>,
    notes_in_flight: usize,
    notifications: Notifications,
    reset: Option<ResetAnimation>,
    dragging: Option<String>,
}

impl InteractionController {
    pub fn new(client: GraphClient, notification_lifetime: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            view: ViewState::default(),
            client,
            tx,
            rx,
            notes_in_flight: 0,
            notifications: Notifications::new(notification_lifetime),
            reset: None,
            dragging: None,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn dismiss(&mut self, id: u64) {
        self.notifications.dismiss(id);
    }

    pub fn is_opening_note(&self) -> bool {
        self.notes_in_flight > 0
    }

    /// Zooms by `factor` keeping the layout point under `anchor` in place.
    pub fn zoom_by(&mut self, factor: f32, anchor: Vec2, store: &mut GraphStore, now: Instant) {
        let zoom = (self.view.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let world = self.view.to_world(anchor);
        self.view.zoom = zoom;
        self.view.pan = anchor - world * zoom;
        self.reset = None;
        self.after_gesture(store, now);
    }

    pub fn pan_by(&mut self, delta: Vec2, store: &mut GraphStore, now: Instant) {
        self.view.pan += delta;
        self.reset = None;
        self.after_gesture(store, now);
    }

    fn after_gesture(&mut self, store: &mut GraphStore, now: Instant) {
        if self.view.zoom >= LAZY_LOAD_ZOOM || store.is_loading_more() {
            return;
        }
        if store.data().is_none_or(GraphData::is_empty) {
            return;
        }

        match store.load_more() {
            Ok(true) => debug!(zoom = self.view.zoom, "zoomed out, loading more nodes"),
            Ok(false) => {}
            Err(error) => {
                warn!(%error, "could not start incremental load");
                self.notifications
                    .error(format!("Failed to load more nodes: {error}"), now);
            }
        }
    }

    /// Returns whether the highlight set changed. Only links in the current
    /// layout count, so hovering while zoomed out cannot pull filtered nodes
    /// back into view.
    pub fn hover(&mut self, node_id: Option<&str>, layout: Option<&Simulation>) -> bool {
        if self.view.hovered.as_deref() == node_id {
            return false;
        }

        match node_id {
            Some(node_id) => {
                self.view.hovered = Some(node_id.to_owned());
                self.view.highlighted = layout
                    .map(|layout| two_hop_neighborhood(layout.link_ids(), node_id))
                    .unwrap_or_else(|| HashSet::from([node_id.to_owned()]));
            }
            None => {
                self.view.hovered = None;
                self.view.highlighted.clear();
            }
        }
        true
    }

    /// Asks the backend to open the note; the selection changes once it answers.
    pub fn click(&mut self, node_id: &str) {
        info!(%node_id, "opening note");
        let client = self.client.clone();
        let tx = self.tx.clone();
        let node_id = node_id.to_owned();
        self.notes_in_flight += 1;
        thread::spawn(move || {
            let result = client.get_note(&node_id);
            let _ = tx.send(NoteReply { node_id, result });
        });
    }

    fn apply_note(&mut self, reply: NoteReply, now: Instant) -> bool {
        self.notes_in_flight = self.notes_in_flight.saturating_sub(1);
        match reply.result {
            Ok(note) => {
                self.notifications
                    .info(format!("Opening note: {}", note.display_title()), now);
                let changed = self.view.selected.as_deref() != Some(reply.node_id.as_str());
                self.view.selected = Some(reply.node_id);
                changed
            }
            Err(error) => {
                warn!(node_id = %reply.node_id, %error, "failed to open note");
                self.notifications
                    .error(format!("Failed to open note: {error}"), now);
                false
            }
        }
    }

    /// Applies finished note requests and expires toasts. Returns whether
    /// the selection changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Ok(reply) = self.rx.try_recv() {
            changed |= self.apply_note(reply, now);
        }
        self.notifications.expire(now);
        changed
    }

    #[cfg(test)]
    fn settle(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while self.notes_in_flight > 0 {
            match self.rx.recv_timeout(Duration::from_secs(5)) {
                Ok(reply) => changed |= self.apply_note(reply, now),
                Err(_) => break,
            }
        }
        changed
    }

    /// Surfaces store outcomes the user should hear about.
    pub fn on_store_event(&mut self, event: &StoreEvent, has_data: bool, now: Instant) {
        match event {
            StoreEvent::RefreshFailed(error) => {
                self.notifications
                    .error(format!("Failed to refresh graph: {error}"), now);
            }
            StoreEvent::IncrementalFailed(error) => {
                self.notifications
                    .error(format!("Failed to load more nodes: {error}"), now);
            }
            // Without data the error screen shows the failure instead.
            StoreEvent::FetchFailed(error) if has_data => {
                self.notifications
                    .error(format!("Showing cached graph: {error}"), now);
            }
            StoreEvent::Refreshed { nodes, links } => {
                self.notifications
                    .info(format!("Graph refreshed: {nodes} notes, {links} links"), now);
            }
            StoreEvent::Merged {
                added_nodes,
                added_links,
            } if *added_nodes > 0 => {
                self.notifications.info(
                    format!("Loaded {added_nodes} more notes and {added_links} links"),
                    now,
                );
            }
            StoreEvent::Merged { added_links, .. } => {
                debug!(added_links, "lazy load found no new notes");
            }
            StoreEvent::NeighborsFailed { node_id, error }
                if self.view.selected.as_deref() == Some(node_id.as_str()) =>
            {
                self.notifications
                    .error(format!("Failed to load neighbors: {error}"), now);
            }
            StoreEvent::Evicted => {
                if let Some(selected) = self.view.selected.take() {
                    debug!(%selected, "selection dropped with evicted graph");
                }
                self.view.highlighted.clear();
                self.view.hovered = None;
            }
            StoreEvent::Loaded { nodes, links } => {
                debug!(nodes, links, "graph ready for layout");
            }
            StoreEvent::NeighborsLoaded { node_id, count } => {
                debug!(%node_id, count, "neighbors ready");
            }
            StoreEvent::MetricsUpdated(metrics) => {
                debug!(total_nodes = metrics.total_nodes, "vault totals updated");
            }
            StoreEvent::FetchFailed(_)
            | StoreEvent::MetricsFailed(_)
            | StoreEvent::NeighborsFailed { .. } => {}
        }
    }

    /// Ctrl/Cmd+R and the refresh button.
    pub fn refresh(&mut self, store: &mut GraphStore, now: Instant) {
        if store.is_loading_more() || store.is_refreshing() {
            return;
        }
        self.notifications.info("Refreshing graph data...", now);
        store.refresh();
    }

    /// Escape: drops selection and highlight, keeps zoom and pan.
    pub fn clear_selection(&mut self) {
        self.view.selected = None;
        self.view.highlighted.clear();
        self.view.hovered = None;
    }

    pub fn reset_view(&mut self, now: Instant) {
        self.reset = Some(ResetAnimation {
            from_zoom: self.view.zoom,
            from_pan: self.view.pan,
            started_at: now,
        });
    }

    /// Advances the reset transition. Returns whether it is still running.
    pub fn animate(&mut self, now: Instant) -> bool {
        let Some(reset) = &self.reset else {
            return false;
        };

        let t = (now.saturating_duration_since(reset.started_at).as_secs_f32()
            / RESET_DURATION.as_secs_f32())
        .min(1.0);
        let eased = ease_cubic_in_out(t);
        self.view.zoom = reset.from_zoom + (1.0 - reset.from_zoom) * eased;
        self.view.pan = reset.from_pan * (1.0 - eased);

        if t >= 1.0 {
            self.view.zoom = 1.0;
            self.view.pan = Vec2::ZERO;
            self.reset = None;
            return false;
        }
        true
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }

    pub fn drag_start(&mut self, node_id: &str, simulation: &mut Simulation) {
        if simulation.drag_start(node_id) {
            self.dragging = Some(node_id.to_owned());
        }
    }

    pub fn drag_to(&mut self, screen: Vec2, simulation: &mut Simulation) {
        if let Some(node_id) = &self.dragging {
            simulation.drag_to(node_id, self.view.to_world(screen));
        }
    }

    pub fn drag_end(&mut self, simulation: &mut Simulation) {
        if let Some(node_id) = self.dragging.take() {
            simulation.drag_end(&node_id);
        }
    }
}

/// Wheel scroll to a multiplicative zoom step.
pub fn wheel_zoom_factor(scroll_y: f32) -> f32 {
    (scroll_y * 0.002).exp()
}

use std::time::{Duration, Instant};

use eframe::egui::{self, Context, Key, Modifiers, Vec2};
use tracing::{debug, info, warn};

use crate::backend::GraphClient;
use crate::graph::{GraphStore, StoreEvent};
use crate::interaction::InteractionController;
use crate::lod::{is_reduced, visible_subset};
use crate::perf::PerformanceMonitor;
use crate::simulation::{Simulation, SimulationParams};

mod hud;
mod render_utils;
mod view;

/// Repaint cadence while nothing moves, so store upkeep keeps running.
const IDLE_REPAINT: Duration = Duration::from_secs(1);
const TOAST_REPAINT: Duration = Duration::from_millis(250);

pub struct NotegraphApp {
    store: GraphStore,
    limit: usize,
    model: ViewModel,
}

#[derive(Clone, Debug, PartialEq)]
enum Screen {
    Loading,
    Failed(String),
    Empty,
    Ready,
}

impl Screen {
    fn of(store: &GraphStore) -> Self {
        match store.data() {
            Some(data) if data.is_empty() => Self::Empty,
            Some(_) => Self::Ready,
            None if store.is_loading() => Self::Loading,
            None => match store.error() {
                Some(error) => Self::Failed(error.to_string()),
                None => Self::Loading,
            },
        }
    }
}

/// Identifies the visible subset a simulation was built from. The
/// interaction context only matters while the zoomed-out filter is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BuildKey {
    revision: u64,
    reduced: bool,
    context: u64,
}

struct ViewModel {
    controller: InteractionController,
    params: SimulationParams,
    simulation: Option<Simulation>,
    built: Option<BuildKey>,
    context_epoch: u64,
    perf: PerformanceMonitor,
    resetting: bool,
    visible_nodes: usize,
    visible_links: usize,
}

impl NotegraphApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        client: GraphClient,
        mut store: GraphStore,
        limit: usize,
        notification_lifetime: Duration,
    ) -> Self {
        if let Err(error) = store.fetch(limit) {
            warn!(%error, "initial fetch rejected");
        }
        Self {
            store,
            limit,
            model: ViewModel::new(client, notification_lifetime),
        }
    }

    fn pump_store(&mut self, now: Instant) {
        for event in self.store.poll(now) {
            self.model.on_store_event(&event, &self.store, now);
        }
        if let Some(event) = self.store.maintain(now) {
            self.model.on_store_event(&event, &self.store, now);
        }

        // Evicted data is fetched again on the next read.
        if self.store.data().is_none() && !self.store.is_fetching() && self.store.error().is_none()
        {
            debug!("no graph cached, fetching");
            let _ = self.store.fetch(self.limit);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &Context, now: Instant) {
        if refresh_shortcut(ctx) {
            self.model.controller.refresh(&mut self.store, now);
        }
        if ctx.input(|input| input.key_pressed(Key::Escape)) {
            self.model.controller.clear_selection();
            self.model.context_changed();
        }
    }
}

/// Ctrl+R on every platform, Cmd+R on macOS as well.
fn refresh_shortcut(ctx: &Context) -> bool {
    ctx.input_mut(|input| {
        input.consume_key(Modifiers::COMMAND, Key::R) || input.consume_key(Modifiers::CTRL, Key::R)
    })
}

impl eframe::App for NotegraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.pump_store(now);
        self.model.poll(&mut self.store, now);
        self.handle_shortcuts(ctx, now);

        match Screen::of(&self.store) {
            Screen::Loading => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading knowledge graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            Screen::Failed(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load knowledge graph");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        info!(limit = self.limit, "retrying graph fetch");
                        let _ = self.store.fetch(self.limit);
                    }
                });
            }
            Screen::Empty => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("No notes found");
                        ui.label("Add notes to the vault and refresh.");
                        ui.add_space(10.0);
                        let busy = self.store.is_refreshing();
                        if ui.add_enabled(!busy, egui::Button::new("Refresh")).clicked() {
                            self.model.controller.refresh(&mut self.store, now);
                        }
                    });
                });
            }
            Screen::Ready => self.model.show(ctx, &mut self.store, now),
        }

        self.model.draw_notifications(ctx);

        if self.model.is_animating() || self.store.has_pending() {
            ctx.request_repaint();
        } else if !self.model.controller.notifications().is_empty() {
            ctx.request_repaint_after(TOAST_REPAINT);
        } else {
            ctx.request_repaint_after(IDLE_REPAINT);
        }
    }
}

impl ViewModel {
    fn new(client: GraphClient, notification_lifetime: Duration) -> Self {
        Self {
            controller: InteractionController::new(client, notification_lifetime),
            params: SimulationParams::default(),
            simulation: None,
            built: None,
            context_epoch: 0,
            perf: PerformanceMonitor::default(),
            resetting: false,
            visible_nodes: 0,
            visible_links: 0,
        }
    }

    fn context_changed(&mut self) {
        self.context_epoch = self.context_epoch.wrapping_add(1);
    }

    fn on_store_event(&mut self, event: &StoreEvent, store: &GraphStore, now: Instant) {
        self.controller
            .on_store_event(event, store.data().is_some(), now);
        if matches!(event, StoreEvent::Evicted) {
            self.simulation = None;
            self.built = None;
            self.context_changed();
        }
    }

    fn poll(&mut self, store: &mut GraphStore, now: Instant) {
        if !self.controller.poll(now) {
            return;
        }
        self.context_changed();
        if let Some(selected) = self.controller.view().selected.clone() {
            store.request_neighbors(&selected);
        }
    }

    fn is_animating(&self) -> bool {
        self.resetting
            || self.controller.is_opening_note()
            || self.controller.dragging().is_some()
            || self
                .simulation
                .as_ref()
                .is_some_and(Simulation::is_running)
    }

    /// Rebuilds the layout when the graph or the visible subset changed.
    fn sync_simulation(&mut self, store: &mut GraphStore, size: Vec2, now: Instant) {
        let revision = store.revision();
        let Some(data) = store.graph(now) else {
            self.simulation = None;
            self.built = None;
            self.visible_nodes = 0;
            self.visible_links = 0;
            return;
        };

        let view = self.controller.view();
        let reduced = is_reduced(view.zoom);
        let key = BuildKey {
            revision,
            reduced,
            context: if reduced { self.context_epoch } else { 0 },
        };

        if self.built != Some(key) {
            let visible = visible_subset(data, view.zoom, view.selected.as_deref(), &view.highlighted);
            self.visible_nodes = visible.node_count();
            self.visible_links = visible.link_count();
            debug!(
                revision,
                reduced,
                nodes = self.visible_nodes,
                links = self.visible_links,
                "visible subset changed"
            );
            self.simulation = Some(match self.simulation.take() {
                Some(previous) => previous.rebuild(&visible),
                None => Simulation::new(self.params, &visible, size),
            });
            self.built = Some(key);
        }

        if let Some(simulation) = &mut self.simulation {
            simulation.resize(size);
        }
    }

    fn show(&mut self, ctx: &Context, store: &mut GraphStore, now: Instant) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui, store, now));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_details(ui, store, now));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui, store, now));
    }
}

use std::collections::BTreeSet;
use std::time::Instant;

use eframe::egui::{self, Align, Align2, Color32, Context, Layout, RichText, Sense, Ui, vec2};

use crate::graph::GraphStore;
use crate::interaction::NoticeKind;
use crate::util::truncate_label;

use super::ViewModel;
use super::render_utils::{UNGROUPED_COLOR, group_color};

const LEGEND_ROWS: usize = 12;

impl ViewModel {
    pub(super) fn draw_top_bar(&mut self, ui: &mut Ui, store: &mut GraphStore, now: Instant) {
        ui.horizontal(|ui| {
            ui.heading("notegraph");
            ui.separator();

            let perf = self.perf.snapshot();
            ui.label(format!("FPS: {}", perf.fps));
            ui.label(format!(
                "Tick: {:.1} ms",
                perf.render_time.as_secs_f64() * 1000.0
            ));
            let loaded = store.data().map_or(0, |data| data.nodes.len());
            ui.label(format!("Nodes: {} / {loaded}", self.visible_nodes));
            ui.label(format!("Links: {}", self.visible_links));
            ui.label(format!("Zoom: {:.0}%", self.controller.view().zoom * 100.0));
            if self.simulation.as_ref().is_some_and(|sim| sim.is_running()) {
                ui.weak(format!("Settling ({:.2})", perf.alpha));
            }

            if store.is_loading_more() {
                ui.spinner();
                ui.label("Loading more...");
            } else if store.is_refreshing() {
                ui.spinner();
                ui.label("Refreshing...");
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.button("Reset view").clicked() {
                    self.controller.reset_view(now);
                }
                let busy = store.is_loading_more() || store.is_refreshing();
                let refresh = ui
                    .add_enabled(!busy, egui::Button::new("Refresh"))
                    .on_hover_text("Ctrl+R");
                if refresh.clicked() {
                    self.controller.refresh(store, now);
                }
            });
        });
    }

    pub(super) fn draw_details(&mut self, ui: &mut Ui, store: &GraphStore, now: Instant) {
        ui.heading("Vault");
        ui.add_space(6.0);
        match store.metrics() {
            Some(metrics) => {
                ui.label(format!("Notes: {}", metrics.total_nodes));
                ui.label(format!("Links: {}", metrics.total_links));
                ui.label(format!("Most connected: {}", metrics.max_connections));
                if store.metrics_are_stale(now) {
                    ui.weak("Totals may be out of date.");
                }
            }
            None => {
                ui.weak("Totals unavailable.");
            }
        }
        if let Some(pending) = store
            .data()
            .map(|data| data.pending_link_count())
            .filter(|pending| *pending > 0)
        {
            ui.label(format!("Links to unloaded notes: {pending}"));
        }
        if let Some(error) = store.error() {
            ui.colored_label(Color32::from_rgb(248, 113, 113), format!("Last error: {error}"));
        }

        ui.separator();
        self.draw_selection(ui, store);

        ui.separator();
        ui.label(RichText::new("Folders").strong());
        self.draw_legend(ui);
    }

    fn draw_selection(&mut self, ui: &mut Ui, store: &GraphStore) {
        ui.label(RichText::new("Selected note").strong());
        let Some(selected_id) = self.controller.view().selected.clone() else {
            ui.label("Click a note to open it.");
            return;
        };

        let Some(node) = store
            .data()
            .and_then(|data| data.nodes.iter().find(|node| node.id == selected_id))
        else {
            ui.label("The selected note is no longer loaded.");
            return;
        };

        ui.label(RichText::new(node.label.as_str()).strong());
        ui.small(node.id.as_str());
        if let Some(group) = &node.group {
            ui.label(format!("Folder: {group}"));
        }
        ui.label(format!("Connections: {}", node.connection_count()));

        ui.add_space(6.0);
        ui.label(RichText::new("Neighbors").strong());
        let Some(neighbors) = store.neighbors_of(&selected_id) else {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Looking up neighbors...");
            });
            return;
        };
        if neighbors.is_empty() {
            ui.label("No linked notes.");
            return;
        }

        let mut open = None;
        egui::ScrollArea::vertical()
            .id_salt("neighbors")
            .max_height(240.0)
            .show(ui, |ui| {
                for neighbor in neighbors {
                    let text = format!(
                        "{} ({})",
                        truncate_label(&neighbor.label),
                        neighbor.connection_count()
                    );
                    if ui.link(text).clicked() {
                        open = Some(neighbor.id.clone());
                    }
                }
            });
        if let Some(node_id) = open {
            self.controller.click(&node_id);
        }
    }

    fn draw_legend(&self, ui: &mut Ui) {
        let Some(simulation) = &self.simulation else {
            return;
        };

        let groups = simulation
            .nodes()
            .iter()
            .filter_map(|node| node.group.as_deref())
            .collect::<BTreeSet<_>>();
        let ungrouped = simulation.nodes().iter().any(|node| node.group.is_none());

        for group in groups.iter().take(LEGEND_ROWS) {
            legend_row(ui, group_color(Some(group)), group);
        }
        if groups.len() > LEGEND_ROWS {
            ui.weak(format!("and {} more", groups.len() - LEGEND_ROWS));
        }
        if ungrouped {
            legend_row(ui, UNGROUPED_COLOR, "(no folder)");
        }
    }

    /// Bottom-right toasts; each one can be dismissed before it expires.
    pub(super) fn draw_notifications(&mut self, ctx: &Context) {
        if self.controller.notifications().is_empty() {
            return;
        }

        let mut dismissed = Vec::new();
        egui::Area::new(egui::Id::new("notifications"))
            .anchor(Align2::RIGHT_BOTTOM, vec2(-16.0, -16.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                for notice in self.controller.notifications().iter() {
                    let accent = match notice.kind {
                        NoticeKind::Info => Color32::from_rgb(125, 211, 252),
                        NoticeKind::Error => Color32::from_rgb(248, 113, 113),
                    };
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.colored_label(accent, notice.message.as_str());
                            if ui.small_button("x").clicked() {
                                dismissed.push(notice.id);
                            }
                        });
                    });
                    ui.add_space(6.0);
                }
            });

        for id in dismissed {
            self.controller.dismiss(id);
        }
    }
}

fn legend_row(ui: &mut Ui, color: Color32, name: &str) {
    ui.horizontal(|ui| {
        let (swatch, _) = ui.allocate_exact_size(vec2(12.0, 12.0), Sense::hover());
        ui.painter().circle_filled(swatch.center(), 5.0, color);
        ui.label(name);
    });
}

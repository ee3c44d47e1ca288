use std::time::Instant;

use eframe::egui::{
    self, Align2, Color32, FontId, Painter, PointerButton, Rect, Response, Sense, Stroke, Ui, vec2,
};

use crate::graph::GraphStore;
use crate::interaction::wheel_zoom_factor;
use crate::lod::shows_label;
use crate::simulation::{SimNode, Simulation};
use crate::util::truncate_label;

use super::ViewModel;
use super::render_utils::{
    HIGHLIGHT_COLOR, SELECTED_COLOR, blend_color, circle_visible, dim_color, draw_background,
    edge_visible, group_color, screen_to_world, world_to_screen,
};

const LINK_COLOR: Color32 = Color32::from_rgb(74, 84, 99);
const LABEL_COLOR: Color32 = Color32::from_rgb(226, 232, 240);

impl ViewModel {
    pub(super) fn draw_graph(&mut self, ui: &mut Ui, store: &mut GraphStore, now: Instant) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());

        self.handle_graph_zoom(ui, rect, &response, store, now);
        self.handle_graph_pointer(ui, rect, &response, store, now);
        self.resetting = self.controller.animate(now);

        self.sync_simulation(store, rect.size(), now);
        if let Some(simulation) = &mut self.simulation {
            simulation.tick_with(&mut self.perf);
        }

        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, self.controller.view());
        let Some(simulation) = &self.simulation else {
            return;
        };
        self.paint_links(&painter, rect, simulation);
        self.paint_nodes(&painter, rect, simulation);

        let hovered = self
            .controller
            .view()
            .hovered
            .as_deref()
            .and_then(|id| simulation.node(id));
        if let (Some(node), Some(pointer)) = (hovered, response.hover_pos()) {
            paint_tooltip(&painter, rect, pointer, node);
        }
    }

    fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &Response,
        store: &mut GraphStore,
        now: Instant,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        self.controller
            .zoom_by(wheel_zoom_factor(scroll), pointer - rect.min, store, now);
    }

    fn handle_graph_pointer(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &Response,
        store: &mut GraphStore,
        now: Instant,
    ) {
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };

        let hovered = response
            .hover_pos()
            .and_then(|pointer| {
                simulation.node_at(screen_to_world(rect, self.controller.view(), pointer))
            })
            .map(|node| node.id.clone());
        if self.controller.dragging().is_none()
            && self.controller.hover(hovered.as_deref(), Some(&*simulation))
        {
            self.context_epoch = self.context_epoch.wrapping_add(1);
        }

        if response.drag_started_by(PointerButton::Primary) {
            let grabbed = ui
                .input(|input| input.pointer.press_origin())
                .and_then(|origin| {
                    simulation.node_at(screen_to_world(rect, self.controller.view(), origin))
                })
                .map(|node| node.id.clone());
            if let Some(node_id) = grabbed {
                self.controller.drag_start(&node_id, simulation);
            }
        }

        if response.dragged() {
            if self.controller.dragging().is_some() {
                if let Some(pointer) = response.interact_pointer_pos() {
                    self.controller.drag_to(pointer - rect.min, simulation);
                }
            } else {
                self.controller.pan_by(response.drag_delta(), store, now);
            }
        }

        if response.drag_stopped() {
            self.controller.drag_end(simulation);
        }

        if response.clicked_by(PointerButton::Primary)
            && let Some(node_id) = &hovered
        {
            self.controller.click(node_id);
        }

        let cursor = if self.controller.dragging().is_some() {
            Some(egui::CursorIcon::Grabbing)
        } else if hovered.is_some() {
            Some(egui::CursorIcon::PointingHand)
        } else {
            None
        };
        if let Some(cursor) = cursor {
            ui.output_mut(|output| {
                output.cursor_icon = cursor;
            });
        }
    }

    fn paint_links(&self, painter: &Painter, rect: Rect, simulation: &Simulation) {
        let view = self.controller.view();
        let nodes = simulation.nodes();
        let highlight_active = !view.highlighted.is_empty();
        let width = (1.2 * view.zoom.sqrt()).clamp(0.5, 2.0);

        for link in simulation.links() {
            let source = &nodes[link.source];
            let target = &nodes[link.target];
            let start = world_to_screen(rect, view, source.pos);
            let end = world_to_screen(rect, view, target.pos);
            if !edge_visible(rect, start, end, 2.0) {
                continue;
            }

            let related =
                view.highlighted.contains(&source.id) && view.highlighted.contains(&target.id);
            let stroke = if related {
                Stroke::new(width * 1.8, HIGHLIGHT_COLOR)
            } else if highlight_active {
                Stroke::new(width, dim_color(LINK_COLOR, 0.3))
            } else {
                Stroke::new(width, LINK_COLOR)
            };
            painter.line_segment([start, end], stroke);
        }
    }

    fn paint_nodes(&self, painter: &Painter, rect: Rect, simulation: &Simulation) {
        let view = self.controller.view();
        let highlight_active = !view.highlighted.is_empty();

        for node in simulation.nodes() {
            let center = world_to_screen(rect, view, node.pos);
            let radius = (node.radius * view.zoom).max(1.5);
            if !circle_visible(rect, center, radius) {
                continue;
            }

            let base = group_color(node.group.as_deref());
            let selected = view.selected.as_deref() == Some(node.id.as_str());
            let fill = if selected {
                SELECTED_COLOR
            } else if view.highlighted.contains(&node.id) {
                blend_color(base, HIGHLIGHT_COLOR, 0.35)
            } else if highlight_active {
                dim_color(base, 0.35)
            } else {
                base
            };
            painter.circle_filled(center, radius, fill);
            if selected {
                painter.circle_stroke(center, radius + 2.0, Stroke::new(2.0, Color32::WHITE));
            } else if node.fixed.is_some() {
                painter.circle_stroke(center, radius + 1.5, Stroke::new(1.5, HIGHLIGHT_COLOR));
            }

            if shows_label(node.connections, view.zoom) {
                painter.text(
                    center + vec2(0.0, radius + 4.0),
                    Align2::CENTER_TOP,
                    truncate_label(&node.label),
                    FontId::proportional(12.0),
                    LABEL_COLOR,
                );
            }
        }
    }
}

fn paint_tooltip(painter: &Painter, rect: Rect, pointer: egui::Pos2, node: &SimNode) {
    let mut text = format!("{}\n{} connections", node.label, node.connections);
    if let Some(group) = &node.group {
        text.push_str(&format!("\n{group}"));
    }

    let galley = painter.layout_no_wrap(text, FontId::proportional(12.0), LABEL_COLOR);
    let mut origin = pointer + vec2(14.0, 14.0);
    // Flip to the other side of the pointer near the canvas edge.
    if origin.x + galley.size().x + 12.0 > rect.right() {
        origin.x = pointer.x - galley.size().x - 20.0;
    }
    if origin.y + galley.size().y + 12.0 > rect.bottom() {
        origin.y = pointer.y - galley.size().y - 20.0;
    }

    let frame = Rect::from_min_size(origin, galley.size()).expand(6.0);
    painter.rect_filled(frame, 4.0, Color32::from_rgba_unmultiplied(15, 18, 24, 235));
    painter.galley(origin, galley, LABEL_COLOR);
}

use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use crate::interaction::ViewState;
use crate::util::stable_unit;

const GROUP_PALETTE: [Color32; 8] = [
    Color32::from_rgb(96, 165, 250),
    Color32::from_rgb(52, 211, 153),
    Color32::from_rgb(251, 191, 36),
    Color32::from_rgb(244, 114, 182),
    Color32::from_rgb(167, 139, 250),
    Color32::from_rgb(45, 212, 191),
    Color32::from_rgb(251, 146, 60),
    Color32::from_rgb(163, 230, 53),
];
pub(super) const UNGROUPED_COLOR: Color32 = Color32::from_rgb(148, 163, 184);
pub(super) const HIGHLIGHT_COLOR: Color32 = Color32::from_rgb(255, 164, 101);
pub(super) const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;
    let mix = |a: u8, b: u8| ((a as f32 * inverse) + (b as f32 * amount)) as u8;

    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

/// Darkens toward black; alpha fades more gently so dimmed shapes stay legible.
pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    let scale = |channel: u8, by: f32| (channel as f32 * by) as u8;
    Color32::from_rgba_unmultiplied(
        scale(color.r(), factor),
        scale(color.g(), factor),
        scale(color.b(), factor),
        scale(color.a(), 0.45 + (factor * 0.55)),
    )
}

/// Stable color per folder.
pub(super) fn group_color(group: Option<&str>) -> Color32 {
    match group {
        Some(group) => {
            let slot = (stable_unit(group) * GROUP_PALETTE.len() as f32) as usize;
            GROUP_PALETTE[slot.min(GROUP_PALETTE.len() - 1)]
        }
        None => UNGROUPED_COLOR,
    }
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, view: &ViewState) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * view.zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.min + view.pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;
    if max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom() {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ];
    (0..4).any(|side| segments_intersect(start, end, corners[side], corners[(side + 1) % 4]))
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    if !Rect::from_two_pos(a1, a2).intersects(Rect::from_two_pos(b1, b2)) {
        return false;
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

pub(super) fn world_to_screen(rect: Rect, view: &ViewState, world: Vec2) -> Pos2 {
    rect.min + view.to_screen(world)
}

pub(super) fn screen_to_world(rect: Rect, view: &ViewState, screen: Pos2) -> Vec2 {
    view.to_world(screen - rect.min)
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};

    use super::*;

    fn canvas() -> Rect {
        Rect::from_min_size(pos2(100.0, 50.0), vec2(800.0, 600.0))
    }

    #[test]
    fn identity_view_maps_layout_onto_the_canvas() {
        let view = ViewState::default();
        assert_eq!(world_to_screen(canvas(), &view, vec2(400.0, 300.0)), pos2(500.0, 350.0));
    }

    #[test]
    fn zoomed_view_inverts_cleanly() {
        let view = ViewState {
            zoom: 2.5,
            pan: vec2(-120.0, 40.0),
            ..ViewState::default()
        };
        let screen = world_to_screen(canvas(), &view, vec2(10.0, 20.0));
        assert!((screen_to_world(canvas(), &view, screen) - vec2(10.0, 20.0)).length() < 1e-3);
    }

    #[test]
    fn edges_crossing_the_canvas_are_kept() {
        let rect = canvas();
        assert!(edge_visible(rect, pos2(0.0, 300.0), pos2(2000.0, 300.0), 1.0));
        assert!(!edge_visible(rect, pos2(0.0, 0.0), pos2(50.0, 10.0), 1.0));
        assert!(circle_visible(rect, pos2(95.0, 60.0), 10.0));
        assert!(!circle_visible(rect, pos2(50.0, 60.0), 10.0));
    }

    #[test]
    fn folders_get_stable_colors() {
        assert_eq!(group_color(Some("inbox")), group_color(Some("inbox")));
        assert_eq!(group_color(None), UNGROUPED_COLOR);
    }
}

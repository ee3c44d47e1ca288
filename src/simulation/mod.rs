mod forces;
mod quadtree;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use eframe::egui::{Vec2, vec2};
use tracing::debug;

use crate::graph::GraphNode;
use crate::lod::VisibleGraph;
use forces::{accumulate_charge, accumulate_collisions, apply_center, apply_links};
use quadtree::QuadTree;

/// Energy a drag keeps the layout at, and the nudge a resize gives it.
const WARM_ALPHA: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationParams {
    pub link_distance: f32,
    pub link_strength: f32,
    pub charge: f32,
    pub collide_radius: f32,
    pub theta: f32,
    /// Fraction of velocity kept per tick.
    pub velocity_retention: f32,
    pub alpha_min: f32,
    pub alpha_decay: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        let alpha_min = 0.001_f32;
        Self {
            link_distance: 100.0,
            link_strength: 0.5,
            charge: -300.0,
            collide_radius: 25.0,
            theta: 0.9,
            velocity_retention: 0.6,
            alpha_min,
            // Cools from 1 to `alpha_min` in about 300 ticks.
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimNode {
    pub id: String,
    pub label: String,
    pub group: Option<String>,
    pub connections: u32,
    pub radius: f32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Pinned position while dragged.
    pub fixed: Option<Vec2>,
}

impl SimNode {
    fn from_graph(node: &GraphNode, pos: Vec2) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            group: node.group.clone(),
            connections: node.connection_count(),
            radius: node.radius(),
            pos,
            vel: Vec2::ZERO,
            fixed: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(id: &str, pos: Vec2) -> Self {
        Self {
            id: id.to_owned(),
            label: id.to_owned(),
            group: None,
            connections: 0,
            radius: 8.0,
            pos,
            vel: Vec2::ZERO,
            fixed: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimLink {
    pub source: usize,
    pub target: usize,
}

/// Positions after one tick, pushed to every [`TickListener`].
pub struct TickFrame<'a> {
    pub nodes: &'a [SimNode],
    pub links: &'a [SimLink],
    pub alpha: f32,
    pub elapsed: Duration,
}

pub trait TickListener {
    fn on_tick(&mut self, frame: TickFrame<'_>);
}

impl<F> TickListener for F
where
    F: FnMut(TickFrame<'_>),
{
    fn on_tick(&mut self, frame: TickFrame<'_>) {
        self(frame)
    }
}

/// One force layout over a visible subset. Owned by a view; a rebuild
/// consumes the previous instance so two never tick the same node set.
pub struct Simulation {
    params: SimulationParams,
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    degrees: Vec<usize>,
    index_of: HashMap<String, usize>,
    center: Vec2,
    alpha: f32,
    alpha_target: f32,
    running: bool,
    positions: Vec<Vec2>,
    nudges: Vec<Vec2>,
}

fn phyllotaxis(index: usize) -> Vec2 {
    let radius = 10.0 * (0.5 + index as f32).sqrt();
    let angle = index as f32 * std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    vec2(angle.cos(), angle.sin()) * radius
}

impl Simulation {
    pub fn new(params: SimulationParams, graph: &VisibleGraph, size: Vec2) -> Self {
        Self::seeded(params, graph, size * 0.5, &HashMap::new())
    }

    fn seeded(
        params: SimulationParams,
        graph: &VisibleGraph,
        center: Vec2,
        carried: &HashMap<String, SimNode>,
    ) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| match carried.get(&node.id) {
                Some(previous) => SimNode {
                    pos: previous.pos,
                    vel: previous.vel,
                    fixed: previous.fixed,
                    ..SimNode::from_graph(node, previous.pos)
                },
                None => SimNode::from_graph(node, center + phyllotaxis(index)),
            })
            .collect::<Vec<_>>();

        let links = graph
            .links
            .iter()
            .filter(|(source, target)| *source < nodes.len() && *target < nodes.len())
            .map(|&(source, target)| SimLink { source, target })
            .collect::<Vec<_>>();

        let mut degrees = vec![0; nodes.len()];
        for link in &links {
            degrees[link.source] += 1;
            degrees[link.target] += 1;
        }

        let mut index_of = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            index_of.entry(node.id.clone()).or_insert(index);
        }

        let dragging = nodes.iter().any(|node| node.fixed.is_some());
        debug!(
            nodes = nodes.len(),
            links = links.len(),
            carried = carried.len(),
            "simulation built"
        );

        Self {
            params,
            nodes,
            links,
            degrees,
            index_of,
            center,
            alpha: 1.0,
            alpha_target: if dragging { WARM_ALPHA } else { 0.0 },
            running: true,
            positions: Vec::new(),
            nudges: Vec::new(),
        }
    }

    /// Stops this instance and starts a new one over `graph`, keeping the
    /// positions, velocities and pins of nodes that are still visible.
    pub fn rebuild(mut self, graph: &VisibleGraph) -> Self {
        self.stop();
        let carried = self
            .nodes
            .drain(..)
            .map(|node| (node.id.clone(), node))
            .collect::<HashMap<_, _>>();
        Self::seeded(self.params, graph, self.center, &carried)
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn restart(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[cfg(test)]
    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[SimLink] {
        &self.links
    }

    /// Laid-out links as `(source, target)` node ids.
    pub fn link_ids(&self) -> impl Iterator<Item = (&str, &str)> + Clone + '_ {
        self.links.iter().map(|link| {
            (
                self.nodes[link.source].id.as_str(),
                self.nodes[link.target].id.as_str(),
            )
        })
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_of.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&SimNode> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    /// Topmost node whose disc contains `point` (world coordinates).
    pub fn node_at(&self, point: Vec2) -> Option<&SimNode> {
        self.nodes
            .iter()
            .rev()
            .find(|node| (node.pos - point).length_sq() <= node.radius * node.radius)
    }

    /// Re-centers on a new viewport and lets the layout resettle.
    pub fn resize(&mut self, size: Vec2) {
        let center = size * 0.5;
        if (center - self.center).length_sq() < 0.25 {
            return;
        }
        debug!(width = size.x, height = size.y, "simulation re-centered");
        self.center = center;
        self.alpha = WARM_ALPHA;
        self.restart();
    }

    pub fn drag_start(&mut self, id: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let node = &mut self.nodes[index];
        node.fixed = Some(node.pos);
        self.alpha_target = WARM_ALPHA;
        self.restart();
        true
    }

    pub fn drag_to(&mut self, id: &str, point: Vec2) {
        if let Some(index) = self.index_of(id) {
            self.nodes[index].fixed = Some(point);
        }
    }

    pub fn drag_end(&mut self, id: &str) {
        if let Some(index) = self.index_of(id) {
            self.nodes[index].fixed = None;
        }
        self.alpha_target = 0.0;
    }

    pub fn tick(&mut self) -> bool {
        self.tick_with(&mut |_: TickFrame<'_>| {})
    }

    /// Advances one step and notifies `listener`. Returns `false` once cooled.
    pub fn tick_with(&mut self, listener: &mut impl TickListener) -> bool {
        if !self.running {
            return false;
        }

        let started = Instant::now();
        self.step();
        listener.on_tick(TickFrame {
            nodes: &self.nodes,
            links: &self.links,
            alpha: self.alpha,
            elapsed: started.elapsed(),
        });

        if self.alpha < self.params.alpha_min {
            debug!("simulation cooled");
            self.running = false;
        }
        true
    }

    fn step(&mut self) {
        let params = self.params;
        self.alpha += (self.alpha_target - self.alpha) * params.alpha_decay;
        let alpha = self.alpha;

        apply_links(
            &mut self.nodes,
            &self.links,
            &self.degrees,
            params.link_distance,
            params.link_strength,
            alpha,
        );

        self.positions.clear();
        self.positions.extend(self.nodes.iter().map(|node| node.pos));
        if let Some(tree) = QuadTree::build(&self.positions) {
            for (index, node) in self.nodes.iter_mut().enumerate() {
                accumulate_charge(
                    &tree,
                    index,
                    &self.positions,
                    params.charge * alpha,
                    params.theta,
                    &mut node.vel,
                );
            }
        }

        apply_center(&mut self.nodes, self.center);

        self.positions.clear();
        self.positions
            .extend(self.nodes.iter().map(|node| node.pos + node.vel));
        self.nudges.clear();
        self.nudges.resize(self.nodes.len(), Vec2::ZERO);
        if let Some(tree) = QuadTree::build(&self.positions) {
            accumulate_collisions(
                &tree,
                &self.positions,
                params.collide_radius,
                &mut self.nudges,
            );
        }

        for (node, nudge) in self.nodes.iter_mut().zip(&self.nudges) {
            node.vel += *nudge;
            match node.fixed {
                Some(fixed) => {
                    node.pos = fixed;
                    node.vel = Vec2::ZERO;
                }
                None => {
                    node.vel *= params.velocity_retention;
                    node.pos += node.vel;
                }
            }
        }
    }
}

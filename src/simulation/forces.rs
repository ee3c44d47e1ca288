use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadTree;
use super::{SimLink, SimNode};

/// Deterministic unit direction for coincident points.
fn nudge_direction(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214 + 0.37) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

/// Springs toward `distance`, split between endpoints by degree so hubs move less.
pub(super) fn apply_links(
    nodes: &mut [SimNode],
    links: &[SimLink],
    degrees: &[usize],
    distance: f32,
    strength: f32,
    alpha: f32,
) {
    for link in links {
        let (source, target) = (link.source, link.target);
        if source == target {
            continue;
        }

        let mut delta = (nodes[target].pos + nodes[target].vel) - (nodes[source].pos + nodes[source].vel);
        if delta.length_sq() < 1e-12 {
            delta = nudge_direction(source, target) * 1e-3;
        }
        let length = delta.length();
        let correction = delta * ((length - distance) / length * alpha * strength);

        let source_degree = degrees[source] as f32;
        let bias = source_degree / (source_degree + degrees[target] as f32);
        nodes[target].vel -= correction * bias;
        nodes[source].vel += correction * (1.0 - bias);
    }
}

/// Many-body charge with Barnes-Hut approximation; negative strength repels.
pub(super) fn accumulate_charge(
    tree: &QuadTree,
    index: usize,
    positions: &[Vec2],
    strength: f32,
    theta: f32,
    velocity: &mut Vec2,
) {
    let point = positions[index];
    tree.visit(|cell| {
        if cell.is_leaf() {
            for &other in tree.points(cell) {
                if other != index {
                    *velocity += charge_between(point, positions[other], strength, index, other);
                }
            }
            return false;
        }

        let delta = cell.center_of_mass - point;
        let distance_sq = delta.length_sq();
        let side = cell.bounds.side_length();
        let far_enough =
            !cell.bounds.contains(point) && distance_sq > 0.0 && side * side < theta * theta * distance_sq;
        if far_enough {
            *velocity += delta * (strength * cell.mass / distance_sq.max(1.0));
        }
        !far_enough
    });
}

fn charge_between(point: Vec2, other: Vec2, strength: f32, index: usize, other_index: usize) -> Vec2 {
    let mut delta = other - point;
    if delta.length_sq() < 1e-12 {
        delta = nudge_direction(index, other_index) * 1e-3;
    }
    let distance_sq = delta.length_sq();
    // Clamp like a minimum distance of one unit.
    let distance_sq = if distance_sq < 1.0 {
        distance_sq.sqrt()
    } else {
        distance_sq
    };
    delta * (strength / distance_sq)
}

/// Shifts every node so the centroid lands on `center`.
pub(super) fn apply_center(nodes: &mut [SimNode], center: Vec2) {
    if nodes.is_empty() {
        return;
    }
    let centroid = nodes.iter().fold(Vec2::ZERO, |sum, node| sum + node.pos) / nodes.len() as f32;
    let shift = center - centroid;
    for node in nodes {
        node.pos += shift;
    }
}

/// Pushes apart pairs whose predicted positions are closer than `2 * radius`.
/// Each node walks only the cells within reach and handles higher indices,
/// so every pair is separated once.
pub(super) fn accumulate_collisions(
    tree: &QuadTree,
    predicted: &[Vec2],
    radius: f32,
    nudges: &mut [Vec2],
) {
    let min_distance = radius * 2.0;
    for (index, &point) in predicted.iter().enumerate() {
        tree.visit(|cell| {
            if cell.bounds.distance_sq_to(point) > min_distance * min_distance {
                return false;
            }
            if cell.is_leaf() {
                for &other in tree.points(cell) {
                    if other > index {
                        separate(index, other, predicted, min_distance, nudges);
                    }
                }
            }
            true
        });
    }
}

fn separate(from: usize, to: usize, predicted: &[Vec2], min_distance: f32, nudges: &mut [Vec2]) {
    let delta = predicted[from] - predicted[to];
    let distance = delta.length();
    if distance >= min_distance {
        return;
    }
    let direction = if distance > 1e-4 {
        delta / distance
    } else {
        nudge_direction(from, to)
    };
    // Equal radii: each side takes half of the overlap.
    let push = direction * ((min_distance - distance) * 0.5);
    nudges[from] += push;
    nudges[to] -= push;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_at(x: f32, y: f32) -> SimNode {
        SimNode::detached("n", vec2(x, y))
    }

    #[test]
    fn link_pulls_distant_endpoints_together() {
        let mut nodes = vec![node_at(0.0, 0.0), node_at(300.0, 0.0)];
        let links = [SimLink { source: 0, target: 1 }];
        apply_links(&mut nodes, &links, &[1, 1], 100.0, 0.5, 1.0);

        assert!(nodes[0].vel.x > 0.0);
        assert!(nodes[1].vel.x < 0.0);
        assert!((nodes[0].vel.x + nodes[1].vel.x).abs() < 1e-3);
    }

    #[test]
    fn hub_endpoint_moves_less() {
        let mut nodes = vec![node_at(0.0, 0.0), node_at(300.0, 0.0)];
        let links = [SimLink { source: 0, target: 1 }];
        apply_links(&mut nodes, &links, &[1, 9], 100.0, 0.5, 1.0);

        assert!(nodes[1].vel.x.abs() < nodes[0].vel.x.abs());
    }

    #[test]
    fn negative_charge_repels() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let tree = QuadTree::build(&positions).unwrap();
        let mut velocity = Vec2::ZERO;
        accumulate_charge(&tree, 0, &positions, -300.0, 0.9, &mut velocity);

        assert!(velocity.x < 0.0);
        assert!((velocity.x + 30.0).abs() < 1e-3);
    }

    #[test]
    fn approximation_matches_direct_sum_for_far_clusters() {
        let mut positions = (0..40)
            .map(|index| vec2((index % 8) as f32 * 2.0, (index / 8) as f32 * 2.0) + vec2(1000.0, 0.0))
            .collect::<Vec<_>>();
        positions.push(Vec2::ZERO);
        let lone = positions.len() - 1;
        let tree = QuadTree::build(&positions).unwrap();

        let mut approximate = Vec2::ZERO;
        accumulate_charge(&tree, lone, &positions, -300.0, 0.9, &mut approximate);
        let direct = (0..lone).fold(Vec2::ZERO, |sum, other| {
            sum + charge_between(positions[lone], positions[other], -300.0, lone, other)
        });

        assert!((approximate - direct).length() / direct.length() < 0.05);
    }

    #[test]
    fn centering_moves_the_centroid() {
        let mut nodes = vec![node_at(0.0, 0.0), node_at(10.0, 20.0)];
        apply_center(&mut nodes, vec2(400.0, 300.0));
        let centroid = (nodes[0].pos + nodes[1].pos) * 0.5;
        assert!((centroid - vec2(400.0, 300.0)).length() < 1e-3);
        assert_eq!(nodes[1].pos - nodes[0].pos, vec2(10.0, 20.0));
    }

    #[test]
    fn overlapping_pairs_are_separated_symmetrically() {
        let predicted = vec![vec2(0.0, 0.0), vec2(20.0, 0.0), vec2(500.0, 0.0)];
        let tree = QuadTree::build(&predicted).unwrap();
        let mut nudges = vec![Vec2::ZERO; 3];
        accumulate_collisions(&tree, &predicted, 25.0, &mut nudges);

        assert_eq!(nudges[0], vec2(-15.0, 0.0));
        assert_eq!(nudges[1], vec2(15.0, 0.0));
        assert_eq!(nudges[2], Vec2::ZERO);
    }

    #[test]
    fn crowded_cluster_matches_pairwise_separation() {
        let predicted = (0..60)
            .map(|index| vec2((index % 10) as f32 * 7.0, (index / 10) as f32 * 9.0))
            .collect::<Vec<_>>();
        let tree = QuadTree::build(&predicted).unwrap();
        let mut nudges = vec![Vec2::ZERO; predicted.len()];
        accumulate_collisions(&tree, &predicted, 25.0, &mut nudges);

        let mut pairwise = vec![Vec2::ZERO; predicted.len()];
        for from in 0..predicted.len() {
            for to in from + 1..predicted.len() {
                separate(from, to, &predicted, 50.0, &mut pairwise);
            }
        }
        for (tree_nudge, pair_nudge) in nudges.iter().zip(&pairwise) {
            assert!((*tree_nudge - *pair_nudge).length() < 1e-2);
        }
    }
}

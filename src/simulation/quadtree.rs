use std::ops::Range;

use eframe::egui::{Vec2, vec2};

/// Cells holding at most this many points are not split.
const SPLIT_THRESHOLD: usize = 8;
const MAX_DEPTH: u32 = 12;

/// Axis-aligned square region of the layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct QuadBounds {
    min: Vec2,
    size: f32,
}

impl QuadBounds {
    /// Square around `points` with a unit margin; `None` for no points or
    /// any non-finite coordinate.
    fn around(points: &[Vec2]) -> Option<Self> {
        if points.is_empty() || !points.iter().all(|point| point.is_finite()) {
            return None;
        }
        let (lo, hi) = points
            .iter()
            .fold((points[0], points[0]), |(lo, hi), point| {
                (lo.min(*point), hi.max(*point))
            });

        let size = (hi - lo).max_elem().max(1.0) + 2.0;
        Some(Self {
            min: (lo + hi) * 0.5 - Vec2::splat(size * 0.5),
            size,
        })
    }

    pub(super) fn center(self) -> Vec2 {
        self.min + Vec2::splat(self.size * 0.5)
    }

    pub(super) fn side_length(self) -> f32 {
        self.size
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let local = point - self.min;
        local.x >= 0.0 && local.y >= 0.0 && local.x <= self.size && local.y <= self.size
    }

    /// Squared distance from `point` to the nearest edge; zero inside.
    pub(super) fn distance_sq_to(self, point: Vec2) -> f32 {
        let outside = (point - self.center()).abs() - Vec2::splat(self.size * 0.5);
        outside.max(Vec2::ZERO).length_sq()
    }

    /// Bit 0 is east, bit 1 is south.
    fn quadrant_of(self, point: Vec2) -> usize {
        let center = self.center();
        usize::from(point.x >= center.x) | (usize::from(point.y >= center.y) << 1)
    }

    fn quadrant(self, quadrant: usize) -> Self {
        let half = self.size * 0.5;
        let step = vec2((quadrant & 1) as f32, (quadrant >> 1) as f32) * half;
        Self {
            min: self.min + step,
            size: half,
        }
    }
}

#[derive(Clone, Debug)]
pub(super) struct Cell {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Vec2,
    /// Points under the cell.
    pub(super) mass: f32,
    points: Range<usize>,
    children: Range<usize>,
}

impl Cell {
    fn empty(bounds: QuadBounds) -> Self {
        Self {
            bounds,
            center_of_mass: Vec2::ZERO,
            mass: 0.0,
            points: 0..0,
            children: 0..0,
        }
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Barnes-Hut tree over one snapshot of node positions. Cells live in a
/// flat arena and the points under any cell are a contiguous run of `order`,
/// so rebuilding every tick allocates two vectors.
pub(super) struct QuadTree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

impl QuadTree {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let bounds = QuadBounds::around(positions)?;
        let mut tree = Self {
            cells: Vec::with_capacity(positions.len() / 2 + 1),
            order: (0..positions.len()).collect(),
        };
        tree.cells.push(Cell::empty(bounds));
        tree.fill(0, 0..positions.len(), positions, 0);
        Some(tree)
    }

    fn fill(&mut self, cell: usize, points: Range<usize>, positions: &[Vec2], depth: u32) {
        let bounds = self.cells[cell].bounds;
        let run = &mut self.order[points.clone()];
        let mass = run.len() as f32;
        let sum = run
            .iter()
            .fold(Vec2::ZERO, |sum, &index| sum + positions[index]);

        let mut counts = [0usize; 4];
        for &index in run.iter() {
            counts[bounds.quadrant_of(positions[index])] += 1;
        }
        // Coincident points cannot be separated by splitting.
        let splits = depth < MAX_DEPTH
            && run.len() > SPLIT_THRESHOLD
            && counts.iter().filter(|&&count| count > 0).count() > 1;
        if splits {
            run.sort_unstable_by_key(|&index| bounds.quadrant_of(positions[index]));
        }

        let target = &mut self.cells[cell];
        target.mass = mass;
        target.center_of_mass = sum / mass.max(1.0);
        target.points = points.clone();
        if !splits {
            return;
        }

        let first_child = self.cells.len();
        let mut spans = Vec::with_capacity(4);
        let mut start = points.start;
        for (quadrant, count) in counts.into_iter().enumerate() {
            if count > 0 {
                self.cells.push(Cell::empty(bounds.quadrant(quadrant)));
                spans.push(start..start + count);
                start += count;
            }
        }
        self.cells[cell].children = first_child..self.cells.len();

        for (offset, span) in spans.into_iter().enumerate() {
            self.fill(first_child + offset, span, positions, depth + 1);
        }
    }

    #[cfg(test)]
    fn root(&self) -> &Cell {
        &self.cells[0]
    }

    #[cfg(test)]
    fn children(&self, cell: &Cell) -> &[Cell] {
        &self.cells[cell.children.clone()]
    }

    /// Every point under `cell`, leaf or not.
    pub(super) fn points(&self, cell: &Cell) -> &[usize] {
        &self.order[cell.points.clone()]
    }

    /// Depth-first walk from the root; `visit` returns whether to descend.
    pub(super) fn visit<'a>(&'a self, mut visit: impl FnMut(&'a Cell) -> bool) {
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            let cell = &self.cells[index];
            if visit(cell) {
                stack.extend(cell.children.clone().rev());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spiral(count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|index| {
                let angle = index as f32 * 0.7;
                vec2(angle.cos(), angle.sin()) * (index as f32 * 3.0)
            })
            .collect()
    }

    fn leaves(tree: &QuadTree) -> Vec<&Cell> {
        let mut leaves = Vec::new();
        tree.visit(|cell| {
            if cell.is_leaf() {
                leaves.push(cell);
            }
            true
        });
        leaves
    }

    #[test]
    fn leaves_partition_the_points_inside_their_bounds() {
        let positions = spiral(200);
        let tree = QuadTree::build(&positions).unwrap();

        let mut seen = leaves(&tree)
            .into_iter()
            .flat_map(|leaf| {
                for &index in tree.points(leaf) {
                    assert!(leaf.bounds.contains(positions[index]));
                }
                tree.points(leaf).iter().copied()
            })
            .collect::<Vec<_>>();
        seen.sort_unstable();

        assert_eq!(seen, (0..200).collect::<Vec<_>>());
        assert_eq!(tree.root().mass, 200.0);
        assert!(!tree.root().is_leaf());
    }

    #[test]
    fn inner_cells_cover_their_children() {
        let positions = spiral(120);
        let tree = QuadTree::build(&positions).unwrap();

        tree.visit(|cell| {
            let children = tree.children(cell);
            if !children.is_empty() {
                let mass = children.iter().map(|child| child.mass).sum::<f32>();
                assert_eq!(mass, cell.mass);
                assert_eq!(tree.points(cell).len(), cell.mass as usize);
                let weighted = children
                    .iter()
                    .fold(Vec2::ZERO, |sum, child| sum + child.center_of_mass * child.mass);
                assert!((weighted / cell.mass - cell.center_of_mass).length() < 1e-2);
            }
            true
        });
    }

    #[test]
    fn pruned_cells_are_not_descended() {
        let positions = spiral(200);
        let tree = QuadTree::build(&positions).unwrap();

        let mut visited = 0;
        tree.visit(|_| {
            visited += 1;
            false
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn coincident_points_stay_in_one_leaf() {
        let positions = vec![vec2(5.0, 5.0); 20];
        let tree = QuadTree::build(&positions).unwrap();
        assert!(tree.root().is_leaf());
        assert_eq!(tree.points(tree.root()).len(), 20);
        assert_eq!(tree.root().center_of_mass, vec2(5.0, 5.0));
    }

    #[test]
    fn empty_or_non_finite_input_builds_nothing() {
        assert!(QuadTree::build(&[]).is_none());
        assert!(QuadTree::build(&[vec2(0.0, 0.0), vec2(f32::NAN, 0.0)]).is_none());
    }

    #[test]
    fn distance_to_a_cell_is_zero_inside() {
        let bounds = QuadBounds::around(&[vec2(0.0, 0.0), vec2(10.0, 10.0)]).unwrap();
        assert_eq!(bounds.distance_sq_to(vec2(5.0, 5.0)), 0.0);
        assert!((bounds.distance_sq_to(vec2(14.0, 5.0)) - 9.0).abs() < 1e-4);
    }
}

//! Initial fixed grid the quadtree reset stage lays down each frame

use super::bounds::NodeBounds;
use super::node::{Direction, NodeIndex, QuadTreeNode, NO_NODE};

/// A `columns x rows` grid over `bounds`. Row 0 is the top row and cell
/// `(column, row)` lives at node index `row * columns + column`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitialGrid {
    pub columns: u32,
    pub rows: u32,
    pub bounds: NodeBounds,
}

impl InitialGrid {
    pub fn new(columns: u32, rows: u32, bounds: NodeBounds) -> Self {
        Self {
            columns,
            rows,
            bounds,
        }
    }

    pub fn node_count(&self) -> u32 {
        self.columns.saturating_mul(self.rows)
    }

    fn cell_size(&self) -> (f32, f32) {
        (
            self.bounds.width() / self.columns as f32,
            self.bounds.height() / self.rows as f32,
        )
    }

    /// Bounds of one cell. Neighbouring cells share their edge value exactly
    /// and the outer cells end on the grid bounds.
    pub fn cell_bounds(&self, column: u32, row: u32) -> NodeBounds {
        let (w, h) = self.cell_size();
        let b = self.bounds;
        let left = b.left + column as f32 * w;
        let right = if column + 1 >= self.columns {
            b.right
        } else {
            b.left + (column + 1) as f32 * w
        };
        let top = b.top - row as f32 * h;
        let bottom = if row + 1 >= self.rows {
            b.bottom
        } else {
            b.top - (row + 1) as f32 * h
        };
        NodeBounds::new(left, top, right, bottom)
    }

    pub fn cell_index(&self, column: u32, row: u32) -> NodeIndex {
        NodeIndex(row * self.columns + column)
    }

    pub fn cell_of(&self, index: NodeIndex) -> (u32, u32) {
        (index.0 % self.columns, index.0 / self.columns)
    }

    /// Neighbour slots of a cell; cells past the grid edge are unset
    pub fn neighbours(&self, column: u32, row: u32) -> [u32; 8] {
        let mut neighbours = [NO_NODE; 8];
        for direction in Direction::ALL {
            let (dc, dr) = direction.offset();
            let c = column as i64 + dc;
            let r = row as i64 + dr;
            if c >= 0 && r >= 0 && c < self.columns as i64 && r < self.rows as i64 {
                neighbours[direction as usize] = self.cell_index(c as u32, r as u32).0;
            }
        }
        neighbours
    }

    /// The record the reset stage writes for grid node `index`
    pub fn node(&self, index: NodeIndex) -> QuadTreeNode {
        if index.0 >= self.node_count() {
            return QuadTreeNode::unused();
        }
        let (column, row) = self.cell_of(index);
        QuadTreeNode::leaf(self.cell_bounds(column, row), self.neighbours(column, row))
    }

    /// Grid cell a populate walk starts from, or `None` outside the grid.
    ///
    /// The division can land one cell off near an edge, so the guess is nudged
    /// against the stored cell bounds.
    pub fn locate(&self, point: [f32; 2]) -> Option<NodeIndex> {
        if !self.bounds.contains(point) {
            return None;
        }
        let (w, h) = self.cell_size();
        let clamp = |value: f32, cells: u32| (value.max(0.0) as u32).min(cells - 1);
        let mut column = clamp(((point[0] - self.bounds.left) / w).floor(), self.columns);
        let mut row = clamp(((self.bounds.top - point[1]) / h).floor(), self.rows);

        let cell = self.cell_bounds(column, row);
        if point[0] < cell.left && column > 0 {
            column -= 1;
        } else if point[0] > cell.right && column + 1 < self.columns {
            column += 1;
        }
        if point[1] > cell.top && row > 0 {
            row -= 1;
        } else if point[1] < cell.bottom && row + 1 < self.rows {
            row += 1;
        }
        Some(self.cell_index(column, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_4x4() -> InitialGrid {
        InitialGrid::new(4, 4, NodeBounds::new(-1.0, 1.0, 1.0, -1.0))
    }

    #[test]
    fn test_cells_tile_grid() {
        let grid = grid_4x4();
        assert_eq!(grid.cell_bounds(0, 0), NodeBounds::new(-1.0, 1.0, -0.5, 0.5));
        assert_eq!(grid.cell_bounds(3, 3), NodeBounds::new(0.5, -0.5, 1.0, -1.0));
        assert_eq!(grid.cell_bounds(1, 0).left, grid.cell_bounds(0, 0).right);
    }

    #[test]
    fn test_locate_finds_containing_cell() {
        let grid = grid_4x4();
        let points = [[-0.9, 0.9], [0.0, 0.0], [1.0, -1.0], [-1.0, 1.0], [0.49, -0.51]];
        for point in points {
            let index = grid.locate(point).unwrap();
            let (column, row) = grid.cell_of(index);
            assert!(grid.cell_bounds(column, row).contains(point), "{:?}", point);
        }
        assert_eq!(grid.locate([1.5, 0.0]), None);
    }

    #[test]
    fn test_single_cell_grid_is_root() {
        let grid = InitialGrid::new(1, 1, NodeBounds::new(0.0, 1.0, 1.0, 0.0));
        assert_eq!(grid.locate([0.3, 0.7]), Some(NodeIndex::ROOT));
        assert_eq!(grid.neighbours(0, 0), [NO_NODE; 8]);
    }

    #[test]
    fn test_corner_cell_neighbours() {
        let grid = grid_4x4();
        let n = grid.neighbours(0, 0);
        assert_eq!(n[Direction::East as usize], 1);
        assert_eq!(n[Direction::South as usize], 4);
        assert_eq!(n[Direction::SouthEast as usize], 5);
        assert_eq!(n[Direction::North as usize], NO_NODE);
        assert_eq!(n[Direction::West as usize], NO_NODE);
    }

    #[test]
    fn test_nodes_past_grid_are_unused() {
        let grid = grid_4x4();
        assert!(grid.node(NodeIndex(15)).is_leaf());
        assert!(!grid.node(NodeIndex(16)).is_in_use());
    }

    #[test]
    fn test_oversized_grid_count_saturates() {
        let grid = InitialGrid::new(70_000, 70_000, NodeBounds::new(-1.0, 1.0, 1.0, -1.0));
        assert_eq!(grid.node_count(), u32::MAX);
    }
}

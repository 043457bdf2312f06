use crate::{PursuitError, PursuitResult};
use std::fmt;

/// Integer (column, row) address of a grid cell.
///
/// Signed so that neighbor arithmetic and world rounding can land off the
/// grid; [`Grid::contains`] decides whether a coordinate is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridCoordinate {
    pub col: i32,
    pub row: i32,
}

impl GridCoordinate {
    pub const fn new(col: i32, row: i32) -> Self {
        GridCoordinate { col, row }
    }

    /// Straight-line distance between two cells, in cells.
    pub fn distance(&self, other: &GridCoordinate) -> f32 {
        let dx = (self.col - other.col) as f32;
        let dy = (self.row - other.row) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan_distance(&self, other: &GridCoordinate) -> u32 {
        self.col.abs_diff(other.col) + self.row.abs_diff(other.row)
    }

    /// The four axis-aligned neighbors in the order +col, -col, +row, -row.
    /// Bounds are not checked.
    pub fn adjacent(&self) -> [GridCoordinate; 4] {
        [
            GridCoordinate::new(self.col + 1, self.row),
            GridCoordinate::new(self.col - 1, self.row),
            GridCoordinate::new(self.col, self.row + 1),
            GridCoordinate::new(self.col, self.row - 1),
        ]
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// A point in world space. `x` and `z` are the horizontal axes; `y` is the
/// vertical agent-height offset and never takes part in pathfinding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPosition {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        WorldPosition { x, y, z }
    }

    pub fn distance(&self, other: &WorldPosition) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance on the horizontal plane only.
    pub fn horizontal_distance(&self, other: &WorldPosition) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Equal within floating point noise (squared distance below 1e-10).
    pub fn approx_eq(&self, other: &WorldPosition) -> bool {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz < 1e-10
    }
}

impl fmt::Display for WorldPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Fixed-size grid layout. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    cell_spacing: f32,
    agent_height: f32,
}

impl Grid {
    /// Builds a grid of `width` x `height` cells whose centers are
    /// `cell_spacing` apart. `agent_height` is the vertical coordinate given
    /// to every world position produced by [`Grid::grid_to_world`].
    pub fn new(
        width: usize,
        height: usize,
        cell_spacing: f32,
        agent_height: f32,
    ) -> PursuitResult<Self> {
        if width == 0 || height == 0 {
            return Err(PursuitError::InvalidConfig(format!(
                "grid must have at least one cell, got {}x{}",
                width, height
            )));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(PursuitError::InvalidConfig(format!(
                "grid {}x{} is too large",
                width, height
            )));
        }
        if !cell_spacing.is_finite() || cell_spacing <= 0.0 {
            return Err(PursuitError::InvalidConfig(format!(
                "cell spacing must be positive, got {}",
                cell_spacing
            )));
        }
        if !agent_height.is_finite() {
            return Err(PursuitError::InvalidConfig(format!(
                "agent height must be finite, got {}",
                agent_height
            )));
        }

        Ok(Grid {
            width,
            height,
            cell_spacing,
            agent_height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_spacing(&self) -> f32 {
        self.cell_spacing
    }

    pub fn agent_height(&self) -> f32 {
        self.agent_height
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn contains(&self, coord: GridCoordinate) -> bool {
        coord.col >= 0
            && coord.row >= 0
            && (coord.col as usize) < self.width
            && (coord.row as usize) < self.height
    }

    /// Rounds each horizontal axis to the nearest cell. Ties round to even,
    /// so a position exactly between two cells maps deterministically.
    /// The result is not clamped to the grid.
    pub fn world_to_grid(&self, position: WorldPosition) -> GridCoordinate {
        let col = (position.x / self.cell_spacing).round_ties_even();
        let row = (position.z / self.cell_spacing).round_ties_even();
        GridCoordinate::new(col as i32, row as i32)
    }

    /// Like [`Grid::world_to_grid`], but rejects positions that fall off the grid.
    pub fn checked_world_to_grid(&self, position: WorldPosition) -> PursuitResult<GridCoordinate> {
        let coord = self.world_to_grid(position);
        if self.contains(coord) {
            Ok(coord)
        } else {
            Err(PursuitError::OutOfBounds {
                col: coord.col,
                row: coord.row,
            })
        }
    }

    pub fn grid_to_world(&self, coord: GridCoordinate) -> WorldPosition {
        WorldPosition::new(
            coord.col as f32 * self.cell_spacing,
            self.agent_height,
            coord.row as f32 * self.cell_spacing,
        )
    }

    /// In-bounds axis-aligned neighbors of `coord`, in the order
    /// +col, -col, +row, -row.
    pub fn neighbors(&self, coord: GridCoordinate) -> impl Iterator<Item = GridCoordinate> + '_ {
        coord
            .adjacent()
            .into_iter()
            .filter(move |neighbor| self.contains(*neighbor))
    }

    /// Every in-bounds cell, row by row.
    pub fn coordinates(&self) -> impl Iterator<Item = GridCoordinate> {
        let (width, height) = (self.width as i32, self.height as i32);
        (0..height).flat_map(move |row| (0..width).map(move |col| GridCoordinate::new(col, row)))
    }

    pub fn corner(&self) -> GridCoordinate {
        GridCoordinate::new(self.width as i32 - 1, self.height as i32 - 1)
    }
}

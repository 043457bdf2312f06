//! # Obstacle Layer
//!
//! The authoritative table of blocked cells. Edits are discrete events: each
//! one changes a single cell, bumps the layer version and synchronously
//! notifies every subscriber before returning.
//!
//! Searches never touch the store's mutable side. They read through the
//! [`BlockingOracle`] trait while holding a shared borrow, so an edit cannot
//! land in the middle of a search.

use crate::grid::{Grid, GridCoordinate};
use crate::{PursuitError, PursuitResult};
use log::debug;
use std::fmt;

/// Read-only view of which cells are blocked.
pub trait BlockingOracle {
    /// Cells outside the layer are reported as not blocked.
    fn is_blocked(&self, coord: GridCoordinate) -> bool;
}

/// Notification sent to subscribers after every edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObstacleChange {
    pub coord: GridCoordinate,
    pub blocked: bool,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ObstacleChange)>;

pub struct ObstacleStore {
    width: usize,
    height: usize,
    cells: Vec<bool>,
    version: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl ObstacleStore {
    /// An empty layer covering `grid`.
    pub fn new(grid: &Grid) -> Self {
        Self::with_size(grid.width(), grid.height())
    }

    pub fn with_size(width: usize, height: usize) -> Self {
        ObstacleStore {
            width,
            height,
            cells: vec![false; width * height],
            version: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Parses a layout where `#` is blocked and `.` is open. The first line
    /// is row 0 and every line must have the same length.
    pub fn from_ascii(layout: &str) -> PursuitResult<Self> {
        let rows: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let height = rows.len();
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);
        if width == 0 {
            return Err(PursuitError::InvalidLayout("layout is empty".to_string()));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != width {
                return Err(PursuitError::InvalidLayout(format!(
                    "row {} has {} cells, expected {}",
                    row,
                    line.chars().count(),
                    width
                )));
            }
            for (col, ch) in line.chars().enumerate() {
                match ch {
                    '#' => cells.push(true),
                    '.' => cells.push(false),
                    other => {
                        return Err(PursuitError::InvalidLayout(format!(
                            "unexpected '{}' at ({}, {})",
                            other, col, row
                        )))
                    }
                }
            }
        }

        let mut store = Self::with_size(width, height);
        store.cells = cells;
        Ok(store)
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.cells.chunks(self.width.max(1)) {
            out.extend(row.iter().map(|&blocked| if blocked { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of edits applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn index_of(&self, coord: GridCoordinate) -> Option<usize> {
        if coord.col < 0 || coord.row < 0 {
            return None;
        }
        let (col, row) = (coord.col as usize, coord.row as usize);
        (col < self.width && row < self.height).then(|| row * self.width + col)
    }

    pub fn is_blocked(&self, coord: GridCoordinate) -> bool {
        self.index_of(coord).map(|i| self.cells[i]).unwrap_or(false)
    }

    /// Sets one cell and notifies subscribers, even when the value does not change.
    pub fn set_obstacle(&mut self, coord: GridCoordinate, blocked: bool) -> PursuitResult<()> {
        let index = self.index_of(coord).ok_or(PursuitError::OutOfBounds {
            col: coord.col,
            row: coord.row,
        })?;
        self.write_cell(index, blocked);
        Ok(())
    }

    fn write_cell(&mut self, index: usize, blocked: bool) {
        let coord = GridCoordinate::new((index % self.width) as i32, (index / self.width) as i32);
        self.cells[index] = blocked;
        self.version += 1;
        debug!("obstacle at {} set to {} (version {})", coord, blocked, self.version);

        let change = ObstacleChange {
            coord,
            blocked,
            version: self.version,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
    }

    /// Flips one cell and returns its new state.
    pub fn toggle_obstacle(&mut self, coord: GridCoordinate) -> PursuitResult<bool> {
        let blocked = !self.is_blocked(coord);
        self.set_obstacle(coord, blocked)?;
        Ok(blocked)
    }

    /// Unblocks every blocked cell, one notification per cell.
    pub fn clear(&mut self) {
        let blocked: Vec<usize> = (0..self.cells.len()).filter(|&i| self.cells[i]).collect();
        for index in blocked {
            self.write_cell(index, false);
        }
    }

    pub fn blocked_cells(&self) -> impl Iterator<Item = GridCoordinate> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &blocked)| blocked)
            .map(move |(i, _)| GridCoordinate::new((i % width) as i32, (i / width) as i32))
    }

    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|&&blocked| blocked).count()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ObstacleChange) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Owned copy of the current layer.
    pub fn snapshot(&self) -> ObstacleSnapshot {
        ObstacleSnapshot {
            width: self.width,
            height: self.height,
            cells: self.cells.clone(),
            version: self.version,
        }
    }
}

impl BlockingOracle for ObstacleStore {
    fn is_blocked(&self, coord: GridCoordinate) -> bool {
        ObstacleStore::is_blocked(self, coord)
    }
}

impl fmt::Debug for ObstacleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObstacleStore")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("blocked", &self.blocked_count())
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Frozen copy of an [`ObstacleStore`] taken at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObstacleSnapshot {
    width: usize,
    height: usize,
    cells: Vec<bool>,
    version: u64,
}

impl ObstacleSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl BlockingOracle for ObstacleSnapshot {
    fn is_blocked(&self, coord: GridCoordinate) -> bool {
        if coord.col < 0 || coord.row < 0 {
            return false;
        }
        let (col, row) = (coord.col as usize, coord.row as usize);
        col < self.width && row < self.height && self.cells[row * self.width + col]
    }
}

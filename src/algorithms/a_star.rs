use crate::algorithms::common::{Path, PathfindingAlgorithm, SearchLimits, SearchStats};
use crate::grid::{Grid, GridCoordinate, WorldPosition};
use crate::obstacles::BlockingOracle;
use crate::{PursuitError, PursuitResult};
use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Open set entry. `order` is the sequence number of the coordinate's first
/// insertion into the open set, so equal `f_cost`s pop first-found first.
#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    f_cost: f32,
    order: u64,
    coord: GridCoordinate,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed comparison to make BinaryHeap a min-heap
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// A* over the 4-connected grid with unit steps and a straight-line heuristic.
#[derive(Debug, Default)]
pub struct AStar {
    limits: SearchLimits,
    last_stats: SearchStats,
}

impl AStar {
    /// Creates a new instance of the A* algorithm with no expansion cap.
    pub fn new() -> Self {
        AStar::default()
    }

    pub fn with_limits(limits: SearchLimits) -> Self {
        AStar {
            limits,
            last_stats: SearchStats::default(),
        }
    }

    pub fn limits(&self) -> SearchLimits {
        self.limits
    }

    fn heuristic(from: GridCoordinate, goal: GridCoordinate) -> f32 {
        from.distance(&goal)
    }

    /// Searches between two grid cells and returns the cells of the path.
    pub fn search_cells(
        &mut self,
        grid: &Grid,
        start: GridCoordinate,
        goal: GridCoordinate,
        obstacles: &dyn BlockingOracle,
    ) -> PursuitResult<Vec<GridCoordinate>> {
        self.last_stats = SearchStats::default();

        for coord in [start, goal] {
            if !grid.contains(coord) {
                return Err(PursuitError::OutOfBounds {
                    col: coord.col,
                    row: coord.row,
                });
            }
        }

        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();
        let mut in_open: FxHashSet<GridCoordinate> = FxHashSet::default();
        let mut closed: FxHashSet<GridCoordinate> = FxHashSet::default();
        let mut came_from: FxHashMap<GridCoordinate, GridCoordinate> = FxHashMap::default();
        let mut g_cost: FxHashMap<GridCoordinate, f32> = FxHashMap::default();
        let mut f_cost: FxHashMap<GridCoordinate, f32> = FxHashMap::default();
        let mut first_seen: FxHashMap<GridCoordinate, u64> = FxHashMap::default();
        let mut next_order = 0u64;

        g_cost.insert(start, 0.0);
        f_cost.insert(start, Self::heuristic(start, goal));
        first_seen.insert(start, next_order);
        open.push(OpenEntry {
            f_cost: f_cost[&start],
            order: next_order,
            coord: start,
        });
        in_open.insert(start);
        next_order += 1;

        while let Some(entry) = open.pop() {
            let current = entry.coord;

            // Stale entry left behind by a cost improvement.
            if !in_open.contains(&current) || f_cost.get(&current) != Some(&entry.f_cost) {
                continue;
            }

            if current == goal {
                let cells = Self::reconstruct(&came_from, current);
                self.last_stats.path_len = cells.len();
                trace!(
                    "path {} -> {} found after {} expansions",
                    start,
                    goal,
                    self.last_stats.expansions
                );
                return Ok(cells);
            }

            if let Some(budget) = self.limits.max_expansions {
                if self.last_stats.expansions >= budget {
                    return Err(PursuitError::ExpansionBudgetExhausted { budget });
                }
            }
            self.last_stats.expansions += 1;

            in_open.remove(&current);
            closed.insert(current);
            let current_g = g_cost[&current];

            for neighbor in grid.neighbors(current) {
                if closed.contains(&neighbor) || obstacles.is_blocked(neighbor) {
                    continue;
                }

                let tentative_g = current_g + current.distance(&neighbor);
                let improves = match g_cost.get(&neighbor) {
                    Some(&known) => !in_open.contains(&neighbor) || tentative_g < known,
                    None => true,
                };
                if !improves {
                    continue;
                }

                came_from.insert(neighbor, current);
                g_cost.insert(neighbor, tentative_g);
                let f = tentative_g + Self::heuristic(neighbor, goal);
                f_cost.insert(neighbor, f);

                let order = *first_seen.entry(neighbor).or_insert_with(|| {
                    let order = next_order;
                    next_order += 1;
                    order
                });
                in_open.insert(neighbor);
                open.push(OpenEntry {
                    f_cost: f,
                    order,
                    coord: neighbor,
                });
            }
        }

        Err(PursuitError::NoPathFound)
    }

    fn reconstruct(
        came_from: &FxHashMap<GridCoordinate, GridCoordinate>,
        mut current: GridCoordinate,
    ) -> Vec<GridCoordinate> {
        let mut cells = vec![current];
        while let Some(&previous) = came_from.get(&current) {
            current = previous;
            cells.push(current);
        }
        cells.reverse();
        cells
    }
}

impl PathfindingAlgorithm for AStar {
    fn try_find_path(
        &mut self,
        grid: &Grid,
        start: WorldPosition,
        goal: WorldPosition,
        obstacles: &dyn BlockingOracle,
    ) -> PursuitResult<Path> {
        let start = grid.world_to_grid(start);
        let goal = grid.world_to_grid(goal);
        let cells = self.search_cells(grid, start, goal, obstacles)?;
        Ok(cells.into_iter().map(|cell| grid.grid_to_world(cell)).collect::<Vec<_>>().into())
    }

    fn last_stats(&self) -> SearchStats {
        self.last_stats
    }
}

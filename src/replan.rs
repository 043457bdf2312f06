//! # Re-planning
//!
//! Keeps a pursuing agent's path pointed at a moving target without running
//! a search every frame. The supervisor samples the target on a fixed
//! interval; when the target has moved it picks a free cell next to it,
//! searches from the pursuer to that cell and swaps the pursuer's path.

use crate::agent::Agent;
use crate::algorithms::common::PathfindingAlgorithm;
use crate::grid::{Grid, GridCoordinate, WorldPosition};
use crate::obstacles::BlockingOracle;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Duration;

/// Last known position of the entity being pursued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetTracker {
    last_observed: WorldPosition,
}

impl TargetTracker {
    pub fn new(initial: WorldPosition) -> Self {
        TargetTracker {
            last_observed: initial,
        }
    }

    pub fn last_observed(&self) -> WorldPosition {
        self.last_observed
    }

    pub fn has_moved(&self, current: WorldPosition) -> bool {
        !self.last_observed.approx_eq(&current)
    }

    fn observe(&mut self, current: WorldPosition) {
        self.last_observed = current;
    }
}

/// Result of a sample that detected target movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplanOutcome {
    /// Where the new path was aimed.
    pub destination: WorldPosition,
    /// Waypoints in the new path; zero when no path was found.
    pub path_len: usize,
}

#[derive(Debug)]
pub struct ReplanSupervisor {
    tracker: TargetTracker,
    interval: Duration,
    elapsed: Duration,
    primed: bool,
    rng: StdRng,
    replans: usize,
}

impl ReplanSupervisor {
    pub fn new(target: WorldPosition, interval: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ReplanSupervisor {
            tracker: TargetTracker::new(target),
            interval,
            elapsed: Duration::ZERO,
            primed: false,
            rng,
            replans: 0,
        }
    }

    pub fn tracker(&self) -> &TargetTracker {
        &self.tracker
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of replans triggered so far.
    pub fn replans(&self) -> usize {
        self.replans
    }

    /// Advances the sampling clock by `dt`.
    ///
    /// The first call samples immediately. After that a sample is taken once
    /// a full interval has elapsed; intervals skipped by a long `dt` collapse
    /// into that one sample since the target cannot move in between.
    pub fn update(
        &mut self,
        dt: Duration,
        target: WorldPosition,
        pursuer: &mut Agent,
        obstacles: &dyn BlockingOracle,
        search: &mut dyn PathfindingAlgorithm,
    ) -> Option<ReplanOutcome> {
        if !self.primed {
            self.primed = true;
            return self.sample(target, pursuer, obstacles, search);
        }

        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed < self.interval {
            return None;
        }
        self.elapsed = if self.interval.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_nanos((self.elapsed.as_nanos() % self.interval.as_nanos()) as u64)
        };
        self.sample(target, pursuer, obstacles, search)
    }

    /// Runs one sampling tick now.
    pub fn sample(
        &mut self,
        target: WorldPosition,
        pursuer: &mut Agent,
        obstacles: &dyn BlockingOracle,
        search: &mut dyn PathfindingAlgorithm,
    ) -> Option<ReplanOutcome> {
        if !self.tracker.has_moved(target) {
            return None;
        }

        let grid = *pursuer.grid();
        let destination = self.choose_destination(&grid, target, pursuer.current_cell(), obstacles);
        let path = search.find_path(&grid, pursuer.position(), destination, obstacles);
        let path_len = path.len();

        debug!(
            "{} replanning: target moved to {}, heading for {} ({} waypoints)",
            pursuer.name(),
            target,
            destination,
            path_len
        );

        pursuer.follower_mut().replace(path);
        self.tracker.observe(target);
        self.replans += 1;

        Some(ReplanOutcome {
            destination,
            path_len,
        })
    }

    /// A random free cell next to the target, or the target itself when every
    /// neighbor is off the grid, blocked, or the pursuer's own cell.
    pub fn choose_destination(
        &mut self,
        grid: &Grid,
        target: WorldPosition,
        occupied: GridCoordinate,
        obstacles: &dyn BlockingOracle,
    ) -> WorldPosition {
        let candidates = adjacent_free_cells(grid, grid.world_to_grid(target), occupied, obstacles);
        match candidates.choose(&mut self.rng) {
            Some(&cell) => grid.grid_to_world(cell),
            None => target,
        }
    }
}

/// Axis-aligned neighbors of `center` that are on the grid, unblocked and
/// not `occupied`.
pub fn adjacent_free_cells(
    grid: &Grid,
    center: GridCoordinate,
    occupied: GridCoordinate,
    obstacles: &dyn BlockingOracle,
) -> Vec<GridCoordinate> {
    grid.neighbors(center)
        .filter(|cell| *cell != occupied && !obstacles.is_blocked(*cell))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentRole, Navigator};
    use crate::algorithms::a_star::AStar;
    use crate::follower::FollowerSettings;
    use crate::obstacles::ObstacleStore;

    fn setup() -> (Grid, ObstacleStore, Agent) {
        let grid = Grid::new(10, 10, 1.0, 0.5).unwrap();
        let obstacles = ObstacleStore::new(&grid);
        let enemy = Agent::new(
            "enemy",
            AgentRole::Enemy,
            grid,
            GridCoordinate::new(9, 9),
            FollowerSettings::default(),
        );
        (grid, obstacles, enemy)
    }

    #[test]
    fn no_replan_while_target_is_still() {
        let (grid, obstacles, mut enemy) = setup();
        let target = grid.grid_to_world(GridCoordinate::new(3, 3));
        let mut supervisor = ReplanSupervisor::new(target, Duration::from_millis(500), Some(1));
        let mut search = AStar::new();

        assert!(supervisor.sample(target, &mut enemy, &obstacles, &mut search).is_none());
        assert!(!enemy.is_moving());
        assert_eq!(supervisor.replans(), 0);
    }

    #[test]
    fn moving_target_triggers_replan() {
        let (grid, mut obstacles, mut enemy) = setup();
        obstacles.set_obstacle(GridCoordinate::new(2, 4), true).unwrap();
        let mut supervisor = ReplanSupervisor::new(
            grid.grid_to_world(GridCoordinate::new(3, 3)),
            Duration::from_millis(500),
            Some(7),
        );
        let mut search = AStar::new();
        let moved = grid.grid_to_world(GridCoordinate::new(3, 4));

        let outcome = supervisor.sample(moved, &mut enemy, &obstacles, &mut search).unwrap();

        let destination = grid.world_to_grid(outcome.destination);
        assert_eq!(destination.manhattan_distance(&GridCoordinate::new(3, 4)), 1);
        assert_ne!(destination, GridCoordinate::new(2, 4));
        assert_ne!(destination, enemy.current_cell());
        assert!(enemy.is_moving());
        assert_eq!(enemy.follower().waypoint_index(), 0);
        assert_eq!(outcome.path_len, enemy.follower().current_path().len());
        assert_eq!(supervisor.tracker().last_observed(), moved);
    }

    #[test]
    fn update_samples_at_once_then_waits_for_the_interval() {
        let (grid, obstacles, mut enemy) = setup();
        let mut supervisor = ReplanSupervisor::new(
            grid.grid_to_world(GridCoordinate::new(3, 3)),
            Duration::from_millis(500),
            Some(3),
        );
        let mut search = AStar::new();
        let moved = grid.grid_to_world(GridCoordinate::new(4, 3));
        let moved_again = grid.grid_to_world(GridCoordinate::new(5, 3));

        assert!(supervisor
            .update(Duration::from_millis(10), moved, &mut enemy, &obstacles, &mut search)
            .is_some());
        assert!(supervisor
            .update(Duration::from_millis(300), moved_again, &mut enemy, &obstacles, &mut search)
            .is_none());
        assert!(supervisor
            .update(Duration::from_millis(300), moved_again, &mut enemy, &obstacles, &mut search)
            .is_some());
        assert_eq!(supervisor.replans(), 2);
    }

    #[test]
    fn long_frame_collapses_into_one_sample() {
        let (grid, obstacles, mut enemy) = setup();
        let start = grid.grid_to_world(GridCoordinate::new(3, 3));
        let mut supervisor = ReplanSupervisor::new(start, Duration::from_nanos(1), Some(4));
        let mut search = AStar::new();
        let moved = grid.grid_to_world(GridCoordinate::new(3, 4));

        assert!(supervisor
            .update(Duration::ZERO, start, &mut enemy, &obstacles, &mut search)
            .is_none());
        let outcome = supervisor.update(
            Duration::from_secs(3600),
            moved,
            &mut enemy,
            &obstacles,
            &mut search,
        );

        assert!(outcome.is_some());
        assert_eq!(supervisor.replans(), 1);
        assert!(supervisor
            .update(Duration::ZERO, moved, &mut enemy, &obstacles, &mut search)
            .is_none());
    }

    #[test]
    fn surrounded_target_falls_back_to_its_position() {
        let (grid, mut obstacles, mut enemy) = setup();
        for cell in GridCoordinate::new(5, 5).adjacent() {
            obstacles.set_obstacle(cell, true).unwrap();
        }
        let mut supervisor =
            ReplanSupervisor::new(WorldPosition::default(), Duration::from_millis(500), Some(9));
        let mut search = AStar::new();
        let target = grid.grid_to_world(GridCoordinate::new(5, 5));

        let outcome = supervisor.sample(target, &mut enemy, &obstacles, &mut search).unwrap();

        assert_eq!(outcome.destination, target);
        // The target's cell is walled in, so the search comes back empty.
        assert_eq!(outcome.path_len, 0);
        assert!(!enemy.is_moving());
    }

    #[test]
    fn replan_discards_path_in_progress() {
        let (grid, obstacles, mut enemy) = setup();
        let mut search = AStar::new();
        let mut supervisor = ReplanSupervisor::new(
            grid.grid_to_world(GridCoordinate::new(0, 0)),
            Duration::from_millis(500),
            Some(5),
        );

        supervisor.sample(
            grid.grid_to_world(GridCoordinate::new(0, 1)),
            &mut enemy,
            &obstacles,
            &mut search,
        );
        for _ in 0..10 {
            enemy.advance(0.05);
        }
        assert!(enemy.follower().waypoint_index() > 0);

        supervisor.sample(
            grid.grid_to_world(GridCoordinate::new(9, 0)),
            &mut enemy,
            &obstacles,
            &mut search,
        );

        assert_eq!(enemy.follower().waypoint_index(), 0);
        let goal = grid.world_to_grid(*enemy.follower().current_path().last().unwrap());
        assert_eq!(goal.manhattan_distance(&GridCoordinate::new(9, 0)), 1);
    }

    #[test]
    fn adjacent_cells_skip_occupied_and_edges() {
        let grid = Grid::new(4, 4, 1.0, 0.0).unwrap();
        let obstacles = ObstacleStore::new(&grid);
        let cells = adjacent_free_cells(
            &grid,
            GridCoordinate::new(0, 0),
            GridCoordinate::new(1, 0),
            &obstacles,
        );
        assert_eq!(cells, vec![GridCoordinate::new(0, 1)]);
    }
}

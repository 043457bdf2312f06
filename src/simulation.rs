use crate::agent::{Agent, AgentRole, Navigator};
use crate::algorithms::a_star::AStar;
use crate::algorithms::common::{Path, PathfindingAlgorithm, SearchLimits, SearchStats};
use crate::config::Config;
use crate::follower::{Assignment, FollowerState};
use crate::grid::{Grid, GridCoordinate, WorldPosition};
use crate::obstacles::{BlockingOracle, ObstacleStore};
use crate::replan::ReplanSupervisor;
use crate::statistics::{Statistics, TimingData};
use crate::{PursuitError, PursuitResult};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

/// Seeded, pre-generated scenario: where the agents start and which cells
/// get toggled at each obstacle event.
#[derive(Debug, Clone)]
pub struct EnvironmentSetup {
    pub seed: u64,
    pub player_spawn: GridCoordinate,
    pub enemy_spawn: GridCoordinate,
    pub obstacle_timeline: Vec<Vec<GridCoordinate>>,
    pub obstacle_interval: usize,
}

impl EnvironmentSetup {
    /// Generate a new environment setup with a predetermined obstacle timeline
    pub fn generate(config: &Config, grid: &Grid, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let player_spawn = GridCoordinate::new(0, 0);
        let enemy_spawn = grid.corner();

        let num_events = if config.obstacle_interval == 0 {
            0
        } else {
            config.steps / config.obstacle_interval
        };

        let candidates: Vec<GridCoordinate> = grid
            .coordinates()
            .filter(|cell| *cell != player_spawn && *cell != enemy_spawn)
            .collect();

        let obstacle_timeline = (0..num_events)
            .map(|_| {
                candidates
                    .choose_multiple(&mut rng, config.num_obstacles)
                    .copied()
                    .collect()
            })
            .collect();

        EnvironmentSetup {
            seed,
            player_spawn,
            enemy_spawn,
            obstacle_timeline,
            obstacle_interval: config.obstacle_interval,
        }
    }

    /// Obstacle edits due at `step`, if any.
    pub fn edits_at(&self, step: usize) -> Option<&[GridCoordinate]> {
        if self.obstacle_interval == 0 || step == 0 || step % self.obstacle_interval != 0 {
            return None;
        }
        self.obstacle_timeline
            .get(step / self.obstacle_interval - 1)
            .map(Vec::as_slice)
    }
}

/// Wraps a search so every call made through it is timed.
struct TimedSearch<'a> {
    inner: &'a mut AStar,
    timing: &'a mut TimingData,
    failures: &'a mut usize,
}

impl PathfindingAlgorithm for TimedSearch<'_> {
    fn try_find_path(
        &mut self,
        grid: &Grid,
        start: WorldPosition,
        goal: WorldPosition,
        obstacles: &dyn BlockingOracle,
    ) -> PursuitResult<Path> {
        let started = Instant::now();
        let result = self.inner.try_find_path(grid, start, goal, obstacles);
        self.timing.record(started.elapsed(), self.inner.last_stats().expansions);
        if result.is_err() {
            *self.failures += 1;
        }
        result
    }

    fn last_stats(&self) -> SearchStats {
        self.inner.last_stats()
    }
}

/// Headless game loop: the player wanders between random destinations, the
/// enemy chases it, and the obstacle layer is edited on a schedule.
pub struct Simulation {
    config: Config,
    grid: Grid,
    obstacles: ObstacleStore,
    player: Agent,
    enemy: Agent,
    supervisor: ReplanSupervisor,
    search: AStar,
    environment: EnvironmentSetup,
    rng: StdRng,
    step_count: usize,
    stats: Statistics,
    timing: TimingData,
}

impl Simulation {
    pub fn new(config: Config) -> PursuitResult<Self> {
        config.validate()?;
        let grid = config.grid()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let environment = EnvironmentSetup::generate(&config, &grid, seed);
        let obstacles = ObstacleStore::new(&grid);
        Self::with_environment(config, environment, obstacles)
    }

    /// Builds a simulation around an existing scenario and obstacle layer.
    pub fn with_environment(
        config: Config,
        environment: EnvironmentSetup,
        obstacles: ObstacleStore,
    ) -> PursuitResult<Self> {
        config.validate()?;
        let grid = config.grid()?;
        if obstacles.width() != grid.width() || obstacles.height() != grid.height() {
            return Err(PursuitError::InvalidConfig(format!(
                "obstacle layer is {}x{}, grid is {}x{}",
                obstacles.width(),
                obstacles.height(),
                grid.width(),
                grid.height()
            )));
        }
        for spawn in [environment.player_spawn, environment.enemy_spawn] {
            if !grid.contains(spawn) {
                return Err(PursuitError::OutOfBounds {
                    col: spawn.col,
                    row: spawn.row,
                });
            }
        }

        let settings = config.follower_settings();
        let player = Agent::new(
            "player",
            AgentRole::Player,
            grid,
            environment.player_spawn,
            settings,
        );
        let enemy = Agent::new("enemy", AgentRole::Enemy, grid, environment.enemy_spawn, settings);

        let seed = environment.seed;
        let supervisor =
            ReplanSupervisor::new(player.position(), config.replan_interval(), Some(seed));
        let search = AStar::with_limits(SearchLimits {
            max_expansions: config.max_expansions,
        });

        info!(
            "simulation ready: {}x{} grid, seed {}, {} obstacle events",
            grid.width(),
            grid.height(),
            seed,
            environment.obstacle_timeline.len()
        );

        Ok(Simulation {
            config,
            grid,
            obstacles,
            player,
            enemy,
            supervisor,
            search,
            environment,
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            step_count: 0,
            stats: Statistics::new(),
            timing: TimingData::new(),
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn obstacles(&self) -> &ObstacleStore {
        &self.obstacles
    }

    /// The obstacle editor's write access.
    pub fn obstacles_mut(&mut self) -> &mut ObstacleStore {
        &mut self.obstacles
    }

    pub fn player(&self) -> &Agent {
        &self.player
    }

    pub fn enemy(&self) -> &Agent {
        &self.enemy
    }

    pub fn supervisor(&self) -> &ReplanSupervisor {
        &self.supervisor
    }

    pub fn environment(&self) -> &EnvironmentSetup {
        &self.environment
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn timing(&self) -> &TimingData {
        &self.timing
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Entry point for the picking layer: send the player to `target`.
    ///
    /// Refused while the player is moving, and for cells that are off the
    /// grid, blocked, or occupied by the enemy.
    pub fn request_player_destination(
        &mut self,
        target: GridCoordinate,
    ) -> PursuitResult<Assignment> {
        if self.player.is_moving() {
            return Err(PursuitError::AgentBusy(self.player.name().to_string()));
        }
        if !self.grid.contains(target) {
            return Err(PursuitError::OutOfBounds {
                col: target.col,
                row: target.row,
            });
        }
        if self.obstacles.is_blocked(target) {
            return Err(PursuitError::DestinationBlocked {
                col: target.col,
                row: target.row,
            });
        }
        if self.enemy.occupies(target) {
            return Err(PursuitError::DestinationOccupied {
                col: target.col,
                row: target.row,
            });
        }

        let start = self.player.current_cell();
        let destination = self.grid.grid_to_world(target);
        let mut search = TimedSearch {
            inner: &mut self.search,
            timing: &mut self.timing,
            failures: &mut self.stats.failed_searches,
        };
        let assignment = self.player.request_path(destination, &self.obstacles, &mut search)?;

        let walked = self.player.follower().current_path().len().saturating_sub(1);
        self.stats.planned_player_steps += walked;
        self.stats.optimal_player_steps +=
            reference_steps(&self.grid, &self.obstacles, start, target).unwrap_or(walked);

        Ok(assignment)
    }

    /// One simulation tick: scheduled obstacle edits, then the enemy's replan
    /// check, then motion. A replan always lands before the enemy moves.
    pub fn step(&mut self) {
        let dt = self.config.tick();
        self.step_count += 1;

        self.apply_scheduled_edits();

        let mut search = TimedSearch {
            inner: &mut self.search,
            timing: &mut self.timing,
            failures: &mut self.stats.failed_searches,
        };
        if let Some(outcome) = self.supervisor.update(
            dt,
            self.player.position(),
            &mut self.enemy,
            &self.obstacles,
            &mut search,
        ) {
            self.stats.replans = self.supervisor.replans();
            if outcome.path_len == 0 {
                debug!("enemy has no path toward {}", outcome.destination);
            }
        }

        if !self.player.is_moving() {
            self.wander();
        }

        let seconds = dt.as_secs_f32();
        let before = self.player.position();
        if self.player.advance(seconds) == FollowerState::Arrived {
            self.stats.player_arrivals += 1;
            debug!("player arrived at {}", self.player.current_cell());
        }
        self.stats.player_distance += before.horizontal_distance(&self.player.position());

        let before = self.enemy.position();
        self.enemy.advance(seconds);
        self.stats.enemy_distance += before.horizontal_distance(&self.enemy.position());

        self.stats.steps = self.step_count;
    }

    /// Runs the configured number of steps and returns the run's statistics.
    pub fn run(&mut self) -> (Statistics, TimingData) {
        if !self.config.no_visualization {
            self.draw();
        }

        for _ in 0..self.config.steps {
            self.step();

            if !self.config.no_visualization && self.step_count % self.config.render_every == 0 {
                self.draw();
                thread::sleep(Duration::from_millis(self.config.delay_ms));
            }
        }

        self.stats.calculate_efficiency();
        info!(
            "simulation finished after {} steps, {} replans",
            self.step_count, self.stats.replans
        );
        (self.stats.clone(), self.timing.clone())
    }

    fn apply_scheduled_edits(&mut self) {
        let Some(edits) = self.environment.edits_at(self.step_count) else {
            return;
        };

        let occupied: HashSet<GridCoordinate> =
            [self.player.current_cell(), self.enemy.current_cell()]
                .into_iter()
                .collect();

        for &cell in edits {
            if occupied.contains(&cell) {
                continue;
            }
            match self.obstacles.toggle_obstacle(cell) {
                Ok(_) => self.stats.obstacle_edits += 1,
                Err(e) => warn!("skipping obstacle edit at {}: {}", cell, e),
            }
        }
        debug!(
            "step {}: obstacle layer now at version {} with {} blocked cells",
            self.step_count,
            self.obstacles.version(),
            self.obstacles.blocked_count()
        );
    }

    /// Stand-in for a user clicking a tile: try a few random cells until one
    /// is accepted.
    fn wander(&mut self) {
        const ATTEMPTS: usize = 8;

        for _ in 0..ATTEMPTS {
            let target = GridCoordinate::new(
                self.rng.gen_range(0..self.grid.width() as i32),
                self.rng.gen_range(0..self.grid.height() as i32),
            );
            if self.player.occupies(target) {
                continue;
            }

            self.stats.player_requests += 1;
            match self.request_player_destination(target) {
                Ok(_) => {
                    debug!("player heading for {}", target);
                    return;
                }
                Err(e) => {
                    self.stats.refused_requests += 1;
                    debug!("player request for {} refused: {}", target, e);
                }
            }
        }
    }

    /// Plain-text frame: `P` player, `E` enemy, `#` obstacle, `*`/`+` the
    /// player's/enemy's remaining waypoints.
    pub fn render(&self) -> String {
        let width = self.grid.width();
        let height = self.grid.height();
        let mut cells = vec![vec!['.'; width]; height];

        for cell in self.obstacles.blocked_cells() {
            cells[cell.row as usize][cell.col as usize] = '#';
        }
        for (agent, mark) in [(&self.enemy, '+'), (&self.player, '*')] {
            for waypoint in agent.remaining_waypoints() {
                let cell = self.grid.world_to_grid(*waypoint);
                if self.grid.contains(cell) {
                    cells[cell.row as usize][cell.col as usize] = mark;
                }
            }
        }
        for (agent, mark) in [(&self.enemy, 'E'), (&self.player, 'P')] {
            let cell = agent.current_cell();
            if self.grid.contains(cell) {
                cells[cell.row as usize][cell.col as usize] = mark;
            }
        }

        let mut out = String::new();
        out.push_str("   ");
        for col in 0..width {
            out.push_str(&format!("{:2}", col % 10));
        }
        out.push('\n');
        for (row, line) in cells.iter().enumerate() {
            out.push_str(&format!("{:2} ", row));
            for ch in line {
                out.push(*ch);
                out.push(' ');
            }
            out.push('\n');
        }
        out
    }

    fn draw(&self) {
        // Clear the terminal and home the cursor
        print!("\x1B[2J\x1B[1;1H");
        println!("=== GRID PURSUIT ===");
        println!(
            "Step: {} | Player: {} | Enemy: {} | Obstacles: {} | Replans: {}",
            self.step_count,
            self.player.current_cell(),
            self.enemy.current_cell(),
            self.obstacles.blocked_count(),
            self.supervisor.replans()
        );
        println!("Legend: P=Player, E=Enemy, #=Obstacle, *=Player path, +=Enemy path");
        print!("{}", self.render());
    }
}

/// Optimal step count between two cells, computed with the `pathfinding`
/// crate as an independent reference for the statistics.
pub fn reference_steps(
    grid: &Grid,
    obstacles: &dyn BlockingOracle,
    start: GridCoordinate,
    goal: GridCoordinate,
) -> Option<usize> {
    pathfinding::prelude::astar(
        &start,
        |cell| {
            grid.neighbors(*cell)
                .filter(|neighbor| !obstacles.is_blocked(*neighbor))
                .map(|neighbor| (neighbor, 1u32))
                .collect::<Vec<_>>()
        },
        |cell| cell.manhattan_distance(&goal),
        |cell| *cell == goal,
    )
    .map(|(_, cost)| cost as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn quiet_config(extra: &[&str]) -> Config {
        let mut args = vec!["grid_pursuit", "--no-visualization", "--seed", "11"];
        args.extend_from_slice(extra);
        Config::parse_from(args)
    }

    #[test]
    fn player_request_validation() {
        let config = quiet_config(&["--num-obstacles", "0"]);
        let mut sim = Simulation::new(config).unwrap();
        sim.obstacles_mut().set_obstacle(GridCoordinate::new(4, 4), true).unwrap();

        assert_eq!(
            sim.request_player_destination(GridCoordinate::new(4, 4)),
            Err(PursuitError::DestinationBlocked { col: 4, row: 4 })
        );
        assert_eq!(
            sim.request_player_destination(GridCoordinate::new(9, 9)),
            Err(PursuitError::DestinationOccupied { col: 9, row: 9 })
        );
        assert_eq!(
            sim.request_player_destination(GridCoordinate::new(10, 0)),
            Err(PursuitError::OutOfBounds { col: 10, row: 0 })
        );
        assert_eq!(
            sim.request_player_destination(GridCoordinate::new(3, 0)),
            Ok(Assignment::Started)
        );
        assert_eq!(
            sim.request_player_destination(GridCoordinate::new(5, 0)),
            Err(PursuitError::AgentBusy("player".to_string()))
        );
    }

    #[test]
    fn unusable_config_is_an_error() {
        let config = quiet_config(&["--replan-interval", "1e30"]);
        assert!(matches!(Simulation::new(config), Err(PursuitError::InvalidConfig(_))));

        let mut config = quiet_config(&[]);
        config.width = usize::MAX;
        config.height = usize::MAX;
        assert!(matches!(Simulation::new(config), Err(PursuitError::InvalidConfig(_))));
    }

    #[test]
    fn edits_follow_the_schedule() {
        let config = quiet_config(&["--steps", "300", "--obstacle-interval", "100"]);
        let grid = config.grid().unwrap();
        let environment = EnvironmentSetup::generate(&config, &grid, 5);

        assert_eq!(environment.obstacle_timeline.len(), 3);
        assert!(environment.edits_at(0).is_none());
        assert!(environment.edits_at(99).is_none());
        assert_eq!(environment.edits_at(100).map(<[_]>::len), Some(config.num_obstacles));
        assert!(environment.edits_at(400).is_none());
        for event in &environment.obstacle_timeline {
            assert!(!event.contains(&environment.player_spawn));
            assert!(!event.contains(&environment.enemy_spawn));
        }
    }

    #[test]
    fn same_seed_same_run() {
        let run = || {
            let mut sim = Simulation::new(quiet_config(&["--steps", "400"])).unwrap();
            sim.run();
            (
                sim.player().current_cell(),
                sim.enemy().current_cell(),
                sim.obstacles().to_ascii(),
                sim.supervisor().replans(),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn enemy_chases_a_wandering_player() {
        let mut sim = Simulation::new(quiet_config(&["--num-obstacles", "0"])).unwrap();
        let spawn = sim.enemy().position();

        for _ in 0..200 {
            sim.step();
        }

        assert!(sim.supervisor().replans() >= 1);
        assert_eq!(sim.statistics().replans, sim.supervisor().replans());
        assert!(sim.statistics().enemy_distance > 0.0);
        assert!(!sim.enemy().position().approx_eq(&spawn));
    }

    #[test]
    fn render_marks_agents_and_obstacles() {
        let mut sim = Simulation::new(quiet_config(&["--num-obstacles", "0"])).unwrap();
        sim.obstacles_mut().set_obstacle(GridCoordinate::new(5, 2), true).unwrap();

        let frame = sim.render();
        let rows: Vec<&str> = frame.lines().collect();

        assert_eq!(rows.len(), 11);
        assert!(rows[1].starts_with(" 0 P"));
        assert!(rows[10].trim_end().ends_with('E'));
        assert_eq!(rows[3].split_whitespace().nth(6), Some("#"));
    }

    #[test]
    fn reference_matches_a_star() {
        let grid = Grid::new(8, 8, 1.0, 0.0).unwrap();
        let obstacles = ObstacleStore::from_ascii(
            "........\n\
             .######.\n\
             ......#.\n\
             .####.#.\n\
             .#....#.\n\
             .#.####.\n\
             .#......\n\
             ........\n",
        )
        .unwrap();
        let start = GridCoordinate::new(2, 4);
        let goal = GridCoordinate::new(7, 7);

        let cells = AStar::new().search_cells(&grid, start, goal, &obstacles).unwrap();

        assert_eq!(reference_steps(&grid, &obstacles, start, goal), Some(cells.len() - 1));
    }
}

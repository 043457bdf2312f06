use crate::algorithms::common::PathfindingAlgorithm;
use crate::follower::{Assignment, FollowerSettings, FollowerState, PathFollower};
use crate::grid::{Grid, GridCoordinate, WorldPosition};
use crate::obstacles::BlockingOracle;
use crate::PursuitResult;
use log::debug;
use std::fmt;

/// What every path-following agent can do, whoever drives it.
pub trait Navigator {
    /// Searches from the agent's position to `destination` and hands the
    /// result to the follower. Fails when the search finds nothing.
    fn request_path(
        &mut self,
        destination: WorldPosition,
        obstacles: &dyn BlockingOracle,
        search: &mut dyn PathfindingAlgorithm,
    ) -> PursuitResult<Assignment>;

    /// Moves along the active path by one time step of `dt` seconds.
    fn advance(&mut self, dt: f32) -> FollowerState;

    fn is_moving(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Player,
    Enemy,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::Player => write!(f, "player"),
            AgentRole::Enemy => write!(f, "enemy"),
        }
    }
}

/// A grid-bound agent. Player and enemy are the same type with different
/// roles; what differs is who calls [`Navigator::request_path`].
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    role: AgentRole,
    grid: Grid,
    position: WorldPosition,
    heading: f32,
    follower: PathFollower,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        role: AgentRole,
        grid: Grid,
        spawn: GridCoordinate,
        settings: FollowerSettings,
    ) -> Self {
        Agent {
            name: name.into(),
            role,
            grid,
            position: grid.grid_to_world(spawn),
            heading: 0.0,
            follower: PathFollower::new(settings),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn position(&self) -> WorldPosition {
        self.position
    }

    /// Yaw in radians, 0 facing +z.
    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn current_cell(&self) -> GridCoordinate {
        self.grid.world_to_grid(self.position)
    }

    pub fn occupies(&self, coord: GridCoordinate) -> bool {
        self.current_cell() == coord
    }

    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    pub fn follower_mut(&mut self) -> &mut PathFollower {
        &mut self.follower
    }

    /// Waypoints still ahead of the agent, for drawing.
    pub fn remaining_waypoints(&self) -> &[WorldPosition] {
        self.follower.remaining_waypoints()
    }

    /// Puts the agent on `cell` and drops whatever it was doing.
    pub fn teleport(&mut self, cell: GridCoordinate) {
        self.position = self.grid.grid_to_world(cell);
        self.follower.clear();
    }
}

impl Navigator for Agent {
    fn request_path(
        &mut self,
        destination: WorldPosition,
        obstacles: &dyn BlockingOracle,
        search: &mut dyn PathfindingAlgorithm,
    ) -> PursuitResult<Assignment> {
        let path = search.try_find_path(&self.grid, self.position, destination, obstacles)?;
        let assignment = self.follower.assign(path);
        debug!("{} path to {}: {:?}", self.name, destination, assignment);
        Ok(assignment)
    }

    fn advance(&mut self, dt: f32) -> FollowerState {
        let agent_height = self.grid.agent_height();
        self.follower
            .step(&mut self.position, &mut self.heading, agent_height, dt)
    }

    fn is_moving(&self) -> bool {
        self.follower.is_moving()
    }
}

//! # Grid Pursuit
//!
//! Grid-bound agents that find their way around runtime-editable obstacles.
//!
//! The crate is built from a few small pieces:
//!
//! - [`grid`]: the fixed grid and world <-> grid coordinate conversion
//! - [`obstacles`]: the mutable obstacle layer with change notification
//! - [`algorithms`]: A* search over the grid
//! - [`follower`]: the per-agent path-following state machine
//! - [`replan`]: periodic re-planning toward a moving target
//! - [`agent`]: the single agent type shared by the player and the enemy
//! - [`simulation`]: a headless driver loop composing all of the above

pub mod agent;
pub mod algorithms;
pub mod config;
pub mod follower;
pub mod grid;
pub mod obstacles;
pub mod replan;
pub mod simulation;
pub mod statistics;

pub use agent::{Agent, AgentRole, Navigator};
pub use algorithms::a_star::AStar;
pub use algorithms::common::{Path, PathfindingAlgorithm, SearchLimits, SearchStats};
pub use follower::{Assignment, FollowerSettings, FollowerState, PathFollower};
pub use grid::{Grid, GridCoordinate, WorldPosition};
pub use obstacles::{
    BlockingOracle, ObstacleChange, ObstacleSnapshot, ObstacleStore, SubscriptionId,
};
pub use replan::{ReplanOutcome, ReplanSupervisor, TargetTracker};

/// Errors raised by the pathfinding core and the simulation driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PursuitError {
    /// A grid coordinate lies outside the grid
    #[error("coordinate ({col}, {row}) is outside the grid")]
    OutOfBounds { col: i32, row: i32 },

    /// The search exhausted its open set without reaching the goal
    #[error("no path found")]
    NoPathFound,

    /// The search hit its node-expansion budget
    #[error("search gave up after {budget} expansions")]
    ExpansionBudgetExhausted { budget: usize },

    /// The requested destination cell holds an obstacle
    #[error("destination ({col}, {row}) is blocked")]
    DestinationBlocked { col: i32, row: i32 },

    /// The requested destination cell is occupied by another agent
    #[error("destination ({col}, {row}) is occupied")]
    DestinationOccupied { col: i32, row: i32 },

    /// The agent is still walking its current path
    #[error("{0} is still moving")]
    AgentBusy(String),

    /// Configuration values are unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An obstacle layout could not be parsed
    #[error("invalid obstacle layout: {0}")]
    InvalidLayout(String),
}

/// Result type used throughout the crate.
pub type PursuitResult<T> = Result<T, PursuitError>;

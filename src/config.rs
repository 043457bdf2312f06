use crate::follower::FollowerSettings;
use crate::grid::Grid;
use crate::{PursuitError, PursuitResult};
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Player and enemy agents pathfinding over an editable grid",
    long_about = None
)]
pub struct Config {
    #[arg(long, default_value_t = 10)]
    pub width: usize,

    #[arg(long, default_value_t = 10)]
    pub height: usize,

    /// World distance between adjacent cell centers
    #[arg(long, default_value_t = 1.0)]
    pub cell_spacing: f32,

    /// Vertical coordinate agents are held at
    #[arg(long, default_value_t = 0.5)]
    pub agent_height: f32,

    /// Agent speed in world units per second
    #[arg(long, default_value_t = 5.0)]
    pub move_speed: f32,

    #[arg(long, default_value_t = 0.1)]
    pub stopping_distance: f32,

    /// Seconds between checks of the player's position by the enemy
    #[arg(long, default_value_t = 0.5)]
    pub replan_interval: f32,

    /// Simulated milliseconds per step
    #[arg(long, default_value_t = 20)]
    pub tick_ms: u64,

    #[arg(long, default_value_t = 1500)]
    pub steps: usize,

    /// Obstacles toggled per obstacle event
    #[arg(long, default_value_t = 4)]
    pub num_obstacles: usize,

    /// Steps between obstacle events
    #[arg(long, default_value_t = 100)]
    pub obstacle_interval: usize,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Give up a search after this many node expansions
    #[arg(long)]
    pub max_expansions: Option<usize>,

    /// Real-time delay between rendered frames
    #[arg(long, default_value_t = 50)]
    pub delay_ms: u64,

    /// Render every this many steps
    #[arg(long, default_value_t = 10)]
    pub render_every: usize,

    #[arg(long, default_value_t = false)]
    pub no_visualization: bool,

    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config::parse_from(["grid_pursuit"])
    }
}

impl Config {
    pub fn validate(&self) -> PursuitResult<()> {
        let invalid = |msg: String| Err(PursuitError::InvalidConfig(msg));

        let Some(cell_count) = self.width.checked_mul(self.height) else {
            return invalid(format!("grid {}x{} is too large", self.width, self.height));
        };
        if cell_count < 2 {
            return invalid(format!(
                "grid {}x{} has no room for two agents",
                self.width, self.height
            ));
        }
        if !(self.move_speed.is_finite() && self.move_speed > 0.0) {
            return invalid(format!("move speed must be positive, got {}", self.move_speed));
        }
        if !(self.stopping_distance.is_finite() && self.stopping_distance >= 0.0) {
            return invalid(format!(
                "stopping distance must be non-negative, got {}",
                self.stopping_distance
            ));
        }
        if Duration::try_from_secs_f32(self.replan_interval).is_err() {
            return invalid(format!(
                "replan interval must be a non-negative number of seconds, got {}",
                self.replan_interval
            ));
        }
        if self.tick_ms == 0 {
            return invalid("tick must be at least 1ms".to_string());
        }
        // Spawn cells are never blocked.
        if self.num_obstacles > cell_count - 2 {
            return invalid(format!(
                "{} obstacles do not fit on a {}x{} grid",
                self.num_obstacles, self.width, self.height
            ));
        }
        if self.render_every == 0 {
            return invalid("render interval must be at least 1 step".to_string());
        }
        self.grid().map(|_| ())
    }

    pub fn grid(&self) -> PursuitResult<Grid> {
        Grid::new(self.width, self.height, self.cell_spacing, self.agent_height)
    }

    pub fn follower_settings(&self) -> FollowerSettings {
        FollowerSettings {
            move_speed: self.move_speed,
            stopping_distance: self.stopping_distance,
            ..FollowerSettings::default()
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Zero when the value is unusable; `validate` rejects those.
    pub fn replan_interval(&self) -> Duration {
        Duration::try_from_secs_f32(self.replan_interval).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.width, 10);
        assert_eq!(config.move_speed, 5.0);
        assert_eq!(config.replan_interval(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_flags() {
        let config = Config::parse_from([
            "grid_pursuit",
            "--width",
            "24",
            "--cell-spacing",
            "2.5",
            "--seed",
            "42",
            "--max-expansions",
            "300",
            "--no-visualization",
        ]);
        assert_eq!(config.width, 24);
        assert_eq!(config.cell_spacing, 2.5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.max_expansions, Some(300));
        assert!(config.no_visualization);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.move_speed = 0.0;
        assert!(matches!(config.validate(), Err(PursuitError::InvalidConfig(_))));

        let mut config = Config::default();
        config.num_obstacles = 99;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cell_spacing = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.width = 1;
        config.height = 1;
        assert!(config.validate().is_err());

        let config = Config::parse_from(["grid_pursuit", "--replan-interval", "1e30"]);
        assert!(matches!(config.validate(), Err(PursuitError::InvalidConfig(_))));

        let config = Config::parse_from(["grid_pursuit", "--replan-interval", "NaN"]);
        assert!(matches!(config.validate(), Err(PursuitError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_grids_whose_cell_count_overflows() {
        let mut config = Config::default();
        config.width = usize::MAX / 2;
        config.height = 3;
        assert!(matches!(config.validate(), Err(PursuitError::InvalidConfig(_))));

        let mut config = Config::default();
        config.width = usize::MAX;
        config.height = usize::MAX;
        config.num_obstacles = 0;
        assert!(matches!(config.validate(), Err(PursuitError::InvalidConfig(_))));
    }
}

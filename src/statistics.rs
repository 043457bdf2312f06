use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub steps: usize,
    pub player_requests: usize,
    pub refused_requests: usize,
    pub player_arrivals: usize,
    pub replans: usize,
    pub failed_searches: usize,
    pub obstacle_edits: usize,
    pub player_distance: f32,
    pub enemy_distance: f32,
    /// Sum of the optimal path lengths (in steps) of every accepted player request.
    pub optimal_player_steps: usize,
    /// Sum of the cell steps the player actually walked on accepted paths.
    pub planned_player_steps: usize,
    pub route_efficiency: f64,
}

impl Statistics {
    pub fn new() -> Self {
        Statistics::default()
    }

    pub fn calculate_efficiency(&mut self) {
        if self.planned_player_steps > 0 && self.optimal_player_steps > 0 {
            self.route_efficiency =
                self.planned_player_steps as f64 / self.optimal_player_steps as f64;
        } else {
            self.route_efficiency = 0.0;
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(
            f,
            "Player requests: {} ({} refused)",
            self.player_requests, self.refused_requests
        )?;
        writeln!(f, "Player arrivals: {}", self.player_arrivals)?;
        writeln!(f, "Enemy replans: {}", self.replans)?;
        writeln!(f, "Failed searches: {}", self.failed_searches)?;
        writeln!(f, "Obstacle edits: {}", self.obstacle_edits)?;
        writeln!(f, "Player distance: {:.2}", self.player_distance)?;
        writeln!(f, "Enemy distance: {:.2}", self.enemy_distance)?;
        writeln!(f, "Route Efficiency: {:.3}", self.route_efficiency)?;

        if self.route_efficiency > 1.0 + f64::EPSILON {
            writeln!(f, "Note: A* paths longer than the reference optimum")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimingData {
    pub find_path_times: Vec<Duration>,
    pub expansions: Vec<usize>,
}

impl TimingData {
    pub fn new() -> Self {
        TimingData::default()
    }

    pub fn record(&mut self, elapsed: Duration, expansions: usize) {
        self.find_path_times.push(elapsed);
        self.expansions.push(expansions);
    }

    pub fn average_find_path_time(&self) -> Duration {
        if self.find_path_times.is_empty() {
            Duration::from_nanos(0)
        } else {
            let total: Duration = self.find_path_times.iter().sum();
            total / self.find_path_times.len() as u32
        }
    }

    pub fn max_find_path_time(&self) -> Duration {
        self.find_path_times.iter().copied().max().unwrap_or_default()
    }

    pub fn average_expansions(&self) -> f64 {
        if self.expansions.is_empty() {
            0.0
        } else {
            self.expansions.iter().sum::<usize>() as f64 / self.expansions.len() as f64
        }
    }

    pub fn total_calls(&self) -> usize {
        self.find_path_times.len()
    }
}

impl fmt::Display for TimingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total pathfinding calls: {}", self.total_calls())?;
        writeln!(f, "Average find_path time: {:.2?}", self.average_find_path_time())?;
        writeln!(f, "Slowest find_path: {:.2?}", self.max_find_path_time())?;
        writeln!(f, "Average expansions: {:.1}", self.average_expansions())
    }
}

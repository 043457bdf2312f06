use crate::grid::{Grid, WorldPosition};
use crate::obstacles::BlockingOracle;
use crate::PursuitResult;

/// Ordered waypoints from start to goal, both inclusive. An empty path means
/// no path was found. Paths are replaced wholesale and never edited.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    waypoints: Vec<WorldPosition>,
}

impl Path {
    pub fn new(waypoints: Vec<WorldPosition>) -> Self {
        Path { waypoints }
    }

    pub fn empty() -> Self {
        Path::default()
    }

    pub fn waypoints(&self) -> &[WorldPosition] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> Option<&WorldPosition> {
        self.waypoints.first()
    }

    pub fn last(&self) -> Option<&WorldPosition> {
        self.waypoints.last()
    }

    /// Sum of the straight-line distances between consecutive waypoints.
    pub fn total_distance(&self) -> f32 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

impl From<Vec<WorldPosition>> for Path {
    fn from(waypoints: Vec<WorldPosition>) -> Self {
        Path::new(waypoints)
    }
}

/// Caps on a single search. Unlimited by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchLimits {
    /// Maximum number of nodes taken off the open set before giving up.
    pub max_expansions: Option<usize>,
}

impl SearchLimits {
    pub fn unlimited() -> Self {
        SearchLimits::default()
    }

    pub fn with_max_expansions(max_expansions: usize) -> Self {
        SearchLimits {
            max_expansions: Some(max_expansions),
        }
    }
}

/// Bookkeeping from the most recent search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchStats {
    pub expansions: usize,
    pub path_len: usize,
}

pub trait PathfindingAlgorithm {
    /// Finds a path between two world positions, reporting why a search failed.
    fn try_find_path(
        &mut self,
        grid: &Grid,
        start: WorldPosition,
        goal: WorldPosition,
        obstacles: &dyn BlockingOracle,
    ) -> PursuitResult<Path>;

    /// Like [`PathfindingAlgorithm::try_find_path`], but every failure is the empty path.
    fn find_path(
        &mut self,
        grid: &Grid,
        start: WorldPosition,
        goal: WorldPosition,
        obstacles: &dyn BlockingOracle,
    ) -> Path {
        match self.try_find_path(grid, start, goal, obstacles) {
            Ok(path) => path,
            Err(e) => {
                log::debug!("search from {} to {} failed: {}", start, goal, e);
                Path::empty()
            }
        }
    }

    /// Stats of the last search run by this instance.
    fn last_stats(&self) -> SearchStats {
        SearchStats::default()
    }
}

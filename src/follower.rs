//! # Path Following
//!
//! Per-agent state machine that walks a [`Path`] one bounded step at a time.
//!
//! ```text
//!   Idle --assign(non-empty)--> Advancing --last waypoint reached--> Arrived --> Idle
//! ```
//!
//! `Arrived` is only ever reported by [`PathFollower::step`]; the follower
//! itself is back to idle (or on its queued path) by the time it returns.

use crate::algorithms::common::Path;
use crate::grid::WorldPosition;
use log::trace;
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowerSettings {
    /// World units per second.
    pub move_speed: f32,
    /// A waypoint counts as reached once the agent is this close to it.
    pub stopping_distance: f32,
    /// Heading interpolation rate, per second.
    pub turn_rate: f32,
}

impl FollowerSettings {
    /// Clamps negative or NaN values to zero.
    pub fn sanitized(self) -> Self {
        FollowerSettings {
            move_speed: self.move_speed.max(0.0),
            stopping_distance: self.stopping_distance.max(0.0),
            turn_rate: self.turn_rate.max(0.0),
        }
    }
}

impl Default for FollowerSettings {
    fn default() -> Self {
        FollowerSettings {
            move_speed: 5.0,
            stopping_distance: 0.1,
            turn_rate: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    Idle,
    Advancing,
    Arrived,
}

/// What happened to a path handed to [`PathFollower::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// The follower was idle and starts on the path at its next step.
    Started,
    /// The follower is busy; the path starts once the current one arrives.
    Queued,
    /// The path was empty.
    Rejected,
}

#[derive(Debug, Clone, Default)]
pub struct PathFollower {
    settings: FollowerSettings,
    path: Path,
    waypoint_index: usize,
    is_moving: bool,
    queued: Option<Path>,
}

impl PathFollower {
    /// Settings are passed through [`FollowerSettings::sanitized`]. A zero
    /// move speed leaves the follower advancing in place.
    pub fn new(settings: FollowerSettings) -> Self {
        PathFollower {
            settings: settings.sanitized(),
            ..PathFollower::default()
        }
    }

    pub fn settings(&self) -> &FollowerSettings {
        &self.settings
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    pub fn waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    pub fn has_queued_path(&self) -> bool {
        self.queued.is_some()
    }

    pub fn state(&self) -> FollowerState {
        if self.is_moving {
            FollowerState::Advancing
        } else {
            FollowerState::Idle
        }
    }

    /// The waypoint currently being approached, if any.
    pub fn current_waypoint(&self) -> Option<&WorldPosition> {
        if self.is_moving {
            self.path.waypoints().get(self.waypoint_index)
        } else {
            None
        }
    }

    /// Waypoints from the current index to the end of the path. Empty once
    /// the path has been walked.
    pub fn remaining_waypoints(&self) -> &[WorldPosition] {
        let waypoints = self.path.waypoints();
        &waypoints[self.waypoint_index.min(waypoints.len())..]
    }

    /// Starts `path` if idle, queues it if a path is already being walked.
    pub fn assign(&mut self, path: Path) -> Assignment {
        if path.is_empty() {
            return Assignment::Rejected;
        }
        if self.is_moving {
            self.queued = Some(path);
            return Assignment::Queued;
        }
        self.begin(path);
        Assignment::Started
    }

    /// Swaps the active path immediately; the next step walks `path` from its
    /// first waypoint. An empty path stops the follower. Any queued path is
    /// dropped.
    pub fn replace(&mut self, path: Path) {
        self.queued = None;
        self.begin(path);
    }

    /// Stops and forgets every path.
    pub fn clear(&mut self) {
        self.replace(Path::empty());
    }

    fn begin(&mut self, path: Path) {
        self.is_moving = !path.is_empty();
        self.path = path;
        self.waypoint_index = 0;
    }

    /// Advances by one time step of `dt` seconds.
    ///
    /// Waypoints already within stopping distance are skipped without
    /// spending the step; at most one translation happens per call. The
    /// vertical coordinate is pinned to `agent_height`.
    pub fn step(
        &mut self,
        position: &mut WorldPosition,
        heading: &mut f32,
        agent_height: f32,
        dt: f32,
    ) -> FollowerState {
        if !self.is_moving {
            return FollowerState::Idle;
        }

        let max_step = (self.settings.move_speed * dt).max(0.0);
        position.y = agent_height;

        while let Some(waypoint) = self.path.waypoints().get(self.waypoint_index) {
            let mut target = *waypoint;
            target.y = agent_height;

            if position.distance(&target) > self.settings.stopping_distance {
                *position = move_towards(*position, target, max_step);

                if let Some(next) = self.path.waypoints().get(self.waypoint_index + 1) {
                    let t = (dt * self.settings.turn_rate).clamp(0.0, 1.0);
                    *heading = turn_towards(*heading, *position, *next, t);
                }
                return FollowerState::Advancing;
            }

            self.waypoint_index += 1;
            trace!(
                "waypoint {}/{} reached at {}",
                self.waypoint_index,
                self.path.len(),
                position
            );
        }

        self.is_moving = false;
        if let Some(next) = self.queued.take() {
            self.begin(next);
        }
        FollowerState::Arrived
    }
}

/// Moves `current` toward `target` by at most `max_delta`, landing exactly on
/// `target` when it is within reach.
pub fn move_towards(
    current: WorldPosition,
    target: WorldPosition,
    max_delta: f32,
) -> WorldPosition {
    let dx = target.x - current.x;
    let dy = target.y - current.y;
    let dz = target.z - current.z;
    let distance = (dx * dx + dy * dy + dz * dz).sqrt();
    if distance <= max_delta || distance == 0.0 {
        return target;
    }
    let scale = max_delta / distance;
    WorldPosition::new(current.x + dx * scale, current.y + dy * scale, current.z + dz * scale)
}

/// Yaw (radians, 0 = facing +z) interpolated from `heading` toward the
/// direction from `from` to `to` on the horizontal plane.
fn turn_towards(heading: f32, from: WorldPosition, to: WorldPosition, t: f32) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    if dx * dx + dz * dz < 1e-12 {
        return heading;
    }
    let desired = dx.atan2(dz);
    let mut delta = (desired - heading) % (2.0 * PI);
    if delta > PI {
        delta -= 2.0 * PI;
    } else if delta < -PI {
        delta += 2.0 * PI;
    }
    heading + delta * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(points: &[(f32, f32)]) -> Path {
        points
            .iter()
            .map(|&(x, z)| WorldPosition::new(x, 0.5, z))
            .collect::<Vec<_>>()
            .into()
    }

    fn run_to_completion(follower: &mut PathFollower, position: &mut WorldPosition) -> usize {
        let mut heading = 0.0;
        let mut steps = 0;
        while follower.is_moving() {
            follower.step(position, &mut heading, 0.5, 0.05);
            steps += 1;
            assert!(steps < 10_000, "follower never arrived");
        }
        steps
    }

    #[test]
    fn idle_until_assigned() {
        let mut follower = PathFollower::default();
        let mut position = WorldPosition::default();
        let mut heading = 0.0;

        assert_eq!(follower.state(), FollowerState::Idle);
        assert_eq!(follower.step(&mut position, &mut heading, 0.5, 0.1), FollowerState::Idle);
        assert_eq!(follower.assign(Path::empty()), Assignment::Rejected);
        assert!(!follower.is_moving());
        assert!(follower.remaining_waypoints().is_empty());
    }

    #[test]
    fn walks_every_waypoint() {
        let mut follower = PathFollower::default();
        let mut position = WorldPosition::new(0.0, 0.5, 0.0);
        let waypoints = path(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (2.0, 1.0)]);

        assert_eq!(follower.assign(waypoints), Assignment::Started);
        assert_eq!(follower.state(), FollowerState::Advancing);
        run_to_completion(&mut follower, &mut position);

        assert!(position.distance(&WorldPosition::new(2.0, 0.5, 1.0)) <= 0.1);
        assert_eq!(follower.waypoint_index(), 4);
        assert!(follower.remaining_waypoints().is_empty());
        assert_eq!(follower.state(), FollowerState::Idle);
    }

    #[test]
    fn negative_settings_are_clamped() {
        let settings = FollowerSettings {
            move_speed: 2.0,
            stopping_distance: -1.0,
            turn_rate: f32::NAN,
        };
        let mut follower = PathFollower::new(settings);
        assert_eq!(follower.settings().stopping_distance, 0.0);
        assert_eq!(follower.settings().turn_rate, 0.0);

        let mut position = WorldPosition::new(0.0, 0.5, 0.0);
        follower.assign(path(&[(0.0, 0.0), (1.0, 0.0), (1.0, 2.0)]));
        run_to_completion(&mut follower, &mut position);

        assert_eq!(position, WorldPosition::new(1.0, 0.5, 2.0));
        assert_eq!(follower.waypoint_index(), 3);
    }

    #[test]
    fn one_translation_per_step() {
        let settings = FollowerSettings {
            move_speed: 1.0,
            ..FollowerSettings::default()
        };
        let mut follower = PathFollower::new(settings);
        let mut position = WorldPosition::new(0.0, 0.5, 0.0);
        let mut heading = 0.0;
        follower.assign(path(&[(0.0, 0.0), (3.0, 0.0)]));

        let state = follower.step(&mut position, &mut heading, 0.5, 0.5);

        assert_eq!(state, FollowerState::Advancing);
        assert_eq!(follower.waypoint_index(), 1);
        assert!((position.x - 0.5).abs() < 1e-6);
        assert_eq!(follower.remaining_waypoints().len(), 1);
    }

    #[test]
    fn holds_agent_height() {
        let mut follower = PathFollower::default();
        let mut position = WorldPosition::new(0.0, 3.0, 0.0);
        let mut heading = 0.0;
        follower.assign(path(&[(0.0, 0.0), (0.0, 4.0)]));

        follower.step(&mut position, &mut heading, 0.5, 0.1);

        assert_eq!(position.y, 0.5);
    }

    #[test]
    fn second_assignment_is_queued() {
        let mut follower = PathFollower::default();
        let mut position = WorldPosition::new(0.0, 0.5, 0.0);
        follower.assign(path(&[(0.0, 0.0), (1.0, 0.0)]));

        assert_eq!(follower.assign(path(&[(1.0, 0.0), (1.0, 2.0)])), Assignment::Queued);
        assert!(follower.has_queued_path());
        assert_eq!(follower.current_path().len(), 2);

        let mut heading = 0.0;
        let mut arrivals = 0;
        let mut steps = 0;
        while follower.is_moving() {
            if follower.step(&mut position, &mut heading, 0.5, 0.05) == FollowerState::Arrived {
                arrivals += 1;
            }
            steps += 1;
            assert!(steps < 10_000);
        }

        assert_eq!(arrivals, 2);
        assert!(position.distance(&WorldPosition::new(1.0, 0.5, 2.0)) <= 0.1);
    }

    #[test]
    fn replace_restarts_from_first_waypoint() {
        let mut follower = PathFollower::default();
        let mut position = WorldPosition::new(0.0, 0.5, 0.0);
        let mut heading = 0.0;
        follower.assign(path(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]));
        for _ in 0..5 {
            follower.step(&mut position, &mut heading, 0.5, 0.05);
        }
        assert!(follower.waypoint_index() > 0);

        let replacement = path(&[(0.0, 3.0), (0.0, 4.0)]);
        follower.replace(replacement.clone());

        assert_eq!(follower.waypoint_index(), 0);
        assert_eq!(follower.current_path(), &replacement);
        assert_eq!(follower.remaining_waypoints(), replacement.waypoints());
        assert!(follower.is_moving());

        follower.replace(Path::empty());
        assert!(!follower.is_moving());
        assert_eq!(follower.step(&mut position, &mut heading, 0.5, 0.05), FollowerState::Idle);
    }

    #[test]
    fn turns_toward_next_waypoint() {
        let mut follower = PathFollower::default();
        let mut position = WorldPosition::new(0.0, 0.5, 0.0);
        let mut heading = 0.0;
        follower.assign(path(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]));

        for _ in 0..20 {
            follower.step(&mut position, &mut heading, 0.5, 0.05);
        }

        // Facing +x is a quarter turn from +z.
        assert!((heading - PI / 2.0).abs() < 0.05, "heading {}", heading);
    }

    #[test]
    fn move_towards_never_overshoots() {
        let from = WorldPosition::new(0.0, 0.0, 0.0);
        let to = WorldPosition::new(0.0, 0.0, 1.0);
        assert_eq!(move_towards(from, to, 5.0), to);
        assert_eq!(move_towards(from, to, 0.25), WorldPosition::new(0.0, 0.0, 0.25));
    }
}

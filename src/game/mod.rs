//! Race simulation core: teams, commands, observations and the tick loop

pub mod commands;
pub mod engine;
pub mod lap_log;
pub mod observations;
pub mod physics;
pub mod registry;
pub mod snapshot;
pub mod stepper;

pub use commands::{CommandCache, CommandError};
pub use lap_log::LapLogFile;
pub use observations::{ObservationCache, ObservationError};
pub use physics::KinematicEngine;
pub use registry::{AuthError, TeamRegistry, TeamToken};
pub use stepper::{Stepper, StepperPhase, StepperSettings};

use serde::{Deserialize, Serialize};

/// Number of range readings in every scan
pub const SCAN_BEAMS: usize = 100;

/// Dense team index, `0..N` in roster order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub usize);

impl TeamId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Control input for one vehicle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Command {
    /// Target longitudinal speed (m/s)
    pub speed: f64,
    /// Steering angle (rad), positive turns left
    pub steer: f64,
}

impl Command {
    pub fn new(speed: f64, steer: f64) -> Self {
        Self { speed, steer }
    }
}

/// Admissible command ranges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandBounds {
    pub speed_min: f64,
    pub speed_max: f64,
    pub steer_min: f64,
    pub steer_max: f64,
}

impl Default for CommandBounds {
    fn default() -> Self {
        Self {
            speed_min: -5.0,
            speed_max: 20.0,
            steer_min: -0.4189,
            steer_max: 0.4189,
        }
    }
}

impl CommandBounds {
    /// Correct a command into range. NaN falls back to the clamped zero.
    pub fn clamp(&self, cmd: Command) -> Command {
        Command {
            speed: clamp_component(cmd.speed, self.speed_min, self.speed_max),
            steer: clamp_component(cmd.steer, self.steer_min, self.steer_max),
        }
    }

    pub fn contains(&self, cmd: Command) -> bool {
        (self.speed_min..=self.speed_max).contains(&cmd.speed)
            && (self.steer_min..=self.steer_max).contains(&cmd.steer)
    }
}

fn clamp_component(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0_f64.clamp(min, max)
    } else {
        value.clamp(min, max)
    }
}

/// Initial pose handed to the engine on reset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StartPose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

/// One team's private view after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Tick this observation was produced at
    pub tick: u64,
    pub scan: Vec<f64>,
    pub pose_x: f64,
    pub pose_y: f64,
    pub pose_theta: f64,
    pub linear_vel_x: f64,
    pub linear_vel_y: f64,
    pub ang_vel_z: f64,
    pub lap_count: u32,
}

/// All teams' state for one tick, indexed by team id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub tick: u64,
    pub server_time: u64,
    pub done: bool,
    pub scans: Vec<Vec<f64>>,
    pub poses_x: Vec<f64>,
    pub poses_y: Vec<f64>,
    pub poses_theta: Vec<f64>,
    pub linear_vels_x: Vec<f64>,
    pub linear_vels_y: Vec<f64>,
    pub ang_vels_z: Vec<f64>,
    pub lap_counts: Vec<u32>,
    pub lap_times: Vec<f64>,
    pub collisions: Vec<bool>,
}

/// Aggregate without the scan arrays, served to spectators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectatorSnapshot {
    pub tick: u64,
    pub server_time: u64,
    pub done: bool,
    pub poses_x: Vec<f64>,
    pub poses_y: Vec<f64>,
    pub poses_theta: Vec<f64>,
    pub linear_vels_x: Vec<f64>,
    pub linear_vels_y: Vec<f64>,
    pub ang_vels_z: Vec<f64>,
    pub lap_counts: Vec<u32>,
    pub lap_times: Vec<f64>,
    pub collisions: Vec<bool>,
}

impl From<&AggregateSnapshot> for SpectatorSnapshot {
    fn from(agg: &AggregateSnapshot) -> Self {
        Self {
            tick: agg.tick,
            server_time: agg.server_time,
            done: agg.done,
            poses_x: agg.poses_x.clone(),
            poses_y: agg.poses_y.clone(),
            poses_theta: agg.poses_theta.clone(),
            linear_vels_x: agg.linear_vels_x.clone(),
            linear_vels_y: agg.linear_vels_y.clone(),
            ang_vels_z: agg.ang_vels_z.clone(),
            lap_counts: agg.lap_counts.clone(),
            lap_times: agg.lap_times.clone(),
            collisions: agg.collisions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_saturates_both_components() {
        let bounds = CommandBounds::default();
        let cmd = bounds.clamp(Command::new(99.0, -99.0));
        assert_eq!(cmd, Command::new(bounds.speed_max, bounds.steer_min));
    }

    #[test]
    fn test_clamp_steer_uses_steer_bounds() {
        let bounds = CommandBounds {
            speed_min: 0.0,
            speed_max: 10.0,
            steer_min: -0.5,
            steer_max: 0.5,
        };
        let cmd = bounds.clamp(Command::new(5.0, 3.0));
        assert_eq!(cmd, Command::new(5.0, 0.5));
    }

    #[test]
    fn test_clamp_in_range_is_identity() {
        let bounds = CommandBounds::default();
        let cmd = Command::new(3.5, 0.1);
        assert_eq!(bounds.clamp(cmd), cmd);
    }

    #[test]
    fn test_clamp_non_finite() {
        let bounds = CommandBounds {
            speed_min: 1.0,
            speed_max: 10.0,
            steer_min: -0.4,
            steer_max: 0.4,
        };
        let cmd = bounds.clamp(Command::new(f64::NAN, f64::NEG_INFINITY));
        assert_eq!(cmd, Command::new(1.0, -0.4));
        assert!(bounds.contains(cmd));

        let cmd = bounds.clamp(Command::new(f64::INFINITY, f64::NAN));
        assert_eq!(cmd, Command::new(10.0, 0.0));
    }

    #[test]
    fn test_spectator_snapshot_drops_scans() {
        let agg = AggregateSnapshot {
            tick: 7,
            server_time: 0,
            done: false,
            scans: vec![vec![1.0; SCAN_BEAMS]],
            poses_x: vec![1.0],
            poses_y: vec![2.0],
            poses_theta: vec![0.5],
            linear_vels_x: vec![3.0],
            linear_vels_y: vec![0.0],
            ang_vels_z: vec![0.1],
            lap_counts: vec![2],
            lap_times: vec![12.5],
            collisions: vec![false],
        };

        let spectator = SpectatorSnapshot::from(&agg);
        let json = serde_json::to_value(&spectator).unwrap();
        assert!(json.get("scans").is_none());
        assert_eq!(json["tick"], 7);
        assert_eq!(json["lap_counts"][0], 2);
    }
}

//! Interface to the external vehicle simulator
//!
//! The relay never looks inside the physics. It hands the engine one command
//! per team and reads back a state keyed the same way the simulator reports
//! it: one array per quantity, indexed by team.

use super::{Command, StartPose};

/// Raw simulator state after reset or step
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineState {
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

/// Result of one engine step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state: EngineState,
    /// Simulated time advanced by this step
    pub reward: f64,
    /// Engine-reported termination flag
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine reset failed: {0}")]
    Reset(String),

    #[error("Engine step failed: {0}")]
    Step(String),

    #[error("Engine returned invalid state: {0}")]
    InvalidState(String),
}

/// A non-reentrant simulator driven by exactly one stepper
pub trait SimEngine: Send {
    /// Place every vehicle at its starting pose
    fn reset(&mut self, starts: &[StartPose]) -> Result<EngineState, EngineError>;

    /// Advance all vehicles by `elapsed` seconds using one command per team
    fn step(&mut self, commands: &[Command], elapsed: f64) -> Result<StepOutcome, EngineError>;
}

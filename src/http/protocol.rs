//! HTTP wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::{Command, StepperPhase, TeamId, TeamToken};

/// Query string carrying a team's credential
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub team_token: Option<String>,
}

/// Body of a command submission
#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub cmd: Command,
    pub team_token: TeamToken,
}

/// Reply to an accepted command
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandAckResponse {
    pub status: String,
    pub team_id: TeamId,
    /// Command as stored, after clamping
    pub cmd: Command,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// Latest published tick, absent before the first
    pub tick: Option<u64>,
    pub stepper: StepperPhase,
    pub teams: usize,
}

//! Transport-independent relay between clients and the caches
//!
//! Holds no simulation state: every call resolves the caller's token and
//! forwards to the command or observation cache.

use std::sync::Arc;

use tracing::{debug, error};

use crate::game::{
    AuthError, Command, CommandCache, CommandError, Observation, ObservationCache,
    ObservationError, SpectatorSnapshot, TeamId, TeamRegistry, TeamToken,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Team {0} has no slot")]
    UnknownTeam(TeamId),

    #[error("No observation published yet")]
    NotYetAvailable,
}

impl From<CommandError> for RelayError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::UnknownTeam(id) => RelayError::UnknownTeam(id),
        }
    }
}

impl From<ObservationError> for RelayError {
    fn from(err: ObservationError) -> Self {
        match err {
            ObservationError::NotYetAvailable => RelayError::NotYetAvailable,
            ObservationError::UnknownTeam(id) => RelayError::UnknownTeam(id),
            ObservationError::WrongTeamCount { expected, got } => {
                // Only the stepper publishes; a reader can never cause this
                error!(expected, got, "Unexpected publish error on read path");
                RelayError::NotYetAvailable
            }
        }
    }
}

/// Acknowledgement for an accepted command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandAck {
    pub team_id: TeamId,
    /// Command as stored, after clamping
    pub command: Command,
}

#[derive(Clone)]
pub struct RelayServer {
    registry: Arc<TeamRegistry>,
    commands: Arc<CommandCache>,
    observations: Arc<ObservationCache>,
}

impl RelayServer {
    pub fn new(
        registry: Arc<TeamRegistry>,
        commands: Arc<CommandCache>,
        observations: Arc<ObservationCache>,
    ) -> Self {
        Self {
            registry,
            commands,
            observations,
        }
    }

    /// Resolve a token to its team
    pub fn authenticate(&self, token: &TeamToken) -> Result<TeamId, RelayError> {
        self.registry.resolve(token).map_err(|e| {
            debug!("Rejected team token");
            RelayError::Auth(e)
        })
    }

    /// Store a team's latest command
    pub fn submit_command(
        &self,
        token: &TeamToken,
        command: Command,
    ) -> Result<CommandAck, RelayError> {
        let team_id = self.authenticate(token)?;
        let stored = self.commands.set(team_id, command)?;

        if stored != command {
            debug!(
                team_id = %team_id,
                speed = command.speed,
                steer = command.steer,
                "Command clamped"
            );
        }

        Ok(CommandAck {
            team_id,
            command: stored,
        })
    }

    /// Latest observation for the calling team
    pub fn fetch_observation(&self, token: &TeamToken) -> Result<Observation, RelayError> {
        let team_id = self.authenticate(token)?;
        Ok(self.observations.get(team_id)?)
    }

    /// All teams' latest state, scans stripped
    pub fn fetch_all(&self) -> Result<SpectatorSnapshot, RelayError> {
        let frame = self.observations.frame()?;
        Ok(SpectatorSnapshot::from(&frame.aggregate))
    }

    /// Tick of the latest published frame
    pub fn latest_tick(&self) -> Option<u64> {
        self.observations.latest_tick()
    }

    pub fn team_count(&self) -> usize {
        self.registry.len()
    }
}

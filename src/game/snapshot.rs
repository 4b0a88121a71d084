//! Snapshot building from raw engine state

use crate::util::time::unix_millis;

use super::engine::{EngineError, EngineState, StepOutcome};
use super::{AggregateSnapshot, Observation, TeamId, SCAN_BEAMS};

/// Splits engine output into per-team observations and the shared aggregate
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    num_teams: usize,
}

impl SnapshotBuilder {
    pub fn new(num_teams: usize) -> Self {
        Self { num_teams }
    }

    /// Reject state that cannot be split into `num_teams` complete observations
    pub fn validate(&self, state: &EngineState) -> Result<(), EngineError> {
        let n = self.num_teams;
        let lengths = [
            ("scans", state.scans.len()),
            ("poses_x", state.poses_x.len()),
            ("poses_y", state.poses_y.len()),
            ("poses_theta", state.poses_theta.len()),
            ("linear_vels_x", state.linear_vels_x.len()),
            ("linear_vels_y", state.linear_vels_y.len()),
            ("ang_vels_z", state.ang_vels_z.len()),
            ("lap_counts", state.lap_counts.len()),
            ("lap_times", state.lap_times.len()),
            ("collisions", state.collisions.len()),
        ];

        for (key, len) in lengths {
            if len != n {
                return Err(EngineError::InvalidState(format!(
                    "{key} has {len} entries, expected {n}"
                )));
            }
        }

        for (team, scan) in state.scans.iter().enumerate() {
            if scan.len() != SCAN_BEAMS {
                return Err(EngineError::InvalidState(format!(
                    "scan for team {team} has {} beams, expected {SCAN_BEAMS}",
                    scan.len()
                )));
            }
        }

        let pose_fields = [
            ("poses_x", &state.poses_x),
            ("poses_y", &state.poses_y),
            ("poses_theta", &state.poses_theta),
            ("linear_vels_x", &state.linear_vels_x),
            ("linear_vels_y", &state.linear_vels_y),
            ("ang_vels_z", &state.ang_vels_z),
        ];
        for (key, values) in pose_fields {
            if let Some(team) = values.iter().position(|v| !v.is_finite()) {
                return Err(EngineError::InvalidState(format!(
                    "{key} is not finite for team {team}"
                )));
            }
        }

        Ok(())
    }

    /// Observation for one team; the state must already be validated
    fn extract(&self, state: &EngineState, team_id: TeamId, tick: u64) -> Observation {
        let i = team_id.index();
        Observation {
            tick,
            scan: state.scans[i].clone(),
            pose_x: state.poses_x[i],
            pose_y: state.poses_y[i],
            pose_theta: state.poses_theta[i],
            linear_vel_x: state.linear_vels_x[i],
            linear_vel_y: state.linear_vels_y[i],
            ang_vel_z: state.ang_vels_z[i],
            lap_count: state.lap_counts[i],
        }
    }

    /// Build the full output of one tick
    pub fn build(
        &self,
        tick: u64,
        outcome: StepOutcome,
    ) -> Result<(Vec<Observation>, AggregateSnapshot), EngineError> {
        self.validate(&outcome.state)?;

        let observations = (0..self.num_teams)
            .map(|i| self.extract(&outcome.state, TeamId(i), tick))
            .collect();

        let state = outcome.state;
        let aggregate = AggregateSnapshot {
            tick,
            server_time: unix_millis(),
            done: outcome.done,
            scans: state.scans,
            poses_x: state.poses_x,
            poses_y: state.poses_y,
            poses_theta: state.poses_theta,
            linear_vels_x: state.linear_vels_x,
            linear_vels_y: state.linear_vels_y,
            ang_vels_z: state.ang_vels_z,
            lap_counts: state.lap_counts,
            lap_times: state.lap_times,
            collisions: state.collisions,
        };

        Ok((observations, aggregate))
    }
}

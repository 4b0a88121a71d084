//! Published per-tick observations
//!
//! A tick's output is stored as one immutable [`TickFrame`] behind a shared
//! pointer. Publishing swaps the pointer; readers clone it. No reader can see
//! fields from two different ticks.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use super::{AggregateSnapshot, Observation, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ObservationError {
    #[error("No observation published yet")]
    NotYetAvailable,

    #[error("Unknown team {0}")]
    UnknownTeam(TeamId),

    #[error("Frame has {got} observations, expected {expected}")]
    WrongTeamCount { expected: usize, got: usize },
}

/// Everything the stepper produced for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickFrame {
    pub tick: u64,
    pub observations: Vec<Observation>,
    pub aggregate: AggregateSnapshot,
}

impl TickFrame {
    pub fn observation(&self, team_id: TeamId) -> Option<&Observation> {
        self.observations.get(team_id.index())
    }
}

/// Latest published frame, shared between the stepper and request handlers
#[derive(Debug)]
pub struct ObservationCache {
    num_teams: usize,
    current: RwLock<Option<Arc<TickFrame>>>,
}

impl ObservationCache {
    pub fn new(num_teams: usize) -> Self {
        Self {
            num_teams,
            current: RwLock::new(None),
        }
    }

    /// Replace all team slots and the aggregate in one step
    pub fn publish(
        &self,
        observations: Vec<Observation>,
        aggregate: AggregateSnapshot,
    ) -> Result<u64, ObservationError> {
        if observations.len() != self.num_teams {
            return Err(ObservationError::WrongTeamCount {
                expected: self.num_teams,
                got: observations.len(),
            });
        }

        let tick = aggregate.tick;
        let frame = Arc::new(TickFrame {
            tick,
            observations,
            aggregate,
        });

        // Build outside the lock; the write section is a pointer swap.
        let previous = self.current.write().replace(frame);
        drop(previous);

        Ok(tick)
    }

    /// The whole latest frame
    pub fn frame(&self) -> Result<Arc<TickFrame>, ObservationError> {
        self.current
            .read()
            .clone()
            .ok_or(ObservationError::NotYetAvailable)
    }

    /// Latest observation for one team
    pub fn get(&self, team_id: TeamId) -> Result<Observation, ObservationError> {
        if team_id.index() >= self.num_teams {
            error!(team_id = %team_id, teams = self.num_teams, "Observation slot out of range");
            return Err(ObservationError::UnknownTeam(team_id));
        }

        let frame = self.frame()?;
        frame
            .observation(team_id)
            .cloned()
            .ok_or(ObservationError::UnknownTeam(team_id))
    }

    /// Latest aggregate of all teams
    pub fn get_aggregate(&self) -> Result<AggregateSnapshot, ObservationError> {
        Ok(self.frame()?.aggregate.clone())
    }

    /// Tick of the latest frame, if any
    pub fn latest_tick(&self) -> Option<u64> {
        self.current.read().as_ref().map(|frame| frame.tick)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::SCAN_BEAMS;

    /// Frame where every numeric field encodes the tick and team
    pub(crate) fn frame_for(tick: u64, teams: usize) -> (Vec<Observation>, AggregateSnapshot) {
        let observations: Vec<Observation> = (0..teams)
            .map(|team| Observation {
                tick,
                scan: vec![tick as f64; SCAN_BEAMS],
                pose_x: tick as f64,
                pose_y: team as f64,
                pose_theta: 0.0,
                linear_vel_x: tick as f64,
                linear_vel_y: 0.0,
                ang_vel_z: 0.0,
                lap_count: tick as u32,
            })
            .collect();

        let aggregate = AggregateSnapshot {
            tick,
            server_time: 0,
            done: false,
            scans: observations.iter().map(|o| o.scan.clone()).collect(),
            poses_x: observations.iter().map(|o| o.pose_x).collect(),
            poses_y: observations.iter().map(|o| o.pose_y).collect(),
            poses_theta: vec![0.0; teams],
            linear_vels_x: observations.iter().map(|o| o.linear_vel_x).collect(),
            linear_vels_y: vec![0.0; teams],
            ang_vels_z: vec![0.0; teams],
            lap_counts: vec![tick as u32; teams],
            lap_times: vec![0.0; teams],
            collisions: vec![false; teams],
        };

        (observations, aggregate)
    }

    #[test]
    fn test_not_yet_available_before_first_publish() {
        let cache = ObservationCache::new(2);
        assert_eq!(cache.get(TeamId(0)), Err(ObservationError::NotYetAvailable));
        assert_eq!(cache.get_aggregate(), Err(ObservationError::NotYetAvailable));
        assert_eq!(cache.latest_tick(), None);
    }

    #[test]
    fn test_publish_then_get() {
        let cache = ObservationCache::new(2);
        let (obs, agg) = frame_for(1, 2);
        cache.publish(obs.clone(), agg.clone()).unwrap();

        assert_eq!(cache.get(TeamId(1)).unwrap(), obs[1]);
        assert_eq!(cache.get_aggregate().unwrap(), agg);
        assert_eq!(cache.latest_tick(), Some(1));
    }

    #[test]
    fn test_repeated_reads_identical_between_publishes() {
        let cache = ObservationCache::new(2);
        let (obs, agg) = frame_for(3, 2);
        cache.publish(obs, agg).unwrap();

        let first = cache.get(TeamId(0)).unwrap();
        for _ in 0..10 {
            assert_eq!(cache.get(TeamId(0)).unwrap(), first);
        }
    }

    #[test]
    fn test_wrong_team_count_rejected() {
        let cache = ObservationCache::new(3);
        let (obs, agg) = frame_for(1, 2);
        assert_eq!(
            cache.publish(obs, agg),
            Err(ObservationError::WrongTeamCount { expected: 3, got: 2 })
        );
        assert_eq!(cache.latest_tick(), None);
    }

    #[test]
    fn test_unknown_team() {
        let cache = ObservationCache::new(2);
        let (obs, agg) = frame_for(1, 2);
        cache.publish(obs, agg).unwrap();
        assert_eq!(cache.get(TeamId(2)), Err(ObservationError::UnknownTeam(TeamId(2))));
    }

    #[test]
    fn test_concurrent_readers_see_single_tick() {
        let cache = Arc::new(ObservationCache::new(2));
        let (obs, agg) = frame_for(0, 2);
        cache.publish(obs, agg).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..5_000 {
                        let frame = cache.frame().unwrap();
                        let t0 = frame.observations[0].tick;
                        let t1 = frame.observations[1].tick;
                        assert_eq!(t0, t1);
                        assert_eq!(t0, frame.aggregate.tick);
                        assert_eq!(frame.observations[1].pose_x, t0 as f64);
                        assert!(frame.observations[0].scan.iter().all(|&r| r == t0 as f64));
                    }
                })
            })
            .collect();

        for tick in 1..=500 {
            let (obs, agg) = frame_for(tick, 2);
            cache.publish(obs, agg).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.latest_tick(), Some(500));
    }
}

//! Per-team command slots
//!
//! Each team owns one slot guarded by its own lock, so a team posting at a
//! high rate only ever contends with itself. The stepper copies the slots one
//! at a time; it never holds more than one slot lock.

use parking_lot::Mutex;
use tracing::error;

use super::{Command, CommandBounds, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown team {0}")]
    UnknownTeam(TeamId),
}

/// Last accepted command for every team
#[derive(Debug)]
pub struct CommandCache {
    slots: Box<[Mutex<Command>]>,
    bounds: CommandBounds,
}

impl CommandCache {
    /// One slot per team, each holding the clamped default
    pub fn new(num_teams: usize, bounds: CommandBounds, default_command: Command) -> Self {
        let default_command = bounds.clamp(default_command);
        let slots = (0..num_teams)
            .map(|_| Mutex::new(default_command))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { slots, bounds }
    }

    fn slot(&self, team_id: TeamId) -> Result<&Mutex<Command>, CommandError> {
        self.slots.get(team_id.index()).ok_or_else(|| {
            error!(team_id = %team_id, teams = self.slots.len(), "Command slot out of range");
            CommandError::UnknownTeam(team_id)
        })
    }

    /// Clamp and store a command, returning the stored value
    pub fn set(&self, team_id: TeamId, command: Command) -> Result<Command, CommandError> {
        let slot = self.slot(team_id)?;
        let clamped = self.bounds.clamp(command);
        *slot.lock() = clamped;
        Ok(clamped)
    }

    /// Overwrite a slot with a default (startup seeding)
    pub fn reset(&self, team_id: TeamId, default_command: Command) -> Result<(), CommandError> {
        self.set(team_id, default_command).map(|_| ())
    }

    /// Read one team's current command
    #[cfg(test)]
    pub fn get(&self, team_id: TeamId) -> Result<Command, CommandError> {
        Ok(*self.slot(team_id)?.lock())
    }

    /// Copy of every slot, indexed by team id
    pub fn get_all(&self) -> Vec<Command> {
        self.slots.iter().map(|slot| *slot.lock()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache(teams: usize) -> CommandCache {
        CommandCache::new(teams, CommandBounds::default(), Command::default())
    }

    #[test]
    fn test_slots_start_at_default() {
        let cache = CommandCache::new(3, CommandBounds::default(), Command::new(1.0, 0.0));
        assert_eq!(cache.get_all(), vec![Command::new(1.0, 0.0); 3]);
    }

    #[test]
    fn test_set_clamps_before_storing() {
        let cache = cache(2);
        let bounds = CommandBounds::default();

        let stored = cache.set(TeamId(1), Command::new(99.0, -99.0)).unwrap();

        assert_eq!(stored, Command::new(bounds.speed_max, bounds.steer_min));
        assert_eq!(cache.get(TeamId(1)).unwrap(), stored);
        assert_eq!(cache.get(TeamId(0)).unwrap(), Command::default());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = cache(2);
        let a = Command::new(2.0, 0.1);
        let b = Command::new(4.0, -0.2);

        cache.set(TeamId(0), a).unwrap();
        cache.set(TeamId(0), b).unwrap();

        assert_eq!(cache.get_all()[0], b);
    }

    #[test]
    fn test_unknown_team_rejected() {
        let cache = cache(2);
        assert_eq!(
            cache.set(TeamId(2), Command::new(1.0, 0.0)),
            Err(CommandError::UnknownTeam(TeamId(2)))
        );
        assert_eq!(cache.get(TeamId(5)), Err(CommandError::UnknownTeam(TeamId(5))));
        assert_eq!(cache.get_all(), vec![Command::default(); 2]);
    }

    #[test]
    fn test_reset_overwrites() {
        let cache = cache(1);
        cache.set(TeamId(0), Command::new(5.0, 0.3)).unwrap();
        cache.reset(TeamId(0), Command::default()).unwrap();
        assert_eq!(cache.get(TeamId(0)).unwrap(), Command::default());
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let cache = Arc::new(cache(1));
        // Each writer uses speed == steer * 10 so a torn slot is detectable
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..2_000 {
                        let steer = ((w * 2_000 + i) % 40) as f64 / 100.0;
                        cache.set(TeamId(0), Command::new(steer * 10.0, steer)).unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..2_000 {
            let cmd = cache.get_all()[0];
            assert!((cmd.speed - cmd.steer * 10.0).abs() < 1e-9);
        }

        for writer in writers {
            writer.join().unwrap();
        }
    }
}

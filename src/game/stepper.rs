//! Authoritative tick loop
//!
//! The stepper owns the engine. Each tick it copies every team's latest
//! command, steps the engine once, and publishes the resulting frame. It runs
//! on a blocking thread; request handlers only ever touch the two caches.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::util::time::{tick_interval, Pacer, TickClock};

use super::commands::{CommandCache, CommandError};
use super::engine::{EngineError, SimEngine};
use super::lap_log::LapLog;
use super::observations::{ObservationCache, ObservationError};
use super::snapshot::SnapshotBuilder;
use super::{Command, StartPose, TeamId};

/// Ticks between rate summaries in the debug log
const RATE_LOG_INTERVAL: u64 = 600;
/// Lap log failures after the first are reported once per this many
const LAP_LOG_WARN_EVERY: u64 = 1_000;

/// Stepper lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepperPhase {
    /// Created, engine not reset yet
    Uninitialized,
    /// Ticking
    Running,
    /// Shut down on request
    Stopped,
    /// Stopped by an engine failure; the last frame stays published
    Halted,
}

#[derive(Debug, thiserror::Error)]
pub enum StepperError {
    #[error("Stepper already started")]
    AlreadyStarted,

    #[error("Stepper is not running (phase {0:?})")]
    NotRunning(StepperPhase),

    #[error("{starts} starting positions for {teams} teams")]
    RosterMismatch { starts: usize, teams: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Publish(#[from] ObservationError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Tick loop tuning
#[derive(Debug, Clone)]
pub struct StepperSettings {
    /// One pose per team, in team id order
    pub starts: Vec<StartPose>,
    /// Command seeded into every slot on start
    pub default_command: Command,
    /// Report this step to the engine instead of the measured wall time
    pub fixed_timestep: Option<f64>,
    /// Target ticks per second; 0 runs as fast as the engine allows
    pub tick_rate_hz: f64,
}

/// Totals reported when the loop exits cleanly
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepperSummary {
    pub ticks: u64,
    pub sim_time: f64,
}

pub struct Stepper<E: SimEngine> {
    engine: E,
    commands: Arc<CommandCache>,
    observations: Arc<ObservationCache>,
    lap_log: Option<Box<dyn LapLog>>,
    snapshot_builder: SnapshotBuilder,
    settings: StepperSettings,
    phase_tx: watch::Sender<StepperPhase>,
    tick: u64,
    sim_time: f64,
    clock: TickClock,
    done_reported: bool,
    lap_log_failures: u64,
}

impl<E: SimEngine> Stepper<E> {
    pub fn new(
        engine: E,
        commands: Arc<CommandCache>,
        observations: Arc<ObservationCache>,
        settings: StepperSettings,
    ) -> Self {
        let (phase_tx, _) = watch::channel(StepperPhase::Uninitialized);
        let num_teams = commands.len();

        Self {
            engine,
            commands,
            observations,
            lap_log: None,
            snapshot_builder: SnapshotBuilder::new(num_teams),
            clock: TickClock::new(settings.fixed_timestep),
            settings,
            phase_tx,
            tick: 0,
            sim_time: 0.0,
            done_reported: false,
            lap_log_failures: 0,
        }
    }

    /// Persist lap counts after every tick
    pub fn with_lap_log(mut self, lap_log: Box<dyn LapLog>) -> Self {
        self.lap_log = Some(lap_log);
        self
    }

    /// Watch the lifecycle from other tasks
    pub fn subscribe(&self) -> watch::Receiver<StepperPhase> {
        self.phase_tx.subscribe()
    }

    pub fn phase(&self) -> StepperPhase {
        *self.phase_tx.borrow()
    }

    fn set_phase(&self, phase: StepperPhase) {
        self.phase_tx.send_replace(phase);
    }

    fn halt(&self, err: StepperError) -> StepperError {
        error!(
            tick = self.tick,
            error = %err,
            "Simulation halted; last published frame stays frozen"
        );
        self.set_phase(StepperPhase::Halted);
        err
    }

    /// Seed default commands and reset the engine
    pub fn start(&mut self) -> Result<(), StepperError> {
        if self.phase() != StepperPhase::Uninitialized {
            return Err(StepperError::AlreadyStarted);
        }

        let teams = self.commands.len();
        if self.settings.starts.len() != teams {
            return Err(StepperError::RosterMismatch {
                starts: self.settings.starts.len(),
                teams,
            });
        }

        for team in 0..teams {
            self.commands
                .reset(TeamId(team), self.settings.default_command)?;
        }

        if let Err(e) = self.engine.reset(&self.settings.starts) {
            return Err(self.halt(e.into()));
        }

        self.clock.reset();
        self.set_phase(StepperPhase::Running);
        info!(teams, "Simulation started");
        Ok(())
    }

    /// Run exactly one tick and publish its frame
    pub fn tick(&mut self) -> Result<u64, StepperError> {
        let phase = self.phase();
        if phase != StepperPhase::Running {
            return Err(StepperError::NotRunning(phase));
        }

        let commands = self.commands.get_all();
        let elapsed = self.clock.lap();

        let outcome = match self.engine.step(&commands, elapsed) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.halt(e.into())),
        };
        let reward = outcome.reward;

        let next_tick = self.tick + 1;
        let (observations, aggregate) = match self.snapshot_builder.build(next_tick, outcome) {
            Ok(frame) => frame,
            Err(e) => return Err(self.halt(e.into())),
        };

        if aggregate.done && !self.done_reported {
            info!(tick = next_tick, "Engine reported done, race continues");
            self.done_reported = true;
        }

        let lap_counts = aggregate.lap_counts.clone();
        if let Err(e) = self.observations.publish(observations, aggregate) {
            return Err(self.halt(e.into()));
        }

        self.tick = next_tick;
        self.sim_time += reward;
        self.record_laps(&lap_counts);

        Ok(next_tick)
    }

    fn record_laps(&mut self, lap_counts: &[u32]) {
        let Some(lap_log) = self.lap_log.as_mut() else {
            return;
        };

        if let Err(e) = lap_log.record(lap_counts) {
            self.lap_log_failures += 1;
            if self.lap_log_failures == 1 || self.lap_log_failures % LAP_LOG_WARN_EVERY == 0 {
                warn!(
                    error = %e,
                    failures = self.lap_log_failures,
                    "Failed to write lap log"
                );
            }
        }
    }

    /// Tick until `shutdown` turns true, its sender is dropped, or the engine
    /// fails.
    ///
    /// The in-flight tick always completes before the loop exits.
    pub fn run(mut self, shutdown: watch::Receiver<bool>) -> Result<StepperSummary, StepperError> {
        if self.phase() == StepperPhase::Uninitialized {
            self.start()?;
        }

        let mut pacer = Pacer::new(tick_interval(self.settings.tick_rate_hz));
        let mut window_start = std::time::Instant::now();

        while !shutdown_requested(&shutdown) {
            let tick = self.tick()?;

            if tick % RATE_LOG_INTERVAL == 0 {
                let secs = window_start.elapsed().as_secs_f64();
                debug!(
                    tick,
                    sim_time = self.sim_time,
                    tick_rate = RATE_LOG_INTERVAL as f64 / secs.max(f64::EPSILON),
                    "Tick rate"
                );
                window_start = std::time::Instant::now();
            }

            pacer.wait();
        }

        self.set_phase(StepperPhase::Stopped);
        info!(
            ticks = self.tick,
            sim_time = self.sim_time,
            "Simulation stopped"
        );

        Ok(StepperSummary {
            ticks: self.tick,
            sim_time: self.sim_time,
        })
    }
}

/// A dropped sender counts as a shutdown request
fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

impl<E: SimEngine + 'static> Stepper<E> {
    /// Run the loop on a dedicated blocking thread
    pub fn spawn(
        self,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<Result<StepperSummary, StepperError>> {
        tokio::task::spawn_blocking(move || self.run(shutdown))
    }
}

//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::game::StepperPhase;
use crate::relay::RelayServer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: RelayServer,
    /// Stepper lifecycle, for health reporting
    pub stepper_phase: watch::Receiver<StepperPhase>,
}

impl AppState {
    pub fn new(
        config: Config,
        relay: RelayServer,
        stepper_phase: watch::Receiver<StepperPhase>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            relay,
            stepper_phase,
        }
    }
}

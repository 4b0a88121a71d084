//! Race Relay Server - tick-synchronized command/observation relay
//!
//! This is the main entry point for the relay. It handles:
//! - Team authentication against a fixed token roster
//! - HTTP endpoints for command submission and observation retrieval
//! - The simulation tick loop on a dedicated blocking thread

mod app;
mod config;
mod game;
mod http;
mod relay;
mod util;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::{
    CommandCache, KinematicEngine, LapLogFile, ObservationCache, Stepper, StepperSettings,
    TeamRegistry,
};
use crate::http::build_router;
use crate::relay::RelayServer;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Race Relay Server");
    info!("Server address: {}", config.server_addr);

    // Team roster and the two caches sized from it
    let registry = Arc::new(TeamRegistry::new(config.team_tokens.clone())?);
    let num_teams = registry.len();
    let commands = Arc::new(CommandCache::new(
        num_teams,
        config.bounds,
        config.default_command,
    ));
    let observations = Arc::new(ObservationCache::new(num_teams));

    info!(
        teams = num_teams,
        speed_min = config.bounds.speed_min,
        speed_max = config.bounds.speed_max,
        steer_min = config.bounds.steer_min,
        steer_max = config.bounds.steer_max,
        "Team roster loaded"
    );

    // Simulation stepper
    let engine = KinematicEngine::new(config.engine_seed);
    let start = config
        .start_pose
        .unwrap_or_else(|| engine.track().default_start());
    let settings = StepperSettings {
        starts: vec![start; num_teams],
        default_command: config.default_command,
        fixed_timestep: config.fixed_timestep,
        tick_rate_hz: config.tick_rate_hz,
    };

    let mut stepper = Stepper::new(engine, commands.clone(), observations.clone(), settings);
    if let Some(path) = &config.lap_log_path {
        match LapLogFile::create(path) {
            Ok(lap_log) => {
                info!(path = %path.display(), "Writing lap counts");
                stepper = stepper.with_lap_log(Box::new(lap_log));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Lap log disabled"),
        }
    }

    // Bind before starting the stepper
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    // A failed engine reset is fatal
    stepper.start()?;
    let stepper_phase = stepper.subscribe();

    // The stepper also stops if this sender is dropped on an error path
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stepper_handle = stepper.spawn(shutdown_rx);

    // Create application state
    let relay = RelayServer::new(registry, commands, observations);
    let state = AppState::new(config.clone(), relay, stepper_phase);

    // Build router
    let router = build_router(state);

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Let the stepper finish its in-flight tick
    let _ = shutdown_tx.send(true);
    match stepper_handle.await {
        Ok(Ok(summary)) => info!(
            ticks = summary.ticks,
            sim_time = summary.sim_time,
            "Stepper finished"
        ),
        Ok(Err(e)) => error!(error = %e, "Stepper had halted"),
        Err(e) => error!(error = %e, "Stepper thread panicked"),
    }

    served?;
    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}

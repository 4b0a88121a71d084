//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::{Command, CommandBounds, StartPose};

/// Roster used when TEAM_TOKENS is not set
const DEFAULT_TEAM_TOKENS: &str = "145,281,392,417,565,684,777,892";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Team tokens in team id order
    pub team_tokens: Vec<String>,
    /// Admissible command ranges
    pub bounds: CommandBounds,
    /// Command every team starts with
    pub default_command: Command,

    /// Target simulation ticks per second (0 = free running)
    pub tick_rate_hz: f64,
    /// Fixed engine step in seconds; measured wall time when unset
    pub fixed_timestep: Option<f64>,
    /// Starting pose shared by every team; engine default when unset
    pub start_pose: Option<StartPose>,
    /// Seed for the built-in engine's sensor noise
    pub engine_seed: u64,

    /// Lap counter file; disabled when unset
    pub lap_log_path: Option<PathBuf>,
    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string())
        };

        let team_tokens: Vec<String> = lookup("TEAM_TOKENS")
            .unwrap_or_else(|| DEFAULT_TEAM_TOKENS.to_string())
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let defaults = CommandBounds::default();
        let bounds = CommandBounds {
            speed_min: parse_or(&lookup, "SPEED_MIN", defaults.speed_min)?,
            speed_max: parse_or(&lookup, "SPEED_MAX", defaults.speed_max)?,
            steer_min: parse_or(&lookup, "STEER_MIN", defaults.steer_min)?,
            steer_max: parse_or(&lookup, "STEER_MAX", defaults.steer_max)?,
        };

        let default_command = Command::new(parse_or(&lookup, "DEFAULT_SPEED", 0.0)?, 0.0);

        let start_pose = match (lookup("START_X"), lookup("START_Y")) {
            (None, None) => None,
            _ => Some(StartPose {
                x: parse_or(&lookup, "START_X", 0.0)?,
                y: parse_or(&lookup, "START_Y", 0.0)?,
                theta: parse_or(&lookup, "START_THETA", 0.0)?,
            }),
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            team_tokens,
            bounds,
            default_command,

            tick_rate_hz: parse_or(&lookup, "TICK_RATE_HZ", 60.0)?,
            fixed_timestep: parse_opt(&lookup, "FIXED_TIMESTEP")?,
            start_pose,
            engine_seed: parse_or(&lookup, "ENGINE_SEED", 0)?,

            lap_log_path: match lookup("LAP_LOG_PATH") {
                Some(path) if path.trim().is_empty() => None,
                Some(path) => Some(PathBuf::from(path)),
                None => Some(PathBuf::from("laps.json")),
            },
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the core cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.team_tokens.is_empty() {
            return Err(ConfigError::Invalid("TEAM_TOKENS", "roster is empty".into()));
        }

        let b = &self.bounds;
        let all_finite = [b.speed_min, b.speed_max, b.steer_min, b.steer_max]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ConfigError::Invalid("SPEED/STEER bounds", "must be finite".into()));
        }
        if b.speed_min > b.speed_max {
            return Err(ConfigError::Invalid("SPEED_MIN", "exceeds SPEED_MAX".into()));
        }
        if b.steer_min > b.steer_max {
            return Err(ConfigError::Invalid("STEER_MIN", "exceeds STEER_MAX".into()));
        }
        if !b.contains(self.default_command) {
            return Err(ConfigError::Invalid(
                "DEFAULT_SPEED",
                "outside the speed bounds".into(),
            ));
        }

        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz < 0.0 {
            return Err(ConfigError::Invalid("TICK_RATE_HZ", "must be >= 0".into()));
        }
        if let Some(step) = self.fixed_timestep {
            if !step.is_finite() || step <= 0.0 {
                return Err(ConfigError::Invalid("FIXED_TIMESTEP", "must be > 0".into()));
            }
        }
        if let Some(pose) = self.start_pose {
            if ![pose.x, pose.y, pose.theta].iter().all(|v| v.is_finite()) {
                return Err(ConfigError::Invalid("START_X/START_Y/START_THETA", "must be finite".into()));
            }
        }

        Ok(())
    }
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key, format!("cannot parse '{}'", raw))),
        _ => Ok(None),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

//! HTTP route definitions

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::app::AppState;
use crate::game::{AuthError, Observation, SpectatorSnapshot, StepperPhase, TeamId};
use crate::http::middleware::TeamCredentials;
use crate::http::protocol::{CommandAckResponse, HealthResponse, SubmitPayload};
use crate::relay::RelayError;
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(observation_handler).post(command_handler))
        .route("/team_id", get(team_id_handler))
        .route("/all", get(all_handler))
        .route("/health", get(health_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// CORS for browser-based spectators; `*` allows any origin without credentials
fn cors_layer(client_origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return base.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();

    base.allow_origin(allowed_origins).allow_credentials(true)
}

// ============================================================================
// Health endpoint
// ============================================================================

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stepper = *state.stepper_phase.borrow();
    let (code, status) = match stepper {
        StepperPhase::Halted => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        _ => (StatusCode::OK, "ok"),
    };

    let health = HealthResponse {
        status: status.to_string(),
        uptime_secs: uptime_secs(),
        tick: state.relay.latest_tick(),
        stepper,
        teams: state.relay.team_count(),
    };

    (code, Json(health))
}

// ============================================================================
// Team endpoints
// ============================================================================

async fn team_id_handler(
    State(state): State<AppState>,
    TeamCredentials(token): TeamCredentials,
) -> Result<Json<TeamId>, AppError> {
    Ok(Json(state.relay.authenticate(&token)?))
}

async fn observation_handler(
    State(state): State<AppState>,
    TeamCredentials(token): TeamCredentials,
) -> Result<Json<Observation>, AppError> {
    Ok(Json(state.relay.fetch_observation(&token)?))
}

/// Accepts JSON regardless of the declared content type
async fn command_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CommandAckResponse>, AppError> {
    let payload: SubmitPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Malformed command payload");
        AppError::BadRequest(e.to_string())
    })?;

    let ack = state
        .relay
        .submit_command(&payload.team_token, payload.cmd)?;

    Ok(Json(CommandAckResponse {
        status: "ok".to_string(),
        team_id: ack.team_id,
        cmd: ack.command,
    }))
}

// ============================================================================
// Spectator endpoint
// ============================================================================

async fn all_handler(State(state): State<AppState>) -> Result<Json<SpectatorSnapshot>, AppError> {
    Ok(Json(state.relay.fetch_all()?))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("No observation published yet")]
    NotYetAvailable,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Auth(e) => AppError::Auth(e),
            RelayError::NotYetAvailable => AppError::NotYetAvailable,
            RelayError::UnknownTeam(id) => {
                error!(team_id = %id, "Registry and cache sizes disagree");
                AppError::Internal("team slot missing".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Auth(e) => return e.clone().into_response(),
            AppError::NotYetAvailable => {
                let body = serde_json::json!({ "error": self.to_string() });
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, "1")],
                    Json(body),
                )
                    .into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

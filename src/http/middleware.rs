//! Team credential extraction and authentication failures

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};

use crate::game::{AuthError, TeamToken};
use crate::http::protocol::TokenQuery;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Token taken from the `team_token` query parameter.
///
/// Only checks presence; the relay decides whether it is valid.
#[derive(Debug, Clone)]
pub struct TeamCredentials(pub TeamToken);

#[async_trait]
impl<S> FromRequestParts<S> for TeamCredentials
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) =
            Query::<TokenQuery>::try_from_uri(&parts.uri).map_err(|_| AuthError::MissingToken)?;

        query
            .team_token
            .map(TeamToken::new)
            .filter(|token| !token.as_str().is_empty())
            .map(TeamCredentials)
            .ok_or(AuthError::MissingToken)
    }
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{errors::AppError, HttpState};

/// Guards the HTTP `/mcp` route. Stdio sessions are trusted and never pass through here.
pub async fn require_bearer_token(
    State(state): State<HttpState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(presented)) = bearer.ok_or_else(|| {
        AppError::unauthorized("missing_token", "missing authorization header")
    })?;

    if !token_matches(presented.token(), &state.api_token) {
        return Err(AppError::unauthorized("invalid_token", "invalid bearer token"));
    }

    Ok(next.run(request).await)
}

/// Compares every byte so the time taken does not reveal the matching prefix.
pub fn token_matches(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (left, right)| diff | (left ^ right))
            == 0
}

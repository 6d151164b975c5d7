//! Bearer-token gate in front of `/v1`.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dirt_core::{DirtError, DirtResult};
use tracing::warn;

use crate::{ApiError, AppState};

/// `expected == None` disables the gate.
pub fn authenticate(expected: Option<&str>, headers: &HeaderMap) -> DirtResult<()> {
    let Some(expected) = expected else { return Ok(()) };
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| DirtError::unauthorized("missing authorization header"))?
        .to_str()
        .map_err(|_| DirtError::unauthorized("invalid authorization header format"))?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| DirtError::unauthorized("invalid authorization header format"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(DirtError::unauthorized("invalid authorization header format"));
    }
    if token != expected {
        return Err(DirtError::unauthorized("invalid token"));
    }
    Ok(())
}

pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(e) = authenticate(state.token.as_deref(), req.headers()) {
        warn!(uri = %req.uri(), reason = %e.message, "request rejected by token gate");
        return ApiError(e).into_response();
    }
    next.run(req).await
}

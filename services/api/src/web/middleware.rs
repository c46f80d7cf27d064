//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::AppState;

/// Middleware that requires a signed-in student in the current-session slot.
///
/// If present, inserts the `User` into request extensions for handlers to use.
/// If nobody is signed in, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = state
        .sessions
        .restore_session()
        .await
        .map_err(|e| {
            error!("Failed to read the current session: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            debug!("Rejected {} with no signed-in student.", req.uri());
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

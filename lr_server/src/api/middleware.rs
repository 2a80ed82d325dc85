//! Viewer identity middleware.
//!
//! Every v1 route runs behind [`viewer_middleware`], which turns the optional
//! `Authorization: Bearer <token>` header into a [`Viewer`] request extension.
//! Handlers decide what that viewer may do:
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use live_ranking::auth::Viewer;
//!
//! async fn handler(Extension(viewer): Extension<Viewer>) -> String {
//!     format!("Hello, {viewer}")
//! }
//! # let _ = handler;
//! ```

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use live_ranking::auth::Viewer;

use super::AppState;
use crate::logging::log_security_event;

/// Resolve the request's viewer and inject it into request extensions.
///
/// - **No header**: `Viewer::Anonymous`
/// - **Valid bearer token**: the token's user and role
/// - **Malformed header or invalid/expired token**: `401 Unauthorized`
pub async fn viewer_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = match request.headers().get(AUTHORIZATION) {
        None => None,
        Some(value) => match value
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
        {
            Some(token) => Some(token.to_string()),
            None => return Err(StatusCode::UNAUTHORIZED),
        },
    };

    let viewer = match state.tokens.viewer_from_token(token.as_deref()) {
        Ok(viewer) => viewer,
        Err(e) => {
            log_security_event("invalid_token", None, None, &e.to_string());
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    request.extensions_mut().insert::<Viewer>(viewer);
    Ok(next.run(request).await)
}

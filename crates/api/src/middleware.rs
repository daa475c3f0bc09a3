//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use campus_core::{ComplaintService, IdentityService, ModerationService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub complaint_service: ComplaintService,
    pub moderation_service: ModerationService,
    pub identity_service: IdentityService,
}

impl AppState {
    /// Wire the services around one complaint store.
    #[must_use]
    pub fn new(complaint_service: ComplaintService, identity_service: IdentityService) -> Self {
        Self {
            moderation_service: ModerationService::new(complaint_service.clone()),
            complaint_service,
            identity_service,
        }
    }
}

/// Bearer token carried by an authenticated request.
#[derive(Clone)]
pub struct SessionToken(pub String);

/// Authentication middleware.
///
/// A valid bearer token puts the caller's `Identity` and the token itself in
/// the request extensions. Anything else passes through untouched and is
/// rejected later by the extractors that need a user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.identity_service.authenticate(token).await {
            Ok(user) => {
                let token = SessionToken(token.to_string());
                req.extensions_mut().insert(user);
                req.extensions_mut().insert(token);
            }
            Err(e) => tracing::debug!(error = %e, "Bearer token rejected"),
        }
    }

    next.run(req).await
}

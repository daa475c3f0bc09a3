//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use campus_common::{AppError, AppResult};
use campus_core::{Identity, Role, Session};
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::{AdminUser, AuthToken, AuthUser},
    middleware::AppState,
    response::{self, ApiResponse},
};

/// Provider messages that mean the email or secret was wrong.
const BAD_CREDENTIAL_MESSAGES: &[&str] = &[
    "INVALID_LOGIN_CREDENTIALS",
    "INVALID_PASSWORD",
    "EMAIL_NOT_FOUND",
];

/// Signup request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,

    #[serde(default)]
    pub role: Role,
}

/// Provision an account. The temporary secret goes to the new user's inbox,
/// never into the response.
async fn signup(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<StatusCode> {
    req.validate()?;

    state.identity_service.sign_up(&req.email, req.role).await?;
    tracing::info!(admin_id = %admin.uid, role = %req.role, "Account provisioned");

    Ok(response::ok())
}

/// Signin request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Sign in to an existing account.
async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<ApiResponse<Session>> {
    let session = state
        .identity_service
        .sign_in(&req.email, &req.password)
        .await
        .map_err(|e| match e {
            AppError::ExternalService(ref msg)
                if BAD_CREDENTIAL_MESSAGES
                    .iter()
                    .any(|code| msg.starts_with(code)) =>
            {
                AppError::Unauthorized
            }
            other => other,
        })?;

    Ok(ApiResponse::ok(session))
}

/// End the current session.
async fn signout(
    AuthToken(token): AuthToken,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.identity_service.sign_out(&token).await?;
    Ok(response::ok())
}

/// The signed-in user.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<Identity> {
    ApiResponse::ok(user)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/me", get(me))
}

//! Complaint endpoints for signed-in users.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use campus_common::AppResult;
use campus_core::SubmitComplaintInput;
use campus_store::Complaint;
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Created},
};

/// Submit complaint request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitComplaintRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 5000))]
    pub description: String,

    #[serde(default)]
    pub is_anonymous: bool,

    /// Keep an anonymous complaint visible under "mine".
    #[serde(default)]
    pub track: bool,
}

/// Submit a complaint.
async fn submit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SubmitComplaintRequest>,
) -> AppResult<Created<Complaint>> {
    req.validate()?;

    let input = SubmitComplaintInput {
        title: req.title,
        description: req.description,
        is_anonymous: req.is_anonymous,
        link_to_account: req.track,
    };
    let complaint = state.complaint_service.submit_for(&user, input).await?;

    Ok(ApiResponse::created(complaint))
}

/// Complaints the caller submitted.
async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> ApiResponse<Vec<Complaint>> {
    ApiResponse::ok(state.complaint_service.for_student(&user.uid).await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit))
        .route("/mine", get(mine))
}

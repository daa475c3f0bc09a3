//! Admin review endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use campus_common::AppResult;
use campus_core::{ComplaintView, ReviewComplaintInput, SortOrder, StatusSummary};
use campus_store::{Complaint, ComplaintStatus};
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::AdminUser, middleware::AppState, response::ApiResponse};

/// Review queue query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListComplaintsQuery {
    /// Free-text search over title and description.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl From<ListComplaintsQuery> for ComplaintView {
    fn from(query: ListComplaintsQuery) -> Self {
        Self {
            text: query.q,
            status: query.status,
            student_id: None,
            sort: query.sort,
        }
    }
}

/// Resolve or reject request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[validate(length(max = 2000))]
    pub response: Option<String>,
}

/// List complaints for review.
async fn list(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<ListComplaintsQuery>,
) -> AppResult<ApiResponse<Vec<Complaint>>> {
    let view = ComplaintView::from(query);
    let complaints = state.moderation_service.review_queue(&admin, &view).await?;
    Ok(ApiResponse::ok(complaints))
}

/// Counts per status.
async fn stats(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<StatusSummary>> {
    Ok(ApiResponse::ok(state.moderation_service.summary(&admin).await?))
}

/// Mark a complaint as resolved.
async fn resolve(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> AppResult<ApiResponse<Complaint>> {
    let input = review_input(id, body)?;
    Ok(ApiResponse::ok(state.moderation_service.resolve(&admin, input).await?))
}

/// Mark a complaint as rejected.
async fn reject(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> AppResult<ApiResponse<Complaint>> {
    let input = review_input(id, body)?;
    Ok(ApiResponse::ok(state.moderation_service.reject(&admin, input).await?))
}

fn review_input(id: String, body: Option<Json<ReviewRequest>>) -> AppResult<ReviewComplaintInput> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()?;
    Ok(ReviewComplaintInput {
        complaint_id: id,
        response: req.response,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/complaints", get(list))
        .route("/complaints/stats", get(stats))
        .route("/complaints/{id}/resolve", post(resolve))
        .route("/complaints/{id}/reject", post(reject))
}

//! Moderation service for reviewing complaints.

use campus_common::{AppError, AppResult};
use campus_store::{Complaint, Resolution};

use super::complaint::ComplaintService;
use super::complaint_view::{ComplaintView, StatusSummary, redact_for_review};
use super::identity::Identity;

/// Input for reviewing a complaint.
#[derive(Debug, Clone)]
pub struct ReviewComplaintInput {
    pub complaint_id: String,
    /// Optional answer to the submitter. Blank text counts as none.
    pub response: Option<String>,
}

/// Administrator actions on complaints.
#[derive(Clone)]
pub struct ModerationService {
    complaints: ComplaintService,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub const fn new(complaints: ComplaintService) -> Self {
        Self { complaints }
    }

    /// Mark a pending complaint as resolved.
    pub async fn resolve(
        &self,
        reviewer: &Identity,
        input: ReviewComplaintInput,
    ) -> AppResult<Complaint> {
        self.review(reviewer, input, Resolution::Resolved).await
    }

    /// Mark a pending complaint as rejected.
    pub async fn reject(
        &self,
        reviewer: &Identity,
        input: ReviewComplaintInput,
    ) -> AppResult<Complaint> {
        self.review(reviewer, input, Resolution::Rejected).await
    }

    /// Complaints for the review screen, with anonymous links removed.
    pub async fn review_queue(
        &self,
        reviewer: &Identity,
        view: &ComplaintView,
    ) -> AppResult<Vec<Complaint>> {
        ensure_reviewer(reviewer)?;
        Ok(self
            .complaints
            .list(view)
            .await
            .into_iter()
            .map(redact_for_review)
            .collect())
    }

    /// Counts per status.
    pub async fn summary(&self, reviewer: &Identity) -> AppResult<StatusSummary> {
        ensure_reviewer(reviewer)?;
        Ok(self.complaints.summary().await)
    }

    async fn review(
        &self,
        reviewer: &Identity,
        input: ReviewComplaintInput,
        resolution: Resolution,
    ) -> AppResult<Complaint> {
        ensure_reviewer(reviewer)?;

        let response = input
            .response
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let complaint = self
            .complaints
            .set_status(&input.complaint_id, resolution, response)
            .await?;

        tracing::info!(
            complaint_id = %complaint.id,
            reviewer_id = %reviewer.uid,
            status = %complaint.status,
            "Complaint reviewed"
        );
        Ok(redact_for_review(complaint))
    }
}

fn ensure_reviewer(reviewer: &Identity) -> AppResult<()> {
    if reviewer.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only administrators can review complaints".to_string(),
        ))
    }
}

//! Complaint service.
//!
//! Owns the complaint repository for the whole process. Every mutation goes
//! through this service, which serializes writers behind one lock and
//! announces changes on a broadcast channel.

use std::sync::Arc;

use campus_common::{AppError, AppResult, config::ComplaintConfig};
use campus_store::{Complaint, ComplaintRepository, NewComplaint, Resolution};
use tokio::sync::{RwLock, broadcast};

use super::complaint_view::{ComplaintView, StatusSummary};
use super::identity::Identity;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 5000;

/// Change notifications for complaints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplaintEvent {
    /// A complaint was submitted.
    Submitted(Complaint),
    /// A complaint was resolved or rejected.
    StatusChanged(Complaint),
}

impl ComplaintEvent {
    #[must_use]
    pub const fn complaint(&self) -> &Complaint {
        match self {
            Self::Submitted(c) | Self::StatusChanged(c) => c,
        }
    }
}

/// Input for submitting a complaint as a signed-in user.
#[derive(Debug, Clone)]
pub struct SubmitComplaintInput {
    pub title: String,
    pub description: String,
    pub is_anonymous: bool,
    /// Keep the account link on an anonymous complaint so its author can
    /// still follow it. Ignored for named complaints, which are always
    /// linked.
    pub link_to_account: bool,
}

/// Complaint service.
#[derive(Clone)]
pub struct ComplaintService {
    repo: Arc<RwLock<ComplaintRepository>>,
    events: broadcast::Sender<ComplaintEvent>,
}

impl ComplaintService {
    /// Create a new complaint service around `repo`.
    #[must_use]
    pub fn new(repo: ComplaintRepository, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            repo: Arc::new(RwLock::new(repo)),
            events,
        }
    }

    /// Create an empty complaint service from configuration.
    #[must_use]
    pub fn from_config(config: &ComplaintConfig) -> Self {
        Self::new(
            ComplaintRepository::new(config.anonymous_label.clone()),
            config.event_capacity,
        )
    }

    /// Store a complaint exactly as given.
    pub async fn submit(&self, input: NewComplaint) -> Complaint {
        let complaint = self.repo.write().await.submit(input);
        self.publish(ComplaintEvent::Submitted(complaint.clone()));
        complaint
    }

    /// Submit a complaint on behalf of `author`.
    pub async fn submit_for(
        &self,
        author: &Identity,
        input: SubmitComplaintInput,
    ) -> AppResult<Complaint> {
        let title = input.title.trim();
        let description = input.description.trim();

        if title.is_empty() {
            return Err(AppError::BadRequest("Complaint title is required".to_string()));
        }
        if description.is_empty() {
            return Err(AppError::BadRequest(
                "Complaint description is required".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::BadRequest("Complaint title too long".to_string()));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::BadRequest(
                "Complaint description too long".to_string(),
            ));
        }

        let linked = !input.is_anonymous || input.link_to_account;
        let complaint = self
            .submit(NewComplaint {
                title: title.to_string(),
                description: description.to_string(),
                submitted_by: author.display_name.clone(),
                is_anonymous: input.is_anonymous,
                student_id: linked.then(|| author.uid.clone()),
            })
            .await;

        tracing::info!(
            complaint_id = %complaint.id,
            anonymous = complaint.is_anonymous,
            "Complaint submitted"
        );
        Ok(complaint)
    }

    /// Get a complaint by ID.
    pub async fn get(&self, id: &str) -> AppResult<Complaint> {
        self.repo.read().await.get(id)
    }

    /// Move a pending complaint to a terminal status.
    pub async fn set_status(
        &self,
        id: &str,
        resolution: Resolution,
        response: Option<String>,
    ) -> AppResult<Complaint> {
        let complaint = self.repo.write().await.set_status(id, resolution, response)?;
        self.publish(ComplaintEvent::StatusChanged(complaint.clone()));
        Ok(complaint)
    }

    /// Complaints submitted by a student, oldest first.
    pub async fn for_student(&self, student_id: &str) -> Vec<Complaint> {
        self.repo.read().await.find_by_student(student_id)
    }

    /// Complaints selected by `view`.
    pub async fn list(&self, view: &ComplaintView) -> Vec<Complaint> {
        let repo = self.repo.read().await;
        view.apply(repo.all()).into_iter().cloned().collect()
    }

    /// Counts per status.
    pub async fn summary(&self) -> StatusSummary {
        StatusSummary::from_records(self.repo.read().await.all())
    }

    /// Observe complaint changes from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ComplaintEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ComplaintEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

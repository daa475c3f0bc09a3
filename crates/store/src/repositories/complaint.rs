//! Complaint repository.
//!
//! The repository is the single owner of the complaint collection. It takes
//! `&mut self` for every mutation, so callers that share it must serialize
//! writers themselves (the complaint service wraps it in a lock).

use std::collections::HashMap;

use campus_common::{AppError, AppResult, IdGenerator};
use chrono::Utc;

use crate::entities::complaint::{ComplaintStatus, Model, NewComplaint, Resolution};

const DEFAULT_ANONYMOUS_LABEL: &str = "Anonymous";

/// In-memory complaint repository.
#[derive(Debug, Clone)]
pub struct ComplaintRepository {
    /// Complaints in submission order.
    complaints: Vec<Model>,
    /// Position of each complaint in `complaints`.
    index: HashMap<String, usize>,
    anonymous_label: String,
    id_gen: IdGenerator,
}

impl Default for ComplaintRepository {
    fn default() -> Self {
        Self::new(DEFAULT_ANONYMOUS_LABEL)
    }
}

impl ComplaintRepository {
    /// Create an empty repository.
    ///
    /// `anonymous_label` replaces the submitter name of anonymous complaints.
    #[must_use]
    pub fn new(anonymous_label: impl Into<String>) -> Self {
        Self {
            complaints: Vec::new(),
            index: HashMap::new(),
            anonymous_label: anonymous_label.into(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Store a new complaint.
    ///
    /// The complaint starts out `pending` with no response, stamped with the
    /// current time and appended after every earlier submission.
    pub fn submit(&mut self, input: NewComplaint) -> Model {
        let mut id = self.id_gen.generate();
        while self.index.contains_key(&id) {
            id = self.id_gen.generate();
        }

        let submitted_by = if input.is_anonymous {
            self.anonymous_label.clone()
        } else {
            input.submitted_by
        };

        let model = Model {
            id: id.clone(),
            title: input.title,
            description: input.description,
            submitted_by,
            is_anonymous: input.is_anonymous,
            submitted_at: Utc::now(),
            status: ComplaintStatus::Pending,
            response: None,
            student_id: input.student_id,
            resolved_at: None,
        };

        self.index.insert(id, self.complaints.len());
        self.complaints.push(model.clone());

        tracing::debug!(complaint_id = %model.id, anonymous = model.is_anonymous, "Complaint stored");
        model
    }

    /// Get a complaint by ID.
    pub fn get(&self, id: &str) -> AppResult<Model> {
        self.find(id).cloned()
    }

    /// Move a pending complaint to a terminal status.
    ///
    /// Only `status`, `response` and `resolved_at` change. A complaint that
    /// has already been reviewed is left as it is.
    pub fn set_status(
        &mut self,
        id: &str,
        resolution: Resolution,
        response: Option<String>,
    ) -> AppResult<Model> {
        let position = *self
            .index
            .get(id)
            .ok_or_else(|| AppError::ComplaintNotFound(id.to_string()))?;
        let complaint = &mut self.complaints[position];

        if complaint.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Complaint {id} is already {}",
                complaint.status
            )));
        }

        complaint.status = resolution.into();
        complaint.response = response;
        complaint.resolved_at = Some(Utc::now());

        Ok(complaint.clone())
    }

    /// Complaints linked to the given student, in submission order.
    #[must_use]
    pub fn find_by_student(&self, student_id: &str) -> Vec<Model> {
        self.complaints
            .iter()
            .filter(|c| c.student_id.as_deref() == Some(student_id))
            .cloned()
            .collect()
    }

    /// All complaints in submission order.
    #[must_use]
    pub fn all(&self) -> &[Model] {
        &self.complaints
    }

    /// Count complaints in the given status.
    #[must_use]
    pub fn count_by_status(&self, status: ComplaintStatus) -> usize {
        self.complaints.iter().filter(|c| c.status == status).count()
    }

    /// Number of stored complaints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.complaints.len()
    }

    /// Whether nothing has been submitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.complaints.is_empty()
    }

    fn find(&self, id: &str) -> AppResult<&Model> {
        self.index
            .get(id)
            .map(|&position| &self.complaints[position])
            .ok_or_else(|| AppError::ComplaintNotFound(id.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_complaint(title: &str, student_id: Option<&str>) -> NewComplaint {
        NewComplaint {
            title: title.to_string(),
            description: format!("{title} description"),
            submitted_by: "Jane Roe".to_string(),
            is_anonymous: false,
            student_id: student_id.map(String::from),
        }
    }

    #[test]
    fn test_submit_starts_pending() {
        let mut repo = ComplaintRepository::default();
        let complaint = repo.submit(new_complaint("Broken projector", Some("s-1")));

        assert_eq!(complaint.status, ComplaintStatus::Pending);
        assert!(complaint.response.is_none());
        assert!(complaint.resolved_at.is_none());
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(&complaint.id).unwrap(), complaint);
    }

    #[test]
    fn test_anonymous_submitter_is_masked() {
        let mut repo = ComplaintRepository::new("Hidden");
        let complaint = repo.submit(NewComplaint {
            is_anonymous: true,
            ..new_complaint("Noise", None)
        });

        assert_eq!(complaint.submitted_by, "Hidden");
        assert!(complaint.is_anonymous);
    }

    #[test]
    fn test_set_status_unknown_id() {
        let mut repo = ComplaintRepository::default();
        let err = repo
            .set_status("missing", Resolution::Resolved, None)
            .unwrap_err();
        assert!(matches!(err, AppError::ComplaintNotFound(id) if id == "missing"));
    }

    #[test]
    fn test_terminal_status_is_kept() {
        let mut repo = ComplaintRepository::default();
        let complaint = repo.submit(new_complaint("Wifi outage", None));

        let resolved = repo
            .set_status(&complaint.id, Resolution::Resolved, Some("Fixed".to_string()))
            .unwrap();
        assert_eq!(resolved.status, ComplaintStatus::Resolved);
        assert_eq!(resolved.response.as_deref(), Some("Fixed"));
        assert!(resolved.resolved_at.is_some());

        let err = repo
            .set_status(&complaint.id, Resolution::Rejected, Some("No".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = repo.get(&complaint.id).unwrap();
        assert_eq!(stored.status, ComplaintStatus::Resolved);
        assert_eq!(stored.response.as_deref(), Some("Fixed"));
    }

    #[test]
    fn test_set_status_leaves_other_fields() {
        let mut repo = ComplaintRepository::default();
        let before = repo.submit(new_complaint("Parking", Some("s-9")));
        let after = repo
            .set_status(&before.id, Resolution::Rejected, None)
            .unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.title, before.title);
        assert_eq!(after.description, before.description);
        assert_eq!(after.submitted_by, before.submitted_by);
        assert_eq!(after.submitted_at, before.submitted_at);
        assert_eq!(after.student_id, before.student_id);
        assert_eq!(after.status, ComplaintStatus::Rejected);
        assert!(after.response.is_none());
    }

    #[test]
    fn test_find_by_student() {
        let mut repo = ComplaintRepository::default();
        let first = repo.submit(new_complaint("A", Some("s-1")));
        repo.submit(new_complaint("B", Some("s-2")));
        let third = repo.submit(new_complaint("C", Some("s-1")));
        repo.submit(NewComplaint {
            is_anonymous: true,
            ..new_complaint("D", None)
        });

        let found = repo.find_by_student("s-1");
        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), third.id.as_str()]);

        assert!(repo.find_by_student("nobody").is_empty());
    }

    #[test]
    fn test_count_by_status() {
        let mut repo = ComplaintRepository::default();
        let a = repo.submit(new_complaint("A", None));
        repo.submit(new_complaint("B", None));
        repo.set_status(&a.id, Resolution::Resolved, None).unwrap();

        assert_eq!(repo.count_by_status(ComplaintStatus::Pending), 1);
        assert_eq!(repo.count_by_status(ComplaintStatus::Resolved), 1);
        assert_eq!(repo.count_by_status(ComplaintStatus::Rejected), 0);
    }
}

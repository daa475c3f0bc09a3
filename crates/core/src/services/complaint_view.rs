//! Read-only projections over the complaint collection.
//!
//! Nothing in here mutates a complaint; every function takes records by
//! reference and hands back a derived selection or ordering.

use campus_store::{Complaint, ComplaintStatus};
use serde::{Deserialize, Serialize};

/// Complaints whose title or description contains `query`, ignoring case.
///
/// An empty (or whitespace-only) query selects everything. Input order is
/// kept.
#[must_use]
pub fn filter_by_text<'a>(records: &'a [Complaint], query: &str) -> Vec<&'a Complaint> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records.iter().filter(|c| c.mentions(&needle)).collect()
}

/// Strip what a reviewer must not see.
///
/// Anonymous complaints lose their link to the submitting account.
#[must_use]
pub fn redact_for_review(mut complaint: Complaint) -> Complaint {
    if complaint.is_anonymous {
        complaint.student_id = None;
    }
    complaint
}

/// Display ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first, as submitted.
    #[default]
    Submission,
    /// Most recent first.
    Newest,
}

/// Composite view over complaints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplaintView {
    pub text: Option<String>,
    pub status: Option<ComplaintStatus>,
    pub student_id: Option<String>,
    pub sort: SortOrder,
}

impl ComplaintView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, query: impl Into<String>) -> Self {
        self.text = Some(query.into());
        self
    }

    #[must_use]
    pub const fn status(mut self, status: ComplaintStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    #[must_use]
    pub const fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Select and order `records`.
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [Complaint]) -> Vec<&'a Complaint> {
        let mut selected = filter_by_text(records, self.text.as_deref().unwrap_or_default());
        selected.retain(|c| {
            self.status.is_none_or(|status| c.status == status)
                && self
                    .student_id
                    .as_deref()
                    .is_none_or(|id| c.student_id.as_deref() == Some(id))
        });

        if self.sort == SortOrder::Newest {
            selected.reverse();
        }
        selected
    }
}

/// Complaint counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub pending: usize,
    pub resolved: usize,
    pub rejected: usize,
}

impl StatusSummary {
    #[must_use]
    pub fn from_records(records: &[Complaint]) -> Self {
        records.iter().fold(Self::default(), |mut summary, c| {
            match c.status {
                ComplaintStatus::Pending => summary.pending += 1,
                ComplaintStatus::Resolved => summary.resolved += 1,
                ComplaintStatus::Rejected => summary.rejected += 1,
            }
            summary
        })
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.pending + self.resolved + self.rejected
    }
}

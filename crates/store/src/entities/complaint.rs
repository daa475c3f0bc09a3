//! Complaint entity.

use std::fmt;
use std::str::FromStr;

use campus_common::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complaint status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintStatus {
    #[default]
    Pending,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    /// Returns the wire name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether no further transition is allowed out of this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            other => Err(AppError::BadRequest(format!("Unknown complaint status: {other}"))),
        }
    }
}

/// Terminal status a pending complaint can move to.
///
/// There is no way to name `pending` here, so a review can never re-open a
/// complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Resolved,
    Rejected,
}

impl From<Resolution> for ComplaintStatus {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Resolved => Self::Resolved,
            Resolution::Rejected => Self::Rejected,
        }
    }
}

/// Complaint model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display name of the submitter, or the anonymity label.
    pub submitted_by: String,
    pub is_anonymous: bool,
    pub submitted_at: DateTime<Utc>,
    pub status: ComplaintStatus,
    /// Reviewer's answer. Only ever set together with a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Back-reference to the submitting identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Whether the complaint still awaits review.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ComplaintStatus::Pending
    }

    /// Case-insensitive substring match against title or description.
    ///
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// Fields supplied by the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub submitted_by: String,
    pub is_anonymous: bool,
    pub student_id: Option<String>,
}

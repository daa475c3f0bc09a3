//! In-memory record store for campus-desk.
//!
//! Holds the canonical complaint collection. Nothing here is persisted: the
//! collection lives exactly as long as the process does.

pub mod entities;
pub mod repositories;

pub use entities::{Complaint, ComplaintStatus, NewComplaint, Resolution};
pub use repositories::ComplaintRepository;

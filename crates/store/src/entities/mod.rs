//! Record entities.

pub mod complaint;

pub use complaint::{ComplaintStatus, Model as Complaint, NewComplaint, Resolution};

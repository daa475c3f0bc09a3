//! Record repositories.

pub mod complaint;

pub use complaint::ComplaintRepository;

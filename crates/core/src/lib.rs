//! Core business logic for campus-desk.

pub mod services;

pub use services::*;

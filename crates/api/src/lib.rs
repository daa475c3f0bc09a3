//! HTTP API layer for campus-desk.
//!
//! - **Endpoints**: sign-in, complaint submission and the admin review queue
//! - **Extractors**: authenticated user and bearer token
//! - **Middleware**: bearer-token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};

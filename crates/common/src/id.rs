//! ID generation utilities.

use ulid::Ulid;
use uuid::Uuid;

/// ID generator for records and sessions.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based record ID.
    ///
    /// ULIDs carry 80 bits of randomness per millisecond, so an ID is never
    /// handed out twice within a process.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque session token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // No time component, unlike record IDs
        Uuid::new_v4().simple().to_string()
    }
}

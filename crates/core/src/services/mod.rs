//! Business logic services.

#![allow(missing_docs)]

pub mod complaint;
pub mod complaint_view;
pub mod credential_delivery;
pub mod identity;
pub mod identity_memory;
pub mod identity_rest;
pub mod moderation;

pub use complaint::{ComplaintEvent, ComplaintService, SubmitComplaintInput};
pub use complaint_view::{ComplaintView, SortOrder, StatusSummary, filter_by_text, redact_for_review};
pub use credential_delivery::{CredentialDelivery, MailCredentialDelivery};
pub use identity::{
    Identity, IdentityProvider, IdentityProviderService, IdentityService, ProviderAccount, Role,
    Session, SessionHandle, TemporaryCredential,
};
pub use identity_memory::InMemoryIdentityProvider;
pub use identity_rest::RestIdentityProvider;
pub use moderation::{ModerationService, ReviewComplaintInput};

//! Out-of-band delivery of temporary credentials.

use async_trait::async_trait;
use campus_common::{AppError, AppResult, config::MailConfig};
use serde::Serialize;

use super::identity::TemporaryCredential;

/// Channel that hands a temporary credential to its owner.
///
/// Implementations must not log or echo the credential.
#[async_trait]
pub trait CredentialDelivery: Send + Sync {
    /// Send `credential` to `email`.
    async fn deliver(&self, email: &str, credential: &TemporaryCredential) -> AppResult<()>;
}

/// Delivers credentials through an HTTP mail API (SendGrid v3 compatible).
#[derive(Clone)]
pub struct MailCredentialDelivery {
    config: MailConfig,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct MailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [MailAddress<'a>; 1],
}

#[derive(Serialize)]
struct MailContent {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

#[derive(Serialize)]
struct MailRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: MailAddress<'a>,
    subject: &'static str,
    content: [MailContent; 1],
}

const SUBJECT: &str = "Your Campus Desk account";

impl MailCredentialDelivery {
    /// Create a new mail delivery channel.
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn request<'a>(&'a self, email: &'a str, credential: &TemporaryCredential) -> MailRequest<'a> {
        MailRequest {
            personalizations: [Personalization {
                to: [MailAddress { email, name: None }],
            }],
            from: MailAddress {
                email: &self.config.from_address,
                name: Some(&self.config.from_name),
            },
            subject: SUBJECT,
            content: [MailContent {
                content_type: "text/plain",
                value: render_body(email, credential),
            }],
        }
    }
}

#[async_trait]
impl CredentialDelivery for MailCredentialDelivery {
    async fn deliver(&self, email: &str, credential: &TemporaryCredential) -> AppResult<()> {
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.request(email, credential))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Mail request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(to = %email, "Temporary credential sent");
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::ExternalService(format!(
                "Mail API returned {status}: {error_text}"
            )))
        }
    }
}

fn render_body(email: &str, credential: &TemporaryCredential) -> String {
    format!(
        "An account has been created for {email}.\n\n\
         Temporary password: {}\n\n\
         Verify your email address using the separate verification message, \
         then sign in and change this password.\n",
        credential.expose()
    )
}

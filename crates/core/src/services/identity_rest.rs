//! Identity Toolkit REST provider.
//!
//! Talks to an `accounts:*` style REST API (Firebase Authentication) with an
//! API key. Session tokens are the provider's ID tokens.

use async_trait::async_trait;
use campus_common::{AppError, AppResult};
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use url::Url;

use super::identity::{IdentityProvider, ProviderAccount, TemporaryCredential};

/// Provider messages that mean the token is no longer usable.
const SESSION_ERRORS: &[&str] = &["INVALID_ID_TOKEN", "TOKEN_EXPIRED", "USER_NOT_FOUND"];

/// REST identity provider.
#[derive(Clone)]
pub struct RestIdentityProvider {
    endpoint: Url,
    api_key: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: String,
    id_token: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl RestIdentityProvider {
    /// Create a new REST provider.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> AppResult<Self> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::Config(format!("Invalid identity endpoint: {e}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            http_client: reqwest::Client::new(),
        })
    }

    fn method_url(&self, method: &str) -> AppResult<Url> {
        // "./" keeps "accounts:" from parsing as a URL scheme
        self.endpoint
            .join(&format!("./accounts:{method}"))
            .map_err(|e| AppError::Config(format!("Invalid identity endpoint: {e}")))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> AppResult<T> {
        let response = self
            .http_client
            .post(self.method_url(method)?)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Identity request {method} failed: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| {
                AppError::ExternalService(format!("Invalid {method} response: {e}"))
            })
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(provider_error(status, &text))
        }
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        secret: &TemporaryCredential,
    ) -> AppResult<ProviderAccount> {
        let response: AuthResponse = self
            .call(
                "signUp",
                json!({
                    "email": email,
                    "password": secret.expose(),
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(response.into_account(false))
    }

    async fn send_verification(
        &self,
        account: &ProviderAccount,
        continue_url: Option<&str>,
    ) -> AppResult<()> {
        let mut body = json!({
            "requestType": "VERIFY_EMAIL",
            "idToken": account.token,
        });
        if let Some(url) = continue_url {
            body["continueUrl"] = json!(url);
            body["canHandleCodeInApp"] = json!(true);
        }

        let _: serde_json::Value = self.call("sendOobCode", body).await?;
        Ok(())
    }

    async fn sign_in(&self, email: &str, secret: &str) -> AppResult<ProviderAccount> {
        let response: AuthResponse = self
            .call(
                "signInWithPassword",
                json!({
                    "email": email,
                    "password": secret,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        // Verification state is only reported by lookup
        self.lookup(&response.id_token).await
    }

    async fn lookup(&self, token: &str) -> AppResult<ProviderAccount> {
        let response: LookupResponse = self
            .call("lookup", json!({ "idToken": token }))
            .await
            .map_err(|e| match e {
                AppError::ExternalService(ref message)
                    if SESSION_ERRORS.iter().any(|code| message.starts_with(code)) =>
                {
                    AppError::Unauthorized
                }
                other => other,
            })?;

        let user = response
            .users
            .into_iter()
            .next()
            .ok_or(AppError::Unauthorized)?;

        Ok(ProviderAccount {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name,
            email_verified: user.email_verified,
            token: token.to_string(),
        })
    }

    async fn sign_out(&self, _token: &str) -> AppResult<()> {
        // ID tokens cannot be revoked by their holder; they expire on their own
        tracing::debug!("Dropping REST identity session");
        Ok(())
    }

    async fn delete_account(&self, account: &ProviderAccount) -> AppResult<()> {
        let _: serde_json::Value = self
            .call("delete", json!({ "idToken": account.token }))
            .await?;
        tracing::debug!(uid = %account.uid, "Identity account deleted");
        Ok(())
    }
}

impl AuthResponse {
    fn into_account(self, email_verified: bool) -> ProviderAccount {
        ProviderAccount {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name,
            email_verified,
            token: self.id_token,
        }
    }
}

/// Turn a provider error response into an [`AppError`], keeping the
/// provider's message.
fn provider_error(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| format!("Identity provider returned {status}"));
    AppError::ExternalService(message)
}

//! Identity service adapter.
//!
//! Authentication is owned by an external provider. This module wraps it
//! behind [`IdentityProvider`], keeps the campus role of every account, and
//! exposes two views of a session:
//!
//! - [`IdentityService`]: shared and request scoped, used by the HTTP layer.
//! - [`SessionHandle`]: owns a single client session and publishes the
//!   current user as a [`watch`] value.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use campus_common::{AppError, AppResult, config::IdentityConfig};
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

use super::credential_delivery::CredentialDelivery;

const TEMPORARY_CREDENTIAL_LEN: usize = 20;

/// Campus role attached to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Faculty,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Faculty => "faculty",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "faculty" => Ok(Self::Faculty),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::BadRequest(format!("Unknown role: {other}"))),
        }
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-assigned user ID.
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub email_verified: bool,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Account as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAccount {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    /// Session token issued for this account.
    pub token: String,
}

/// A signed-in session.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: Identity,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Generated first-login secret for a provisioned account.
///
/// Never printed: both `Debug` and the absence of `Display` keep it out of
/// logs. The only way to read it is [`TemporaryCredential::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredential(String);

impl TemporaryCredential {
    /// Generate a new credential from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        let secret: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(TEMPORARY_CREDENTIAL_LEN)
            .map(char::from)
            .collect();
        Self(secret)
    }

    /// Read the secret, for handing it to the provider or delivery channel.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TemporaryCredential(<redacted>)")
    }
}

/// External authentication provider.
///
/// Failures carry the provider's own message in
/// [`AppError::ExternalService`]; nothing here retries.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account with the given first-login secret.
    async fn create_account(
        &self,
        email: &str,
        secret: &TemporaryCredential,
    ) -> AppResult<ProviderAccount>;

    /// Ask the provider to send its email verification message.
    async fn send_verification(
        &self,
        account: &ProviderAccount,
        continue_url: Option<&str>,
    ) -> AppResult<()>;

    /// Exchange email and secret for a session.
    async fn sign_in(&self, email: &str, secret: &str) -> AppResult<ProviderAccount>;

    /// Resolve a session token. Unknown or expired tokens are
    /// [`AppError::Unauthorized`].
    async fn lookup(&self, token: &str) -> AppResult<ProviderAccount>;

    /// End a session.
    async fn sign_out(&self, token: &str) -> AppResult<()>;

    /// Remove an account, authorized by one of its session tokens.
    async fn delete_account(&self, account: &ProviderAccount) -> AppResult<()>;
}

/// Shared provider handle.
pub type IdentityProviderService = Arc<dyn IdentityProvider>;

/// Request-scoped identity operations.
#[derive(Clone)]
pub struct IdentityService {
    provider: IdentityProviderService,
    delivery: Option<Arc<dyn CredentialDelivery>>,
    roles: Arc<RwLock<HashMap<String, Role>>>,
    /// Signed-out tokens the provider still accepts.
    revoked: Arc<RwLock<HashSet<String>>>,
    config: IdentityConfig,
}

impl IdentityService {
    /// Create a new identity service.
    ///
    /// Without a credential delivery channel, sign-up is refused.
    #[must_use]
    pub fn new(
        provider: IdentityProviderService,
        delivery: Option<Arc<dyn CredentialDelivery>>,
        config: IdentityConfig,
    ) -> Self {
        Self {
            provider,
            delivery,
            roles: Arc::new(RwLock::new(HashMap::new())),
            revoked: Arc::new(RwLock::new(HashSet::new())),
            config,
        }
    }

    /// Provision an account for `email` with the given role.
    ///
    /// A temporary credential is generated, registered with the provider and
    /// sent to the user only through the credential delivery channel. The
    /// provider is also asked to send its verification message.
    pub async fn sign_up(&self, email: &str, role: Role) -> AppResult<()> {
        let email = normalize_email(email)?;
        let delivery = self.delivery.as_ref().ok_or_else(|| {
            AppError::Config("Credential delivery is not configured".to_string())
        })?;

        let credential = TemporaryCredential::generate();
        let account = self.provider.create_account(&email, &credential).await?;
        self.roles.write().await.insert(account.uid.clone(), role);

        if let Err(e) = self
            .finish_provisioning(delivery.as_ref(), &account, &credential)
            .await
        {
            warn!(uid = %account.uid, error = %e, "Provisioning failed, removing account");
            self.roll_back(&account).await;
            return Err(e);
        }

        // The provisioning session belongs to nobody
        if let Err(e) = self.provider.sign_out(&account.token).await {
            debug!(uid = %account.uid, error = %e, "Failed to close provisioning session");
        }

        info!(uid = %account.uid, role = %role, "Account provisioned");
        Ok(())
    }

    async fn finish_provisioning(
        &self,
        delivery: &dyn CredentialDelivery,
        account: &ProviderAccount,
        credential: &TemporaryCredential,
    ) -> AppResult<()> {
        self.provider
            .send_verification(account, self.config.continue_url.as_deref())
            .await?;
        delivery.deliver(&account.email, credential).await
    }

    /// Undo a half-provisioned account so the email can be provisioned again.
    async fn roll_back(&self, account: &ProviderAccount) {
        self.roles.write().await.remove(&account.uid);

        if let Err(e) = self.provider.delete_account(account).await {
            warn!(uid = %account.uid, error = %e, "Failed to remove half-provisioned account");
        }
        if let Err(e) = self.provider.sign_out(&account.token).await {
            debug!(uid = %account.uid, error = %e, "Failed to close provisioning session");
        }
    }

    /// Sign in with email and secret.
    pub async fn sign_in(&self, email: &str, secret: &str) -> AppResult<Session> {
        let email = normalize_email(email)?;
        let account = self.provider.sign_in(&email, secret).await?;
        let user = self.identity_for(&account).await;
        debug!(uid = %user.uid, role = %user.role, "Signed in");

        Ok(Session {
            token: account.token,
            user,
        })
    }

    /// Resolve a session token to the signed-in identity.
    pub async fn authenticate(&self, token: &str) -> AppResult<Identity> {
        if self.revoked.read().await.contains(token) {
            // Forget the token once the provider stops accepting it
            if let Err(AppError::Unauthorized) = self.provider.lookup(token).await {
                self.revoked.write().await.remove(token);
            }
            return Err(AppError::Unauthorized);
        }

        let account = self.provider.lookup(token).await?;
        Ok(self.identity_for(&account).await)
    }

    /// End the session behind `token`.
    ///
    /// Providers that cannot revoke a token leave it valid until it expires;
    /// such tokens are refused here from now on.
    pub async fn sign_out(&self, token: &str) -> AppResult<()> {
        self.provider.sign_out(token).await?;
        if self.provider.lookup(token).await.is_ok() {
            self.revoked.write().await.insert(token.to_string());
        }
        Ok(())
    }

    /// Role recorded for an account, if any.
    pub async fn role_of(&self, uid: &str) -> Option<Role> {
        self.roles.read().await.get(uid).copied()
    }

    async fn identity_for(&self, account: &ProviderAccount) -> Identity {
        let role = if self.config.is_admin_email(&account.email) {
            Role::Admin
        } else {
            self.role_of(&account.uid).await.unwrap_or_default()
        };

        let display_name = account
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| default_display_name(&account.email));

        Identity {
            uid: account.uid.clone(),
            email: account.email.clone(),
            display_name,
            role,
            email_verified: account.email_verified,
        }
    }
}

/// A single client session with an observable current user.
pub struct SessionHandle {
    identity: IdentityService,
    token: Mutex<Option<String>>,
    current: watch::Sender<Option<Identity>>,
}

impl SessionHandle {
    /// Create a signed-out session.
    #[must_use]
    pub fn new(identity: IdentityService) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            identity,
            token: Mutex::new(None),
            current,
        }
    }

    /// The user currently signed in, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Observe changes to the current user.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    /// Provision a new account. Does not change the current session.
    pub async fn sign_up(&self, email: &str, role: Role) -> AppResult<()> {
        self.identity.sign_up(email, role).await
    }

    /// Sign in, replacing any existing session.
    pub async fn sign_in(&self, email: &str, secret: &str) -> AppResult<()> {
        let session = self.identity.sign_in(email, secret).await?;

        // Held until the new user is published so token and user agree
        let mut token = self.token.lock().await;
        if let Some(previous) = token.replace(session.token)
            && let Err(e) = self.identity.sign_out(&previous).await
        {
            debug!(error = %e, "Failed to close replaced session");
        }

        self.current.send_replace(Some(session.user));
        drop(token);
        Ok(())
    }

    /// Sign out of the current session.
    ///
    /// On provider failure the session is kept and the error returned.
    pub async fn sign_out_current(&self) -> AppResult<()> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_deref() {
            self.identity.sign_out(current).await?;
        }
        *token = None;
        drop(token);

        self.current.send_replace(None);
        Ok(())
    }

    /// Re-check the session with the provider.
    ///
    /// A session the provider no longer recognizes is dropped.
    pub async fn refresh(&self) -> AppResult<Option<Identity>> {
        let mut token = self.token.lock().await;
        let Some(current) = token.clone() else {
            return Ok(None);
        };

        match self.identity.authenticate(&current).await {
            Ok(user) => {
                self.current.send_replace(Some(user.clone()));
                Ok(Some(user))
            }
            Err(AppError::Unauthorized) => {
                *token = None;
                self.current.send_replace(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::BadRequest(format!("Invalid email address: {email}"))),
    }
}

fn default_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

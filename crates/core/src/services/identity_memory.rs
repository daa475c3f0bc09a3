//! Process-local identity provider.
//!
//! Accounts and sessions live in memory and vanish on restart. Secrets are
//! stored as Argon2 hashes only.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use campus_common::{AppError, AppResult, IdGenerator};
use tokio::sync::RwLock;

use super::identity::{IdentityProvider, ProviderAccount, TemporaryCredential};

#[derive(Debug, Clone)]
struct StoredAccount {
    uid: String,
    email: String,
    password_hash: String,
    email_verified: bool,
    verification_sent: bool,
}

/// In-memory identity provider.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    /// Accounts keyed by lowercase email.
    accounts: RwLock<HashMap<String, StoredAccount>>,
    /// Session token to account email.
    sessions: RwLock<HashMap<String, String>>,
    id_gen: IdGenerator,
}

impl InMemoryIdentityProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an account's email as verified, as following the verification
    /// link would.
    pub async fn verify_email(&self, email: &str) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&email.to_lowercase())
            .ok_or_else(|| AppError::ExternalService("EMAIL_NOT_FOUND".to_string()))?;
        account.email_verified = true;
        Ok(())
    }

    /// Whether a verification message was requested for the account.
    pub async fn verification_sent(&self, email: &str) -> bool {
        self.accounts
            .read()
            .await
            .get(&email.to_lowercase())
            .is_some_and(|a| a.verification_sent)
    }

    /// End every session of an account, as disabling it at the provider
    /// would.
    pub async fn revoke_sessions(&self, email: &str) {
        let email = email.to_lowercase();
        self.sessions.write().await.retain(|_, owner| *owner != email);
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn open_session(&self, account: &StoredAccount) -> ProviderAccount {
        let token = self.id_gen.generate_token();
        self.sessions
            .write()
            .await
            .insert(token.clone(), account.email.clone());
        to_provider_account(account, token)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        secret: &TemporaryCredential,
    ) -> AppResult<ProviderAccount> {
        let key = email.to_lowercase();
        let password_hash = hash_password(secret.expose())?;

        let account = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(AppError::ExternalService("EMAIL_EXISTS".to_string()));
            }
            let account = StoredAccount {
                uid: self.id_gen.generate(),
                email: key.clone(),
                password_hash,
                email_verified: false,
                verification_sent: false,
            };
            accounts.insert(key, account.clone());
            account
        };

        Ok(self.open_session(&account).await)
    }

    async fn send_verification(
        &self,
        account: &ProviderAccount,
        _continue_url: Option<&str>,
    ) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        let stored = accounts
            .get_mut(&account.email)
            .ok_or_else(|| AppError::ExternalService("EMAIL_NOT_FOUND".to_string()))?;
        stored.verification_sent = true;
        tracing::debug!(uid = %stored.uid, "Verification requested");
        Ok(())
    }

    async fn sign_in(&self, email: &str, secret: &str) -> AppResult<ProviderAccount> {
        let account = self
            .accounts
            .read()
            .await
            .get(&email.to_lowercase())
            .cloned()
            .ok_or_else(invalid_credentials)?;

        if !verify_password(secret, &account.password_hash)? {
            return Err(invalid_credentials());
        }

        Ok(self.open_session(&account).await)
    }

    async fn lookup(&self, token: &str) -> AppResult<ProviderAccount> {
        let email = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(AppError::Unauthorized)?;

        let accounts = self.accounts.read().await;
        let account = accounts.get(&email).ok_or(AppError::Unauthorized)?;
        Ok(to_provider_account(account, token.to_string()))
    }

    async fn sign_out(&self, token: &str) -> AppResult<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn delete_account(&self, account: &ProviderAccount) -> AppResult<()> {
        let email = self
            .sessions
            .read()
            .await
            .get(&account.token)
            .cloned()
            .ok_or(AppError::Unauthorized)?;

        self.accounts.write().await.remove(&email);
        self.revoke_sessions(&email).await;
        Ok(())
    }
}

fn to_provider_account(account: &StoredAccount, token: String) -> ProviderAccount {
    ProviderAccount {
        uid: account.uid.clone(),
        email: account.email.clone(),
        display_name: None,
        email_verified: account.email_verified,
        token,
    }
}

fn invalid_credentials() -> AppError {
    AppError::ExternalService("INVALID_LOGIN_CREDENTIALS".to_string())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

//! Identity adapter integration tests.
//!
//! These tests run sign-up, sign-in and sign-out against the in-memory
//! provider with a credential channel that records what it was given.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use campus_common::{AppError, AppResult, config::IdentityConfig};
use campus_core::{
    CredentialDelivery, IdentityProvider, IdentityService, InMemoryIdentityProvider,
    ProviderAccount, Role, SessionHandle, TemporaryCredential,
};
use tokio::sync::Mutex;

#[derive(Default)]
struct RecordingDelivery {
    sent: Mutex<Vec<(String, String)>>,
    /// Number of upcoming deliveries that fail.
    failures: Mutex<usize>,
}

impl RecordingDelivery {
    fn failing(times: usize) -> Self {
        Self {
            failures: Mutex::new(times),
            ..Self::default()
        }
    }

    async fn secret_for(&self, email: &str) -> String {
        self.sent
            .lock()
            .await
            .iter()
            .find(|(to, _)| to == email)
            .map(|(_, secret)| secret.clone())
            .expect("no credential delivered")
    }
}

#[async_trait]
impl CredentialDelivery for RecordingDelivery {
    async fn deliver(&self, email: &str, credential: &TemporaryCredential) -> AppResult<()> {
        {
            let mut failures = self.failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(AppError::ExternalService("mailbox unavailable".to_string()));
            }
        }
        self.sent
            .lock()
            .await
            .push((email.to_string(), credential.expose().to_string()));
        Ok(())
    }
}

struct Harness {
    provider: Arc<InMemoryIdentityProvider>,
    delivery: Arc<RecordingDelivery>,
    identity: IdentityService,
}

fn harness_with(delivery: RecordingDelivery, admin_emails: &[&str]) -> Harness {
    let provider = Arc::new(InMemoryIdentityProvider::new());
    let delivery = Arc::new(delivery);
    let config = IdentityConfig {
        admin_emails: admin_emails.iter().map(|e| (*e).to_string()).collect(),
        ..IdentityConfig::default()
    };
    let identity = IdentityService::new(provider.clone(), Some(delivery.clone()), config);
    Harness {
        provider,
        delivery,
        identity,
    }
}

fn harness() -> Harness {
    harness_with(RecordingDelivery::default(), &["dean@college.edu"])
}

#[tokio::test]
async fn test_sign_up_delivers_credential_out_of_band() {
    let h = harness();
    h.identity
        .sign_up("Maya@College.edu", Role::Faculty)
        .await
        .unwrap();

    let secret = h.delivery.secret_for("maya@college.edu").await;
    assert_eq!(secret.len(), 20);
    assert!(h.provider.verification_sent("maya@college.edu").await);
    // The provisioning session is closed again
    assert_eq!(h.provider.session_count().await, 0);

    let session = h.identity.sign_in("maya@college.edu", &secret).await.unwrap();
    assert_eq!(session.user.email, "maya@college.edu");
    assert_eq!(session.user.role, Role::Faculty);
    assert_eq!(session.user.display_name, "maya");
    assert!(!session.user.email_verified);
}

#[tokio::test]
async fn test_sign_up_requires_delivery_channel() {
    let provider = Arc::new(InMemoryIdentityProvider::new());
    let identity = IdentityService::new(provider.clone(), None, IdentityConfig::default());

    let err = identity.sign_up("a@college.edu", Role::Student).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    // Nothing was provisioned
    assert!(matches!(
        provider.verify_email("a@college.edu").await,
        Err(AppError::ExternalService(_))
    ));
}

#[tokio::test]
async fn test_sign_up_surfaces_delivery_failure() {
    let h = harness_with(RecordingDelivery::failing(1), &[]);

    let err = h.identity.sign_up("a@college.edu", Role::Student).await.unwrap_err();
    assert!(matches!(err, AppError::ExternalService(msg) if msg == "mailbox unavailable"));
}

#[tokio::test]
async fn test_failed_sign_up_can_be_retried() {
    let h = harness_with(RecordingDelivery::failing(1), &[]);

    assert!(h.identity.sign_up("a@college.edu", Role::Faculty).await.is_err());
    // Nothing is left behind: no session, no account
    assert_eq!(h.provider.session_count().await, 0);
    assert!(h.provider.verify_email("a@college.edu").await.is_err());

    h.identity.sign_up("a@college.edu", Role::Faculty).await.unwrap();
    assert_eq!(h.provider.session_count().await, 0);

    let secret = h.delivery.secret_for("a@college.edu").await;
    let session = h.identity.sign_in("a@college.edu", &secret).await.unwrap();
    assert_eq!(session.user.role, Role::Faculty);
    assert_eq!(h.identity.role_of(&session.user.uid).await, Some(Role::Faculty));
}

/// Provider whose sign-out leaves tokens valid, as ID-token providers do.
struct NonRevokingProvider(InMemoryIdentityProvider);

#[async_trait]
impl IdentityProvider for NonRevokingProvider {
    async fn create_account(
        &self,
        email: &str,
        secret: &TemporaryCredential,
    ) -> AppResult<ProviderAccount> {
        self.0.create_account(email, secret).await
    }

    async fn send_verification(
        &self,
        account: &ProviderAccount,
        continue_url: Option<&str>,
    ) -> AppResult<()> {
        self.0.send_verification(account, continue_url).await
    }

    async fn sign_in(&self, email: &str, secret: &str) -> AppResult<ProviderAccount> {
        self.0.sign_in(email, secret).await
    }

    async fn lookup(&self, token: &str) -> AppResult<ProviderAccount> {
        self.0.lookup(token).await
    }

    async fn sign_out(&self, _token: &str) -> AppResult<()> {
        Ok(())
    }

    async fn delete_account(&self, account: &ProviderAccount) -> AppResult<()> {
        self.0.delete_account(account).await
    }
}

#[tokio::test]
async fn test_sign_out_refuses_token_the_provider_still_accepts() {
    let provider = Arc::new(NonRevokingProvider(InMemoryIdentityProvider::new()));
    let delivery = Arc::new(RecordingDelivery::default());
    let identity = IdentityService::new(
        provider.clone(),
        Some(delivery.clone()),
        IdentityConfig::default(),
    );

    identity.sign_up("a@college.edu", Role::Student).await.unwrap();
    let secret = delivery.secret_for("a@college.edu").await;
    let session = identity.sign_in("a@college.edu", &secret).await.unwrap();

    identity.sign_out(&session.token).await.unwrap();
    assert!(provider.lookup(&session.token).await.is_ok());
    assert!(matches!(
        identity.authenticate(&session.token).await,
        Err(AppError::Unauthorized)
    ));

    // Once the provider drops the token it stays refused
    provider.0.revoke_sessions("a@college.edu").await;
    assert!(matches!(
        identity.authenticate(&session.token).await,
        Err(AppError::Unauthorized)
    ));

    // A fresh session is unaffected
    let again = identity.sign_in("a@college.edu", &secret).await.unwrap();
    assert_eq!(identity.authenticate(&again.token).await.unwrap(), again.user);
}

#[tokio::test]
async fn test_sign_up_twice_surfaces_provider_message() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();

    let err = h.identity.sign_up("a@college.edu", Role::Admin).await.unwrap_err();
    assert!(matches!(err, AppError::ExternalService(msg) if msg == "EMAIL_EXISTS"));
}

#[tokio::test]
async fn test_invalid_email_is_rejected() {
    let h = harness();
    assert!(matches!(
        h.identity.sign_up("not-an-email", Role::Student).await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_admin_emails_get_admin_role() {
    let h = harness();
    h.identity.sign_up("dean@college.edu", Role::Student).await.unwrap();
    let secret = h.delivery.secret_for("dean@college.edu").await;

    let session = h.identity.sign_in("dean@college.edu", &secret).await.unwrap();
    assert_eq!(session.user.role, Role::Admin);
    assert!(session.user.is_admin());
}

#[tokio::test]
async fn test_authenticate_and_sign_out() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();
    let secret = h.delivery.secret_for("a@college.edu").await;

    let session = h.identity.sign_in("a@college.edu", &secret).await.unwrap();
    let user = h.identity.authenticate(&session.token).await.unwrap();
    assert_eq!(user, session.user);

    h.identity.sign_out(&session.token).await.unwrap();
    assert!(matches!(
        h.identity.authenticate(&session.token).await,
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_wrong_secret_surfaces_provider_message() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();

    let err = h.identity.sign_in("a@college.edu", "guess").await.unwrap_err();
    assert!(matches!(err, AppError::ExternalService(msg) if msg == "INVALID_LOGIN_CREDENTIALS"));
}

#[tokio::test]
async fn test_session_handle_publishes_current_user() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();
    let secret = h.delivery.secret_for("a@college.edu").await;

    let session = SessionHandle::new(h.identity.clone());
    let mut watcher = session.subscribe();
    assert!(session.current_user().is_none());

    session.sign_in("a@college.edu", &secret).await.unwrap();
    watcher.changed().await.unwrap();
    let seen = watcher.borrow_and_update().clone().unwrap();
    assert_eq!(seen.email, "a@college.edu");
    assert_eq!(session.current_user(), Some(seen));

    session.sign_out_current().await.unwrap();
    watcher.changed().await.unwrap();
    assert!(watcher.borrow_and_update().is_none());
    assert!(session.current_user().is_none());
    assert_eq!(h.provider.session_count().await, 0);
}

#[tokio::test]
async fn test_session_handle_failed_sign_in_keeps_state() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();

    let session = SessionHandle::new(h.identity.clone());
    assert!(session.sign_in("a@college.edu", "wrong").await.is_err());
    assert!(session.current_user().is_none());

    // Signing out with no session is a no-op
    session.sign_out_current().await.unwrap();
}

#[tokio::test]
async fn test_session_handle_refresh_drops_revoked_session() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();
    let secret = h.delivery.secret_for("a@college.edu").await;

    let session = SessionHandle::new(h.identity.clone());
    session.sign_in("a@college.edu", &secret).await.unwrap();

    h.provider.verify_email("a@college.edu").await.unwrap();
    let refreshed = session.refresh().await.unwrap().unwrap();
    assert!(refreshed.email_verified);

    let mut watcher = session.subscribe();
    h.provider.revoke_sessions("a@college.edu").await;
    assert!(session.refresh().await.unwrap().is_none());
    assert!(session.current_user().is_none());
    watcher.changed().await.unwrap();
    assert!(watcher.borrow_and_update().is_none());

    // Nothing left to refresh
    assert!(session.refresh().await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_handle_sign_in_replaces_session() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();
    h.identity.sign_up("b@college.edu", Role::Faculty).await.unwrap();
    let a = h.delivery.secret_for("a@college.edu").await;
    let b = h.delivery.secret_for("b@college.edu").await;

    let session = SessionHandle::new(h.identity.clone());
    session.sign_in("a@college.edu", &a).await.unwrap();
    session.sign_in("b@college.edu", &b).await.unwrap();

    assert_eq!(session.current_user().unwrap().role, Role::Faculty);
    assert_eq!(h.provider.session_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_sign_ins_agree_on_current_user() {
    let h = harness();
    h.identity.sign_up("a@college.edu", Role::Student).await.unwrap();
    h.identity.sign_up("b@college.edu", Role::Faculty).await.unwrap();
    let a = h.delivery.secret_for("a@college.edu").await;
    let b = h.delivery.secret_for("b@college.edu").await;

    let session = SessionHandle::new(h.identity.clone());
    let (first, second) = tokio::join!(
        session.sign_in("a@college.edu", &a),
        session.sign_in("b@college.edu", &b)
    );
    first.unwrap();
    second.unwrap();

    // The published user is the owner of the stored session
    let published = session.current_user().unwrap();
    let refreshed = session.refresh().await.unwrap().unwrap();
    assert_eq!(published, refreshed);
    assert_eq!(h.provider.session_count().await, 1);
}

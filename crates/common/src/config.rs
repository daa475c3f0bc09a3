//! Application configuration.

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Complaint handling configuration.
    #[serde(default)]
    pub complaints: ComplaintConfig,
    /// Identity provider configuration.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Mail API used to deliver temporary credentials.
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Complaint handling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ComplaintConfig {
    /// Name shown in place of the submitter for anonymous complaints.
    #[serde(default = "default_anonymous_label")]
    pub anonymous_label: String,
    /// Capacity of the complaint event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Which identity provider backs authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    /// Process-local accounts, lost on restart.
    #[default]
    Memory,
    /// Identity Toolkit compatible REST API.
    Rest,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Provider backing sign-in.
    #[serde(default)]
    pub provider: IdentityProviderKind,
    /// API key for the REST provider.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the REST provider.
    #[serde(default = "default_identity_endpoint")]
    pub endpoint: String,
    /// Where verification links send the user back to.
    #[serde(default)]
    pub continue_url: Option<String>,
    /// Accounts that are granted the admin role.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

/// Mail API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Bearer key for the mail API.
    pub api_key: String,
    /// Send endpoint.
    #[serde(default = "default_mail_endpoint")]
    pub endpoint: String,
    /// Sender address.
    pub from_address: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_anonymous_label() -> String {
    "Anonymous".to_string()
}

const fn default_event_capacity() -> usize {
    256
}

fn default_identity_endpoint() -> String {
    "https://identitytoolkit.googleapis.com/v1/".to_string()
}

fn default_mail_endpoint() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

fn default_from_name() -> String {
    "Campus Desk".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ComplaintConfig {
    fn default() -> Self {
        Self {
            anonymous_label: default_anonymous_label(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: IdentityProviderKind::default(),
            api_key: None,
            endpoint: default_identity_endpoint(),
            continue_url: None,
            admin_emails: Vec::new(),
        }
    }
}

impl IdentityConfig {
    /// Whether the given email is configured as an administrator.
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `CAMPUS_ENV`)
    /// 4. Environment variables with `CAMPUS_` prefix
    pub fn load() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("CAMPUS_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(environment_source())
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements serde cannot express.
    ///
    /// The in-memory provider starts without accounts, so it needs both a
    /// mail channel and at least one administrator to provision.
    pub fn validate(&self) -> AppResult<()> {
        match self.identity.provider {
            IdentityProviderKind::Rest => {
                if self.identity.api_key.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::Config(
                        "identity.api_key is required for the rest provider".to_string(),
                    ));
                }
            }
            IdentityProviderKind::Memory => {
                if self.mail.is_none() {
                    return Err(AppError::Config(
                        "the memory identity provider needs a [mail] section to provision accounts"
                            .to_string(),
                    ));
                }
                if self.identity.admin_emails.is_empty() {
                    return Err(AppError::Config(
                        "the memory identity provider needs at least one identity.admin_emails entry"
                            .to_string(),
                    ));
                }
            }
        }
        if url::Url::parse(&self.identity.endpoint).is_err() {
            return Err(AppError::Config(format!(
                "identity.endpoint is not a valid URL: {}",
                self.identity.endpoint
            )));
        }
        Ok(())
    }
}

fn environment_source() -> config::Environment {
    config::Environment::with_prefix("CAMPUS")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("identity.admin_emails")
        .try_parsing(true)
}

//! Provider session adapter.
//!
//! [`ProviderClient`] is the capability set the rotation controller drives.
//! The controller never learns which backend sits behind it; [`HttpProvider`]
//! is a plain-HTTP implementation, and tests substitute recording mocks.

mod http;

pub use http::HttpProvider;

use async_trait::async_trait;
use std::collections::HashMap;

use boxrotate_types::SESSION_COOKIE;

/// An authenticated provider session: the cookie set harvested at login.
/// Persisting these cookies lets the next run skip the credential login.
#[derive(Debug, Clone, Default)]
pub struct Session {
    cookies: HashMap<String, String>,
}

impl Session {
    pub fn from_cookies(cookies: HashMap<String, String>) -> Self {
        Self { cookies }
    }

    /// All cookies in the session, for persisting into the slot record.
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn session_cookie(&self) -> Option<&str> {
        self.cookies
            .get(SESSION_COOKIE)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn insert(&mut self, name: String, value: String) {
        self.cookies.insert(name, value);
    }

    /// Render the session as a `Cookie:` header value.
    pub(crate) fn cookie_header(&self) -> String {
        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }
}

/// Result of attempting to reserve the free server offering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Purchased,
    /// Offering unavailable or priced above zero. The caller is expected to
    /// empty the cart so nothing half-reserved lingers on the provider side.
    Refused { reason: String },
}

/// Host and account name of a freshly created FTP credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpAccount {
    pub host: String,
    pub user: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("authentication rejected for {email}")]
    AuthRejected { email: String },

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status} during {context}")]
    UnexpectedStatus { status: u16, context: &'static str },

    #[error("provider response missing {0}")]
    MissingData(&'static str),
}

/// The capability set the rotation controller consumes. Every method is a
/// blocking remote action with its own timeout inside the implementation.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Authenticate a slot. Implementations try the reusable session cookie
    /// first and fall back to the email/password pair.
    async fn login(
        &self,
        email: &str,
        password: &str,
        session_cookie: Option<&str>,
    ) -> Result<Session, SessionError>;

    /// Id of the most recently created server visible in the account, if
    /// any.
    async fn current_server_id(&self, session: &Session)
        -> Result<Option<String>, SessionError>;

    /// Point the server's public DNS label; an empty label detaches it.
    async fn set_server_dns(
        &self,
        session: &Session,
        server_id: &str,
        label: &str,
    ) -> Result<(), SessionError>;

    async fn stop_server(&self, session: &Session, server_id: &str) -> Result<(), SessionError>;

    async fn start_server(&self, session: &Session, server_id: &str) -> Result<(), SessionError>;

    /// Reserve the free server offering. A non-zero price or an unavailable
    /// offering yields [`PurchaseOutcome::Refused`], never an error.
    async fn buy_free_server(&self, session: &Session) -> Result<PurchaseOutcome, SessionError>;

    /// Roll back whatever reservation the cart holds.
    async fn empty_cart(&self, session: &Session) -> Result<(), SessionError>;

    /// Create a fresh FTP credential on the server. The account name is
    /// derived from the current time so it is unique within the run.
    async fn create_ftp_account(
        &self,
        session: &Session,
        server_id: &str,
        password: &str,
    ) -> Result<FtpAccount, SessionError>;

    /// Install the default payload (modpack) on the server.
    async fn install_modpack(&self, session: &Session, server_id: &str)
        -> Result<(), SessionError>;

    /// End the session on the provider side. Consumes the session; the
    /// harvested cookies should already have been copied out.
    async fn logout(&self, session: Session) -> Result<(), SessionError>;
}

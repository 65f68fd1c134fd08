//! The single authenticated session.
//!
//! [`SessionManager`] owns the capability client and the session handle as
//! one value, so there is never a handle without a client or a client left
//! half-initialized after a failed login.
//!
//! ```text
//!              authenticate ok
//!   LoggedOut ─────────────────▶ LoggedIn ──┐ authenticate ok
//!       ▲  ▲                        │  ▲     │ (handle replaced)
//!       │  └── authenticate err ────┤  └─────┘
//!       └──────── logout ───────────┘
//! ```

use crate::capability::{Capability, CapabilityError, Credentials, Profile};
use crate::{Error, Result};

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
}

type Connector<C> = Box<dyn FnMut() -> std::result::Result<C, CapabilityError> + Send>;

struct ActiveSession<C: Capability> {
    client: C,
    handle: C::Session,
    username: String,
}

/// What happened during a logout.
///
/// Logout always succeeds locally; a remote failure is reported here instead
/// of as an error.
#[derive(Debug, Default)]
pub struct LogoutReport {
    /// Whether a session was active before the call.
    pub was_logged_in: bool,
    /// The capability's error from ending the remote session, if any.
    pub remote_error: Option<CapabilityError>,
}

/// Owns the one session the broker keeps with the external capability.
///
/// The capability client is built by the connector on first use, reused for
/// re-authentication, and dropped on logout or failed login.
pub struct SessionManager<C: Capability> {
    connector: Connector<C>,
    active: Option<ActiveSession<C>>,
}

impl<C: Capability> SessionManager<C> {
    /// Create a manager that builds clients with `connector`.
    pub fn new<F>(connector: F) -> Self
    where
        F: FnMut() -> std::result::Result<C, CapabilityError> + Send + 'static,
    {
        Self {
            connector: Box::new(connector),
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::LoggedIn
        } else {
            SessionState::LoggedOut
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.active.is_some()
    }

    /// Username of the active session.
    pub fn username(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.username.as_str())
    }

    /// Log in, replacing any existing session.
    ///
    /// An existing session's handle is discarded without ending it remotely.
    /// On failure, or if the call is dropped before it finishes, the manager
    /// is left logged out.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials,
    ) -> std::result::Result<(), CapabilityError> {
        let mut client = match self.active.take() {
            Some(previous) => previous.client,
            None => (self.connector)()?,
        };

        let handle = client.authenticate(credentials).await?;
        tracing::info!(username = %credentials.username, "session established");

        self.active = Some(ActiveSession {
            client,
            handle,
            username: credentials.username.clone(),
        });
        Ok(())
    }

    /// Resolve `target` and fetch everyone it follows.
    ///
    /// # Errors
    ///
    /// [`Error::NotLoggedIn`] without an active session (no login is
    /// attempted), [`Error::Capability`] if the capability fails. A failed
    /// fetch leaves the session untouched.
    pub async fn fetch_followees(&mut self, target: &str) -> Result<Vec<Profile>> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::NotLoggedIn);
        };

        let account = active.client.resolve_account(&active.handle, target).await?;
        tracing::debug!(fetch_target = %target, account = %account, "resolved target account");

        let records = active.client.list_followees(&active.handle, &account).await?;
        Ok(records.into_iter().map(Profile::from).collect())
    }

    /// End the session. Always leaves the manager logged out.
    pub async fn logout(&mut self) -> LogoutReport {
        let Some(ActiveSession {
            mut client,
            handle,
            username,
        }) = self.active.take()
        else {
            return LogoutReport::default();
        };

        let remote_error = client.end_session(handle).await.err();
        match &remote_error {
            Some(err) => {
                tracing::warn!(username = %username, error = %err, "remote logout failed; session dropped locally")
            }
            None => tracing::info!(username = %username, "session ended"),
        }

        LogoutReport {
            was_logged_in: true,
            remote_error,
        }
    }
}

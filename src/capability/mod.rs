//! The external social-network capability.
//!
//! The broker never talks to the remote service itself. Everything it needs
//! goes through the [`Capability`] trait:
//!
//! ```text
//! SessionManager                      Capability
//! ┌──────────────┐  authenticate     ┌──────────────┐
//! │              │──────────────────▶│              │
//! │              │  resolve_account  │   remote     │
//! │              │──────────────────▶│   service    │
//! │              │  list_followees   │   client     │
//! │              │──────────────────▶│              │
//! │              │  end_session      │              │
//! └──────────────┘──────────────────▶└──────────────┘
//! ```
//!
//! Every call returns `Result<_, CapabilityError>`; the session manager
//! pattern-matches on the outcome instead of relying on unwinding.
//!
//! [`HelperProcess`] is the backend used by the binary: it drives an external
//! helper program over newline-delimited JSON.

mod helper;
mod types;

pub use helper::HelperProcess;
pub use types::{AccountId, CapabilityError, Credentials, Profile, UserRecord};

/// Contract for the external social-network client.
///
/// Implementations own whatever connection state the remote service needs.
/// The broker calls them strictly one at a time, so methods take `&mut self`.
#[allow(async_fn_in_trait)]
pub trait Capability {
    /// Opaque authenticated session value handed back by [`authenticate`](Self::authenticate).
    type Session: Send;

    /// Log in with the given credentials.
    async fn authenticate(
        &mut self,
        credentials: &Credentials,
    ) -> Result<Self::Session, CapabilityError>;

    /// Resolve a public username to the service's account identifier.
    async fn resolve_account(
        &mut self,
        session: &Self::Session,
        username: &str,
    ) -> Result<AccountId, CapabilityError>;

    /// Retrieve the complete list of accounts followed by `account`.
    async fn list_followees(
        &mut self,
        session: &Self::Session,
        account: &AccountId,
    ) -> Result<Vec<UserRecord>, CapabilityError>;

    /// End the remote session. Callers are free to ignore the error.
    async fn end_session(&mut self, session: Self::Session) -> Result<(), CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Credentials>();
        assert_send_sync::<AccountId>();
        assert_send_sync::<UserRecord>();
        assert_send_sync::<Profile>();
        assert_send_sync::<CapabilityError>();
        assert_send_sync::<HelperProcess>();
    }
}

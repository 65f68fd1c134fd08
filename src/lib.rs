//! # followee-broker
//!
//! A long-lived, single-session broker between a controlling process and a
//! social-network client capability.
//!
//! The broker reads newline-delimited JSON commands (`login`, `fetch`,
//! `logout`, `shutdown`), keeps exactly one authenticated session, pulls
//! followee lists through the capability on demand, and streams them back in
//! size-bounded `fetch_batch` messages.
//!
//! ## Architecture
//!
//! ```text
//! controlling process            followee-broker                  capability
//! ┌───────────────┐  stdin   ┌──────────────────────┐        ┌──────────────┐
//! │               │─────────▶│ Dispatcher           │        │              │
//! │               │          │   ├─ SessionManager ─┼───────▶│ HelperProcess│
//! │               │◀─────────│   └─ emit_batches    │        │  (or custom) │
//! └───────────────┘  stdout  └──────────────────────┘        └──────────────┘
//!                                   ▲
//!                       ShutdownTrigger (signals, shutdown, EOF)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use followee_broker::capability::{CapabilityError, HelperProcess};
//! use followee_broker::{BrokerConfig, Dispatcher, SessionManager, ShutdownTrigger};
//!
//! #[tokio::main]
//! async fn main() -> followee_broker::Result<()> {
//!     let config = BrokerConfig::builder().helper("/usr/local/bin/ig-helper").build()?;
//!     let helper = config.helper().cloned().unwrap();
//!     let sessions = SessionManager::new(move || HelperProcess::spawn(&helper).map_err(CapabilityError::from));
//!
//!     let mut dispatcher = Dispatcher::new(
//!         sessions,
//!         tokio::io::stdin(),
//!         tokio::io::stdout(),
//!         &config,
//!         ShutdownTrigger::new(),
//!     );
//!     dispatcher.run().await?;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod capability;
pub mod config;
mod dispatcher;
mod error;
pub mod io;
pub mod lifecycle;
pub mod protocol;
mod session;

pub use error::{Error, Result};

pub use batch::{emit_batches, Batch, Batches};
pub use capability::{Capability, CapabilityError, Credentials, Profile};
pub use config::{BrokerConfig, BrokerConfigBuilder};
pub use dispatcher::Dispatcher;
pub use lifecycle::{ExitReason, ShutdownTrigger};
pub use protocol::{Command, Outbound, RequestId, Response, Status};
pub use session::{LogoutReport, SessionManager, SessionState};

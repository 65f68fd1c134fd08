//! Broker configuration.
//!
//! This module provides:
//!
//! - [`BrokerConfig`] and [`BrokerConfigBuilder`] for configuring the broker
//! - [`HelperCommand`] describing the external capability helper
//!
//! # Example
//!
//! ```ignore
//! use followee_broker::config::BrokerConfig;
//!
//! let config = BrokerConfig::builder()
//!     .batch_cap(30)
//!     .helper("/usr/local/bin/ig-helper")
//!     .require_helper(true)
//!     .build()?;
//! ```

pub mod builder;
pub mod options;

pub use builder::{BrokerConfig, BrokerConfigBuilder};
pub use options::{HelperCommand, DEFAULT_BATCH_CAP, ENV_HELPER};

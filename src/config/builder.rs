//! Broker configuration and builder.
//!
//! # Example
//!
//! ```
//! use followee_broker::config::BrokerConfig;
//!
//! let config = BrokerConfig::builder()
//!     .batch_cap(50)
//!     .helper("/usr/local/bin/ig-helper")
//!     .helper_args(["--delay", "1"])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.batch_cap(), 50);
//! ```

use std::path::PathBuf;

use super::options::{HelperCommand, DEFAULT_BATCH_CAP, ENV_HELPER};
use crate::{Error, Result};

/// Configuration for the broker.
///
/// Use [`BrokerConfig::builder()`] to create a new configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub(crate) batch_cap: usize,
    pub(crate) helper: Option<HelperCommand>,
    pub(crate) announce_progress: bool,
}

impl BrokerConfig {
    /// Create a new builder for BrokerConfig.
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Fixed upper bound on profiles per batch.
    pub fn batch_cap(&self) -> usize {
        self.batch_cap
    }

    /// The capability helper, if one was configured.
    pub fn helper(&self) -> Option<&HelperCommand> {
        self.helper.as_ref()
    }

    /// Whether `info` progress events are emitted.
    pub fn announce_progress(&self) -> bool {
        self.announce_progress
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            batch_cap: DEFAULT_BATCH_CAP,
            helper: None,
            announce_progress: true,
        }
    }
}

/// Builder for [`BrokerConfig`].
///
/// Validation happens in [`build()`](BrokerConfigBuilder::build).
#[derive(Debug, Clone)]
pub struct BrokerConfigBuilder {
    batch_cap: usize,
    helper_path: Option<PathBuf>,
    helper_args: Vec<String>,
    helper_env: Vec<(String, String)>,
    require_helper: bool,
    announce_progress: bool,
}

impl Default for BrokerConfigBuilder {
    fn default() -> Self {
        Self {
            batch_cap: DEFAULT_BATCH_CAP,
            helper_path: None,
            helper_args: Vec::new(),
            helper_env: Vec::new(),
            require_helper: false,
            announce_progress: true,
        }
    }
}

impl BrokerConfigBuilder {
    /// Maximum number of profiles per `fetch_batch` message.
    pub fn batch_cap(mut self, cap: usize) -> Self {
        self.batch_cap = cap;
        self
    }

    /// Path of the capability helper program.
    ///
    /// When unset, `FOLLOWEE_BROKER_HELPER` is consulted at build time.
    pub fn helper(mut self, path: impl Into<PathBuf>) -> Self {
        self.helper_path = Some(path.into());
        self
    }

    /// Arguments passed to the helper program.
    pub fn helper_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.helper_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Environment variable set for the helper program.
    pub fn helper_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.helper_env.push((key.into(), value.into()));
        self
    }

    /// Fail at build time when no helper can be resolved.
    ///
    /// Library users that inject their own capability leave this off.
    pub fn require_helper(mut self, require: bool) -> Self {
        self.require_helper = require;
        self
    }

    /// Emit `info` progress events (login attempts, fetch progress).
    pub fn announce_progress(mut self, enabled: bool) -> Self {
        self.announce_progress = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the batch cap is zero, or if a
    /// helper is required and neither [`helper`](Self::helper) nor the
    /// `FOLLOWEE_BROKER_HELPER` environment variable provides one.
    pub fn build(self) -> Result<BrokerConfig> {
        let from_env = std::env::var(ENV_HELPER).ok();
        self.build_with_env(from_env)
    }

    fn build_with_env(self, env_helper: Option<String>) -> Result<BrokerConfig> {
        if self.batch_cap == 0 {
            return Err(Error::InvalidConfig("batch_cap must be at least 1".into()));
        }

        let path = self
            .helper_path
            .or_else(|| env_helper.filter(|p| !p.trim().is_empty()).map(PathBuf::from));

        let helper = path.map(|path| {
            let mut cmd = HelperCommand::new(path).args(self.helper_args);
            for (key, value) in self.helper_env {
                cmd = cmd.env(key, value);
            }
            cmd
        });

        if self.require_helper && helper.is_none() {
            return Err(Error::InvalidConfig(format!(
                "no capability helper configured (pass --helper or set {})",
                ENV_HELPER
            )));
        }

        Ok(BrokerConfig {
            batch_cap: self.batch_cap,
            helper,
            announce_progress: self.announce_progress,
        })
    }
}

//! Type-safe configuration options for the broker.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default upper bound on profiles per `fetch_batch` message.
pub const DEFAULT_BATCH_CAP: usize = 30;

/// Environment variable consulted when no helper path is configured.
pub const ENV_HELPER: &str = "FOLLOWEE_BROKER_HELPER";

/// How to launch the external capability helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl HelperCommand {
    /// Create a helper command with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the helper.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

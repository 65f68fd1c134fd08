use crate::capability::CapabilityError;

/// Errors that can occur while brokering commands.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Spawn errors: failed to start the helper process
/// - IO errors: failures on the command channel or the helper pipes
/// - Protocol errors: malformed or unrecognized inbound commands
/// - Session errors: the command is not valid in the current session state
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // Spawn errors
    // -------------------------------------------------------------------------
    /// Helper binary not found.
    #[error("capability helper not found (searched: {searched})")]
    HelperNotFound { searched: String },

    /// Failed to spawn the helper subprocess.
    #[error("failed to spawn capability helper: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // IO errors
    // -------------------------------------------------------------------------
    /// IO error on the command channel or the helper pipes.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    /// The helper closed its stdout before replying.
    #[error("capability helper closed its output")]
    HelperClosed,

    // -------------------------------------------------------------------------
    // Protocol errors
    // -------------------------------------------------------------------------
    /// Failed to parse an inbound JSON line.
    #[error("failed to parse JSON: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// A known command is missing one of its required fields.
    #[error("Missing field '{field}' for command '{command}'")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    /// The command kind is not one the broker understands.
    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    // -------------------------------------------------------------------------
    // Session errors
    // -------------------------------------------------------------------------
    /// A fetch was attempted without an active session.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The external capability reported a failure.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// A specialized Result type for broker operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a JSON parse error with context.
    pub fn json_parse(source: serde_json::Error, raw: &str) -> Self {
        Self::JsonParse {
            message: format!(
                "at position {}: {}",
                source.column(),
                raw.chars().take(100).collect::<String>()
            ),
            source,
        }
    }

    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Check if this error came from a malformed inbound line.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::JsonParse { .. })
    }

    /// Check if this error came from the external capability.
    pub fn is_capability_error(&self) -> bool {
        matches!(self, Error::Capability(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonParse {
            message: err.to_string(),
            source: err,
        }
    }
}

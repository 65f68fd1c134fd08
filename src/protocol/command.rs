//! Inbound command parsing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::Credentials;
use crate::{Error, Result};

/// Caller-supplied correlation token, echoed verbatim in every response.
///
/// Any JSON value is accepted; an absent `request_id` is echoed as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Value);

impl RequestId {
    pub fn new(value: impl Into<Value>) -> Self {
        RequestId(value.into())
    }

    pub fn is_present(&self) -> bool {
        !self.0.is_null()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// A syntactically valid inbound message, before its fields are checked.
///
/// The command kind is read from `command`, falling back to `type` when
/// `command` is absent. The kind is checked in [`into_command`](Self::into_command)
/// rather than here, so an odd kind still leaves `request_id` readable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub request_id: RequestId,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// A fully validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Credentials),
    Fetch { target: String },
    Logout,
    Shutdown,
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login(_) => "login",
            Command::Fetch { .. } => "fetch",
            Command::Logout => "logout",
            Command::Shutdown => "shutdown",
        }
    }
}

impl Envelope {
    /// Parse one inbound line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonParse`] if the line is not a JSON object.
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| Error::json_parse(e, line))
    }

    /// Validate the command kind and its required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] for an unrecognized or missing kind
    /// and [`Error::MissingField`] when a required field is absent.
    pub fn into_command(self) -> Result<Command> {
        let Envelope { mut fields, .. } = self;

        let kind = fields
            .remove("command")
            .filter(|v| !v.is_null())
            .or_else(|| fields.remove("type").filter(|v| !v.is_null()));
        let command = match kind {
            Some(Value::String(name)) => Some(name),
            Some(other) => {
                return Err(Error::UnknownCommand {
                    command: other.to_string(),
                })
            }
            None => None,
        };

        match command.as_deref() {
            Some("login") => {
                let username = string_field(&fields, "username")
                    .ok_or(Error::MissingField {
                        command: "login",
                        field: "username",
                    })?;
                let password = string_field(&fields, "password")
                    .ok_or(Error::MissingField {
                        command: "login",
                        field: "password",
                    })?;
                Ok(Command::Login(Credentials {
                    username,
                    password,
                    code: code_field(&fields),
                }))
            }
            Some("fetch") => {
                let target = string_field(&fields, "target").ok_or(Error::MissingField {
                    command: "fetch",
                    field: "target",
                })?;
                Ok(Command::Fetch { target })
            }
            Some("logout") => Ok(Command::Logout),
            Some("shutdown") => Ok(Command::Shutdown),
            Some(other) => Err(Error::UnknownCommand {
                command: other.to_string(),
            }),
            None => Err(Error::UnknownCommand {
                command: "<missing>".to_string(),
            }),
        }
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Two-factor codes arrive as strings or bare numbers; `null` and `""` mean none.
fn code_field(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("code")? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

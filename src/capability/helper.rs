//! Capability backend that drives an external helper program.
//!
//! # Architecture
//!
//! ```text
//! followee-broker                       helper
//! ┌──────────────┐                   ┌─────────────┐
//! │ HelperProcess│───stdin (JSON)───▶│             │
//! │              │◀──stdout (JSON)───│             │
//! │              │   stderr: inherit │             │
//! └──────────────┘                   └─────────────┘
//! ```
//!
//! Each call writes one request line and reads exactly one reply line:
//!
//! ```text
//! {"op":"authenticate","username":"..","password":"..","code":null}
//! {"ok":true,"session":<any JSON>}
//! {"op":"resolve_account","session":<..>,"username":".."}
//! {"ok":true,"account_id":"1784"}
//! {"op":"list_followees","session":<..>,"account_id":"1784"}
//! {"ok":true,"followees":[{"username":"..","full_name":".."}]}
//! {"op":"end_session","session":<..>}
//! {"ok":true}
//! ```
//!
//! Any `{"ok":false,"error":".."}` reply becomes a [`CapabilityError`].
//! Stdout lines that are not a reply object (stray debug output) are logged
//! and skipped. If a call is abandoned before its reply arrives, the pipe can
//! no longer be matched to requests and every later call fails.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::types::{AccountId, CapabilityError, Credentials, UserRecord};
use super::Capability;
use crate::config::HelperCommand;
use crate::io::{LineReader, LineWriter};
use crate::{Error, Result};

/// A running capability helper.
///
/// Dropping a `HelperProcess` kills the helper if it is still running.
pub struct HelperProcess {
    child: Child,
    writer: LineWriter<ChildStdin>,
    reader: LineReader<ChildStdout>,
    /// Set while a request is waiting for its reply.
    awaiting_reply: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum HelperRequest<'a> {
    Authenticate {
        username: &'a str,
        password: &'a str,
        code: Option<&'a str>,
    },
    ResolveAccount {
        session: &'a Value,
        username: &'a str,
    },
    ListFollowees {
        session: &'a Value,
        account_id: &'a AccountId,
    },
    EndSession {
        session: &'a Value,
    },
}

impl HelperRequest<'_> {
    fn op(&self) -> &'static str {
        match self {
            HelperRequest::Authenticate { .. } => "authenticate",
            HelperRequest::ResolveAccount { .. } => "resolve_account",
            HelperRequest::ListFollowees { .. } => "list_followees",
            HelperRequest::EndSession { .. } => "end_session",
        }
    }
}

#[derive(Debug, Deserialize)]
struct HelperReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Map<String, Value>,
}

impl HelperProcess {
    /// Spawn the helper described by `command`.
    pub fn spawn(command: &HelperCommand) -> Result<Self> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args());
        cmd.envs(command.get_env());
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::HelperNotFound {
                    searched: command.program().display().to_string(),
                }
            } else {
                Error::ProcessSpawn(e)
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error::ProcessSpawn(std::io::Error::other(
                "helper pipes were not captured",
            )));
        };

        tracing::debug!(pid = ?child.id(), program = %command.program().display(), "spawned capability helper");

        Ok(Self {
            child,
            writer: LineWriter::new(stdin),
            reader: LineReader::new(stdout),
            awaiting_reply: false,
        })
    }

    /// Get the process ID of the running helper.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send one request and wait for its reply body.
    async fn call(
        &mut self,
        request: HelperRequest<'_>,
    ) -> std::result::Result<Map<String, Value>, CapabilityError> {
        let op = request.op();
        if self.awaiting_reply {
            return Err(CapabilityError::new(format!(
                "capability helper is out of sync; cannot send {}",
                op
            )));
        }

        self.awaiting_reply = true;
        self.writer.write_json(&request).await?;
        let reply = self.read_reply(op).await?;
        self.awaiting_reply = false;

        if reply.ok {
            Ok(reply.body)
        } else {
            let message = reply
                .error
                .unwrap_or_else(|| format!("helper rejected {}", op));
            Err(CapabilityError::new(message))
        }
    }

    /// Read lines until one parses as a reply.
    async fn read_reply(&mut self, op: &'static str) -> Result<HelperReply> {
        loop {
            let line = self.reader.next_line().await?.ok_or(Error::HelperClosed)?;
            match serde_json::from_str::<HelperReply>(&line) {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    let preview: String = line.chars().take(100).collect();
                    tracing::warn!(op, error = %e, line = %preview, "skipping non-reply helper output");
                }
            }
        }
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

fn take_field(
    body: &mut Map<String, Value>,
    field: &str,
) -> std::result::Result<Value, CapabilityError> {
    body.remove(field)
        .ok_or_else(|| CapabilityError::new(format!("helper reply is missing '{}'", field)))
}

impl Capability for HelperProcess {
    type Session = Value;

    async fn authenticate(
        &mut self,
        credentials: &Credentials,
    ) -> std::result::Result<Value, CapabilityError> {
        let mut body = self
            .call(HelperRequest::Authenticate {
                username: &credentials.username,
                password: &credentials.password,
                code: credentials.code.as_deref(),
            })
            .await?;
        Ok(body.remove("session").unwrap_or(Value::Null))
    }

    async fn resolve_account(
        &mut self,
        session: &Value,
        username: &str,
    ) -> std::result::Result<AccountId, CapabilityError> {
        let mut body = self
            .call(HelperRequest::ResolveAccount { session, username })
            .await?;
        match take_field(&mut body, "account_id")? {
            Value::String(id) => Ok(AccountId(id)),
            Value::Number(id) => Ok(AccountId(id.to_string())),
            other => Err(CapabilityError::new(format!(
                "helper returned an invalid account_id: {}",
                other
            ))),
        }
    }

    async fn list_followees(
        &mut self,
        session: &Value,
        account: &AccountId,
    ) -> std::result::Result<Vec<UserRecord>, CapabilityError> {
        let mut body = self
            .call(HelperRequest::ListFollowees {
                session,
                account_id: account,
            })
            .await?;
        let followees = take_field(&mut body, "followees")?;
        serde_json::from_value(followees)
            .map_err(|e| CapabilityError::new(format!("helper returned invalid followees: {}", e)))
    }

    async fn end_session(&mut self, session: Value) -> std::result::Result<(), CapabilityError> {
        self.call(HelperRequest::EndSession { session: &session })
            .await
            .map(|_| ())
    }
}

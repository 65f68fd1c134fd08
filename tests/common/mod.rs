//! Test utilities for followee-broker integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use followee_broker::capability::{AccountId, Capability, CapabilityError, Credentials, UserRecord};
use followee_broker::{BrokerConfig, Dispatcher, ExitReason, SessionManager, ShutdownTrigger};
use serde_json::{json, Value};

/// Scripted behavior and call log shared by every [`MockCapability`] a
/// [`MockWorld`] hands out.
#[derive(Default)]
pub struct MockState {
    /// Followee lists by target username. Unknown targets fail to resolve.
    pub followees: HashMap<String, Vec<UserRecord>>,
    /// Password that makes `authenticate` fail.
    pub rejected_password: Option<String>,
    pub fail_end_session: bool,
    /// Make `list_followees` wait forever.
    pub stall_listing: bool,
    /// Number of clients built by the connector.
    pub connects: usize,
    /// Every capability call, in order, as `op:arg`.
    pub calls: Vec<String>,
}

/// Handle to a scripted remote service.
#[derive(Clone, Default)]
pub struct MockWorld {
    state: Arc<Mutex<MockState>>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `target` `count` followees named `{target}_{i}`.
    pub fn with_followees(self, target: &str, count: usize) -> Self {
        let records = (0..count)
            .map(|i| UserRecord::new(format!("{}_{}", target, i), format!("Follow {}", i)))
            .collect();
        self.with_records(target, records)
    }

    pub fn with_records(self, target: &str, records: Vec<UserRecord>) -> Self {
        self.state
            .lock()
            .unwrap()
            .followees
            .insert(target.to_string(), records);
        self
    }

    pub fn rejecting_password(self, password: &str) -> Self {
        self.state.lock().unwrap().rejected_password = Some(password.to_string());
        self
    }

    pub fn failing_end_session(self) -> Self {
        self.state.lock().unwrap().fail_end_session = true;
        self
    }

    pub fn stalling_listing(self) -> Self {
        self.state.lock().unwrap().stall_listing = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// A session manager whose connector builds clients for this world.
    pub fn sessions(&self) -> SessionManager<MockCapability> {
        let state = Arc::clone(&self.state);
        SessionManager::new(move || {
            state.lock().unwrap().connects += 1;
            Ok(MockCapability {
                state: Arc::clone(&state),
            })
        })
    }
}

/// A capability client backed by a [`MockWorld`].
pub struct MockCapability {
    state: Arc<Mutex<MockState>>,
}

impl MockCapability {
    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl Capability for MockCapability {
    type Session = String;

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<String, CapabilityError> {
        self.record(format!("authenticate:{}", credentials.username));
        let state = self.state.lock().unwrap();
        if state.rejected_password.as_deref() == Some(credentials.password.as_str()) {
            return Err(CapabilityError::new("The password you entered is incorrect."));
        }
        Ok(format!("session-{}", credentials.username))
    }

    async fn resolve_account(
        &mut self,
        _session: &String,
        username: &str,
    ) -> Result<AccountId, CapabilityError> {
        self.record(format!("resolve_account:{}", username));
        if self.state.lock().unwrap().followees.contains_key(username) {
            Ok(AccountId::new(username))
        } else {
            Err(CapabilityError::new(format!("User {} not found", username)))
        }
    }

    async fn list_followees(
        &mut self,
        _session: &String,
        account: &AccountId,
    ) -> Result<Vec<UserRecord>, CapabilityError> {
        self.record(format!("list_followees:{}", account));
        let stall = self.state.lock().unwrap().stall_listing;
        if stall {
            std::future::pending::<()>().await;
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .followees
            .get(account.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn end_session(&mut self, session: String) -> Result<(), CapabilityError> {
        self.record(format!("end_session:{}", session));
        if self.state.lock().unwrap().fail_end_session {
            return Err(CapabilityError::new("connection reset"));
        }
        Ok(())
    }
}

/// Builder for inbound command streams.
#[derive(Default)]
pub struct Script {
    lines: Vec<String>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(self, request_id: impl Into<Value>, username: &str, password: &str) -> Self {
        self.command(json!({
            "command": "login",
            "request_id": request_id.into(),
            "username": username,
            "password": password,
        }))
    }

    pub fn fetch(self, request_id: impl Into<Value>, target: &str) -> Self {
        self.command(json!({"command": "fetch", "request_id": request_id.into(), "target": target}))
    }

    pub fn logout(self, request_id: impl Into<Value>) -> Self {
        self.command(json!({"command": "logout", "request_id": request_id.into()}))
    }

    pub fn shutdown(self) -> Self {
        self.command(json!({"command": "shutdown"}))
    }

    pub fn command(self, value: Value) -> Self {
        self.raw(&value.to_string())
    }

    /// Append a line verbatim.
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut input = self.lines.join("\n");
        input.push('\n');
        input
    }
}

/// Everything a broker run wrote, parsed line by line.
pub struct Transcript {
    pub reason: ExitReason,
    pub messages: Vec<Value>,
}

impl Transcript {
    /// Responses (messages with a `command` key) in order.
    pub fn responses(&self) -> Vec<&Value> {
        self.messages
            .iter()
            .filter(|m| m.get("command").is_some())
            .collect()
    }

    /// Responses of one kind.
    pub fn responses_named(&self, command: &str) -> Vec<&Value> {
        self.messages
            .iter()
            .filter(|m| m["command"] == command)
            .collect()
    }

    /// Status events of one kind.
    pub fn statuses(&self, status: &str) -> Vec<&Value> {
        self.messages
            .iter()
            .filter(|m| m["status"] == status)
            .collect()
    }
}

/// Parse newline-delimited JSON output.
pub fn parse_output(output: &[u8]) -> Vec<Value> {
    String::from_utf8(output.to_vec())
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("every output line is JSON"))
        .collect()
}

/// Run a broker over `input` until it stops.
pub async fn run_with_config(world: &MockWorld, input: &str, config: &BrokerConfig) -> Transcript {
    let mut dispatcher = Dispatcher::new(
        world.sessions(),
        input.as_bytes(),
        Vec::new(),
        config,
        ShutdownTrigger::new(),
    );
    let reason = dispatcher.run().await.expect("in-memory output never fails");
    Transcript {
        reason,
        messages: parse_output(&dispatcher.into_output()),
    }
}

/// Run a broker over `input` with the default configuration.
pub async fn run(world: &MockWorld, input: &str) -> Transcript {
    run_with_config(world, input, &BrokerConfig::default()).await
}

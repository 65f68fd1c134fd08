//! The command loop.
//!
//! [`Dispatcher`] reads one command at a time, runs it to completion against
//! the [`SessionManager`], and writes the resulting messages before reading
//! the next line. Every error is turned into an outbound message here; only
//! a failure of the output channel itself ends [`run`](Dispatcher::run)
//! early.
//!
//! A shutdown request preempts any outstanding capability call. Output is
//! only ever written a whole line at a time, so the controlling process never
//! sees a truncated message; a fetch interrupted mid-stream simply stops
//! after its last complete batch.
//!
//! # Example
//!
//! ```ignore
//! let shutdown = ShutdownTrigger::new();
//! lifecycle::listen_for_signals(shutdown.clone());
//!
//! let mut dispatcher = Dispatcher::new(sessions, tokio::io::stdin(), tokio::io::stdout(), &config, shutdown);
//! let reason = dispatcher.run().await?;
//! ```

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::batch::emit_batches;
use crate::capability::{Capability, Credentials};
use crate::config::BrokerConfig;
use crate::io::{LineReader, LineWriter};
use crate::lifecycle::{ExitReason, ShutdownTrigger};
use crate::protocol::{Command, Envelope, Outbound, RequestId, Response, Status};
use crate::session::SessionManager;
use crate::{Error, Result};

/// Reads commands, drives the session, and writes responses.
pub struct Dispatcher<C: Capability, R, W> {
    sessions: SessionManager<C>,
    reader: LineReader<R>,
    writer: LineWriter<W>,
    batch_cap: usize,
    announce_progress: bool,
    shutdown: ShutdownTrigger,
    exit_reason: Option<ExitReason>,
}

impl<C, R, W> Dispatcher<C, R, W>
where
    C: Capability,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        sessions: SessionManager<C>,
        input: R,
        output: W,
        config: &BrokerConfig,
        shutdown: ShutdownTrigger,
    ) -> Self {
        Self {
            sessions,
            reader: LineReader::new(input),
            writer: LineWriter::new(output),
            batch_cap: config.batch_cap(),
            announce_progress: config.announce_progress(),
            shutdown,
            exit_reason: None,
        }
    }

    /// The session manager, for inspecting state.
    pub fn sessions(&self) -> &SessionManager<C> {
        &self.sessions
    }

    /// Consume the dispatcher and return its output sink.
    pub fn into_output(self) -> W {
        self.writer.into_inner()
    }

    /// Announce readiness, serve commands until shutdown, then close the session.
    ///
    /// The `shutdown` event and the forced logout happen exactly once, even
    /// when serving stopped because the output channel failed. Calling `run`
    /// again only reports the first exit reason.
    pub async fn run(&mut self) -> Result<ExitReason> {
        if let Some(reason) = self.exit_reason {
            return Ok(reason);
        }

        let served = self.serve().await;
        self.shut_down().await;

        // A broken output channel counts as the controlling process going away.
        let reason = *served.as_ref().unwrap_or(&ExitReason::EndOfInput);
        self.exit_reason = Some(reason);
        tracing::info!(?reason, "broker stopped");
        served
    }

    async fn serve(&mut self) -> Result<ExitReason> {
        self.emit(Outbound::ready()).await?;

        loop {
            if self.shutdown.is_triggered() {
                return Ok(ExitReason::Signal);
            }

            let line = tokio::select! {
                biased;
                () = self.shutdown.triggered() => return Ok(ExitReason::Signal),
                line = self.reader.next_line() => line?,
            };

            let Some(line) = line else {
                tracing::info!("command channel closed");
                self.shutdown.trigger();
                return Ok(ExitReason::EndOfInput);
            };

            if let Some(reason) = self.handle_line(&line).await? {
                return Ok(reason);
            }
        }
    }

    /// Handle one inbound line. Returns an exit reason for `shutdown` or when
    /// a shutdown request interrupted the command.
    async fn handle_line(&mut self, line: &str) -> Result<Option<ExitReason>> {
        let envelope = match Envelope::parse(line) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(error = %err, "rejected inbound line");
                self.emit(Outbound::error(format!("Invalid JSON input: {}", json_detail(&err))))
                    .await?;
                return Ok(None);
            }
        };

        let request_id = envelope.request_id.clone();
        let command = match envelope.into_command() {
            Ok(command) => command,
            Err(err) => {
                tracing::debug!(request_id = %request_id, error = %err, "invalid command");
                self.emit(Response::error(request_id, err.to_string())).await?;
                return Ok(None);
            }
        };

        tracing::debug!(request_id = %request_id, command = command.name(), "dispatching");
        match command {
            Command::Login(credentials) => self.login(request_id, &credentials).await,
            Command::Fetch { target } => self.fetch(request_id, &target).await,
            Command::Logout => self.logout(request_id).await,
            Command::Shutdown => {
                self.shutdown.trigger();
                Ok(Some(ExitReason::ShutdownCommand))
            }
        }
    }

    async fn login(
        &mut self,
        request_id: RequestId,
        credentials: &Credentials,
    ) -> Result<Option<ExitReason>> {
        self.progress(format!(
            "Attempting to login with username: {}",
            credentials.username
        ))
        .await?;

        let outcome = tokio::select! {
            biased;
            () = self.shutdown.triggered() => return Ok(Some(preempted("login"))),
            outcome = self.sessions.authenticate(credentials) => outcome,
        };

        let success = match outcome {
            Ok(()) => {
                self.emit(Outbound::status(
                    Status::LoginSuccess,
                    format!("Login successful for {}", credentials.username),
                ))
                .await?;
                true
            }
            Err(err) => {
                tracing::warn!(username = %credentials.username, error = %err, "login failed");
                self.emit(Outbound::status(
                    Status::LoginError,
                    format!("Login failed: {}", err),
                ))
                .await?;
                false
            }
        };

        self.emit(Response::login(request_id, success)).await?;
        Ok(None)
    }

    async fn fetch(&mut self, request_id: RequestId, target: &str) -> Result<Option<ExitReason>> {
        if self.sessions.is_logged_in() {
            self.progress(format!("Fetching followees for target: {}", target))
                .await?;
        }

        let outcome = tokio::select! {
            biased;
            () = self.shutdown.triggered() => return Ok(Some(preempted("fetch"))),
            outcome = self.sessions.fetch_followees(target) => outcome,
        };

        let profiles = match outcome {
            Ok(profiles) => profiles,
            Err(Error::NotLoggedIn) => {
                self.emit(Response::fetch_failed(request_id, Error::NotLoggedIn.to_string()))
                    .await?;
                return Ok(None);
            }
            Err(err) => {
                let message = format!("Failed to fetch followees: {}", err);
                self.emit(Outbound::error(message.clone())).await?;
                self.emit(Response::fetch_failed(request_id, message)).await?;
                return Ok(None);
            }
        };

        self.progress(format!(
            "Successfully fetched {} followees for {}",
            profiles.len(),
            target
        ))
        .await?;

        let batches = emit_batches(profiles, self.batch_cap);
        for batch in batches {
            // Whole lines only: a pending shutdown stops between batches.
            if self.shutdown.is_triggered() {
                return Ok(Some(preempted("fetch")));
            }
            tracing::debug!(
                request_id = %request_id,
                batch = batch.batch_index,
                total = batch.batch_count,
                items = batch.items.len(),
                "emitting batch"
            );
            let message = Outbound::from(Response::fetch_batch(request_id.clone(), target, batch));
            self.write_batch(&request_id, &message).await?;
        }
        Ok(None)
    }

    /// Write one encoded batch, or a `fetch_response` failure if it cannot be
    /// encoded. Batches already written stay sent.
    async fn write_batch<T: Serialize + ?Sized>(
        &mut self,
        request_id: &RequestId,
        message: &T,
    ) -> Result<()> {
        match LineWriter::<W>::encode(message) {
            Ok(line) => self.writer.write_line(&line).await,
            Err(err) => {
                tracing::error!(request_id = %request_id, error = %err, "could not encode batch");
                self.emit(Response::fetch_failed(
                    request_id.clone(),
                    format!("Unexpected error in fetch: {}", json_detail(&err)),
                ))
                .await
            }
        }
    }

    async fn logout(&mut self, request_id: RequestId) -> Result<Option<ExitReason>> {
        let report = tokio::select! {
            biased;
            () = self.shutdown.triggered() => return Ok(Some(preempted("logout"))),
            report = self.sessions.logout() => report,
        };
        if let Some(err) = report.remote_error {
            self.emit(Outbound::info(format!(
                "Remote logout failed (ignored): {}",
                err
            )))
            .await?;
        }
        self.emit(Response::logout(request_id)).await?;
        Ok(None)
    }

    /// Announce shutdown and force a logout. Write failures are only logged.
    async fn shut_down(&mut self) {
        if let Err(err) = self.emit(Outbound::shutdown()).await {
            tracing::warn!(error = %err, "could not announce shutdown");
        }
        let report = self.sessions.logout().await;
        if let Some(err) = report.remote_error {
            tracing::debug!(error = %err, "forced logout failed; ignoring");
        }
    }

    async fn progress(&mut self, message: String) -> Result<()> {
        if self.announce_progress {
            self.emit(Outbound::info(message)).await
        } else {
            Ok(())
        }
    }

    async fn emit(&mut self, message: impl Into<Outbound>) -> Result<()> {
        self.writer.write_json(&message.into()).await
    }
}

/// The serde message for JSON errors, without the crate's wrapper text.
fn json_detail(err: &Error) -> String {
    match err {
        Error::JsonParse { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}

fn preempted(command: &'static str) -> ExitReason {
    tracing::info!(command, "shutdown requested; abandoning command in progress");
    ExitReason::Signal
}

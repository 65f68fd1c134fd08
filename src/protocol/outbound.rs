//! Outbound messages written to the controlling process.

use serde::{Deserialize, Serialize};

use super::command::RequestId;
use crate::batch::Batch;
use crate::capability::Profile;

/// Kind of an unsolicited status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ready,
    Info,
    Error,
    Shutdown,
    LoginSuccess,
    LoginError,
}

/// `{"status": .., "message": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: Status,
    pub message: String,
}

/// A response tied to one inbound command through its `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Response {
    LoginResponse {
        request_id: RequestId,
        success: bool,
    },
    /// Only sent on failure; successful fetches answer with batches.
    FetchResponse {
        request_id: RequestId,
        success: bool,
        error: String,
    },
    FetchBatch {
        request_id: RequestId,
        success: bool,
        target: String,
        batch_num: usize,
        total_batches: usize,
        data: Vec<Profile>,
    },
    Logout {
        request_id: RequestId,
        success: bool,
    },
    Error {
        request_id: RequestId,
        success: bool,
        message: String,
    },
}

impl Response {
    pub fn login(request_id: RequestId, success: bool) -> Self {
        Response::LoginResponse {
            request_id,
            success,
        }
    }

    pub fn fetch_failed(request_id: RequestId, error: impl Into<String>) -> Self {
        Response::FetchResponse {
            request_id,
            success: false,
            error: error.into(),
        }
    }

    pub fn fetch_batch(request_id: RequestId, target: impl Into<String>, batch: Batch) -> Self {
        Response::FetchBatch {
            request_id,
            success: true,
            target: target.into(),
            batch_num: batch.batch_index,
            total_batches: batch.batch_count,
            data: batch.items,
        }
    }

    /// Logout is unconditionally successful from the caller's side.
    pub fn logout(request_id: RequestId) -> Self {
        Response::Logout {
            request_id,
            success: true,
        }
    }

    pub fn error(request_id: RequestId, message: impl Into<String>) -> Self {
        Response::Error {
            request_id,
            success: false,
            message: message.into(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            Response::LoginResponse { request_id, .. }
            | Response::FetchResponse { request_id, .. }
            | Response::FetchBatch { request_id, .. }
            | Response::Logout { request_id, .. }
            | Response::Error { request_id, .. } => request_id,
        }
    }
}

/// Anything the broker writes to its output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outbound {
    Status(StatusEvent),
    Response(Response),
}

impl Outbound {
    pub fn status(status: Status, message: impl Into<String>) -> Self {
        Outbound::Status(StatusEvent {
            status,
            message: message.into(),
        })
    }

    pub fn ready() -> Self {
        Self::status(Status::Ready, "Service started. Waiting for commands...")
    }

    pub fn shutdown() -> Self {
        Self::status(Status::Shutdown, "Service is shutting down")
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::status(Status::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::status(Status::Error, message)
    }

    /// The echoed request id, for command responses.
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Outbound::Status(_) => None,
            Outbound::Response(response) => Some(response.request_id()),
        }
    }
}

impl From<Response> for Outbound {
    fn from(response: Response) -> Self {
        Outbound::Response(response)
    }
}

impl From<StatusEvent> for Outbound {
    fn from(event: StatusEvent) -> Self {
        Outbound::Status(event)
    }
}

//! Line-delimited JSON protocol spoken with the controlling process.
//!
//! # Inbound
//!
//! One JSON object per line. The kind is read from `command`:
//!
//! | command  | required fields      | optional |
//! |----------|----------------------|----------|
//! | login    | username, password   | code     |
//! | fetch    | target               |          |
//! | logout   |                      |          |
//! | shutdown |                      |          |
//!
//! # Outbound
//!
//! - [`StatusEvent`]: `{"status": "ready" | "info" | .., "message": ..}`
//! - [`Response`]: `{"command": "login_response" | .., "request_id": .., "success": ..}`
//!
//! # Example
//!
//! ```
//! use followee_broker::protocol::{Command, Envelope};
//!
//! let envelope = Envelope::parse(r#"{"command": "fetch", "request_id": "r1", "target": "nasa"}"#).unwrap();
//! assert_eq!(envelope.request_id.to_string(), "r1");
//! assert_eq!(envelope.into_command().unwrap(), Command::Fetch { target: "nasa".into() });
//! ```

mod command;
mod outbound;

pub use command::{Command, Envelope, RequestId};
pub use outbound::{Outbound, Response, Status, StatusEvent};

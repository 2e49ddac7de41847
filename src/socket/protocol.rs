use serde::{Deserialize, Serialize};

use crate::event::Connection;

/// Messages a greeter sends on the login socket, one JSON document per request.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GreeterMessage {
    Connect,
    Login {
        user: String,
        password: String,
        session: String,
    },
}

/// Replies sent back to the greeter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    HostName { name: String },
    LoginSucceeded,
    LoginFailed,
    Error { message: String },
}

/// Commands from the display to the socket worker thread.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum SocketCommand {
    Reply { connection: Connection, message: DaemonMessage },
    Stop,
}

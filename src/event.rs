use std::fmt;

use serde::{Deserialize, Serialize};

use crate::helper::HelperEvent;

/// Opaque handle to the greeter connection a login request came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection(String);

impl Connection {
    pub fn from_identity(identity: &[u8]) -> Self {
        Connection(hex::encode(identity))
    }

    pub fn identity(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.0)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A login request received from a greeter.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub connection: Connection,
    pub user: String,
    pub password: String,
    pub session: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("LoginRequest")
            .field("connection", &self.connection)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("session", &self.session)
            .finish()
    }
}

/// Events flowing over the event bus into the daemon loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// An X server signalled readiness. `pid` is the sender of the signal, when known.
    ServerReady { pid: Option<u32> },
    ServerEnded { display: u32, pid: u32 },
    Login { display: u32, request: LoginRequest },
    /// A message or the exit of the authentication helper running as `pid`.
    Helper { display: u32, pid: u32, event: HelperEvent },
    Shutdown,
}

/// Events handled by a single display, once routed by its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    ServerReady,
    ServerEnded { pid: u32 },
    Login(LoginRequest),
    Helper { pid: u32, event: HelperEvent },
}

/// Notifications a display raises towards its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayNotification {
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_round_trips_identity() {
        let connection = Connection::from_identity(&[0, 128, 255]);
        assert_eq!(connection.to_string(), "0080ff");
        assert_eq!(connection.identity().unwrap(), vec![0, 128, 255]);
    }

    #[test]
    fn login_request_debug_hides_password() {
        let request = LoginRequest {
            connection: Connection::from_identity(b"g"),
            user: "alice".to_string(),
            password: "hunter2".to_string(),
            session: "plasma.desktop".to_string(),
        };
        let debug = format!("{:?}", DaemonEvent::Login { display: 0, request });
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}

pub use protocol::{GreeterMessage, DaemonMessage};
pub use socket_server::SocketServer;

mod protocol;
mod socket_server;

use std::path::Path;

use crate::common::Result;
use crate::event::Connection;

/// The endpoint greeters use to submit login requests for a display.
pub trait LoginSocket {
    /// Starts listening for the given display. Does nothing when already listening.
    fn start(&mut self, display_name: &str) -> Result<()>;
    fn stop(&mut self);
    /// Filesystem path of the listening socket, while listening.
    fn address(&self) -> Option<&Path>;
    fn login_succeeded(&mut self, connection: &Connection);
    fn login_failed(&mut self, connection: &Connection);
}

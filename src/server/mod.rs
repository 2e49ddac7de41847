pub use xorg::XorgServer;
pub use greeter::GreeterProcess;

mod xorg;
mod greeter;

use std::path::Path;

use crate::common::Result;

/// The X server backing a display.
///
/// Readiness is not reported through this trait: the server signals it out of band and the
/// owner routes it to the display by process id.
pub trait DisplayServer {
    fn configure(&mut self, display_name: &str, auth_path: &Path);
    fn launch(&mut self) -> Result<()>;
    /// Runs once the server is ready, before any client is started on it.
    fn prepare_display(&mut self) -> Result<()>;
    /// Stops the server. No ended notification is raised for a stop requested here.
    fn stop(&mut self);
    fn pid(&self) -> Option<u32>;
}

/// The login UI shown on a display.
pub trait Greeter {
    fn configure(&mut self, display_name: &str, auth_path: &Path, socket: &Path, theme: &str);
    fn launch(&mut self) -> Result<()>;
    fn stop(&mut self);
}

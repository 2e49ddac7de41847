pub use descriptor::SessionDescriptor;
pub use environment::{SessionPlacement, session_environment};
pub use paths::{SessionPaths, DisplayManagerPaths};
pub use state::{StateStore, StateFile, LastSession};

mod descriptor;
mod environment;
mod paths;
mod state;

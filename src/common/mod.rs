pub use event_bus::{EventBus, EventPublisher};
pub use error::{DisplayError, Result};
pub use settings::{Settings, LoggingSettings, XDisplaySettings, AutologinSettings, ThemeSettings};
pub use process_handle::ProcessHandle;

mod event_bus;
mod error;
pub(crate) mod settings;
mod process_handle;

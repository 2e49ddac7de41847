use std::rc::Rc;
use std::thread;

use libc::{SIGINT, SIGQUIT, SIGTERM, SIGUSR1};
use signal_hook::iterator::SignalsInfo;
use signal_hook::iterator::exfiltrator::WithOrigin;

use crate::common::{EventBus, EventPublisher, Result, Settings};
use crate::event::DaemonEvent;
use crate::seat::Seat;

/// Represents the display manager daemon: one seat driven by a single event loop.
pub struct Daemon {
}

impl Daemon {
    /// Creates a new instance of the `Daemon`.
    pub fn new() -> Self {
        Self {
        }
    }

    /// Runs the daemon until a termination signal is received.
    ///
    /// # Arguments
    /// * `settings` - The verified application settings.
    ///
    /// # Returns
    /// * `Result<()>` - Indicates success or failure of the operation.
    pub fn run(&self, settings: Settings) -> Result<()> {
        info!("Starting Vigil display manager...");

        // Create ZMQ context
        let context = zmq::Context::new();

        // Create event bus
        let event_bus = EventBus::new(&context)?;

        // Listen to signals before any X server can report readiness
        self.create_signal_publisher(&context)?;

        let mut seat = Seat::with_system(Rc::new(settings), context.clone());
        seat.start()?;

        info!("Vigil running on seat {}", seat.name());
        loop {
            match event_bus.next()? {
                DaemonEvent::Shutdown => {
                    info!("Termination signal received. Shutting down Vigil...");
                    break;
                },
                event => seat.handle_event(event),
            }
        }

        seat.stop();

        info!("Vigil terminated");
        Ok(())
    }

    /// Forwards signals to the event bus from a dedicated thread.
    ///
    /// SIGUSR1 is sent by an X server once it is ready and carries the sender pid. Termination
    /// signals become a `Shutdown` event.
    fn create_signal_publisher(&self, context: &zmq::Context) -> Result<thread::JoinHandle<()>> {
        let publisher = EventBus::create_event_publisher(context)?;
        let mut signals = SignalsInfo::<WithOrigin>::new([SIGUSR1, SIGTERM, SIGINT, SIGQUIT])?;

        let handle = thread::Builder::new()
            .name("signals".to_string())
            .spawn(move || {
                for origin in signals.forever() {
                    let event = match origin.signal {
                        SIGUSR1 => DaemonEvent::ServerReady { pid: origin.process.map(|process| process.pid as u32) },
                        _ => DaemonEvent::Shutdown,
                    };

                    let shutdown = event == DaemonEvent::Shutdown;
                    Self::publish(&publisher, &event);
                    if shutdown {
                        break;
                    }
                }
            })?;

        Ok(handle)
    }

    fn publish(publisher: &EventPublisher, event: &DaemonEvent) {
        if let Err(error) = publisher.publish(event) {
            error!("Failed to publish {:?}: {}", event, error);
        }
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

use crate::common::Result;
use crate::event::DaemonEvent;

static EVENT_BUS_ADDR: &str = "inproc://vigil/event-bus";

/// The `EventBus` is the receiving end of the daemon event loop.
/// Every thread that observes something happening outside the loop (signals, process exits,
/// helper messages, greeter requests) owns an `EventPublisher` and pushes a `DaemonEvent`
/// onto the bus. The loop is the only consumer, so all display state is mutated from a single thread.
pub struct EventBus {
    socket: zmq::Socket,
}

impl EventBus {

    /// Creates the event bus, binding its PULL socket.
    ///
    /// # Arguments
    /// * `context` - The ZeroMQ context shared with all publishers.
    ///
    /// # Returns
    /// A `Result` containing the `EventBus` or a `DisplayError` if the socket cannot be bound.
    pub fn new(context: &zmq::Context) -> Result<Self> {
        let socket = context.socket(zmq::PULL)?;
        socket.set_linger(0)?;
        if let Err(error) = socket.bind(EVENT_BUS_ADDR) {
            error!("Failed to bind event bus to {}: {}", EVENT_BUS_ADDR, error);
            return Err(error.into());
        }

        Ok(Self {
            socket
        })
    }

    /// Blocks until the next event is available.
    ///
    /// Undecodable messages are logged and skipped.
    pub fn next(&self) -> Result<DaemonEvent> {
        loop {
            let mut msg = zmq::Message::new();
            self.socket.recv(&mut msg, 0)?;

            match serde_json::from_slice::<DaemonEvent>(&msg) {
                Ok(event) => return Ok(event),
                Err(error) => error!("Failed to decode event bus message: {}", error),
            }
        }
    }

    /// Creates a new event publisher connected to the bus.
    ///
    /// # Arguments
    /// * `context` - The ZeroMQ context.
    ///
    /// # Returns
    /// An `EventPublisher` that can be moved to another thread.
    pub fn create_event_publisher(context: &zmq::Context) -> Result<EventPublisher> {
        let socket = context.socket(zmq::PUSH)?;
        socket.set_linger(0)?;

        if let Err(error) = socket.connect(EVENT_BUS_ADDR) {
            error!("Failed to connect event publisher to {}: {}", EVENT_BUS_ADDR, error);
            return Err(error.into());
        }

        Ok(EventPublisher {
            socket
        })
    }
}

/// Sending end of the event bus. One per producing thread.
pub struct EventPublisher {
    socket: zmq::Socket,
}

impl EventPublisher {
    pub fn publish(&self, event: &DaemonEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.socket.send(payload, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::{HelperEvent, HelperExitStatus};

    #[test]
    fn delivers_events_in_order() {
        let context = zmq::Context::new();
        let bus = EventBus::new(&context).unwrap();
        let publisher = EventBus::create_event_publisher(&context).unwrap();

        publisher.publish(&DaemonEvent::ServerReady { pid: Some(42) }).unwrap();
        publisher.publish(&DaemonEvent::Helper {
            display: 0,
            pid: 7,
            event: HelperEvent::Finished { status: HelperExitStatus::AuthError },
        }).unwrap();

        assert_eq!(bus.next().unwrap(), DaemonEvent::ServerReady { pid: Some(42) });
        assert_eq!(bus.next().unwrap(), DaemonEvent::Helper {
            display: 0,
            pid: 7,
            event: HelperEvent::Finished { status: HelperExitStatus::AuthError },
        });
    }
}

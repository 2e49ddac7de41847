use std::path::{Path, PathBuf};
use std::thread;

use zeroize::Zeroizing;

use crate::common::{EventBus, EventPublisher, Result, DisplayError};
use crate::event::{Connection, DaemonEvent, LoginRequest};
use crate::fs::remove;
use super::LoginSocket;
use super::protocol::{GreeterMessage, DaemonMessage, SocketCommand};

/// `LoginSocket` listening on a zmq ROUTER socket bound to an ipc endpoint.
///
/// Requests are handled on a worker thread: login requests are published on the event bus and
/// answered later, when the display sends the result back through an inproc control socket.
pub struct SocketServer {
    display_id: u32,
    runtime_dir: PathBuf,
    context: zmq::Context,
    address: Option<PathBuf>,
    control: Option<zmq::Socket>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SocketServer {
    pub fn new(display_id: u32, runtime_dir: &Path, context: zmq::Context) -> Self {
        Self {
            display_id,
            runtime_dir: runtime_dir.to_path_buf(),
            context,
            address: None,
            control: None,
            worker: None,
        }
    }

    fn control_address(&self) -> String {
        format!("inproc://vigil/login-socket/{}", self.display_id)
    }

    fn create_router_socket(&self, path: &Path) -> Result<zmq::Socket> {
        let socket = self.context.socket(zmq::ROUTER)?;
        socket.set_linger(0)?;

        let address = format!("ipc://{}", path.display());
        match socket.bind(&address) {
            Ok(_) => info!("Login socket bound to {}", address),
            Err(error) => return Err(DisplayError::TransportError(format!("Failed to bind login socket to {}: {}", address, error))),
        }

        Ok(socket)
    }

    fn send_command(&mut self, command: &SocketCommand) {
        let control = match self.control.as_ref() {
            Some(control) => control,
            None => {
                warn!("Login socket for display :{} is not running, dropping {:?}", self.display_id, command);
                return;
            }
        };

        let result = serde_json::to_vec(command)
            .map_err(DisplayError::from)
            .and_then(|payload| control.send(payload, 0).map_err(DisplayError::from));
        if let Err(error) = result {
            error!("Failed to send command to login socket worker: {}", error);
        }
    }

    fn reply(&mut self, connection: &Connection, message: DaemonMessage) {
        self.send_command(&SocketCommand::Reply { connection: connection.clone(), message });
    }
}

impl LoginSocket for SocketServer {
    fn start(&mut self, display_name: &str) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let path = self.runtime_dir.join(format!("login-{}.sock", self.display_id));
        remove(&path)?;

        let router = self.create_router_socket(&path)?;

        let control_pull = self.context.socket(zmq::PULL)?;
        control_pull.set_linger(0)?;
        control_pull.bind(&self.control_address())?;

        let control_push = self.context.socket(zmq::PUSH)?;
        control_push.set_linger(0)?;
        control_push.connect(&self.control_address())?;

        let worker = SocketWorker {
            display_id: self.display_id,
            router,
            control: control_pull,
            publisher: EventBus::create_event_publisher(&self.context)?,
            host_name: nix::unistd::gethostname()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        debug!("Starting login socket for display {}", display_name);
        self.worker = Some(thread::Builder::new()
            .name(format!("login-socket-{}", self.display_id))
            .spawn(move || worker.run())?);
        self.control = Some(control_push);
        self.address = Some(path);
        Ok(())
    }

    fn stop(&mut self) {
        if self.worker.is_none() {
            return;
        }

        self.send_command(&SocketCommand::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Login socket worker for display :{} panicked", self.display_id);
            }
        }
        self.control = None;

        if let Some(path) = self.address.take() {
            if let Err(error) = remove(&path) {
                warn!("{}", error);
            }
        }
    }

    fn address(&self) -> Option<&Path> {
        self.address.as_deref()
    }

    fn login_succeeded(&mut self, connection: &Connection) {
        self.reply(connection, DaemonMessage::LoginSucceeded);
    }

    fn login_failed(&mut self, connection: &Connection) {
        self.reply(connection, DaemonMessage::LoginFailed);
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the zmq sockets on the worker thread.
struct SocketWorker {
    display_id: u32,
    router: zmq::Socket,
    control: zmq::Socket,
    publisher: EventPublisher,
    host_name: String,
}

impl SocketWorker {
    fn run(self) {
        loop {
            let mut items = [
                self.control.as_poll_item(zmq::POLLIN),
                self.router.as_poll_item(zmq::POLLIN),
            ];

            // Poll both sockets
            if let Err(error) = zmq::poll(&mut items, -1) {
                error!("Login socket poll failed: {}", error);
                break;
            }
            let (control_ready, request_ready) = (items[0].is_readable(), items[1].is_readable());

            if control_ready {
                match self.receive_command() {
                    Some(SocketCommand::Stop) => break,
                    Some(SocketCommand::Reply { connection, message }) => self.reply(&connection, &message),
                    None => {},
                }
            }

            if request_ready {
                match self.router.recv_multipart(0) {
                    Ok(frames) => self.handle_request(frames),
                    Err(error) => error!("Failed to receive message on login socket: {}", error),
                }
            }
        }

        info!("Stopped login socket for display :{}", self.display_id);
    }

    fn receive_command(&self) -> Option<SocketCommand> {
        let mut msg = zmq::Message::new();
        if let Err(error) = self.control.recv(&mut msg, 0) {
            error!("Failed to receive login socket command: {}", error);
            return None;
        }

        match serde_json::from_slice(&msg) {
            Ok(command) => Some(command),
            Err(error) => {
                error!("Invalid login socket command: {}", error);
                None
            }
        }
    }

    fn handle_request(&self, mut frames: Vec<Vec<u8>>) {
        if frames.len() < 2 {
            warn!("Dropping malformed request on login socket");
            return;
        }

        let body = Zeroizing::new(frames.pop().unwrap_or_default());
        let connection = Connection::from_identity(&frames[0]);

        match serde_json::from_slice::<GreeterMessage>(&body) {
            Ok(GreeterMessage::Connect) => {
                debug!("Greeter {} connected to display :{}", connection, self.display_id);
                self.reply(&connection, &DaemonMessage::HostName { name: self.host_name.clone() });
            },
            Ok(GreeterMessage::Login { user, password, session }) => {
                debug!("Login request from greeter {} for user {}", connection, user);
                let request = LoginRequest { connection, user, password, session };
                if let Err(error) = self.publisher.publish(&DaemonEvent::Login { display: self.display_id, request }) {
                    error!("Failed to publish login request: {}", error);
                }
            },
            Err(error) => {
                warn!("Invalid message from greeter {}: {}", connection, error);
                self.reply(&connection, &DaemonMessage::Error { message: error.to_string() });
            },
        }
    }

    fn reply(&self, connection: &Connection, message: &DaemonMessage) {
        let result = connection.identity()
            .map_err(DisplayError::from)
            .and_then(|identity| Ok((identity, serde_json::to_vec(message)?)))
            .and_then(|(identity, payload)| {
                self.router.send_multipart(vec![identity, Vec::new(), payload], 0).map_err(DisplayError::from)
            });

        if let Err(error) = result {
            error!("Failed to reply to greeter {}: {}", connection, error);
        }
    }
}

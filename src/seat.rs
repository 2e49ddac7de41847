use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::authority::XauthTool;
use crate::common::{Result, Settings};
use crate::display::{Display, DisplayParts, DisplayServices};
use crate::event::{DaemonEvent, DisplayEvent, DisplayNotification};
use crate::helper::HelperProcess;
use crate::server::{GreeterProcess, XorgServer};
use crate::session::{DisplayManagerPaths, StateFile};
use crate::socket::SocketServer;
use crate::users::{SystemUsers, UserDatabase};

/// Builds the collaborators of a new display from its display and terminal ids.
pub type PartsFactory = Box<dyn Fn(u32, u32) -> DisplayParts>;

/// Owns the displays of a seat, routes daemon events to them and replaces the ones that stop.
pub struct Seat {
    name: String,
    services: DisplayServices,
    create_parts: PartsFactory,
    displays: Vec<Display>,
    first_run: bool,
    stopping: bool,
}

impl Seat {
    pub fn new(name: &str, services: DisplayServices, create_parts: PartsFactory) -> Self {
        Self {
            name: name.to_string(),
            services,
            create_parts,
            displays: Vec::new(),
            first_run: true,
            stopping: false,
        }
    }

    /// Creates a seat whose displays run real X servers, greeters and helpers.
    pub fn with_system(settings: Rc<Settings>, context: zmq::Context) -> Self {
        let users: Rc<dyn UserDatabase> = Rc::new(SystemUsers);
        let services = DisplayServices {
            settings: settings.clone(),
            users: users.clone(),
            paths: Rc::new(DisplayManagerPaths::new()),
            state: Rc::new(RefCell::new(StateFile::open(Path::new(&settings.state_path)))),
        };

        let factory_settings = settings.clone();
        let create_parts = Box::new(move |display_id: u32, terminal_id: u32| {
            let settings = &factory_settings;
            DisplayParts {
                server: Box::new(XorgServer::new(display_id, terminal_id, &settings.x_display, context.clone())),
                greeter: Box::new(GreeterProcess::new(&settings.greeter.path, &settings.service_account, &settings.users.default_path, users.clone())),
                helper: Box::new(HelperProcess::new(display_id, &settings.helper.path, context.clone())),
                socket: Box::new(SocketServer::new(display_id, Path::new(&settings.runtime_dir), context.clone())),
                authority: Box::new(XauthTool::from_settings(&settings.x_display)),
            }
        });

        Self::new(&settings.seat, services, create_parts)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn displays(&self) -> &[Display] {
        &self.displays
    }

    /// Creates and starts the first display of the seat.
    pub fn start(&mut self) -> Result<()> {
        info!("Starting seat {}", self.name);
        self.stopping = false;
        self.add_display().map(|_| ())
    }

    /// Creates and starts a display on the lowest free display id.
    ///
    /// # Returns
    /// The id of the new display.
    pub fn add_display(&mut self) -> Result<u32> {
        let display_id = self.next_display_id();
        let terminal_id = self.services.settings.x_display.minimum_vt + display_id;
        let first_run = std::mem::replace(&mut self.first_run, false);

        debug!("Adding display :{} on vt{} to seat {}", display_id, terminal_id, self.name);
        let parts = (self.create_parts)(display_id, terminal_id);
        let mut display = Display::new(display_id, terminal_id, first_run, &self.services, parts);
        display.start()?;

        self.displays.push(display);
        Ok(display_id)
    }

    /// Routes an event to the display it concerns, then handles what the displays reported.
    pub fn handle_event(&mut self, event: DaemonEvent) {
        match event {
            DaemonEvent::ServerReady { pid: Some(pid) } => {
                match self.displays.iter_mut().find(|display| display.server_pid() == Some(pid)) {
                    Some(display) => display.handle_event(DisplayEvent::ServerReady),
                    None => debug!("Readiness signal from unknown process [pid={}]", pid),
                }
            },
            DaemonEvent::ServerReady { pid: None } => warn!("Dropping readiness signal without sender"),
            DaemonEvent::ServerEnded { display, pid } => self.dispatch(display, DisplayEvent::ServerEnded { pid }),
            DaemonEvent::Login { display, request } => self.dispatch(display, DisplayEvent::Login(request)),
            DaemonEvent::Helper { display, pid, event } => self.dispatch(display, DisplayEvent::Helper { pid, event }),
            DaemonEvent::Shutdown => self.stop(),
        }

        self.process_notifications();
    }

    /// Stops every display. Stopped displays are not replaced.
    pub fn stop(&mut self) {
        if self.stopping {
            return;
        }

        info!("Stopping seat {}", self.name);
        self.stopping = true;
        for display in self.displays.iter_mut() {
            display.stop();
        }
        self.displays.clear();
    }

    fn dispatch(&mut self, display_id: u32, event: DisplayEvent) {
        match self.displays.iter_mut().find(|display| display.display_id() == display_id) {
            Some(display) => display.handle_event(event),
            None => debug!("Dropping event for unknown display :{}", display_id),
        }
    }

    fn process_notifications(&mut self) {
        let stopped: Vec<u32> = self.displays.iter_mut()
            .filter_map(|display| {
                let stopped = display.take_notifications().contains(&DisplayNotification::Stopped);
                stopped.then(|| display.display_id())
            })
            .collect();

        for display_id in stopped {
            info!("Display :{} stopped", display_id);
            self.displays.retain(|display| display.display_id() != display_id);

            if !self.stopping {
                if let Err(error) = self.add_display() {
                    error!("Failed to restart display on seat {}: {}", self.name, error);
                }
            }
        }
    }

    fn next_display_id(&self) -> u32 {
        (0..)
            .find(|id| {
                !self.displays.iter().any(|display| display.display_id() == *id)
                    && !Path::new(&format!("/tmp/.X{}-lock", id)).exists()
            })
            .unwrap_or(0)
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        self.stop();
    }
}

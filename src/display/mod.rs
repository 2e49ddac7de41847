mod authentication;
mod login;

use std::cell::RefCell;
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use zeroize::Zeroizing;

use crate::authority::{AuthorityTool, Cookie, adopt_ownership};
use crate::common::{DisplayError, Result, Settings};
use crate::event::{Connection, DisplayEvent, DisplayNotification};
use crate::fs::{chown, mkdir, remove};
use crate::helper::AuthHelper;
use crate::server::{DisplayServer, Greeter};
use crate::session::{SessionPaths, StateStore};
use crate::socket::LoginSocket;
use crate::users::UserDatabase;

/// Services shared by all displays of a seat.
#[derive(Clone)]
pub struct DisplayServices {
    pub settings: Rc<Settings>,
    pub users: Rc<dyn UserDatabase>,
    pub paths: Rc<dyn SessionPaths>,
    pub state: Rc<RefCell<dyn StateStore>>,
}

/// The processes and endpoints a single display drives.
pub struct DisplayParts {
    pub server: Box<dyn DisplayServer>,
    pub greeter: Box<dyn Greeter>,
    pub helper: Box<dyn AuthHelper>,
    pub socket: Box<dyn LoginSocket>,
    pub authority: Box<dyn AuthorityTool>,
}

/// One virtual display: its X server, the greeter or autologin session running on it, and the
/// authentication exchanges started from it.
///
/// A display is driven by its owner from the daemon loop: `start` launches the X server,
/// the owner then routes `DisplayEvent`s to `handle_event`. When the display tears down it
/// raises `DisplayNotification::Stopped`, which the owner collects with `take_notifications`.
pub struct Display {
    display_id: u32,
    terminal_id: u32,
    name: String,
    auth_path: PathBuf,
    cookie: Option<Cookie>,
    started: bool,
    first_run: bool,
    autologin: bool,
    pending_login: Option<Connection>,
    pass_phrase: Option<Zeroizing<String>>,
    session_selector: Option<String>,
    notifications: Vec<DisplayNotification>,
    settings: Rc<Settings>,
    users: Rc<dyn UserDatabase>,
    paths: Rc<dyn SessionPaths>,
    state: Rc<RefCell<dyn StateStore>>,
    server: Box<dyn DisplayServer>,
    greeter: Box<dyn Greeter>,
    helper: Box<dyn AuthHelper>,
    socket: Box<dyn LoginSocket>,
    authority: Box<dyn AuthorityTool>,
}

impl Display {
    /// Creates a display.
    ///
    /// # Arguments
    /// * `display_id` - X display number.
    /// * `terminal_id` - Virtual terminal the server runs on, 0 for none.
    /// * `first_run` - Whether this is the first display of its owner, which allows autologin
    ///   without `relogin`.
    pub fn new(display_id: u32, terminal_id: u32, first_run: bool, services: &DisplayServices, parts: DisplayParts) -> Self {
        let name = format!(":{}", display_id);
        let auth_path = Path::new(&services.settings.runtime_dir).join(&name);

        Self {
            display_id,
            terminal_id,
            name,
            auth_path,
            cookie: None,
            started: false,
            first_run,
            autologin: false,
            pending_login: None,
            pass_phrase: None,
            session_selector: None,
            notifications: Vec::new(),
            settings: services.settings.clone(),
            users: services.users.clone(),
            paths: services.paths.clone(),
            state: services.state.clone(),
            server: parts.server,
            greeter: parts.greeter,
            helper: parts.helper,
            socket: parts.socket,
            authority: parts.authority,
        }
    }

    pub fn display_id(&self) -> u32 {
        self.display_id
    }

    pub fn terminal_id(&self) -> u32 {
        self.terminal_id
    }

    /// The X display name, `:<display_id>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cookie(&self) -> Option<&Cookie> {
        self.cookie.as_ref()
    }

    pub fn auth_path(&self) -> &Path {
        &self.auth_path
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn server_pid(&self) -> Option<u32> {
        self.server.pid()
    }

    /// Returns the notifications raised since the last call.
    pub fn take_notifications(&mut self) -> Vec<DisplayNotification> {
        mem::take(&mut self.notifications)
    }

    /// Generates a new cookie, installs it in the authority file and launches the X server.
    ///
    /// Does nothing while the display is started or its server is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.started || self.server.pid().is_some() {
            return Ok(());
        }

        info!("Starting display {}", self.name);

        if let Some(runtime_dir) = self.auth_path.parent() {
            mkdir(runtime_dir)?;
        }

        let cookie = Cookie::generate();
        if let Err(error) = self.authority.install(&self.auth_path, &self.name, &cookie) {
            error!("Failed to install cookie for display {}: {}", self.name, error);
            self.discard_credentials();
            return Err(error);
        }
        adopt_ownership(self.users.as_ref(), &self.auth_path, &self.settings.service_account);
        self.cookie = Some(cookie);

        self.server.configure(&self.name, &self.auth_path);
        if let Err(error) = self.server.launch() {
            error!("Failed to launch X server for display {}: {}", self.name, error);
            self.discard_credentials();
            return Err(error);
        }

        Ok(())
    }

    /// Continues the startup once the X server accepts connections: either logs the autologin
    /// user in or brings up the login socket and the greeter.
    pub fn on_server_ready(&mut self) {
        if self.started {
            return;
        }

        if let Err(error) = self.server.prepare_display() {
            warn!("Failed to prepare display {}: {}", self.name, error);
        }
        debug!("X server for display {} is ready", self.name);

        let first_run = mem::replace(&mut self.first_run, false);
        let autologin = self.settings.autologin.clone();
        if autologin.is_configured() && (first_run || autologin.relogin) {
            info!("Logging {} in automatically on display {}", autologin.user, self.name);
            self.started = true;
            self.autologin = true;
            if let Err(error) = self.start_auth(&autologin.user, "", &autologin.session) {
                error!("Autologin on display {} failed: {}", self.name, error);
                self.stop();
            }
            return;
        }

        self.autologin = false;
        if let Err(error) = self.start_greeter() {
            error!("Failed to start greeter on display {}: {}", self.name, error);
            self.greeter.stop();
            self.socket.stop();
            return;
        }

        self.started = true;
    }

    fn start_greeter(&mut self) -> Result<()> {
        self.socket.start(&self.name)?;
        let socket_path = self.socket.address()
            .map(Path::to_path_buf)
            .ok_or_else(|| DisplayError::TransportError(format!("Login socket for display {} has no address", self.name)))?;

        // The greeter runs as the service account and must be able to connect
        if let Some(account) = self.users.lookup(&self.settings.service_account) {
            chown(&socket_path, account.uid(), account.gid())?;
        }

        self.greeter.configure(&self.name, &self.auth_path, &socket_path, &self.settings.theme.current_theme_path());
        self.greeter.launch()
    }

    /// Tears the display down and notifies the owner with `Stopped`.
    ///
    /// Does nothing when the display is not started.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }

        info!("Stopping display {}", self.name);
        self.greeter.stop();
        self.socket.stop();
        self.server.stop();
        self.discard_credentials();

        self.pending_login = None;
        self.pass_phrase = None;
        self.autologin = false;
        self.started = false;
        self.notifications.push(DisplayNotification::Stopped);
    }

    /// Handles the exit of an X server that was not asked to stop.
    pub fn on_server_ended(&mut self, pid: u32) {
        if self.server.pid() != Some(pid) {
            debug!("Ignoring exit of stale X server [pid={}] on display {}", pid, self.name);
            return;
        }

        warn!("X server [pid={}] on display {} ended", pid, self.name);
        if self.started {
            self.stop();
            return;
        }

        // The server died before it became ready
        self.server.stop();
        self.discard_credentials();
        self.notifications.push(DisplayNotification::Stopped);
    }

    /// Dispatches an event routed to this display by its owner.
    pub fn handle_event(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::ServerReady => self.on_server_ready(),
            DisplayEvent::ServerEnded { pid } => self.on_server_ended(pid),
            DisplayEvent::Login(request) => self.on_login(request),
            DisplayEvent::Helper { pid, event } => self.on_helper_event(pid, event),
        }
    }

    fn discard_credentials(&mut self) {
        if let Err(error) = remove(&self.auth_path) {
            warn!("{}", error);
        }
        self.cookie = None;
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        // A display dropped before readiness still holds its authority file
        if self.cookie.is_some() {
            self.discard_credentials();
        }
    }
}

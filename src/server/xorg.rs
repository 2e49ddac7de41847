use std::env;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{signal, SigHandler, Signal};
use x11rb::connect;

use crate::common::{EventBus, ProcessHandle, Result, DisplayError, XDisplaySettings};
use crate::event::DaemonEvent;
use super::DisplayServer;

/// `DisplayServer` spawning an X server process.
///
/// The server is started with SIGUSR1 ignored, which makes it send SIGUSR1 to the daemon once it
/// accepts connections. Its exit is reported on the event bus as `ServerEnded`, unless the exit
/// was requested through `stop`.
pub struct XorgServer {
    display_id: u32,
    terminal_id: u32,
    settings: XDisplaySettings,
    context: zmq::Context,
    display: String,
    auth_path: PathBuf,
    process: Option<ProcessHandle>,
    stopping: Arc<AtomicBool>,
}

impl XorgServer {
    pub fn new(display_id: u32, terminal_id: u32, settings: &XDisplaySettings, context: zmq::Context) -> Self {
        Self {
            display_id,
            terminal_id,
            settings: settings.clone(),
            context,
            display: format!(":{}", display_id),
            auth_path: PathBuf::new(),
            process: None,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    fn server_arguments(&self) -> Vec<String> {
        let mut arguments: Vec<String> = self.settings.server_arguments
            .split_whitespace()
            .map(String::from)
            .collect();
        arguments.push(self.display.clone());
        arguments.push("-auth".to_string());
        arguments.push(self.auth_path.to_string_lossy().into_owned());
        if self.terminal_id > 0 {
            arguments.push(format!("vt{}", self.terminal_id));
        }
        arguments
    }

    /// Checks that an X client can connect to the display with the installed cookie.
    fn is_xorg_ready(&self) -> bool {
        // Save current env to restore later
        let old_xauth = env::var("XAUTHORITY").ok();
        env::set_var("XAUTHORITY", &self.auth_path);

        let result = connect(Some(&self.display)).is_ok();

        match old_xauth {
            Some(value) => env::set_var("XAUTHORITY", value),
            None => env::remove_var("XAUTHORITY"),
        }

        result
    }

    fn run_display_command(&self, display_command: &str) -> Result<()> {
        debug!("Running display setup command on {}", self.display);
        let status = Command::new("/bin/sh")
            .arg("-c")
            .arg(display_command)
            .env("DISPLAY", &self.display)
            .env("XAUTHORITY", &self.auth_path)
            .stdin(Stdio::null())
            .status()?;

        if !status.success() {
            return Err(DisplayError::ProcessError(format!("Display setup command exited with {}", status)));
        }
        Ok(())
    }
}

impl DisplayServer for XorgServer {
    fn configure(&mut self, display_name: &str, auth_path: &Path) {
        self.display = display_name.to_string();
        self.auth_path = auth_path.to_path_buf();
    }

    fn launch(&mut self) -> Result<()> {
        if let Some(process) = &self.process {
            if process.is_running() {
                debug!("X server for display {} already running [pid={}]", self.display, process.pid());
                return Ok(());
            }
        }

        let mut command = Command::new(&self.settings.server_path);
        command
            .args(self.server_arguments())
            .stdin(Stdio::null());

        unsafe {
            // An X server inheriting an ignored SIGUSR1 notifies its parent when it is ready
            command.pre_exec(|| {
                signal(Signal::SIGUSR1, SigHandler::SigIgn)
                    .map(|_| ())
                    .map_err(io::Error::from)
            });
        }

        info!("Launching X server on display {}", self.display);
        debug!("Spawning command: {}", format!("{:?}", command).replace('\"', ""));
        let process = ProcessHandle::new(&mut command)?;

        let stopping = Arc::new(AtomicBool::new(false));
        let publisher = EventBus::create_event_publisher(&self.context)?;
        let display = self.display_id;
        let pid = process.pid();
        let watched_stopping = stopping.clone();
        process.watch(&format!("xorg-{}", display), move |status| {
            if watched_stopping.load(Ordering::SeqCst) {
                return;
            }
            warn!("X server [pid={}] on display :{} ended with {:?}", pid, display, status);
            if let Err(error) = publisher.publish(&DaemonEvent::ServerEnded { display, pid }) {
                error!("Failed to publish X server exit: {}", error);
            }
        })?;

        self.stopping = stopping;
        self.process = Some(process);
        Ok(())
    }

    fn prepare_display(&mut self) -> Result<()> {
        if !self.is_xorg_ready() {
            return Err(DisplayError::ProcessError(format!("Cannot connect to X server on display {}", self.display)));
        }

        match &self.settings.display_command {
            Some(display_command) if !display_command.is_empty() => self.run_display_command(display_command),
            _ => Ok(()),
        }
    }

    fn stop(&mut self) {
        if let Some(process) = self.process.take() {
            self.stopping.store(true, Ordering::SeqCst);
            debug!("Stopping X server on display {} [pid={}]", self.display, process.pid());
            process.terminate();
        }
    }

    fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|process| process.pid())
    }
}

impl Drop for XorgServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::settings::tests::test_settings;

    #[test]
    fn arguments_include_display_authority_and_terminal() {
        let settings = test_settings("/run/vigil", "/usr/share/xsessions");
        let mut server = XorgServer::new(1, 7, &settings.x_display, zmq::Context::new());
        server.configure(":1", Path::new("/run/vigil/:1"));

        assert_eq!(server.server_arguments(), vec!["-nolisten", "tcp", ":1", "-auth", "/run/vigil/:1", "vt7"]);
    }

    #[test]
    fn unrequested_exit_is_published_and_stop_is_silent() {
        let context = zmq::Context::new();
        let bus = EventBus::new(&context).unwrap();
        let mut settings = test_settings("/run/vigil", "/usr/share/xsessions").x_display;
        settings.server_path = "true".to_string();
        settings.server_arguments = String::new();

        let mut server = XorgServer::new(2, 0, &settings, context.clone());
        server.configure(":2", Path::new("/tmp/:2"));
        server.launch().unwrap();
        let pid = server.pid().unwrap();
        assert_eq!(bus.next().unwrap(), DaemonEvent::ServerEnded { display: 2, pid });

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("X");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::os::unix::fs::PermissionsExt::from_mode(0o755)).unwrap();
        settings.server_path = script.to_str().unwrap().to_string();
        let mut server = XorgServer::new(2, 0, &settings, context.clone());
        server.configure(":2", Path::new("/tmp/:2"));
        server.launch().unwrap();
        server.stop();
        assert!(server.pid().is_none());

        let publisher = EventBus::create_event_publisher(&context).unwrap();
        publisher.publish(&DaemonEvent::Shutdown).unwrap();
        assert_eq!(bus.next().unwrap(), DaemonEvent::Shutdown);
    }
}

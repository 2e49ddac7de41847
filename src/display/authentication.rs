use std::path::Path;

use zeroize::Zeroizing;

use crate::common::{DisplayError, Result};
use crate::fs::chown;
use crate::helper::{ErrorKind, HelperConfig, HelperEvent, HelperExitStatus, Prompt};
use crate::session::{SessionDescriptor, SessionPlacement, session_environment};
use super::Display;

impl Display {
    /// Starts an authentication attempt for `user` with the helper.
    ///
    /// The session selector is resolved first: a selector without a command fails the attempt
    /// before any helper is launched.
    pub(super) fn start_auth(&mut self, user: &str, password: &str, selector: &str) -> Result<()> {
        let descriptor = SessionDescriptor::resolve(Path::new(&self.settings.x_display.session_dir), selector);
        if !descriptor.is_runnable() {
            error!("Failed to find command for session {}", selector);
            self.fail_pending_login();
            return Err(DisplayError::SessionError(format!("No command found for session {}", selector)));
        }

        self.session_selector = Some(selector.to_string());
        self.pass_phrase = Some(Zeroizing::new(password.to_string()));

        let placement = SessionPlacement {
            display_name: &self.name,
            terminal_id: self.terminal_id,
            seat: &self.settings.seat,
            default_path: &self.settings.users.default_path,
        };
        let environment = session_environment(&placement, &descriptor, self.paths.as_ref());

        self.helper.configure(HelperConfig {
            verbose: true,
            autologin: self.autologin,
            user: user.to_string(),
            command: descriptor.exec_command,
            environment,
        });

        if let Err(error) = self.helper.launch() {
            error!("Failed to launch authentication helper for {}: {}", user, error);
            self.fail_pending_login();
            return Err(error);
        }

        Ok(())
    }

    /// Handles a message or the exit of the helper running as `pid`.
    ///
    /// Only the last launched helper is listened to. A helper terminated by a relaunch, or one
    /// belonging to a display that was replaced, can still report on the bus.
    pub(super) fn on_helper_event(&mut self, pid: u32, event: HelperEvent) {
        if self.helper.pid() != Some(pid) {
            debug!("Ignoring {:?} from stale authentication helper [pid={}] on display {}", event, pid, self.name);
            return;
        }

        match event {
            HelperEvent::RequestChanged { prompts } => self.on_request_changed(&prompts),
            HelperEvent::Authenticated { user, success } => self.on_authenticated(&user, success),
            HelperEvent::SessionStarted { success } => debug!("Session started on display {} [success={}]", self.name, success),
            HelperEvent::Info { message, .. } => warn!("Authentication information: {}", message),
            HelperEvent::Error { message, kind } => self.on_authentication_error(&message, kind),
            HelperEvent::Finished { status } => self.on_helper_finished(status),
        }
    }

    /// Answers the helper's prompts with the user and pass phrase of the current attempt.
    fn on_request_changed(&mut self, prompts: &[Prompt]) {
        let user = self.helper.user().to_string();
        let result = {
            let pass_phrase = self.pass_phrase.as_ref().map(|pass_phrase| pass_phrase.as_str()).unwrap_or("");
            match prompts.len() {
                1 => Some(self.helper.respond(&[pass_phrase])),
                2 => Some(self.helper.respond(&[user.as_str(), pass_phrase])),
                _ => None,
            }
        };

        match result {
            Some(Ok(())) => {},
            Some(Err(error)) => {
                error!("Failed to answer authentication helper: {}", error);
                self.helper.cancel();
                self.fail_pending_login();
            },
            None => {
                error!("Cannot answer {} prompts from the authentication helper", prompts.len());
                self.helper.cancel();
                self.fail_pending_login();
            },
        }
    }

    fn on_authenticated(&mut self, user: &str, success: bool) {
        if success {
            info!("User {} authenticated on display {}", user, self.name);
            self.install_user_cookie(user);

            if let Some(selector) = &self.session_selector {
                let mut state = self.state.borrow_mut();
                state.set_last(self.helper.user(), selector);
                if let Err(error) = state.save() {
                    warn!("Failed to save last session: {}", error);
                }
            }

            if let Some(connection) = self.pending_login.take() {
                self.socket.login_succeeded(&connection);
            }
        } else {
            info!("Authentication failure for {} on display {}", user, self.name);
            if let Some(connection) = self.pending_login.take() {
                self.socket.login_failed(&connection);
            }
        }

        self.pass_phrase = None;
    }

    fn on_authentication_error(&mut self, message: &str, kind: ErrorKind) {
        warn!("Authentication error: {}", message);

        if kind == ErrorKind::Authentication {
            if let Some(connection) = self.pending_login.take() {
                self.socket.login_failed(&connection);
            }
        }
    }

    fn on_helper_finished(&mut self, status: HelperExitStatus) {
        debug!("Authentication helper on display {} finished with {:?}", self.name, status);
        self.fail_pending_login();

        // An authentication error keeps the greeter up for another attempt. A rejected autologin
        // has no greeter to go back to, so the display restarts with one.
        if self.autologin || status != HelperExitStatus::AuthError {
            self.stop();
        }
    }

    /// Merges the display cookie into the user's own authority file.
    fn install_user_cookie(&self, user: &str) {
        let cookie = match &self.cookie {
            Some(cookie) => cookie,
            None => return,
        };
        let account = match self.users.lookup(user) {
            Some(account) => account,
            None => {
                warn!("Failed to find user {}, display cookie not installed", user);
                return;
            }
        };

        let path = account.xauthority_path();
        if let Err(error) = self.authority.install(&path, &self.name, cookie) {
            warn!("Failed to add display cookie to {}: {}", path.display(), error);
        }
        if let Err(error) = chown(&path, account.uid(), account.gid()) {
            warn!("{}", error);
        }
    }

    /// Ends the attempt of the waiting greeter, if any, with a failure.
    fn fail_pending_login(&mut self) {
        if let Some(connection) = self.pending_login.take() {
            self.socket.login_failed(&connection);
        }
        self.pass_phrase = None;
    }
}

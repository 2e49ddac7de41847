use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;

use nix::unistd::{Gid, Uid, setgroups, setgid, setuid};

use crate::common::{ProcessHandle, Result};
use crate::users::UserDatabase;
use super::Greeter;

/// `Greeter` running the greeter binary as the service account.
pub struct GreeterProcess {
    greeter_path: String,
    service_account: String,
    default_path: String,
    users: Rc<dyn UserDatabase>,
    display: String,
    auth_path: PathBuf,
    socket: PathBuf,
    theme: String,
    process: Option<ProcessHandle>,
}

impl GreeterProcess {
    pub fn new(greeter_path: &str, service_account: &str, default_path: &str, users: Rc<dyn UserDatabase>) -> Self {
        Self {
            greeter_path: greeter_path.to_string(),
            service_account: service_account.to_string(),
            default_path: default_path.to_string(),
            users,
            display: String::new(),
            auth_path: PathBuf::new(),
            socket: PathBuf::new(),
            theme: String::new(),
            process: None,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.greeter_path);
        command
            .arg("--socket")
            .arg(&self.socket)
            .arg("--theme")
            .arg(&self.theme)
            .env_clear()
            .env("PATH", &self.default_path)
            .env("DISPLAY", &self.display)
            .env("XAUTHORITY", &self.auth_path)
            .stdin(Stdio::null());
        command
    }
}

impl Greeter for GreeterProcess {
    fn configure(&mut self, display_name: &str, auth_path: &Path, socket: &Path, theme: &str) {
        self.display = display_name.to_string();
        self.auth_path = auth_path.to_path_buf();
        self.socket = socket.to_path_buf();
        self.theme = theme.to_string();
    }

    fn launch(&mut self) -> Result<()> {
        let mut command = self.command();

        match self.users.lookup(&self.service_account) {
            Some(account) if nix::unistd::geteuid().is_root() => {
                command.env("HOME", account.home()).current_dir(account.home());

                let uid = Uid::from_raw(account.uid());
                let gid = Gid::from_raw(account.gid());
                unsafe {
                    // Drop privileges to the service account before running the greeter
                    command.pre_exec(move || {
                        setgroups(&[gid])?;
                        setgid(gid)?;
                        setuid(uid)?;
                        Ok(())
                    });
                }
            },
            Some(_) => debug!("Not running as root, greeter keeps the daemon's credentials"),
            None => warn!("Failed to find the {} user, greeter keeps the daemon's credentials", self.service_account),
        }

        info!("Launching greeter on display {}", self.display);
        debug!("Spawning command: {}", format!("{:?}", command).replace('\"', ""));
        self.process = Some(ProcessHandle::new(&mut command)?);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(process) = self.process.take() {
            debug!("Stopping greeter on display {} [pid={}]", self.display, process.pid());
            process.terminate();
        }
    }
}

impl Drop for GreeterProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::SystemUsers;

    #[test]
    fn greeter_gets_display_socket_and_theme() {
        let mut greeter = GreeterProcess::new("/usr/bin/vigil-greeter", "vigil", "/usr/bin:/bin", Rc::new(SystemUsers));
        greeter.configure(":0", Path::new("/run/vigil/:0"), Path::new("/run/vigil/login-0.sock"), "/usr/share/vigil/themes/maui");

        let command = greeter.command();
        let arguments: Vec<_> = command.get_args().map(|arg| arg.to_string_lossy().into_owned()).collect();
        assert_eq!(arguments, vec!["--socket", "/run/vigil/login-0.sock", "--theme", "/usr/share/vigil/themes/maui"]);

        let display = command.get_envs().find(|(key, _)| *key == "DISPLAY").and_then(|(_, value)| value);
        assert_eq!(display.unwrap(), ":0");
    }

    #[test]
    fn launch_and_stop() {
        let mut greeter = GreeterProcess::new("sleep", "no-such-user-vigil-test", "/usr/bin:/bin", Rc::new(SystemUsers));
        greeter.configure(":0", Path::new("/tmp/:0"), Path::new("/tmp/login-0.sock"), "theme");
        // sleep rejects the greeter arguments and exits; stop must still be clean
        greeter.launch().unwrap();
        greeter.stop();
        greeter.stop();
    }
}

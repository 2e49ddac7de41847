use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use zeroize::Zeroizing;

use crate::common::{Result, DisplayError, XDisplaySettings};
use crate::fs::{chmod, touch};
use super::Cookie;

/// Writes a display cookie into an X authority file.
pub trait AuthorityTool {
    /// Replaces any entry for `display` in the authority file at `path` with `cookie`.
    /// The file is created when it does not exist.
    fn install(&self, path: &Path, display: &str, cookie: &Cookie) -> Result<()>;
}

/// Commands sent to xauth for installing a cookie, in order.
pub fn authority_commands(display: &str, cookie: &Cookie) -> Zeroizing<Vec<String>> {
    Zeroizing::new(vec![
        format!("remove {}", display),
        format!("add {} . {}", display, cookie.as_str()),
        "exit".to_string(),
    ])
}

/// `AuthorityTool` driving the xauth binary through its stdin command protocol.
/// The call blocks the caller but is bounded by a timeout: xauth is killed when it exceeds it.
pub struct XauthTool {
    xauth_path: String,
    timeout: Duration,
}

impl XauthTool {
    pub fn new(xauth_path: &str, timeout: Duration) -> Self {
        Self {
            xauth_path: xauth_path.to_string(),
            timeout,
        }
    }

    pub fn from_settings(settings: &XDisplaySettings) -> Self {
        Self::new(&settings.xauth_path, Duration::from_millis(settings.xauth_timeout_ms))
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait()? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => return Err(DisplayError::AuthorityError(format!("{} exited with {}", self.xauth_path, status))),
                None if Instant::now() >= deadline => {
                    warn!("{} did not finish within {} ms, killing it", self.xauth_path, self.timeout.as_millis());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DisplayError::Timeout(format!("{} timed out", self.xauth_path)));
                },
                None => thread::sleep(Duration::from_millis(10)),
            }
        }
    }
}

impl AuthorityTool for XauthTool {
    fn install(&self, path: &Path, display: &str, cookie: &Cookie) -> Result<()> {
        debug!("Adding cookie for display {} to {}", display, path.display());

        touch(path)?;
        chmod(path, 0o600)?;

        let mut command = Command::new(&self.xauth_path);
        command
            .arg("-f")
            .arg(path)
            .arg("-q")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command.spawn()
            .map_err(|error| DisplayError::AuthorityError(format!("Failed to run {}: {}", self.xauth_path, error)))?;

        // Closing stdin at the end of this block lets xauth finish
        let written = match child.stdin.take() {
            Some(mut stdin) => authority_commands(display, cookie)
                .iter()
                .try_for_each(|line| writeln!(stdin, "{}", line)),
            None => Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "xauth stdin unavailable")),
        };

        let waited = self.wait_with_timeout(&mut child);
        written?;
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn fake_xauth(dir: &Path, body: &str) -> String {
        let path = dir.join("xauth");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn commands_are_remove_add_exit() {
        let cookie = Cookie::generate();
        let commands = authority_commands(":0", &cookie);
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0], "remove :0");
        assert_eq!(commands[1], format!("add :0 . {}", cookie.as_str()));
        assert_eq!(commands[2], "exit");
    }

    #[test]
    fn install_feeds_commands_to_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("record");
        let tool = XauthTool::new(
            &fake_xauth(dir.path(), &format!("echo \"$@\" > {0}.args\ncat > {0}", record.display())),
            Duration::from_secs(5));
        let authority = dir.path().join(":1");
        let cookie = Cookie::generate();

        tool.install(&authority, ":1", &cookie).unwrap();

        assert!(authority.exists());
        let recorded = fs::read_to_string(&record).unwrap();
        assert_eq!(recorded, format!("remove :1\nadd :1 . {}\nexit\n", cookie.as_str()));
        let args = fs::read_to_string(dir.path().join("record.args")).unwrap();
        assert_eq!(args.trim(), format!("-f {} -q", authority.display()));
    }

    #[test]
    fn install_reports_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = XauthTool::new(&fake_xauth(dir.path(), "cat > /dev/null\nexit 1"), Duration::from_secs(5));

        let result = tool.install(&dir.path().join(":0"), ":0", &Cookie::generate());
        assert!(matches!(result, Err(DisplayError::AuthorityError(_))));
    }

    #[test]
    fn install_is_bounded_by_the_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = XauthTool::new(&fake_xauth(dir.path(), "sleep 10"), Duration::from_millis(200));

        let started = Instant::now();
        let result = tool.install(&dir.path().join(":0"), ":0", &Cookie::generate());
        assert!(matches!(result, Err(DisplayError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

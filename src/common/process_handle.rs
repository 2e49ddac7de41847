use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use shared_child::SharedChild;

use crate::common::{Result, DisplayError};

const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// The `ProcessHandle` struct represents a handle to a linux process spawned by the daemon
/// (X server, greeter or authentication helper).
#[derive(Clone)]
pub struct ProcessHandle {
    process: Arc<SharedChild>,
}

impl ProcessHandle {
    /// Creates a new `ProcessHandle` by spawning a process using the provided command.
    ///
    /// # Arguments
    /// * `command` - The command to execute.
    ///
    /// # Returns
    /// A `Result` containing the `ProcessHandle` or a `DisplayError` if the process could not be spawned.
    pub fn new(command: &mut Command) -> Result<ProcessHandle> {
        let process = SharedChild::spawn(command)
            .map_err(|error| DisplayError::ProcessError(format!("Failed to spawn {:?}: {}", command.get_program(), error)))?;

        Ok(ProcessHandle {
            process: Arc::new(process),
        })
    }

    /// Asks the process to terminate with SIGTERM without blocking the caller.
    ///
    /// A reaper thread waits for the grace period, kills the process if it is still running
    /// and then reaps it.
    pub fn terminate(&self) {
        if let Ok(Some(_)) = self.process.try_wait() {
            return;
        }

        let pid = Pid::from_raw(self.process.id() as i32);
        if let Err(error) = kill(pid, Signal::SIGTERM) {
            warn!("Could not send SIGTERM to process [pid={}]: {}", pid, error);
            self.kill();
        }

        let process = self.process.clone();
        let reaper = thread::Builder::new()
            .name(format!("reaper-{}", pid))
            .spawn(move || Self::reap(&process, TERMINATE_GRACE_PERIOD));

        if let Err(error) = reaper {
            warn!("Could not spawn reaper for process [pid={}], killing it: {}", pid, error);
            self.kill();
            if let Err(error) = self.process.wait() {
                error!("Failed to wait for process [pid={}]: {}", pid, error);
            }
        }
    }

    /// Waits up to `grace_period` for the process to exit, kills it otherwise, then reaps it.
    fn reap(process: &SharedChild, grace_period: Duration) {
        let deadline = Instant::now() + grace_period;
        while let Ok(None) = process.try_wait() {
            if Instant::now() >= deadline {
                warn!("Process [pid={}] did not exit after SIGTERM, killing it", process.id());
                if let Err(error) = process.kill() {
                    error!("Could not kill process [pid={}]: {}", process.id(), error);
                }
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }

        if let Err(error) = process.wait() {
            error!("Failed to wait for process [pid={}]: {}", process.id(), error);
        }
    }

    /// Kills the process associated with this handle.
    pub fn kill(&self) {
        if let Err(error) = self.process.kill() {
            error!("Could not kill process [pid={}]: {}", self.process.id(), error);
        }
    }

    /// Returns the process ID (PID) of the process.
    pub fn pid(&self) -> u32 {
        self.process.id()
    }

    /// Returns true while the process has not exited.
    pub fn is_running(&self) -> bool {
        match self.process.try_wait() {
            Ok(status) => status.is_none(),
            Err(error) => {
                warn!("Failed to wait for process [pid={}]. Error: {}", self.process.id(), error);
                false
            }
        }
    }

    /// Takes the stdin pipe of the process, if it was spawned with one.
    pub fn take_stdin(&self) -> Option<std::process::ChildStdin> {
        self.process.take_stdin()
    }

    /// Takes the stdout pipe of the process, if it was spawned with one.
    pub fn take_stdout(&self) -> Option<std::process::ChildStdout> {
        self.process.take_stdout()
    }

    /// Blocks until the process exits.
    pub fn wait(&self) -> Result<ExitStatus> {
        Ok(self.process.wait()?)
    }

    /// Spawns a thread that waits for the process to exit and then runs `on_exit`.
    ///
    /// # Arguments
    /// * `name` - Thread name, used in logs.
    /// * `on_exit` - Callback receiving the exit status (`None` when waiting failed).
    pub fn watch<F>(&self, name: &str, on_exit: F) -> Result<thread::JoinHandle<()>>
        where F: FnOnce(Option<ExitStatus>) + Send + 'static {
        let process = self.process.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let status = match process.wait() {
                    Ok(status) => Some(status),
                    Err(error) => {
                        error!("Failed to wait for process [pid={}]: {}", process.id(), error);
                        None
                    }
                };
                on_exit(status);
            })?;

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn watch_reports_exit_status() {
        let handle = ProcessHandle::new(Command::new("sh").arg("-c").arg("exit 3")).unwrap();
        let (sender, receiver) = mpsc::channel();

        handle.watch("test-watch", move |status| {
            sender.send(status.and_then(|status| status.code())).unwrap();
        }).unwrap();

        let code = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(code, Some(3));
        assert!(!handle.is_running());
    }

    #[test]
    fn terminate_stops_a_running_process() {
        let handle = ProcessHandle::new(Command::new("sleep").arg("30")).unwrap();
        assert!(handle.is_running());

        let started = Instant::now();
        handle.terminate();
        assert!(started.elapsed() < TERMINATE_GRACE_PERIOD);

        let status = handle.wait().unwrap();
        assert!(!status.success());
        assert!(!handle.is_running());
    }

    #[test]
    fn terminate_returns_before_a_stubborn_process_exits() {
        let handle = ProcessHandle::new(Command::new("sh").arg("-c").arg("trap '' TERM; sleep 30")).unwrap();
        // Let the shell install its trap before signalling it
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        handle.terminate();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(handle.is_running());

        handle.kill();
        handle.wait().unwrap();
        assert!(!handle.is_running());
    }

    #[test]
    fn reaper_kills_a_process_ignoring_sigterm() {
        let handle = ProcessHandle::new(Command::new("sh").arg("-c").arg("trap '' TERM; sleep 30")).unwrap();
        thread::sleep(Duration::from_millis(200));
        kill(Pid::from_raw(handle.pid() as i32), Signal::SIGTERM).unwrap();

        ProcessHandle::reap(&handle.process, Duration::from_millis(200));
        assert!(!handle.is_running());
    }
}

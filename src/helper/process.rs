use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{ChildStdin, Command, Stdio};
use std::thread;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::common::{EventBus, ProcessHandle, Result, DisplayError};
use crate::event::DaemonEvent;
use super::{AuthHelper, HelperConfig, HelperEvent, HelperExitStatus};

/// Requests written to the helper's stdin, one JSON document per line.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HelperRequest<'a> {
    Start {
        verbose: bool,
        autologin: bool,
        user: &'a str,
        command: &'a str,
        environment: &'a BTreeMap<String, String>,
    },
    Respond {
        responses: &'a [&'a str],
    },
    Cancel,
}

/// `AuthHelper` running the helper binary as a child process.
///
/// The helper reports on stdout with one `HelperEvent` JSON document per line. A reader thread
/// forwards these to the event bus, then publishes `Finished` with the helper's exit status.
pub struct HelperProcess {
    display_id: u32,
    helper_path: String,
    context: zmq::Context,
    config: HelperConfig,
    process: Option<ProcessHandle>,
    stdin: Option<ChildStdin>,
}

impl HelperProcess {
    pub fn new(display_id: u32, helper_path: &str, context: zmq::Context) -> Self {
        Self {
            display_id,
            helper_path: helper_path.to_string(),
            context,
            config: HelperConfig::default(),
            process: None,
            stdin: None,
        }
    }

    fn send(&mut self, request: &HelperRequest) -> Result<()> {
        let stdin = self.stdin.as_mut()
            .ok_or_else(|| DisplayError::ProcessError("Authentication helper is not running".to_string()))?;

        let mut line = Zeroizing::new(serde_json::to_vec(request)?);
        line.push(b'\n');
        stdin.write_all(&line)?;
        stdin.flush()?;
        Ok(())
    }

    fn spawn_reader(&self, process: ProcessHandle) -> Result<()> {
        let stdout = process.take_stdout()
            .ok_or_else(|| DisplayError::ProcessError("Authentication helper has no stdout".to_string()))?;
        let publisher = EventBus::create_event_publisher(&self.context)?;
        let display = self.display_id;
        let pid = process.pid();

        thread::Builder::new()
            .name(format!("helper-{}", display))
            .spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(|line| line.ok()) {
                    let event = match serde_json::from_str::<HelperEvent>(&line) {
                        Ok(HelperEvent::Finished { .. }) => {
                            warn!("Ignoring finished message written by the authentication helper");
                            continue;
                        },
                        Ok(event) => event,
                        Err(error) => {
                            warn!("Invalid message from authentication helper: {}", error);
                            continue;
                        },
                    };
                    if let Err(error) = publisher.publish(&DaemonEvent::Helper { display, pid, event }) {
                        error!("Failed to publish helper event: {}", error);
                    }
                }

                let status = match process.wait() {
                    Ok(status) => HelperExitStatus::from(status),
                    Err(error) => {
                        error!("Failed to wait for authentication helper: {}", error);
                        HelperExitStatus::OtherError
                    }
                };
                debug!("Authentication helper [pid={}] finished with {:?}", pid, status);

                let event = HelperEvent::Finished { status };
                if let Err(error) = publisher.publish(&DaemonEvent::Helper { display, pid, event }) {
                    error!("Failed to publish helper exit: {}", error);
                }
            })?;

        Ok(())
    }
}

impl AuthHelper for HelperProcess {
    fn configure(&mut self, config: HelperConfig) {
        self.config = config;
    }

    fn launch(&mut self) -> Result<()> {
        if let Some(process) = self.process.take() {
            if process.is_running() {
                warn!("Authentication helper [pid={}] still running, terminating it", process.pid());
                process.terminate();
            }
        }

        let mut command = Command::new(&self.helper_path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        debug!("Spawning authentication helper {} for user {}", self.helper_path, self.config.user);
        let process = ProcessHandle::new(&mut command)?;
        self.stdin = process.take_stdin();
        self.spawn_reader(process.clone())?;
        self.process = Some(process);

        let config = self.config.clone();
        let started = self.send(&HelperRequest::Start {
            verbose: config.verbose,
            autologin: config.autologin,
            user: &config.user,
            command: &config.command,
            environment: &config.environment,
        });

        if started.is_err() {
            self.stdin.take();
            if let Some(process) = self.process.take() {
                process.terminate();
            }
        }
        started
    }

    fn respond(&mut self, responses: &[&str]) -> Result<()> {
        self.send(&HelperRequest::Respond { responses })
    }

    fn cancel(&mut self) {
        if let Err(error) = self.send(&HelperRequest::Cancel) {
            warn!("Could not cancel authentication helper request: {}", error);
        }
    }

    fn user(&self) -> &str {
        &self.config.user
    }

    fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|process| process.pid())
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        self.stdin.take();
        if let Some(process) = self.process.take() {
            if process.is_running() {
                process.terminate();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn forwards_helper_messages_and_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper");
        let record = dir.path().join("requests");
        fs::write(&script, format!(r#"#!/bin/sh
read start
echo "$start" > {0}
echo '{{"type":"request_changed","prompts":[{{"kind":"password","message":"Password:","hidden":true}}]}}'
read answer
echo "$answer" >> {0}
echo '{{"type":"authenticated","user":"alice","success":false}}'
exit 1
"#, record.display())).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let context = zmq::Context::new();
        let bus = EventBus::new(&context).unwrap();
        let mut helper = HelperProcess::new(3, script.to_str().unwrap(), context.clone());
        helper.configure(HelperConfig {
            verbose: true,
            autologin: false,
            user: "alice".to_string(),
            command: "xterm".to_string(),
            environment: BTreeMap::from([("DISPLAY".to_string(), ":3".to_string())]),
        });
        helper.launch().unwrap();
        assert_eq!(helper.user(), "alice");
        let pid = helper.pid().unwrap();

        match bus.next().unwrap() {
            DaemonEvent::Helper { display: 3, pid: sender, event: HelperEvent::RequestChanged { prompts } } => {
                assert_eq!(sender, pid);
                assert_eq!(prompts.len(), 1);
            },
            other => panic!("unexpected event {:?}", other),
        }
        helper.respond(&["secret"]).unwrap();

        assert_eq!(bus.next().unwrap(), DaemonEvent::Helper {
            display: 3,
            pid,
            event: HelperEvent::Authenticated { user: "alice".to_string(), success: false },
        });
        assert_eq!(bus.next().unwrap(), DaemonEvent::Helper {
            display: 3,
            pid,
            event: HelperEvent::Finished { status: HelperExitStatus::AuthError },
        });

        let requests = fs::read_to_string(&record).unwrap();
        let mut lines = requests.lines();
        let start: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(start["type"], "start");
        assert_eq!(start["user"], "alice");
        assert_eq!(start["environment"]["DISPLAY"], ":3");
        let answer: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(answer["responses"][0], "secret");
    }

    #[test]
    fn relaunch_tags_events_with_the_new_helper() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper");
        fs::write(&script, "#!/bin/sh\nread start\nexec sleep 30\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let context = zmq::Context::new();
        let bus = EventBus::new(&context).unwrap();
        let mut helper = HelperProcess::new(4, script.to_str().unwrap(), context.clone());
        helper.launch().unwrap();
        let first = helper.pid().unwrap();

        helper.launch().unwrap();
        let second = helper.pid().unwrap();
        assert_ne!(first, second);

        // The terminated helper still reports its exit, under its own pid
        assert_eq!(bus.next().unwrap(), DaemonEvent::Helper {
            display: 4,
            pid: first,
            event: HelperEvent::Finished { status: HelperExitStatus::OtherError },
        });
    }
}

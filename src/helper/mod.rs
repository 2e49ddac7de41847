pub use process::HelperProcess;

mod process;

use std::collections::BTreeMap;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};

use crate::common::Result;

/// Everything the helper needs to authenticate a user and then start their session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HelperConfig {
    pub verbose: bool,
    pub autologin: bool,
    pub user: String,
    pub command: String,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Login,
    Password,
    ChangePassword,
    Unknown,
}

/// One question asked by the authentication stack (user name, password, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub kind: PromptKind,
    pub message: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoKind {
    PasswordChange,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Session,
    Internal,
    Unknown,
}

/// How the helper process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelperExitStatus {
    /// The user session ran and ended normally.
    Success,
    /// Authentication failed; the greeter stays up for another attempt.
    AuthError,
    SessionError,
    OtherError,
}

impl HelperExitStatus {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => HelperExitStatus::Success,
            Some(1) => HelperExitStatus::AuthError,
            Some(2) => HelperExitStatus::SessionError,
            _ => HelperExitStatus::OtherError,
        }
    }
}

impl From<ExitStatus> for HelperExitStatus {
    fn from(status: ExitStatus) -> Self {
        HelperExitStatus::from_code(status.code())
    }
}

/// Notifications coming from the helper, in the order the helper produces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HelperEvent {
    /// The helper has a new set of prompts that all need an answer.
    RequestChanged { prompts: Vec<Prompt> },
    Authenticated { user: String, success: bool },
    SessionStarted { success: bool },
    Info { message: String, kind: InfoKind },
    Error { message: String, kind: ErrorKind },
    Finished { status: HelperExitStatus },
}

/// The privileged authentication helper, as seen from a display.
pub trait AuthHelper {
    fn configure(&mut self, config: HelperConfig);
    /// Starts the helper with the last configuration.
    fn launch(&mut self) -> Result<()>;
    /// Answers the current request, one response per prompt, in prompt order.
    fn respond(&mut self, responses: &[&str]) -> Result<()>;
    /// Abandons the current request. The helper then finishes with an authentication error.
    fn cancel(&mut self);
    /// The user the helper was configured for.
    fn user(&self) -> &str;
    /// Process id of the last launched helper. Events from any other helper are stale.
    fn pid(&self) -> Option<u32>;
}

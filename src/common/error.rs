use std::error::Error;
use std::result;
use std::fmt;

pub type Result<T> = result::Result<T, DisplayError>;

#[derive(Debug)]
pub enum DisplayError {
    SystemError(String),
    SessionError(String),
    AuthorityError(String),
    ProcessError(String),
    TransportError(String),
    Timeout(String),
    SerializationError(String),
    IoError(std::io::Error),
    ConfigError(config::ConfigError),
}

impl Error for DisplayError {}

impl fmt::Display for DisplayError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DisplayError::SystemError(message) => write!(formatter, "SystemError: {}", message),
            DisplayError::SessionError(message) => write!(formatter, "SessionError: {}", message),
            DisplayError::AuthorityError(message) => write!(formatter, "AuthorityError: {}", message),
            DisplayError::ProcessError(message) => write!(formatter, "ProcessError: {}", message),
            DisplayError::TransportError(message) => write!(formatter, "TransportError: {}", message),
            DisplayError::Timeout(message) => write!(formatter, "Timeout: {}", message),
            DisplayError::SerializationError(message) => write!(formatter, "SerializationError: {}", message),
            DisplayError::IoError(err) => write!(formatter, "IoError: {}", err),
            DisplayError::ConfigError(err) => write!(formatter, "ConfigError: {}", err),
        }
    }
}

impl From<zmq::Error> for DisplayError {
    fn from(err: zmq::Error) -> Self {
        DisplayError::TransportError(err.to_string())
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::IoError(err)
    }
}

impl From<config::ConfigError> for DisplayError {
    fn from(err: config::ConfigError) -> Self {
        DisplayError::ConfigError(err)
    }
}

impl From<serde_json::Error> for DisplayError {
    fn from(err: serde_json::Error) -> Self {
        DisplayError::SerializationError(err.to_string())
    }
}

impl From<nix::Error> for DisplayError {
    fn from(err: nix::Error) -> Self {
        DisplayError::SystemError(err.to_string())
    }
}

impl From<hex::FromHexError> for DisplayError {
    fn from(err: hex::FromHexError) -> Self {
        DisplayError::SerializationError(err.to_string())
    }
}

/// library errors
///
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// the lock cache was configured with a zero capacity
    #[error("invalid lock cache capacity {0}; max_size must be positive")]
    InvalidCapacity(usize),

    /// the configuration could not be parsed
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// shutdown waited the full grace period and tasks were still running
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded { grace: Duration, stuck: Vec<String> },
}

impl Error {
    /// a short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::InvalidCapacity(_) => "invalid_capacity",
            Error::Config(_) => "config_parse",
            Error::GraceExceeded { .. } => "grace_exceeded",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

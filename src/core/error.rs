//! Error types for the widget pipeline.

use thiserror::Error;

/// Errors raised while parsing command-line flags.
///
/// `HelpRequested` is not a failure; it tells the caller that usage was
/// printed and the program should exit successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    /// A flag was supplied that was never defined
    #[error("flag provided but not defined: -{0}")]
    NotDefined(String),

    /// The argument looked like a flag but could not be read as one
    #[error("bad flag syntax: {0}")]
    BadSyntax(String),

    /// A flag was given without its value
    #[error("flag needs an argument: -{0}")]
    NeedsArgument(String),

    /// The flag's value was rejected by its conversion
    #[error("invalid value {value:?} for flag -{name}: {reason}")]
    InvalidValue {
        value: String,
        name: String,
        reason: String,
    },

    /// `-h` or `-help` was passed and neither is defined
    #[error("flag: help requested")]
    HelpRequested,

    /// Two flags were registered under the same name
    #[error("flag redefined: {0}")]
    Redefined(String),
}

/// The main error type for the widget pipeline.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Command-line parsing failed
    #[error(transparent)]
    Flag(#[from] FlagError),

    /// The configuration cannot drive a run
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A producer tried to push onto a queue nobody reads any more
    #[error("widget queue was closed")]
    QueueClosed,

    /// Every consumer went away before the expected total was reported
    #[error("report channel closed with {remaining} reports outstanding")]
    ReportChannelClosed { remaining: usize },

    /// A spawned worker panicked or was cancelled
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Error::InvalidConfig(message.into())
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Process exit status for a program ending with this error: 0 when
    /// help was requested, 2 for bad input, 1 for a failed run.
    pub fn exit_status(&self) -> u8 {
        match self {
            Error::Flag(FlagError::HelpRequested) => 0,
            Error::Flag(_) | Error::InvalidConfig(_) => 2,
            _ => 1,
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::QueueClosed
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::TaskFailed(err.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status() {
        assert_eq!(Error::from(FlagError::HelpRequested).exit_status(), 0);
        assert_eq!(
            Error::from(FlagError::NeedsArgument("n".to_string())).exit_status(),
            2
        );
        assert_eq!(Error::invalid_config("no consumers").exit_status(), 2);
        assert_eq!(Error::QueueClosed.exit_status(), 1);
        assert_eq!(Error::ReportChannelClosed { remaining: 3 }.exit_status(), 1);
        assert_eq!(Error::custom("sink rejected").exit_status(), 1);
    }
}

//! Error types for the Tello link

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TelloError>;

/// Why a single command did not succeed.
///
/// This is carried as data in a [`Response`](crate::Response), it never aborts the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// an argument was out of range, nothing was sent
    #[error("argument out of range")]
    InvalidArgument,

    /// every attempt timed out or was rejected
    #[error("no accepted reply after all attempts")]
    Timeout,

    #[error("unexpected reply from drone")]
    UnexpectedReply,

    /// the control socket failed or was closed while waiting
    #[error("transport failure")]
    Io,

    #[error("link is not connected")]
    NotConnected,
}

#[derive(Error, Debug)]
pub enum TelloError {
    #[error("handshake failed: {0}")]
    HandshakeFailed(FailureKind),

    #[error("session was ended by an emergency stop, create a new controller")]
    Faulted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

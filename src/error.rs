use std::time::Duration;

use thiserror::Error;

use crate::ipc::RequestId;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the host
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The host answered the request with an `err` body
    #[error("{0}")]
    Host(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("message of {len} bytes exceeds limit of {max} bytes")]
    MessageTooLarge { len: usize, max: usize },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("bridge has shut down")]
    Shutdown,

    #[error("request {id} evicted after waiting {age:?} for a response")]
    Evicted { id: RequestId, age: Duration },

    #[error("no external IPC handler installed")]
    NoHandler,

    #[error("handler error: {0}")]
    Handler(String),

    #[error("stream ended with error: {0}")]
    StreamEnded(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

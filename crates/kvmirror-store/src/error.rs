//! Error types for store operations.

use thiserror::Error;

/// Errors raised by a [`KvClient`](crate::KvClient) or while configuring one.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error on the store connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the connection mid-exchange.
    #[error("connection closed by store")]
    ConnectionClosed,

    /// Connecting did not finish within the configured timeout.
    #[error("timed out connecting to {address} after {timeout_ms} ms")]
    ConnectTimeout { address: String, timeout_ms: u64 },

    /// The reply could not be parsed as a protocol frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The store answered with an error reply.
    #[error("store error: {0}")]
    Server(String),

    /// The key holds a value of a different kind than the command expects.
    #[error("wrong kind of value at key {key}")]
    WrongType { key: String },

    /// The reply was well-formed but not what the command returns.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },

    /// A lock guarding in-process state was poisoned by a panic.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

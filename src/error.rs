//! Error types shared by the storage and command layers.
//!
//! `Display` output of every variant is the exact error line a Redis client
//! expects, so the dispatcher can forward it to the wire unchanged.

use thiserror::Error;

/// Errors raised by the keyspace engine itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyspaceError {
    /// The requested database index does not resolve to a keyspace
    #[error("ERR DB index is out of range")]
    UnknownDatabase(usize),

    /// RENAME was asked to move a key that has no live record
    #[error("ERR no such key")]
    KeyNotFound,

    /// The KEYS pattern could not be compiled
    #[error("ERR invalid pattern: {0}")]
    InvalidPattern(String),

    /// A string operation hit a record holding another payload type
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}

/// Errors returned to a client for a single command invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Keyspace(#[from] KeyspaceError),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(&'static str),

    #[error("ERR NX and XX, GT or LT options at the same time are not compatible")]
    IncompatibleExpireFlags,

    #[error("ERR GT and LT options at the same time are not compatible")]
    IncompatibleGtLt,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR empty command")]
    EmptyCommand,
}

/// Convenience alias for command handler results.
pub type CommandResult<T> = Result<T, CommandError>;

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("interface {name} not found")]
    InterfaceNotFound { name: String },

    #[error("malformed address: {0}")]
    MalformedAddress(String),

    #[error("malformed port: {0}")]
    MalformedPort(String),

    #[error("malformed rule: {0}")]
    MalformedRule(String),

    #[error("malformed rule index: {0}")]
    MalformedIndex(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("rule {index} not found ({len} rules)")]
    IndexNotFound { index: usize, len: usize },

    #[error("command of {len} bytes exceeds limit of {max}")]
    CommandTooLong { len: usize, max: usize },

    #[error("rule store is full ({max} rules)")]
    StoreFull { max: usize },

    #[error("cannot allocate memory for new rule")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, Error>;

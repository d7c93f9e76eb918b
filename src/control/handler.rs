//! Control protocol
//!
//! Command lines:
//!
//! ```text
//! add <protocol> <direction> <action> <src_ip> <src_mask> <src_port> <dst_ip> <dst_mask> <dst_port>
//! del <1-based index>
//! ```
//!
//! Reading a session returns the full rule listing once; every later read
//! on the same session returns nothing.

use crate::dataplane::{Engine, Rule};
use crate::{Error, Result};
use tracing::warn;

/// Longest accepted command line in bytes, not counting the line break
pub const MAX_COMMAND_LEN: usize = 255;

/// A decoded command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(Rule),
    Delete(usize),
}

impl Command {
    /// Decode one command line. A trailing `\n` or `\r\n` is ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let trimmed = line.trim_start();
        let (op, rest) = match trimmed.find(char::is_whitespace) {
            Some(pos) => (&trimmed[..pos], &trimmed[pos..]),
            None => (trimmed, ""),
        };

        match op {
            "add" => Rule::deserialize(rest).map(Command::Add),
            "del" => {
                let index = rest.trim();
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::MalformedIndex(index.to_string()));
                }
                index
                    .parse()
                    .map(Command::Delete)
                    .map_err(|_| Error::MalformedIndex(index.to_string()))
            }
            _ => Err(Error::UnknownOperation(line.to_string())),
        }
    }
}

/// Result of an applied command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Rule appended at this 1-based index
    Added(usize),
    /// This rule was removed
    Deleted(Rule),
}

impl Engine {
    /// Decode and apply one command line. The store is left untouched on
    /// any error.
    pub fn apply_command(&self, line: &str) -> Result<Applied> {
        match Command::parse(line)? {
            Command::Add(rule) => self.add_rule(rule).map(Applied::Added),
            Command::Delete(index) => self.delete_rule(index).map(Applied::Deleted),
        }
    }
}

/// State for one control channel session.
///
/// Opening a session corresponds to opening the control file: it re-arms
/// the listing so the first read returns every rule.
#[derive(Debug)]
pub struct ControlSession<'a> {
    engine: &'a Engine,
    max_command_len: usize,
    reading_done: bool,
}

impl<'a> ControlSession<'a> {
    pub fn open(engine: &'a Engine) -> Self {
        Self::with_limit(engine, MAX_COMMAND_LEN)
    }

    pub fn with_limit(engine: &'a Engine, max_command_len: usize) -> Self {
        engine.metrics().control_sessions.inc();
        Self {
            engine,
            max_command_len,
            reading_done: false,
        }
    }

    /// Apply one command line written to the channel.
    ///
    /// Oversized lines are rejected rather than truncated. Failures are
    /// counted and returned; the engine keeps running.
    pub fn write(&mut self, line: &str) -> Result<Applied> {
        let command = line.trim_end_matches(['\n', '\r']);
        let result = if command.len() > self.max_command_len {
            Err(Error::CommandTooLong {
                len: command.len(),
                max: self.max_command_len,
            })
        } else {
            self.engine.apply_command(command)
        };

        result.map_err(|e| self.reject(e))
    }

    /// Count and log a command refused before or during decoding
    pub fn reject(&self, err: Error) -> Error {
        self.engine.metrics().commands_rejected.inc();
        warn!("control command rejected: {}", err);
        err
    }

    /// Full listing on the first call, empty on every call after that
    pub fn read(&mut self) -> String {
        if self.reading_done {
            return String::new();
        }
        self.reading_done = true;
        self.engine.listing()
    }
}

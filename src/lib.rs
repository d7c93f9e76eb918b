//! fwall - rule-based packet filter
//!
//! An ordered list of rules decides, packet by packet, whether traffic is
//! accepted or dropped. Rules are added, deleted and listed through a
//! line-oriented control channel while packets are being decided.

pub mod capture;
pub mod config;
pub mod control;
pub mod dataplane;
pub mod error;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};

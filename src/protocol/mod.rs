//! Wire and text formats
//!
//! Rule text codec plus the minimal header readers the packet tap needs.

pub mod codec;
pub mod ethernet;
pub mod ipv4;

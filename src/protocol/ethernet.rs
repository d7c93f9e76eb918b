//! Ethernet frame parsing

use crate::{Error, Result};

/// Minimum Ethernet frame size (without FCS)
pub const MIN_FRAME_SIZE: usize = 14;

/// EtherType values the tap cares about
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const VLAN: u16 = 0x8100;
}

/// Parsed Ethernet frame (zero-copy reference)
#[derive(Debug)]
pub struct Frame<'a> {
    buffer: &'a [u8],
    ethertype: u16,
    payload_offset: usize,
}

impl<'a> Frame<'a> {
    /// Parse an Ethernet frame, skipping a single 802.1Q tag if present
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_FRAME_SIZE {
            return Err(Error::Parse("frame too short".into()));
        }

        let outer = u16::from_be_bytes([buffer[12], buffer[13]]);
        let (ethertype, payload_offset) = if outer == ethertype::VLAN {
            if buffer.len() < 18 {
                return Err(Error::Parse("VLAN frame too short".into()));
            }
            (u16::from_be_bytes([buffer[16], buffer[17]]), 18)
        } else {
            (outer, 14)
        };

        Ok(Self {
            buffer,
            ethertype,
            payload_offset,
        })
    }

    pub fn ethertype(&self) -> u16 {
        self.ethertype
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.payload_offset..]
    }
}

//! IPv4 header - RFC 791

use crate::{Error, Result};

/// Minimum IPv4 header size (without options)
pub const MIN_HEADER_SIZE: usize = 20;

/// IPv4 protocol numbers
pub mod protocol {
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// Parsed IPv4 header (zero-copy reference)
#[derive(Debug)]
pub struct Ipv4Header<'a> {
    buffer: &'a [u8],
    header_len: usize,
}

impl<'a> Ipv4Header<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_HEADER_SIZE {
            return Err(Error::Parse("IPv4 header too short".into()));
        }

        let version = buffer[0] >> 4;
        if version != 4 {
            return Err(Error::Parse("not an IPv4 packet".into()));
        }

        let header_len = ((buffer[0] & 0x0F) as usize) * 4;
        if header_len < MIN_HEADER_SIZE {
            return Err(Error::Parse("IPv4 IHL too small".into()));
        }
        if buffer.len() < header_len {
            return Err(Error::Parse("IPv4 header truncated".into()));
        }

        Ok(Self { buffer, header_len })
    }

    pub fn protocol(&self) -> u8 {
        self.buffer[9]
    }

    /// Source address exactly as it sits on the wire (network byte order)
    pub fn src_addr_raw(&self) -> u32 {
        u32::from_ne_bytes([
            self.buffer[12],
            self.buffer[13],
            self.buffer[14],
            self.buffer[15],
        ])
    }

    /// Destination address exactly as it sits on the wire (network byte order)
    pub fn dst_addr_raw(&self) -> u32 {
        u32::from_ne_bytes([
            self.buffer[16],
            self.buffer[17],
            self.buffer[18],
            self.buffer[19],
        ])
    }

    /// Offset of the first fragment is zero; later fragments carry no L4 header
    pub fn is_first_fragment(&self) -> bool {
        let offset = u16::from_be_bytes([self.buffer[6] & 0x1F, self.buffer[7]]);
        offset == 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.header_len..]
    }
}

/// Source and destination ports of a TCP or UDP header, in network byte order.
///
/// Both headers start with the two port fields, so one reader serves both.
pub fn transport_ports_raw(l4: &[u8]) -> Result<(u16, u16)> {
    if l4.len() < 4 {
        return Err(Error::Parse("transport header too short".into()));
    }
    Ok((
        u16::from_ne_bytes([l4[0], l4[1]]),
        u16::from_ne_bytes([l4[2], l4[3]]),
    ))
}

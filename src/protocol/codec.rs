//! Address and port text codec
//!
//! Rule text carries IPv4 addresses as dotted decimal and ports as plain
//! decimal. Both are stored as host-order integers where 0 means "any".

use crate::{Error, Result};

/// Token that stands for "any address" in rule text
pub const ANY_IP: &str = "anyip";

/// Parse dotted-decimal text into a host-order address.
///
/// The first octet lands in the most significant byte, so `"10.0.2.15"`
/// becomes `0x0A00_020F`. [`ANY_IP`] maps to 0.
pub fn parse_address(text: &str) -> Result<u32> {
    if text == ANY_IP {
        return Ok(0);
    }

    let mut addr = 0u32;
    let mut octets = 0;
    for part in text.split('.') {
        octets += 1;
        if octets > 4 {
            return Err(Error::MalformedAddress(text.to_string()));
        }
        addr = (addr << 8) | u32::from(parse_octet(part, text)?);
    }

    if octets != 4 {
        return Err(Error::MalformedAddress(text.to_string()));
    }

    Ok(addr)
}

fn parse_octet(part: &str, text: &str) -> Result<u8> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedAddress(text.to_string()));
    }
    part.parse()
        .map_err(|_| Error::MalformedAddress(text.to_string()))
}

/// Parse decimal port text. Digits only, at most 65535.
pub fn parse_port(text: &str) -> Result<u16> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedPort(text.to_string()));
    }
    text.parse()
        .map_err(|_| Error::MalformedPort(text.to_string()))
}

/// Render a host-order address as dotted decimal.
///
/// Octets are emitted least significant byte first, which is the reverse
/// of [`parse_address`]: `format_address(parse_address("10.0.2.15"))` is
/// `"15.2.0.10"`. Rule listings have always been printed this way and
/// clients depend on it.
pub fn format_address(addr: u32) -> String {
    let [b0, b1, b2, b3] = addr.to_le_bytes();
    format!("{}.{}.{}.{}", b0, b1, b2, b3)
}

//! Filter rule model and its single-line text form
//!
//! Rule text is nine whitespace-separated tokens:
//!
//! ```text
//! protocol direction action src_ip src_mask src_port dst_ip dst_mask dst_port
//! tcp      out       block  anyip  anyip    0        anyip  anyip    22
//! ```

use crate::protocol::codec::{format_address, parse_address, parse_port};
use crate::protocol::ipv4;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Number of tokens in a rule line
pub const RULE_TOKENS: usize = 9;

/// Packet direction relative to this host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Rule without a direction; never matches a captured packet
    #[default]
    None,
    Incoming,
    Outgoing,
}

impl Direction {
    fn from_token(token: &str) -> Self {
        match token {
            "in" => Direction::Incoming,
            "out" => Direction::Outgoing,
            _ => Direction::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::None => "NONE",
            Direction::Incoming => "IN",
            Direction::Outgoing => "OUT",
        }
    }
}

/// Transport protocol a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Any,
    Tcp,
    Udp,
}

impl Protocol {
    fn from_token(token: &str) -> Self {
        match token {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => Protocol::Any,
        }
    }

    /// Check an IP protocol number against this rule protocol
    pub fn matches(&self, ip_protocol: u8) -> bool {
        match self {
            Protocol::Any => true,
            Protocol::Tcp => ip_protocol == ipv4::protocol::TCP,
            Protocol::Udp => ip_protocol == ipv4::protocol::UDP,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Any => "TCP/UDP",
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

/// What to do with a packet matched by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Block,
    Unblock,
}

impl Action {
    fn from_token(token: &str) -> Self {
        match token {
            "block" => Action::Block,
            _ => Action::Unblock,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Block => "block",
            Action::Unblock => "unblock",
        }
    }
}

/// One line of filtering policy.
///
/// Addresses and masks are host-order values. A zero address or port
/// matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub direction: Direction,
    pub protocol: Protocol,
    pub action: Action,
    pub src_addr: u32,
    pub src_mask: u32,
    pub src_port: u16,
    pub dst_addr: u32,
    pub dst_mask: u32,
    pub dst_port: u16,
}

impl Rule {
    /// Create a rule that matches every packet in `direction`
    pub fn new(direction: Direction, protocol: Protocol, action: Action) -> Self {
        Self {
            direction,
            protocol,
            action,
            src_addr: 0,
            src_mask: 0,
            src_port: 0,
            dst_addr: 0,
            dst_mask: 0,
            dst_port: 0,
        }
    }

    /// Parse a rule line.
    ///
    /// Fewer than [`RULE_TOKENS`] tokens is an error; anything after the
    /// ninth token is ignored. Unrecognised protocol, direction and action
    /// tokens fall back to any, none and unblock.
    pub fn deserialize(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let mut fields = [""; RULE_TOKENS];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = tokens.next().ok_or_else(|| {
                Error::MalformedRule(format!(
                    "expected {} tokens, got {}: {:?}",
                    RULE_TOKENS,
                    i,
                    line.trim()
                ))
            })?;
        }

        let [protocol, direction, action, src_ip, src_mask, src_port, dst_ip, dst_mask, dst_port] =
            fields;

        Ok(Self {
            direction: Direction::from_token(direction),
            protocol: Protocol::from_token(protocol),
            action: Action::from_token(action),
            src_addr: parse_address(src_ip)?,
            src_mask: parse_address(src_mask)?,
            src_port: parse_port(src_port)?,
            dst_addr: parse_address(dst_ip)?,
            dst_mask: parse_address(dst_mask)?,
            dst_port: parse_port(dst_port)?,
        })
    }

    /// Render as a numbered listing line, including the trailing newline
    pub fn format(&self, index: usize) -> String {
        format!("{}\n", Listed { index, rule: self })
    }
}

impl FromStr for Rule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::deserialize(s)
    }
}

/// A rule paired with its 1-based position, displayed as a listing line
/// without the line break.
#[derive(Debug, Clone, Copy)]
pub struct Listed<'a> {
    pub index: usize,
    pub rule: &'a Rule,
}

impl fmt::Display for Listed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = self.rule;
        write!(
            f,
            "{}. dir {}, protocol {}, src ip {}, src port {}, dst ip {}, dst port {}, action {}",
            self.index,
            rule.direction.label(),
            rule.protocol.label(),
            format_address(rule.src_addr),
            rule.src_port,
            format_address(rule.dst_addr),
            rule.dst_port,
            rule.action.label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_no_ssh() {
        let rule = Rule::deserialize("tcp out block anyip anyip 0 anyip anyip 22").unwrap();

        assert_eq!(rule.protocol, Protocol::Tcp);
        assert_eq!(rule.direction, Direction::Outgoing);
        assert_eq!(rule.action, Action::Block);
        assert_eq!(rule.src_addr, 0);
        assert_eq!(rule.src_mask, 0);
        assert_eq!(rule.src_port, 0);
        assert_eq!(rule.dst_addr, 0);
        assert_eq!(rule.dst_mask, 0);
        assert_eq!(rule.dst_port, 22);
    }

    #[test]
    fn test_deserialize_host_rule() {
        let rule: Rule = "udp in unblock 10.0.2.15 255.255.255.0 53 192.168.1.1 255.255.0.0 5353"
            .parse()
            .unwrap();

        assert_eq!(rule.protocol, Protocol::Udp);
        assert_eq!(rule.direction, Direction::Incoming);
        assert_eq!(rule.action, Action::Unblock);
        assert_eq!(rule.src_addr, 0x0A00_020F);
        assert_eq!(rule.src_mask, 0xFFFF_FF00);
        assert_eq!(rule.src_port, 53);
        assert_eq!(rule.dst_addr, 0xC0A8_0101);
        assert_eq!(rule.dst_mask, 0xFFFF_0000);
        assert_eq!(rule.dst_port, 5353);
    }

    #[test]
    fn test_deserialize_udp_token() {
        // "ucp" was never a protocol; it falls back to any
        let udp = Rule::deserialize("udp out block anyip anyip 0 anyip anyip 53").unwrap();
        let ucp = Rule::deserialize("ucp out block anyip anyip 0 anyip anyip 53").unwrap();
        assert_eq!(udp.protocol, Protocol::Udp);
        assert_eq!(ucp.protocol, Protocol::Any);
    }

    #[test]
    fn test_deserialize_fallback_tokens() {
        let rule = Rule::deserialize("all both drop anyip anyip 0 anyip anyip 0").unwrap();
        assert_eq!(rule.protocol, Protocol::Any);
        assert_eq!(rule.direction, Direction::None);
        assert_eq!(rule.action, Action::Unblock);
    }

    #[test]
    fn test_deserialize_too_few_tokens() {
        for line in ["", "tcp out block", "tcp out block anyip anyip 0 anyip anyip"] {
            assert!(
                matches!(Rule::deserialize(line), Err(Error::MalformedRule(_))),
                "accepted {:?}",
                line
            );
        }
    }

    #[test]
    fn test_deserialize_ignores_extra_tokens() {
        let rule =
            Rule::deserialize("tcp out block anyip anyip 0 anyip anyip 22 trailing junk").unwrap();
        assert_eq!(rule.dst_port, 22);
    }

    #[test]
    fn test_deserialize_bad_fields() {
        assert!(matches!(
            Rule::deserialize("tcp out block 10.0.2 anyip 0 anyip anyip 22"),
            Err(Error::MalformedAddress(_))
        ));
        assert!(matches!(
            Rule::deserialize("tcp out block anyip 300.0.0.0 0 anyip anyip 22"),
            Err(Error::MalformedAddress(_))
        ));
        assert!(matches!(
            Rule::deserialize("tcp out block anyip anyip x anyip anyip 22"),
            Err(Error::MalformedPort(_))
        ));
        assert!(matches!(
            Rule::deserialize("tcp out block anyip anyip 0 anyip anyip 70000"),
            Err(Error::MalformedPort(_))
        ));
    }

    #[test]
    fn test_format_listing_line() {
        let rule = Rule::deserialize("tcp out block anyip anyip 0 anyip anyip 22").unwrap();
        assert_eq!(
            rule.format(1),
            "1. dir OUT, protocol TCP, src ip 0.0.0.0, src port 0, dst ip 0.0.0.0, dst port 22, action block\n"
        );

        let rule = Rule::new(Direction::None, Protocol::Any, Action::Unblock);
        assert_eq!(
            rule.format(7),
            "7. dir NONE, protocol TCP/UDP, src ip 0.0.0.0, src port 0, dst ip 0.0.0.0, dst port 0, action unblock\n"
        );
    }

    #[test]
    fn test_format_round_trip_reverses_addresses() {
        let rule =
            Rule::deserialize("udp in unblock 10.0.2.15 255.255.255.255 1234 192.168.1.20 anyip 80")
                .unwrap();
        let line = rule.format(3);

        // Every field survives except the address text, which comes back
        // with its octets reversed.
        assert_eq!(
            line,
            "3. dir IN, protocol UDP, src ip 15.2.0.10, src port 1234, dst ip 20.1.168.192, dst port 80, action unblock\n"
        );
    }

    #[test]
    fn test_listed_display() {
        let rule = Rule::new(Direction::Incoming, Protocol::Tcp, Action::Block);
        let text = Listed { index: 2, rule: &rule }.to_string();
        assert!(text.starts_with("2. dir IN, protocol TCP"));
        assert!(!text.ends_with('\n'));
    }
}

//! Packet filtering engine
//!
//! Evaluates packets against the rule store in insertion order. The first
//! rule that matches decides; later rules, however broad, are never
//! consulted for that packet. With no matching rule the packet is accepted.
//!
//! The store sits behind a reader-writer lock: any number of packet
//! decisions may run at once, while adding or deleting a rule takes the
//! lock exclusively, so a decision never sees a half-applied change.

use super::rule::{Action, Direction, Rule};
use super::store::RuleStore;
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, trace};

/// Outcome for one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    /// Let the packet through
    #[default]
    Accept,
    /// Discard the packet
    Drop,
}

impl From<Action> for Decision {
    fn from(action: Action) -> Self {
        match action {
            Action::Block => Decision::Drop,
            Action::Unblock => Decision::Accept,
        }
    }
}

/// Per-packet metadata handed over by the interception hook.
///
/// Addresses and ports are in network byte order, exactly as read from
/// the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketDescriptor {
    pub direction: Direction,
    /// IP protocol number
    pub protocol: u8,
    pub src_addr: u32,
    pub dst_addr: u32,
    pub src_port: u16,
    pub dst_port: u16,
}

impl PacketDescriptor {
    /// Build a descriptor from host-order values
    pub fn from_host(
        direction: Direction,
        protocol: u8,
        src: (Ipv4Addr, u16),
        dst: (Ipv4Addr, u16),
    ) -> Self {
        Self {
            direction,
            protocol,
            src_addr: u32::from(src.0).to_be(),
            dst_addr: u32::from(dst.0).to_be(),
            src_port: src.1.to_be(),
            dst_port: dst.1.to_be(),
        }
    }
}

/// Length of the run of set bits starting at the most significant bit.
///
/// Only this leading run counts as the prefix: `0xF000_0000` gives 4, and
/// `0xA000_0000` (`1010...`) gives 1, not 2.
pub fn leading_set_bit_run(mask: u32) -> u32 {
    mask.leading_ones()
}

/// Compare the leading bits of a host-order packet address with a rule
/// address.
///
/// A zero mask compares all 32 bits. Otherwise the prefix length is
/// [`leading_set_bit_run`] of the mask, so a mask whose first bit is clear
/// compares nothing and always matches.
pub fn address_matches(packet_addr: u32, rule_addr: u32, mask: u32) -> bool {
    let cmp_len = if mask == 0 {
        32
    } else {
        leading_set_bit_run(mask)
    };
    // Shifting by 32 (cmp_len == 0) overflows; nothing to compare then.
    (packet_addr ^ rule_addr)
        .checked_shr(32 - cmp_len)
        .map_or(true, |diff| diff == 0)
}

/// Why a rule was skipped for a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mismatch {
    Direction,
    Protocol,
    SrcAddr,
    DstAddr,
    SrcPort,
    DstPort,
}

/// Packet fields converted to host order once per decision
#[derive(Debug, Clone, Copy)]
struct HostPacket {
    direction: Direction,
    protocol: u8,
    src_addr: u32,
    dst_addr: u32,
    src_port: u16,
    dst_port: u16,
}

impl From<&PacketDescriptor> for HostPacket {
    fn from(p: &PacketDescriptor) -> Self {
        Self {
            direction: p.direction,
            protocol: p.protocol,
            src_addr: u32::from_be(p.src_addr),
            dst_addr: u32::from_be(p.dst_addr),
            src_port: u16::from_be(p.src_port),
            dst_port: u16::from_be(p.dst_port),
        }
    }
}

fn check_rule(rule: &Rule, pkt: &HostPacket) -> std::result::Result<(), Mismatch> {
    // No wildcard direction: a rule must name the packet's direction
    if rule.direction != pkt.direction {
        return Err(Mismatch::Direction);
    }
    if !rule.protocol.matches(pkt.protocol) {
        return Err(Mismatch::Protocol);
    }
    if rule.src_addr != 0 && !address_matches(pkt.src_addr, rule.src_addr, rule.src_mask) {
        return Err(Mismatch::SrcAddr);
    }
    if rule.dst_addr != 0 && !address_matches(pkt.dst_addr, rule.dst_addr, rule.dst_mask) {
        return Err(Mismatch::DstAddr);
    }
    if rule.src_port != 0 && rule.src_port != pkt.src_port {
        return Err(Mismatch::SrcPort);
    }
    if rule.dst_port != 0 && rule.dst_port != pkt.dst_port {
        return Err(Mismatch::DstPort);
    }
    Ok(())
}

/// Check if a rule matches a packet
pub fn rule_matches(rule: &Rule, packet: &PacketDescriptor) -> bool {
    check_rule(rule, &HostPacket::from(packet)).is_ok()
}

/// Owns the rule store and serves both the packet path and the control path
#[derive(Debug)]
pub struct Engine {
    store: RwLock<RuleStore>,
    metrics: Arc<MetricsRegistry>,
}

impl Engine {
    /// Create an engine with an empty, unbounded store
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self::with_store(RuleStore::new(), metrics)
    }

    /// Create an engine around an existing store
    pub fn with_store(store: RuleStore, metrics: Arc<MetricsRegistry>) -> Self {
        metrics.set_rule_count(store.len());
        Self {
            store: RwLock::new(store),
            metrics,
        }
    }

    // A panic while holding the lock cannot leave the store half-modified
    // (every mutation is a single Vec call), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, RuleStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RuleStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide the fate of one packet
    pub fn decide(&self, packet: &PacketDescriptor) -> Decision {
        let pkt = HostPacket::from(packet);
        let store = self.read();

        for (index, rule) in store.iter() {
            match check_rule(rule, &pkt) {
                Ok(()) => {
                    let decision = Decision::from(rule.action);
                    match decision {
                        Decision::Accept => self.metrics.packets_accepted.inc(),
                        Decision::Drop => self.metrics.packets_dropped.inc(),
                    }
                    debug!(
                        rule = index,
                        ?decision,
                        direction = ?pkt.direction,
                        protocol = pkt.protocol,
                        src = %Ipv4Addr::from(pkt.src_addr),
                        src_port = pkt.src_port,
                        dst = %Ipv4Addr::from(pkt.dst_addr),
                        dst_port = pkt.dst_port,
                        "rule matched"
                    );
                    return decision;
                }
                Err(reason) => {
                    trace!(rule = index, ?reason, "rule not matched");
                }
            }
        }

        self.metrics.packets_unmatched.inc();
        debug!(
            direction = ?pkt.direction,
            protocol = pkt.protocol,
            src = %Ipv4Addr::from(pkt.src_addr),
            src_port = pkt.src_port,
            dst = %Ipv4Addr::from(pkt.dst_addr),
            dst_port = pkt.dst_port,
            "no rule matched, accepting"
        );
        Decision::Accept
    }

    /// Append a rule, returning its 1-based index
    pub fn add_rule(&self, rule: Rule) -> Result<usize> {
        let mut store = self.write();
        let index = store.append(rule)?;
        self.metrics.rules_added.inc();
        self.metrics.set_rule_count(store.len());
        info!("added rule {}", rule.format(index).trim_end());
        Ok(index)
    }

    /// Delete the rule at 1-based `index`
    pub fn delete_rule(&self, index: usize) -> Result<Rule> {
        let mut store = self.write();
        let len = store.len();
        let rule = store
            .remove_at(index)
            .ok_or(Error::IndexNotFound { index, len })?;
        self.metrics.rules_deleted.inc();
        self.metrics.set_rule_count(store.len());
        info!("deleted rule {}", rule.format(index).trim_end());
        Ok(rule)
    }

    /// Render the whole store, one listing line per rule
    pub fn listing(&self) -> String {
        let store = self.read();
        store.iter().map(|(index, rule)| rule.format(index)).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Release every rule
    pub fn clear(&self) {
        let mut store = self.write();
        store.clear();
        self.metrics.set_rule_count(0);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Arc::new(MetricsRegistry::new()))
    }
}

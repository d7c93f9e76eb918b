//! Data plane components
//!
//! Rule model, rule storage and the per-packet matching engine.

mod filter;
mod rule;
mod store;

pub use filter::{
    address_matches, leading_set_bit_run, rule_matches, Decision, Engine, PacketDescriptor,
};
pub use rule::{Action, Direction, Listed, Protocol, Rule, RULE_TOKENS};
pub use store::RuleStore;

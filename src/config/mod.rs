//! Configuration management
//!
//! Loads fwall.toml and turns it into a ready engine.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::dataplane::{Engine, Rule, RuleStore};
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Parse configuration from TOML text
pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

/// Build an engine holding the configured startup rules
pub fn build_engine(config: &Config, metrics: Arc<MetricsRegistry>) -> Result<Engine> {
    let store = match config.store.max_rules {
        Some(max) => RuleStore::with_limit(max),
        None => RuleStore::new(),
    };
    let engine = Engine::with_store(store, metrics);

    for line in &config.store.rules {
        let rule = Rule::deserialize(line)
            .map_err(|e| Error::Config(format!("startup rule {:?}: {}", line, e)))?;
        engine.add_rule(rule)?;
    }

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::{Decision, Direction, PacketDescriptor};
    use crate::protocol::ipv4::protocol::TCP;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(
            config.control.socket_path,
            std::path::PathBuf::from("/run/fwall.sock")
        );
        assert_eq!(config.control.max_command_len, 255);
        assert_eq!(config.control.idle_timeout_secs, 30);
        assert!(config.capture.interface.is_none());
        assert!(config.store.max_rules.is_none());
        assert!(config.store.rules.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_full() {
        let config = parse(
            r#"
            [control]
            socket_path = "/tmp/fw.sock"
            max_command_len = 512
            idle_timeout_secs = 5

            [capture]
            interface = "eth0"

            [store]
            max_rules = 16
            rules = [
                "tcp out block anyip anyip 0 anyip anyip 22",
                "tcp out block 10.0.2.15 255.255.255.255 0 anyip anyip 0",
            ]

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.control.max_command_len, 512);
        assert_eq!(config.control.idle_timeout_secs, 5);
        assert_eq!(config.capture.interface.as_deref(), Some("eth0"));
        assert_eq!(config.store.max_rules, Some(16));
        assert_eq!(config.store.rules.len(), 2);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(matches!(
            parse("[control]\nsocket = \"/x\"\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_build_engine_installs_rules_in_order() {
        let config = parse(
            r#"
            [store]
            rules = [
                "tcp out block anyip anyip 0 anyip anyip 22",
                "tcp out unblock anyip anyip 0 anyip anyip 22",
            ]
            "#,
        )
        .unwrap();
        let engine = build_engine(&config, Arc::new(MetricsRegistry::new())).unwrap();
        assert_eq!(engine.len(), 2);

        let pkt = PacketDescriptor::from_host(
            Direction::Outgoing,
            TCP,
            (Ipv4Addr::new(10, 0, 2, 15), 40000),
            (Ipv4Addr::new(1, 1, 1, 1), 22),
        );
        assert_eq!(engine.decide(&pkt), Decision::Drop);
    }

    #[test]
    fn test_build_engine_bad_rule() {
        let config = parse("[store]\nrules = [\"tcp out\"]\n").unwrap();
        assert!(matches!(
            build_engine(&config, Arc::new(MetricsRegistry::new())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_build_engine_respects_limit() {
        let config = parse(
            r#"
            [store]
            max_rules = 1
            rules = [
                "tcp out block anyip anyip 0 anyip anyip 22",
                "tcp out block anyip anyip 0 anyip anyip 23",
            ]
            "#,
        )
        .unwrap();
        assert!(matches!(
            build_engine(&config, Arc::new(MetricsRegistry::new())),
            Err(Error::StoreFull { max: 1 })
        ));
    }
}

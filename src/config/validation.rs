//! Configuration validation

use super::Config;
use crate::dataplane::Rule;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_control(config, &mut result);
    validate_capture(config, &mut result);
    validate_store(config, &mut result);
    validate_logging(config, &mut result);

    result
}

fn validate_control(config: &Config, result: &mut ValidationResult) {
    let control = &config.control;

    if !control.socket_path.is_absolute() {
        result.error(format!(
            "control.socket_path: '{}' must be an absolute path",
            control.socket_path.display()
        ));
    }

    if control.max_command_len == 0 {
        result.error("control.max_command_len: must be greater than 0");
    }

    if control.idle_timeout_secs == 0 {
        result.error("control.idle_timeout_secs: must be greater than 0");
    }
}

fn validate_capture(config: &Config, result: &mut ValidationResult) {
    match config.capture.interface.as_deref() {
        None => result.warn("capture.interface: not specified, packet tap disabled"),
        Some("") => result.error("capture.interface: must not be empty"),
        Some(name) if name.len() >= libc::IFNAMSIZ => result.error(format!(
            "capture.interface: '{}' is longer than {} bytes",
            name,
            libc::IFNAMSIZ - 1
        )),
        Some(_) => {}
    }
}

fn validate_store(config: &Config, result: &mut ValidationResult) {
    let store = &config.store;

    for (i, line) in store.rules.iter().enumerate() {
        if let Err(e) = Rule::deserialize(line) {
            result.error(format!("store.rules[{}]: {}", i, e));
        }
        if line.len() > config.control.max_command_len {
            result.warn(format!(
                "store.rules[{}]: longer than control.max_command_len, cannot be re-added over the control channel",
                i
            ));
        }
    }

    if let Some(max) = store.max_rules {
        if max == 0 {
            result.error("store.max_rules: must be greater than 0");
        } else if store.rules.len() > max {
            result.error(format!(
                "store.rules: {} startup rules exceed store.max_rules ({})",
                store.rules.len(),
                max
            ));
        }
    }
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    let logging = &config.logging;

    if !matches!(
        logging.level.to_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace"
    ) {
        result.warn(format!(
            "logging.level: unknown level '{}', using info",
            logging.level
        ));
    }

    if !matches!(logging.format.as_str(), "pretty" | "compact" | "json") {
        result.warn(format!(
            "logging.format: unknown format '{}', using pretty",
            logging.format
        ));
    }
}

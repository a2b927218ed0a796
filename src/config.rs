//! Engine configuration.
//!
//! [`EngineConfig`] can be built in code (usually through
//! [`EngineBuilder`](crate::EngineBuilder)) or loaded from JSON:
//!
//! ```
//! use std::time::Duration;
//! use atwire::config::{EngineConfig, Precedence, TimeoutClass};
//!
//! let config = EngineConfig::from_json(
//!     r#"{ "timeouts": { "dns": 45000 }, "precedence": "confirmation_first" }"#,
//! ).unwrap();
//!
//! assert_eq!(config.timeouts.get(TimeoutClass::Dns), Duration::from_secs(45));
//! assert_eq!(config.timeouts.get(TimeoutClass::Sms), Duration::from_secs(10));
//! assert_eq!(config.precedence, Precedence::ConfirmationFirst);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_COMMAND_CAPACITY;
use crate::error::{AtError, Result};
use crate::protocol::DEFAULT_MAX_LINE_LENGTH;

/// Default writer queue depth.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Functional category of a command, selecting how long to wait for its
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutClass {
    General,
    Device,
    Power,
    Sim,
    Network,
    PacketDomain,
    Proprietary,
    Sms,
    Socket,
    Dns,
    Http,
    Mqtt,
    Gnss,
}

impl TimeoutClass {
    pub const ALL: [TimeoutClass; 13] = [
        TimeoutClass::General,
        TimeoutClass::Device,
        TimeoutClass::Power,
        TimeoutClass::Sim,
        TimeoutClass::Network,
        TimeoutClass::PacketDomain,
        TimeoutClass::Proprietary,
        TimeoutClass::Sms,
        TimeoutClass::Socket,
        TimeoutClass::Dns,
        TimeoutClass::Http,
        TimeoutClass::Mqtt,
        TimeoutClass::Gnss,
    ];

    /// Built-in timeout in milliseconds.
    pub fn default_millis(self) -> u64 {
        match self {
            TimeoutClass::General => 1_000,
            TimeoutClass::Device => 2_000,
            TimeoutClass::Power | TimeoutClass::Sim | TimeoutClass::Proprietary => 5_000,
            TimeoutClass::Network
            | TimeoutClass::PacketDomain
            | TimeoutClass::Sms
            | TimeoutClass::Socket
            | TimeoutClass::Gnss => 10_000,
            TimeoutClass::Dns | TimeoutClass::Http | TimeoutClass::Mqtt => 30_000,
        }
    }
}

/// Per-class timeout overrides in milliseconds.
///
/// Classes without an entry use [`TimeoutClass::default_millis`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeoutTable(HashMap<TimeoutClass, u64>);

impl TimeoutTable {
    pub fn get(&self, class: TimeoutClass) -> Duration {
        let millis = self
            .0
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_millis());
        Duration::from_millis(millis)
    }

    pub fn set(&mut self, class: TimeoutClass, timeout: Duration) {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.0.insert(class, millis);
    }

    fn validate(&self) -> Result<()> {
        match self.0.iter().find(|(_, &ms)| ms == 0) {
            Some((class, _)) => Err(AtError::Config(format!(
                "timeout for {:?} must be non-zero",
                class
            ))),
            None => Ok(()),
        }
    }
}

/// Which classification wins when a line could be both an event and a
/// confirmation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Check registered event prefixes before status tokens.
    #[default]
    EventsFirst,
    /// Check status tokens before event prefixes.
    ConfirmationFirst,
}

/// Runtime configuration of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeouts: TimeoutTable,
    pub precedence: Precedence,
    /// Command buffer size in bytes.
    pub command_capacity: usize,
    /// Longest accepted received line.
    pub max_line_length: usize,
    /// Writer queue depth.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutTable::default(),
            precedence: Precedence::default(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_capacity == 0 {
            return Err(AtError::Config("command_capacity must be non-zero".into()));
        }
        if self.max_line_length == 0 {
            return Err(AtError::Config("max_line_length must be non-zero".into()));
        }
        if self.channel_capacity == 0 {
            return Err(AtError::Config("channel_capacity must be non-zero".into()));
        }
        self.timeouts.validate()
    }
}

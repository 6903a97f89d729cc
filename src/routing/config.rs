//! Protocol configuration

use crate::routing::copies::{FixedLifetime, LifetimePolicy, ScaledLifetime};
use crate::routing::error::{ConfigError, ConfigResult};
use crate::routing::handoff::HandoffTracking;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Channel numbers for the three link primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSet {
    pub broadcast: u16,
    pub unicast: u16,
    pub reliable: u16,
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self {
            broadcast: 128,
            unicast: 129,
            reliable: 130,
        }
    }
}

/// Which lifetime policy granted entries get
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifetimeMode {
    /// `max_lifetime` for every entry
    #[default]
    Fixed,
    /// Scaled by remaining halvings and cycle length, floored at
    /// `unconfirmed_timeout`
    Scaled,
}

/// Configuration for a spray-and-wait node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SprayConfig {
    /// Maximum number of queued entries
    pub queue_capacity: usize,

    /// Copy budget given to locally created messages
    pub initial_copies: u16,

    /// Attempt bound for reliable handoffs
    pub max_retransmissions: u8,

    /// Pause between advertisements inside one pass over the queue
    #[serde(with = "duration_millis")]
    pub packet_delay: Duration,

    /// Pause after a full pass, or while the queue is empty
    #[serde(with = "duration_millis")]
    pub queue_delay: Duration,

    /// Lifetime of a placeholder that has not been granted copies
    #[serde(with = "duration_millis")]
    pub unconfirmed_timeout: Duration,

    /// Lifetime of an entry holding copies (fixed policy)
    #[serde(with = "duration_millis")]
    pub max_lifetime: Duration,

    pub lifetime: LifetimeMode,

    pub handoff_tracking: HandoffTracking,

    pub channels: ChannelSet,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for SprayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            initial_copies: 8,
            max_retransmissions: 3,
            packet_delay: Duration::from_secs(1),
            queue_delay: Duration::from_secs(3),
            unconfirmed_timeout: Duration::from_secs(1),
            max_lifetime: Duration::from_secs(60),
            lifetime: LifetimeMode::default(),
            handoff_tracking: HandoffTracking::default(),
            channels: ChannelSet::default(),
        }
    }
}

impl SprayConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }
        if self.initial_copies == 0 {
            return Err(ConfigError::Invalid("initial_copies must be > 0".into()));
        }
        if self.max_retransmissions == 0 {
            return Err(ConfigError::Invalid(
                "max_retransmissions must be > 0".into(),
            ));
        }
        for (name, value) in [
            ("packet_delay", self.packet_delay),
            ("queue_delay", self.queue_delay),
            ("unconfirmed_timeout", self.unconfirmed_timeout),
            ("max_lifetime", self.max_lifetime),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        let ChannelSet {
            broadcast,
            unicast,
            reliable,
        } = self.channels;
        if broadcast == unicast || unicast == reliable || broadcast == reliable {
            return Err(ConfigError::Invalid("channels must be distinct".into()));
        }
        Ok(())
    }

    pub fn lifetime_policy(&self) -> Box<dyn LifetimePolicy> {
        match self.lifetime {
            LifetimeMode::Fixed => Box::new(FixedLifetime::new(self.max_lifetime)),
            LifetimeMode::Scaled => Box::new(ScaledLifetime {
                packet_delay: self.packet_delay,
                queue_delay: self.queue_delay,
                floor: self.unconfirmed_timeout,
            }),
        }
    }
}

/// Builder for [`SprayConfig`]
pub struct SprayConfigBuilder {
    config: SprayConfig,
}

impl SprayConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SprayConfig::default(),
        }
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn initial_copies(mut self, copies: u16) -> Self {
        self.config.initial_copies = copies;
        self
    }

    pub fn max_retransmissions(mut self, attempts: u8) -> Self {
        self.config.max_retransmissions = attempts;
        self
    }

    pub fn packet_delay(mut self, delay: Duration) -> Self {
        self.config.packet_delay = delay;
        self
    }

    pub fn queue_delay(mut self, delay: Duration) -> Self {
        self.config.queue_delay = delay;
        self
    }

    pub fn unconfirmed_timeout(mut self, timeout: Duration) -> Self {
        self.config.unconfirmed_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.max_lifetime = lifetime;
        self
    }

    pub fn lifetime(mut self, mode: LifetimeMode) -> Self {
        self.config.lifetime = mode;
        self
    }

    pub fn handoff_tracking(mut self, tracking: HandoffTracking) -> Self {
        self.config.handoff_tracking = tracking;
        self
    }

    pub fn channels(mut self, channels: ChannelSet) -> Self {
        self.config.channels = channels;
        self
    }

    pub fn build(self) -> ConfigResult<SprayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for SprayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

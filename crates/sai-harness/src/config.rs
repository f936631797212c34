//! Harness settings.
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file is valid.
//!
//! ```toml
//! [traffic]
//! capture_timeout_ms = 1000
//!
//! [load_balance]
//! flows = 300
//! scaling = 0.7
//! ```

use sai_types::MacAddress;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse settings file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("failed to serialize settings: {0}")]
    Serialize(String),

    #[error("invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SettingsError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        SettingsError::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Packet capture timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSettings {
    /// How long to wait for the first frame when output is expected.
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_ms: u64,

    /// How long to wait before concluding that nothing came out.
    #[serde(default = "default_negative_timeout")]
    pub negative_timeout_ms: u64,

    /// Quiet period after the last frame before a capture closes.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
}

/// Bounded polling for asynchronous device effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_poll_attempts")]
    pub attempts: u32,

    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalanceSettings {
    /// Flows per distribution pass.
    #[serde(default = "default_flows")]
    pub flows: usize,

    /// Slack factor applied to each member's proportional share.
    #[serde(default = "default_scaling")]
    pub scaling: f64,

    /// Seed for flow-key generation; a fixed seed makes passes reproducible.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Simulator,
    Hardware,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSettings {
    #[serde(default = "default_target_kind")]
    pub kind: TargetKind,

    /// Router MAC programmed on the switch object.
    #[serde(default = "default_router_mac")]
    pub router_mac: MacAddress,

    /// Front-panel ports exposed by a simulated target.
    #[serde(default = "default_port_count")]
    pub ports: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessSettings {
    #[serde(default)]
    pub traffic: TrafficSettings,

    #[serde(default)]
    pub poll: PollSettings,

    #[serde(default)]
    pub load_balance: LoadBalanceSettings,

    #[serde(default)]
    pub target: TargetSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_capture_timeout() -> u64 {
    1000
}

fn default_negative_timeout() -> u64 {
    1000
}

fn default_settle() -> u64 {
    50
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_poll_interval() -> u64 {
    100
}

fn default_flows() -> usize {
    300
}

fn default_scaling() -> f64 {
    0.7
}

fn default_seed() -> u64 {
    0x5a1_c0de
}

fn default_target_kind() -> TargetKind {
    TargetKind::Simulator
}

fn default_router_mac() -> MacAddress {
    MacAddress::new([0x00, 0x77, 0x66, 0x55, 0x44, 0x00])
}

fn default_port_count() -> u32 {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            capture_timeout_ms: default_capture_timeout(),
            negative_timeout_ms: default_negative_timeout(),
            settle_ms: default_settle(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            attempts: default_poll_attempts(),
            interval_ms: default_poll_interval(),
        }
    }
}

impl Default for LoadBalanceSettings {
    fn default() -> Self {
        Self {
            flows: default_flows(),
            scaling: default_scaling(),
            seed: default_seed(),
        }
    }
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            kind: default_target_kind(),
            router_mac: default_router_mac(),
            ports: default_port_count(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl HarnessSettings {
    /// Loads settings from `path`, falling back to defaults if it does not
    /// exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| match e {
                SettingsError::Parse { message, .. } => SettingsError::Parse {
                    path: path.display().to_string(),
                    message,
                },
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("settings file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(SettingsError::Io(e)),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content).map_err(|e| SettingsError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let lb = &self.load_balance;
        if !(0.5..=0.8).contains(&lb.scaling) {
            return Err(SettingsError::invalid(
                "load_balance.scaling",
                format!("{} is outside 0.5..=0.8", lb.scaling),
            ));
        }
        if lb.flows == 0 {
            return Err(SettingsError::invalid("load_balance.flows", "must be > 0"));
        }
        if self.poll.attempts == 0 {
            return Err(SettingsError::invalid("poll.attempts", "must be > 0"));
        }
        if self.traffic.capture_timeout_ms == 0 {
            return Err(SettingsError::invalid("traffic.capture_timeout_ms", "must be > 0"));
        }
        if self.target.router_mac.is_multicast() || self.target.router_mac.is_zero() {
            return Err(SettingsError::invalid(
                "target.router_mac",
                format!("{} is not a unicast MAC", self.target.router_mac),
            ));
        }
        Ok(())
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.traffic.capture_timeout_ms)
    }

    pub fn negative_timeout(&self) -> Duration {
        Duration::from_millis(self.traffic.negative_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.traffic.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    /// Settings for fast in-process runs against the simulated target.
    pub fn for_simulator() -> Self {
        let mut settings = Self::default();
        settings.traffic.capture_timeout_ms = 200;
        settings.traffic.negative_timeout_ms = 100;
        settings.traffic.settle_ms = 2;
        settings.poll.interval_ms = 20;
        settings
    }
}

//! Display configuration types and builder
//!
//! A [`DisplayConfig`] is either deserialised from an already-parsed
//! document or assembled in code with [`Builder`]. The document shape is:
//!
//! ```json
//! {
//!   "ports": [
//!     { "port_type": "spi",  "instance": 0,  "device": 0 },
//!     { "port_type": "gpio", "instance": 24, "device": 0, "port_name": "RS" },
//!     { "port_type": "gpio", "instance": 25, "device": 0, "port_name": "RESET" }
//!   ],
//!   "x_resolution": 160,
//!   "y_resolution": 128
//! }
//! ```
//!
//! Nothing is validated at construction; [`Display::initialize`](crate::Display::initialize)
//! checks the channels and resolution before touching any device.

use serde::Deserialize;

use crate::channel::Medium;
use crate::error::ConfigError;
use crate::geometry::Resolution;
use crate::seps525::Seps525Settings;

/// One channel listed in a display configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChannelDescriptor {
    /// Transport kind
    #[serde(rename = "port_type")]
    pub medium: Medium,
    /// Pin or bus number
    pub instance: u32,
    /// Bank, slave address or chip select
    #[serde(default)]
    pub device: u32,
    /// Role name such as `RS` or `RESET`
    #[serde(rename = "port_name", default)]
    pub name: Option<String>,
}

impl ChannelDescriptor {
    /// Unnamed descriptor
    pub fn new(medium: Medium, instance: u32, device: u32) -> Self {
        Self {
            medium,
            instance,
            device,
            name: None,
        }
    }

    /// Attach a role name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// What bring-up does when a register write fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPolicy {
    /// Stop at the first failure and report it
    #[default]
    Strict,
    /// Log the failure and continue with the remaining writes
    BestEffort,
}

/// Display configuration
///
/// Use [`Builder`] to create one in code, or [`DisplayConfig::from_value`]
/// for a parsed document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DisplayConfig {
    /// Channels in role order; the first is the data channel
    #[serde(rename = "ports", default)]
    pub channels: Vec<ChannelDescriptor>,
    /// Columns
    pub x_resolution: Option<u16>,
    /// Rows
    pub y_resolution: Option<u16>,
    /// Bring-up failure handling
    #[serde(default)]
    pub init_policy: InitPolicy,
    /// SEPS525 register values used during bring-up
    #[serde(default)]
    pub seps525: Seps525Settings,
}

impl DisplayConfig {
    /// Interpret an already-parsed configuration value
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the value does not have the
    /// expected shape, including unknown `port_type` tags.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// The data channel descriptor
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingChannels`] if no channels are listed.
    pub fn primary(&self) -> Result<&ChannelDescriptor, ConfigError> {
        self.channels.first().ok_or(ConfigError::MissingChannels)
    }

    /// Panel resolution
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingResolution`] if either axis is absent
    /// and [`ConfigError::InvalidResolution`] if either is zero.
    pub fn resolution(&self) -> Result<Resolution, ConfigError> {
        match (self.x_resolution, self.y_resolution) {
            (Some(x), Some(y)) => Resolution::new(x, y),
            _ => Err(ConfigError::MissingResolution),
        }
    }

    /// The descriptor carrying role `name`, if listed
    pub fn find(&self, name: &str) -> Option<&ChannelDescriptor> {
        self.channels
            .iter()
            .find(|descriptor| descriptor.name.as_deref() == Some(name))
    }
}

/// Builder for constructing display configuration
///
/// # Example
///
/// ```
/// use boardlink::{Builder, Medium};
///
/// let config = Builder::new()
///     .channel(Medium::Spi, 0, 0)
///     .named_channel("RS", Medium::Gpio, 24, 0)
///     .resolution(160, 128)
///     .build();
/// assert_eq!(config.channels.len(), 2);
/// assert_eq!(config.find("RS").map(|rs| rs.instance), Some(24));
/// ```
#[must_use]
#[derive(Debug, Default)]
pub struct Builder {
    config: DisplayConfig,
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unnamed channel
    pub fn channel(mut self, medium: Medium, instance: u32, device: u32) -> Self {
        self.config
            .channels
            .push(ChannelDescriptor::new(medium, instance, device));
        self
    }

    /// Append a channel with a role name
    pub fn named_channel(
        mut self,
        name: impl Into<String>,
        medium: Medium,
        instance: u32,
        device: u32,
    ) -> Self {
        self.config
            .channels
            .push(ChannelDescriptor::new(medium, instance, device).named(name));
        self
    }

    /// Set the panel resolution
    pub fn resolution(mut self, x: u16, y: u16) -> Self {
        self.config.x_resolution = Some(x);
        self.config.y_resolution = Some(y);
        self
    }

    /// Set bring-up failure handling
    pub fn init_policy(mut self, policy: InitPolicy) -> Self {
        self.config.init_policy = policy;
        self
    }

    /// Override SEPS525 register values
    pub fn seps525(mut self, settings: Seps525Settings) -> Self {
        self.config.seps525 = settings;
        self
    }

    /// Build the configuration
    pub fn build(self) -> DisplayConfig {
        self.config
    }
}

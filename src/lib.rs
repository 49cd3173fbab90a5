//! Userspace GPIO, I2C and SPI channels for Linux boards
//!
//! A driver for board peripherals reached through the kernel's sysfs GPIO,
//! i2c-dev and spidev interfaces, with a SEPS525 colour OLED driver built on
//! top of them.
//!
//! ## Features
//!
//! - One [`Channel`] contract over GPIO pins, I2C slaves and SPI chip selects
//! - A [`ChannelRegistry`] that keeps one live channel per identity
//! - Debounced GPIO edge interrupts delivered by callback or queue
//! - `embedded-hal` v1.0 trait implementations for every channel kind
//! - A generic [`Display`] with a pluggable [`Protocol`] and a SEPS525 driver
//! - `embedded-graphics` integration (with `graphics` feature)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use boardlink::{
//!     ChannelRegistry, Color, Coordinate, DisplayConfig, DisplayKind, create_display,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = serde_json::json!({
//!     "ports": [
//!         { "port_type": "spi",  "instance": 0,  "device": 0 },
//!         { "port_type": "gpio", "instance": 24, "device": 0, "port_name": "RS" },
//!         { "port_type": "gpio", "instance": 25, "device": 0, "port_name": "RESET" }
//!     ],
//!     "x_resolution": 160,
//!     "y_resolution": 128
//! });
//! let config = DisplayConfig::from_value(document)?;
//! let registry = ChannelRegistry::new();
//!
//! let mut display = create_display("sesp525".parse::<DisplayKind>()?, &config, &registry)?;
//! display.clear_screen(Color::BLACK)?;
//! display.draw_line(Coordinate::new(1, 1), Coordinate::new(160, 128), Color::WHITE)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Interrupts
//!
//! ```rust,no_run
//! use boardlink::{Channel, ChannelRegistry, Edge, Medium};
//!
//! # fn main() -> boardlink::Result<()> {
//! let registry = ChannelRegistry::new();
//! let button = registry.resolve(Medium::Gpio, 17, 0)?;
//! let mut guard = button.lock().map_err(|_| boardlink::Error::Poisoned)?;
//! if let Some(pin) = guard.as_gpio_mut() {
//!     let events = pin.interrupt_events(Edge::Falling)?;
//!     for pin in events.iter().take(3) {
//!         log::info!("GPIO {pin} pressed");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Channel abstraction and the GPIO, I2C and SPI implementations
pub mod channel;
/// Colour type
pub mod color;
/// Display configuration types and builder
pub mod config;
/// Generic display and protocol strategy
pub mod display;
/// Error types
pub mod error;
/// Coordinates and resolution
pub mod geometry;
/// Register interface abstraction
pub mod interface;
/// SEPS525 register map
pub mod register;
/// Channel registry
pub mod registry;
/// SEPS525 colour OLED driver
pub mod seps525;

/// Graphics support via embedded-graphics (requires `graphics` feature)
#[cfg(feature = "graphics")]
pub mod graphics;

pub use channel::{
    AnyChannel, Channel, DEBOUNCE_WINDOW, Debouncer, Direction, Edge, GpioChannel, I2cChannel,
    Identity, Medium, SharedChannel, SpiChannel, SpiMode, SpiSettings,
};
pub use color::Color;
pub use config::{Builder, ChannelDescriptor, DisplayConfig, InitPolicy};
pub use display::{AnyDisplay, Display, DisplayKind, Protocol, create_display};
pub use error::{ConfigError, Error, Result};
pub use geometry::{Coordinate, Resolution};
pub use interface::{Interface, RegisterInterface, StdDelay};
pub use registry::{ChannelRegistry, DevicePaths};
pub use seps525::{Seps525, Seps525Settings, SharedSeps525};

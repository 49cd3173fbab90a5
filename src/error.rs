//! Error types for channels and displays
//!
//! This module defines error types for configuration handling ([`ConfigError`])
//! and for device and display operations ([`Error`]).
//!
//! ## Error Types
//!
//! - [`ConfigError`] - The configuration value is incomplete or malformed
//! - [`Error`] - Runtime errors from device nodes, control requests and drivers
//!
//! Every fallible operation in this crate returns [`Result`]. Buffer operations
//! return the number of bytes actually transferred so callers can detect short
//! transfers themselves.
//!
//! ## Example
//!
//! ```
//! use boardlink::{Builder, ConfigError};
//!
//! // No channels listed
//! let config = Builder::new().resolution(160, 128).build();
//! assert!(matches!(config.primary(), Err(ConfigError::MissingChannels)));
//! ```

use std::io;
use std::path::PathBuf;

use crate::channel::gpio::Edge;
use crate::channel::{Identity, Medium};

/// Convenience alias used throughout the crate
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that can occur when talking to a channel or a display
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration handed to a display was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A device node could not be opened
    #[error("device {} unavailable", path.display())]
    DeviceUnavailable {
        /// Path of the node that failed to open
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The I2C slave address could not be selected before a transfer
    #[error("failed to select I2C address {address:#04x}")]
    AddressSelect {
        /// Requested 7-bit address
        address: u16,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A read or write moved fewer bytes than requested
    #[error("{operation} transferred {actual} of {expected} bytes")]
    TransferIncomplete {
        /// Operation that came up short
        operation: &'static str,
        /// Bytes requested
        expected: usize,
        /// Bytes actually moved
        actual: usize,
    },

    /// A device control request (ioctl) failed
    #[error("{request} control request failed")]
    Control {
        /// Name of the request
        request: &'static str,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The edge-control node could not be programmed
    #[error("failed to program interrupt edge `{edge}`")]
    InterruptSetup {
        /// Edge mode that was requested
        edge: Edge,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Interrupt monitoring is already running on this pin
    #[error("interrupt monitoring already active on GPIO {0}")]
    InterruptActive(u32),

    /// The medium cannot perform the requested operation
    #[error("{medium} channels do not support {operation}")]
    Unsupported {
        /// Medium of the channel
        medium: Medium,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// The channel's device handle is not open
    #[error("channel {0} is closed")]
    Closed(Identity),

    /// A GPIO value node returned something other than ASCII `0`/`1`
    #[error("unexpected GPIO level byte {0:#04x}")]
    InvalidLevel(u8),

    /// A pixel coordinate lies outside the display
    #[error("coordinate ({x}, {y}) outside {width}x{height} display")]
    OutOfBounds {
        /// Requested column (1-based)
        x: u8,
        /// Requested row (1-based)
        y: u8,
        /// Display width
        width: u16,
        /// Display height
        height: u16,
    },

    /// A thread panicked while holding a shared channel
    #[error("shared channel lock poisoned")]
    Poisoned,

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors that can occur when validating display configuration
///
/// These are raised before any device is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No channel descriptors were listed
    #[error("configuration lists no channels")]
    MissingChannels,

    /// `x_resolution` or `y_resolution` is missing
    #[error("configuration is missing x/y resolution")]
    MissingResolution,

    /// Resolution is zero or too large for the protocol
    #[error("invalid resolution {x}x{y}")]
    InvalidResolution {
        /// Requested width
        x: u16,
        /// Requested height
        y: u16,
    },

    /// The protocol needs more channels than were listed
    #[error("protocol needs {required} channels, configuration lists {provided}")]
    TooFewChannels {
        /// Channels required
        required: usize,
        /// Channels listed
        provided: usize,
    },

    /// A mandatory named channel (such as `RS`) is missing
    #[error("configuration has no `{0}` channel")]
    MissingRole(&'static str),

    /// Unknown medium tag
    #[error("unknown medium `{0}`")]
    UnknownMedium(String),

    /// Unknown GPIO edge literal
    #[error("unknown interrupt edge `{0}`")]
    UnknownEdge(String),

    /// Unknown display type tag
    #[error("unknown display type `{0}`")]
    UnknownDisplay(String),

    /// The configuration value does not have the expected shape
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

//! Channel registry
//!
//! [`ChannelRegistry`] hands out one shared channel per [`Identity`]. The
//! first request for an identity opens the device; later requests get the
//! same handle back. The registry keeps its own handle, so dropping every
//! other handle does not close the device. A channel is closed only through
//! [`ChannelRegistry::release`] or [`ChannelRegistry::release_unused`], which
//! take it out of the registry under the same lock `resolve` uses, so two
//! open channels never exist for one identity.
//!
//! The registry is an ordinary value. Tests build one over a temporary
//! directory with [`DevicePaths`]; applications usually build one for the
//! default paths and pass it by reference to whatever needs channels.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::channel::gpio::GPIO_ROOT;
use crate::channel::{AnyChannel, Channel, Identity, Medium, SharedChannel, SpiSettings};
use crate::config::ChannelDescriptor;
use crate::error::{Error, Result};

/// Roots of the device trees channels are opened under
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevicePaths {
    /// Directory holding `i2c-N` and `spidevB.C` nodes
    pub dev_root: PathBuf,
    /// sysfs GPIO class directory
    pub gpio_root: PathBuf,
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self {
            dev_root: PathBuf::from("/dev"),
            gpio_root: PathBuf::from(GPIO_ROOT),
        }
    }
}

/// Resolves identities to live, shared channels
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    paths: DevicePaths,
    spi: SpiSettings,
    live: Mutex<HashMap<Identity, SharedChannel>>,
}

impl ChannelRegistry {
    /// Registry over the standard `/dev` and sysfs paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry over custom device roots
    pub fn with_paths(paths: DevicePaths) -> Self {
        Self {
            paths,
            ..Self::default()
        }
    }

    /// Settings negotiated for SPI channels this registry opens
    #[must_use]
    pub fn with_spi_settings(mut self, spi: SpiSettings) -> Self {
        self.spi = spi;
        self
    }

    /// Device roots in use
    pub fn paths(&self) -> &DevicePaths {
        &self.paths
    }

    /// Return the live channel for `(medium, instance, device)`, opening it if needed
    ///
    /// Lookup, open and insertion happen under one lock, so concurrent first
    /// requests for the same identity still open the device once. A failed
    /// open leaves nothing behind.
    pub fn resolve(&self, medium: Medium, instance: u32, device: u32) -> Result<SharedChannel> {
        let identity = Identity::new(medium, instance, device);
        let mut live = self.live.lock().map_err(|_| Error::Poisoned)?;

        if let Some(channel) = live.get(&identity) {
            debug!("registry: reusing {identity}");
            return Ok(Arc::clone(channel));
        }

        let channel = AnyChannel::open(&self.paths, &self.spi, medium, instance, device)?;
        let shared = Arc::new(Mutex::new(channel));
        live.insert(identity, Arc::clone(&shared));
        debug!("registry: opened {identity}");
        Ok(shared)
    }

    /// [`resolve`](Self::resolve) for a configuration descriptor
    pub fn resolve_descriptor(&self, descriptor: &ChannelDescriptor) -> Result<SharedChannel> {
        self.resolve(descriptor.medium, descriptor.instance, descriptor.device)
    }

    /// Close the channel for `identity` and forget it
    ///
    /// Handles still held elsewhere report [`Error::Closed`] from then on.
    /// Returns `false` when no channel was registered for `identity`.
    pub fn release(&self, identity: Identity) -> Result<bool> {
        let mut live = self.live.lock().map_err(|_| Error::Poisoned)?;
        match live.remove(&identity) {
            Some(mut channel) => {
                // Closed before the lock is released so a racing resolve
                // opens the device only after this handle let go of it
                channel.close();
                debug!("registry: released {identity}");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close and forget every channel nobody outside the registry holds
    ///
    /// Returns the number of channels closed.
    pub fn release_unused(&self) -> usize {
        let Ok(mut live) = self.live.lock() else {
            return 0;
        };
        let unused: Vec<Identity> = live
            .iter()
            .filter(|(_, channel)| Arc::strong_count(channel) == 1)
            .map(|(identity, _)| *identity)
            .collect();
        for identity in &unused {
            if let Some(mut channel) = live.remove(identity) {
                channel.close();
                debug!("registry: released unused {identity}");
            }
        }
        unused.len()
    }

    /// Number of channels currently open through this registry
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}

//! sysfs GPIO channel
//!
//! Pins are driven through the legacy sysfs tree:
//!
//! ```text
//! <root>/export            write the pin number to create gpioN/
//! <root>/unexport          write the pin number to remove it
//! <root>/gpioN/direction   "in" | "out"
//! <root>/gpioN/value       ASCII "0" | "1"
//! <root>/gpioN/edge        "none" | "falling" | "rising" | "both"
//! ```
//!
//! Direction is switched lazily: a read after a write flips the pin to input,
//! a write after a read flips it back. Interrupt monitoring closes the value
//! handle and hands the node to a [`Monitor`] thread until the channel is
//! closed or [`GpioChannel::disable_interrupt`] is called.

use core::fmt;
use core::str::FromStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use log::{debug, warn};

use super::monitor::Monitor;
use super::{Channel, Identity, Medium};
use crate::error::{ConfigError, Error, Result};

/// Default sysfs GPIO root
pub const GPIO_ROOT: &str = "/sys/class/gpio";

/// Logic high as written to a value node
pub const HIGH: u8 = 1;
/// Logic low as written to a value node
pub const LOW: u8 = 0;

/// Pin direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Input
    In,
    /// Output
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Which transition an interrupt fires on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Edge {
    /// No interrupt
    #[default]
    None,
    /// High to low
    Falling,
    /// Low to high
    Rising,
    /// Either direction
    Both,
}

impl Edge {
    /// Literal written to the `edge` node
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Falling => "falling",
            Self::Rising => "rising",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edge {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "falling" => Ok(Self::Falling),
            "rising" => Ok(Self::Rising),
            "both" => Ok(Self::Both),
            other => Err(ConfigError::UnknownEdge(other.to_owned())),
        }
    }
}

/// One sysfs GPIO pin
pub struct GpioChannel {
    pin: u32,
    device: u32,
    root: PathBuf,
    base: PathBuf,
    value: Option<File>,
    direction: Option<Direction>,
    exported_here: bool,
    monitor: Option<Monitor>,
}

impl fmt::Debug for GpioChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpioChannel")
            .field("pin", &self.pin)
            .field("base", &self.base)
            .field("direction", &self.direction)
            .field("open", &self.value.is_some())
            .field("exported_here", &self.exported_here)
            .field("interrupt_active", &self.interrupt_active())
            .finish()
    }
}

impl GpioChannel {
    /// Export `pin` under `root` (if needed), make it an output and open its value node
    ///
    /// `device` is the bank number; it only takes part in the identity.
    /// If any step after exporting fails, the pin is unexported again.
    pub fn open(root: &Path, pin: u32, device: u32) -> Result<Self> {
        let base = root.join(format!("gpio{pin}"));
        let mut channel = Self {
            pin,
            device,
            root: root.to_path_buf(),
            base,
            value: None,
            direction: None,
            exported_here: false,
            monitor: None,
        };

        if channel.base.is_dir() {
            debug!("GPIO {pin}: already exported");
        } else {
            let export = channel.root.join("export");
            fs::write(&export, pin.to_string()).map_err(|source| Error::DeviceUnavailable {
                path: export,
                source,
            })?;
            channel.exported_here = true;
            debug!("GPIO {pin}: exported");
        }

        // `channel` drops on error, which unexports
        channel.set_direction(Direction::Out)?;
        channel.value = Some(channel.open_value()?);
        Ok(channel)
    }

    /// Pin number
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Direction last programmed, if any
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Whether an interrupt monitor is running
    pub fn interrupt_active(&self) -> bool {
        self.monitor.as_ref().is_some_and(Monitor::is_active)
    }

    /// Start watching the pin for `edge` transitions
    ///
    /// The pin is forced to input, the edge mode is programmed and the value
    /// handle is closed; plain reads and writes fail with [`Error::Closed`]
    /// until [`disable_interrupt`](Self::disable_interrupt) is called.
    /// `callback` runs on the monitor thread with the pin number for every
    /// debounced high-to-low transition.
    pub fn enable_interrupt<F>(&mut self, edge: Edge, callback: F) -> Result<()>
    where
        F: FnMut(u32) + Send + 'static,
    {
        self.start_monitor(edge, |pin, value_path| {
            Monitor::spawn(pin, value_path, callback)
        })
    }

    /// Program `edge` and start a monitor with `spawn`
    ///
    /// The value handle is only given up once the monitor is running, so a
    /// failure at any step leaves plain reads and writes working.
    fn start_monitor<S>(&mut self, edge: Edge, spawn: S) -> Result<()>
    where
        S: FnOnce(u32, PathBuf) -> io::Result<Monitor>,
    {
        if self.interrupt_active() {
            return Err(Error::InterruptActive(self.pin));
        }
        if self.value.is_none() && self.monitor.is_none() {
            return Err(Error::Closed(self.identity()));
        }
        // A monitor that exited on its own still needs joining
        self.stop_monitor();

        self.set_direction(Direction::In)?;
        fs::write(self.base.join("edge"), edge.as_str())
            .map_err(|source| Error::InterruptSetup { edge, source })?;

        let monitor = spawn(self.pin, self.base.join("value"))?;
        self.monitor = Some(monitor);
        self.value = None;
        debug!("GPIO {}: interrupt on {edge} edge enabled", self.pin);
        Ok(())
    }

    /// Like [`enable_interrupt`](Self::enable_interrupt), delivering pin numbers on a queue
    pub fn interrupt_events(&mut self, edge: Edge) -> Result<Receiver<u32>> {
        let (tx, rx) = mpsc::channel();
        self.enable_interrupt(edge, move |pin| {
            // The receiver may have been dropped; the pin keeps being watched
            let _ = tx.send(pin);
        })?;
        Ok(rx)
    }

    /// Stop the monitor, reset the edge mode and reopen the value handle
    pub fn disable_interrupt(&mut self) -> Result<()> {
        if self.monitor.is_none() {
            return Ok(());
        }
        self.stop_monitor();
        fs::write(self.base.join("edge"), Edge::None.as_str()).map_err(|source| {
            Error::InterruptSetup {
                edge: Edge::None,
                source,
            }
        })?;
        self.value = Some(self.open_value()?);
        Ok(())
    }

    fn stop_monitor(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
    }

    fn open_value(&self) -> Result<File> {
        let path = self.base.join("value");
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::DeviceUnavailable { path, source })
    }

    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        if self.direction == Some(direction) {
            return Ok(());
        }
        let path = self.base.join("direction");
        fs::write(&path, direction.as_str())
            .map_err(|source| Error::DeviceUnavailable { path, source })?;
        self.direction = Some(direction);
        debug!("GPIO {}: direction {}", self.pin, direction.as_str());
        Ok(())
    }

    fn value_handle(&mut self) -> Result<&mut File> {
        let identity = self.identity();
        self.value.as_mut().ok_or(Error::Closed(identity))
    }

    fn unexport(&mut self) {
        if !self.exported_here {
            return;
        }
        self.exported_here = false;
        let path = self.root.join("unexport");
        if let Err(err) = fs::write(&path, self.pin.to_string()) {
            warn!("GPIO {}: unexport failed: {err}", self.pin);
        } else {
            debug!("GPIO {}: unexported", self.pin);
        }
    }
}

impl Channel for GpioChannel {
    fn identity(&self) -> Identity {
        Identity::new(Medium::Gpio, self.pin, self.device)
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.value_handle()?;
        self.set_direction(Direction::In)?;
        let file = self.value_handle()?;
        file.seek(SeekFrom::Start(0))?;
        let mut level = [0u8; 1];
        let n = file.read(&mut level)?;
        if n != 1 {
            return Err(Error::TransferIncomplete {
                operation: "gpio read",
                expected: 1,
                actual: n,
            });
        }
        match level[0] {
            b'0' => Ok(LOW),
            b'1' => Ok(HIGH),
            other => Err(Error::InvalidLevel(other)),
        }
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        self.value_handle()?;
        self.set_direction(Direction::Out)?;
        let file = self.value_handle()?;
        file.seek(SeekFrom::Start(0))?;
        let level: &[u8] = if value == LOW { b"0" } else { b"1" };
        let n = file.write(level)?;
        if n != 1 {
            return Err(Error::TransferIncomplete {
                operation: "gpio write",
                expected: 1,
                actual: n,
            });
        }
        Ok(())
    }

    fn read_buffer(&mut self, buffer: &mut Vec<u8>) -> Result<usize> {
        buffer.push(self.read_byte()?);
        Ok(1)
    }

    /// Writes the first byte only; a pin holds one level at a time
    fn write_buffer(&mut self, buffer: &[u8]) -> Result<usize> {
        match buffer.first() {
            Some(&value) => self.write_byte(value).map(|()| 1),
            None => Ok(0),
        }
    }

    fn transfer(&mut self, _output: &[u8], _input: &mut [u8]) -> Result<usize> {
        Err(Error::Unsupported {
            medium: Medium::Gpio,
            operation: "transfer",
        })
    }

    /// Join the monitor first so it never sees a released pin
    fn close(&mut self) {
        self.stop_monitor();
        self.value = None;
        self.unexport();
    }
}

impl Drop for GpioChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fake_pin(root: &Path, pin: u32) -> PathBuf {
        let base = root.join(format!("gpio{pin}"));
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("direction"), "in").unwrap();
        fs::write(base.join("value"), "0\n").unwrap();
        fs::write(base.join("edge"), "none").unwrap();
        base
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_open_existing_pin_does_not_export() {
        let _ = env_logger::builder().is_test(true).try_init();
        let root = tempfile::tempdir().unwrap();
        let base = fake_pin(root.path(), 17);

        let gpio = GpioChannel::open(root.path(), 17, 0).unwrap();
        assert_eq!(gpio.direction(), Some(Direction::Out));
        assert_eq!(read(&base.join("direction")), "out");
        assert!(!root.path().join("export").exists());
        drop(gpio);
        assert!(!root.path().join("unexport").exists());
    }

    #[test]
    fn test_failed_open_unexports_pin() {
        let root = tempfile::tempdir().unwrap();

        // Export succeeds but no gpio23/ directory appears
        let result = GpioChannel::open(root.path(), 23, 0);
        assert!(matches!(result, Err(Error::DeviceUnavailable { .. })));
        assert_eq!(read(&root.path().join("export")), "23");
        assert_eq!(read(&root.path().join("unexport")), "23");
    }

    #[test]
    fn test_write_then_read_loops_back() {
        let root = tempfile::tempdir().unwrap();
        let base = fake_pin(root.path(), 5);
        let mut gpio = GpioChannel::open(root.path(), 5, 0).unwrap();

        gpio.write_byte(HIGH).unwrap();
        assert_eq!(read(&base.join("direction")), "out");
        assert_eq!(gpio.read_byte().unwrap(), HIGH);
        assert_eq!(read(&base.join("direction")), "in");

        gpio.write_byte(LOW).unwrap();
        assert_eq!(gpio.direction(), Some(Direction::Out));
        assert_eq!(gpio.read_byte().unwrap(), LOW);
    }

    #[test]
    fn test_buffer_ops_move_one_level() {
        let root = tempfile::tempdir().unwrap();
        fake_pin(root.path(), 6);
        let mut gpio = GpioChannel::open(root.path(), 6, 0).unwrap();

        assert_eq!(gpio.write_buffer(&[HIGH, LOW, LOW]).unwrap(), 1);
        assert_eq!(gpio.write_buffer(&[]).unwrap(), 0);
        let mut levels = Vec::new();
        assert_eq!(gpio.read_buffer(&mut levels).unwrap(), 1);
        assert_eq!(levels, [HIGH]);
        assert!(matches!(
            gpio.transfer(&[1], &mut [0]),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_close_twice_is_harmless() {
        let root = tempfile::tempdir().unwrap();
        let unexport = root.path().join("unexport");
        fake_pin(root.path(), 9);

        let mut gpio = GpioChannel::open(root.path(), 9, 0).unwrap();
        // The fake tree cannot create gpio9/ on export
        gpio.exported_here = true;

        gpio.close();
        assert_eq!(read(&unexport), "9");
        fs::write(&unexport, "").unwrap();

        gpio.close();
        drop(gpio);
        assert_eq!(read(&unexport), "");
    }

    #[test]
    fn test_closed_channel_rejects_io() {
        let root = tempfile::tempdir().unwrap();
        fake_pin(root.path(), 4);
        let mut gpio = GpioChannel::open(root.path(), 4, 0).unwrap();
        gpio.close();
        assert!(matches!(gpio.read_byte(), Err(Error::Closed(_))));
        assert!(matches!(gpio.write_byte(HIGH), Err(Error::Closed(_))));
    }

    #[test]
    fn test_enable_interrupt_programs_edge_and_joins_on_close() {
        let root = tempfile::tempdir().unwrap();
        let base = fake_pin(root.path(), 12);
        let mut gpio = GpioChannel::open(root.path(), 12, 0).unwrap();

        let events = gpio.interrupt_events(Edge::Falling).unwrap();
        assert!(gpio.interrupt_active());
        assert_eq!(read(&base.join("edge")), "falling");
        assert_eq!(read(&base.join("direction")), "in");
        assert!(matches!(gpio.read_byte(), Err(Error::Closed(_))));
        assert!(matches!(
            gpio.enable_interrupt(Edge::Both, |_| {}),
            Err(Error::InterruptActive(12))
        ));

        gpio.close();
        assert!(!gpio.interrupt_active());
        // Regular files never raise POLLPRI, so nothing was delivered
        assert!(events.recv_timeout(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_disable_interrupt_restores_plain_io() {
        let root = tempfile::tempdir().unwrap();
        let base = fake_pin(root.path(), 13);
        let mut gpio = GpioChannel::open(root.path(), 13, 0).unwrap();

        gpio.enable_interrupt(Edge::Rising, |_| {}).unwrap();
        gpio.disable_interrupt().unwrap();
        assert!(!gpio.interrupt_active());
        assert_eq!(read(&base.join("edge")), "none");
        assert_eq!(gpio.read_byte().unwrap(), LOW);
    }

    #[test]
    fn test_edge_without_node_is_interrupt_setup_failure() {
        let root = tempfile::tempdir().unwrap();
        let base = fake_pin(root.path(), 14);
        fs::remove_file(base.join("edge")).unwrap();
        fs::create_dir(base.join("edge")).unwrap();
        let mut gpio = GpioChannel::open(root.path(), 14, 0).unwrap();

        let result = gpio.enable_interrupt(Edge::Both, |_| {});
        assert!(matches!(
            result,
            Err(Error::InterruptSetup {
                edge: Edge::Both,
                ..
            })
        ));
        assert!(!gpio.interrupt_active());
    }

    #[test]
    fn test_failed_monitor_start_keeps_value_handle() {
        let root = tempfile::tempdir().unwrap();
        let base = fake_pin(root.path(), 15);
        let mut gpio = GpioChannel::open(root.path(), 15, 0).unwrap();

        let result = gpio.start_monitor(Edge::Falling, |_, _| {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        });
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!gpio.interrupt_active());
        assert_eq!(read(&base.join("edge")), "falling");

        // Plain I/O still works and a later enable can succeed
        gpio.write_byte(HIGH).unwrap();
        assert_eq!(gpio.read_byte().unwrap(), HIGH);
        gpio.enable_interrupt(Edge::Falling, |_| {}).unwrap();
        assert!(gpio.interrupt_active());
    }

    #[test]
    fn test_enable_interrupt_on_closed_channel_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        fake_pin(root.path(), 16);
        let mut gpio = GpioChannel::open(root.path(), 16, 0).unwrap();
        gpio.close();
        assert!(matches!(
            gpio.enable_interrupt(Edge::Both, |_| {}),
            Err(Error::Closed(_))
        ));
        assert!(!gpio.interrupt_active());
    }

    #[test]
    fn test_edge_parses_sysfs_literals() {
        for edge in [Edge::None, Edge::Falling, Edge::Rising, Edge::Both] {
            assert_eq!(edge.as_str().parse::<Edge>().unwrap(), edge);
        }
    }
}

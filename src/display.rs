//! Core display operations
//!
//! [`Display`] is the generic base: it validates the configuration, resolves
//! the data channel through a [`ChannelRegistry`] and hands everything else
//! to a [`Protocol`] strategy. Drawing calls are forwarded to the protocol;
//! operations a protocol does not provide have no effect.
//!
//! [`create_display`] picks the protocol from a [`DisplayKind`] and returns
//! an [`AnyDisplay`], or an error if anything along the way failed.

use core::fmt::{self, Write as _};
use core::str::FromStr;

use log::info;

use crate::channel::SharedChannel;
use crate::color::Color;
use crate::config::DisplayConfig;
use crate::error::{ConfigError, Result};
use crate::geometry::{Coordinate, Resolution};
use crate::registry::ChannelRegistry;
use crate::seps525::SharedSeps525;

/// Controller-specific behaviour plugged into [`Display`]
///
/// Only [`bring_up`](Protocol::bring_up) and [`reset`](Protocol::reset) are
/// required. Every drawing operation defaults to doing nothing.
pub trait Protocol: Sized {
    /// Short name used in logs
    const NAME: &'static str;

    /// Build and initialise the driver
    ///
    /// `primary` is the already-resolved data channel. Any further channels
    /// the protocol needs are resolved through `registry`. On error nothing
    /// is returned and every channel acquired so far is released.
    fn bring_up(
        primary: SharedChannel,
        config: &DisplayConfig,
        resolution: Resolution,
        registry: &ChannelRegistry,
    ) -> Result<Self>;

    /// Reset the controller
    fn reset(&mut self) -> Result<()>;

    /// Fill the panel with one colour
    fn clear_screen(&mut self, _color: Color) -> Result<()> {
        Ok(())
    }

    /// Set one pixel (1-based)
    fn set_pixel(&mut self, _coord: Coordinate, _color: Color) -> Result<()> {
        Ok(())
    }

    /// Draw a line between two 1-based coordinates
    fn draw_line(&mut self, _start: Coordinate, _end: Coordinate, _color: Color) -> Result<()> {
        Ok(())
    }

    /// Outline a rectangle
    fn draw_rectangle(
        &mut self,
        _top_left: Coordinate,
        _bottom_right: Coordinate,
        _thickness: u8,
        _color: Color,
    ) -> Result<()> {
        Ok(())
    }

    /// Fill a rectangle
    fn fill_rectangle(
        &mut self,
        _top_left: Coordinate,
        _bottom_right: Coordinate,
        _color: Color,
    ) -> Result<()> {
        Ok(())
    }

    /// Render text at the cursor
    fn print(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    /// Render text followed by a line break
    fn print_line(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Generic display driver
///
/// Construct with [`Display::initialize`] to go through configuration
/// checks and channel resolution, or [`Display::new`] to wrap a protocol
/// that was set up by hand.
pub struct Display<P> {
    /// Protocol strategy
    protocol: P,
    /// Panel size
    resolution: Resolution,
}

impl<P: Protocol> Display<P> {
    /// Validate `config`, resolve the data channel and bring the panel up
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingChannels`] / [`ConfigError::MissingResolution`]
    ///   before any device is touched
    /// - any channel open failure from the registry
    /// - any bring-up failure from the protocol
    ///
    /// ## Example
    ///
    /// ```rust,no_run
    /// use boardlink::{Builder, ChannelRegistry, Color, Display, Medium, SharedSeps525};
    ///
    /// # fn main() -> boardlink::Result<()> {
    /// let registry = ChannelRegistry::new();
    /// let config = Builder::new()
    ///     .channel(Medium::Spi, 0, 0)
    ///     .named_channel("RS", Medium::Gpio, 24, 0)
    ///     .named_channel("RESET", Medium::Gpio, 25, 0)
    ///     .resolution(160, 128)
    ///     .build();
    ///
    /// let mut display = Display::<SharedSeps525>::initialize(&config, &registry)?;
    /// display.clear_screen(Color::BLACK)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn initialize(config: &DisplayConfig, registry: &ChannelRegistry) -> Result<Self> {
        let primary = config.primary()?;
        let resolution = config.resolution()?;
        let channel = registry.resolve_descriptor(primary)?;
        let protocol = P::bring_up(channel, config, resolution, registry)?;
        info!(
            "{} display initialised at {}x{}",
            P::NAME,
            resolution.width,
            resolution.height
        );
        Ok(Self::new(protocol, resolution))
    }

    /// Wrap a protocol that is already set up
    pub fn new(protocol: P, resolution: Resolution) -> Self {
        Self {
            protocol,
            resolution,
        }
    }

    /// Panel size
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Borrow the protocol driver
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Mutably borrow the protocol driver
    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    /// Reset the controller
    pub fn reset(&mut self) -> Result<()> {
        self.protocol.reset()
    }

    /// Fill the panel with `color`
    pub fn clear_screen(&mut self, color: Color) -> Result<()> {
        self.protocol.clear_screen(color)
    }

    /// Set the pixel at 1-based `coord`
    pub fn set_pixel(&mut self, coord: Coordinate, color: Color) -> Result<()> {
        self.protocol.set_pixel(coord, color)
    }

    /// Draw a line from `start` to `end`
    pub fn draw_line(&mut self, start: Coordinate, end: Coordinate, color: Color) -> Result<()> {
        self.protocol.draw_line(start, end, color)
    }

    /// Outline a rectangle
    pub fn draw_rectangle(
        &mut self,
        top_left: Coordinate,
        bottom_right: Coordinate,
        thickness: u8,
        color: Color,
    ) -> Result<()> {
        self.protocol
            .draw_rectangle(top_left, bottom_right, thickness, color)
    }

    /// Fill a rectangle
    pub fn fill_rectangle(
        &mut self,
        top_left: Coordinate,
        bottom_right: Coordinate,
        color: Color,
    ) -> Result<()> {
        self.protocol.fill_rectangle(top_left, bottom_right, color)
    }

    /// Render text
    pub fn print(&mut self, text: &str) -> Result<()> {
        self.protocol.print(text)
    }

    /// Render text and a line break
    pub fn print_line(&mut self, text: &str) -> Result<()> {
        self.protocol.print_line(text)
    }

    /// Render formatted text, as produced by `format_args!`
    pub fn print_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        match args.as_str() {
            Some(text) => self.protocol.print(text),
            None => {
                let mut text = String::new();
                // Writing into a String cannot fail
                let _ = text.write_fmt(args);
                self.protocol.print(&text)
            }
        }
    }
}

/// Supported display controllers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayKind {
    /// SEPS525 160x128 colour OLED
    Seps525,
}

impl DisplayKind {
    /// Canonical tag
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seps525 => "seps525",
        }
    }
}

impl fmt::Display for DisplayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayKind {
    type Err = ConfigError;

    /// Accepts `seps525` and the legacy spelling `sesp525`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seps525" | "sesp525" => Ok(Self::Seps525),
            other => Err(ConfigError::UnknownDisplay(other.to_owned())),
        }
    }
}

/// Closed set of display drivers
pub enum AnyDisplay {
    /// SEPS525 colour OLED
    Seps525(Display<SharedSeps525>),
}

impl AnyDisplay {
    /// Which controller this is
    pub fn kind(&self) -> DisplayKind {
        match self {
            Self::Seps525(_) => DisplayKind::Seps525,
        }
    }

    /// Panel size
    pub fn resolution(&self) -> Resolution {
        match self {
            Self::Seps525(display) => display.resolution(),
        }
    }

    /// Reset the controller
    pub fn reset(&mut self) -> Result<()> {
        match self {
            Self::Seps525(display) => display.reset(),
        }
    }

    /// Fill the panel with `color`
    pub fn clear_screen(&mut self, color: Color) -> Result<()> {
        match self {
            Self::Seps525(display) => display.clear_screen(color),
        }
    }

    /// Set the pixel at 1-based `coord`
    pub fn set_pixel(&mut self, coord: Coordinate, color: Color) -> Result<()> {
        match self {
            Self::Seps525(display) => display.set_pixel(coord, color),
        }
    }

    /// Draw a line from `start` to `end`
    pub fn draw_line(&mut self, start: Coordinate, end: Coordinate, color: Color) -> Result<()> {
        match self {
            Self::Seps525(display) => display.draw_line(start, end, color),
        }
    }
}

/// Build and initialise a display of `kind`
///
/// Either a fully brought-up display is returned or an error; a display
/// that failed part-way is dropped along with its channels.
pub fn create_display(
    kind: DisplayKind,
    config: &DisplayConfig,
    registry: &ChannelRegistry,
) -> Result<AnyDisplay> {
    match kind {
        DisplayKind::Seps525 => Display::initialize(config, registry).map(AnyDisplay::Seps525),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, Medium};
    use crate::config::Builder;
    use crate::error::Error;
    use crate::registry::DevicePaths;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Protocol that records calls and keeps the defaults for everything else
    struct MockProtocol {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Protocol for MockProtocol {
        const NAME: &'static str = "mock";

        fn bring_up(
            mut primary: SharedChannel,
            _config: &DisplayConfig,
            _resolution: Resolution,
            _registry: &ChannelRegistry,
        ) -> Result<Self> {
            primary.write_byte(0xA5)?;
            Ok(Self {
                calls: Arc::default(),
            })
        }

        fn reset(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push("reset".into());
            Ok(())
        }

        fn print(&mut self, text: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("print {text}"));
            Ok(())
        }
    }

    fn fake_gpio_tree(pins: &[u32]) -> (tempfile::TempDir, ChannelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let paths = DevicePaths {
            dev_root: dir.path().join("dev"),
            gpio_root: dir.path().join("gpio"),
        };
        fs::create_dir_all(&paths.dev_root).unwrap();
        for pin in pins {
            let base = paths.gpio_root.join(format!("gpio{pin}"));
            fs::create_dir_all(&base).unwrap();
            fs::write(base.join("direction"), "in").unwrap();
            fs::write(base.join("value"), "0").unwrap();
        }
        (dir, ChannelRegistry::with_paths(paths))
    }

    fn value_of(gpio_root: &Path, pin: u32) -> String {
        fs::read_to_string(gpio_root.join(format!("gpio{pin}/value"))).unwrap()
    }

    #[test]
    fn test_initialize_requires_channels_before_touching_devices() {
        let (_dir, registry) = fake_gpio_tree(&[]);
        let config = Builder::new().resolution(160, 128).build();
        let result = Display::<MockProtocol>::initialize(&config, &registry);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingChannels))
        ));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_initialize_requires_resolution() {
        let (_dir, registry) = fake_gpio_tree(&[1]);
        let config = Builder::new().channel(Medium::Gpio, 1, 0).build();
        let result = Display::<MockProtocol>::initialize(&config, &registry);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingResolution))
        ));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_initialize_fails_when_primary_cannot_open() {
        let (_dir, registry) = fake_gpio_tree(&[]);
        let config = Builder::new()
            .channel(Medium::I2c, 3, 0x3c)
            .resolution(160, 128)
            .build();
        let result = Display::<MockProtocol>::initialize(&config, &registry);
        assert!(matches!(result, Err(Error::DeviceUnavailable { .. })));
    }

    #[test]
    fn test_base_operations_default_to_no_effect() {
        let (dir, registry) = fake_gpio_tree(&[2]);
        let config = Builder::new()
            .channel(Medium::Gpio, 2, 0)
            .resolution(16, 16)
            .build();
        let mut display = Display::<MockProtocol>::initialize(&config, &registry).unwrap();
        assert_eq!(value_of(&dir.path().join("gpio"), 2), "1");

        display.clear_screen(Color::WHITE).unwrap();
        display
            .set_pixel(Coordinate::ORIGIN, Color::WHITE)
            .unwrap();
        display
            .draw_line(Coordinate::ORIGIN, Coordinate::new(4, 4), Color::RED)
            .unwrap();
        display
            .fill_rectangle(Coordinate::ORIGIN, Coordinate::new(4, 4), Color::RED)
            .unwrap();
        display.reset().unwrap();
        display.print_fmt(format_args!("{}x{}", 16, 16)).unwrap();

        let calls = display.protocol().calls.lock().unwrap().clone();
        assert_eq!(calls, ["reset", "print 16x16"]);
    }

    #[test]
    fn test_display_kind_accepts_both_spellings() {
        assert_eq!("sesp525".parse::<DisplayKind>().unwrap(), DisplayKind::Seps525);
        assert_eq!("seps525".parse::<DisplayKind>().unwrap(), DisplayKind::Seps525);
        assert!(matches!(
            "ssd1306".parse::<DisplayKind>(),
            Err(ConfigError::UnknownDisplay(_))
        ));
    }

    #[test]
    fn test_create_display_drives_gpio_wired_panel() {
        let _ = env_logger::builder().is_test(true).try_init();
        // Data, RS and RESET all on GPIO lines of the fake tree
        let (dir, registry) = fake_gpio_tree(&[5, 6, 7]);
        let config = Builder::new()
            .channel(Medium::Gpio, 5, 0)
            .named_channel("RS", Medium::Gpio, 6, 0)
            .named_channel("RESET", Medium::Gpio, 7, 0)
            .resolution(4, 4)
            .build();

        let mut display = create_display(DisplayKind::Seps525, &config, &registry).unwrap();
        assert_eq!(display.kind(), DisplayKind::Seps525);
        assert_eq!(display.resolution(), Resolution::new(4, 4).unwrap());
        assert_eq!(registry.live_count(), 3);

        let gpio_root = dir.path().join("gpio");
        // Display-on was the last register write: RS high, value 1
        assert_eq!(value_of(&gpio_root, 6), "1");
        assert_eq!(value_of(&gpio_root, 5), "1");
        assert_eq!(value_of(&gpio_root, 7), "1");

        display.reset().unwrap();
        assert_eq!(value_of(&gpio_root, 7), "1");

        drop(display);
        assert_eq!(registry.release_unused(), 3);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_create_display_without_rs_fails_and_releases_channels() {
        let (_dir, registry) = fake_gpio_tree(&[5, 7]);
        let config = Builder::new()
            .channel(Medium::Gpio, 5, 0)
            .named_channel("RESET", Medium::Gpio, 7, 0)
            .resolution(4, 4)
            .build();

        let result = create_display(DisplayKind::Seps525, &config, &registry);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingRole("RS")))
        ));
        // Only the registry still holds the primary channel
        assert_eq!(registry.release_unused(), 1);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_create_display_needs_two_channels() {
        let (_dir, registry) = fake_gpio_tree(&[5]);
        let config = Builder::new()
            .channel(Medium::Gpio, 5, 0)
            .resolution(4, 4)
            .build();

        let result = create_display(DisplayKind::Seps525, &config, &registry);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::TooFewChannels {
                required: 2,
                provided: 1
            }))
        ));
    }
}

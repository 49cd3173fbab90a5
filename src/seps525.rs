//! SEPS525 colour OLED driver
//!
//! The controller is written through a [`RegisterInterface`]: a data channel
//! plus an RS line, and optionally a RESET line. Pixels are 18-bit, sent as
//! three bytes (red, green, blue) with the low six bits of each significant.
//!
//! ## Bring-up
//!
//! 1. Drive RESET high, if wired
//! 2. Pulse `REDUCE_CURRENT` on then off, 1 ms apart
//! 3. Display off, wait 1 ms
//! 4. Write the [`Seps525Settings`] registers in order
//! 5. Select the full frame, cursor to the origin
//! 6. Display on, wait 1 ms
//!
//! With [`InitPolicy::Strict`] the first failed write aborts bring-up; with
//! [`InitPolicy::BestEffort`] it is logged and the sequence continues.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use serde::Deserialize;

use crate::channel::{Medium, SharedChannel};
use crate::color::Color;
use crate::config::{DisplayConfig, InitPolicy};
use crate::display::Protocol;
use crate::error::{ConfigError, Error, Result};
use crate::geometry::{Coordinate, Resolution};
use crate::interface::{Interface, RegisterInterface, StdDelay};
use crate::register;
use crate::registry::ChannelRegistry;

/// Role name of the register-select line
pub const RS_ROLE: &str = "RS";
/// Role name of the reset line
pub const RESET_ROLE: &str = "RESET";

/// Largest panel the 8-bit window registers can address
pub const MAX_DIMENSION: u16 = 256;

/// Channels the driver needs: data plus RS
pub const MIN_CHANNELS: usize = 2;

/// Settle time after the power and on/off register writes
const SETTLE_MS: u32 = 1;

/// Register values written during bring-up
///
/// Defaults suit a 160x128 panel at 90 Hz with 18-bit colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Seps525Settings {
    /// `OSC_CTL`: 1 = internal oscillator with external resistor
    pub oscillator: u8,
    /// `CLOCK_DIV`: divider and oscillator frequency
    pub clock_div: u8,
    /// `DUTY`: duty ratio
    pub duty: u8,
    /// `DSL`: display start line
    pub start_line: u8,
    /// `RGB_IF`: interface selection
    pub rgb_interface: u8,
    /// `RGB_POL`: interface polarity
    pub rgb_polarity: u8,
    /// `MEMORY_WRITE_MODE`: triple transfer, 262K colours, horizontal writes
    pub memory_write_mode: u8,
    /// `DRIVING_CURRENT_R/G/B` in microamps
    pub driving_current: [u8; 3],
    /// `PRECHARGE_TIME_R/G/B` in clocks
    pub precharge_time: [u8; 3],
    /// `PRECHARGE_CURRENT_R/G/B`
    pub precharge_current: [u8; 3],
    /// `IREF`: 0 = reference from external resistor
    pub iref: u8,
    /// `DISPLAY_MODE`
    pub display_mode: u8,
}

impl Default for Seps525Settings {
    fn default() -> Self {
        Self {
            oscillator: 0x01,
            // 90 Hz frame rate
            clock_div: 0x30,
            duty: 0x7F,
            start_line: 0x00,
            rgb_interface: 0x01,
            rgb_polarity: 0x00,
            memory_write_mode: 0x76,
            driving_current: [0x45, 0x34, 0x33],
            precharge_time: [0x04, 0x05, 0x05],
            precharge_current: [0x9D, 0x8C, 0x57],
            iref: 0x00,
            display_mode: 0x00,
        }
    }
}

impl Seps525Settings {
    /// `(register, value)` pairs in bring-up order
    pub fn registers(&self) -> [(u8, u8); 18] {
        let [drive_r, drive_g, drive_b] = self.driving_current;
        let [time_r, time_g, time_b] = self.precharge_time;
        let [current_r, current_g, current_b] = self.precharge_current;
        [
            (register::OSC_CTL, self.oscillator),
            (register::CLOCK_DIV, self.clock_div),
            (register::DUTY, self.duty),
            (register::DSL, self.start_line),
            (register::RGB_IF, self.rgb_interface),
            (register::RGB_POL, self.rgb_polarity),
            (register::MEMORY_WRITE_MODE, self.memory_write_mode),
            (register::DRIVING_CURRENT_R, drive_r),
            (register::DRIVING_CURRENT_G, drive_g),
            (register::DRIVING_CURRENT_B, drive_b),
            (register::PRECHARGE_TIME_R, time_r),
            (register::PRECHARGE_TIME_G, time_g),
            (register::PRECHARGE_TIME_B, time_b),
            (register::PRECHARGE_CURRENT_R, current_r),
            (register::PRECHARGE_CURRENT_G, current_g),
            (register::PRECHARGE_CURRENT_B, current_b),
            (register::IREF, self.iref),
            (register::DISPLAY_MODE, self.display_mode),
        ]
    }
}

/// SEPS525 driver over a register interface
pub struct Seps525<I, D = StdDelay> {
    interface: I,
    delay: D,
    resolution: Resolution,
    settings: Seps525Settings,
    policy: InitPolicy,
}

/// The driver as wired by [`Display::initialize`](crate::Display::initialize)
pub type SharedSeps525 = Seps525<Interface<SharedChannel, SharedChannel>>;

impl<I, D> Seps525<I, D>
where
    I: RegisterInterface,
    D: DelayNs,
{
    /// Wrap an interface without touching the controller
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidResolution`] when either side exceeds
    /// [`MAX_DIMENSION`].
    pub fn new(
        interface: I,
        delay: D,
        resolution: Resolution,
        settings: Seps525Settings,
        policy: InitPolicy,
    ) -> Result<Self> {
        if resolution.width > MAX_DIMENSION || resolution.height > MAX_DIMENSION {
            return Err(ConfigError::InvalidResolution {
                x: resolution.width,
                y: resolution.height,
            }
            .into());
        }
        Ok(Self {
            interface,
            delay,
            resolution,
            settings,
            policy,
        })
    }

    /// Run the bring-up sequence
    pub fn init(&mut self) -> Result<()> {
        let policy = self.policy;

        tolerate(policy, self.interface.release_reset())?;

        tolerate(policy, self.interface.write_register(register::REDUCE_CURRENT, 1))?;
        self.delay.delay_ms(SETTLE_MS);
        tolerate(policy, self.interface.write_register(register::REDUCE_CURRENT, 0))?;

        tolerate(policy, self.interface.write_register(register::DISP_ON_OFF, 0))?;
        self.delay.delay_ms(SETTLE_MS);

        for (reg, value) in self.settings.registers() {
            tolerate(policy, self.interface.write_register(reg, value))?;
        }

        tolerate(policy, self.select_full_frame())?;
        tolerate(policy, self.set_position(0, 0))?;

        tolerate(policy, self.interface.write_register(register::DISP_ON_OFF, 1))?;
        self.delay.delay_ms(SETTLE_MS);

        info!(
            "SEPS525 {}x{} ready",
            self.resolution.width, self.resolution.height
        );
        Ok(())
    }

    /// Panel resolution
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Release the interface
    pub fn release(self) -> I {
        self.interface
    }

    /// Select a 0-based, inclusive addressing window
    fn select_window(&mut self, x1: u8, x2: u8, y1: u8, y2: u8) -> Result<()> {
        self.interface.write_register(register::MX1_ADDR, x1)?;
        self.interface.write_register(register::MX2_ADDR, x2)?;
        self.interface.write_register(register::MY1_ADDR, y1)?;
        self.interface.write_register(register::MY2_ADDR, y2)
    }

    fn select_full_frame(&mut self) -> Result<()> {
        // Bounded by MAX_DIMENSION in `new`
        let last_x = (self.resolution.width - 1) as u8;
        let last_y = (self.resolution.height - 1) as u8;
        self.select_window(0, last_x, 0, last_y)
    }

    /// Move the write cursor to 0-based `(x, y)`
    fn set_position(&mut self, x: u8, y: u8) -> Result<()> {
        self.interface
            .write_register(register::MEMORY_ACCESS_POINTER_X, x)?;
        self.interface
            .write_register(register::MEMORY_ACCESS_POINTER_Y, y)
    }

    fn write_data_start(&mut self) -> Result<()> {
        self.interface.write_command(register::DDRAM_DATA_ACCESS_PORT)
    }

    fn write_pixel(&mut self, color: Color) -> Result<()> {
        self.interface.write_data(&color.masked())
    }

    /// Fill the panel with `color`
    ///
    /// One window select and one cursor move, then width x height pixels.
    pub fn clear_screen(&mut self, color: Color) -> Result<()> {
        self.select_full_frame()?;
        self.set_position(0, 0)?;
        self.write_data_start()?;
        for _ in 0..self.resolution.pixel_count() {
            self.write_pixel(color)?;
        }
        Ok(())
    }

    /// Set one pixel at a 1-based coordinate
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] for coordinates off the panel.
    pub fn set_pixel(&mut self, coord: Coordinate, color: Color) -> Result<()> {
        if !self.resolution.contains(coord) {
            return Err(Error::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: self.resolution.width,
                height: self.resolution.height,
            });
        }
        let (x, y) = (coord.x - 1, coord.y - 1);
        self.select_window(x, x, y, y)?;
        self.set_position(x, y)?;
        self.write_data_start()?;
        self.write_pixel(color)
    }

    /// Rasterise a line between two 1-based coordinates
    ///
    /// Endpoints are ordered so both axes run upwards, clamped to the panel,
    /// and the far end is exclusive. An axis whose endpoints coincide is
    /// widened by one so the line is at least one pixel thick.
    pub fn draw_line(&mut self, start: Coordinate, end: Coordinate, color: Color) -> Result<()> {
        let width = i32::from(self.resolution.width);
        let height = i32::from(self.resolution.height);
        let clamp_x = |v: u8| i32::from(v).clamp(1, width);
        let clamp_y = |v: u8| i32::from(v).clamp(1, height);

        let (x1, x2) = ordered(clamp_x(start.x), clamp_x(end.x));
        let (y1, y2) = ordered(clamp_y(start.y), clamp_y(end.y));
        let (dx, dy) = (x2 - x1, y2 - y1);
        let x_end = if dx == 0 { x2 + 1 } else { x2 };
        let y_end = if dy == 0 { y2 + 1 } else { y2 };

        let mut plotted = 0usize;
        if dx >= dy {
            let mut y = y1;
            let mut error = 0;
            for x in x1..x_end {
                self.set_pixel(Coordinate::new(x as u8, y as u8), color)?;
                plotted += 1;
                error += dy;
                if 2 * error >= dx && y + 1 < y_end {
                    y += 1;
                    error -= dx;
                }
            }
        } else {
            let mut x = x1;
            let mut error = 0;
            for y in y1..y_end {
                self.set_pixel(Coordinate::new(x as u8, y as u8), color)?;
                plotted += 1;
                error += dx;
                if 2 * error >= dy && x + 1 < x_end {
                    x += 1;
                    error -= dy;
                }
            }
        }
        debug!("SEPS525 line ({x1},{y1})-({x2},{y2}): {plotted} pixels");
        Ok(())
    }

    /// Pulse RESET, or issue a soft reset when no RESET line is wired
    pub fn reset(&mut self) -> Result<()> {
        if self.interface.hardware_reset(&mut self.delay)? {
            return Ok(());
        }
        self.interface.write_register(register::SOFT_RESET, 1)
    }
}

/// Swallow a failed bring-up step under [`InitPolicy::BestEffort`]
fn tolerate(policy: InitPolicy, result: Result<()>) -> Result<()> {
    match result {
        Err(err) if policy == InitPolicy::BestEffort => {
            warn!("SEPS525 bring-up step failed, continuing: {err}");
            Ok(())
        }
        other => other,
    }
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Protocol for SharedSeps525 {
    const NAME: &'static str = "seps525";

    fn bring_up(
        primary: SharedChannel,
        config: &DisplayConfig,
        resolution: Resolution,
        registry: &ChannelRegistry,
    ) -> Result<Self> {
        if config.channels.len() < MIN_CHANNELS {
            return Err(ConfigError::TooFewChannels {
                required: MIN_CHANNELS,
                provided: config.channels.len(),
            }
            .into());
        }
        let rs = config
            .find(RS_ROLE)
            .ok_or(ConfigError::MissingRole(RS_ROLE))?;
        // Role lines are always GPIO, whatever medium the descriptor names
        let rs = registry.resolve(Medium::Gpio, rs.instance, rs.device)?;
        let reset = config
            .find(RESET_ROLE)
            .map(|reset| registry.resolve(Medium::Gpio, reset.instance, reset.device))
            .transpose()?;
        debug!(
            "SEPS525: RS wired, RESET {}",
            if reset.is_some() { "wired" } else { "absent" }
        );

        let interface = Interface::new(primary, rs, reset);
        let mut driver = Seps525::new(
            interface,
            StdDelay,
            resolution,
            config.seps525,
            config.init_policy,
        )?;
        driver.init()?;
        Ok(driver)
    }

    fn reset(&mut self) -> Result<()> {
        Seps525::reset(self)
    }

    fn clear_screen(&mut self, color: Color) -> Result<()> {
        Seps525::clear_screen(self, color)
    }

    fn set_pixel(&mut self, coord: Coordinate, color: Color) -> Result<()> {
        Seps525::set_pixel(self, coord, color)
    }

    fn draw_line(&mut self, start: Coordinate, end: Coordinate, color: Color) -> Result<()> {
        Seps525::draw_line(self, start, end, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::tests::{Event, Log, LogDelay, Recorder, data_bytes};
    use std::sync::Arc;

    type TestDriver = Seps525<Interface<Recorder, Recorder>, LogDelay>;

    fn driver(log: &Log, width: u16, height: u16, reset: bool) -> TestDriver {
        let interface = Interface::new(
            Recorder::data(log),
            Recorder::rs(log),
            reset.then(|| Recorder::reset(log)),
        );
        Seps525::new(
            interface,
            LogDelay(Arc::clone(log)),
            Resolution::new(width, height).unwrap(),
            Seps525Settings::default(),
            InitPolicy::Strict,
        )
        .unwrap()
    }

    /// Register writes as (register, value) pairs, with pixel data left out
    fn register_pairs(log: &Log) -> Vec<(u8, u8)> {
        data_bytes(log)
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }

    #[test]
    fn test_bring_up_sequence() {
        let _ = env_logger::builder().is_test(true).try_init();
        let log = Log::default();
        let mut display = driver(&log, 160, 128, true);
        display.init().unwrap();

        let events = log.lock().unwrap().clone();
        assert_eq!(events[0], Event::Reset(1));

        let pairs = register_pairs(&log);
        let mut expected = vec![
            (register::REDUCE_CURRENT, 1),
            (register::REDUCE_CURRENT, 0),
            (register::DISP_ON_OFF, 0),
        ];
        expected.extend(Seps525Settings::default().registers());
        expected.extend([
            (register::MX1_ADDR, 0),
            (register::MX2_ADDR, 159),
            (register::MY1_ADDR, 0),
            (register::MY2_ADDR, 127),
            (register::MEMORY_ACCESS_POINTER_X, 0),
            (register::MEMORY_ACCESS_POINTER_Y, 0),
            (register::DISP_ON_OFF, 1),
        ]);
        assert_eq!(pairs, expected);

        let delays = events
            .iter()
            .filter(|event| matches!(event, Event::DelayNs(1_000_000)))
            .count();
        assert_eq!(delays, 3);
    }

    #[test]
    fn test_precharge_time_and_current_are_distinct_registers() {
        let registers: Vec<u8> = Seps525Settings::default()
            .registers()
            .iter()
            .map(|(reg, _)| *reg)
            .collect();
        for reg in [
            register::PRECHARGE_TIME_R,
            register::PRECHARGE_TIME_G,
            register::PRECHARGE_TIME_B,
            register::PRECHARGE_CURRENT_R,
            register::PRECHARGE_CURRENT_G,
            register::PRECHARGE_CURRENT_B,
        ] {
            assert_eq!(registers.iter().filter(|&&r| r == reg).count(), 1);
        }
    }

    #[test]
    fn test_strict_init_stops_at_first_failure() {
        let log = Log::default();
        let interface = Interface::new(
            Recorder::data(&log).failing_on(register::OSC_CTL),
            Recorder::rs(&log),
            None,
        );
        let mut display = Seps525::new(
            interface,
            LogDelay(Arc::clone(&log)),
            Resolution::new(160, 128).unwrap(),
            Seps525Settings::default(),
            InitPolicy::Strict,
        )
        .unwrap();

        assert!(display.init().is_err());
        assert!(!data_bytes(&log).contains(&register::CLOCK_DIV));
    }

    #[test]
    fn test_best_effort_init_continues_past_failure() {
        let log = Log::default();
        let interface = Interface::new(
            Recorder::data(&log).failing_on(register::OSC_CTL),
            Recorder::rs(&log),
            None,
        );
        let mut display = Seps525::new(
            interface,
            LogDelay(Arc::clone(&log)),
            Resolution::new(160, 128).unwrap(),
            Seps525Settings::default(),
            InitPolicy::BestEffort,
        )
        .unwrap();

        display.init().unwrap();
        let bytes = data_bytes(&log);
        assert!(bytes.ends_with(&[register::DISP_ON_OFF, 1]));
        assert!(bytes.contains(&register::CLOCK_DIV));
    }

    #[test]
    fn test_clear_screen_streams_every_pixel_once() {
        let log = Log::default();
        let mut display = driver(&log, 4, 3, false);
        display.clear_screen(Color::new(0xFF, 0x80, 0x41)).unwrap();

        let bytes = data_bytes(&log);
        let header = [
            register::MX1_ADDR,
            0,
            register::MX2_ADDR,
            3,
            register::MY1_ADDR,
            0,
            register::MY2_ADDR,
            2,
            register::MEMORY_ACCESS_POINTER_X,
            0,
            register::MEMORY_ACCESS_POINTER_Y,
            0,
            register::DDRAM_DATA_ACCESS_PORT,
        ];
        assert_eq!(&bytes[..header.len()], header);

        let pixels = &bytes[header.len()..];
        assert_eq!(pixels.len(), 4 * 3 * 3);
        assert!(pixels.chunks(3).all(|rgb| rgb == [0x3F, 0x00, 0x01]));
    }

    #[test]
    fn test_set_pixel_converts_to_zero_based_window() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, false);
        display
            .set_pixel(Coordinate::new(10, 20), Color::WHITE)
            .unwrap();

        assert_eq!(
            data_bytes(&log),
            [
                register::MX1_ADDR,
                9,
                register::MX2_ADDR,
                9,
                register::MY1_ADDR,
                19,
                register::MY2_ADDR,
                19,
                register::MEMORY_ACCESS_POINTER_X,
                9,
                register::MEMORY_ACCESS_POINTER_Y,
                19,
                register::DDRAM_DATA_ACCESS_PORT,
                0x3F,
                0x3F,
                0x3F,
            ]
        );
    }

    #[test]
    fn test_set_pixel_off_panel_is_rejected() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, false);
        assert!(matches!(
            display.set_pixel(Coordinate::new(0, 1), Color::RED),
            Err(Error::OutOfBounds { x: 0, .. })
        ));
        assert!(matches!(
            display.set_pixel(Coordinate::new(161, 1), Color::RED),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    /// Pixel positions written by `draw_line`, 1-based
    fn plotted(log: &Log) -> Vec<(u8, u8)> {
        // Each pixel is 8 register bytes + data-start + 3 colour bytes
        data_bytes(log)
            .chunks(16)
            .map(|pixel| (pixel[1] + 1, pixel[5] + 1))
            .collect()
    }

    #[test]
    fn test_horizontal_line_excludes_far_end() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, false);
        display
            .draw_line(Coordinate::new(1, 1), Coordinate::new(5, 1), Color::RED)
            .unwrap();
        assert_eq!(plotted(&log), [(1, 1), (2, 1), (3, 1), (4, 1)]);
    }

    #[test]
    fn test_vertical_line_is_one_pixel_wide() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, false);
        display
            .draw_line(Coordinate::new(3, 4), Coordinate::new(3, 1), Color::RED)
            .unwrap();
        assert_eq!(plotted(&log), [(3, 1), (3, 2), (3, 3)]);
    }

    #[test]
    fn test_single_point_line_plots_one_pixel() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, false);
        display
            .draw_line(Coordinate::new(7, 7), Coordinate::new(7, 7), Color::RED)
            .unwrap();
        assert_eq!(plotted(&log), [(7, 7)]);
    }

    #[test]
    fn test_diagonal_line_steps_both_axes() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, false);
        display
            .draw_line(Coordinate::new(1, 1), Coordinate::new(5, 5), Color::RED)
            .unwrap();
        assert_eq!(plotted(&log), [(1, 1), (2, 2), (3, 3), (4, 4)]);
    }

    #[test]
    fn test_line_is_clamped_to_width() {
        let log = Log::default();
        let mut display = driver(&log, 8, 8, false);
        display
            .draw_line(Coordinate::new(6, 2), Coordinate::new(200, 2), Color::RED)
            .unwrap();
        assert_eq!(plotted(&log), [(6, 2), (7, 2)]);
    }

    #[test]
    fn test_reset_without_line_is_soft_reset() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, false);
        display.reset().unwrap();
        assert_eq!(register_pairs(&log), [(register::SOFT_RESET, 1)]);
    }

    #[test]
    fn test_reset_with_line_pulses_it() {
        let log = Log::default();
        let mut display = driver(&log, 160, 128, true);
        display.reset().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            [Event::Reset(0), Event::DelayNs(2_000_000), Event::Reset(1)]
        );
    }

    #[test]
    fn test_oversized_panel_rejected() {
        let log = Log::default();
        let interface = Interface::new(Recorder::data(&log), Recorder::rs(&log), None);
        let result = Seps525::new(
            interface,
            LogDelay(Arc::clone(&log)),
            Resolution::new(300, 128).unwrap(),
            Seps525Settings::default(),
            InitPolicy::Strict,
        );
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidResolution { x: 300, .. }))
        ));
    }
}

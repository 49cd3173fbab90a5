//! SEPS525 register map
//!
//! Every register is written as an (address, value) pair: the address goes
//! out with RS low, the value with RS high. The one exception is
//! [`DDRAM_DATA_ACCESS_PORT`], which is selected once and then followed by
//! any number of pixel bytes.
//!
//! ## Example
//!
//! ```
//! use boardlink::register;
//!
//! // Display on/off takes a single flag byte
//! let frame = [register::DISP_ON_OFF, 0x01];
//! assert_eq!(frame, [0x06, 0x01]);
//! ```

// System control

/// Index register (0x00)
pub const INDEX: u8 = 0x00;

/// Status read (0x01)
pub const STATUS_READ: u8 = 0x01;

/// Oscillator control (0x02)
///
/// Bit 0 selects the internal oscillator.
pub const OSC_CTL: u8 = 0x02;

/// Clock divider and oscillator frequency (0x03)
pub const CLOCK_DIV: u8 = 0x03;

/// Reduce current (0x04)
///
/// Pulsed on then off at the start of bring-up.
pub const REDUCE_CURRENT: u8 = 0x04;

/// Software reset (0x05)
///
/// Writing 1 resets every register to its power-on value.
pub const SOFT_RESET: u8 = 0x05;

/// Display on/off (0x06)
pub const DISP_ON_OFF: u8 = 0x06;

// Precharge

/// Red precharge time (0x08)
pub const PRECHARGE_TIME_R: u8 = 0x08;
/// Green precharge time (0x09)
pub const PRECHARGE_TIME_G: u8 = 0x09;
/// Blue precharge time (0x0A)
pub const PRECHARGE_TIME_B: u8 = 0x0A;

/// Red precharge current (0x0B)
pub const PRECHARGE_CURRENT_R: u8 = 0x0B;
/// Green precharge current (0x0C)
pub const PRECHARGE_CURRENT_G: u8 = 0x0C;
/// Blue precharge current (0x0D)
pub const PRECHARGE_CURRENT_B: u8 = 0x0D;

// Driving current

/// Red driving current (0x10)
pub const DRIVING_CURRENT_R: u8 = 0x10;
/// Green driving current (0x11)
pub const DRIVING_CURRENT_G: u8 = 0x11;
/// Blue driving current (0x12)
pub const DRIVING_CURRENT_B: u8 = 0x12;

// Interface and display mode

/// Display mode set (0x13)
pub const DISPLAY_MODE: u8 = 0x13;

/// RGB interface selection (0x14)
pub const RGB_IF: u8 = 0x14;

/// RGB interface polarity (0x15)
pub const RGB_POL: u8 = 0x15;

/// Memory write mode (0x16)
///
/// Selects bus width, colour depth and address increment direction.
pub const MEMORY_WRITE_MODE: u8 = 0x16;

// Addressing window

/// Window start column (0x17)
pub const MX1_ADDR: u8 = 0x17;
/// Window end column (0x18)
pub const MX2_ADDR: u8 = 0x18;
/// Window start row (0x19)
pub const MY1_ADDR: u8 = 0x19;
/// Window end row (0x1A)
pub const MY2_ADDR: u8 = 0x1A;

/// Cursor column (0x20)
pub const MEMORY_ACCESS_POINTER_X: u8 = 0x20;
/// Cursor row (0x21)
pub const MEMORY_ACCESS_POINTER_Y: u8 = 0x21;

/// Display RAM data port (0x22)
///
/// Selected with RS low; every following RS-high byte is pixel data.
pub const DDRAM_DATA_ACCESS_PORT: u8 = 0x22;

// Panel timing

/// Duty ratio (0x28)
pub const DUTY: u8 = 0x28;

/// Display start line (0x29)
pub const DSL: u8 = 0x29;

/// Reference voltage source (0x80)
pub const IREF: u8 = 0x80;

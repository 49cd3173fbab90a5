//! RGB colour for register-addressed colour panels
//!
//! Colours are stored as full 8-bit channels. Panels with an 18-bit
//! interface only look at the low six bits of each channel, which is what
//! [`Color::masked`] produces.
//!
//! ## Example
//!
//! ```
//! use boardlink::Color;
//!
//! assert_eq!(Color::WHITE.masked(), [0x3F, 0x3F, 0x3F]);
//! assert_eq!(Color::new(0x80, 0x41, 0x3F).masked(), [0x00, 0x01, 0x3F]);
//! ```

/// Bits of each channel that reach an 18-bit panel
pub const COLOR_MASK: u8 = 0x3F;

/// 24-bit RGB colour, addressed by channel name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel
    pub red: u8,
    /// Green channel
    pub green: u8,
    /// Blue channel
    pub blue: u8,
}

impl Color {
    /// Full red
    pub const RED: Self = Self::new(0xFF, 0x00, 0x00);
    /// Full green
    pub const GREEN: Self = Self::new(0x00, 0xFF, 0x00);
    /// Full blue
    pub const BLUE: Self = Self::new(0x00, 0x00, 0xFF);
    /// All channels off
    pub const BLACK: Self = Self::new(0x00, 0x00, 0x00);
    /// All channels full
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);
    /// Half intensity on every channel
    pub const GREY: Self = Self::new(0x7F, 0x7F, 0x7F);

    /// Create a colour from its channels
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Channels in wire order (red, green, blue), each masked to six bits
    pub const fn masked(self) -> [u8; 3] {
        [
            self.red & COLOR_MASK,
            self.green & COLOR_MASK,
            self.blue & COLOR_MASK,
        ]
    }
}

#[cfg(feature = "graphics")]
impl From<embedded_graphics_core::pixelcolor::Rgb888> for Color {
    fn from(color: embedded_graphics_core::pixelcolor::Rgb888) -> Self {
        use embedded_graphics_core::pixelcolor::RgbColor;
        Self::new(color.r(), color.g(), color.b())
    }
}

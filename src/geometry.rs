//! Pixel coordinates and panel resolution

use crate::error::ConfigError;

/// A pixel position, 1-based: `(1, 1)` is the top-left pixel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coordinate {
    /// Column, starting at 1
    pub x: u8,
    /// Row, starting at 1
    pub y: u8,
}

impl Coordinate {
    /// Top-left pixel
    pub const ORIGIN: Self = Self { x: 1, y: 1 };

    /// Create a new coordinate
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl From<(u8, u8)> for Coordinate {
    fn from((x, y): (u8, u8)) -> Self {
        Self::new(x, y)
    }
}

/// Panel size in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Columns
    pub width: u16,
    /// Rows
    pub height: u16,
}

impl Resolution {
    /// Create a resolution, rejecting zero in either direction
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidResolution`] if `width` or `height` is zero.
    pub fn new(width: u16, height: u16) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidResolution {
                x: width,
                y: height,
            });
        }
        Ok(Self { width, height })
    }

    /// Number of pixels on the panel
    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Whether the 1-based `coord` lies on the panel
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.x >= 1
            && coord.y >= 1
            && u16::from(coord.x) <= self.width
            && u16::from(coord.y) <= self.height
    }
}

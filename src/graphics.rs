//! Graphics support via embedded-graphics
//!
//! Every [`Display`] is a [`DrawTarget`] with [`Rgb888`] colour, so the
//! embedded-graphics primitives, fonts and images can be drawn on it. Points
//! are 0-based in embedded-graphics and are shifted to the panel's 1-based
//! coordinates; anything outside the panel is skipped.
//!
//! Pixels are pushed to the controller one at a time through
//! [`Protocol::set_pixel`]; there is no frame buffer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use embedded_graphics::{
//!     pixelcolor::Rgb888,
//!     prelude::*,
//!     primitives::{Circle, PrimitiveStyle},
//! };
//! use boardlink::{Builder, ChannelRegistry, Display, Medium, SharedSeps525};
//!
//! # fn main() -> boardlink::Result<()> {
//! let registry = ChannelRegistry::new();
//! let config = Builder::new()
//!     .channel(Medium::Spi, 0, 0)
//!     .named_channel("RS", Medium::Gpio, 24, 0)
//!     .resolution(160, 128)
//!     .build();
//! let mut display = Display::<SharedSeps525>::initialize(&config, &registry)?;
//!
//! display.clear(Rgb888::BLACK)?;
//! Circle::new(Point::new(40, 24), 80)
//!     .into_styled(PrimitiveStyle::with_stroke(Rgb888::GREEN, 2))
//!     .draw(&mut display)?;
//! # Ok(())
//! # }
//! ```

use embedded_graphics_core::draw_target::DrawTarget;
use embedded_graphics_core::geometry::{OriginDimensions, Size};
use embedded_graphics_core::pixelcolor::Rgb888;
use embedded_graphics_core::prelude::{Pixel, Point};

use crate::display::{Display, Protocol};
use crate::error::Error;
use crate::geometry::Coordinate;

impl<P: Protocol> DrawTarget for Display<P> {
    type Color = Rgb888;
    type Error = Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let size = self.size();

        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 {
                continue;
            }
            let (x, y) = (x as u32, y as u32);
            if x >= size.width || y >= size.height {
                continue;
            }
            // Panel sides are at most 256, so the 1-based value fits
            let coord = Coordinate::new((x + 1) as u8, (y + 1) as u8);
            self.set_pixel(coord, color.into())?;
        }

        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.clear_screen(color.into())
    }
}

impl<P: Protocol> OriginDimensions for Display<P> {
    fn size(&self) -> Size {
        let resolution = self.resolution();
        Size::new(u32::from(resolution.width), u32::from(resolution.height))
    }
}

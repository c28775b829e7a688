use std::convert::Infallible;

use embedded_graphics::{
    pixelcolor::{Rgb888, RgbColor},
    prelude::{Dimensions, DrawTarget, Point, Size},
    primitives::Rectangle,
    Pixel,
};

use crate::st7789::BYTES_PER_PIXEL;

/// A frame in the controller's raster format: row-major, one byte each for R, G and B.
///
/// Under the 18-bit pixel format the controller keeps the top 6 bits of each byte, so colours
/// can be drawn as plain [Rgb888].
pub struct FrameBuffer {
    size: Size,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Creates a new [FrameBuffer] with all pixels black.
    ///
    /// ```
    /// use embedded_graphics::prelude::Size;
    /// use pirate_display::buffer::FrameBuffer;
    ///
    /// let buffer = FrameBuffer::new(Size::new(8, 8));
    /// assert_eq!(buffer.data().len(), 8 * 8 * 3);
    /// ```
    pub fn new(size: Size) -> Self {
        Self {
            size,
            data: vec![0; size.width as usize * size.height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Access the raw frame data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn index(&self, point: Point) -> Option<usize> {
        if point.x < 0
            || point.x >= self.size.width as i32
            || point.y < 0
            || point.y >= self.size.height as i32
        {
            return None;
        }
        Some((point.y as usize * self.size.width as usize + point.x as usize) * BYTES_PER_PIXEL)
    }
}

fn rgb_bytes(color: Rgb888) -> [u8; BYTES_PER_PIXEL] {
    [color.r(), color.g(), color.b()]
}

impl Dimensions for FrameBuffer {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), self.size)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb888;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels.into_iter() {
            let Some(index) = self.index(point) else {
                continue; // Skip out-of-bounds pixels
            };
            self.data[index..index + BYTES_PER_PIXEL].copy_from_slice(&rgb_bytes(color));
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let drawable_area = self.bounding_box().intersection(area);
        if drawable_area.size.width == 0 || drawable_area.size.height == 0 {
            return Ok(()); // Nothing to fill
        }

        let bytes = rgb_bytes(color);
        let row_length = drawable_area.size.width as usize * BYTES_PER_PIXEL;
        for y in drawable_area.rows() {
            let Some(start) = self.index(Point::new(drawable_area.top_left.x, y)) else {
                continue;
            };
            for pixel in self.data[start..start + row_length].chunks_exact_mut(BYTES_PER_PIXEL) {
                pixel.copy_from_slice(&bytes);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let bytes = rgb_bytes(color);
        for pixel in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.copy_from_slice(&bytes);
        }
        Ok(())
    }
}

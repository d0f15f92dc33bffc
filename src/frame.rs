// SPDX-License-Identifier: GPL-3.0-or-later
use image::{imageops, ImageBuffer, Luma, RgbImage};
use itertools::{Itertools, MinMaxResult};

use crate::colormap::Color;
use crate::error::Error;

/// Width of an MLX90640 frame, in pixels.
pub(crate) const FRAME_WIDTH: u32 = 32;

/// Height of an MLX90640 frame, in pixels.
pub(crate) const FRAME_HEIGHT: u32 = 24;

/// The number of readings (or pixels) in a frame.
pub(crate) const FRAME_PIXELS: usize = (FRAME_WIDTH * FRAME_HEIGHT) as usize;

/// Images where each point is a temperature in degrees Celsius.
pub(crate) type ThermalImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// One full sensor reading, row-major.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TemperatureFrame(ThermalImage);

impl TemperatureFrame {
    pub(crate) fn from_vec(readings: Vec<f32>) -> Result<Self, Error> {
        let actual = readings.len();
        ThermalImage::from_raw(FRAME_WIDTH, FRAME_HEIGHT, readings)
            .filter(|image| image.as_raw().len() == FRAME_PIXELS)
            .map(Self)
            .ok_or(Error::FrameSize {
                expected: FRAME_PIXELS,
                actual,
            })
    }

    pub(crate) fn from_image(image: ThermalImage) -> Result<Self, Error> {
        if image.dimensions() == (FRAME_WIDTH, FRAME_HEIGHT) {
            Ok(Self(image))
        } else {
            Err(Error::FrameSize {
                expected: FRAME_PIXELS,
                actual: (image.width() * image.height()) as usize,
            })
        }
    }

    pub(crate) fn readings(&self) -> &[f32] {
        self.0.as_raw()
    }

    /// The coldest and hottest readings in the frame, skipping NaNs.
    ///
    /// `None` if every reading is NaN.
    pub(crate) fn min_max(&self) -> Option<(f32, f32)> {
        match self.readings().iter().copied().filter(|t| !t.is_nan()).minmax() {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(t) => Some((t, t)),
            MinMaxResult::MinMax(min, max) => Some((min, max)),
        }
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.readings().chunks(FRAME_WIDTH as usize)
    }

    pub(crate) fn flip_horizontal(&mut self) {
        imageops::flip_horizontal_in_place(&mut self.0);
    }

    pub(crate) fn flip_vertical(&mut self) {
        imageops::flip_vertical_in_place(&mut self.0);
    }
}

/// A colorized frame, ready to be written out as RGB24.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PixelFrame(RgbImage);

impl PixelFrame {
    /// Build a frame from one color per reading, in row-major order.
    pub(crate) fn from_colors<I>(colors: I) -> Self
    where
        I: IntoIterator<Item = Color>,
    {
        let mut image = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);
        for (dest, color) in image.pixels_mut().zip(colors) {
            *dest = image::Rgb(color.as_array());
        }
        Self(image)
    }

    /// The raw RGB24 bytes, row-major with no padding.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_raw()
    }

    #[cfg(test)]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> Color {
        Color::from(self.0.get_pixel(x, y))
    }

    #[cfg(test)]
    pub(crate) fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.0.pixels().map(Color::from)
    }
}

#[cfg(test)]
mod test {
    use super::{PixelFrame, TemperatureFrame, ThermalImage, FRAME_PIXELS};
    use crate::colormap::Color;
    use crate::error::Error;

    fn gradient_frame() -> TemperatureFrame {
        TemperatureFrame::from_vec((0..FRAME_PIXELS).map(|n| n as f32).collect())
            .expect("a full frame")
    }

    #[test]
    fn wrong_size() {
        assert_eq!(
            TemperatureFrame::from_vec(vec![20.0; 10]),
            Err(Error::FrameSize {
                expected: FRAME_PIXELS,
                actual: 10
            })
        );
        assert!(TemperatureFrame::from_vec(vec![20.0; FRAME_PIXELS + 1]).is_err());
    }

    #[test]
    fn wrong_dimensions() {
        let image = ThermalImage::new(24, 32);
        assert_eq!(
            TemperatureFrame::from_image(image),
            Err(Error::FrameSize {
                expected: FRAME_PIXELS,
                actual: FRAME_PIXELS
            })
        );
        assert!(TemperatureFrame::from_image(ThermalImage::new(32, 24)).is_ok());
    }

    #[test]
    fn min_max() {
        assert_eq!(gradient_frame().min_max(), Some((0.0, 767.0)));
    }

    #[test]
    fn min_max_skips_nan() {
        let mut readings = vec![f32::NAN; FRAME_PIXELS];
        readings[100] = 21.5;
        let frame = TemperatureFrame::from_vec(readings).unwrap();
        assert_eq!(frame.min_max(), Some((21.5, 21.5)));
        let frame = TemperatureFrame::from_vec(vec![f32::NAN; FRAME_PIXELS]).unwrap();
        assert_eq!(frame.min_max(), None);
    }

    #[test]
    fn rows() {
        let frame = gradient_frame();
        let rows: Vec<&[f32]> = frame.rows().collect();
        assert_eq!(rows.len(), 24);
        assert_eq!(rows[1][0], 32.0);
        assert_eq!(rows[23][31], 767.0);
    }

    #[test]
    fn flips() {
        let mut frame = gradient_frame();
        frame.flip_vertical();
        assert_eq!(frame.readings()[0], 736.0);
        frame.flip_horizontal();
        assert_eq!(frame.readings()[0], 767.0);
    }

    #[test]
    fn pixel_bytes_are_row_major() {
        let colors = (0..FRAME_PIXELS).map(|n| Color::new((n % 256) as u8, 1, 2));
        let pixels = PixelFrame::from_colors(colors);
        let bytes = pixels.as_bytes();
        assert_eq!(bytes.len(), FRAME_PIXELS * 3);
        assert_eq!(&bytes[..6], &[0, 1, 2, 1, 1, 2]);
        // (x = 1, y = 1) is the 33rd pixel
        assert_eq!(pixels.pixel(1, 1), Color::new(33, 1, 2));
    }
}

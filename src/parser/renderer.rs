//! Decompression of object bitmaps.
//!
//! Each record starts either with a non-zero byte (a single pixel of that
//! color) or with a zero byte followed by a flag byte whose top two bits pick
//! one of four run layouts:
//!
//! | bytes                          | meaning                         |
//! |--------------------------------|---------------------------------|
//! | `CC`                           | one pixel of color `CC`         |
//! | `00 00`                        | end of row                      |
//! | `00 00LLLLLL`                  | `L` pixels of color 0           |
//! | `00 01LLLLLL LLLLLLLL`         | `L` pixels of color 0           |
//! | `00 10LLLLLL CC`               | `L` pixels of color `CC`        |
//! | `00 11LLLLLL LLLLLLLL CC`      | `L` pixels of color `CC`        |
//!
//! The bitmap is never given a size up front: its width is the width of the
//! last row that was closed and its height is the number of rows closed.

use image::{Rgba, RgbaImage};
use log::trace;

use crate::error::{Error, Result};
use crate::parser::bytes::u16_from_bytes;

const OPAQUE: u8 = 0xFF;

/// How many pixels a run of count `L` expands to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RunLength {
    /// `L + 1` pixels. Bitmaps produced by earlier releases were decoded
    /// this way, so it stays the default.
    Inclusive,
    /// Exactly `L` pixels.
    Exact,
}

impl Default for RunLength {
    fn default() -> RunLength {
        RunLength::Inclusive
    }
}

impl RunLength {
    fn pixels(self, count: u16) -> usize {
        match self {
            RunLength::Inclusive => usize::from(count) + 1,
            RunLength::Exact => usize::from(count),
        }
    }
}

/// A decoded bitmap, four bytes per pixel, rows top to bottom.
///
/// Every pixel is grey (`R == G == B ==` the color index) and opaque.
#[derive(Derivative, PartialEq, Eq, Clone, Default)]
#[derivative(Debug)]
pub struct Pixmap {
    pub width: usize,
    pub height: usize,
    #[derivative(Debug = "ignore")]
    pub buffer: Vec<u8>,
}

impl Pixmap {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn pixel_count(&self) -> usize {
        self.buffer.len() / Self::BYTES_PER_PIXEL
    }

    /// Lays the buffer out on a `width` x `height` canvas. Pixels beyond the
    /// canvas are dropped and uncovered canvas stays transparent.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width as u32, self.height as u32);
        if self.width == 0 {
            return img;
        }

        let canvas = self.width * self.height;
        for (i, px) in self
            .buffer
            .chunks_exact(Self::BYTES_PER_PIXEL)
            .take(canvas)
            .enumerate()
        {
            let x = (i % self.width) as u32;
            let y = (i / self.width) as u32;
            img.put_pixel(x, y, Rgba([px[0], px[1], px[2], px[3]]));
        }

        img
    }
}

#[derive(Debug, Default)]
struct Canvas {
    buffer: Vec<u8>,
    row_width: usize,
    width: usize,
    height: usize,
}

impl Canvas {
    fn push(&mut self, color: u8, n: usize) {
        for _ in 0..n {
            self.buffer.extend_from_slice(&[color, color, color, OPAQUE]);
        }
    }

    fn end_row(&mut self) {
        self.width = self.row_width;
        self.height += 1;
        self.row_width = 0;
    }
}

/// Decodes `data` with the default [`RunLength::Inclusive`] expansion.
pub fn decode(data: &[u8]) -> Result<Pixmap> {
    decode_with(data, RunLength::default())
}

pub fn decode_with(data: &[u8], runs: RunLength) -> Result<Pixmap> {
    let mut canvas = Canvas::default();
    let mut index = 0;

    // the final byte is never read as the start of a record
    while index + 1 < data.len() {
        let current = data[index];
        if current != 0x00 {
            canvas.push(current, 1);
            canvas.row_width += 1;
            index += 1;
            continue;
        }

        let next = data[index + 1];
        if next == 0x00 {
            canvas.end_row();
            index += 2;
            continue;
        }

        let low = next & 0x3F;
        let (count, color, len) = match (next & 0xC0) >> 6 {
            0b00 => (u16::from(low), 0x00, 2),
            0b01 => {
                let b = operands(data, index, 3)?;
                (u16_from_bytes(low, b[2]), 0x00, 3)
            }
            0b10 => {
                let b = operands(data, index, 3)?;
                (u16::from(low), b[2], 3)
            }
            0b11 => {
                let b = operands(data, index, 4)?;
                (u16_from_bytes(low, b[2]), b[3], 4)
            }
            d => return Err(Error::DecodeInvariantViolation(d)),
        };

        trace!("run at {}: {} x color {}", index, count, color);
        canvas.push(color, runs.pixels(count));
        canvas.row_width += usize::from(count);
        index += len;
    }

    Ok(Pixmap {
        width: canvas.width,
        height: canvas.height,
        buffer: canvas.buffer,
    })
}

fn operands(data: &[u8], index: usize, needed: usize) -> Result<&[u8]> {
    data.get(index..index + needed).ok_or(Error::TruncatedRun {
        offset: index,
        needed,
        available: data.len() - index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    fn repeat(px: [u8; 4], n: usize) -> Vec<u8> {
        px.iter().cloned().cycle().take(4 * n).collect()
    }

    #[test]
    fn one_white_pixel() {
        let pm = decode(&[0xFF, 0x00, 0x00]).unwrap();
        assert_eq!(pm, Pixmap { width: 1, height: 1, buffer: WHITE.to_vec() });
    }

    #[test]
    fn two_white_pixels() {
        let pm = decode(&[0xFF, 0xFF, 0x00, 0x00]).unwrap();
        assert_eq!(pm, Pixmap { width: 2, height: 1, buffer: repeat(WHITE, 2) });
    }

    #[test]
    fn literal_pixels_keep_column_order() {
        let pm = decode(&[0x01, 0x02, 0x03, 0x00, 0x00]).unwrap();
        assert_eq!(pm.width, 3);
        assert_eq!(
            pm.buffer,
            vec![1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255]
        );
    }

    #[test]
    fn short_zero_run_counts_nine_columns() {
        let pm = decode(&[0x00, 0b0000_1001, 0x00, 0x00]).unwrap();
        assert_eq!((pm.width, pm.height), (9, 1));
        // inclusive expansion writes one extra pixel
        assert_eq!(pm.buffer, repeat(BLACK, 10));
    }

    #[test]
    fn short_zero_run_exact() {
        let pm = decode_with(&[0x00, 0b0000_1001, 0x00, 0x00], RunLength::Exact).unwrap();
        assert_eq!((pm.width, pm.height), (9, 1));
        assert_eq!(pm.buffer, repeat(BLACK, 9));
    }

    #[test]
    fn long_zero_run() {
        // 0x0140 = 320 columns
        let pm = decode_with(&[0x00, 0b0100_0001, 0x40, 0x00, 0x00], RunLength::Exact).unwrap();
        assert_eq!((pm.width, pm.height), (320, 1));
        assert_eq!(pm.pixel_count(), 320);
    }

    #[test]
    fn short_color_run() {
        let pm = decode(&[0x00, 0b1000_0011, 0x07, 0x00, 0x00]).unwrap();
        assert_eq!(pm.width, 3);
        assert_eq!(pm.buffer, repeat([7, 7, 7, 255], 4));
    }

    #[test]
    fn long_color_run() {
        let pm = decode_with(&[0x00, 0b1100_0001, 0x00, 0x09, 0x00, 0x00], RunLength::Exact).unwrap();
        assert_eq!((pm.width, pm.height), (256, 1));
        assert_eq!(pm.buffer, repeat([9, 9, 9, 255], 256));
    }

    #[test]
    fn long_runs_include_the_extra_pixel() {
        let pm = decode(&[0x00, 0x41, 0x40, 0x00, 0x00]).unwrap();
        assert_eq!((pm.width, pm.height), (320, 1));
        assert_eq!(pm.pixel_count(), 321);

        let pm = decode(&[0x00, 0xC1, 0x00, 0x09, 0x00, 0x00]).unwrap();
        assert_eq!((pm.width, pm.height), (256, 1));
        assert_eq!(pm.buffer, repeat([9, 9, 9, 255], 257));
    }

    #[test]
    fn rows_reset_width_and_count_height() {
        let pm = decode(&[0xFF, 0x00, 0x00, 0xFF, 0x00, 0x00]).unwrap();
        assert_eq!((pm.width, pm.height), (1, 2));
        assert_eq!(pm.buffer, repeat(WHITE, 2));
    }

    #[test]
    fn width_comes_from_last_row() {
        let pm = decode(&[0x05, 0x05, 0x05, 0x00, 0x00, 0x05, 0x00, 0x00]).unwrap();
        assert_eq!((pm.width, pm.height), (1, 2));
        assert_eq!(pm.pixel_count(), 4);
    }

    #[test]
    fn final_byte_is_not_dispatched() {
        let pm = decode(&[0xFF, 0x00, 0x00, 0x42]).unwrap();
        assert_eq!(pm.pixel_count(), 1);
    }

    #[test]
    fn unterminated_row_has_no_height() {
        let pm = decode(&[0x10, 0x10, 0x10]).unwrap();
        assert_eq!((pm.width, pm.height), (0, 0));
        assert_eq!(pm.pixel_count(), 2);
    }

    #[test]
    fn empty_input() {
        assert_eq!(decode(&[]).unwrap(), Pixmap::default());
        assert_eq!(decode(&[0x00]).unwrap(), Pixmap::default());
    }

    #[test]
    fn run_missing_operand_is_an_error() {
        match decode(&[0xFF, 0x00, 0b1100_0001, 0x00]) {
            Err(Error::TruncatedRun { offset, needed, available }) => {
                assert_eq!((offset, needed, available), (1, 4, 3));
            }
            other => panic!("expected TruncatedRun, got {:?}", other),
        }
    }

    #[test]
    fn rgba_image_matches_buffer() {
        let pm = decode_with(&[0x10, 0x20, 0x00, 0x00, 0x30, 0x40, 0x00, 0x00], RunLength::Exact).unwrap();
        let img = pm.to_rgba_image();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(1, 0), &Rgba([0x20, 0x20, 0x20, 0xFF]));
        assert_eq!(img.get_pixel(0, 1), &Rgba([0x30, 0x30, 0x30, 0xFF]));
    }
}

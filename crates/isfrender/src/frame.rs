//! In-memory frames produced by a render call.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("pixel buffer holds {actual} bytes but {width}x{height} RGBA needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Encodings a frame can be serialized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Png,
    /// Lossy JPEG with a 1-100 quality setting.
    Jpeg { quality: u8 },
}

/// An immutable RGBA8 image. Frames are what the cache stores and what
/// callers receive; once constructed the pixels never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Internal constructor for pixel data whose length is correct by
    /// construction.
    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Serializes the frame into the requested container. JPEG drops the
    /// alpha channel; PNG keeps it.
    pub fn encode(&self, format: EncodeFormat) -> Result<Vec<u8>, FrameError> {
        let img = RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or(
            FrameError::SizeMismatch {
                width: self.width,
                height: self.height,
                expected: self.width as usize * self.height as usize * 4,
                actual: self.pixels.len(),
            },
        )?;
        let mut out = Vec::new();
        match format {
            EncodeFormat::Png => {
                DynamicImage::ImageRgba8(img)
                    .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
            }
            EncodeFormat::Jpeg { quality } => {
                let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
                let mut cursor = Cursor::new(&mut out);
                let encoder =
                    JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
                rgb.write_with_encoder(encoder)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_pixel_lengths() {
        let err = Frame::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, FrameError::SizeMismatch { expected: 16, .. }));
    }

    #[test]
    fn encodes_png_with_magic_bytes() {
        let frame = Frame::from_rgba(2, 2, vec![128; 16]).unwrap();
        let bytes = frame.encode(EncodeFormat::Png).expect("encode png");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn encodes_jpeg_without_alpha() {
        let frame = Frame::from_rgba(2, 2, vec![200; 16]).unwrap();
        let bytes = frame
            .encode(EncodeFormat::Jpeg { quality: 80 })
            .expect("encode jpeg");
        assert_eq!(&bytes[..2], &[0xff, 0xd8], "JPEG SOI marker");
    }
}

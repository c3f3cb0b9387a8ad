// src/frame.rs

use crate::error::{Result, VqcmpError};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb};

/// A decoded picture: `width * height` pixels of `channels` interleaved 8-bit samples.
///
/// Three-channel frames are stored in BGR order, the layout the decoders hand back.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if !(1..=3).contains(&channels) {
            return Err(VqcmpError::Frame(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(VqcmpError::Frame(format!(
                "{}x{}x{} frame needs {} bytes, got {}",
                width,
                height,
                channels,
                expected,
                data.len()
            )));
        }
        Ok(Self { width, height, channels, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn has_dimensions(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Bilinear resample to `width x height`, keeping the channel layout.
    pub fn resized(&self, width: u32, height: u32) -> Result<Frame> {
        let data = match self.channels {
            1 => resample::<Luma<u8>>(self, width, height),
            2 => resample::<LumaA<u8>>(self, width, height),
            _ => resample::<Rgb<u8>>(self, width, height),
        }
        .ok_or_else(|| {
            VqcmpError::Frame(format!(
                "cannot view {}x{} frame as an image buffer",
                self.width, self.height
            ))
        })?;
        Frame::new(width, height, self.channels, data)
    }

    /// Grey frame replicated into three BGR channels; other layouts are refused.
    pub fn to_bgr(&self) -> Result<Frame> {
        if self.channels != 1 {
            return Err(VqcmpError::Frame(format!(
                "cannot expand {}-channel frame to BGR",
                self.channels
            )));
        }
        let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
        Frame::new(self.width, self.height, 3, data)
    }
}

fn resample<P>(frame: &Frame, width: u32, height: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let view: ImageBuffer<P, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice())?;
    Some(imageops::resize(&view, width, height, FilterType::Triangle).into_raw())
}

#[cfg(test)]
pub(crate) fn solid(width: u32, height: u32, channels: u8, value: u8) -> Frame {
    let len = width as usize * height as usize * channels as usize;
    Frame::new(width, height, channels, vec![value; len]).expect("valid solid frame")
}

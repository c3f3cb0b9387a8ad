// src/source/mod.rs

mod ffmpeg;
mod y4m;

pub use self::ffmpeg::FfmpegSource;
pub use self::y4m::Y4mSource;

use crate::error::{Result, VqcmpError};
use crate::frame::Frame;
use log::info;
use std::fmt;
use std::path::Path;

/// A four-character codec code, packed little-endian into a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FourCc(pub u32);

impl FourCc {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// The four code bytes, lowest byte first.
    pub fn bytes(self) -> [u8; 4] {
        [
            (self.0 & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 24) & 0xff) as u8,
        ]
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.bytes() {
            let c = if (0x20..=0x7e).contains(&byte) { byte as char } else { '?' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Stream properties captured when the source is opened, before any frame is read.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub fps: f64,
    pub codec: FourCc,
}

impl StreamMetadata {
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Presentation time of the frame at `index`, in milliseconds.
    pub fn millis_at(&self, index: u64) -> f64 {
        if self.fps > 0.0 {
            index as f64 * 1000.0 / self.fps
        } else {
            0.0
        }
    }
}

/// A pull-based sequence of decoded frames.
pub trait FrameSource {
    fn metadata(&self) -> &StreamMetadata;

    /// Next frame, `Ok(None)` at end of stream. An `Err` is a decode fault.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Timestamp of the most recently returned frame (0 before the first).
    fn position_millis(&self) -> f64;
}

/// Opens `path` with the decoder that fits it. `role` names the stream in errors.
pub fn open_source(path: &Path, role: &'static str) -> Result<Box<dyn FrameSource>> {
    if !path.exists() {
        return Err(VqcmpError::SourceOpen {
            role,
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    let is_y4m = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("y4m"));

    let source: Box<dyn FrameSource> = if is_y4m {
        Box::new(Y4mSource::open(path).map_err(|e| open_error(role, path, e))?)
    } else {
        Box::new(FfmpegSource::open(path).map_err(|e| open_error(role, path, e))?)
    };

    let meta = source.metadata();
    info!(
        "Opened {} video {}: {} [{} frames, {:.3} fps, codec {}]",
        role,
        path.display(),
        meta.dimensions(),
        meta.frame_count,
        meta.fps,
        meta.codec
    );
    Ok(source)
}

fn open_error(role: &'static str, path: &Path, err: VqcmpError) -> VqcmpError {
    match err {
        already @ VqcmpError::SourceOpen { .. } => already,
        other => VqcmpError::SourceOpen {
            role,
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::VecDeque;

    /// Frames held in memory, optionally failing once they run out.
    pub struct MemorySource {
        meta: StreamMetadata,
        frames: VecDeque<Frame>,
        position: Option<u64>,
        fail_at_end: bool,
    }

    impl MemorySource {
        pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
            let (width, height) = frames
                .first()
                .map_or((0, 0), |f| (f.width(), f.height()));
            let meta = StreamMetadata {
                width,
                height,
                frame_count: frames.len() as u64,
                fps,
                codec: FourCc::from_bytes(*b"TEST"),
            };
            Self { meta, frames: frames.into(), position: None, fail_at_end: false }
        }

        pub fn failing_at_end(mut self) -> Self {
            self.fail_at_end = true;
            self
        }
    }

    impl FrameSource for MemorySource {
        fn metadata(&self) -> &StreamMetadata {
            &self.meta
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            match self.frames.pop_front() {
                Some(frame) => {
                    self.position = Some(self.position.map_or(0, |p| p + 1));
                    Ok(Some(frame))
                }
                None if self.fail_at_end => Err(VqcmpError::Decode("corrupt frame".into())),
                None => Ok(None),
            }
        }

        fn position_millis(&self) -> f64 {
            self.position.map_or(0.0, |p| self.meta.millis_at(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_decomposes_low_byte_first() {
        let code = FourCc(0x3163_7661);
        assert_eq!(code.bytes(), *b"avc1");
        assert_eq!(code.to_string(), "avc1");
        assert_eq!(FourCc::from_bytes(*b"I420").to_string(), "I420");
    }

    #[test]
    fn fourcc_masks_non_printable_bytes() {
        assert_eq!(FourCc(0).to_string(), "????");
        assert_eq!(FourCc(0x0a00_3148).to_string(), "H1??");
        assert_eq!(FourCc(0xff20_4142).to_string(), "BA ?");
    }

    #[test]
    fn millis_follow_frame_rate() {
        let meta = StreamMetadata {
            width: 4,
            height: 4,
            frame_count: 10,
            fps: 25.0,
            codec: FourCc::default(),
        };
        assert_eq!(meta.millis_at(0), 0.0);
        assert_eq!(meta.millis_at(5), 200.0);
        assert_eq!(meta.dimensions(), "4x4");
    }

    #[test]
    fn missing_file_names_the_role() {
        let err = open_source(Path::new("/nonexistent/ref.mp4"), "reference").err().unwrap();
        match err {
            VqcmpError::SourceOpen { role, .. } => assert_eq!(role, "reference"),
            other => panic!("unexpected error: {}", other),
        }
    }
}

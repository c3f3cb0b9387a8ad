// src/source/y4m.rs

use super::{FourCc, FrameSource, StreamMetadata};
use crate::error::{Result, VqcmpError};
use crate::frame::Frame;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Length of the `FRAME\n` marker preceding each picture.
const FRAME_MARKER_LEN: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Chroma {
    Mono,
    Sub420,
    Sub422,
    Full444,
}

impl Chroma {
    fn from_colorspace(colorspace: ::y4m::Colorspace) -> Option<Self> {
        use ::y4m::Colorspace;
        match colorspace {
            Colorspace::Cmono => Some(Chroma::Mono),
            Colorspace::C420 | Colorspace::C420jpeg | Colorspace::C420paldv | Colorspace::C420mpeg2 => {
                Some(Chroma::Sub420)
            }
            Colorspace::C422 => Some(Chroma::Sub422),
            Colorspace::C444 => Some(Chroma::Full444),
            _ => None,
        }
    }

    /// Horizontal and vertical subsampling shifts.
    fn shifts(self) -> (usize, usize) {
        match self {
            Chroma::Sub420 => (1, 1),
            Chroma::Sub422 => (1, 0),
            Chroma::Mono | Chroma::Full444 => (0, 0),
        }
    }

    fn plane_len(self, width: usize, height: usize) -> usize {
        if self == Chroma::Mono {
            return 0;
        }
        let (sx, sy) = self.shifts();
        width.div_ceil(1 << sx) * height.div_ceil(1 << sy)
    }

    fn codec(self) -> FourCc {
        FourCc::from_bytes(match self {
            Chroma::Mono => *b"Y800",
            Chroma::Sub420 => *b"I420",
            Chroma::Sub422 => *b"Y42B",
            Chroma::Full444 => *b"Y444",
        })
    }
}

/// Native YUV4MPEG2 reader; every frame comes out as 3-channel BGR, monochrome as grey.
pub struct Y4mSource {
    meta: StreamMetadata,
    decoder: ::y4m::Decoder<BufReader<File>>,
    chroma: Chroma,
    position: Option<u64>,
}

impl Y4mSource {
    pub fn open(path: &Path) -> Result<Self> {
        let header_len = header_len(path)?;
        let file_len = std::fs::metadata(path)?.len();

        let decoder = ::y4m::decode(BufReader::new(File::open(path)?)).map_err(y4m_error)?;
        // Only 8-bit layouts map to a Chroma.
        let chroma = Chroma::from_colorspace(decoder.get_colorspace()).ok_or_else(|| {
            VqcmpError::Decode(format!(
                "unsupported y4m colorspace {:?}",
                decoder.get_colorspace()
            ))
        })?;

        let width = decoder.get_width();
        let height = decoder.get_height();
        let picture_len = (width * height + 2 * chroma.plane_len(width, height)) as u64;
        let frame_count = file_len.saturating_sub(header_len) / (FRAME_MARKER_LEN + picture_len);

        let rate = decoder.get_framerate();
        let fps = if rate.den == 0 { 0.0 } else { rate.num as f64 / rate.den as f64 };

        debug!(
            "y4m {}: {}x{} {:?}, {} frames at {}/{}",
            path.display(),
            width,
            height,
            chroma,
            frame_count,
            rate.num,
            rate.den
        );

        let meta = StreamMetadata {
            width: width as u32,
            height: height as u32,
            frame_count,
            fps,
            codec: chroma.codec(),
        };
        Ok(Self { meta, decoder, chroma, position: None })
    }
}

impl FrameSource for Y4mSource {
    fn metadata(&self) -> &StreamMetadata {
        &self.meta
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let width = self.meta.width as usize;
        let height = self.meta.height as usize;
        let chroma = self.chroma;

        let frame = match self.decoder.read_frame() {
            Ok(frame) => match chroma {
                Chroma::Mono => {
                    let bgr = luma_to_bgr(frame.get_y_plane(), width, height)?;
                    Frame::new(self.meta.width, self.meta.height, 3, bgr)?
                }
                _ => {
                    let bgr = yuv_to_bgr(
                        frame.get_y_plane(),
                        frame.get_u_plane(),
                        frame.get_v_plane(),
                        width,
                        height,
                        chroma,
                    )?;
                    Frame::new(self.meta.width, self.meta.height, 3, bgr)?
                }
            },
            Err(::y4m::Error::EOF) => return Ok(None),
            Err(e) => return Err(y4m_error(e)),
        };

        self.position = Some(self.position.map_or(0, |p| p + 1));
        Ok(Some(frame))
    }

    fn position_millis(&self) -> f64 {
        self.position.map_or(0.0, |p| self.meta.millis_at(p))
    }
}

/// Size of the stream header line, including its newline.
fn header_len(path: &Path) -> Result<u64> {
    let mut line = Vec::new();
    let read = BufReader::new(File::open(path)?).read_until(b'\n', &mut line)?;
    Ok(read as u64)
}

fn y4m_error(err: ::y4m::Error) -> VqcmpError {
    match err {
        ::y4m::Error::IoError(e) => VqcmpError::Io(e),
        other => VqcmpError::Decode(format!("y4m: {:?}", other)),
    }
}

/// BT.601 limited-range conversion with chroma replicated over its subsampled block.
fn yuv_to_bgr(
    y_plane: &[u8],
    u_plane: &[u8],
    v_plane: &[u8],
    width: usize,
    height: usize,
    chroma: Chroma,
) -> Result<Vec<u8>> {
    let (sx, sy) = chroma.shifts();
    let chroma_width = width.div_ceil(1 << sx);
    let chroma_len = chroma.plane_len(width, height);
    if y_plane.len() < width * height || u_plane.len() < chroma_len || v_plane.len() < chroma_len {
        return Err(VqcmpError::Decode("y4m plane shorter than its header declares".to_string()));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            let ci = (row >> sy) * chroma_width + (col >> sx);
            let c = y_plane[row * width + col] as f64 - 16.0;
            let d = u_plane[ci] as f64 - 128.0;
            let e = v_plane[ci] as f64 - 128.0;

            let r = 1.164 * c + 1.596 * e;
            let g = 1.164 * c - 0.392 * d - 0.813 * e;
            let b = 1.164 * c + 2.017 * d;
            out.extend([clamp_u8(b), clamp_u8(g), clamp_u8(r)]);
        }
    }
    Ok(out)
}

/// Luma-only pictures decode as neutral chroma, i.e. grey in every channel.
fn luma_to_bgr(y_plane: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let len = width * height;
    if y_plane.len() < len {
        return Err(VqcmpError::Decode("y4m plane shorter than its header declares".to_string()));
    }
    Ok(y_plane[..len]
        .iter()
        .flat_map(|&y| {
            let v = clamp_u8(1.164 * (y as f64 - 16.0));
            [v, v, v]
        })
        .collect())
}

fn clamp_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// src/source/ffmpeg.rs

use super::{FourCc, FrameSource, StreamMetadata};
use crate::error::{Result, VqcmpError};
use crate::frame::Frame;
use log::{debug, error, info, warn};
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Samples per pixel of the `bgr24` stream ffmpeg is asked for.
const CHANNELS: u8 = 3;

/// Decodes any container ffmpeg understands into raw BGR frames over a pipe.
pub struct FfmpegSource {
    meta: StreamMetadata,
    child: Child,
    stdout: BufReader<ChildStdout>,
    frame_len: usize,
    position: Option<u64>,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let meta = probe(path)?;
        if meta.width == 0 || meta.height == 0 {
            return Err(VqcmpError::Parse(format!(
                "{} reports an empty frame size",
                path.display()
            )));
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| VqcmpError::Config("Invalid video path".to_string()))?;
        let threads = num_cpus::get().to_string();
        let args = decoder_args(path_str, &threads);
        info!("Starting decoder: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdout = match child.stdout.take() {
            Some(stdout) => BufReader::new(stdout),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VqcmpError::Command("ffmpeg stdout was not captured".to_string()));
            }
        };

        let frame_len = meta.width as usize * meta.height as usize * CHANNELS as usize;
        Ok(Self { meta, child, stdout, frame_len, position: None })
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &StreamMetadata {
        &self.meta
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(buf) = read_frame(&mut self.stdout, self.frame_len)? else {
            debug!("ffmpeg reached end of stream after {:?}", self.position);
            return Ok(None);
        };
        self.position = Some(self.position.map_or(0, |p| p + 1));
        Frame::new(self.meta.width, self.meta.height, CHANNELS, buf).map(Some)
    }

    fn position_millis(&self) -> f64 {
        self.position.map_or(0.0, |p| self.meta.millis_at(p))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // The decoder may still be writing when the other stream ran out first.
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        match self.child.wait() {
            Ok(status) => debug!("ffmpeg decoder exited with {}", status),
            Err(e) => warn!("Failed to reap ffmpeg decoder: {}", e),
        }
    }
}

/// Arguments for the decoder process. Autorotation stays off so frames keep
/// the stored width and height that ffprobe reports.
fn decoder_args<'a>(path: &'a str, threads: &'a str) -> Vec<&'a str> {
    vec![
        "-hide_banner", "-loglevel", "error", "-nostdin",
        "-threads", threads,
        "-noautorotate",
        "-i", path,
        "-map", "0:v:0",
        "-f", "rawvideo",
        "-pix_fmt", "bgr24",
        "-",
    ]
}

/// Reads exactly one frame of `len` bytes. `None` on a clean end of stream;
/// a partial trailing frame is a decode fault.
fn read_frame<R: Read>(reader: &mut R, len: usize) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(VqcmpError::Io(e)),
        }
    }

    match filled {
        0 => Ok(None),
        n if n < len => Err(VqcmpError::Decode(format!(
            "truncated frame: got {} of {} bytes",
            n, len
        ))),
        _ => Ok(Some(buf)),
    }
}

/// Runs ffprobe to get video metadata.
fn probe(video_path: &Path) -> Result<StreamMetadata> {
    info!("Probing video file: {}", video_path.display());
    let path_str = video_path
        .to_str()
        .ok_or_else(|| VqcmpError::Config("Invalid video path".to_string()))?;

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,nb_frames,r_frame_rate,codec_tag:format=nb_frames",
            "-of", "json",
            path_str,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("ffprobe failed for {}: {}", video_path.display(), stderr);
        return Err(VqcmpError::Command(format!(
            "ffprobe failed for {}: {}",
            video_path.display(),
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("ffprobe output for {}: {}", video_path.display(), stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .map_err(|e| VqcmpError::Parse(format!("Failed to parse ffprobe JSON: {}", e)))?;
    let mut meta = metadata_from_probe(&json)?;

    if meta.frame_count == 0 {
        meta.frame_count = count_frames(path_str)?;
    }
    Ok(meta)
}

fn metadata_from_probe(json: &serde_json::Value) -> Result<StreamMetadata> {
    let stream = json["streams"]
        .get(0)
        .ok_or_else(|| VqcmpError::Parse("No video stream found in ffprobe output".to_string()))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| VqcmpError::Parse("Missing width".to_string()))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| VqcmpError::Parse("Missing height".to_string()))? as u32;

    // 0 means "unknown"; the caller falls back to counting.
    let frame_count = stream["nb_frames"]
        .as_str()
        .or_else(|| json["format"]["nb_frames"].as_str())
        .and_then(|fc| fc.parse::<u64>().ok())
        .unwrap_or(0);

    let fps_str = stream["r_frame_rate"]
        .as_str()
        .ok_or_else(|| VqcmpError::Parse("Missing r_frame_rate".to_string()))?;
    let fps = parse_frame_rate(fps_str)?;

    let codec = stream["codec_tag"]
        .as_str()
        .map(parse_codec_tag)
        .transpose()?
        .unwrap_or_default();

    Ok(StreamMetadata { width, height, frame_count, fps, codec })
}

/// Slow path: decode the whole stream once to count its frames.
fn count_frames(path_str: &str) -> Result<u64> {
    info!("Frame count not found in initial probe, running count_frames probe for {}", path_str);
    let count_output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-count_frames",
            "-select_streams", "v:0",
            "-show_entries", "stream=nb_read_frames",
            "-of", "csv=p=0",
            path_str,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !count_output.status.success() {
        let stderr = String::from_utf8_lossy(&count_output.stderr);
        error!("ffprobe count_frames failed for {}: {}", path_str, stderr);
        return Err(VqcmpError::Command(format!(
            "ffprobe count_frames failed for {}: {}",
            path_str,
            stderr.trim()
        )));
    }

    let count_stdout = String::from_utf8_lossy(&count_output.stdout).trim().to_string();
    debug!("ffprobe count_frames output for {}: {}", path_str, count_stdout);
    if count_stdout.is_empty() || count_stdout == "N/A" {
        warn!("Could not count frames for {}, reporting 0", path_str);
        return Ok(0);
    }
    count_stdout.parse::<u64>().map_err(|e| {
        VqcmpError::Parse(format!(
            "Invalid frame count value from count_frames probe: '{}', error: {}",
            count_stdout, e
        ))
    })
}

/// Parses frame rate string (e.g., "24000/1001") into f64.
fn parse_frame_rate(fps_str: &str) -> Result<f64> {
    match fps_str.split_once('/') {
        Some((num, den)) => {
            let num = num
                .parse::<f64>()
                .map_err(|_| VqcmpError::Parse(format!("Invalid FPS numerator: {}", num)))?;
            let den = den
                .parse::<f64>()
                .map_err(|_| VqcmpError::Parse(format!("Invalid FPS denominator: {}", den)))?;
            if den == 0.0 {
                Err(VqcmpError::Parse("FPS denominator cannot be zero".to_string()))
            } else {
                Ok(num / den)
            }
        }
        None => fps_str
            .parse::<f64>()
            .map_err(|_| VqcmpError::Parse(format!("Invalid FPS format: {}", fps_str))),
    }
}

/// ffprobe prints the tag as hex, e.g. "0x31637661" for avc1.
fn parse_codec_tag(tag: &str) -> Result<FourCc> {
    let digits = tag
        .strip_prefix("0x")
        .or_else(|| tag.strip_prefix("0X"))
        .unwrap_or(tag);
    u32::from_str_radix(digits, 16)
        .map(FourCc)
        .map_err(|_| VqcmpError::Parse(format!("Invalid codec tag: {}", tag)))
}

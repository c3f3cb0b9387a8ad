// src/cli.rs

use crate::config::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Compares a test video against a reference, frame by frame, writing PSNR/RMSE
/// (and optionally SSIM) for every Nth frame to a JSON or XML report.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Reference (source) video file
    #[arg(short = 's', long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Test video file to compare against the reference
    #[arg(short = 't', long, value_name = "FILE")]
    pub test: PathBuf,

    /// Result file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: PathBuf,

    /// Report every Nth frame (must be at least 1)
    #[arg(short = 'n', long, value_name = "N", allow_negative_numbers = true)]
    pub nth: i64,

    /// Output format (default: inferred from the result file extension, else json)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Frames to skip at the start of the reference video
    #[arg(short = 'a', long, default_value_t = 0, allow_negative_numbers = true)]
    pub source_advance: i64,

    /// Frames to skip at the start of the test video
    #[arg(short = 'b', long, default_value_t = 0, allow_negative_numbers = true)]
    pub test_advance: i64,

    /// Also compute mean SSIM per colour channel
    #[arg(short = 'm', long)]
    pub ssim: bool,

    /// Enable logging to file (vqcmp_YYYYMMDD_HHMMSS.log next to the result file)
    #[arg(long)]
    pub log: bool,
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flags_match_the_classic_interface() {
        let args = CliArgs::try_parse_from([
            "vqcmp", "-s", "ref.mp4", "-t", "test.mp4", "-o", "out.xml", "-n", "5", "-a", "2",
            "-b", "3", "-m", "-f", "xml",
        ])
        .unwrap();
        assert_eq!(args.reference, PathBuf::from("ref.mp4"));
        assert_eq!(args.test, PathBuf::from("test.mp4"));
        assert_eq!(args.nth, 5);
        assert_eq!((args.source_advance, args.test_advance), (2, 3));
        assert!(args.ssim);
        assert_eq!(args.format, Some(OutputFormat::Xml));
    }

    #[test]
    fn defaults_apply() {
        let args =
            CliArgs::try_parse_from(["vqcmp", "-s", "a", "-t", "b", "-o", "c", "-n", "1"]).unwrap();
        assert_eq!((args.source_advance, args.test_advance), (0, 0));
        assert!(!args.ssim);
        assert_eq!(args.format, None);
    }

    #[test]
    fn missing_required_argument_fails() {
        assert!(CliArgs::try_parse_from(["vqcmp", "-s", "a", "-t", "b", "-o", "c"]).is_err());
    }
}

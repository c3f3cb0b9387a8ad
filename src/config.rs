// src/config.rs

use crate::cli::CliArgs;
use crate::error::{Result, VqcmpError};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Xml,
}

impl OutputFormat {
    /// `.xml` selects XML; anything else gets the JSON default.
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => OutputFormat::Xml,
            _ => OutputFormat::Json,
        }
    }
}

/// Settings of the comparison loop itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    /// Compare every Nth frame pair; always >= 1.
    pub sample_interval: u64,
    pub source_advance: u64,
    pub test_advance: u64,
    pub compute_ssim: bool,
}

impl SamplingConfig {
    pub fn new(sample_interval: u64) -> Result<Self> {
        if sample_interval == 0 {
            return Err(VqcmpError::Config(
                "sampling interval must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            sample_interval,
            source_advance: 0,
            test_advance: 0,
            compute_ssim: false,
        })
    }
}

/// A validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareConfig {
    pub reference_path: PathBuf,
    pub test_path: PathBuf,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub sampling: SamplingConfig,
}

impl TryFrom<&CliArgs> for CompareConfig {
    type Error = VqcmpError;

    fn try_from(args: &CliArgs) -> Result<Self> {
        let mut sampling = SamplingConfig::new(non_negative("--nth", args.nth)?)?;
        sampling.source_advance = non_negative("--source-advance", args.source_advance)?;
        sampling.test_advance = non_negative("--test-advance", args.test_advance)?;
        sampling.compute_ssim = args.ssim;

        let output_format = args
            .format
            .unwrap_or_else(|| OutputFormat::from_path(&args.output));

        Ok(Self {
            reference_path: args.reference.clone(),
            test_path: args.test.clone(),
            output_path: args.output.clone(),
            output_format,
            sampling,
        })
    }
}

fn non_negative(flag: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| VqcmpError::Config(format!("{} must not be negative, got {}", flag, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(extra: &[&str]) -> Result<CompareConfig> {
        let mut argv = vec!["vqcmp", "-s", "ref.mp4", "-t", "test.mp4", "-o", "out.json"];
        argv.extend_from_slice(extra);
        CompareConfig::try_from(&CliArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn zero_or_negative_interval_is_rejected() {
        assert!(matches!(config(&["-n", "0"]), Err(VqcmpError::Config(_))));
        assert!(matches!(config(&["-n", "-4"]), Err(VqcmpError::Config(_))));
    }

    #[test]
    fn negative_advance_is_rejected() {
        assert!(matches!(config(&["-n", "1", "-a", "-1"]), Err(VqcmpError::Config(_))));
        assert!(matches!(config(&["-n", "1", "-b", "-2"]), Err(VqcmpError::Config(_))));
    }

    #[test]
    fn valid_arguments_fill_every_field() {
        let cfg = config(&["-n", "3", "-a", "2", "-b", "5", "-m"]).unwrap();
        assert_eq!(
            cfg.sampling,
            SamplingConfig {
                sample_interval: 3,
                source_advance: 2,
                test_advance: 5,
                compute_ssim: true,
            }
        );
        assert_eq!(cfg.output_format, OutputFormat::Json);
    }

    #[test]
    fn format_is_inferred_from_extension_unless_given() {
        assert_eq!(OutputFormat::from_path(Path::new("r.XML")), OutputFormat::Xml);
        assert_eq!(OutputFormat::from_path(Path::new("r.txt")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("r")), OutputFormat::Json);
        let cfg = config(&["-n", "1", "-f", "xml"]).unwrap();
        assert_eq!(cfg.output_format, OutputFormat::Xml);
    }
}

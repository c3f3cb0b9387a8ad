// src/report/mod.rs

mod json;
mod progress;
mod xml;

pub use self::json::JsonReport;
pub use self::progress::ProgressReport;
pub use self::xml::XmlReport;

use crate::aggregate::{MetricSample, RunSummary};
use crate::config::OutputFormat;
use crate::error::{Result, VqcmpError};
use crate::source::StreamMetadata;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Receives the records of one comparison run, in order: one `begin`,
/// any number of `frame`s, then one `finish`.
pub trait ReportSink {
    fn begin(&mut self, header: &ReportHeader) -> Result<()>;
    fn frame(&mut self, sample: &MetricSample) -> Result<()>;
    fn finish(&mut self, summary: &RunSummary) -> Result<()>;
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn begin(&mut self, header: &ReportHeader) -> Result<()> {
        (**self).begin(header)
    }

    fn frame(&mut self, sample: &MetricSample) -> Result<()> {
        (**self).frame(sample)
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        (**self).finish(summary)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StreamHeader {
    pub file: String,
    pub dimensions: String,
    pub numframes: u64,
    pub codec: String,
}

impl StreamHeader {
    pub fn new(path: &Path, meta: &StreamMetadata) -> Self {
        Self {
            file: path.display().to_string(),
            dimensions: meta.dimensions(),
            numframes: meta.frame_count,
            codec: meta.codec.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportHeader {
    pub reference: StreamHeader,
    pub test: StreamHeader,
    pub tests_performed: String,
}

impl ReportHeader {
    pub fn new(reference: StreamHeader, test: StreamHeader, with_ssim: bool) -> Self {
        let tests_performed = if with_ssim {
            "PSNR, RMSE and MSSIM"
        } else {
            "PSNR and RMSE"
        };
        Self { reference, test, tests_performed: tests_performed.to_string() }
    }
}

/// Creates the output file up front so an unwritable destination fails before decoding starts.
pub fn create_file_sink(format: OutputFormat, path: &Path) -> Result<Box<dyn ReportSink>> {
    let file = File::create(path).map_err(|source| VqcmpError::SinkOpen {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Writing {:?} report to {}", format, path.display());
    let out = BufWriter::new(file);
    Ok(match format {
        OutputFormat::Json => Box::new(JsonReport::new(out)),
        OutputFormat::Xml => Box::new(XmlReport::new(out)),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tests_performed_names_ssim_only_when_enabled() {
        assert_eq!(testing::header(false).tests_performed, "PSNR and RMSE");
        assert_eq!(testing::header(true).tests_performed, "PSNR, RMSE and MSSIM");
    }

    #[test]
    fn unwritable_output_is_a_sink_open_error() {
        let err = create_file_sink(OutputFormat::Json, Path::new("/nonexistent-dir/out.json"))
            .err()
            .unwrap();
        assert!(matches!(err, VqcmpError::SinkOpen { .. }));
    }
}

// src/report/progress.rs

use super::{ReportHeader, ReportSink};
use crate::aggregate::{MetricSample, RunSummary};
use crate::error::Result;
use std::io::Write;

/// Erase the current terminal line and return to column 0.
const CLEAR_LINE: &str = "\x1B[2K\x1B[0E";

/// Prints a live, overwritten progress line for every sample, then forwards to `inner`.
pub struct ProgressReport<S, W: Write> {
    inner: S,
    out: W,
}

impl<S: ReportSink, W: Write> ProgressReport<S, W> {
    pub fn new(inner: S, out: W) -> Self {
        Self { inner, out }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (S, W) {
        (self.inner, self.out)
    }
}

impl<S: ReportSink, W: Write> ReportSink for ProgressReport<S, W> {
    fn begin(&mut self, header: &ReportHeader) -> Result<()> {
        for (label, stream) in [("Source media", &header.reference), ("Test media", &header.test)] {
            writeln!(
                self.out,
                "{}: {} ({} [{} frames, {}])",
                label, stream.file, stream.dimensions, stream.numframes, stream.codec
            )?;
        }
        writeln!(self.out, "Tests: {}", header.tests_performed)?;
        writeln!(self.out)?;
        self.out.flush()?;
        self.inner.begin(header)
    }

    fn frame(&mut self, sample: &MetricSample) -> Result<()> {
        write!(
            self.out,
            "{}frame: {} -> PSNR: {:.3} RMSE: {:.3}",
            CLEAR_LINE, sample.frame, sample.psnr, sample.rmse
        )?;
        if let Some(ssim) = &sample.ssim {
            write!(
                self.out,
                " -> MSSIM: R: {:.2}, G: {:.2}, B: {:.2}",
                ssim.r, ssim.g, ssim.b
            )?;
        }
        self.out.flush()?;
        self.inner.frame(sample)
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        self.inner.finish(summary)?;
        writeln!(self.out, "{}Comparison completed...", CLEAR_LINE)?;
        writeln!(
            self.out,
            "{} frames sampled, average PSNR: {:.3}, average RMSE: {:.3}",
            summary.sample_count, summary.average_psnr, summary.average_rmse
        )?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ChannelSsim;
    use crate::report::{testing, JsonReport};

    #[test]
    fn prints_progress_and_forwards_records() {
        let ssim = Some(ChannelSsim { r: 99.5, g: 98.0, b: 97.25 });
        let mut report = ProgressReport::new(JsonReport::new(Vec::new()), Vec::new());
        report.begin(&testing::header(true)).unwrap();
        report.frame(&testing::sample(6, ssim)).unwrap();
        report.finish(&testing::summary(ssim)).unwrap();

        let (json, console) = report.into_parts();
        let console = String::from_utf8(console).unwrap();
        assert!(console.contains("Source media: ref.y4m (4x4 [2 frames, I420])"));
        assert!(console.contains("frame: 6 -> PSNR: 35.500 RMSE: 4.250"));
        assert!(console.contains("MSSIM: R: 99.50, G: 98.00, B: 97.25"));
        assert!(console.contains("Comparison completed..."));

        let doc: serde_json::Value = serde_json::from_slice(&json.into_inner()).unwrap();
        assert_eq!(doc["results"]["frame_6"]["psnr"], 35.5);
    }
}

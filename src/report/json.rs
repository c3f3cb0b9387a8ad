// src/report/json.rs

use super::{ReportHeader, ReportSink};
use crate::aggregate::{MetricSample, RunSummary};
use crate::error::Result;
use crate::metrics::ChannelSsim;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct FrameRecord {
    psnr: f64,
    rmse: f64,
    tmsec: f64,
    smsec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    mssim: Option<ChannelSsim>,
}

/// Streams a single JSON object; each sampled frame becomes a `frame_<n>` key of `results`.
pub struct JsonReport<W: Write> {
    out: W,
    needs_comma: bool,
}

impl<W: Write> JsonReport<W> {
    pub fn new(out: W) -> Self {
        Self { out, needs_comma: false }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn entry<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, key)?;
        self.out.write_all(b": ")?;
        serde_json::to_writer(&mut self.out, value)?;
        Ok(())
    }

    /// Next key of the `results` object.
    fn member<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        if self.needs_comma {
            self.out.write_all(b",")?;
        }
        self.out.write_all(b"\n    ")?;
        self.entry(key, value)?;
        self.needs_comma = true;
        Ok(())
    }
}

impl<W: Write> ReportSink for JsonReport<W> {
    fn begin(&mut self, header: &ReportHeader) -> Result<()> {
        self.out.write_all(b"{\n  ")?;
        self.entry("reference", &header.reference)?;
        self.out.write_all(b",\n  ")?;
        self.entry("test", &header.test)?;
        self.out.write_all(b",\n  ")?;
        self.entry("testsPerformed", &header.tests_performed)?;
        self.out.write_all(b",\n  \"results\": {")?;
        Ok(())
    }

    fn frame(&mut self, sample: &MetricSample) -> Result<()> {
        let record = FrameRecord {
            psnr: sample.psnr,
            rmse: sample.rmse,
            tmsec: sample.test_millis,
            smsec: sample.reference_millis,
            mssim: sample.ssim,
        };
        self.member(&format!("frame_{}", sample.frame), &record)
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        self.member("framecount", &summary.sample_count)?;
        self.member("lastframe", &summary.last_frame)?;
        self.member("avgpsnr", &summary.average_psnr)?;
        self.member("avgrmse", &summary.average_rmse)?;
        if let Some(ssim) = &summary.average_ssim {
            self.member("avgmssim", ssim)?;
        }
        self.out.write_all(b"\n  }\n}\n")?;
        self.out.flush()?;
        Ok(())
    }
}

// src/aggregate.rs

use crate::error::{Result, VqcmpError};
use crate::metrics::ChannelSsim;
use log::debug;

/// Metrics for one sampled reference/test frame pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Shared frame counter, 0 for the first compared pair.
    pub frame: u64,
    /// dB, or 0 when the frames were identical.
    pub psnr: f64,
    pub rmse: f64,
    pub ssim: Option<ChannelSsim>,
    pub reference_millis: f64,
    pub test_millis: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub sample_count: u64,
    /// Counter of the last frame pair read from both streams.
    pub last_frame: u64,
    pub average_psnr: f64,
    pub average_rmse: f64,
    pub average_ssim: Option<ChannelSsim>,
}

/// Running sums over the samples, in the order they were produced.
#[derive(Debug, Default)]
pub struct Aggregator {
    sample_count: u64,
    sum_psnr: f64,
    sum_rmse: f64,
    ssim_count: u64,
    sum_ssim: ChannelSsim,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: &MetricSample) {
        self.sample_count += 1;
        self.sum_psnr += sample.psnr;
        self.sum_rmse += sample.rmse;
        if let Some(ssim) = sample.ssim {
            self.ssim_count += 1;
            self.sum_ssim.r += ssim.r;
            self.sum_ssim.g += ssim.g;
            self.sum_ssim.b += ssim.b;
        }
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Averages over everything added so far. Fails with `NoSamples` when empty.
    pub fn summary(&self, last_frame: Option<u64>) -> Result<RunSummary> {
        let last_frame = match last_frame {
            Some(frame) if self.sample_count > 0 => frame,
            _ => return Err(VqcmpError::NoSamples),
        };

        let n = self.sample_count as f64;
        let average_ssim = (self.ssim_count > 0).then(|| {
            let m = self.ssim_count as f64;
            ChannelSsim {
                r: self.sum_ssim.r / m,
                g: self.sum_ssim.g / m,
                b: self.sum_ssim.b / m,
            }
        });
        debug!(
            "Aggregated {} samples (psnr sum {:.3}, rmse sum {:.3})",
            self.sample_count, self.sum_psnr, self.sum_rmse
        );

        Ok(RunSummary {
            sample_count: self.sample_count,
            last_frame,
            average_psnr: self.sum_psnr / n,
            average_rmse: self.sum_rmse / n,
            average_ssim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frame: u64, psnr: f64, rmse: f64) -> MetricSample {
        MetricSample {
            frame,
            psnr,
            rmse,
            ssim: None,
            reference_millis: 0.0,
            test_millis: 0.0,
        }
    }

    #[test]
    fn empty_aggregator_reports_no_samples() {
        let agg = Aggregator::new();
        assert!(matches!(agg.summary(Some(9)), Err(VqcmpError::NoSamples)));
        assert!(matches!(agg.summary(None), Err(VqcmpError::NoSamples)));
    }

    #[test]
    fn averages_are_sum_over_count() {
        let mut agg = Aggregator::new();
        agg.add(&sample(0, 30.0, 4.0));
        agg.add(&sample(3, 40.0, 2.0));
        agg.add(&sample(6, 0.0, 0.0));
        let summary = agg.summary(Some(7)).unwrap();
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.last_frame, 7);
        assert!((summary.average_psnr - 70.0 / 3.0).abs() < 1e-12);
        assert!((summary.average_rmse - 2.0).abs() < 1e-12);
        assert_eq!(summary.average_ssim, None);
    }

    #[test]
    fn ssim_is_averaged_per_channel() {
        let mut agg = Aggregator::new();
        for (r, g, b) in [(90.0, 80.0, 70.0), (100.0, 60.0, 50.0)] {
            let mut s = sample(0, 1.0, 1.0);
            s.ssim = Some(ChannelSsim { r, g, b });
            agg.add(&s);
        }
        let ssim = agg.summary(Some(1)).unwrap().average_ssim.unwrap();
        assert_eq!(ssim, ChannelSsim { r: 95.0, g: 70.0, b: 60.0 });
    }
}

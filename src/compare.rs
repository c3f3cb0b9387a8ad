// src/compare.rs
//
// Alignment and sampling: skip the configured leading frames of each stream,
// then walk both in lockstep and measure every Nth pair until either runs out.

use crate::aggregate::{Aggregator, MetricSample, RunSummary};
use crate::config::{CompareConfig, SamplingConfig};
use crate::error::{Result, VqcmpError};
use crate::frame::Frame;
use crate::metrics;
use crate::report::{self, ProgressReport, ReportHeader, ReportSink, StreamHeader};
use crate::source::{self, FrameSource};
use log::{debug, info, warn};
use std::borrow::Cow;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read position within one stream.
struct FrameCursor<'a, F: FrameSource + ?Sized> {
    source: &'a mut F,
    role: &'static str,
    /// Index of the last frame read, `None` before the first.
    index: Option<u64>,
    exhausted: bool,
}

impl<'a, F: FrameSource + ?Sized> FrameCursor<'a, F> {
    fn new(source: &'a mut F, role: &'static str) -> Self {
        Self { source, role, index: None, exhausted: false }
    }

    /// Next frame, or `None` once the stream has ended. Decode faults end the stream.
    fn pull(&mut self) -> Option<Frame> {
        if self.exhausted {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => {
                self.index = Some(self.index.map_or(0, |i| i + 1));
                Some(frame)
            }
            Ok(None) => {
                debug!("{} stream ended after frame {:?}", self.role, self.index);
                self.exhausted = true;
                None
            }
            Err(e) => {
                warn!(
                    "{} stream failed after frame {:?}, treating as end of stream: {}",
                    self.role, self.index, e
                );
                self.exhausted = true;
                None
            }
        }
    }

    /// Discards up to `count` frames; returns how many were actually skipped.
    fn skip(&mut self, count: u64) -> u64 {
        let mut skipped = 0;
        while skipped < count && self.pull().is_some() {
            skipped += 1;
        }
        if skipped < count {
            warn!(
                "{} stream ended while skipping: {} of {} frames skipped",
                self.role, skipped, count
            );
        }
        skipped
    }

    fn position_millis(&self) -> f64 {
        self.source.position_millis()
    }
}

/// Drives one comparison run over a pair of frame sources.
pub struct Comparator {
    config: SamplingConfig,
    stop: Option<Arc<AtomicBool>>,
    /// Reference frame scaled to the test dimensions, overwritten on every
    /// sampled pair whose sizes differ.
    resized: Option<Frame>,
}

impl Comparator {
    pub fn new(config: SamplingConfig) -> Self {
        Self { config, stop: None, resized: None }
    }

    /// The run ends cleanly at the next frame pair once `stop` is set.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|s| s.load(Ordering::Relaxed))
    }

    /// Runs the advance and sampling phases, emitting every sample and the
    /// final summary to `sink`. The sink's `begin` is the caller's job.
    pub fn run<R, T, S>(&mut self, reference: &mut R, test: &mut T, sink: &mut S) -> Result<RunSummary>
    where
        R: FrameSource + ?Sized,
        T: FrameSource + ?Sized,
        S: ReportSink + ?Sized,
    {
        let interval = self.config.sample_interval;
        if interval == 0 {
            return Err(VqcmpError::Config("sampling interval must be at least 1".to_string()));
        }

        let mut reference = FrameCursor::new(reference, "reference");
        let mut test = FrameCursor::new(test, "test");

        let skipped_test = test.skip(self.config.test_advance);
        let skipped_reference = reference.skip(self.config.source_advance);
        info!(
            "Skipped test video {} frames ahead, source video {} frames ahead",
            skipped_test, skipped_reference
        );

        let mut aggregator = Aggregator::new();
        let mut counter: Option<u64> = None;
        loop {
            if self.stop_requested() {
                warn!("Stop requested after frame {:?}, ending comparison early", counter);
                break;
            }
            let Some(reference_frame) = reference.pull() else { break };
            let Some(test_frame) = test.pull() else { break };

            let frame = counter.map_or(0, |c| c + 1);
            counter = Some(frame);
            if frame % interval != 0 {
                continue;
            }

            let sample = self.measure(
                frame,
                &reference_frame,
                &test_frame,
                reference.position_millis(),
                test.position_millis(),
            )?;
            aggregator.add(&sample);
            sink.frame(&sample)?;
        }

        info!(
            "Compared {} frame pairs, sampled {}",
            counter.map_or(0, |c| c + 1),
            aggregator.sample_count()
        );
        let summary = aggregator.summary(counter)?;
        sink.finish(&summary)?;
        Ok(summary)
    }

    fn measure(
        &mut self,
        frame: u64,
        reference: &Frame,
        test: &Frame,
        reference_millis: f64,
        test_millis: f64,
    ) -> Result<MetricSample> {
        // Grey against colour is compared as grey replicated into BGR.
        let (reference, test) = match (reference.channels(), test.channels()) {
            (r, t) if r == t => (Cow::Borrowed(reference), Cow::Borrowed(test)),
            (1, 3) => (Cow::Owned(reference.to_bgr()?), Cow::Borrowed(test)),
            (3, 1) => (Cow::Borrowed(reference), Cow::Owned(test.to_bgr()?)),
            (r, t) => {
                return Err(VqcmpError::Frame(format!(
                    "reference has {} channels, test has {}",
                    r, t
                )));
            }
        };
        let test = &*test;

        let reference = if reference.has_dimensions(test.width(), test.height()) {
            &*reference
        } else {
            &*self.resized.insert(reference.resized(test.width(), test.height())?)
        };

        let psnr = metrics::psnr(reference, test);
        let rmse = metrics::rmse(reference, test);
        let ssim = self
            .config
            .compute_ssim
            .then(|| metrics::mean_ssim(reference, test));
        debug!("frame {}: psnr {:.3} rmse {:.3} ssim {:?}", frame, psnr, rmse, ssim);

        Ok(MetricSample {
            frame,
            psnr,
            rmse,
            ssim,
            reference_millis,
            test_millis,
        })
    }
}

/// Opens both videos and the result file, then runs the comparison with
/// console progress on stdout.
pub fn compare_files(config: &CompareConfig, stop: Option<Arc<AtomicBool>>) -> Result<RunSummary> {
    let mut reference = source::open_source(&config.reference_path, "reference")?;
    let mut test = source::open_source(&config.test_path, "test")?;

    let header = ReportHeader::new(
        StreamHeader::new(&config.reference_path, reference.metadata()),
        StreamHeader::new(&config.test_path, test.metadata()),
        config.sampling.compute_ssim,
    );

    let file_sink = report::create_file_sink(config.output_format, &config.output_path)?;
    let mut sink = ProgressReport::new(file_sink, io::stdout());
    sink.begin(&header)?;

    let mut comparator = Comparator::new(config.sampling);
    if let Some(stop) = stop {
        comparator = comparator.with_stop_flag(stop);
    }
    comparator.run(reference.as_mut(), test.as_mut(), &mut sink)
}

// src/metrics.rs
//
// Pixel-error metrics between two frames of identical shape. Callers are
// responsible for resizing the reference before calling in here.

use crate::frame::Frame;
use once_cell::sync::Lazy;
use serde::Serialize;

/// Peak value of an 8-bit sample.
const PEAK: f64 = 255.0;
/// Below this sum of squared errors two frames count as identical.
const IDENTICAL_SSE: f64 = 1e-10;

const SSIM_C1: f64 = 6.5025;
const SSIM_C2: f64 = 58.5225;
const SSIM_WINDOW: usize = 11;
const SSIM_SIGMA: f64 = 1.5;

static GAUSSIAN_KERNEL: Lazy<[f64; SSIM_WINDOW]> = Lazy::new(|| {
    let centre = (SSIM_WINDOW / 2) as f64;
    let mut kernel = [0.0; SSIM_WINDOW];
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f64 - centre;
        *k = (-(x * x) / (2.0 * SSIM_SIGMA * SSIM_SIGMA)).exp();
    }
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
});

/// Mean SSIM per colour channel, scaled to 0..=100.
///
/// Frames are BGR, so channel 2 is reported as `R` and channel 0 as `B`.
/// Channels a frame does not have report 0.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelSsim {
    #[serde(rename = "R")]
    pub r: f64,
    #[serde(rename = "G")]
    pub g: f64,
    #[serde(rename = "B")]
    pub b: f64,
}

impl ChannelSsim {
    /// Maps per-channel means (in channel index order, 0..=1) onto R/G/B labels.
    pub fn from_channel_means(means: [f64; 3]) -> Self {
        Self {
            r: means[2] * 100.0,
            g: means[1] * 100.0,
            b: means[0] * 100.0,
        }
    }
}

fn sum_squared_error(a: &Frame, b: &Frame) -> f64 {
    debug_assert_eq!(a.data().len(), b.data().len(), "frame shapes must match");
    a.data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| {
            let diff = x.abs_diff(y) as f64;
            diff * diff
        })
        .sum()
}

/// Mean squared error, or `None` when the frames are identical.
fn mean_squared_error(a: &Frame, b: &Frame) -> Option<f64> {
    let sse = sum_squared_error(a, b);
    if sse <= IDENTICAL_SSE {
        None
    } else {
        Some(sse / (a.channels() * a.pixel_count()) as f64)
    }
}

/// PSNR in dB. Returns 0 for identical frames, meaning "no error", not 0 dB.
pub fn psnr(a: &Frame, b: &Frame) -> f64 {
    match mean_squared_error(a, b) {
        Some(mse) => 10.0 * (PEAK * PEAK / mse).log10(),
        None => 0.0,
    }
}

/// Root mean squared error over all samples. 0 for identical frames.
pub fn rmse(a: &Frame, b: &Frame) -> f64 {
    mean_squared_error(a, b).map_or(0.0, f64::sqrt)
}

/// Windowed structural similarity, averaged over every pixel of each channel.
pub fn mean_ssim(a: &Frame, b: &Frame) -> ChannelSsim {
    let width = a.width() as usize;
    let height = a.height() as usize;
    let mut means = [0.0; 3];
    for (channel, mean) in means.iter_mut().enumerate().take(a.channels()) {
        let x = plane(a, channel);
        let y = plane(b, channel);
        *mean = channel_ssim(&x, &y, width, height);
    }
    ChannelSsim::from_channel_means(means)
}

fn plane(frame: &Frame, channel: usize) -> Vec<f64> {
    frame
        .data()
        .iter()
        .skip(channel)
        .step_by(frame.channels())
        .map(|&v| v as f64)
        .collect()
}

fn channel_ssim(x: &[f64], y: &[f64], width: usize, height: usize) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let xx: Vec<f64> = x.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = y.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = x.iter().zip(y).map(|(a, b)| a * b).collect();

    let mu1 = gaussian_blur(x, width, height);
    let mu2 = gaussian_blur(y, width, height);
    let blur_xx = gaussian_blur(&xx, width, height);
    let blur_yy = gaussian_blur(&yy, width, height);
    let blur_xy = gaussian_blur(&xy, width, height);

    let total: f64 = (0..x.len())
        .map(|i| {
            let mu1_2 = mu1[i] * mu1[i];
            let mu2_2 = mu2[i] * mu2[i];
            let mu1_mu2 = mu1[i] * mu2[i];
            let sigma1_2 = blur_xx[i] - mu1_2;
            let sigma2_2 = blur_yy[i] - mu2_2;
            let sigma12 = blur_xy[i] - mu1_mu2;

            let numerator = (2.0 * mu1_mu2 + SSIM_C1) * (2.0 * sigma12 + SSIM_C2);
            let denominator = (mu1_2 + mu2_2 + SSIM_C1) * (sigma1_2 + sigma2_2 + SSIM_C2);
            numerator / denominator
        })
        .sum();
    total / x.len() as f64
}

/// Separable 11x11 Gaussian (sigma 1.5) with mirrored borders that do not
/// repeat the edge sample (`dcb|abcd|cba`).
fn gaussian_blur(src: &[f64], width: usize, height: usize) -> Vec<f64> {
    let kernel = &*GAUSSIAN_KERNEL;
    let radius = (SSIM_WINDOW / 2) as isize;

    let mut horizontal = vec![0.0; src.len()];
    for row in 0..height {
        let line = &src[row * width..(row + 1) * width];
        for col in 0..width {
            horizontal[row * width + col] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * line[reflect_101(col as isize + k as isize - radius, width)])
                .sum();
        }
    }

    let mut out = vec![0.0; src.len()];
    for row in 0..height {
        for col in 0..width {
            out[row * width + col] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let r = reflect_101(row as isize + k as isize - radius, height);
                    w * horizontal[r * width + col]
                })
                .sum();
        }
    }
    out
}

fn reflect_101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::solid;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_frame(rng: &mut StdRng, width: u32, height: u32, channels: u8) -> Frame {
        let len = width as usize * height as usize * channels as usize;
        let data = (0..len).map(|_| rng.gen_range(0..=255u8)).collect();
        Frame::new(width, height, channels, data).unwrap()
    }

    #[test]
    fn identical_frames_report_zero_sentinel() {
        let mut rng = StdRng::seed_from_u64(7);
        let frame = random_frame(&mut rng, 16, 9, 3);
        assert_eq!(psnr(&frame, &frame.clone()), 0.0);
        assert_eq!(rmse(&frame, &frame.clone()), 0.0);
    }

    #[test]
    fn known_uniform_difference() {
        let a = solid(4, 4, 3, 100);
        let b = solid(4, 4, 3, 110);
        assert!((rmse(&a, &b) - 10.0).abs() < 1e-12);
        let expected = 10.0 * (65025.0f64 / 100.0).log10();
        assert!((psnr(&a, &b) - expected).abs() < 1e-12);
    }

    #[test]
    fn psnr_and_rmse_share_the_same_mse() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let a = random_frame(&mut rng, 12, 7, 3);
            let b = random_frame(&mut rng, 12, 7, 3);
            let r = rmse(&a, &b);
            assert!(r > 0.0);
            let from_rmse = 10.0 * 65025.0f64.log10() - 20.0 * r.log10();
            assert!((psnr(&a, &b) - from_rmse).abs() < 1e-9);
        }
    }

    #[test]
    fn mse_divides_by_all_samples() {
        // One sample of 48 differs by 12: mse = 144 / 48 = 3.
        let a = solid(4, 4, 3, 0);
        let mut data = a.data().to_vec();
        data[5] = 12;
        let b = Frame::new(4, 4, 3, data).unwrap();
        assert!((rmse(&a, &b) - 3.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn ssim_of_frame_with_itself_is_one_hundred() {
        let mut rng = StdRng::seed_from_u64(3);
        let frame = random_frame(&mut rng, 24, 17, 3);
        let ssim = mean_ssim(&frame, &frame);
        for value in [ssim.r, ssim.g, ssim.b] {
            assert!((value - 100.0).abs() < 1e-6, "got {}", value);
        }
    }

    #[test]
    fn ssim_drops_for_noisy_copy() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = random_frame(&mut rng, 32, 32, 3);
        let b = random_frame(&mut rng, 32, 32, 3);
        let ssim = mean_ssim(&a, &b);
        assert!(ssim.r < 50.0 && ssim.g < 50.0 && ssim.b < 50.0);
    }

    #[test]
    fn ssim_labels_follow_bgr_channel_order() {
        // Only channel 0 (blue) differs between the frames.
        let a = solid(16, 16, 3, 128);
        let mut data = a.data().to_vec();
        for (i, v) in data.iter_mut().enumerate() {
            if i % 3 == 0 {
                *v = if (i / 3) % 2 == 0 { 0 } else { 255 };
            }
        }
        let b = Frame::new(16, 16, 3, data).unwrap();
        let ssim = mean_ssim(&a, &b);
        assert!((ssim.r - 100.0).abs() < 1e-6);
        assert!((ssim.g - 100.0).abs() < 1e-6);
        assert!(ssim.b < 99.0);
    }

    #[test]
    fn single_channel_ssim_fills_only_blue_label() {
        let frame = solid(8, 8, 1, 90);
        let ssim = mean_ssim(&frame, &frame);
        assert!((ssim.b - 100.0).abs() < 1e-9);
        assert_eq!(ssim.g, 0.0);
        assert_eq!(ssim.r, 0.0);
    }

    #[test]
    fn blur_preserves_constant_plane_on_tiny_frames() {
        let src = vec![5.0; 3 * 2];
        let out = gaussian_blur(&src, 3, 2);
        assert!(out.iter().all(|v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = &*GAUSSIAN_KERNEL;
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((kernel[0] - kernel[10]).abs() < 1e-15);
        assert!(kernel[5] > kernel[4]);
    }

    #[test]
    fn reflect_101_mirrors_without_repeating_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-7, 3), 1);
        assert_eq!(reflect_101(4, 1), 0);
    }
}

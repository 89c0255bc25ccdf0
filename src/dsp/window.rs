use std::f32::consts::PI;

/// 4-term Blackman-Harris coefficients.
const COEFFS: [f32; 4] = [0.35875, 0.48829, 0.14128, 0.01168];

/// Window function value at position `n` of an `len`-sample window.
pub fn blackman_harris_4(len: usize, n: usize) -> f32 {
    if len < 2 {
        return 1.0;
    }
    let [a0, a1, a2, a3] = COEFFS;
    let theta = 2.0 * PI * n as f32 / (len - 1) as f32;
    a0 - a1 * theta.cos() + a2 * (2.0 * theta).cos() - a3 * (3.0 * theta).cos()
}

/// A windowed, channel-averaged sample frame ready for the transform.
pub struct WindowedFrame {
    pub samples: Vec<f32>,
    /// Peak-to-peak amplitude of the channel-averaged samples, measured
    /// before windowing. Drives the UI pulse effects.
    pub volume: f32,
}

/// Average all channels per sample, record the unwindowed peak-to-peak
/// volume, then apply the Blackman-Harris window.
///
/// All channel slices must have the same length.
pub fn combine_and_window(channels: &[Vec<f32>]) -> WindowedFrame {
    let len = channels.first().map_or(0, |c| c.len());
    if len == 0 || channels.is_empty() {
        return WindowedFrame { samples: Vec::new(), volume: 0.0 };
    }

    let mut samples = Vec::with_capacity(len);
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;

    for j in 0..len {
        let sum: f32 = channels.iter().map(|c| c[j]).sum();
        let averaged = sum / channels.len() as f32;
        min = min.min(averaged);
        max = max.max(averaged);
        samples.push(averaged * blackman_harris_4(len, j));
    }

    WindowedFrame { samples, volume: max - min }
}

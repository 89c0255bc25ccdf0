use crate::audio::SampleBuffer;

use super::window::{combine_and_window, WindowedFrame};

/// Per-buffer frame geometry: how many samples one visual frame advances,
/// and how many samples feed each transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameGeometry {
    /// `sample_rate / frame_rate`; fractional for non-divisible rates.
    pub samples_per_frame: f32,
    /// Transform window length: the caller override, or the largest power
    /// of two that fits in one frame's worth of samples.
    pub frame_length: usize,
}

impl FrameGeometry {
    pub fn derive(sample_rate: u32, frame_rate: u32, custom_frame_length: Option<usize>) -> Self {
        let samples_per_frame = sample_rate as f32 / frame_rate as f32;
        let frame_length = custom_frame_length
            .unwrap_or_else(|| largest_power_of_two_at_most(samples_per_frame));
        Self { samples_per_frame, frame_length }
    }
}

fn largest_power_of_two_at_most(limit: f32) -> usize {
    let mut power = 2usize;
    while (power * 2) as f32 <= limit {
        power *= 2;
    }
    power
}

/// Slice one window per channel starting at the frame's sample offset.
///
/// Indices past the end of the buffer read as zero; audio windows
/// routinely straddle the buffer edge near the end of playback.
pub fn slice_channels(
    buffer: &SampleBuffer,
    frame_index: usize,
    frame_length: usize,
    samples_per_frame: f32,
) -> Vec<Vec<f32>> {
    let start = (frame_index as f64 * samples_per_frame as f64).floor() as usize;

    (0..buffer.num_channels())
        .map(|c| {
            let channel = buffer.channel(c);
            (0..frame_length)
                .map(|j| channel.get(start + j).copied().unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// Synchronous extraction: slice, average, window. The worker path runs
/// the same two steps on opposite sides of the message boundary.
pub fn extract(buffer: &SampleBuffer, frame_index: usize, geometry: &FrameGeometry) -> WindowedFrame {
    let channels = slice_channels(
        buffer,
        frame_index,
        geometry.frame_length,
        geometry.samples_per_frame,
    );
    combine_and_window(&channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(len: usize) -> SampleBuffer {
        let channel: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        SampleBuffer::new(vec![channel], 8)
    }

    #[test]
    fn frame_length_is_largest_power_of_two() {
        // 44100 / 60 = 735 -> 512
        let g = FrameGeometry::derive(44100, 60, None);
        assert_eq!(g.frame_length, 512);
        assert!((g.samples_per_frame - 735.0).abs() < 1e-3);

        // Exact power of two stays put: 32768 / 64 = 512
        let g = FrameGeometry::derive(32768, 64, None);
        assert_eq!(g.frame_length, 512);
    }

    #[test]
    fn custom_frame_length_overrides_derivation() {
        let g = FrameGeometry::derive(44100, 60, Some(1024));
        assert_eq!(g.frame_length, 1024);
    }

    #[test]
    fn slices_are_zero_padded_past_the_end() {
        let buffer = ramp_buffer(8);
        // Window of 8 starting at the last sample: one real value, then zeros.
        let slices = slice_channels(&buffer, 7, 8, 1.0);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0][0], 7.0 / 8.0);
        assert_eq!(&slices[0][1..], &[0.0; 7]);
    }

    #[test]
    fn fully_out_of_range_frame_is_silent() {
        let buffer = ramp_buffer(8);
        let slices = slice_channels(&buffer, 100, 4, 1.0);
        assert_eq!(slices[0], vec![0.0; 4]);
    }

    #[test]
    fn fractional_frame_offsets_floor() {
        let buffer = ramp_buffer(16);
        // 2.5 samples per frame: frame 3 starts at floor(7.5) = 7.
        let slices = slice_channels(&buffer, 3, 2, 2.5);
        assert_eq!(slices[0][0], 7.0 / 16.0);
        assert_eq!(slices[0][1], 8.0 / 16.0);
    }

    #[test]
    fn extract_preserves_channel_count_independence() {
        // Two opposite channels cancel to silence regardless of geometry.
        let channels = vec![vec![1.0f32; 16], vec![-1.0f32; 16]];
        let buffer = SampleBuffer::new(channels, 16);
        let geometry = FrameGeometry::derive(16, 2, None);
        let frame = extract(&buffer, 0, &geometry);
        assert!(frame.samples.iter().all(|&s| s == 0.0));
        assert_eq!(frame.volume, 0.0);
    }
}

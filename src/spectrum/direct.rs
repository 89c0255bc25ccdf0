use std::sync::Arc;

use crate::audio::SampleBuffer;
use crate::dsp::extract::{extract, FrameGeometry};
use crate::dsp::fft::{FastRealFourierTransform, Radix};
use crate::error::SpectrumError;

use super::{FrameSource, SpectrumFrame};

/// Uncached frame source: every query extracts and transforms
/// synchronously on the calling thread.
///
/// Simpler than the buffered source and always a hit, at the cost of
/// paying the full FFT on every render tick.
#[derive(Debug)]
pub struct DirectFrameSource {
    frame_rate: u32,
    zoom: usize,
    custom_frame_length: Option<usize>,

    buffer: Option<Arc<SampleBuffer>>,
    geometry: Option<FrameGeometry>,
    engine: Option<FastRealFourierTransform>,
}

impl DirectFrameSource {
    pub fn new(
        frame_rate: u32,
        zoom: usize,
        custom_frame_length: Option<usize>,
    ) -> Result<Self, SpectrumError> {
        if zoom < 1 {
            return Err(SpectrumError::InvalidZoom(zoom));
        }
        if let Some(len) = custom_frame_length {
            if len < 2 || !len.is_power_of_two() {
                return Err(SpectrumError::InvalidSize(len));
            }
        }
        Ok(Self {
            frame_rate,
            zoom,
            custom_frame_length,
            buffer: None,
            geometry: None,
            engine: None,
        })
    }
}

impl FrameSource for DirectFrameSource {
    fn set_buffer(&mut self, buffer: Arc<SampleBuffer>) -> Result<(), SpectrumError> {
        let geometry = FrameGeometry::derive(
            buffer.sample_rate(),
            self.frame_rate,
            self.custom_frame_length,
        );
        self.engine = Some(FastRealFourierTransform::new(geometry.frame_length, self.zoom)?);
        self.geometry = Some(geometry);
        self.buffer = Some(buffer);
        Ok(())
    }

    fn is_buffer_set(&self) -> bool {
        self.buffer.is_some()
    }

    fn frame_at(&mut self, index: usize) -> Result<Option<SpectrumFrame>, SpectrumError> {
        let (Some(buffer), Some(geometry), Some(engine)) =
            (self.buffer.as_ref(), self.geometry.as_ref(), self.engine.as_ref())
        else {
            return Err(SpectrumError::BufferNotSet);
        };

        let frame = extract(buffer, index, geometry);
        let magnitudes = engine.transform(&frame.samples, Radix::Four)?;
        Ok(Some(SpectrumFrame { magnitudes, volume: frame.volume }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_buffer(len: usize, period: usize, sample_rate: u32) -> Arc<SampleBuffer> {
        let channel = (0..len)
            .map(|n| (2.0 * std::f32::consts::PI * n as f32 / period as f32).sin())
            .collect();
        Arc::new(SampleBuffer::new(vec![channel], sample_rate))
    }

    #[test]
    fn frame_before_buffer_is_a_programmer_error() {
        let mut source = DirectFrameSource::new(60, 1, None).unwrap();
        assert_eq!(source.frame_at(0).unwrap_err(), SpectrumError::BufferNotSet);
    }

    #[test]
    fn rejects_zoom_zero() {
        assert_eq!(
            DirectFrameSource::new(60, 0, None).unwrap_err(),
            SpectrumError::InvalidZoom(0)
        );
    }

    #[test]
    fn rejects_non_power_of_two_frame_length() {
        assert_eq!(
            DirectFrameSource::new(60, 1, Some(100)).unwrap_err(),
            SpectrumError::InvalidSize(100)
        );
    }

    #[test]
    fn every_query_is_a_hit() {
        let mut source = DirectFrameSource::new(1, 1, None).unwrap();
        source.set_buffer(sine_buffer(256, 16, 64)).unwrap();

        for index in 0..4 {
            assert!(source.frame_at(index).unwrap().is_some());
        }
    }

    #[test]
    fn sine_peaks_at_its_frequency_bin() {
        // 64 samples/frame, period 16 -> the energy sits in bin 4.
        let mut source = DirectFrameSource::new(1, 1, None).unwrap();
        source.set_buffer(sine_buffer(256, 16, 64)).unwrap();

        let frame = source.frame_at(0).unwrap().unwrap();
        assert_eq!(frame.magnitudes.len(), 64);

        let peak_bin = frame.magnitudes[..32]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 4);
        assert!(frame.volume > 1.8 && frame.volume <= 2.0);
    }
}

pub mod cache;
pub mod direct;
pub mod worker;

use std::sync::Arc;

use crate::audio::SampleBuffer;
use crate::error::SpectrumError;

pub use cache::CachedFrameSource;
pub use direct::DirectFrameSource;

/// One frame's worth of spectrum data, immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumFrame {
    /// Non-negative magnitudes, `frame_length * zoom` bins.
    pub magnitudes: Vec<f32>,
    /// Pre-window peak-to-peak amplitude of the channel-averaged frame.
    pub volume: f32,
}

impl SpectrumFrame {
    /// The flat sentinel rendered while no data is available.
    pub fn empty(bins: usize) -> Self {
        Self { magnitudes: vec![0.0; bins], volume: 0.0 }
    }
}

/// A supplier of spectrum frames indexed by `floor(time * frame_rate)`.
///
/// `frame_at` never blocks: a miss returns `Ok(None)` and the caller
/// re-polls on a later tick. Calling it before a buffer is set is a
/// programmer error and is signaled.
pub trait FrameSource {
    fn set_buffer(&mut self, buffer: Arc<SampleBuffer>) -> Result<(), SpectrumError>;

    fn is_buffer_set(&self) -> bool;

    fn frame_at(&mut self, index: usize) -> Result<Option<SpectrumFrame>, SpectrumError>;
}

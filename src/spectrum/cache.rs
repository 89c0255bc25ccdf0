use std::sync::Arc;

use crate::audio::SampleBuffer;
use crate::dsp::extract::{slice_channels, FrameGeometry};
use crate::error::SpectrumError;

use super::worker::{ComputeReply, ComputeRequest, SpectrumWorker};
use super::{FrameSource, SpectrumFrame};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    NotReady,
    Calculating,
    Ready,
}

type WorkerSpawner = Box<dyn Fn() -> SpectrumWorker + Send>;

/// Predictive look-ahead frame cache.
///
/// A fixed ring of `buffer_duration * frame_rate` slots holds precomputed
/// spectrum frames for the window the playback position is expected to
/// move through next. Queries are served from the ring when the slot is
/// READY; misses return immediately while the worker fills the window in
/// the background. Tuned for monotonic-forward playback: advancing by a
/// few frames only recomputes the newly exposed tail, small backward
/// seeks still hit cache, and out-of-window jumps tear the worker down
/// and recompute the whole window.
pub struct CachedFrameSource {
    frame_rate: u32,
    zoom: usize,
    custom_frame_length: Option<usize>,

    buffer: Option<Arc<SampleBuffer>>,
    geometry: Option<FrameGeometry>,

    spawner: WorkerSpawner,
    worker: SpectrumWorker,

    frames: Vec<Option<SpectrumFrame>>,
    states: Vec<SlotState>,
    /// Frame index of the most recent `frame_at` call; the anchor the
    /// valid window `[last, last + capacity)` is measured from.
    last_requested: usize,
}

impl CachedFrameSource {
    pub fn new(
        buffer_duration: f32,
        frame_rate: u32,
        zoom: usize,
        custom_frame_length: Option<usize>,
    ) -> Result<Self, SpectrumError> {
        Self::with_spawner(
            buffer_duration,
            frame_rate,
            zoom,
            custom_frame_length,
            Box::new(SpectrumWorker::spawn),
        )
    }

    fn with_spawner(
        buffer_duration: f32,
        frame_rate: u32,
        zoom: usize,
        custom_frame_length: Option<usize>,
        spawner: WorkerSpawner,
    ) -> Result<Self, SpectrumError> {
        if zoom < 1 {
            return Err(SpectrumError::InvalidZoom(zoom));
        }
        if let Some(len) = custom_frame_length {
            if len < 2 || !len.is_power_of_two() {
                return Err(SpectrumError::InvalidSize(len));
            }
        }

        let capacity = ((buffer_duration * frame_rate as f32).floor() as usize).max(1);
        let worker = spawner();

        Ok(Self {
            frame_rate,
            zoom,
            custom_frame_length,
            buffer: None,
            geometry: None,
            spawner,
            worker,
            frames: vec![None; capacity],
            states: vec![SlotState::NotReady; capacity],
            last_requested: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Replace the worker with a fresh instance. The old one terminates on
    /// its own once its channels disconnect; any replies it still produces
    /// land on an abandoned channel and are never observed.
    fn reset_worker(&mut self) {
        log::debug!("Resetting spectrum worker");
        self.worker = (self.spawner)();
    }

    fn dispatch(&mut self, frame_index: usize) {
        let slot = frame_index % self.capacity();
        let (Some(buffer), Some(geometry)) = (self.buffer.as_ref(), self.geometry.as_ref())
        else {
            return;
        };

        let channels = slice_channels(
            buffer,
            frame_index,
            geometry.frame_length,
            geometry.samples_per_frame,
        );
        self.states[slot] = SlotState::Calculating;
        self.worker.request(ComputeRequest { index: frame_index, channels, zoom: self.zoom });
    }

    fn drain_replies(&mut self) {
        let replies: Vec<ComputeReply> = self.worker.try_iter().collect();
        for reply in replies {
            self.handle_reply(reply);
        }
    }

    /// Store a reply unless it was computed for a now-superseded window.
    /// A stale reply is an expected race, not an error.
    fn handle_reply(&mut self, reply: ComputeReply) {
        let capacity = self.capacity();
        if reply.index < self.last_requested || reply.index >= self.last_requested + capacity {
            log::trace!("Discarding stale reply for frame {}", reply.index);
            return;
        }

        let slot = reply.index % capacity;
        self.frames[slot] = Some(SpectrumFrame {
            magnitudes: reply.magnitudes,
            volume: reply.volume,
        });
        self.states[slot] = SlotState::Ready;
    }
}

impl FrameSource for CachedFrameSource {
    fn set_buffer(&mut self, buffer: Arc<SampleBuffer>) -> Result<(), SpectrumError> {
        let geometry = FrameGeometry::derive(
            buffer.sample_rate(),
            self.frame_rate,
            self.custom_frame_length,
        );
        log::info!(
            "Frame cache: {} slots, window {} samples, {:.1} samples/frame",
            self.capacity(),
            geometry.frame_length,
            geometry.samples_per_frame
        );

        self.buffer = Some(buffer);
        self.geometry = Some(geometry);
        self.last_requested = 0;

        // No reply computed against the old buffer may land after this.
        self.reset_worker();
        self.frames.fill(None);
        self.states.fill(SlotState::NotReady);

        for index in 0..self.capacity() {
            self.dispatch(index);
        }
        Ok(())
    }

    fn is_buffer_set(&self) -> bool {
        self.buffer.is_some()
    }

    fn frame_at(&mut self, index: usize) -> Result<Option<SpectrumFrame>, SpectrumError> {
        if self.buffer.is_none() {
            return Err(SpectrumError::BufferNotSet);
        }
        self.drain_replies();

        let capacity = self.capacity();
        let last = self.last_requested;

        // The five cases of the look-ahead protocol: (frames to recompute,
        // whether the queried slot may be served, whether the jump is a
        // discontinuity that invalidates the worker).
        let (recompute, serve_hit, discontinuity) = if index + capacity <= last {
            // Far backward: the whole window is stale.
            (Some((index, index + capacity - 1)), false, true)
        } else if index < last {
            // Small backward seek: refill the gap, the slot itself may
            // still hold a valid frame.
            (Some((index, last - 1)), true, false)
        } else if index == last {
            (None, true, false)
        } else if index < last + capacity {
            // Forward progression: only the newly exposed tail is missing.
            (Some((last + capacity, index + capacity - 1)), true, false)
        } else {
            // Far forward: jump past everything we precomputed.
            (Some((index, index + capacity - 1)), false, true)
        };

        let mut result = None;
        if serve_hit && self.states[index % capacity] == SlotState::Ready {
            result = self.frames[index % capacity].clone();
        }

        if discontinuity {
            self.reset_worker();
        }
        if let Some((start, end)) = recompute {
            for i in start..=end {
                self.dispatch(i);
            }
        }

        self.last_requested = index;
        Ok(result)
    }
}

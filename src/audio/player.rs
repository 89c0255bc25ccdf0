use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::SampleBuffer;

/// Playback transport: the clock the render loop is synchronized to.
///
/// `time_seconds` is polled once per render tick; the frame index is
/// `floor(time * frame_rate)`.
pub trait Transport {
    fn time_seconds(&self) -> f32;
    fn duration_seconds(&self) -> f32;
    fn is_playing(&self) -> bool;
    fn start(&mut self, at: Option<f32>) -> Result<()>;
    fn stop(&mut self, reset: bool);
    /// Volume in 0..=1.
    fn set_volume(&mut self, volume: f32);
}

/// State shared with the audio callback. The callback owns advancing the
/// position; the control side only ever stores into it on start/stop.
struct PlayerShared {
    /// Next buffer frame the callback will play.
    position: AtomicUsize,
    playing: AtomicBool,
    gain_bits: AtomicU32,
}

/// Plays a decoded buffer on the default output device.
///
/// The playback clock is derived from the number of buffer frames the
/// callback has consumed, so the visualizer stays in sync with what is
/// actually audible rather than with wall time.
pub struct CpalPlayer {
    buffer: Arc<SampleBuffer>,
    shared: Arc<PlayerShared>,
    _stream: cpal::Stream,
}

impl CpalPlayer {
    pub fn new(buffer: Arc<SampleBuffer>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No audio output device found")?;

        let default_config = device
            .default_output_config()
            .context("Failed to query output config")?;
        let out_channels = default_config.channels() as usize;

        let shared = Arc::new(PlayerShared {
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            gain_bits: AtomicU32::new(1.0f32.to_bits()),
        });

        let desired = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(buffer.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err| log::error!("Audio stream error: {}", err);

        let stream = match device.build_output_stream(
            &desired,
            output_callback(Arc::clone(&buffer), Arc::clone(&shared), out_channels),
            err_fn,
            None,
        ) {
            Ok(stream) => stream,
            Err(e) => {
                // The clock counts buffer frames either way, so spectrum
                // sync survives a rate mismatch; only pitch suffers.
                log::warn!(
                    "Device refused {} Hz ({}); falling back to {} Hz",
                    buffer.sample_rate(),
                    e,
                    default_config.sample_rate().0
                );
                device
                    .build_output_stream(
                        &default_config.config(),
                        output_callback(Arc::clone(&buffer), Arc::clone(&shared), out_channels),
                        err_fn,
                        None,
                    )
                    .context("Failed to build audio output stream")?
            }
        };

        stream.play().context("Failed to start audio output stream")?;
        log::info!(
            "Audio output: {} channels on {}",
            out_channels,
            device.name().unwrap_or_else(|_| "unknown device".into())
        );

        Ok(Self { buffer, shared, _stream: stream })
    }
}

fn output_callback(
    buffer: Arc<SampleBuffer>,
    shared: Arc<PlayerShared>,
    out_channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) {
    move |data: &mut [f32], _| fill_output(data, &buffer, &shared, out_channels)
}

fn fill_output(data: &mut [f32], buffer: &SampleBuffer, shared: &PlayerShared, out_channels: usize) {
    data.fill(0.0);
    if !shared.playing.load(Ordering::Relaxed) {
        return;
    }

    let gain = f32::from_bits(shared.gain_bits.load(Ordering::Relaxed));
    let mut position = shared.position.load(Ordering::Relaxed);
    let len = buffer.len();
    let src_channels = buffer.num_channels();

    let mut finished = false;
    for frame in data.chunks_mut(out_channels) {
        if position >= len {
            finished = true;
            break;
        }
        for (c, sample) in frame.iter_mut().enumerate() {
            *sample = buffer.channel(c % src_channels)[position] * gain;
        }
        position += 1;
    }

    // A control-side stop may have reset the position while this
    // callback was filling; its reset wins over our advance.
    if shared.playing.load(Ordering::Relaxed) {
        shared.position.store(position, Ordering::Relaxed);
        if finished {
            shared.playing.store(false, Ordering::Relaxed);
        }
    }
}

impl Transport for CpalPlayer {
    fn time_seconds(&self) -> f32 {
        self.shared.position.load(Ordering::Relaxed) as f32 / self.buffer.sample_rate() as f32
    }

    fn duration_seconds(&self) -> f32 {
        self.buffer.duration_seconds()
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    fn start(&mut self, at: Option<f32>) -> Result<()> {
        if let Some(seconds) = at {
            let frame = (seconds.max(0.0) as f64 * self.buffer.sample_rate() as f64) as usize;
            self.shared.position.store(frame.min(self.buffer.len()), Ordering::Relaxed);
        }
        self.shared.playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self, reset: bool) {
        self.shared.playing.store(false, Ordering::Relaxed);
        if reset {
            self.shared.position.store(0, Ordering::Relaxed);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared
            .gain_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// Silent transport for machines with no audio device: the same clock
/// surface, driven by wall time.
pub struct WallClock {
    duration: f32,
    playing: bool,
    anchor: Instant,
    /// Playback position at the last start/stop transition.
    offset: f32,
}

impl WallClock {
    pub fn new(duration: f32) -> Self {
        Self { duration, playing: false, anchor: Instant::now(), offset: 0.0 }
    }

    fn current(&self) -> f32 {
        if self.playing {
            (self.offset + self.anchor.elapsed().as_secs_f32()).min(self.duration)
        } else {
            self.offset
        }
    }
}

impl Transport for WallClock {
    fn time_seconds(&self) -> f32 {
        self.current()
    }

    fn duration_seconds(&self) -> f32 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing && self.current() < self.duration
    }

    fn start(&mut self, at: Option<f32>) -> Result<()> {
        if let Some(seconds) = at {
            self.offset = seconds.clamp(0.0, self.duration);
        }
        self.anchor = Instant::now();
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self, reset: bool) {
        self.offset = if reset { 0.0 } else { self.current() };
        self.playing = false;
    }

    fn set_volume(&mut self, _volume: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn shared(playing: bool, position: usize, gain: f32) -> PlayerShared {
        PlayerShared {
            position: AtomicUsize::new(position),
            playing: AtomicBool::new(playing),
            gain_bits: AtomicU32::new(gain.to_bits()),
        }
    }

    #[test]
    fn callback_upmixes_and_advances() {
        let buffer = SampleBuffer::new(vec![vec![0.1, 0.2, 0.3, 0.4]], 4);
        let shared = shared(true, 1, 0.5);

        // Mono source into a stereo device: both slots get the channel.
        let mut data = [1.0f32; 4];
        fill_output(&mut data, &buffer, &shared, 2);

        assert_eq!(data, [0.1, 0.1, 0.15, 0.15]);
        assert_eq!(shared.position.load(Ordering::Relaxed), 3);
        assert!(shared.playing.load(Ordering::Relaxed));
    }

    #[test]
    fn callback_pads_silence_and_stops_at_the_end() {
        let buffer = SampleBuffer::new(vec![vec![0.5, 0.5]], 4);
        let shared = shared(true, 0, 1.0);

        let mut data = [1.0f32; 4];
        fill_output(&mut data, &buffer, &shared, 1);

        assert_eq!(data, [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(shared.position.load(Ordering::Relaxed), 2);
        assert!(!shared.playing.load(Ordering::Relaxed));
    }

    #[test]
    fn callback_never_moves_a_stopped_position() {
        // A stop-with-reset must not be overwritten by a late callback.
        let buffer = SampleBuffer::new(vec![vec![0.5; 8]], 4);
        let shared = shared(false, 0, 1.0);

        let mut data = [1.0f32; 4];
        fill_output(&mut data, &buffer, &shared, 1);

        assert_eq!(data, [0.0; 4]);
        assert_eq!(shared.position.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn wall_clock_advances_only_while_playing() {
        let mut clock = WallClock::new(10.0);
        assert_eq!(clock.time_seconds(), 0.0);
        assert!(!clock.is_playing());

        clock.start(None).unwrap();
        thread::sleep(Duration::from_millis(30));
        let running = clock.time_seconds();
        assert!(running > 0.0);
        assert!(clock.is_playing());

        clock.stop(false);
        let stopped = clock.time_seconds();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.time_seconds(), stopped);
        assert!(stopped >= running);
    }

    #[test]
    fn wall_clock_stop_with_reset_rewinds() {
        let mut clock = WallClock::new(10.0);
        clock.start(Some(5.0)).unwrap();
        clock.stop(true);
        assert_eq!(clock.time_seconds(), 0.0);
    }

    #[test]
    fn wall_clock_finishes_at_duration() {
        let mut clock = WallClock::new(0.01);
        clock.start(None).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(!clock.is_playing());
        assert_eq!(clock.time_seconds(), 0.01);
    }
}

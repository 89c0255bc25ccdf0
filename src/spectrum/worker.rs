use crossbeam_channel::{unbounded, Receiver, Sender, TryIter};
use std::thread;

use crate::dsp::fft::{FastRealFourierTransform, Radix};
use crate::dsp::window::combine_and_window;

/// Single-frame compute request crossing the worker boundary.
///
/// Carries owned per-channel sample windows; nothing is shared with the
/// worker beyond the channel itself.
pub struct ComputeRequest {
    pub index: usize,
    pub channels: Vec<Vec<f32>>,
    pub zoom: usize,
}

/// Worker reply for one request. Replies may arrive in any order.
pub struct ComputeReply {
    pub index: usize,
    pub magnitudes: Vec<f32>,
    pub volume: f32,
}

/// A dedicated compute thread owning one long-lived FFT engine.
///
/// The engine is built on the first request (which reveals the window
/// length) and rebuilt whenever the window length or zoom changes.
///
/// Dropping the handle disconnects the request channel; once the owner's
/// reply receiver is gone as well, the thread's next send fails and it
/// exits. Replies from a dropped instance are unreachable by construction,
/// so they can never be mistaken for a newer instance's output.
pub struct SpectrumWorker {
    requests: Option<Sender<ComputeRequest>>,
    replies: Receiver<ComputeReply>,
}

impl SpectrumWorker {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();

        let spawned = thread::Builder::new()
            .name("spectrum-worker".into())
            .spawn(move || run(request_rx, reply_tx));

        match spawned {
            Ok(_) => Self { requests: Some(request_tx), replies: reply_rx },
            Err(e) => {
                // Degrade to a disconnected boundary: requests are dropped
                // and the visualizer renders empty frames.
                log::error!("Failed to spawn spectrum worker: {}", e);
                Self { requests: None, replies: reply_rx }
            }
        }
    }

    pub fn request(&self, request: ComputeRequest) {
        let Some(requests) = &self.requests else {
            log::debug!("No spectrum worker; dropping request {}", request.index);
            return;
        };
        if requests.send(request).is_err() {
            log::warn!("Spectrum worker is gone; dropping request");
        }
    }

    /// Drain whatever replies have arrived so far, without blocking.
    pub fn try_iter(&self) -> TryIter<'_, ComputeReply> {
        self.replies.try_iter()
    }

    /// A channel pair with no thread behind it, letting tests observe
    /// dispatched requests and inject replies deterministically.
    #[cfg(test)]
    pub(crate) fn stub() -> (Self, Receiver<ComputeRequest>, Sender<ComputeReply>) {
        let (request_tx, request_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();
        let worker = Self { requests: Some(request_tx), replies: reply_rx };
        (worker, request_rx, reply_tx)
    }
}

fn run(requests: Receiver<ComputeRequest>, replies: Sender<ComputeReply>) {
    let mut engine: Option<FastRealFourierTransform> = None;

    for request in requests.iter() {
        let frame = combine_and_window(&request.channels);
        let size = frame.samples.len();

        let rebuild = engine
            .as_ref()
            .map_or(true, |e| e.size() != size || e.zoom() != request.zoom);
        if rebuild {
            match FastRealFourierTransform::new(size, request.zoom) {
                Ok(e) => {
                    log::debug!("Built FFT engine: size={}, zoom={}", size, request.zoom);
                    engine = Some(e);
                }
                Err(e) => {
                    log::error!("Cannot build FFT engine for frame {}: {}", request.index, e);
                    engine = None;
                    continue;
                }
            }
        }
        let Some(fft) = engine.as_ref() else { continue };

        match fft.transform(&frame.samples, Radix::Four) {
            Ok(magnitudes) => {
                let reply = ComputeReply {
                    index: request.index,
                    magnitudes,
                    volume: frame.volume,
                };
                // Owner dropped its receiver: this instance is dead.
                if replies.send(reply).is_err() {
                    break;
                }
            }
            Err(e) => log::error!("Transform failed for frame {}: {}", request.index, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sine_channels(len: usize, period: usize) -> Vec<Vec<f32>> {
        let channel = (0..len)
            .map(|n| (2.0 * std::f32::consts::PI * n as f32 / period as f32).sin())
            .collect();
        vec![channel]
    }

    fn recv_reply(worker: &SpectrumWorker) -> ComputeReply {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(reply) = worker.try_iter().next() {
                return reply;
            }
            assert!(std::time::Instant::now() < deadline, "no reply within deadline");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn one_reply_per_request() {
        let worker = SpectrumWorker::spawn();

        for index in 0..4 {
            worker.request(ComputeRequest {
                index,
                channels: sine_channels(64, 16),
                zoom: 2,
            });
        }

        let mut seen: Vec<usize> = (0..4).map(|_| recv_reply(&worker).index).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(worker.try_iter().next().is_none());
    }

    #[test]
    fn reply_has_oversampled_length_and_volume() {
        let worker = SpectrumWorker::spawn();
        worker.request(ComputeRequest {
            index: 7,
            channels: sine_channels(64, 16),
            zoom: 3,
        });

        let reply = recv_reply(&worker);
        assert_eq!(reply.index, 7);
        assert_eq!(reply.magnitudes.len(), 64 * 3);
        // Full-scale sine: peak-to-peak close to 2.
        assert!(reply.volume > 1.8 && reply.volume <= 2.0);
    }

    #[test]
    fn engine_follows_window_length_changes() {
        let worker = SpectrumWorker::spawn();

        worker.request(ComputeRequest { index: 0, channels: sine_channels(32, 8), zoom: 1 });
        assert_eq!(recv_reply(&worker).magnitudes.len(), 32);

        worker.request(ComputeRequest { index: 1, channels: sine_channels(128, 8), zoom: 1 });
        assert_eq!(recv_reply(&worker).magnitudes.len(), 128);
    }
}

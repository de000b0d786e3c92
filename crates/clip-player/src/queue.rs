//! Bounded sample queue shared by the playback stages.
//!
//! Every clip session is a short chain of these queues:
//! decode thread → [`SampleQueue`] → (resampler thread → [`SampleQueue`]) → CPAL callback.
//!
//! Producers block while the queue is full; the output callback only ever takes what is
//! already there. [`SampleQueue::close`] ends the chain from either side: producers stop
//! pushing, and consumers drain what is left and then see `None`. A producer that gives up
//! early uses [`SampleQueue::fail`] instead, so the consumer can tell a broken clip from a
//! finished one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// How often a cancellable wait re-checks its flag.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Thread-safe bounded queue of interleaved `f32` samples.
///
/// Capacity is counted in samples, not frames. The channel count is fixed when the
/// queue is created.
pub struct SampleQueue {
    channels: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
    max_buffered_samples: usize,
}

struct QueueInner {
    samples: VecDeque<f32>,
    closed: bool,
    failure: Option<String>,
}

/// How [`SampleQueue::pop`] waits for data.
pub enum PopStrategy {
    /// Wait for exactly `frames`; `None` if the queue closes first.
    BlockingExact { frames: usize },
    /// Wait for at least one frame, then take up to `max_frames`.
    BlockingUpTo { max_frames: usize },
    /// Take up to `max_frames` of what is buffered right now.
    NonBlocking { max_frames: usize },
}

/// Queue capacity in samples holding `buffer_seconds` of audio.
///
/// Non-finite or non-positive durations fall back to two seconds.
pub fn calc_max_buffered_samples(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };

    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels).max(channels)
}

impl SampleQueue {
    pub fn new(channels: usize, max_buffered_samples: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            inner: Mutex::new(QueueInner {
                samples: VecDeque::new(),
                closed: false,
                failure: None,
            }),
            cv: Condvar::new(),
            max_buffered_samples: max_buffered_samples.max(channels),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames buffered at the time of the call.
    pub fn len_frames(&self) -> usize {
        self.lock().samples.len() / self.channels
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Stop accepting samples and wake every waiter. Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.cv.notify_all();
    }

    /// Close the queue because the producer failed.
    ///
    /// The reason is only recorded while the queue is still open; a queue the consumer
    /// already closed stays a plain close.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut g = self.lock();
        if !g.closed {
            g.failure = Some(reason.into());
            g.closed = true;
        }
        drop(g);
        self.cv.notify_all();
    }

    /// Why the producer stopped early, if it did.
    pub fn failure(&self) -> Option<String> {
        self.lock().failure.clone()
    }

    /// Push samples, blocking while the queue is full.
    ///
    /// Returns `false` if the queue was closed before everything was pushed; the rest is
    /// dropped.
    pub fn push_interleaved_blocking(&self, samples: &[f32]) -> bool {
        let mut offset = 0;

        while offset < samples.len() {
            let mut g = self.lock();
            while g.samples.len() >= self.max_buffered_samples && !g.closed {
                g = self.cv.wait(g).unwrap_or_else(|err| err.into_inner());
            }
            if g.closed {
                return false;
            }

            let room = self.max_buffered_samples - g.samples.len();
            let end = (offset + room).min(samples.len());
            g.samples.extend(&samples[offset..end]);
            offset = end;

            drop(g);
            self.cv.notify_all();
        }
        true
    }

    /// Pop whole frames according to `strategy`.
    pub fn pop(&self, strategy: PopStrategy) -> Option<Vec<f32>> {
        let mut g = self.lock();
        let take_frames = match strategy {
            PopStrategy::BlockingExact { frames } => {
                let want = frames * self.channels;
                while g.samples.len() < want && !g.closed {
                    g = self.cv.wait(g).unwrap_or_else(|err| err.into_inner());
                }
                if g.samples.len() < want {
                    return None;
                }
                frames
            }
            PopStrategy::BlockingUpTo { max_frames } => {
                while g.samples.len() < self.channels && !g.closed {
                    g = self.cv.wait(g).unwrap_or_else(|err| err.into_inner());
                }
                (g.samples.len() / self.channels).min(max_frames)
            }
            PopStrategy::NonBlocking { max_frames } => {
                (g.samples.len() / self.channels).min(max_frames)
            }
        };

        if take_frames == 0 {
            return None;
        }
        let out: Vec<f32> = g.samples.drain(..take_frames * self.channels).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Block until the queue is closed and empty, or `cancel` is raised.
    ///
    /// Returns `true` when the queue drained, `false` when cancelled.
    pub fn wait_drained_or_cancel(&self, cancel: &AtomicBool) -> bool {
        let mut g = self.lock();
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if g.closed && g.samples.len() < self.channels {
                return true;
            }
            let (next, _timeout) = self
                .cv
                .wait_timeout(g, CANCEL_POLL)
                .unwrap_or_else(|err| err.into_inner());
            g = next;
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Closes a producer's output queue when the producer thread exits.
///
/// If the thread is unwinding from a panic the queue is failed instead, so the session
/// waiting on it ends with an error rather than waiting forever.
pub struct ProducerGuard(Arc<SampleQueue>);

impl ProducerGuard {
    pub fn new(queue: Arc<SampleQueue>) -> Self {
        Self(queue)
    }
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.fail("producer thread panicked");
        } else {
            self.0.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calc_max_buffered_samples_fallbacks() {
        assert_eq!(calc_max_buffered_samples(48_000, 2, 2.0), 192_000);
        assert_eq!(calc_max_buffered_samples(48_000, 2, -1.0), 192_000);
        assert_eq!(calc_max_buffered_samples(48_000, 2, f32::NAN), 192_000);
        assert_eq!(calc_max_buffered_samples(44_100, 1, 0.5), 22_050);
    }

    #[test]
    fn pop_nonblocking_empty() {
        let q = SampleQueue::new(2, 16);
        assert!(q.pop(PopStrategy::NonBlocking { max_frames: 4 }).is_none());
    }

    #[test]
    fn pop_nonblocking_returns_whole_frames() {
        let q = SampleQueue::new(2, 64);
        q.push_interleaved_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let out = q.pop(PopStrategy::NonBlocking { max_frames: 8 }).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(q.len_frames(), 0);
    }

    #[test]
    fn pop_blocking_exact_waits_for_full_frames() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let q_pop = q.clone();

        let handle = thread::spawn(move || q_pop.pop(PopStrategy::BlockingExact { frames: 3 }));

        q.push_interleaved_blocking(&[0.1, 0.2, 0.3, 0.4]);
        q.push_interleaved_blocking(&[0.5, 0.6]);

        assert_eq!(handle.join().unwrap().unwrap().len(), 6);
    }

    #[test]
    fn pop_blocking_up_to_drains_tail_then_sees_close() {
        let q = Arc::new(SampleQueue::new(2, 64));
        q.push_interleaved_blocking(&[1.0, 2.0, 3.0, 4.0]);
        q.close();

        let out = q.pop(PopStrategy::BlockingUpTo { max_frames: 8 }).unwrap();
        assert_eq!(out.len(), 4);
        assert!(q.pop(PopStrategy::BlockingUpTo { max_frames: 8 }).is_none());
    }

    #[test]
    fn pop_blocking_exact_returns_none_when_closed_short() {
        let q = SampleQueue::new(2, 64);
        q.push_interleaved_blocking(&[1.0, 2.0]);
        q.close();
        assert!(q.pop(PopStrategy::BlockingExact { frames: 2 }).is_none());
    }

    #[test]
    fn push_unblocks_when_closed() {
        let q = Arc::new(SampleQueue::new(1, 4));
        let q_push = q.clone();

        let handle = thread::spawn(move || q_push.push_interleaved_blocking(&[0.0; 16]));
        thread::sleep(Duration::from_millis(20));
        q.close();

        assert!(!handle.join().unwrap());
        assert!(q.len_frames() <= 4);
    }

    #[test]
    fn push_after_close_is_refused() {
        let q = SampleQueue::new(2, 64);
        q.close();
        assert!(!q.push_interleaved_blocking(&[1.0, 2.0]));
        assert!(q.is_closed());
    }

    #[test]
    fn wait_drained_returns_true_once_closed_and_empty() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let cancel = AtomicBool::new(false);
        q.push_interleaved_blocking(&[1.0, 2.0]);
        q.close();

        let q_pop = q.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            q_pop.pop(PopStrategy::NonBlocking { max_frames: 1 });
        });

        assert!(q.wait_drained_or_cancel(&cancel));
        handle.join().unwrap();
    }

    #[test]
    fn wait_drained_respects_cancel() {
        let q = SampleQueue::new(2, 64);
        let cancel = AtomicBool::new(true);
        assert!(!q.wait_drained_or_cancel(&cancel));
    }

    #[test]
    fn fail_closes_and_keeps_reason() {
        let q = SampleQueue::new(2, 64);
        q.push_interleaved_blocking(&[1.0, 2.0]);
        q.fail("resample: output buffer too small");

        assert!(q.is_closed());
        assert_eq!(q.failure().as_deref(), Some("resample: output buffer too small"));
        assert!(q.pop(PopStrategy::BlockingUpTo { max_frames: 4 }).is_some());
        assert!(q.wait_drained_or_cancel(&AtomicBool::new(false)));
    }

    #[test]
    fn fail_after_close_is_a_plain_close() {
        let q = SampleQueue::new(2, 64);
        q.close();
        q.fail("too late");
        assert!(q.failure().is_none());
    }

    #[test]
    fn guard_closes_on_normal_exit() {
        let q = Arc::new(SampleQueue::new(1, 8));
        let q_thread = q.clone();
        thread::spawn(move || {
            let _guard = ProducerGuard::new(q_thread.clone());
            q_thread.push_interleaved_blocking(&[0.5]);
        })
        .join()
        .unwrap();

        assert!(q.is_closed());
        assert!(q.failure().is_none());
    }

    #[test]
    fn guard_fails_queue_when_producer_panics() {
        let q = Arc::new(SampleQueue::new(1, 8));
        let q_thread = q.clone();
        let joined: thread::Result<()> = thread::spawn(move || {
            let _guard = ProducerGuard::new(q_thread);
            panic!("malformed packet");
        })
        .join();

        assert!(joined.is_err());
        assert!(q.failure().is_some());
        assert!(q.wait_drained_or_cancel(&AtomicBool::new(false)));
    }
}

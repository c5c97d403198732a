use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::Frame;

/// Fixed-capacity ring of the most recent frames.
///
/// Sized to `pre_roll_seconds * frame_rate` and filled from the capture path
/// on every cycle, independent of recording state. Flushed once at session
/// start so the output contains footage preceding the trigger instant.
/// Mutex-guarded so a start-triggered flush observes a consistent snapshot
/// even if the capture path ever moves to its own thread.
pub struct PrerollBuffer {
    inner: Mutex<Ring>,
}

struct Ring {
    frames: VecDeque<Frame>,
    capacity: usize,
    dropped: u64,
}

impl PrerollBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ring {
                frames: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                dropped: 0,
            }),
        }
    }

    /// Ring sized for `seconds` of video at `fps`.
    pub fn for_duration(seconds: u32, fps: u32) -> Self {
        Self::new((seconds as usize) * (fps as usize))
    }

    pub fn push(&self, frame: Frame) {
        let mut g = self.inner.lock().expect("lock poisoned");
        if g.frames.len() >= g.capacity {
            g.frames.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.frames.push_back(frame);
    }

    /// Consistent copy of the buffered frames, oldest first.
    pub fn snapshot(&self) -> Vec<Frame> {
        let g = self.inner.lock().expect("lock poisoned");
        g.frames.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("lock poisoned").capacity
    }

    /// Frames discarded because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").dropped
    }
}

//! Fixed-capacity sample buffers.

use std::collections::VecDeque;

/// Ring buffer that evicts the oldest sample once full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, returning the evicted one if the buffer was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Simple moving average over the last `window` samples, O(1) per update.
///
/// Non-finite samples are dropped so the running sum stays finite.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    buffer: RingBuffer<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            buffer: RingBuffer::new(window),
            sum: 0.0,
        }
    }

    /// Add a sample and return the current mean. A non-finite `value` is
    /// ignored and the previous mean returned.
    pub fn push(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.mean();
        }
        if let Some(old) = self.buffer.push(value) {
            self.sum -= old;
        }
        self.sum += value;
        self.mean()
    }

    /// Mean of the buffered samples, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum / self.buffer.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.sum = 0.0;
    }
}

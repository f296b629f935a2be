//! Animation clocks
//!
//! Movement is driven by wall-clock time read once per UI frame, separate
//! from the audio clock that counts rendered frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Lock-free f64 cell.
///
/// Uses AtomicU64 internally since there's no native AtomicF64.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Source of animation time in seconds
pub trait Clock: Send {
    fn now(&self) -> f64;
}

/// Monotonic time since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Externally driven clock.
///
/// Clones share the same time, so a test (or a browser frame callback)
/// can keep one handle and give another to the engine.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    time: Arc<AtomicF64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.time.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.time.set(self.time.get() + seconds);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> f64 {
        self.time.get()
    }
}

//! Audio context
//!
//! Created by [`Engine::start`](crate::engine::Engine::start). Holds the
//! audio clock (a count of rendered frames) and the render-time settings
//! every voice graph is built with.

use crate::config::EngineConfig;
use crate::spatial::Spatializer;

#[derive(Debug, Clone)]
pub struct AudioContext {
    sample_rate: f64,
    frame: u64,
    pub use_filters: bool,
    pub noise_buffer_seconds: f64,
    pub fade_time: f64,
    pub position_ramp: f64,
    pub spatializer: Spatializer,
}

impl AudioContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            frame: 0,
            use_filters: config.use_filters,
            noise_buffer_seconds: config.noise_buffer_seconds,
            fade_time: config.fade_time,
            position_ramp: config.position_ramp,
            spatializer: config.spatializer,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Convert seconds to a whole number of frames
    pub fn frames(&self, seconds: f64) -> u64 {
        let frames = (seconds * self.sample_rate).round();
        if frames.is_finite() && frames > 0.0 {
            frames as u64
        } else {
            0
        }
    }

    /// Frames rendered so far
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    pub(crate) fn advance(&mut self, frames: u64) {
        self.frame += frames;
    }
}

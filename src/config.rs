//! Engine configuration
//!
//! Every field has a serde default so a partial JSON document (or `{}`)
//! yields a usable configuration.

use crate::movement::MovementAnchor;
use crate::spatial::Spatializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Output sample rate of the audio context
    #[serde(default = "EngineConfig::default_sample_rate")]
    pub sample_rate: f64,
    /// Fade-in / fade-out duration in seconds
    #[serde(default = "EngineConfig::default_fade_time")]
    pub fade_time: f64,
    /// Panner position smoothing horizon in seconds
    #[serde(default = "EngineConfig::default_position_ramp")]
    pub position_ramp: f64,
    /// Width of the room in spatial units
    #[serde(default = "EngineConfig::default_room_scale")]
    pub room_scale: f64,
    /// Insert the per-kind coloring filter between sources and the panner
    #[serde(default)]
    pub use_filters: bool,
    /// Allow stream-backed sound definitions
    #[serde(default = "EngineConfig::default_enable_streaming")]
    pub enable_streaming: bool,
    /// Length of the looped procedural noise buffers in seconds
    #[serde(default = "EngineConfig::default_noise_buffer_seconds")]
    pub noise_buffer_seconds: f64,
    /// Point that movement offsets are applied to
    #[serde(default)]
    pub movement_anchor: MovementAnchor,
    /// Distance attenuation applied by every voice's panner
    #[serde(default)]
    pub spatializer: Spatializer,
}

impl EngineConfig {
    fn default_sample_rate() -> f64 {
        44_100.0
    }
    fn default_fade_time() -> f64 {
        0.5
    }
    fn default_position_ramp() -> f64 {
        0.1
    }
    fn default_room_scale() -> f64 {
        15.0
    }
    fn default_enable_streaming() -> bool {
        true
    }
    fn default_noise_buffer_seconds() -> f64 {
        2.0
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_filters(mut self, use_filters: bool) -> Self {
        self.use_filters = use_filters;
        self
    }

    pub fn with_movement_anchor(mut self, anchor: MovementAnchor) -> Self {
        self.movement_anchor = anchor;
        self
    }

    pub fn with_spatializer(mut self, spatializer: Spatializer) -> Self {
        self.spatializer = spatializer;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::default_sample_rate(),
            fade_time: Self::default_fade_time(),
            position_ramp: Self::default_position_ramp(),
            room_scale: Self::default_room_scale(),
            use_filters: false,
            enable_streaming: Self::default_enable_streaming(),
            noise_buffer_seconds: Self::default_noise_buffer_seconds(),
            movement_anchor: MovementAnchor::default(),
            spatializer: Spatializer::default(),
        }
    }
}

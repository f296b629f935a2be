//! SpatiaEngine - Main WASM interface for the spatial audio engine

use super::error::js_err;
use crate::clock::VirtualClock;
use crate::config::EngineConfig;
use crate::engine::{Engine, PositionUpdate};
use crate::movement::MovementKind;
use crate::scene::SceneDocument;
use crate::spatial::Position;
use crate::voice::VoiceId;
use wasm_bindgen::prelude::*;

/// Main WASM interface for the spatial audio engine
///
/// Voice ids cross the boundary as plain numbers; scenes and catalogs as
/// JSON strings.
#[wasm_bindgen]
pub struct SpatiaEngine {
    engine: Engine,
    clock: VirtualClock,
}

fn voice_id(id: f64) -> VoiceId {
    VoiceId(id as u64)
}

impl SpatiaEngine {
    fn with_config(config: EngineConfig) -> Self {
        // Initialize panic hook for better error messages
        console_error_panic_hook::set_once();

        let clock = VirtualClock::new();
        Self {
            engine: Engine::new(config).with_clock(clock.clone()),
            clock,
        }
    }
}

#[wasm_bindgen]
impl SpatiaEngine {
    /// Create an engine with default settings at `sample_rate`
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64) -> Self {
        Self::with_config(EngineConfig::default().with_sample_rate(sample_rate))
    }

    /// Create an engine from a JSON configuration
    pub fn from_config(config_json: &str) -> Result<SpatiaEngine, JsValue> {
        let config = EngineConfig::from_json(config_json).map_err(js_err)?;
        Ok(Self::with_config(config))
    }

    /// Create the audio context; call from the first user gesture
    pub fn start(&mut self) {
        self.engine.start();
    }

    #[wasm_bindgen(getter)]
    pub fn ready(&self) -> bool {
        self.engine.is_ready()
    }

    #[wasm_bindgen(getter)]
    pub fn sample_rate(&self) -> f64 {
        self.engine.config().sample_rate
    }

    /// Dock definitions as a JSON array
    pub fn catalog(&self) -> Result<String, JsValue> {
        let definitions: Vec<_> = self
            .engine
            .definitions()
            .iter()
            .map(|d| (**d).clone())
            .collect();
        serde_json::to_string(&definitions).map_err(js_err)
    }

    // =========================================================================
    // Voices
    // =========================================================================

    /// Spawn an instance of a dock definition; returns its voice id
    pub fn spawn(&mut self, definition_id: &str, x: f64, z: f64) -> Result<f64, JsValue> {
        self.engine
            .spawn(definition_id, Position::new(x, z))
            .map(|id| id.0 as f64)
            .map_err(js_err)
    }

    pub fn activate(&mut self, id: f64, x: f64, z: f64) -> Result<(), JsValue> {
        self.engine
            .activate(voice_id(id), Position::new(x, z))
            .map_err(js_err)
    }

    pub fn deactivate(&mut self, id: f64) -> Result<(), JsValue> {
        self.engine.deactivate(voice_id(id)).map_err(js_err)
    }

    pub fn return_to_dock(&mut self, id: f64) -> Result<(), JsValue> {
        self.engine.return_to_dock(voice_id(id)).map_err(js_err)
    }

    /// Move a voice; returns false when the voice is not active
    pub fn update_position(&mut self, id: f64, x: f64, z: f64) -> Result<bool, JsValue> {
        self.engine
            .update_position(voice_id(id), x, z)
            .map(|update| update == PositionUpdate::Applied)
            .map_err(js_err)
    }

    /// Move a voice to a drop point given as fractions of the room view
    pub fn drop_at(&mut self, id: f64, nx: f64, nz: f64) -> Result<bool, JsValue> {
        let point = self.engine.room_point(nx, nz);
        self.update_position(id, point.x, point.z)
    }

    pub fn set_movement(
        &mut self,
        id: f64,
        kind: &str,
        speed: f64,
        distance: f64,
    ) -> Result<(), JsValue> {
        let kind: MovementKind = kind.parse().map_err(js_err)?;
        self.engine
            .set_movement(voice_id(id), kind, speed, distance)
            .map_err(js_err)
    }

    /// Returns the clamped volume
    pub fn set_volume(&mut self, id: f64, volume: f64) -> Result<f64, JsValue> {
        self.engine.set_volume(voice_id(id), volume).map_err(js_err)
    }

    #[wasm_bindgen(getter)]
    pub fn active_count(&self) -> usize {
        self.engine.active_voices().len()
    }

    // =========================================================================
    // Uploads
    // =========================================================================

    /// Add an uploaded file to the dock; returns the definition id
    pub fn add_custom_sound(&mut self, file_name: &str, bytes: &[u8]) -> Result<String, JsValue> {
        self.engine
            .add_custom_sound(file_name, bytes.to_vec(), None)
            .map_err(js_err)
    }

    /// Returns the number of voices removed
    pub fn remove_definition(&mut self, definition_id: &str) -> Result<usize, JsValue> {
        self.engine.remove_definition(definition_id).map_err(js_err)
    }

    // =========================================================================
    // Scenes
    // =========================================================================

    pub fn export_scene(&self) -> Result<String, JsValue> {
        self.engine
            .export_scene()
            .to_json()
            .map_err(js_err)
    }

    /// Import a scene; returns `{ "activated": [ids], "failures": [messages] }`
    pub fn import_scene(&mut self, json: &str) -> Result<String, JsValue> {
        let doc = SceneDocument::from_json(json).map_err(js_err)?;
        let report = self.engine.import_scene(&doc).map_err(js_err)?;

        let activated: Vec<u64> = report.activated.iter().map(|id| id.0).collect();
        let failures: Vec<String> = report.failures.iter().map(|e| e.to_string()).collect();
        Ok(serde_json::json!({
            "activated": activated,
            "failures": failures,
        })
        .to_string())
    }

    // =========================================================================
    // Audio Processing
    // =========================================================================

    /// Advance movement; pass the `requestAnimationFrame` timestamp
    pub fn on_frame(&mut self, timestamp_ms: f64) -> usize {
        self.clock.set(timestamp_ms / 1000.0);
        self.engine.on_frame()
    }

    /// Render a block and return interleaved stereo Float32Array
    ///
    /// Output is safety-clamped to ±1 to protect speakers from runaway
    /// signals.
    pub fn process_block(&mut self, num_samples: usize) -> js_sys::Float32Array {
        const SAFETY_LIMIT: f32 = 1.0;

        let mut block = vec![0.0_f32; num_samples * 2];
        self.engine.render(&mut block);
        for sample in &mut block {
            *sample = sample.clamp(-SAFETY_LIMIT, SAFETY_LIMIT);
        }
        js_sys::Float32Array::from(block.as_slice())
    }
}

//! The engine session
//!
//! [`Engine`] owns everything a running room needs: the audio context, every
//! voice (dock templates and placed instances), the teardown queue on the
//! audio clock and the movement scheduler on the animation clock. A UI
//! drives it through the methods below and pulls audio with
//! [`Engine::render`].
//!
//! ```no_run
//! use spatia::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.start();
//! let rain = engine.spawn("rain", Position::new(2.0, -3.0))?;
//! engine.set_movement(rain, MovementKind::Circle, 1.0, 3.0)?;
//!
//! let mut block = vec![0.0_f32; 1024];
//! engine.on_frame();
//! engine.render(&mut block);
//! # Ok::<(), spatia::EngineError>(())
//! ```

use crate::catalog::{default_catalog, SoundDefinition};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::context::AudioContext;
use crate::error::EngineError;
use crate::movement::{MovementKind, MovementProfile, MovementScheduler};
use crate::scene::{self, ActivationRequest, RequestSource, SceneDocument};
use crate::schedule::TeardownQueue;
use crate::source::{
    AudioDecoder, EmbeddedAudio, SourceKind, StreamConnector, StreamHandle, WavDecoder,
};
use crate::spatial::Position;
use crate::voice::{Activation, Voice, VoiceId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Frames rendered per block by [`Engine::advance`]
const ADVANCE_BLOCK: usize = 512;

/// Result of a position update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionUpdate {
    Applied,
    /// The voice is not active, so there is no panner to move
    Ignored,
}

/// Graph allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub graphs_built: u64,
    pub graphs_torn_down: u64,
}

/// Outcome of a scene import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Voices activated from the document, in document order
    pub activated: Vec<VoiceId>,
    /// Entries that were skipped
    pub failures: Vec<EngineError>,
}

impl ImportReport {
    /// Whether any entry failed to load
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn asset_missing_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|e| matches!(e, EngineError::AssetMissing { .. }))
            .count()
    }
}

/// A spatial audio session
pub struct Engine {
    config: EngineConfig,
    context: Option<AudioContext>,
    voices: BTreeMap<VoiceId, Voice>,
    next_voice: u64,
    next_definition: u64,
    teardowns: TeardownQueue,
    movement: MovementScheduler,
    clock: Box<dyn Clock>,
    decoder: Box<dyn AudioDecoder>,
    connector: Option<Box<dyn StreamConnector>>,
    stats: EngineStats,
}

impl Engine {
    /// Create an engine with the built-in catalog in the dock. No audio is
    /// produced until [`Engine::start`].
    pub fn new(config: EngineConfig) -> Self {
        let mut engine = Self {
            config,
            context: None,
            voices: BTreeMap::new(),
            next_voice: 1,
            next_definition: 1,
            teardowns: TeardownQueue::new(),
            movement: MovementScheduler::new(),
            clock: Box::new(SystemClock::new()),
            decoder: Box::new(WavDecoder),
            connector: None,
            stats: EngineStats::default(),
        };
        for definition in default_catalog() {
            let source = SourceKind::Procedural(definition.kind.clone());
            engine.insert_template(definition, source, None);
        }
        engine
    }

    /// Replace the animation clock
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the decoder used for uploads and embedded scene audio
    pub fn with_decoder(mut self, decoder: impl AudioDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Install a connector used to reopen streams found in imported scenes
    pub fn with_stream_connector(mut self, connector: impl StreamConnector + 'static) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    /// Create the audio context. Calling it again has no effect.
    pub fn start(&mut self) {
        if self.context.is_none() {
            info!(sample_rate = self.config.sample_rate, "audio context started");
            self.context = Some(AudioContext::new(&self.config));
        }
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(&id)
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.values()
    }

    pub fn active_voices(&self) -> Vec<VoiceId> {
        self.voices
            .values()
            .filter(|v| v.is_active())
            .map(|v| v.id())
            .collect()
    }

    /// Definitions shown in the dock, in the order they were added
    pub fn definitions(&self) -> Vec<Arc<SoundDefinition>> {
        self.voices
            .values()
            .filter(|v| !v.is_instance())
            .map(|v| v.definition().clone())
            .collect()
    }

    /// Dock template for a definition
    pub fn template(&self, definition_id: &str) -> Option<VoiceId> {
        self.voices
            .values()
            .find(|v| !v.is_instance() && v.definition().id == definition_id)
            .map(|v| v.id())
    }

    /// Number of voices currently owning a graph
    pub fn live_graph_count(&self) -> usize {
        self.voices.values().filter(|v| v.has_graph()).count()
    }

    pub fn is_moving(&self, id: VoiceId) -> bool {
        self.movement.is_running(id)
    }

    /// Room position for a normalized drop point (each axis in `[0, 1]`)
    pub fn room_point(&self, nx: f64, nz: f64) -> Position {
        Position::from_normalized(nx, nz, self.config.room_scale)
    }

    fn allocate_voice_id(&mut self) -> VoiceId {
        let id = VoiceId(self.next_voice);
        self.next_voice += 1;
        id
    }

    fn allocate_definition_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_definition);
        self.next_definition += 1;
        id
    }

    fn insert_template(
        &mut self,
        definition: SoundDefinition,
        source: SourceKind,
        asset: Option<EmbeddedAudio>,
    ) -> VoiceId {
        let id = self.allocate_voice_id();
        let voice = Voice::new(id, Arc::new(definition), source, asset, false);
        self.voices.insert(id, voice);
        id
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Build and fade in a voice's graph at `position`
    pub fn activate(&mut self, id: VoiceId, position: Position) -> Result<(), EngineError> {
        let ctx = self.context.as_ref().ok_or(EngineError::AudioNotReady)?;
        let voice = self.voices.get_mut(&id).ok_or(EngineError::UnknownVoice(id))?;

        match voice.activate(position, ctx) {
            Ok(Activation::AlreadyActive) => return Ok(()),
            Ok(Activation::Started) => self.stats.graphs_built += 1,
            Ok(Activation::Restarted) => {
                self.teardowns.cancel(id);
                self.stats.graphs_built += 1;
                self.stats.graphs_torn_down += 1;
            }
            Err(e) => {
                warn!(voice = %id, error = %e, "activation failed");
                return Err(e);
            }
        }

        self.start_movement(id);
        Ok(())
    }

    /// Fade a voice out; its graph is torn down once the fade completes.
    /// Voices that are not active are left alone.
    pub fn deactivate(&mut self, id: VoiceId) -> Result<(), EngineError> {
        let voice = self.voices.get_mut(&id).ok_or(EngineError::UnknownVoice(id))?;
        self.movement.stop(id);

        if let Some(ctx) = self.context.as_ref() {
            if let Some(task) = voice.deactivate(ctx) {
                self.teardowns.schedule(task);
            }
        }
        Ok(())
    }

    /// Create an instance from a dock template and activate it
    pub fn spawn(&mut self, definition_id: &str, position: Position) -> Result<VoiceId, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::AudioNotReady);
        }
        let template = self
            .template(definition_id)
            .and_then(|id| self.voices.get(&id))
            .ok_or_else(|| EngineError::UnknownDefinition(definition_id.to_string()))?;

        let id = VoiceId(self.next_voice);
        let instance = template.spawn_instance(id);
        self.next_voice += 1;
        self.insert_and_activate(instance, position)
    }

    fn insert_and_activate(&mut self, voice: Voice, position: Position) -> Result<VoiceId, EngineError> {
        let id = voice.id();
        self.voices.insert(id, voice);
        if let Err(e) = self.activate(id, position) {
            self.voices.remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Deactivate a voice and, for instances, destroy it once its graph is
    /// gone. Templates stay in the dock.
    pub fn return_to_dock(&mut self, id: VoiceId) -> Result<(), EngineError> {
        self.deactivate(id)?;
        let remove_now = match self.voices.get_mut(&id) {
            Some(voice) if voice.is_instance() => {
                voice.pending_removal = true;
                !voice.has_graph()
            }
            _ => false,
        };
        if remove_now {
            self.voices.remove(&id);
            debug!(voice = %id, "instance removed");
        }
        Ok(())
    }

    // =========================================================================
    // Placement, movement and volume
    // =========================================================================

    /// Move a voice to a new user placement
    pub fn update_position(
        &mut self,
        id: VoiceId,
        x: f64,
        z: f64,
    ) -> Result<PositionUpdate, EngineError> {
        let voice = self.voices.get_mut(&id).ok_or(EngineError::UnknownVoice(id))?;
        let ctx = match self.context.as_ref() {
            Some(ctx) => ctx,
            None => return Ok(PositionUpdate::Ignored),
        };
        if !voice.place(Position::new(x, z), ctx) {
            return Ok(PositionUpdate::Ignored);
        }
        if self.movement.is_running(id) {
            // Re-anchor the driver at the new placement
            self.movement.stop(id);
            self.start_movement(id);
        }
        Ok(PositionUpdate::Applied)
    }

    /// Change a voice's movement. Speed and distance are clamped to the
    /// ranges in [`MovementProfile`]. A running driver is restarted.
    pub fn set_movement(
        &mut self,
        id: VoiceId,
        kind: MovementKind,
        speed: f64,
        distance: f64,
    ) -> Result<(), EngineError> {
        let voice = self.voices.get_mut(&id).ok_or(EngineError::UnknownVoice(id))?;
        voice.set_movement(MovementProfile::clamped(kind, speed, distance));

        self.movement.stop(id);
        self.start_movement(id);
        Ok(())
    }

    fn start_movement(&mut self, id: VoiceId) {
        let Some(voice) = self.voices.get(&id) else {
            return;
        };
        if !voice.is_active() {
            return;
        }
        let anchor = self.config.movement_anchor.resolve(voice.placement());
        let now = self.clock.now();
        if self
            .movement
            .start(id, voice.generation(), voice.movement(), anchor, now)
        {
            debug!(voice = %id, kind = %voice.movement().kind, "movement started");
        }
    }

    /// Set a voice's volume multiplier; returns the clamped value
    pub fn set_volume(&mut self, id: VoiceId, volume: f64) -> Result<f64, EngineError> {
        let voice = self.voices.get_mut(&id).ok_or(EngineError::UnknownVoice(id))?;
        Ok(voice.set_volume(volume))
    }

    /// Advance every movement driver to the current animation time.
    /// Returns the number of voices moved.
    pub fn on_frame(&mut self) -> usize {
        let Some(ctx) = self.context.as_ref() else {
            return 0;
        };
        let now = self.clock.now();
        let mut moved = 0;
        for update in self.movement.tick(now) {
            match self.voices.get_mut(&update.voice) {
                Some(voice) if voice.is_active() && voice.generation() == update.generation => {
                    voice.set_position(update.position, ctx);
                    moved += 1;
                }
                _ => {
                    debug!(voice = %update.voice, "dropping stale movement driver");
                    self.movement.stop(update.voice);
                }
            }
        }
        moved
    }

    // =========================================================================
    // Audio
    // =========================================================================

    /// Mix every voice into `out` (interleaved stereo), then run any
    /// teardowns that came due
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        if self.context.is_none() {
            return;
        }

        let mut frames = 0_u64;
        for frame in out.chunks_exact_mut(2) {
            let (mut left, mut right) = (0.0, 0.0);
            for voice in self.voices.values_mut() {
                let (l, r) = voice.tick();
                left += l;
                right += r;
            }
            frame[0] = left as f32;
            frame[1] = right as f32;
            frames += 1;
        }

        if let Some(ctx) = self.context.as_mut() {
            ctx.advance(frames);
        }
        self.run_due_teardowns();
    }

    /// Render and discard `seconds` of audio
    pub fn advance(&mut self, seconds: f64) {
        let Some(ctx) = self.context.as_ref() else {
            return;
        };
        let mut remaining = ctx.frames(seconds) as usize;
        let mut block = vec![0.0_f32; ADVANCE_BLOCK * 2];
        while remaining > 0 {
            let n = remaining.min(ADVANCE_BLOCK);
            self.render(&mut block[..n * 2]);
            remaining -= n;
        }
    }

    fn run_due_teardowns(&mut self) {
        let Some(ctx) = self.context.as_ref() else {
            return;
        };
        for task in self.teardowns.take_due(ctx.current_frame()) {
            let Some(voice) = self.voices.get_mut(&task.voice) else {
                continue;
            };
            if !voice.finish_teardown(task.generation) {
                debug!(voice = %task.voice, generation = task.generation, "stale teardown skipped");
                continue;
            }
            self.stats.graphs_torn_down += 1;
            if voice.pending_removal {
                self.voices.remove(&task.voice);
                debug!(voice = %task.voice, "instance removed");
            }
        }
    }

    // =========================================================================
    // Scenes
    // =========================================================================

    /// Snapshot every active instance
    pub fn export_scene(&self) -> SceneDocument {
        scene::export(self.voices.values())
    }

    /// Replace the current arrangement with `doc`. Every active voice is
    /// returned to the dock first; entries that cannot be loaded are
    /// reported and skipped.
    pub fn import_scene(&mut self, doc: &SceneDocument) -> Result<ImportReport, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::AudioNotReady);
        }

        for id in self.active_voices() {
            self.return_to_dock(id)?;
        }

        let plan = scene::resolve(doc, &*self.decoder, self.connector.as_deref());
        let mut report = ImportReport {
            activated: Vec::new(),
            failures: plan.failures,
        };

        for request in plan.requests {
            match self.activate_request(request) {
                Ok(id) => report.activated.push(id),
                Err(e) => {
                    if e.is_per_entry() {
                        warn!(error = %e, "scene entry not activated");
                    } else {
                        error!(error = %e, "scene entry not activated");
                    }
                    report.failures.push(e);
                }
            }
        }

        info!(
            activated = report.activated.len(),
            failed = report.failures.len(),
            "scene imported"
        );
        Ok(report)
    }

    /// Parse a JSON scene document and import it
    pub fn import_scene_json(&mut self, json: &str) -> Result<ImportReport, EngineError> {
        let doc = SceneDocument::from_json(json)?;
        self.import_scene(&doc)
    }

    fn activate_request(&mut self, request: ActivationRequest) -> Result<VoiceId, EngineError> {
        let id = self.allocate_voice_id();
        let mut voice = match request.source {
            RequestSource::Template(kind) => {
                let template = self
                    .voices
                    .values()
                    .find(|v| !v.is_instance() && v.kind() == kind)
                    .ok_or_else(|| EngineError::UnknownSynthesisKind(kind.as_str().to_string()))?;
                template.spawn_instance(id)
            }
            RequestSource::Custom { buffer, asset } => {
                let definition =
                    SoundDefinition::custom(self.allocate_definition_id("custom"), request.label);
                Voice::new(
                    id,
                    Arc::new(definition),
                    SourceKind::Decoded(buffer),
                    Some(asset),
                    true,
                )
            }
            RequestSource::Stream(handle) => {
                if !self.config.enable_streaming {
                    return Err(EngineError::StreamingDisabled);
                }
                let definition =
                    SoundDefinition::stream(self.allocate_definition_id("stream"), request.label);
                Voice::new(id, Arc::new(definition), SourceKind::Streamed(handle), None, true)
            }
        };

        voice.set_movement(request.movement.sanitized());
        voice.set_volume(request.volume);
        self.insert_and_activate(voice, request.position)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Decode an uploaded file and add it to the dock. Returns the new
    /// definition id.
    pub fn add_custom_sound(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        label: Option<&str>,
    ) -> Result<String, EngineError> {
        let buffer = self
            .decoder
            .decode(&bytes)
            .map_err(|e| EngineError::DecodeFailure {
                file_name: file_name.to_string(),
                reason: e.to_string(),
            })?;

        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| label_from_file_name(file_name));
        let definition = SoundDefinition::custom(self.allocate_definition_id("custom"), label);
        let definition_id = definition.id.clone();

        info!(file = file_name, definition = %definition_id, "custom sound added");
        self.insert_template(
            definition,
            SourceKind::Decoded(Arc::new(buffer)),
            Some(EmbeddedAudio::new(file_name, bytes)),
        );
        Ok(definition_id)
    }

    /// Add several uploads; each file succeeds or fails on its own
    pub fn add_custom_sounds(
        &mut self,
        files: Vec<(String, Vec<u8>)>,
    ) -> Vec<Result<String, EngineError>> {
        files
            .into_iter()
            .map(|(file_name, bytes)| {
                let result = self.add_custom_sound(&file_name, bytes, None);
                if let Err(e) = &result {
                    warn!(file = %file_name, error = %e, "upload skipped");
                }
                result
            })
            .collect()
    }

    /// Add a host-supplied stream to the dock
    pub fn add_stream(
        &mut self,
        label: &str,
        handle: StreamHandle,
    ) -> Result<String, EngineError> {
        if !self.config.enable_streaming {
            return Err(EngineError::StreamingDisabled);
        }
        let definition = SoundDefinition::stream(self.allocate_definition_id("stream"), label);
        let definition_id = definition.id.clone();
        info!(url = handle.url(), definition = %definition_id, "stream added");
        self.insert_template(definition, SourceKind::Streamed(handle), None);
        Ok(definition_id)
    }

    /// Remove an uploaded or stream definition. Its template and every
    /// instance are faded out and destroyed. Returns how many voices were
    /// affected.
    pub fn remove_definition(&mut self, definition_id: &str) -> Result<usize, EngineError> {
        let ids: Vec<VoiceId> = self
            .voices
            .values()
            .filter(|v| v.definition().id == definition_id && !v.kind().is_procedural())
            .map(|v| v.id())
            .collect();
        if ids.is_empty() {
            return Err(EngineError::UnknownDefinition(definition_id.to_string()));
        }

        for &id in &ids {
            self.deactivate(id)?;
            let remove_now = match self.voices.get_mut(&id) {
                Some(voice) => {
                    voice.pending_removal = true;
                    !voice.has_graph()
                }
                None => false,
            };
            if remove_now {
                self.voices.remove(&id);
            }
        }
        info!(definition = definition_id, voices = ids.len(), "definition removed");
        Ok(ids.len())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// "Ocean Waves.wav" -> "Ocean Waves"
fn label_from_file_name(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name[..dot].to_string(),
        _ => file_name.to_string(),
    }
}

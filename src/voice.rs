//! Voices and their audio graphs
//!
//! A [`Voice`] is one placeable sound: a dock template or an instance spawned
//! from one. While it is active (or fading out) it owns exactly one
//! [`VoiceGraph`]:
//!
//! ```text
//! source(s) ─▶ [filter] ─▶ panner ─▶ master gain ─▶ output
//! ```
//!
//! The optional filter stage colors procedural noise and is only inserted
//! when the context has filters enabled.

use crate::catalog::{SoundDefinition, SynthesisKind};
use crate::context::AudioContext;
use crate::error::EngineError;
use crate::graph::{Graph, NodeId, PortRef};
use crate::modules::{Amp, BufferPlayer, MasterGain, Oscillator, Panner, StereoOutput, StreamPlayer, Svf};
use crate::movement::MovementProfile;
use crate::noise::{NoiseColor, NoiseGenerator};
use crate::param::ParamChange;
use crate::schedule::TeardownTask;
use crate::source::{EmbeddedAudio, SourceKind};
use crate::spatial::Position;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Identifier of a voice, unique for the lifetime of an engine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VoiceId(pub u64);

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "voice-{}", self.0)
    }
}

/// Lifecycle of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceState {
    Docked,
    Active,
    FadingOut,
}

/// Coloring filter placed between the sources and the panner
struct FilterStage {
    cutoff: f64,
    output: &'static str,
    /// LFO rate in Hz and cutoff swing in Hz
    sweep: Option<(f64, f64)>,
}

const TONE_FREQUENCY: f64 = 528.0;
const TONE_LEVEL: f64 = 0.4;
const TONE_NOISE_LEVEL: f64 = 0.1;

/// The node graph of one sounding voice
pub struct VoiceGraph {
    graph: Graph,
    panner: NodeId,
    gain: NodeId,
    peak: f64,
    target: Position,
}

impl VoiceGraph {
    /// Build the graph for `source`, silent and positioned at `position`
    pub fn build(
        source: &SourceKind,
        position: Position,
        ctx: &AudioContext,
    ) -> Result<Self, EngineError> {
        let sample_rate = ctx.sample_rate();
        let mut graph = Graph::new(sample_rate);

        let panner = graph.add("panner", Panner::new(ctx.spatializer, position));
        let gain = graph.add("gain", MasterGain::new(0.0));
        let output = graph.add("output", StereoOutput::new());

        graph.connect(panner.out("left")?, gain.in_("left")?)?;
        graph.connect(panner.out("right")?, gain.in_("right")?)?;
        graph.connect(gain.out("left")?, output.in_("left")?)?;
        graph.connect(gain.out("right")?, output.in_("right")?)?;
        graph.set_output(output.id());

        let noise = |color| {
            BufferPlayer::looping(
                sample_rate,
                NoiseGenerator::generate(color, ctx.noise_buffer_seconds, sample_rate),
            )
        };

        let mut sources: Vec<PortRef> = Vec::new();
        let filter = match source {
            SourceKind::Procedural(SynthesisKind::Tone528) => {
                let tone = graph.add("tone", Oscillator::new(sample_rate, TONE_FREQUENCY));
                let tone_level = graph.add("tone_level", Amp::new(TONE_LEVEL));
                graph.connect(tone.out("out")?, tone_level.in_("in")?)?;

                let bed = graph.add("noise", noise(NoiseColor::Pink));
                let bed_level = graph.add("noise_level", Amp::new(TONE_NOISE_LEVEL));
                graph.connect(bed.out("out")?, bed_level.in_("in")?)?;

                sources.push(tone_level.out("out")?);
                sources.push(bed_level.out("out")?);
                Some(FilterStage {
                    cutoff: 2000.0,
                    output: "lp",
                    sweep: None,
                })
            }
            SourceKind::Procedural(SynthesisKind::Ocean) => {
                sources.push(graph.add("noise", noise(NoiseColor::Brown)).out("out")?);
                Some(FilterStage {
                    cutoff: 400.0,
                    output: "lp",
                    sweep: Some((0.15, 300.0)),
                })
            }
            SourceKind::Procedural(SynthesisKind::Rain) => {
                sources.push(graph.add("noise", noise(NoiseColor::Pink)).out("out")?);
                Some(FilterStage {
                    cutoff: 800.0,
                    output: "hp",
                    sweep: None,
                })
            }
            SourceKind::Procedural(SynthesisKind::White) => {
                sources.push(graph.add("noise", noise(NoiseColor::White)).out("out")?);
                Some(FilterStage {
                    cutoff: 10_000.0,
                    output: "lp",
                    sweep: None,
                })
            }
            SourceKind::Procedural(other) => {
                return Err(EngineError::UnknownSynthesisKind(other.as_str().to_string()));
            }
            SourceKind::Decoded(buffer) => {
                let player = BufferPlayer::new(sample_rate, buffer.clone());
                sources.push(graph.add("file", player).out("out")?);
                None
            }
            SourceKind::Streamed(handle) => {
                let player = StreamPlayer::new(handle.open());
                sources.push(graph.add("stream", player).out("out")?);
                None
            }
        };

        let panner_in = panner.in_("in")?;
        match filter.filter(|_| ctx.use_filters) {
            Some(stage) => {
                let svf = graph.add("filter", Svf::new(sample_rate, stage.cutoff));
                for port in &sources {
                    graph.connect(*port, svf.in_("in")?)?;
                }
                if let Some((rate, depth)) = stage.sweep {
                    let lfo = graph.add("lfo", Oscillator::new(sample_rate, rate));
                    let lfo_depth = graph.add("lfo_depth", Amp::new(depth));
                    graph.connect(lfo.out("out")?, lfo_depth.in_("in")?)?;
                    graph.connect(lfo_depth.out("out")?, svf.in_("fm")?)?;
                }
                graph.connect(svf.out(stage.output)?, panner_in)?;
            }
            None => {
                for port in sources {
                    graph.connect(port, panner_in)?;
                }
            }
        }

        graph.compile()?;

        let kind = source.kind();
        debug!(
            kind = %kind,
            nodes = graph.node_count(),
            cables = graph.cable_count(),
            filters = ctx.use_filters,
            "built voice graph"
        );

        Ok(Self {
            graph,
            panner: panner.id(),
            gain: gain.id(),
            peak: kind.peak_volume(),
            target: position,
        })
    }

    /// Ramp the gain from its current value to the voice's peak
    pub fn fade_in(&mut self, volume: f64, ctx: &AudioContext) {
        let frames = ctx.frames(ctx.fade_time);
        self.automate_gain(ParamChange::LinearRamp {
            target: self.peak * volume,
            frames,
        });
    }

    /// Ramp the gain to silence; returns the fade length in frames
    pub fn fade_out(&mut self, ctx: &AudioContext) -> u64 {
        let frames = ctx.frames(ctx.fade_time);
        self.automate_gain(ParamChange::LinearRamp {
            target: 0.0,
            frames,
        });
        frames
    }

    /// Glide the panner toward `position`
    pub fn set_position(&mut self, position: Position, ctx: &AudioContext) {
        let frames = ctx.frames(ctx.position_ramp);
        for (param, target) in [(Panner::X, position.x), (Panner::Z, position.z)] {
            let ramp = ParamChange::LinearRamp { target, frames };
            let applied = self.graph.automate(self.panner, param, ramp);
            debug_assert!(applied.is_ok(), "panner outlives its graph");
        }
        self.target = position;
    }

    /// Jump the gain to `peak × volume`, cancelling any fade in progress
    pub fn set_volume(&mut self, volume: f64) {
        self.automate_gain(ParamChange::Set(self.peak * volume));
    }

    fn automate_gain(&mut self, change: ParamChange) {
        let applied = self.graph.automate(self.gain, MasterGain::GAIN, change);
        debug_assert!(applied.is_ok(), "gain node outlives its graph");
    }

    /// Position the panner is at or gliding toward
    pub fn position(&self) -> Position {
        self.target
    }

    /// Position the panner is rendering right now
    pub fn current_position(&self) -> Position {
        Position::new(
            self.graph.get_param(self.panner, Panner::X).unwrap_or(self.target.x),
            self.graph.get_param(self.panner, Panner::Z).unwrap_or(self.target.z),
        )
    }

    pub fn gain(&self) -> f64 {
        self.graph.get_param(self.gain, MasterGain::GAIN).unwrap_or(0.0)
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn tick(&mut self) -> (f64, f64) {
        self.graph.tick()
    }

    /// Stop all sources and drop every node
    pub fn teardown(mut self) -> usize {
        self.graph.clear()
    }
}

/// Outcome of [`Voice::activate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The voice was already sounding; nothing was built
    AlreadyActive,
    /// A graph was built for a docked voice
    Started,
    /// A fading-out graph was torn down and replaced
    Restarted,
}

/// One placeable sound
pub struct Voice {
    id: VoiceId,
    definition: Arc<SoundDefinition>,
    source: SourceKind,
    asset: Option<EmbeddedAudio>,
    is_instance: bool,
    state: VoiceState,
    position: Position,
    placement: Position,
    volume: f64,
    movement: MovementProfile,
    generation: u64,
    graph: Option<VoiceGraph>,
    pub(crate) pending_removal: bool,
}

impl Voice {
    pub const VOLUME_RANGE: (f64, f64) = (0.0, 2.0);

    pub fn new(
        id: VoiceId,
        definition: Arc<SoundDefinition>,
        source: SourceKind,
        asset: Option<EmbeddedAudio>,
        is_instance: bool,
    ) -> Self {
        Self {
            id,
            definition,
            source,
            asset,
            is_instance,
            state: VoiceState::Docked,
            position: Position::ORIGIN,
            placement: Position::ORIGIN,
            volume: 1.0,
            movement: MovementProfile::default(),
            generation: 0,
            graph: None,
            pending_removal: false,
        }
    }

    /// A fresh docked instance sharing this voice's definition and source
    pub fn spawn_instance(&self, id: VoiceId) -> Voice {
        Voice::new(
            id,
            self.definition.clone(),
            self.source.clone(),
            self.asset.clone(),
            true,
        )
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn definition(&self) -> &Arc<SoundDefinition> {
        &self.definition
    }

    pub fn kind(&self) -> SynthesisKind {
        self.source.kind()
    }

    pub fn label(&self) -> &str {
        &self.definition.label
    }

    pub fn source(&self) -> &SourceKind {
        &self.source
    }

    pub fn asset(&self) -> Option<&EmbeddedAudio> {
        self.asset.as_ref()
    }

    pub fn is_instance(&self) -> bool {
        self.is_instance
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == VoiceState::Active
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub fn graph(&self) -> Option<&VoiceGraph> {
        self.graph.as_ref()
    }

    /// Position the voice is at, or gliding toward
    pub fn position(&self) -> Position {
        self.position
    }

    /// Position the voice was last placed at by the user
    pub fn placement(&self) -> Position {
        self.placement
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn movement(&self) -> MovementProfile {
        self.movement
    }

    /// Bumped on every activation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Build a graph and fade it in. An already active voice is left alone.
    pub fn activate(
        &mut self,
        position: Position,
        ctx: &AudioContext,
    ) -> Result<Activation, EngineError> {
        if self.state == VoiceState::Active {
            return Ok(Activation::AlreadyActive);
        }

        let mut graph = VoiceGraph::build(&self.source, position, ctx)?;
        graph.fade_in(self.volume, ctx);

        let activation = match self.graph.take() {
            Some(fading) => {
                fading.teardown();
                Activation::Restarted
            }
            None => Activation::Started,
        };

        self.generation += 1;
        self.graph = Some(graph);
        self.state = VoiceState::Active;
        self.position = position;
        self.placement = position;
        self.pending_removal = false;

        debug!(voice = %self.id, generation = self.generation, ?activation, "voice activated");
        Ok(activation)
    }

    /// Start the fade-out. Returns the teardown to run once it completes,
    /// or `None` if the voice was not active.
    pub fn deactivate(&mut self, ctx: &AudioContext) -> Option<TeardownTask> {
        if self.state != VoiceState::Active {
            return None;
        }
        let graph = self.graph.as_mut()?;
        let frames = graph.fade_out(ctx);
        self.state = VoiceState::FadingOut;

        debug!(voice = %self.id, generation = self.generation, "voice fading out");
        Some(TeardownTask {
            voice: self.id,
            generation: self.generation,
            due_frame: ctx.current_frame() + frames,
        })
    }

    /// Run a scheduled teardown. Stale tasks (from an earlier activation)
    /// do nothing and return false.
    pub fn finish_teardown(&mut self, generation: u64) -> bool {
        if self.state != VoiceState::FadingOut || generation != self.generation {
            return false;
        }
        if let Some(graph) = self.graph.take() {
            graph.teardown();
        }
        self.state = VoiceState::Docked;
        debug!(voice = %self.id, generation, "voice torn down");
        true
    }

    /// Move the voice. Ignored unless active.
    pub fn set_position(&mut self, position: Position, ctx: &AudioContext) -> bool {
        if self.state != VoiceState::Active {
            return false;
        }
        if let Some(graph) = self.graph.as_mut() {
            graph.set_position(position, ctx);
        }
        self.position = position;
        true
    }

    /// Move the voice as a user placement (also moves the movement anchor)
    pub fn place(&mut self, position: Position, ctx: &AudioContext) -> bool {
        let moved = self.set_position(position, ctx);
        if moved {
            self.placement = position;
        }
        moved
    }

    /// Set the volume multiplier, clamped to [0, 2]. Applied to the gain
    /// right away only while active.
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        let (lo, hi) = Self::VOLUME_RANGE;
        self.volume = if volume.is_nan() { lo } else { volume.clamp(lo, hi) };
        if self.state == VoiceState::Active {
            if let Some(graph) = self.graph.as_mut() {
                graph.set_volume(self.volume);
            }
        }
        self.volume
    }

    pub fn set_movement(&mut self, movement: MovementProfile) {
        self.movement = movement;
    }

    /// Render one stereo frame (silence when no graph exists)
    pub fn tick(&mut self) -> (f64, f64) {
        match self.graph.as_mut() {
            Some(graph) => graph.tick(),
            None => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use crate::config::EngineConfig;
    use crate::source::AudioBuffer;
    use crate::spatial::Spatializer;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn context(use_filters: bool) -> AudioContext {
        AudioContext::new(
            &EngineConfig::default()
                .with_sample_rate(1000.0)
                .with_filters(use_filters),
        )
    }

    fn voice(kind: SynthesisKind) -> Voice {
        let definition = default_catalog()
            .into_iter()
            .find(|d| d.kind == kind)
            .unwrap_or_else(|| SoundDefinition::new("x", kind.clone(), "X", "?", "#000"));
        Voice::new(
            VoiceId(1),
            Arc::new(definition),
            SourceKind::Procedural(kind),
            None,
            false,
        )
    }

    #[test]
    fn test_graph_topologies() {
        let cases = [
            (SynthesisKind::Tone528, 7, 8),
            (SynthesisKind::Ocean, 4, 7),
            (SynthesisKind::Rain, 4, 5),
            (SynthesisKind::White, 4, 5),
        ];
        for (kind, plain, filtered) in cases {
            let source = SourceKind::Procedural(kind.clone());
            let g = VoiceGraph::build(&source, Position::ORIGIN, &context(false)).unwrap();
            assert_eq!(g.node_count(), plain, "{} without filters", kind);
            let g = VoiceGraph::build(&source, Position::ORIGIN, &context(true)).unwrap();
            assert_eq!(g.node_count(), filtered, "{} with filters", kind);
        }
    }

    #[test]
    fn test_decoded_source_skips_filter() {
        let buffer = Arc::new(AudioBuffer::mono(1000.0, vec![0.5; 100]));
        let g = VoiceGraph::build(&SourceKind::Decoded(buffer), Position::ORIGIN, &context(true))
            .unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.peak(), 1.0);
    }

    #[test]
    fn test_panner_uses_configured_rolloff() {
        let spatializer = Spatializer {
            rolloff: 2.0,
            ..Spatializer::default()
        };
        let ctx = AudioContext::new(
            &EngineConfig::default()
                .with_sample_rate(1000.0)
                .with_spatializer(spatializer),
        );
        let buffer = Arc::new(AudioBuffer::mono(1000.0, vec![0.5; 100]));
        let mut g =
            VoiceGraph::build(&SourceKind::Decoded(buffer), Position::new(0.0, -2.0), &ctx)
                .unwrap();
        g.set_volume(1.0);

        let (left, right) = g.tick();
        assert_relative_eq!(left, 0.5 * 0.25 * FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(right, left, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_kind_builds_nothing() {
        let source = SourceKind::Procedural(SynthesisKind::parse("thunder"));
        let err = VoiceGraph::build(&source, Position::ORIGIN, &context(false))
            .err()
            .unwrap();
        assert_eq!(err, EngineError::UnknownSynthesisKind("thunder".into()));
    }

    #[test]
    fn test_fade_in_reaches_peak() {
        let ctx = context(false);
        let mut v = voice(SynthesisKind::Ocean);
        v.set_volume(0.5);
        v.activate(Position::new(0.0, -2.0), &ctx).unwrap();
        for _ in 0..=ctx.frames(ctx.fade_time) {
            v.tick();
        }
        assert_relative_eq!(v.graph().unwrap().gain(), 0.2);
    }

    #[test]
    fn test_activate_twice_is_a_no_op() {
        let ctx = context(false);
        let mut v = voice(SynthesisKind::White);
        assert_eq!(v.activate(Position::ORIGIN, &ctx), Ok(Activation::Started));
        assert_eq!(v.activate(Position::ORIGIN, &ctx), Ok(Activation::AlreadyActive));
        assert_eq!(v.generation(), 1);
    }

    #[test]
    fn test_deactivate_then_teardown() {
        let ctx = context(false);
        let mut v = voice(SynthesisKind::Rain);
        assert!(v.deactivate(&ctx).is_none());

        v.activate(Position::ORIGIN, &ctx).unwrap();
        let task = v.deactivate(&ctx).unwrap();
        assert_eq!(task.due_frame, 500);
        assert_eq!(v.state(), VoiceState::FadingOut);
        assert!(v.has_graph());

        assert!(v.finish_teardown(task.generation));
        assert_eq!(v.state(), VoiceState::Docked);
        assert!(!v.has_graph());
    }

    #[test]
    fn test_stale_teardown_is_ignored() {
        let ctx = context(false);
        let mut v = voice(SynthesisKind::Tone528);
        v.activate(Position::ORIGIN, &ctx).unwrap();
        let stale = v.deactivate(&ctx).unwrap();

        assert_eq!(v.activate(Position::ORIGIN, &ctx), Ok(Activation::Restarted));
        assert!(!v.finish_teardown(stale.generation));
        assert!(v.is_active());
        assert!(v.has_graph());
    }

    #[test]
    fn test_position_updates_only_while_active() {
        let ctx = context(false);
        let mut v = voice(SynthesisKind::White);
        assert!(!v.set_position(Position::new(1.0, 1.0), &ctx));

        v.activate(Position::ORIGIN, &ctx).unwrap();
        assert!(v.place(Position::new(3.0, -2.0), &ctx));
        assert_eq!(v.position(), Position::new(3.0, -2.0));
        assert_eq!(v.placement(), Position::new(3.0, -2.0));

        for _ in 0..=ctx.frames(ctx.position_ramp) {
            v.tick();
        }
        let current = v.graph().unwrap().current_position();
        assert_relative_eq!(current.x, 3.0);
        assert_relative_eq!(current.z, -2.0);
    }

    #[test]
    fn test_volume_is_clamped_and_immediate() {
        let ctx = context(false);
        let mut v = voice(SynthesisKind::Ocean);
        assert_eq!(v.set_volume(5.0), 2.0);
        assert_eq!(v.set_volume(-1.0), 0.0);

        v.activate(Position::ORIGIN, &ctx).unwrap();
        v.set_volume(2.0);
        v.tick();
        assert_relative_eq!(v.graph().unwrap().gain(), 0.8);
    }

    #[test]
    fn test_spawned_instance_shares_definition() {
        let template = voice(SynthesisKind::Rain);
        let instance = template.spawn_instance(VoiceId(9));
        assert!(instance.is_instance());
        assert!(!template.is_instance());
        assert!(Arc::ptr_eq(instance.definition(), template.definition()));
        assert_eq!(instance.state(), VoiceState::Docked);
    }
}

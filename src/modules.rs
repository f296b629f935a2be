//! Voice Graph Modules
//!
//! The building blocks a voice graph is wired from: signal sources
//! (oscillator, looped buffer, live stream), coloring stages (filter,
//! amplifier), the spatial panner, the master gain and the output node.

use crate::param::{AutomatedParam, ParamChange};
use crate::port::{GraphModule, ParamId, PortDef, PortSpec, PortValues, SignalKind};
use crate::source::{AudioBuffer, AudioStream};
use crate::spatial::{Position, Spatializer};
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

/// Sine oscillator at a fixed frequency in Hz
///
/// Used both as the audible 528 Hz tone and as the slow LFO that sweeps the
/// ocean filter.
pub struct Oscillator {
    frequency: f64,
    phase: f64,
    sample_rate: f64,
    spec: PortSpec,
}

impl Oscillator {
    pub fn new(sample_rate: f64, frequency: f64) -> Self {
        Self {
            frequency,
            phase: 0.0,
            sample_rate,
            spec: PortSpec {
                inputs: vec![],
                outputs: vec![PortDef::new(10, "out", SignalKind::Audio)],
            },
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

impl GraphModule for Oscillator {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, _inputs: &PortValues, outputs: &mut PortValues) {
        outputs.set(10, (self.phase * TAU).sin());
        self.phase = (self.phase + self.frequency / self.sample_rate).fract();
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "oscillator"
    }
}

/// State Variable Filter (SVF)
///
/// 12dB/oct filter with simultaneous lowpass, bandpass and highpass outputs.
/// The cutoff is set in Hz; the `fm` input adds a signed Hz offset.
pub struct Svf {
    cutoff: f64,
    damping: f64,
    low: f64,
    band: f64,
    sample_rate: f64,
    spec: PortSpec,
}

impl Svf {
    pub fn new(sample_rate: f64, cutoff: f64) -> Self {
        Self {
            cutoff,
            damping: 1.0,
            low: 0.0,
            band: 0.0,
            sample_rate,
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(0, "in", SignalKind::Audio),
                    PortDef::new(1, "fm", SignalKind::Modulation),
                ],
                outputs: vec![
                    PortDef::new(10, "lp", SignalKind::Audio),
                    PortDef::new(11, "bp", SignalKind::Audio),
                    PortDef::new(12, "hp", SignalKind::Audio),
                ],
            },
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl GraphModule for Svf {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues) {
        let input = inputs.get_or(0, 0.0);
        let cutoff_hz = (self.cutoff + inputs.get_or(1, 0.0)).clamp(10.0, self.sample_rate * 0.45);

        let f = 2.0 * (PI * cutoff_hz / self.sample_rate).sin();
        let f = f.min(0.99); // Prevent instability

        let high = input - self.low - self.damping * self.band;
        self.band += f * high;
        self.low += f * self.band;

        outputs.set(10, self.low);
        outputs.set(11, self.band);
        outputs.set(12, high);
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "svf"
    }
}

/// Fixed-gain amplifier
pub struct Amp {
    level: f64,
    spec: PortSpec,
}

impl Amp {
    pub const LEVEL: ParamId = 0;

    pub fn new(level: f64) -> Self {
        Self {
            level,
            spec: PortSpec {
                inputs: vec![PortDef::new(0, "in", SignalKind::Audio)],
                outputs: vec![PortDef::new(10, "out", SignalKind::Audio)],
            },
        }
    }
}

impl GraphModule for Amp {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues) {
        outputs.set(10, inputs.get_or(0, 0.0) * self.level);
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn get_param(&self, id: ParamId) -> Option<f64> {
        (id == Self::LEVEL).then_some(self.level)
    }

    fn type_id(&self) -> &'static str {
        "amp"
    }
}

/// Loops a mono buffer, resampling linearly to the context rate
pub struct BufferPlayer {
    buffer: Arc<AudioBuffer>,
    position: f64,
    rate: f64,
    spec: PortSpec,
}

impl BufferPlayer {
    /// Multi-channel buffers are down-mixed on construction
    pub fn new(sample_rate: f64, buffer: Arc<AudioBuffer>) -> Self {
        let buffer = if buffer.channels == 1 {
            buffer
        } else {
            Arc::new(buffer.to_mono())
        };
        let rate = buffer.sample_rate / sample_rate;
        Self {
            buffer,
            position: 0.0,
            rate,
            spec: PortSpec {
                inputs: vec![],
                outputs: vec![PortDef::new(10, "out", SignalKind::Audio)],
            },
        }
    }

    /// Wrap a freshly generated noise buffer recorded at the context rate
    pub fn looping(sample_rate: f64, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, Arc::new(AudioBuffer::mono(sample_rate, samples)))
    }
}

impl GraphModule for BufferPlayer {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, _inputs: &PortValues, outputs: &mut PortValues) {
        let samples = &self.buffer.samples;
        let len = samples.len();
        if len == 0 {
            outputs.set(10, 0.0);
            return;
        }

        let index = self.position as usize % len;
        let frac = self.position.fract();
        let a = samples[index] as f64;
        let b = samples[(index + 1) % len] as f64;
        outputs.set(10, a + (b - a) * frac);

        self.position += self.rate;
        if self.position >= len as f64 {
            self.position -= len as f64;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.rate = self.buffer.sample_rate / sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "buffer_player"
    }
}

const STREAM_BLOCK: usize = 256;

/// Plays a live stream, reading ahead one block at a time
pub struct StreamPlayer {
    stream: Box<dyn AudioStream>,
    block: [f32; STREAM_BLOCK],
    cursor: usize,
    filled: usize,
    spec: PortSpec,
}

impl StreamPlayer {
    pub fn new(stream: Box<dyn AudioStream>) -> Self {
        Self {
            stream,
            block: [0.0; STREAM_BLOCK],
            cursor: 0,
            filled: 0,
            spec: PortSpec {
                inputs: vec![],
                outputs: vec![PortDef::new(10, "out", SignalKind::Audio)],
            },
        }
    }
}

impl GraphModule for StreamPlayer {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, _inputs: &PortValues, outputs: &mut PortValues) {
        if self.cursor >= self.filled {
            self.filled = self.stream.read(&mut self.block).min(STREAM_BLOCK);
            self.cursor = 0;
        }
        if self.cursor < self.filled {
            outputs.set(10, self.block[self.cursor] as f64);
            self.cursor += 1;
        } else {
            // Underrun
            outputs.set(10, 0.0);
        }
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn stop(&mut self) {
        self.stream.stop();
    }

    fn type_id(&self) -> &'static str {
        "stream_player"
    }
}

/// Mono-in, stereo-out spatial panner with automated X/Z coordinates
pub struct Panner {
    x: AutomatedParam,
    z: AutomatedParam,
    spatializer: Spatializer,
    spec: PortSpec,
}

impl Panner {
    pub const X: ParamId = 0;
    pub const Z: ParamId = 1;

    pub fn new(spatializer: Spatializer, position: Position) -> Self {
        Self {
            x: AutomatedParam::new(position.x),
            z: AutomatedParam::new(position.z),
            spatializer,
            spec: PortSpec {
                inputs: vec![PortDef::new(0, "in", SignalKind::Audio)],
                outputs: vec![
                    PortDef::new(0, "left", SignalKind::Audio),
                    PortDef::new(1, "right", SignalKind::Audio),
                ],
            },
        }
    }
}

impl GraphModule for Panner {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues) {
        let input = inputs.get_or(0, 0.0);
        let position = Position::new(self.x.next_value(), self.z.next_value());
        let (left, right) = self.spatializer.gains(position);
        outputs.set(0, input * left);
        outputs.set(1, input * right);
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn get_param(&self, id: ParamId) -> Option<f64> {
        match id {
            Self::X => Some(self.x.value()),
            Self::Z => Some(self.z.value()),
            _ => None,
        }
    }

    fn automate(&mut self, id: ParamId, change: ParamChange) {
        match id {
            Self::X => self.x.apply(change),
            Self::Z => self.z.apply(change),
            _ => {}
        }
    }

    fn type_id(&self) -> &'static str {
        "panner"
    }
}

/// Stereo gain stage carrying the fade envelope and the volume setting
pub struct MasterGain {
    gain: AutomatedParam,
    spec: PortSpec,
}

impl MasterGain {
    pub const GAIN: ParamId = 0;

    pub fn new(gain: f64) -> Self {
        Self {
            gain: AutomatedParam::new(gain),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(0, "left", SignalKind::Audio),
                    PortDef::new(1, "right", SignalKind::Audio).normalled_to(0),
                ],
                outputs: vec![
                    PortDef::new(0, "left", SignalKind::Audio),
                    PortDef::new(1, "right", SignalKind::Audio),
                ],
            },
        }
    }
}

impl GraphModule for MasterGain {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues) {
        let gain = self.gain.next_value();
        let left = inputs.get_or(0, 0.0);
        let right = inputs.get_or(1, left);
        outputs.set(0, left * gain);
        outputs.set(1, right * gain);
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn get_param(&self, id: ParamId) -> Option<f64> {
        (id == Self::GAIN).then_some(self.gain.value())
    }

    fn automate(&mut self, id: ParamId, change: ParamChange) {
        if id == Self::GAIN {
            self.gain.apply(change);
        }
    }

    fn type_id(&self) -> &'static str {
        "master_gain"
    }
}

/// Stereo Output
///
/// The final node of a voice graph. Right input is normalled to left.
pub struct StereoOutput {
    spec: PortSpec,
}

impl StereoOutput {
    pub fn new() -> Self {
        Self {
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(0, "left", SignalKind::Audio),
                    PortDef::new(1, "right", SignalKind::Audio).normalled_to(0),
                ],
                outputs: vec![
                    PortDef::new(0, "left", SignalKind::Audio),
                    PortDef::new(1, "right", SignalKind::Audio),
                ],
            },
        }
    }
}

impl Default for StereoOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphModule for StereoOutput {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues) {
        let left = inputs.get_or(0, 0.0);
        let right = inputs.get_or(1, left); // Mono fallback

        outputs.set(0, left);
        outputs.set(1, right);
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "stereo_output"
    }
}

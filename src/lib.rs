//! # Spatia: Spatial Ambient Sound Engine
//!
//! `spatia` places ambient sound emitters in a 2D room around a fixed
//! listener and renders them as spatialized stereo. Each placed sound owns a
//! small node graph (sources, optional coloring filter, panner, gain) that
//! fades in and out as the sound is activated and docked. Sounds can drift
//! on their own along simple trajectories, and the whole arrangement can be
//! saved to and restored from a JSON scene document.
//!
//! ## Architecture
//!
//! - **Noise** - white, pink and brown noise buffers for procedural sounds
//! - **Voice graph** - a topologically sorted patch of [`GraphModule`]s per voice
//! - **Movement** - per-voice trajectory drivers ticked once per UI frame
//! - **Scenes** - versioned, self-contained JSON documents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spatia::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.start();
//!
//! // Drag the ocean out of the dock, two units to the right
//! let ocean = engine.spawn("ocean", Position::new(2.0, 0.0)).unwrap();
//! engine.set_movement(ocean, MovementKind::Circle, 0.5, 3.0).unwrap();
//!
//! // Once per animation frame
//! engine.on_frame();
//!
//! // From the audio callback
//! let mut block = vec![0.0_f32; 256];
//! engine.render(&mut block);
//!
//! // Save the arrangement
//! let json = engine.export_scene().to_json().unwrap();
//! ```

pub mod catalog;
pub mod clock;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod modules;
pub mod movement;
pub mod noise;
pub mod param;
pub mod port;
pub mod scene;
pub mod schedule;
pub mod source;
pub mod spatial;
pub mod voice;

#[cfg(feature = "wasm")]
pub mod wasm;

/// Prelude module for convenient imports
pub mod prelude {
    // Engine
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, EngineStats, ImportReport, PositionUpdate};
    pub use crate::error::EngineError;

    // Sounds and voices
    pub use crate::catalog::{default_catalog, SoundDefinition, SynthesisKind};
    pub use crate::voice::{Voice, VoiceGraph, VoiceId, VoiceState};

    // Space and movement
    pub use crate::clock::{Clock, SystemClock, VirtualClock};
    pub use crate::movement::{MovementAnchor, MovementKind, MovementProfile};
    pub use crate::spatial::{Position, Spatializer};

    // Sources
    pub use crate::noise::{NoiseColor, NoiseGenerator};
    pub use crate::source::{
        AudioBuffer, AudioDecoder, AudioStream, DecodeError, StreamConnector, StreamHandle,
        WavDecoder,
    };

    // Scenes
    pub use crate::scene::{SceneDocument, SceneEntry, SceneError, SCENE_VERSION};

    // Graph
    pub use crate::graph::{Graph, GraphError, NodeHandle, NodeId, PortRef};
    pub use crate::param::ParamChange;
    pub use crate::port::{GraphModule, ParamId, PortDef, PortId, PortSpec, PortValues, SignalKind};
}

// Re-export key types at crate root for convenience
pub use prelude::*;

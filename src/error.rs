//! Error types for engine commands
//!
//! Nothing in this crate is fatal to the host: every variant here describes
//! one voice, file, or scene entry that did not load while the rest of the
//! scene keeps playing.

use crate::graph::GraphError;
use crate::scene::SceneError;
use crate::voice::VoiceId;

/// Errors returned by [`Engine`](crate::engine::Engine) commands
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The audio context has not been started yet
    AudioNotReady,
    /// No synthesis path exists for this kind
    UnknownSynthesisKind(String),
    /// A scene entry referenced embedded audio that is absent
    AssetMissing { file_name: String },
    /// Embedded or uploaded audio could not be decoded
    DecodeFailure { file_name: String, reason: String },
    /// No voice with this id
    UnknownVoice(VoiceId),
    /// No catalog definition with this id
    UnknownDefinition(String),
    /// Stream sources are switched off in the configuration
    StreamingDisabled,
    /// A scene document could not be read
    InvalidScene(String),
    /// The voice graph could not be wired
    Graph(GraphError),
}

impl EngineError {
    /// Whether the error concerns a single scene entry or file
    /// (as opposed to a misuse of the command surface)
    pub fn is_per_entry(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownSynthesisKind(_)
                | EngineError::AssetMissing { .. }
                | EngineError::DecodeFailure { .. }
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::AudioNotReady => write!(f, "Audio has not been started"),
            EngineError::UnknownSynthesisKind(kind) => {
                write!(f, "Unknown synthesis kind: {}", kind)
            }
            EngineError::AssetMissing { file_name } => write!(
                f,
                "Custom audio file \"{}\" cannot be loaded automatically; add it again manually",
                file_name
            ),
            EngineError::DecodeFailure { file_name, reason } => {
                write!(f, "Failed to decode audio file \"{}\": {}", file_name, reason)
            }
            EngineError::UnknownVoice(id) => write!(f, "Unknown voice: {}", id),
            EngineError::UnknownDefinition(id) => write!(f, "Unknown sound definition: {}", id),
            EngineError::StreamingDisabled => write!(f, "Streaming audio is disabled"),
            EngineError::InvalidScene(reason) => write!(f, "Failed to import scene: {}", reason),
            EngineError::Graph(e) => write!(f, "Voice graph error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<SceneError> for EngineError {
    fn from(e: SceneError) -> Self {
        EngineError::InvalidScene(e.to_string())
    }
}

impl From<GraphError> for EngineError {
    fn from(e: GraphError) -> Self {
        EngineError::Graph(e)
    }
}

//! Scene documents
//!
//! A scene is the arrangement of every active instance: what it plays, where
//! it sits, how it moves and how loud it is. Uploaded audio is embedded as
//! base64 so a scene file is self-contained.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "sounds": [
//!     {
//!       "type": "ocean",
//!       "position": { "x": 2.5, "z": -1.0 },
//!       "movement": { "type": "circle", "speed": 1.5, "distance": 3 },
//!       "volume": 0.8,
//!       "label": "Waves",
//!       "isCustom": false
//!     }
//!   ]
//! }
//! ```

use crate::catalog::SynthesisKind;
use crate::error::EngineError;
use crate::movement::MovementProfile;
use crate::source::{
    AudioBuffer, AudioDecoder, EmbeddedAudio, SourceKind, StreamConnector, StreamHandle,
};
use crate::spatial::Position;
use crate::voice::Voice;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Version written into exported documents
pub const SCENE_VERSION: &str = "1.0";

/// Serialized arrangement of active voices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Schema version for forward compatibility
    pub version: String,
    pub sounds: Vec<SceneEntry>,
}

impl SceneDocument {
    pub fn new() -> Self {
        Self {
            version: SCENE_VERSION.to_string(),
            sounds: Vec::new(),
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, SceneError> {
        serde_json::to_string_pretty(self).map_err(SceneError::Json)
    }

    /// Parse and version-check a document
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let doc: SceneDocument = serde_json::from_str(json).map_err(SceneError::Json)?;
        doc.check_version()?;
        Ok(doc)
    }

    /// Only major version 1 is understood
    pub fn check_version(&self) -> Result<(), SceneError> {
        let major = self
            .version
            .split('.')
            .next()
            .and_then(|m| m.trim().parse::<u32>().ok());
        match major {
            Some(1) => Ok(()),
            _ => Err(SceneError::UnsupportedVersion(self.version.clone())),
        }
    }
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn default_volume() -> f64 {
    1.0
}

/// One placed sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntry {
    #[serde(rename = "type")]
    pub kind: SynthesisKind,
    pub position: Position,
    #[serde(default)]
    pub movement: MovementProfile,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Base64 (standard alphabet) of the original file bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

impl SceneEntry {
    pub fn new(kind: SynthesisKind, position: Position) -> Self {
        Self {
            label: String::new(),
            is_custom: kind == SynthesisKind::Custom,
            kind,
            position,
            movement: MovementProfile::default(),
            volume: default_volume(),
            file_name: None,
            file_data: None,
            stream_url: None,
        }
    }

    fn from_voice(voice: &Voice) -> Self {
        let mut entry = SceneEntry::new(voice.kind(), voice.position());
        entry.movement = voice.movement();
        entry.volume = voice.volume();
        entry.label = voice.label().to_string();
        if let Some(asset) = voice.asset() {
            entry.file_name = Some(asset.file_name.clone());
            entry.file_data = Some(STANDARD.encode(&asset.bytes));
        }
        if let SourceKind::Streamed(handle) = voice.source() {
            entry.stream_url = Some(handle.url().to_string());
        }
        entry
    }

    /// Name used when reporting a problem with this entry
    fn display_name(&self) -> String {
        self.file_name
            .clone()
            .or_else(|| self.stream_url.clone())
            .unwrap_or_else(|| self.label.clone())
    }
}

/// Errors for whole documents
#[derive(Debug)]
pub enum SceneError {
    Json(serde_json::Error),
    UnsupportedVersion(String),
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::Json(e) => write!(f, "Invalid scene document: {}", e),
            SceneError::UnsupportedVersion(v) => write!(f, "Unsupported scene version: {}", v),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Json(e) => Some(e),
            SceneError::UnsupportedVersion(_) => None,
        }
    }
}

impl From<serde_json::Error> for SceneError {
    fn from(e: serde_json::Error) -> Self {
        SceneError::Json(e)
    }
}

/// Snapshot every active instance, in the order given
pub fn export<'a>(voices: impl IntoIterator<Item = &'a Voice>) -> SceneDocument {
    SceneDocument {
        version: SCENE_VERSION.to_string(),
        sounds: voices
            .into_iter()
            .filter(|v| v.is_active() && v.is_instance())
            .map(SceneEntry::from_voice)
            .collect(),
    }
}

/// Where an imported voice gets its signal from
#[derive(Debug, Clone)]
pub enum RequestSource {
    /// Spawn from the dock template of this kind
    Template(SynthesisKind),
    /// Register a custom definition from embedded audio
    Custom {
        buffer: Arc<AudioBuffer>,
        asset: EmbeddedAudio,
    },
    /// Register a stream definition
    Stream(StreamHandle),
}

/// One voice to activate
#[derive(Debug, Clone)]
pub struct ActivationRequest {
    pub source: RequestSource,
    pub label: String,
    pub position: Position,
    pub movement: MovementProfile,
    pub volume: f64,
}

/// Resolved document: what to activate and what could not be loaded
#[derive(Debug, Default)]
pub struct ImportPlan {
    pub requests: Vec<ActivationRequest>,
    pub failures: Vec<EngineError>,
}

/// Resolve every entry of `doc`. Entry failures are collected; the rest of
/// the document is still resolved.
pub fn resolve(
    doc: &SceneDocument,
    decoder: &dyn AudioDecoder,
    connector: Option<&dyn StreamConnector>,
) -> ImportPlan {
    let mut plan = ImportPlan::default();
    for entry in &doc.sounds {
        match resolve_entry(entry, decoder, connector) {
            Ok(source) => plan.requests.push(ActivationRequest {
                source,
                label: entry.label.clone(),
                position: entry.position,
                movement: entry.movement,
                volume: entry.volume,
            }),
            Err(e) => {
                warn!(entry = %entry.display_name(), error = %e, "skipping scene entry");
                plan.failures.push(e);
            }
        }
    }
    plan
}

fn resolve_entry(
    entry: &SceneEntry,
    decoder: &dyn AudioDecoder,
    connector: Option<&dyn StreamConnector>,
) -> Result<RequestSource, EngineError> {
    if entry.is_custom || entry.kind == SynthesisKind::Custom {
        let file_name = entry.display_name();
        let data = entry
            .file_data
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| EngineError::AssetMissing {
                file_name: file_name.clone(),
            })?;
        let bytes = STANDARD
            .decode(data)
            .map_err(|e| EngineError::DecodeFailure {
                file_name: file_name.clone(),
                reason: e.to_string(),
            })?;
        let buffer = decoder
            .decode(&bytes)
            .map_err(|e| EngineError::DecodeFailure {
                file_name: file_name.clone(),
                reason: e.to_string(),
            })?;
        return Ok(RequestSource::Custom {
            buffer: Arc::new(buffer),
            asset: EmbeddedAudio::new(file_name, bytes),
        });
    }

    match &entry.kind {
        SynthesisKind::Stream => {
            let missing = || EngineError::AssetMissing {
                file_name: entry.display_name(),
            };
            let url = entry.stream_url.as_deref().ok_or_else(missing)?;
            connector
                .and_then(|c| c.connect(url))
                .map(RequestSource::Stream)
                .ok_or_else(missing)
        }
        kind if kind.is_procedural() => Ok(RequestSource::Template(kind.clone())),
        other => Err(EngineError::UnknownSynthesisKind(other.as_str().to_string())),
    }
}

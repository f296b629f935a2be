//! Sound definitions and the built-in catalog

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How a voice produces its signal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SynthesisKind {
    /// 528 Hz tone over a bed of pink noise
    Tone528,
    /// Brown noise with a slowly breathing low-pass
    Ocean,
    /// High-passed pink noise
    Rain,
    /// White noise
    White,
    /// Decoded audio supplied by the user
    Custom,
    /// Live stream supplied by the host
    Stream,
    /// A kind this build has no synthesis path for
    Unknown(String),
}

impl SynthesisKind {
    /// Wire name, as written in scene documents
    pub fn as_str(&self) -> &str {
        match self {
            SynthesisKind::Tone528 => "528",
            SynthesisKind::Ocean => "ocean",
            SynthesisKind::Rain => "rain",
            SynthesisKind::White => "white",
            SynthesisKind::Custom => "custom",
            SynthesisKind::Stream => "stream",
            SynthesisKind::Unknown(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "528" | "tone528" => SynthesisKind::Tone528,
            "ocean" => SynthesisKind::Ocean,
            "rain" => SynthesisKind::Rain,
            "white" => SynthesisKind::White,
            "custom" => SynthesisKind::Custom,
            "stream" => SynthesisKind::Stream,
            other => SynthesisKind::Unknown(other.to_string()),
        }
    }

    /// Peak gain reached at the end of the fade-in, before the user's
    /// volume multiplier. Raw noise and tones differ widely in loudness.
    pub fn peak_volume(&self) -> f64 {
        match self {
            SynthesisKind::White => 0.05,
            SynthesisKind::Rain => 0.2,
            SynthesisKind::Ocean => 0.4,
            SynthesisKind::Tone528 => 0.3,
            SynthesisKind::Custom | SynthesisKind::Stream => 1.0,
            SynthesisKind::Unknown(_) => 0.3,
        }
    }

    /// Whether the signal is synthesized inside the engine
    pub fn is_procedural(&self) -> bool {
        matches!(
            self,
            SynthesisKind::Tone528 | SynthesisKind::Ocean | SynthesisKind::Rain | SynthesisKind::White
        )
    }
}

impl std::fmt::Display for SynthesisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SynthesisKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SynthesisKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(SynthesisKind::parse(&name))
    }
}

/// Immutable template a voice is created from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SynthesisKind,
    pub label: String,
    pub icon: String,
    pub color: String,
}

impl SoundDefinition {
    pub fn new(
        id: impl Into<String>,
        kind: SynthesisKind,
        label: impl Into<String>,
        icon: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            icon: icon.into(),
            color: color.into(),
        }
    }

    /// Definition for a user-supplied audio file
    pub fn custom(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, SynthesisKind::Custom, label, "🎵", "#fbbf24")
    }

    /// Definition for a host-supplied stream
    pub fn stream(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, SynthesisKind::Stream, label, "📻", "#f472b6")
    }

    pub fn peak_volume(&self) -> f64 {
        self.kind.peak_volume()
    }
}

/// The sounds available in the dock at startup
pub fn default_catalog() -> Vec<SoundDefinition> {
    vec![
        SoundDefinition::new("528", SynthesisKind::Tone528, "Healing", "✨", "#d8b4fe"),
        SoundDefinition::new("ocean", SynthesisKind::Ocean, "Waves", "🌊", "#38bdf8"),
        SoundDefinition::new("rain", SynthesisKind::Rain, "Rain", "🌧️", "#9ca3af"),
        SoundDefinition::new("white", SynthesisKind::White, "Static", "💨", "#e5e7eb"),
    ]
}

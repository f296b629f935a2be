//! Sources that feed a voice graph
//!
//! A voice is driven by exactly one [`SourceKind`]: procedural synthesis,
//! a decoded audio buffer supplied by the user, or a live stream supplied
//! by the host.

use crate::catalog::SynthesisKind;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Decoded PCM audio, interleaved
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: f64,
    pub channels: usize,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: f64, channels: usize, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples,
        }
    }

    pub fn mono(sample_rate: f64, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, 1, samples)
    }

    /// Number of frames (samples per channel)
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    /// Down-mix to a single channel by averaging
    pub fn to_mono(&self) -> AudioBuffer {
        if self.channels == 1 {
            return self.clone();
        }
        let scale = 1.0 / self.channels as f32;
        let samples = self
            .samples
            .chunks_exact(self.channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect();
        AudioBuffer::mono(self.sample_rate, samples)
    }
}

/// Live audio pulled from the host, mono at the context sample rate
pub trait AudioStream: Send {
    /// Fill `out` with as many samples as are available and return the count.
    /// Missing samples are rendered as silence.
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// Close the underlying connection
    fn stop(&mut self) {}
}

type StreamOpener = dyn Fn() -> Box<dyn AudioStream> + Send + Sync;

/// A reusable stream endpoint; each voice graph opens its own reader
#[derive(Clone)]
pub struct StreamHandle {
    url: String,
    opener: Arc<StreamOpener>,
}

impl StreamHandle {
    pub fn new<F>(url: impl Into<String>, opener: F) -> Self
    where
        F: Fn() -> Box<dyn AudioStream> + Send + Sync + 'static,
    {
        Self {
            url: url.into(),
            opener: Arc::new(opener),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn open(&self) -> Box<dyn AudioStream> {
        (self.opener)()
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle").field("url", &self.url).finish()
    }
}

/// Reconnects stream URLs found in imported scenes
pub trait StreamConnector: Send {
    fn connect(&self, url: &str) -> Option<StreamHandle>;
}

/// What drives a voice graph
#[derive(Debug, Clone)]
pub enum SourceKind {
    Procedural(SynthesisKind),
    Decoded(Arc<AudioBuffer>),
    Streamed(StreamHandle),
}

impl SourceKind {
    pub fn kind(&self) -> SynthesisKind {
        match self {
            SourceKind::Procedural(kind) => kind.clone(),
            SourceKind::Decoded(_) => SynthesisKind::Custom,
            SourceKind::Streamed(_) => SynthesisKind::Stream,
        }
    }
}

/// Original bytes of an uploaded file, kept so scenes can embed them
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedAudio {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl EmbeddedAudio {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Error produced by an [`AudioDecoder`]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DecodeError {}

/// Turns encoded file bytes into PCM
pub trait AudioDecoder: Send {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError>;
}

/// RIFF/WAVE decoder (integer and float PCM)
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        let mut reader =
            hound::WavReader::new(Cursor::new(bytes)).map_err(|e| DecodeError(e.to_string()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| DecodeError(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| DecodeError(e.to_string()))?
            }
        };

        if samples.is_empty() {
            return Err(DecodeError("file contains no audio".into()));
        }

        Ok(AudioBuffer::new(
            spec.sample_rate as f64,
            spec.channels as usize,
            samples,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, frames: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in frames {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_int_wav() {
        let bytes = wav_bytes(1, &[0, 16384, -32768]);
        let buffer = WavDecoder.decode(&bytes).unwrap();
        assert_eq!(buffer.sample_rate, 22_050.0);
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_stereo_downmix() {
        let bytes = wav_bytes(2, &[16384, 0, -16384, -16384]);
        let buffer = WavDecoder.decode(&bytes).unwrap();
        assert_eq!(buffer.len(), 2);
        let mono = buffer.to_mono();
        assert_eq!(mono.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(WavDecoder.decode(b"not a wav file").is_err());
        assert!(WavDecoder.decode(&wav_bytes(1, &[])).is_err());
    }

    #[test]
    fn test_stream_handle_opens_fresh_readers() {
        struct Silence;
        impl AudioStream for Silence {
            fn read(&mut self, out: &mut [f32]) -> usize {
                out.fill(0.0);
                out.len()
            }
        }

        let handle = StreamHandle::new("http://radio.example/live", || Box::new(Silence));
        let mut buf = [1.0; 4];
        assert_eq!(handle.open().read(&mut buf), 4);
        assert_eq!(buf, [0.0; 4]);
        assert!(format!("{:?}", handle).contains("radio.example"));
        assert_eq!(
            SourceKind::Streamed(handle).kind(),
            SynthesisKind::Stream
        );
    }
}

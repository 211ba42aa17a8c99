//! Audio buffer types and WAV encoding

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

use crate::{Error, Result};

/// Size of the canonical RIFF/WAVE header for 16-bit PCM
pub const WAV_HEADER_LEN: usize = 44;

/// Container format of an encoded audio artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Compressed output of the speech service
    #[default]
    Mp3,
    /// 16-bit PCM mono produced by the assembler
    Wav,
}

impl AudioFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }

    /// Value for the speech service's `response_format` field
    pub fn as_str(&self) -> &'static str {
        self.extension()
    }
}

/// An encoded (compressed or container-wrapped) audio blob
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub bytes: Bytes,
    pub format: AudioFormat,
}

impl std::fmt::Debug for EncodedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedAudio")
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .finish()
    }
}

impl EncodedAudio {
    pub fn new(bytes: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    /// A zero-length artifact
    pub fn empty(format: AudioFormat) -> Self {
        Self::new(Bytes::new(), format)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Decoded mono samples, normalized to [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Zero-filled buffer of `duration_secs` at `sample_rate`
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let len = (sample_rate as f64 * duration_secs.max(0.0)).floor() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    /// Quantize to signed 16-bit, clamping out-of-range amplitudes first
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&sample| {
                let clamped = sample.clamp(-1.0, 1.0);
                if clamped < 0.0 {
                    (clamped * 32768.0) as i16
                } else {
                    (clamped * 32767.0) as i16
                }
            })
            .collect()
    }

    /// Encode as a 16-bit mono WAV file with the standard 44-byte header
    pub fn to_wav(&self) -> Result<EncodedAudio> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + self.samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| Error::Audio(format!("Failed to start WAV encoding: {}", e)))?;
            for sample in self.to_pcm16() {
                writer
                    .write_sample(sample)
                    .map_err(|e| Error::Audio(format!("Failed to write WAV sample: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| Error::Audio(format!("Failed to finalize WAV: {}", e)))?;
        }

        Ok(EncodedAudio::new(cursor.into_inner(), AudioFormat::Wav))
    }
}

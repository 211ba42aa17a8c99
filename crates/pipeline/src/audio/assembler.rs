//! Audio assembly
//!
//! Segments are decoded, copied back to back into one buffer at the first
//! segment's sample rate and re-encoded as 16-bit mono WAV. There is no
//! resampling, crossfade or gain normalization; a segment at a different
//! rate is copied as-is and logged.

use vocab_audio_config::AudioConfig;
use vocab_audio_core::{AudioFormat, EncodedAudio, Error, PcmBuffer};

use super::decoder::AudioDecoder;
use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct AudioAssembler {
    decoder: AudioDecoder,
    default_sample_rate: u32,
}

impl AudioAssembler {
    pub fn new(default_sample_rate: u32) -> Self {
        Self {
            decoder: AudioDecoder::new(),
            default_sample_rate,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.default_sample_rate)
    }

    pub fn default_sample_rate(&self) -> u32 {
        self.default_sample_rate
    }

    /// Combine segments in order
    ///
    /// No segments gives an empty artifact and a single segment is returned
    /// unchanged. Any segment that fails to decode fails the whole combine.
    pub fn combine(&self, segments: &[EncodedAudio]) -> Result<EncodedAudio, PipelineError> {
        match segments {
            [] => return Ok(EncodedAudio::empty(AudioFormat::Mp3)),
            [single] => return Ok(single.clone()),
            _ => {},
        }

        let buffers = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                self.decoder.decode(segment).map_err(|e| match e {
                    PipelineError::Decode(msg) => {
                        PipelineError::Decode(format!("segment {}: {}", i + 1, msg))
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let combined = concat_buffers(&buffers);
        tracing::debug!(
            segments = segments.len(),
            duration_secs = combined.duration_secs(),
            sample_rate = combined.sample_rate,
            "Segments combined"
        );
        Ok(combined.to_wav()?)
    }

    /// `combine` on the blocking pool
    pub async fn combine_blocking(
        &self,
        segments: Vec<EncodedAudio>,
    ) -> Result<EncodedAudio, PipelineError> {
        if segments.len() < 2 {
            return self.combine(&segments);
        }

        let assembler = self.clone();
        tokio::task::spawn_blocking(move || assembler.combine(&segments))
            .await
            .map_err(|e| PipelineError::Service(Error::Audio(format!("Combine task failed: {}", e))))?
    }

    /// Zero-filled mono WAV at the default sample rate
    pub fn generate_silence(&self, duration_secs: f64) -> Result<EncodedAudio, PipelineError> {
        Ok(PcmBuffer::silence(duration_secs, self.default_sample_rate).to_wav()?)
    }
}

/// Concatenate buffers into one at the first buffer's sample rate
///
/// The output length is the summed duration at that rate; samples are
/// copied contiguously in input order.
pub fn concat_buffers(buffers: &[PcmBuffer]) -> PcmBuffer {
    let Some(first) = buffers.first() else {
        return PcmBuffer::default();
    };
    let rate = first.sample_rate;

    let total_len: usize = buffers
        .iter()
        .map(|b| {
            if b.sample_rate == rate || b.sample_rate == 0 {
                b.len()
            } else {
                (b.len() as u64 * rate as u64).div_ceil(b.sample_rate as u64) as usize
            }
        })
        .sum();

    let mut samples = vec![0.0f32; total_len];
    let mut offset = 0;
    for (i, buffer) in buffers.iter().enumerate() {
        if buffer.sample_rate != rate {
            tracing::warn!(
                segment = i + 1,
                expected = rate,
                actual = buffer.sample_rate,
                "Sample rate mismatch, copying without resampling"
            );
        }
        let n = buffer.len().min(total_len - offset);
        samples[offset..offset + n].copy_from_slice(&buffer.samples[..n]);
        offset += n;
    }

    PcmBuffer::new(samples, rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_audio_core::WAV_HEADER_LEN;

    const RATE: u32 = 8_000;

    fn tone(duration_secs: usize, value: f32) -> PcmBuffer {
        PcmBuffer::new(vec![value; duration_secs * RATE as usize], RATE)
    }

    #[test]
    fn test_combine_three_segments_in_order() {
        let segments: Vec<EncodedAudio> = [tone(1, 0.25), tone(2, 0.5), tone(1, -0.25)]
            .iter()
            .map(|b| b.to_wav().unwrap())
            .collect();

        let assembler = AudioAssembler::new(24_000);
        let combined = assembler.combine(&segments).unwrap();
        assert_eq!(combined.format, AudioFormat::Wav);
        assert_eq!(combined.len(), WAV_HEADER_LEN + 4 * RATE as usize * 2);

        let decoded = AudioDecoder::new().decode(&combined).unwrap();
        assert_eq!(decoded.sample_rate, RATE);
        assert!(decoded.duration_secs() >= 4.0);

        let r = RATE as usize;
        assert!((decoded.samples[0] - 0.25).abs() < 1e-3);
        assert!((decoded.samples[r - 1] - 0.25).abs() < 1e-3);
        assert!((decoded.samples[r] - 0.5).abs() < 1e-3);
        assert!((decoded.samples[3 * r - 1] - 0.5).abs() < 1e-3);
        assert!((decoded.samples[3 * r] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_combine_zero_and_one_segment() {
        let assembler = AudioAssembler::new(24_000);
        let empty = assembler.combine(&[]).unwrap();
        assert!(empty.is_empty());

        let single = EncodedAudio::new(vec![0xFFu8, 0xFB, 0x90, 0x00], AudioFormat::Mp3);
        let out = assembler.combine(std::slice::from_ref(&single)).unwrap();
        assert_eq!(out, single);
    }

    #[test]
    fn test_corrupt_segment_fails_whole_combine() {
        let good = tone(1, 0.1).to_wav().unwrap();
        let bad = EncodedAudio::new(vec![1u8; 64], AudioFormat::Mp3);

        let err = AudioAssembler::new(24_000).combine(&[good, bad]).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(ref m) if m.starts_with("segment 2")));
    }

    #[test]
    fn test_silence() {
        let silence = AudioAssembler::new(24_000).generate_silence(1.0).unwrap();
        assert_eq!(silence.len(), WAV_HEADER_LEN + 24_000 * 2);
        assert!(silence.bytes[WAV_HEADER_LEN..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_concat_with_rate_mismatch() {
        let a = PcmBuffer::new(vec![0.1; 100], 100);
        let b = PcmBuffer::new(vec![0.2; 50], 50);
        let out = concat_buffers(&[a, b]);

        assert_eq!(out.sample_rate, 100);
        assert_eq!(out.len(), 200);
        assert_eq!(out.samples[149], 0.2);
        assert_eq!(out.samples[150], 0.0);
    }

    #[tokio::test]
    async fn test_combine_blocking() {
        let segments = vec![tone(1, 0.1).to_wav().unwrap(), tone(1, 0.2).to_wav().unwrap()];
        let combined = AudioAssembler::new(24_000)
            .combine_blocking(segments)
            .await
            .unwrap();
        assert_eq!(combined.len(), WAV_HEADER_LEN + 2 * RATE as usize * 2);
    }
}

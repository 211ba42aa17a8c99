//! Compressed audio decoding
//!
//! WAV segments (generated silence, previously combined audio) are read with
//! hound; everything else goes through symphonia. Only the first channel is
//! kept and any corrupt frame fails the whole decode.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use vocab_audio_core::{AudioFormat, EncodedAudio, PcmBuffer};

use crate::PipelineError;

#[derive(Debug, Clone, Copy, Default)]
pub struct AudioDecoder;

impl AudioDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one segment to mono samples at its native sample rate
    pub fn decode(&self, audio: &EncodedAudio) -> Result<PcmBuffer, PipelineError> {
        if audio.is_empty() {
            return Err(PipelineError::Decode("empty audio segment".to_string()));
        }

        let buffer = if audio.bytes.starts_with(b"RIFF") {
            decode_wav(&audio.bytes)?
        } else {
            decode_compressed(&audio.bytes, audio.format)?
        };

        tracing::debug!(
            samples = buffer.len(),
            sample_rate = buffer.sample_rate,
            duration_secs = buffer.duration_secs(),
            "Segment decoded"
        );
        Ok(buffer)
    }
}

fn decode_wav(data: &[u8]) -> Result<PcmBuffer, PipelineError> {
    let reader = hound::WavReader::new(Cursor::new(data))
        .map_err(|e| PipelineError::Decode(format!("wav header: {}", e)))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| PipelineError::Decode(format!("wav samples: {}", e)))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| PipelineError::Decode(format!("wav samples: {}", e)))?
        },
    };

    let samples = interleaved.into_iter().step_by(channels).collect();
    Ok(PcmBuffer::new(samples, spec.sample_rate))
}

fn decode_compressed(data: &[u8], format: AudioFormat) -> Result<PcmBuffer, PipelineError> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PipelineError::Decode(format!("unrecognized format: {}", e)))?;

    let mut reader = detected.format;
    let track = reader
        .default_track()
        .ok_or_else(|| PipelineError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::Decode(format!("codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            },
            Err(e) => return Err(PipelineError::Decode(format!("packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| PipelineError::Decode(format!("decode: {}", e)))?;

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }
        sample_rate.get_or_insert(spec.rate);

        let channels = spec.channels.count().max(1);
        let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend(sample_buf.samples().iter().step_by(channels).copied());
    }

    let sample_rate =
        sample_rate.ok_or_else(|| PipelineError::Decode("unknown sample rate".to_string()))?;
    if samples.is_empty() {
        return Err(PipelineError::Decode("no audio samples decoded".to_string()));
    }

    Ok(PcmBuffer::new(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_generated_wav() {
        let source = PcmBuffer::new(vec![0.0, 0.5, -0.5, 1.0], 16_000);
        let wav = source.to_wav().unwrap();

        let decoded = AudioDecoder::new().decode(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.len(), 4);
        assert!((decoded.samples[1] - 0.5).abs() < 1e-3);
        assert!((decoded.samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_decode_keeps_first_channel() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for frame in 0..4i16 {
                writer.write_sample(frame * 1000).unwrap();
                writer.write_sample(-16_000i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let audio = EncodedAudio::new(cursor.into_inner(), AudioFormat::Wav);
        let decoded = AudioDecoder::new().decode(&audio).unwrap();
        assert_eq!(decoded.len(), 4);
        assert!(decoded.samples.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_corrupt_segment_fails() {
        let garbage = EncodedAudio::new(vec![0x13u8; 512], AudioFormat::Mp3);
        assert!(matches!(
            AudioDecoder::new().decode(&garbage),
            Err(PipelineError::Decode(_))
        ));

        let empty = EncodedAudio::empty(AudioFormat::Mp3);
        assert!(AudioDecoder::new().decode(&empty).is_err());
    }
}

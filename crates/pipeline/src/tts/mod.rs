//! Text-to-speech: the hosted speech client and the synthesis pipeline

pub mod openai;
pub mod synthesis;

pub use openai::{pronunciation_instructions, OpenAiSpeechClient, SpeechClientConfig};
pub use synthesis::{
    check_speech_limits, compose_continuous_text, AudioSynthesisPipeline, SpeechLimits,
    SynthesisConfig,
};

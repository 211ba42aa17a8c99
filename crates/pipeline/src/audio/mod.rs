//! Audio decoding and assembly

pub mod assembler;
pub mod decoder;

pub use assembler::{concat_buffers, AudioAssembler};
pub use decoder::AudioDecoder;

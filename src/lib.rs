//! MP3 transcription against the OpenAI audio API.
//!
//! Files over the per-request size limit are split into fixed-duration
//! chunks, transcribed one at a time with bounded retry, and reassembled in
//! original temporal order.

pub mod audio;
pub mod buffer;
pub mod config;
pub mod credentials;
pub mod pipeline;
pub mod transcriber;

pub use buffer::AudioBuffer;
pub use credentials::{resolve_credential, Credential, CredentialError, SecretStore};
pub use pipeline::{run, AudioFile, PipelineConfig, PipelineError, Progress, Transcript};
pub use transcriber::{SpeechToText, TranscriptionError, WhisperClient};

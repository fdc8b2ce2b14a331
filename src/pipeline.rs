//! Whole-file vs. chunked transcription orchestration.
//!
//! Files at or under the request ceiling are submitted in one call. Larger
//! files are parsed, split into fixed-duration chunks, and transcribed
//! strictly sequentially; a chunk's permanent failure is recorded at its
//! position and processing continues.

use std::time::Duration;

use thiserror::Error;

use crate::audio::{AudioError, ChunkPayload, DecodedAudio};
use crate::buffer::AudioBuffer;
use crate::config::{API_FILE_LIMIT_BYTES, CHUNK_DURATION_SECS, MAX_ATTEMPTS, TARGET_CHUNK_BYTES};
use crate::transcriber::{transcribe_with_retry, SpeechToText};

/// One uploaded file: raw bytes plus the name they arrived under.
pub struct AudioFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl AudioFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load audio for chunking: {0}")]
    Decode(#[from] AudioError),
    #[error("transcription produced no text")]
    EmptyResult,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Files at or under this size are submitted whole.
    pub size_limit_bytes: u64,
    pub chunk_duration: Duration,
    /// Ceiling for an encoded chunk; anything over it is never submitted.
    pub max_chunk_bytes: u64,
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            size_limit_bytes: API_FILE_LIMIT_BYTES,
            chunk_duration: Duration::from_secs(CHUNK_DURATION_SECS),
            max_chunk_bytes: TARGET_CHUNK_BYTES,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Per-chunk outcome, kept at its original position.
#[derive(Debug, Clone)]
pub enum ChunkOutcome {
    Transcribed(String),
    TooLarge { size: u64 },
    Failed { attempts: u32, reason: String },
}

impl ChunkOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            ChunkOutcome::Transcribed(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, ChunkOutcome::Transcribed(_))
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub index: usize,
    pub outcome: ChunkOutcome,
}

impl TranscriptionResult {
    /// Placeholder marking a failed position, for reporting to the user.
    /// Never joined into the transcript text.
    pub fn placeholder(&self) -> Option<String> {
        match &self.outcome {
            ChunkOutcome::Transcribed(_) => None,
            ChunkOutcome::TooLarge { size } => Some(format!(
                "[chunk {} too large to process: {size} bytes]",
                self.index + 1
            )),
            ChunkOutcome::Failed { attempts, reason } => Some(format!(
                "[chunk {} failed after {attempts} attempts: {reason}]",
                self.index + 1
            )),
        }
    }
}

/// The joined transcript plus the ordered per-chunk record behind it.
#[derive(Debug)]
pub struct Transcript {
    pub text: String,
    pub results: Vec<TranscriptionResult>,
}

/// Progress events emitted as the pipeline advances.
#[derive(Debug, Clone)]
pub enum Progress {
    /// The file fits in one request.
    Direct,
    /// The file was split into this many chunks.
    Split { chunks: usize },
    /// One chunk finished (successfully or not).
    ChunkDone {
        index: usize,
        total: usize,
        ok: bool,
    },
}

/// Transcribe `file`, choosing the whole-file or chunked path by size.
pub fn run(
    file: AudioFile,
    backend: &dyn SpeechToText,
    config: &PipelineConfig,
    mut on_progress: impl FnMut(Progress),
) -> Result<Transcript, PipelineError> {
    let results = if file.size() <= config.size_limit_bytes {
        on_progress(Progress::Direct);
        let mut buffer = AudioBuffer::new(file.name, file.bytes);
        vec![TranscriptionResult {
            index: 0,
            outcome: transcribe(backend, &mut buffer, config.max_attempts),
        }]
    } else {
        tracing::info!(
            size = file.size(),
            limit = config.size_limit_bytes,
            "file over the request ceiling, splitting"
        );

        let decoded = DecodedAudio::decode(file.bytes)?;
        let chunks = decoded.split(config.chunk_duration, config.max_chunk_bytes);
        let total = chunks.len();
        on_progress(Progress::Split { chunks: total });

        let mut results = Vec::with_capacity(total);
        for chunk in chunks {
            let outcome = match chunk.payload {
                ChunkPayload::Oversized { size } => ChunkOutcome::TooLarge { size },
                ChunkPayload::Encoded(data) => {
                    let mut buffer = AudioBuffer::new("audio_chunk.mp3", data);
                    transcribe(backend, &mut buffer, config.max_attempts)
                }
            };
            on_progress(Progress::ChunkDone {
                index: chunk.index,
                total,
                ok: !outcome.is_failure(),
            });
            results.push(TranscriptionResult {
                index: chunk.index,
                outcome,
            });
        }
        results
    };

    let text = results
        .iter()
        .filter_map(|r| r.outcome.text())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        return Err(PipelineError::EmptyResult);
    }

    Ok(Transcript { text, results })
}

fn transcribe(backend: &dyn SpeechToText, buffer: &mut AudioBuffer, max_attempts: u32) -> ChunkOutcome {
    match transcribe_with_retry(backend, buffer, max_attempts) {
        Ok(text) => ChunkOutcome::Transcribed(text),
        Err(err) => ChunkOutcome::Failed {
            attempts: err.attempts,
            reason: err.last_error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_name_the_one_based_position() {
        let too_large = TranscriptionResult {
            index: 0,
            outcome: ChunkOutcome::TooLarge { size: 99 },
        };
        assert_eq!(
            too_large.placeholder().unwrap(),
            "[chunk 1 too large to process: 99 bytes]"
        );

        let failed = TranscriptionResult {
            index: 3,
            outcome: ChunkOutcome::Failed {
                attempts: 3,
                reason: "API error: boom".to_string(),
            },
        };
        assert!(failed.placeholder().unwrap().starts_with("[chunk 4 failed"));

        let ok = TranscriptionResult {
            index: 1,
            outcome: ChunkOutcome::Transcribed("text".to_string()),
        };
        assert!(ok.placeholder().is_none());
    }
}

//! Configuration constants for the transcription pipeline.
//! Note: Users must provide their own API key via the secrets file.

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const WHISPER_MODEL: &str = "whisper-1";

/// Per-request ceiling imposed by the transcription API.
pub const API_FILE_LIMIT_BYTES: u64 = 25 * 1024 * 1024;
/// Target ceiling for encoded chunks, 1 MiB under the API limit for headroom.
pub const TARGET_CHUNK_BYTES: u64 = 24 * 1024 * 1024;

/// Slice length used when splitting oversized files.
pub const CHUNK_DURATION_SECS: u64 = 10 * 60;

/// Total attempts per request before recording a permanent failure.
pub const MAX_ATTEMPTS: u32 = 3;

pub const REQUEST_TIMEOUT_SECS: u64 = 60;

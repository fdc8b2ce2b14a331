//! Transcription client for the OpenAI audio API.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use crate::buffer::AudioBuffer;
use crate::config::{OPENAI_API_URL, REQUEST_TIMEOUT_SECS, WHISPER_MODEL};
use crate::credentials::Credential;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("failed to initialize HTTP client: {0}")]
    ClientInit(String),
    #[error("HTTP request failed: {0}")]
    Request(String),
    #[error("API error: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
#[error("transcription failed after {attempts} attempts: {last_error}")]
pub struct PermanentTranscriptionError {
    pub attempts: u32,
    pub last_error: TranscriptionError,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// One transcription request per call. Implementations must tolerate being
/// handed a buffer in any read position.
pub trait SpeechToText {
    fn transcribe(&self, audio: &mut AudioBuffer) -> Result<String, TranscriptionError>;
}

pub struct WhisperClient {
    client: reqwest::blocking::Client,
    credential: Credential,
}

impl WhisperClient {
    pub fn new(credential: Credential) -> Result<Self, TranscriptionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranscriptionError::ClientInit(e.to_string()))?;

        Ok(Self { client, credential })
    }
}

impl SpeechToText for WhisperClient {
    fn transcribe(&self, audio: &mut AudioBuffer) -> Result<String, TranscriptionError> {
        // The buffer may already have been read by an earlier attempt.
        audio.rewind();
        let bytes = audio.read_remaining();

        tracing::debug!(name = audio.name(), bytes = bytes.len(), "sending audio");

        let part = Part::bytes(bytes)
            .file_name(audio.name().to_string())
            .mime_str("audio/mpeg")
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("model", WHISPER_MODEL)
            .text("response_format", "text");

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header(
                "Authorization",
                format!("Bearer {}", self.credential.expose()),
            )
            .multipart(form)
            .send()
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(TranscriptionError::Api(error_resp.error.message));
            }
            return Err(TranscriptionError::Api(format!("HTTP {status}: {body}")));
        }

        // The plain-text response format carries a trailing newline.
        Ok(body.trim().to_string())
    }
}

/// Retry `backend` up to `max_attempts` total attempts, immediately and
/// without backoff. The buffer is rewound before every attempt.
pub fn transcribe_with_retry(
    backend: &dyn SpeechToText,
    audio: &mut AudioBuffer,
    max_attempts: u32,
) -> Result<String, PermanentTranscriptionError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        audio.rewind();
        match backend.transcribe(audio) {
            Ok(text) => return Ok(text),
            Err(err) => {
                tracing::warn!(attempt, max_attempts, error = %err, "transcription attempt failed");
                if attempt >= max_attempts {
                    return Err(PermanentTranscriptionError {
                        attempts: max_attempts,
                        last_error: err,
                    });
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Scripted backend: pops one canned response per call and records what
    /// each call could read from the buffer.
    struct ScriptedBackend {
        responses: RefCell<VecDeque<Result<String, TranscriptionError>>>,
        calls: Cell<u32>,
        seen_lens: RefCell<Vec<usize>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String, TranscriptionError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: Cell::new(0),
                seen_lens: RefCell::new(Vec::new()),
            }
        }
    }

    impl SpeechToText for ScriptedBackend {
        fn transcribe(&self, audio: &mut AudioBuffer) -> Result<String, TranscriptionError> {
            self.calls.set(self.calls.get() + 1);
            self.seen_lens.borrow_mut().push(audio.read_remaining().len());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(TranscriptionError::Api("script exhausted".to_string())))
        }
    }

    fn fail(msg: &str) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::Request(msg.to_string()))
    }

    #[test]
    fn succeeds_on_third_attempt_with_exactly_three_calls() {
        let backend = ScriptedBackend::new(vec![
            fail("reset"),
            fail("timeout"),
            Ok("hello world".to_string()),
        ]);
        let mut buf = AudioBuffer::new("a.mp3", vec![7; 16]);

        let text = transcribe_with_retry(&backend, &mut buf, 3).unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(backend.calls.get(), 3);
    }

    #[test]
    fn every_attempt_sees_the_full_buffer() {
        let backend = ScriptedBackend::new(vec![fail("a"), fail("b"), Ok(String::from("ok"))]);
        let mut buf = AudioBuffer::new("a.mp3", vec![7; 16]);

        transcribe_with_retry(&backend, &mut buf, 3).unwrap();
        assert_eq!(*backend.seen_lens.borrow(), vec![16, 16, 16]);
    }

    #[test]
    fn exhaustion_reports_attempt_count_and_last_error() {
        let backend = ScriptedBackend::new(vec![fail("one"), fail("two"), fail("three")]);
        let mut buf = AudioBuffer::new("a.mp3", vec![0; 4]);

        let err = transcribe_with_retry(&backend, &mut buf, 3).unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(backend.calls.get(), 3);
        assert!(err.to_string().contains("three"));
    }

    #[test]
    fn first_try_success_makes_one_call() {
        let backend = ScriptedBackend::new(vec![Ok("done".to_string())]);
        let mut buf = AudioBuffer::new("a.mp3", vec![0; 4]);

        let text = transcribe_with_retry(&backend, &mut buf, 3).unwrap();
        assert_eq!(text, "done");
        assert_eq!(backend.calls.get(), 1);
    }
}

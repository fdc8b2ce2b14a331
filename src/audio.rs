//! MP3 stream parsing and time-based splitting.
//!
//! Splitting works on compressed frames: the file is demuxed once, frames are
//! grouped into fixed-duration windows, and each window is emitted as a
//! standalone MP3 byte buffer. MP3 frames are self-contained, so a window is
//! a straight frame copy with no re-encode pass.

use std::io::Cursor;
use std::time::Duration;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to read audio stream: {0}")]
    Decode(String),
    #[error("no audio track found")]
    NoTrack,
    #[error("audio track has no time base")]
    NoTimeBase,
    #[error("no audio frames found")]
    Empty,
}

/// One compressed frame with its position on the stream's timeline.
struct Frame {
    ts: u64,
    data: Box<[u8]>,
}

/// A parsed MP3 stream: the ordered frame sequence and its time base.
pub struct DecodedAudio {
    frames: Vec<Frame>,
    time_base: TimeBase,
    duration: Duration,
}

/// One slice of the input, 0-indexed in original temporal order.
pub struct AudioChunk {
    pub index: usize,
    pub payload: ChunkPayload,
}

pub enum ChunkPayload {
    /// Encoded MP3 bytes, ready to submit.
    Encoded(Vec<u8>),
    /// The window came out over the per-request ceiling and must not be
    /// submitted. No recursive re-split is attempted.
    Oversized { size: u64 },
}

impl DecodedAudio {
    pub fn decode(bytes: Vec<u8>) -> Result<Self, AudioError> {
        let cursor = Cursor::new(bytes);
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::Decode(format!("probe: {e}")))?;

        let mut format = probed.format;

        let track = format.default_track().ok_or(AudioError::NoTrack)?;
        let track_id = track.id;
        let time_base = match track.codec_params.time_base {
            Some(tb) => tb,
            // MPEG audio ticks at the sample rate when no explicit base is set.
            None => match track.codec_params.sample_rate {
                Some(rate) => TimeBase::new(1, rate),
                None => return Err(AudioError::NoTimeBase),
            },
        };

        let mut frames = Vec::new();
        let mut end_ts = 0u64;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(AudioError::Decode(format!("packet: {e}"))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            end_ts = end_ts.max(packet.ts() + packet.dur());
            frames.push(Frame {
                ts: packet.ts(),
                data: packet.buf().into(),
            });
        }

        if frames.is_empty() {
            return Err(AudioError::Empty);
        }

        let time = time_base.calc_time(end_ts);
        let duration = Duration::from_secs_f64(time.seconds as f64 + time.frac);

        tracing::debug!(
            frames = frames.len(),
            duration_secs = duration.as_secs_f64(),
            "audio stream parsed"
        );

        Ok(Self {
            frames,
            time_base,
            duration,
        })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Partition the stream into consecutive windows of `chunk_duration`
    /// (the final window may be shorter) and emit each as MP3 bytes.
    /// Windows over `max_encoded_bytes` are marked oversized in place.
    pub fn split(&self, chunk_duration: Duration, max_encoded_bytes: u64) -> Vec<AudioChunk> {
        let mut chunks = Vec::new();
        let Some(first_ts) = self.frames.first().map(|f| f.ts) else {
            return chunks;
        };

        let ticks_per_sec = f64::from(self.time_base.denom) / f64::from(self.time_base.numer);
        let chunk_ticks = ((chunk_duration.as_secs_f64() * ticks_per_sec) as u64).max(1);

        let mut window = 0u64;
        let mut current = Vec::new();

        for frame in &self.frames {
            let w = frame.ts.saturating_sub(first_ts) / chunk_ticks;
            if w != window && !current.is_empty() {
                push_chunk(&mut chunks, std::mem::take(&mut current), max_encoded_bytes);
                window = w;
            }
            current.extend_from_slice(&frame.data);
        }
        if !current.is_empty() {
            push_chunk(&mut chunks, current, max_encoded_bytes);
        }

        chunks
    }
}

fn push_chunk(chunks: &mut Vec<AudioChunk>, data: Vec<u8>, max_encoded_bytes: u64) {
    let index = chunks.len();
    let size = data.len() as u64;
    let payload = if size > max_encoded_bytes {
        tracing::warn!(index, size, max_encoded_bytes, "chunk exceeds request ceiling");
        ChunkPayload::Oversized { size }
    } else {
        ChunkPayload::Encoded(data)
    };
    chunks.push(AudioChunk { index, payload });
}

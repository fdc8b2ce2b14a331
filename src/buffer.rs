//! Owned, rewindable byte buffer handed to the transcription client.

use std::io::{Cursor, Read};

/// In-memory audio payload with an explicit read position.
///
/// The position must be reset to the start before every send, so that a
/// retried request (or a second pass over the same file) never uploads a
/// half-consumed buffer.
pub struct AudioBuffer {
    name: String,
    cursor: Cursor<Vec<u8>>,
}

impl AudioBuffer {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            cursor: Cursor::new(bytes),
        }
    }

    /// File name sent alongside the payload (the API requires one; it does
    /// not have to match the original upload).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Reset the read position to the start of the buffer.
    pub fn rewind(&mut self) {
        self.cursor.set_position(0);
    }

    /// Read everything from the current position to the end.
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.cursor.get_ref().len());
        // Reading from an in-memory cursor cannot fail.
        let _ = self.cursor.read_to_end(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_consumes_and_rewind_restores() {
        let mut buf = AudioBuffer::new("a.mp3", vec![1, 2, 3]);
        assert_eq!(buf.read_remaining(), vec![1, 2, 3]);
        assert_eq!(buf.position(), 3);
        assert!(buf.read_remaining().is_empty());

        buf.rewind();
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.read_remaining(), vec![1, 2, 3]);
    }

    #[test]
    fn reports_len_and_name() {
        let buf = AudioBuffer::new("take1.mp3", vec![0; 42]);
        assert_eq!(buf.len(), 42);
        assert!(!buf.is_empty());
        assert_eq!(buf.name(), "take1.mp3");
    }
}

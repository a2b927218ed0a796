//! Line buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management. Implements a small state
//! machine for splitting the device byte stream into lines:
//! - `Collecting`: bytes accumulate until CR or LF
//! - `Discarding`: the current line exceeded the limit, drop until the next terminator
//!
//! # Example
//!
//! ```
//! use atwire::protocol::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//!
//! let lines = buffer.push(b"%CMATT: 1\r\nO");
//! assert_eq!(lines.len(), 1);
//!
//! let lines = buffer.push(b"K\r\n");
//! assert_eq!(lines[0].as_ref().unwrap(), "OK");
//! ```

use bytes::BytesMut;

use super::wire_format::{CR, PAYLOAD_PROMPT};
use crate::error::{AtError, Result};

/// Default maximum line length in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Collecting,
    Discarding { dropped: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete lines.
///
/// Empty lines (the blank line the device emits before most responses) are
/// skipped. The payload prompt `> ` is reported as a line of its own even
/// though the device never terminates it.
pub struct LineBuffer {
    buffer: BytesMut,
    state: State,
    max_line_length: usize,
}

impl LineBuffer {
    /// Create a new line buffer with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a new line buffer with a custom line limit.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_line_length.min(64 * 1024)),
            state: State::Collecting,
            max_line_length,
        }
    }

    /// Push data into the buffer and extract all complete lines.
    ///
    /// Lines are returned in arrival order. A line longer than the limit is
    /// dropped and reported in its place as `DecodingTruncated`, without
    /// affecting the lines around it.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<String>> {
        let mut lines = Vec::new();

        for &byte in data {
            let terminator = byte == CR || byte == b'\n';

            match self.state {
                State::Discarding { dropped } => {
                    if terminator {
                        self.state = State::Collecting;
                        lines.push(Err(AtError::DecodingTruncated {
                            capacity: self.max_line_length,
                            actual: dropped,
                        }));
                    } else {
                        self.state = State::Discarding {
                            dropped: dropped + 1,
                        };
                    }
                }
                State::Collecting if terminator => {
                    if !self.buffer.is_empty() {
                        let line = self.buffer.split();
                        lines.push(Ok(String::from_utf8_lossy(&line).into_owned()));
                    }
                }
                State::Collecting => {
                    if self.buffer.len() >= self.max_line_length {
                        self.state = State::Discarding {
                            dropped: self.buffer.len() + 1,
                        };
                        self.buffer.clear();
                    } else {
                        self.buffer.extend_from_slice(&[byte]);
                    }
                }
            }
        }

        if self.is_prompt() {
            self.buffer.clear();
            lines.push(Ok(PAYLOAD_PROMPT.to_string()));
        }

        lines
    }

    fn is_prompt(&self) -> bool {
        self.state == State::Collecting
            && (self.buffer.as_ref() == b"> " || self.buffer.as_ref() == PAYLOAD_PROMPT.as_bytes())
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::Collecting;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

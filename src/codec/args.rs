//! Argument encoding into the command buffer.
//!
//! Every `append_*` call renders one typed value and then appends whatever
//! the [`Terminator`] asks for: the argument delimiter, nothing, or CRLF.
//! Appends are all-or-nothing: a value that does not fit leaves the buffer
//! untouched and returns `EncodingOverflow`.
//!
//! # Example
//!
//! ```
//! use atwire::codec::{CommandBuffer, IntFormat, Terminator};
//!
//! let mut buf = CommandBuffer::with_capacity(64);
//! buf.append_str("AT%CMATT=", Terminator::End).unwrap();
//! buf.append_int(1u8, IntFormat::U8, Terminator::Crlf).unwrap();
//! assert_eq!(buf.as_bytes(), b"AT%CMATT=1\r\n");
//! ```

use std::fmt;

use bytes::{Bytes, BytesMut};

use super::enums::AtEnum;
use crate::error::{AtError, Result};
use crate::protocol::{CR, CRLF, DELIMITER, QUOTE};

/// Default command buffer capacity in bytes.
pub const DEFAULT_COMMAND_CAPACITY: usize = 2048;

/// Number of bits an integer argument occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
}

impl Width {
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
        }
    }
}

/// How an integer argument is rendered and parsed.
///
/// A closed set: hexadecimal is always unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntFormat {
    /// Unsigned decimal.
    Unsigned(Width),
    /// Signed decimal (leading `-` for negative values).
    Signed(Width),
    /// Unsigned hexadecimal, uppercase digits, no prefix.
    Hex(Width),
}

impl IntFormat {
    pub const U8: IntFormat = IntFormat::Unsigned(Width::W8);
    pub const U16: IntFormat = IntFormat::Unsigned(Width::W16);
    pub const U32: IntFormat = IntFormat::Unsigned(Width::W32);
    pub const I8: IntFormat = IntFormat::Signed(Width::W8);
    pub const I16: IntFormat = IntFormat::Signed(Width::W16);
    pub const I32: IntFormat = IntFormat::Signed(Width::W32);
    pub const HEX8: IntFormat = IntFormat::Hex(Width::W8);
    pub const HEX16: IntFormat = IntFormat::Hex(Width::W16);
    pub const HEX32: IntFormat = IntFormat::Hex(Width::W32);

    /// Inclusive range of values representable in this format.
    pub fn range(self) -> (i64, i64) {
        match self {
            IntFormat::Unsigned(w) | IntFormat::Hex(w) => (0, (1i64 << w.bits()) - 1),
            IntFormat::Signed(w) => {
                let half = 1i64 << (w.bits() - 1);
                (-half, half - 1)
            }
        }
    }

    fn check(self, value: i64) -> Result<i64> {
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(AtError::ValueOutOfRange {
                value,
                format: self.to_string(),
            });
        }
        Ok(value)
    }

    /// Render a value as argument text.
    pub fn render(self, value: i64) -> Result<String> {
        let value = self.check(value)?;
        Ok(match self {
            IntFormat::Hex(_) => format!("{:X}", value),
            _ => value.to_string(),
        })
    }

    /// Parse argument text into a value, failing on overflow of the width.
    ///
    /// A leading `+` is rejected in every format.
    pub fn parse(self, token: &str) -> Result<i64> {
        let token = token.trim();
        let parsed = match self {
            IntFormat::Hex(_) => {
                let digits = token
                    .strip_prefix("0x")
                    .or_else(|| token.strip_prefix("0X"))
                    .unwrap_or(token);
                (!digits.starts_with('+'))
                    .then(|| u32::from_str_radix(digits, 16).map(i64::from).ok())
                    .flatten()
            }
            IntFormat::Unsigned(_) => token
                .bytes()
                .all(|b| b.is_ascii_digit())
                .then(|| token.parse::<u32>().ok().map(i64::from))
                .flatten(),
            IntFormat::Signed(_) => (!token.starts_with('+'))
                .then(|| token.parse::<i32>().map(i64::from).ok())
                .flatten(),
        };

        let value = parsed
            .ok_or_else(|| AtError::malformed(format!("{:?} is not a valid {}", token, self)))?;
        self.check(value)
            .map_err(|_| AtError::malformed(format!("{:?} overflows {}", token, self)))
    }
}

impl fmt::Display for IntFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntFormat::Unsigned(w) => write!(f, "u{}", w.bits()),
            IntFormat::Signed(w) => write!(f, "i{}", w.bits()),
            IntFormat::Hex(w) => write!(f, "hex{}", w.bits()),
        }
    }
}

/// What follows an argument.
///
/// On the encode side this is what gets appended after the value; on the
/// decode side it is what the scan stops at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// The argument delimiter `,`.
    Delim,
    /// Nothing: the argument is the last one (decode: up to end of line).
    End,
    /// CRLF line terminator (decode: same as `End`).
    Crlf,
}

/// Whether a string or enum argument is wrapped in quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    Bare,
    Quoted,
}

/// Bounded buffer a single request is composed into.
#[derive(Debug)]
pub struct CommandBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl CommandBuffer {
    /// Create an empty buffer that refuses to grow beyond `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    fn ensure_room(&self, extra: usize) -> Result<()> {
        let required = self.buf.len() + extra;
        if required > self.capacity {
            return Err(AtError::EncodingOverflow {
                capacity: self.capacity,
                required,
            });
        }
        Ok(())
    }

    fn terminator_bytes(term: Terminator) -> &'static [u8] {
        match term {
            Terminator::Delim => b",",
            Terminator::End => b"",
            Terminator::Crlf => CRLF,
        }
    }

    fn append_parts(&mut self, parts: &[&[u8]]) -> Result<()> {
        self.ensure_room(parts.iter().map(|p| p.len()).sum())?;
        for part in parts {
            self.buf.extend_from_slice(part);
        }
        Ok(())
    }

    /// Append raw bytes (command heads, payloads, control characters).
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.append_parts(&[bytes])
    }

    /// Append an integer rendered per `format`.
    pub fn append_int(
        &mut self,
        value: impl Into<i64>,
        format: IntFormat,
        term: Terminator,
    ) -> Result<()> {
        let text = format.render(value.into())?;
        self.append_parts(&[text.as_bytes(), Self::terminator_bytes(term)])
    }

    /// Append a string as-is.
    pub fn append_str(&mut self, value: &str, term: Terminator) -> Result<()> {
        self.append_parts(&[value.as_bytes(), Self::terminator_bytes(term)])
    }

    /// Append a string wrapped in quotes.
    pub fn append_quoted(&mut self, value: &str, term: Terminator) -> Result<()> {
        self.append_parts(&[
            &[QUOTE],
            value.as_bytes(),
            &[QUOTE],
            Self::terminator_bytes(term),
        ])
    }

    /// Append the wire token of an enumerated value.
    pub fn append_enum<E: AtEnum>(
        &mut self,
        value: E,
        quoting: Quoting,
        term: Terminator,
    ) -> Result<()> {
        match quoting {
            Quoting::Bare => self.append_str(value.token(), term),
            Quoting::Quoted => self.append_quoted(value.token(), term),
        }
    }

    /// Append just the argument delimiter (an empty field).
    pub fn append_delimiter(&mut self) -> Result<()> {
        self.append_parts(&[&[DELIMITER]])
    }

    /// The request text up to its first CR, as the device would echo it.
    pub fn command_head(&self) -> String {
        let end = self
            .buf
            .iter()
            .position(|&b| b == CR || b == b'\n')
            .unwrap_or(self.buf.len());
        String::from_utf8_lossy(&self.buf[..end]).into_owned()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still available before `EncodingOverflow`.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Take the composed bytes out, leaving the buffer empty and reusable.
    pub(crate) fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

//! Argument decoding from response and event lines.
//!
//! [`ArgCursor`] walks a line of comma-delimited arguments. Each `next_*`
//! call scans from the cursor to the requested [`Terminator`], interprets
//! the enclosed token and moves the cursor past the delimiter.
//!
//! Scanning is quote-aware: a delimiter between a pair of `"` does not end
//! the token, so `"24/01/01,12:00:00+04"` is one argument.
//!
//! # Example
//!
//! ```
//! use atwire::codec::{ArgCursor, IntFormat, Terminator};
//!
//! let mut args = ArgCursor::new("5,10,3,2");
//! let pin: u8 = args.next_int(IntFormat::U8, Terminator::Delim).unwrap();
//! let puk: u8 = args.next_int(IntFormat::U8, Terminator::Delim).unwrap();
//! let pin2: u8 = args.next_int(IntFormat::U8, Terminator::Delim).unwrap();
//! let puk2: u8 = args.next_int(IntFormat::U8, Terminator::End).unwrap();
//! assert_eq!((pin, puk, pin2, puk2), (5, 10, 3, 2));
//! ```

use super::args::{IntFormat, Quoting, Terminator};
use super::enums::{decode_enum, AtEnum};
use crate::error::{AtError, Result};
use crate::protocol::{DELIMITER, QUOTE};

/// Default bound on how far a delimited scan may run.
pub const DEFAULT_MAX_ARG_SPAN: usize = 512;

/// Cursor over the argument text of one line.
#[derive(Debug, Clone)]
pub struct ArgCursor<'a> {
    input: &'a str,
    pos: usize,
    max_span: usize,
}

impl<'a> ArgCursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_max_span(input, DEFAULT_MAX_ARG_SPAN)
    }

    /// Cursor whose scans fail once a token runs past `max_span` bytes.
    pub fn with_max_span(input: &'a str, max_span: usize) -> Self {
        Self {
            input,
            pos: 0,
            max_span,
        }
    }

    /// Text not yet consumed.
    #[inline]
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Skip leading spaces (the blank after a `prefix:`).
    pub fn skip_spaces(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start_matches(' ').len();
    }

    /// Find the end of the next token.
    ///
    /// Returns the token and the cursor position after its terminator.
    fn scan(&self, term: Terminator) -> Result<(&'a str, usize)> {
        let rest = self.rest();

        if term != Terminator::Delim {
            if rest.len() > self.max_span {
                return Err(AtError::malformed(format!(
                    "argument longer than {} bytes",
                    self.max_span
                )));
            }
            return Ok((rest, self.input.len()));
        }

        let mut in_quotes = false;
        for (i, byte) in rest.bytes().enumerate() {
            if i > self.max_span {
                break;
            }
            if byte == QUOTE {
                in_quotes = !in_quotes;
            } else if byte == DELIMITER && !in_quotes {
                return Ok((&rest[..i], self.pos + i + 1));
            }
        }

        if rest.len() <= self.max_span {
            // Last argument on the line: the end of input closes it.
            return Ok((rest, self.input.len()));
        }

        Err(AtError::malformed(format!(
            "no delimiter within {} bytes",
            self.max_span
        )))
    }

    fn next_token(&mut self, term: Terminator) -> Result<&'a str> {
        let (token, next) = self.scan(term)?;
        self.pos = next;
        Ok(token)
    }

    /// Decode the next integer.
    ///
    /// The value is range-checked against `format` and then converted into
    /// `T`; either failure is `DecodingMalformed`. The cursor does not move
    /// on failure.
    pub fn next_int<T: TryFrom<i64>>(&mut self, format: IntFormat, term: Terminator) -> Result<T> {
        let (token, next) = self.scan(term)?;
        let value = format.parse(token)?;
        let value = T::try_from(value)
            .map_err(|_| AtError::malformed(format!("{} does not fit the target type", value)))?;
        self.pos = next;
        Ok(value)
    }

    /// Next token as-is, quotes included.
    pub fn next_string(&mut self, term: Terminator) -> Result<&'a str> {
        self.next_token(term)
    }

    /// Next token with one pair of surrounding quotes removed, if present.
    pub fn next_quoted_string_stripped(&mut self, term: Terminator) -> Result<&'a str> {
        self.next_token(term).map(strip_quotes)
    }

    /// Next string token, failing with `DecodingTruncated` if it is longer
    /// than `capacity` bytes.
    pub fn next_string_within(
        &mut self,
        quoting: Quoting,
        capacity: usize,
        term: Terminator,
    ) -> Result<&'a str> {
        let (token, next) = self.scan(term)?;
        let token = match quoting {
            Quoting::Bare => token,
            Quoting::Quoted => strip_quotes(token),
        };
        if token.len() > capacity {
            return Err(AtError::DecodingTruncated {
                capacity,
                actual: token.len(),
            });
        }
        self.pos = next;
        Ok(token)
    }

    /// Decode the next enumerated value; surrounding quotes are ignored.
    pub fn next_enum<E: AtEnum>(&mut self, term: Terminator) -> Result<E> {
        let (token, next) = self.scan(term)?;
        let value = decode_enum(strip_quotes(token))?;
        self.pos = next;
        Ok(value)
    }

    /// Number of delimiter-separated tokens left before the end of line.
    pub fn count_args(&self) -> usize {
        let rest = self.rest();
        if rest.is_empty() {
            return 0;
        }

        let mut in_quotes = false;
        let mut count = 1;
        for byte in rest.bytes() {
            if byte == QUOTE {
                in_quotes = !in_quotes;
            } else if byte == DELIMITER && !in_quotes {
                count += 1;
            }
        }
        count
    }
}

fn strip_quotes(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::at_enum;

    at_enum! {
        enum Storage {
            Sim => "SM",
            Phone => "ME",
        }
    }

    #[test]
    fn test_four_u8_values() {
        let mut args = ArgCursor::new("5,10,3,2");
        let mut values = Vec::new();
        for _ in 0..3 {
            values.push(args.next_int::<u8>(IntFormat::U8, Terminator::Delim).unwrap());
        }
        values.push(args.next_int::<u8>(IntFormat::U8, Terminator::End).unwrap());
        assert_eq!(values, vec![5, 10, 3, 2]);
        assert!(args.is_empty());
    }

    #[test]
    fn test_int_overflow_is_malformed_and_cursor_stays() {
        let mut args = ArgCursor::new("300,1");
        let err = args.next_int::<u8>(IntFormat::U8, Terminator::Delim);
        assert!(matches!(err, Err(AtError::DecodingMalformed(_))));
        assert_eq!(args.rest(), "300,1");
        assert_eq!(args.next_int::<u16>(IntFormat::U16, Terminator::Delim).unwrap(), 300);
    }

    #[test]
    fn test_target_type_too_small() {
        let mut args = ArgCursor::new("70000");
        assert!(args.next_int::<u16>(IntFormat::U32, Terminator::End).is_err());
    }

    #[test]
    fn test_strings_and_quotes() {
        let mut args = ArgCursor::new("\"+4917\",145,\"hello, world\"");
        assert_eq!(args.next_string(Terminator::Delim).unwrap(), "\"+4917\"");
        assert_eq!(args.next_int::<u16>(IntFormat::U16, Terminator::Delim).unwrap(), 145);
        assert_eq!(
            args.next_quoted_string_stripped(Terminator::End).unwrap(),
            "hello, world"
        );
    }

    #[test]
    fn test_empty_field() {
        let mut args = ArgCursor::new("1,,\"x\"");
        assert_eq!(args.next_int::<u8>(IntFormat::U8, Terminator::Delim).unwrap(), 1);
        assert_eq!(args.next_string(Terminator::Delim).unwrap(), "");
        assert_eq!(args.next_quoted_string_stripped(Terminator::End).unwrap(), "x");
    }

    #[test]
    fn test_string_within_capacity() {
        let mut args = ArgCursor::new("\"cert.pem\",\"key.pem\"");
        assert!(matches!(
            args.next_string_within(Quoting::Quoted, 4, Terminator::Delim),
            Err(AtError::DecodingTruncated {
                capacity: 4,
                actual: 8
            })
        ));
        assert_eq!(
            args.next_string_within(Quoting::Quoted, 8, Terminator::Delim)
                .unwrap(),
            "cert.pem"
        );
    }

    #[test]
    fn test_enum_decode() {
        let mut args = ArgCursor::new("\"SM\",ME,\"XX\"");
        assert_eq!(args.next_enum::<Storage>(Terminator::Delim).unwrap(), Storage::Sim);
        assert_eq!(args.next_enum::<Storage>(Terminator::Delim).unwrap(), Storage::Phone);
        assert!(args.next_enum::<Storage>(Terminator::End).is_err());
    }

    #[test]
    fn test_missing_delimiter_beyond_bound() {
        let line = "x".repeat(20);
        let mut args = ArgCursor::with_max_span(&line, 8);
        assert!(matches!(
            args.next_string(Terminator::Delim),
            Err(AtError::DecodingMalformed(_))
        ));
        assert!(matches!(
            args.next_string(Terminator::End),
            Err(AtError::DecodingMalformed(_))
        ));
        assert!(matches!(
            args.next_string(Terminator::Crlf),
            Err(AtError::DecodingMalformed(_))
        ));
        assert_eq!(args.rest().len(), 20);
    }

    #[test]
    fn test_last_argument_within_bound() {
        let line = "x".repeat(8);
        let mut args = ArgCursor::with_max_span(&line, 8);
        assert_eq!(args.next_string(Terminator::End).unwrap().len(), 8);
        assert!(args.is_empty());
    }

    #[test]
    fn test_count_args() {
        assert_eq!(ArgCursor::new("").count_args(), 0);
        assert_eq!(ArgCursor::new("1").count_args(), 1);
        assert_eq!(ArgCursor::new("1,,3").count_args(), 3);
        assert_eq!(
            ArgCursor::new("\"24/01/01,12:00:00+04\",hello").count_args(),
            2
        );

        let mut args = ArgCursor::new("a,b,c");
        args.next_string(Terminator::Delim).unwrap();
        assert_eq!(args.count_args(), 2);
    }

    #[test]
    fn test_skip_spaces() {
        let mut args = ArgCursor::new("  7");
        args.skip_spaces();
        assert_eq!(args.next_int::<u8>(IntFormat::U8, Terminator::End).unwrap(), 7);
    }
}

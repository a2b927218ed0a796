//! Parameter lists with trailing optional parameters.
//!
//! A [`ParamList`] collects one slot per parameter position, each either a
//! value or omitted, and renders the wire text in a single pass:
//!
//! - positions after the last present value are dropped entirely
//! - omitted positions before a present value become empty fields
//!
//! so the rendered line never ends in a delimiter.
//!
//! # Example
//!
//! ```
//! use atwire::codec::{CommandBuffer, IntFormat, ParamList};
//!
//! let mut buf = CommandBuffer::with_capacity(64);
//! ParamList::new("AT+CPMS=")
//!     .int(1u8, IntFormat::U8)
//!     .opt_quoted(None::<&str>)
//!     .opt_quoted(Some("SM"))
//!     .finish(&mut buf)
//!     .unwrap();
//! assert_eq!(buf.as_bytes(), b"AT+CPMS=1,,\"SM\"\r\n");
//! ```

use super::args::{CommandBuffer, IntFormat, Quoting};
use super::enums::AtEnum;
use crate::error::Result;
use crate::protocol::{CR, CRLF, CTRL_Z, DELIMITER, QUOTE};

/// One rendered parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64, IntFormat),
    Str(String),
    Quoted(String),
}

impl Param {
    fn render_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Param::Int(value, format) => out.extend_from_slice(format.render(*value)?.as_bytes()),
            Param::Str(s) => out.extend_from_slice(s.as_bytes()),
            Param::Quoted(s) => {
                out.push(QUOTE);
                out.extend_from_slice(s.as_bytes());
                out.push(QUOTE);
            }
        }
        Ok(())
    }

    fn from_enum<E: AtEnum>(value: E, quoting: Quoting) -> Self {
        match quoting {
            Quoting::Bare => Param::Str(value.token().to_string()),
            Quoting::Quoted => Param::Quoted(value.token().to_string()),
        }
    }
}

/// Command head plus an ordered list of parameter slots.
#[derive(Debug, Clone)]
pub struct ParamList {
    head: String,
    slots: Vec<Option<Param>>,
}

impl ParamList {
    /// Start a list after the command head, e.g. `AT%PINGCMD=`.
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            head: head.into(),
            slots: Vec::new(),
        }
    }

    /// Add a slot directly.
    pub fn param(mut self, slot: Option<Param>) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn int(self, value: impl Into<i64>, format: IntFormat) -> Self {
        self.param(Some(Param::Int(value.into(), format)))
    }

    pub fn opt_int<V: Into<i64>>(self, value: Option<V>, format: IntFormat) -> Self {
        self.param(value.map(|v| Param::Int(v.into(), format)))
    }

    pub fn string(self, value: impl Into<String>) -> Self {
        self.param(Some(Param::Str(value.into())))
    }

    pub fn opt_string<S: Into<String>>(self, value: Option<S>) -> Self {
        self.param(value.map(|v| Param::Str(v.into())))
    }

    pub fn quoted(self, value: impl Into<String>) -> Self {
        self.param(Some(Param::Quoted(value.into())))
    }

    pub fn opt_quoted<S: Into<String>>(self, value: Option<S>) -> Self {
        self.param(value.map(|v| Param::Quoted(v.into())))
    }

    pub fn enum_value<E: AtEnum>(self, value: E, quoting: Quoting) -> Self {
        self.param(Some(Param::from_enum(value, quoting)))
    }

    pub fn opt_enum<E: AtEnum>(self, value: Option<E>, quoting: Quoting) -> Self {
        self.param(value.map(|v| Param::from_enum(v, quoting)))
    }

    /// Number of omitted slots at the tail; these are not rendered.
    pub fn trailing_omitted(&self) -> usize {
        self.slots.iter().rev().take_while(|s| s.is_none()).count()
    }

    fn render(&self) -> Result<Vec<u8>> {
        let rendered = self.slots.len() - self.trailing_omitted();
        let mut out = Vec::with_capacity(self.head.len() + rendered * 8);
        out.extend_from_slice(self.head.as_bytes());

        for (i, slot) in self.slots[..rendered].iter().enumerate() {
            if i > 0 {
                out.push(DELIMITER);
            }
            if let Some(param) = slot {
                param.render_into(&mut out)?;
            }
        }
        Ok(out)
    }

    /// Append the head and parameters without a terminator.
    ///
    /// Fails without touching `buf` if a value is out of range or the text
    /// does not fit.
    pub fn render_into(&self, buf: &mut CommandBuffer) -> Result<()> {
        buf.append_raw(&self.render()?)
    }

    /// Render and terminate with CRLF.
    pub fn finish(&self, buf: &mut CommandBuffer) -> Result<()> {
        let mut out = self.render()?;
        out.extend_from_slice(CRLF);
        buf.append_raw(&out)
    }

    /// Render, then append a raw payload terminated by Ctrl-Z instead of CRLF.
    pub fn finish_with_payload(&self, buf: &mut CommandBuffer, payload: &[u8]) -> Result<()> {
        let mut out = self.render()?;
        out.push(CR);
        out.extend_from_slice(payload);
        out.push(CTRL_Z);
        buf.append_raw(&out)
    }
}

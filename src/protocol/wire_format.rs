//! Wire format constants and confirmation status lines.
//!
//! Framing used by the modem:
//! ```text
//! host   → AT%CMATT=1\r\n
//! device ← AT%CMATT=1          (echo, optional)
//! device ← %CMATT: 1           (response payload, zero or more lines)
//! device ← +CMTI: "SM",3       (unsolicited event, may interleave)
//! device ← OK                  (confirmation, exactly one)
//! ```
//!
//! Payload-bearing requests end the command head with `\r`, followed by the
//! raw payload and Ctrl-Z instead of CRLF.

use std::fmt;

use crate::error::{AtError, Result};

/// Byte separating consecutive arguments.
pub const DELIMITER: u8 = b',';

/// Byte wrapping string arguments.
pub const QUOTE: u8 = b'"';

/// Separates the response/event prefix from its arguments.
pub const PREFIX_SEPARATOR: u8 = b':';

/// Terminator for ordinary requests.
pub const CRLF: &[u8] = b"\r\n";

/// Ends the command head of a payload-bearing request.
pub const CR: u8 = b'\r';

/// Ends the payload of a payload-bearing request (Ctrl-Z).
pub const CTRL_Z: u8 = 0x1A;

/// Prompt sent by the device before it accepts a payload.
pub const PAYLOAD_PROMPT: &str = ">";

/// Success confirmation token.
pub const STATUS_OK: &str = "OK";

/// Generic failure confirmation token.
pub const STATUS_ERROR: &str = "ERROR";

/// Equipment (CME) structured error prefix.
pub const CME_ERROR_PREFIX: &str = "+CME ERROR:";

/// Message service (CMS) structured error prefix.
pub const CMS_ERROR_PREFIX: &str = "+CMS ERROR:";

/// Which error table a device error code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// Mobile equipment error (`+CME ERROR`).
    Cme,
    /// Message service error (`+CMS ERROR`).
    Cms,
}

/// Structured error code returned in a confirmation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceError {
    /// Error table.
    pub kind: DeviceErrorKind,
    /// Numeric error code.
    pub code: u16,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            DeviceErrorKind::Cme => CME_ERROR_PREFIX,
            DeviceErrorKind::Cms => CMS_ERROR_PREFIX,
        };
        write!(f, "{} {}", prefix, self.code)
    }
}

/// Terminal outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfirmStatus {
    /// `OK`
    Success,
    /// `ERROR`
    Failure,
    /// `+CME ERROR: <n>` / `+CMS ERROR: <n>`
    Device(DeviceError),
}

impl ConfirmStatus {
    /// Whether this status is a success.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, ConfirmStatus::Success)
    }

    /// Classify a line as a confirmation status.
    ///
    /// Returns `None` if the line is not a status line at all, and
    /// `Some(Err(..))` if it starts like a structured error but its code
    /// cannot be parsed.
    pub fn parse(line: &str) -> Option<Result<ConfirmStatus>> {
        let line = line.trim_end();
        if line == STATUS_OK {
            return Some(Ok(ConfirmStatus::Success));
        }
        if line == STATUS_ERROR {
            return Some(Ok(ConfirmStatus::Failure));
        }

        let (kind, rest) = if let Some(rest) = line.strip_prefix(CME_ERROR_PREFIX) {
            (DeviceErrorKind::Cme, rest)
        } else if let Some(rest) = line.strip_prefix(CMS_ERROR_PREFIX) {
            (DeviceErrorKind::Cms, rest)
        } else {
            return None;
        };

        Some(
            rest.trim()
                .parse::<u16>()
                .map(|code| ConfirmStatus::Device(DeviceError { kind, code }))
                .map_err(|_| AtError::MalformedConfirmation(line.to_string())),
        )
    }
}

impl fmt::Display for ConfirmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmStatus::Success => f.write_str(STATUS_OK),
            ConfirmStatus::Failure => f.write_str(STATUS_ERROR),
            ConfirmStatus::Device(err) => err.fmt(f),
        }
    }
}

/// Split `<prefix>:<args>` into the prefix and the argument text.
///
/// Leading spaces after the colon are skipped. Returns `None` when the line
/// carries no prefix separator.
pub fn split_prefix(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(PREFIX_SEPARATOR as char)?;
    let (prefix, rest) = line.split_at(idx);
    Some((prefix, rest[1..].trim_start_matches(' ')))
}

/// Prefix the device puts on response lines to `command_head`.
///
/// `AT+CMGL="ALL"` answers with `+CMGL:` lines, `AT%CMATT?` with
/// `%CMATT:`. Basic commands such as `AT` or `ATE0` have none.
pub fn command_prefix(command_head: &str) -> Option<&str> {
    if !command_head.get(..2)?.eq_ignore_ascii_case("AT") {
        return None;
    }
    let body = &command_head[2..];
    if !body.starts_with(|c: char| c.is_ascii_punctuation()) {
        return None;
    }
    let end = body.find(['=', '?']).unwrap_or(body.len());
    let prefix = &body[..end];
    (prefix.len() > 1).then_some(prefix)
}

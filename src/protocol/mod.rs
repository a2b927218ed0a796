//! Protocol module - wire constants, status lines and line assembly.
//!
//! This module implements the text framing of the AT protocol:
//! - Delimiter, quote and terminator constants
//! - Confirmation status classification (`OK`, `ERROR`, `+CME/+CMS ERROR`)
//! - Line buffer for splitting the received byte stream into lines

mod line_buffer;
mod wire_format;

pub use line_buffer::{LineBuffer, DEFAULT_MAX_LINE_LENGTH};
pub use wire_format::{
    command_prefix, split_prefix, ConfirmStatus, DeviceError, DeviceErrorKind, CME_ERROR_PREFIX,
    CMS_ERROR_PREFIX, CR, CRLF, CTRL_Z, DELIMITER, PAYLOAD_PROMPT, PREFIX_SEPARATOR, QUOTE,
    STATUS_ERROR, STATUS_OK,
};

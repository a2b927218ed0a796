//! Codec module - typed arguments to and from AT text.
//!
//! - [`CommandBuffer`] - bounded request buffer with typed `append_*` calls
//! - [`ParamList`] - parameter slots rendered with trailing omissions trimmed
//! - [`ArgCursor`] - typed `next_*` decoding of response and event arguments
//! - [`AtEnum`] / [`at_enum!`](crate::at_enum) - enumerated values as fixed tokens
//!
//! # Example
//!
//! ```
//! use atwire::codec::{ArgCursor, CommandBuffer, IntFormat, ParamList, Terminator};
//!
//! let mut buf = CommandBuffer::with_capacity(64);
//! ParamList::new("AT+CMGD=").int(4u8, IntFormat::U8).finish(&mut buf).unwrap();
//! assert_eq!(buf.as_bytes(), b"AT+CMGD=4\r\n");
//!
//! let mut args = ArgCursor::new("\"SM\",12,30");
//! assert_eq!(args.next_quoted_string_stripped(Terminator::Delim).unwrap(), "SM");
//! assert_eq!(args.count_args(), 2);
//! ```

mod args;
mod cursor;
mod enums;
mod params;

pub use args::{CommandBuffer, IntFormat, Quoting, Terminator, Width, DEFAULT_COMMAND_CAPACITY};
pub use cursor::{ArgCursor, DEFAULT_MAX_ARG_SPAN};
pub use enums::{decode_enum, AtEnum, MAX_ENUM_TOKEN_LEN};
pub use params::{Param, ParamList};

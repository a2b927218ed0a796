//! # atwire
//!
//! Transaction engine for text AT-command protocols spoken by cellular
//! modems over a single serial byte stream.
//!
//! ## Architecture
//!
//! - **Codec**: typed arguments appended to a bounded command buffer, and
//!   decoded back out of response and event lines
//! - **Parameter lists**: trailing optional parameters rendered without
//!   stray delimiters
//! - **Engine**: one request in flight at a time, correlated with its
//!   confirmation under a per-class timeout
//! - **Events**: unsolicited notifications routed by prefix to typed parsers
//!
//! ## Example
//!
//! ```no_run
//! use atwire::catalog::sms;
//! use atwire::Engine;
//!
//! #[tokio::main]
//! async fn main() -> atwire::Result<()> {
//!     let (host, _device) = tokio::io::duplex(1024);
//!     let (reader, writer) = tokio::io::split(host);
//!
//!     let engine = Engine::builder()
//!         .on_event(sms::NEW_MESSAGE_EVENT, sms::parse_new_message, |msg| {
//!             println!("new message {:?}", msg);
//!         })
//!         .start(reader, writer)?;
//!
//!     sms::set_new_message_indication(&engine, true).await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;

mod engine;
mod router;
mod transaction;
mod writer;

pub use config::{EngineConfig, Precedence, TimeoutClass};
pub use engine::{Engine, EngineBuilder};
pub use error::{AtError, Result};
pub use protocol::{ConfirmStatus, DeviceError, DeviceErrorKind};
pub use transaction::{Composer, Pending, Response};

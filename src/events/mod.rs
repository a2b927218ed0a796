//! Events module - unsolicited notification dispatch.
//!
//! Provides:
//! - [`EventRegistry`] - maps notification prefixes to parsers and subscribers
//! - [`EventHandler`] - object-safe handler trait, implemented by [`TypedEventHandler`]
//!
//! Unregistered prefixes are ignored. A parser failure is local to the
//! event that caused it.

mod registry;

pub use registry::{EventHandler, EventRegistry, TypedEventHandler};

//! Event registry for dispatching unsolicited lines by prefix.
//!
//! The registry maps a notification prefix (`+CMTI`, `%PINGCMD`, ...) to a
//! parser and a subscriber. Dispatching a line runs the parser over the
//! argument text and hands the typed record to the subscriber.
//!
//! # Example
//!
//! ```
//! use atwire::codec::{ArgCursor, IntFormat, Terminator};
//! use atwire::events::EventRegistry;
//!
//! let registry = EventRegistry::new();
//! registry.register(
//!     "+CMTI",
//!     |args: &mut ArgCursor<'_>| {
//!         args.next_string(Terminator::Delim)?;
//!         args.next_int::<u16>(IntFormat::U16, Terminator::End)
//!     },
//!     |index| println!("new message at {}", index),
//! );
//!
//! assert!(registry.contains("+CMTI"));
//! assert!(registry.dispatch("+CMTI", "\"SM\",3").unwrap());
//! assert!(!registry.dispatch("+CREG", "1").unwrap());
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use crate::codec::ArgCursor;
use crate::error::Result;

/// Trait for registered event handlers.
pub trait EventHandler: Send + Sync + 'static {
    /// Parse the argument text of one event line and deliver the result.
    fn handle(&self, args: &str) -> Result<()>;
}

/// Pairs a parser producing `T` with the subscriber receiving it.
pub struct TypedEventHandler<P, S, T>
where
    P: Fn(&mut ArgCursor<'_>) -> Result<T> + Send + Sync + 'static,
    S: Fn(T) + Send + Sync + 'static,
    T: 'static,
{
    parser: P,
    subscriber: S,
    _phantom: PhantomData<fn() -> T>,
}

impl<P, S, T> TypedEventHandler<P, S, T>
where
    P: Fn(&mut ArgCursor<'_>) -> Result<T> + Send + Sync + 'static,
    S: Fn(T) + Send + Sync + 'static,
    T: 'static,
{
    pub fn new(parser: P, subscriber: S) -> Self {
        Self {
            parser,
            subscriber,
            _phantom: PhantomData,
        }
    }
}

impl<P, S, T> EventHandler for TypedEventHandler<P, S, T>
where
    P: Fn(&mut ArgCursor<'_>) -> Result<T> + Send + Sync + 'static,
    S: Fn(T) + Send + Sync + 'static,
    T: 'static,
{
    fn handle(&self, args: &str) -> Result<()> {
        let mut cursor = ArgCursor::new(args);
        let event = (self.parser)(&mut cursor)?;
        (self.subscriber)(event);
        Ok(())
    }
}

/// Registry mapping event prefixes to handlers.
///
/// Registration may happen while the engine is running, including from
/// inside a subscriber: handlers run after the lock is released.
pub struct EventRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
}

impl EventRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a parser and subscriber for `prefix`.
    ///
    /// `prefix` is the text before the colon, e.g. `"+CMTI"`. A later
    /// registration for the same prefix replaces the earlier one.
    pub fn register<P, S, T>(&self, prefix: &str, parser: P, subscriber: S)
    where
        P: Fn(&mut ArgCursor<'_>) -> Result<T> + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
        T: 'static,
    {
        self.register_handler(prefix, Box::new(TypedEventHandler::new(parser, subscriber)));
    }

    /// Register a pre-built handler.
    pub fn register_handler(&self, prefix: &str, handler: Box<dyn EventHandler>) {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.insert(prefix.to_string(), Arc::from(handler));
    }

    /// Remove the handler for `prefix`. Returns whether one was registered.
    pub fn unregister(&self, prefix: &str) -> bool {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.remove(prefix).is_some()
    }

    /// Check if a handler is registered for `prefix`.
    pub fn contains(&self, prefix: &str) -> bool {
        match self.handlers.read() {
            Ok(handlers) => handlers.contains_key(prefix),
            Err(poisoned) => poisoned.into_inner().contains_key(prefix),
        }
    }

    /// Number of registered prefixes.
    pub fn len(&self) -> usize {
        match self.handlers.read() {
            Ok(handlers) => handlers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch the argument text of an event line.
    ///
    /// Returns `Ok(false)` if no handler is registered for `prefix`, and the
    /// parser's error if the arguments could not be decoded.
    pub fn dispatch(&self, prefix: &str, args: &str) -> Result<bool> {
        let handler = match self.handlers.read() {
            Ok(handlers) => handlers.get(prefix).cloned(),
            Err(poisoned) => poisoned.into_inner().get(prefix).cloned(),
        };
        match handler {
            Some(handler) => handler.handle(args).map(|()| true),
            None => Ok(false),
        }
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("prefixes", &self.len())
            .finish()
    }
}

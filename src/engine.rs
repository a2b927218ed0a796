//! Engine builder and runtime loop.
//!
//! The [`EngineBuilder`] provides a fluent API for configuring timeouts,
//! classification precedence and event subscriptions. The [`Engine`]
//! manages the lifecycle:
//! 1. Spawn the writer task over the device's write half
//! 2. Spawn the reader task over the read half (or let the host deliver lines)
//! 3. Route every received line to the pending request or an event subscriber
//!
//! # Example
//!
//! ```no_run
//! use atwire::codec::{IntFormat, ParamList, Terminator};
//! use atwire::config::TimeoutClass;
//! use atwire::Engine;
//!
//! # async fn run(reader: tokio::io::DuplexStream, writer: tokio::io::DuplexStream) -> atwire::Result<()> {
//! let engine = Engine::builder()
//!     .on_event(
//!         "+CMTI",
//!         |args| {
//!             args.next_string(Terminator::Delim)?;
//!             args.next_int::<u16>(IntFormat::U16, Terminator::End)
//!         },
//!         |index| println!("message stored at {}", index),
//!     )
//!     .start(reader, writer)?;
//!
//! let response = engine
//!     .request(&ParamList::new("AT%CMATT?"), TimeoutClass::Proprietary)
//!     .await?;
//! let state: u8 = response.args("%CMATT")?.next_int(IntFormat::U8, Terminator::End)?;
//! # let _ = state;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::codec::{ArgCursor, CommandBuffer, ParamList};
use crate::config::{EngineConfig, Precedence, TimeoutClass};
use crate::error::{AtError, Result};
use crate::events::EventRegistry;
use crate::protocol::LineBuffer;
use crate::router::LineRouter;
use crate::transaction::{Composer, Response};
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Read buffer size for the reader task.
const READ_CHUNK_SIZE: usize = 1024;

/// State shared by the engine, its tasks and in-flight transactions.
pub(crate) struct Shared {
    pub config: EngineConfig,
    pub router: LineRouter,
    pub writer: WriterHandle,
    buffer: Arc<Mutex<CommandBuffer>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.router.close();
    }
}

/// Builder for configuring and starting an [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    events: EventRegistry,
}

impl EngineBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            events: EventRegistry::new(),
        }
    }

    /// Replace the whole configuration (e.g. one loaded with
    /// [`EngineConfig::from_json`]).
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the confirmation timeout for one command class.
    pub fn timeout(mut self, class: TimeoutClass, timeout: Duration) -> Self {
        self.config.timeouts.set(class, timeout);
        self
    }

    /// Set which of event prefix and status token is checked first.
    ///
    /// Default: `EventsFirst`
    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.config.precedence = precedence;
        self
    }

    /// Set the command buffer size.
    ///
    /// Default: 2048
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.command_capacity = capacity;
        self
    }

    /// Set the longest accepted received line.
    ///
    /// Default: 2048
    pub fn max_line_length(mut self, length: usize) -> Self {
        self.config.max_line_length = length;
        self
    }

    /// Set the writer queue depth.
    ///
    /// Default: 16
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Subscribe to an unsolicited notification.
    ///
    /// `parser` receives the arguments after `<prefix>:`; its result is
    /// passed to `subscriber`.
    pub fn on_event<P, S, T>(self, prefix: &str, parser: P, subscriber: S) -> Self
    where
        P: Fn(&mut ArgCursor<'_>) -> Result<T> + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
        T: 'static,
    {
        self.events.register(prefix, parser, subscriber);
        self
    }

    /// Start the engine with the host delivering received lines through
    /// [`Engine::deliver_line`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn build<W>(self, writer: W) -> Result<Engine>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Engine::start(self.config, self.events, writer)
    }

    /// Start the engine, spawning a reader task over `reader`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<R, W>(self, reader: R, writer: W) -> Result<Engine>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut engine = Engine::start(self.config, self.events, writer)?;

        let shared = engine.shared.clone();
        engine.reader_task = Some(tokio::spawn(async move {
            if let Err(e) = read_loop(reader, &shared).await {
                error!("Read loop error: {}", e);
            }
            shared.close();
        }));

        Ok(engine)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running transaction engine.
///
/// Dropping the engine stops its reader and writer tasks.
pub struct Engine {
    shared: Arc<Shared>,
    reader_task: Option<JoinHandle<()>>,
    writer_task: JoinHandle<Result<()>>,
}

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn start<W>(config: EngineConfig, events: EventRegistry, writer: W) -> Result<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;

        let writer_config = WriterConfig {
            channel_capacity: config.channel_capacity,
        };
        let (writer, writer_task) = spawn_writer_task(writer, writer_config);

        let shared = Arc::new(Shared {
            router: LineRouter::new(Arc::new(events), config.precedence),
            writer,
            buffer: Arc::new(Mutex::new(CommandBuffer::with_capacity(
                config.command_capacity,
            ))),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            config,
        });

        debug!(precedence = ?shared.config.precedence, "engine started");

        Ok(Engine {
            shared,
            reader_task: None,
            writer_task,
        })
    }

    /// Acquire the command buffer, waiting for any in-flight request to
    /// finish.
    pub async fn begin(&self) -> Composer {
        let guard = self.shared.buffer.clone().lock_owned().await;
        Composer::new(self.shared.clone(), guard)
    }

    /// Acquire the command buffer, failing with `Busy` if a request is in
    /// flight.
    pub fn try_begin(&self) -> Result<Composer> {
        let guard = self
            .shared
            .buffer
            .clone()
            .try_lock_owned()
            .map_err(|_| AtError::Busy)?;
        Ok(Composer::new(self.shared.clone(), guard))
    }

    /// Compose, send and wait for `OK` in one call.
    pub async fn request(&self, params: &ParamList, class: TimeoutClass) -> Result<Response> {
        let mut composer = self.begin().await;
        composer.compose(params)?;
        composer.send().await?.confirm(class).await
    }

    /// Like [`request`](Self::request) for payload-bearing commands.
    pub async fn request_with_payload(
        &self,
        params: &ParamList,
        payload: &[u8],
        class: TimeoutClass,
    ) -> Result<Response> {
        let mut composer = self.begin().await;
        composer.compose_with_payload(params, payload)?;
        composer.send().await?.confirm(class).await
    }

    /// Feed one complete received line.
    ///
    /// For hosts that assemble lines themselves; engines started with a
    /// reader do this internally.
    pub fn deliver_line(&self, line: &str) {
        self.shared.router.route(line);
    }

    /// Subscribe to an unsolicited notification while running.
    pub fn subscribe<P, S, T>(&self, prefix: &str, parser: P, subscriber: S)
    where
        P: Fn(&mut ArgCursor<'_>) -> Result<T> + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
        T: 'static,
    {
        self.shared.router.events().register(prefix, parser, subscriber);
    }

    /// Remove the subscription for `prefix`.
    pub fn unsubscribe(&self, prefix: &str) -> bool {
        self.shared.router.events().unregister(prefix)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Whether the reader has stopped (device stream closed).
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.writer_task.abort();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Main read loop - assembles lines and routes them in arrival order.
async fn read_loop<R>(mut reader: R, shared: &Shared) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineBuffer::with_max_line_length(shared.config.max_line_length);
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("device stream closed");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) => return Err(AtError::TransportFailure(e)),
        };

        for line in lines.push(&buf[..n]) {
            match line {
                Ok(line) => {
                    shared.router.route(&line);
                }
                Err(e) => warn!(error = %e, "dropping received line"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{IntFormat, Terminator};
    use tokio::io::{duplex, AsyncReadExt as _, AsyncWriteExt};

    #[test]
    fn test_builder_default() {
        let builder = EngineBuilder::default();
        assert_eq!(builder.config, EngineConfig::default());
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Engine::builder()
            .timeout(TimeoutClass::Dns, Duration::from_secs(60))
            .precedence(Precedence::ConfirmationFirst)
            .command_capacity(256)
            .max_line_length(512)
            .channel_capacity(4)
            .on_event(
                "+CMTI",
                |args: &mut ArgCursor<'_>| args.next_string(Terminator::End).map(str::to_string),
                |_| {},
            );

        assert_eq!(
            builder.config.timeouts.get(TimeoutClass::Dns),
            Duration::from_secs(60)
        );
        assert_eq!(builder.config.precedence, Precedence::ConfirmationFirst);
        assert_eq!(builder.config.command_capacity, 256);
        assert_eq!(builder.config.max_line_length, 512);
        assert_eq!(builder.config.channel_capacity, 4);
        assert!(builder.events.contains("+CMTI"));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (host, _device) = duplex(64);
        let result = Engine::builder().command_capacity(0).build(host);
        assert!(matches!(result, Err(AtError::Config(_))));
    }

    #[tokio::test]
    async fn test_try_begin_busy_while_in_flight() {
        let (host, _device) = duplex(64);
        let engine = Engine::builder().build(host).unwrap();

        let composer = engine.try_begin().unwrap();
        assert!(matches!(engine.try_begin(), Err(AtError::Busy)));
        drop(composer);
        assert!(engine.try_begin().is_ok());
    }

    #[tokio::test]
    async fn test_deliver_line_completes_request() {
        let (host, mut device) = duplex(256);
        let engine = Engine::builder().build(host).unwrap();

        let mut composer = engine.begin().await;
        composer.compose(&ParamList::new("AT%CMATT?")).unwrap();
        let pending = composer.send().await.unwrap();

        let mut buf = [0u8; 32];
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"AT%CMATT?\r\n");

        engine.deliver_line("%CMATT: 1");
        engine.deliver_line("OK");

        let response = pending.confirm(TimeoutClass::Proprietary).await.unwrap();
        let state: u8 = response
            .args("%CMATT")
            .unwrap()
            .next_int(IntFormat::U8, Terminator::End)
            .unwrap();
        assert_eq!(state, 1);
    }

    #[tokio::test]
    async fn test_reader_close_fails_pending() {
        let (host_read, device_write) = duplex(64);
        let (host_write, mut device_read) = duplex(64);
        let engine = Engine::builder().start(host_read, host_write).unwrap();

        let mut composer = engine.begin().await;
        composer.compose(&ParamList::new("AT")).unwrap();
        let pending = composer.send().await.unwrap();

        let mut buf = [0u8; 8];
        device_read.read(&mut buf).await.unwrap();

        let mut device_write = device_write;
        device_write.shutdown().await.unwrap();
        drop(device_write);

        let err = pending.confirm(TimeoutClass::General).await.unwrap_err();
        assert!(matches!(err, AtError::ConnectionClosed));
        assert!(engine.is_closed());
    }
}

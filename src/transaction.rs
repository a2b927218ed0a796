//! One request/confirmation exchange.
//!
//! A transaction moves through two handles, each consumed by the next step:
//!
//! ```text
//! Engine::begin() ─► Composer ──send()──► Pending ──wait_for_confirm()──► Response
//! ```
//!
//! The [`Composer`] owns the engine's command buffer for the whole
//! exchange, so no second request can be composed until the first one is
//! confirmed, timed out or dropped.

use std::sync::Arc;

use tokio::sync::{oneshot, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::codec::{ArgCursor, CommandBuffer, ParamList};
use crate::config::TimeoutClass;
use crate::engine::Shared;
use crate::error::{AtError, Result};
use crate::protocol::{command_prefix, split_prefix, ConfirmStatus};
use crate::router::Completion;

/// Exclusive access to the command buffer while a request is composed.
pub struct Composer {
    shared: Arc<Shared>,
    buffer: OwnedMutexGuard<CommandBuffer>,
    results_as_events: bool,
}

impl Composer {
    pub(crate) fn new(shared: Arc<Shared>, mut buffer: OwnedMutexGuard<CommandBuffer>) -> Self {
        buffer.clear();
        Self {
            shared,
            buffer,
            results_as_events: false,
        }
    }

    /// The command buffer, for composing with the `append_*` calls directly.
    pub fn buffer(&mut self) -> &mut CommandBuffer {
        &mut self.buffer
    }

    /// Render `params` followed by CRLF.
    pub fn compose(&mut self, params: &ParamList) -> Result<&mut Self> {
        params.finish(&mut self.buffer)?;
        Ok(self)
    }

    /// Render `params` followed by a raw payload and Ctrl-Z.
    pub fn compose_with_payload(&mut self, params: &ParamList, payload: &[u8]) -> Result<&mut Self> {
        params.finish_with_payload(&mut self.buffer, payload)?;
        Ok(self)
    }

    /// Hand lines carrying this command's own prefix to the event registry.
    ///
    /// By default such lines are the response and are captured, even when a
    /// subscriber exists for the prefix. Commands that report their results
    /// as notifications (name resolution, ping) opt out here.
    pub fn results_as_events(&mut self) -> &mut Self {
        self.results_as_events = true;
        self
    }

    /// Transmit the composed request.
    ///
    /// The request is registered for confirmation before its bytes go out,
    /// so a fast reply cannot be missed. On transmit failure the
    /// registration is withdrawn and the buffer released.
    pub async fn send(mut self) -> Result<Pending> {
        if self.shared.is_closed() {
            return Err(AtError::ConnectionClosed);
        }

        let id = self.shared.next_request_id();
        let head = self.buffer.command_head();
        let response_prefix = if self.results_as_events {
            None
        } else {
            command_prefix(&head).map(str::to_string)
        };
        let bytes = self.buffer.take();

        debug!(id, command = %head, "sending request");
        let rx = self.shared.router.install(id, head, response_prefix);

        if let Err(e) = self.shared.writer.transmit(bytes).await {
            warn!(id, error = %e, "transmit failed");
            self.shared.router.cancel(id);
            return Err(e);
        }

        Ok(Pending {
            shared: self.shared,
            _buffer: self.buffer,
            id,
            rx,
        })
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("len", &self.buffer.len())
            .finish()
    }
}

/// A transmitted request awaiting its confirmation line.
///
/// Dropping it without waiting abandons the request; a confirmation that
/// arrives afterwards is logged and ignored.
pub struct Pending {
    shared: Arc<Shared>,
    _buffer: OwnedMutexGuard<CommandBuffer>,
    id: u64,
    rx: oneshot::Receiver<Completion>,
}

impl Pending {
    /// Request id, as it appears in log output.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the confirmation and compare it with `expected`.
    ///
    /// Returns the captured response lines when the status matches. A
    /// different status fails with `DeviceReported` for structured device
    /// errors and `UnexpectedStatus` otherwise; the actual status is
    /// available through [`AtError::status`]. No confirmation within the
    /// timeout configured for `class` fails with `TransactionTimeout`.
    pub async fn wait_for_confirm(
        mut self,
        class: TimeoutClass,
        expected: ConfirmStatus,
    ) -> Result<Response> {
        let after = self.shared.config.timeouts.get(class);

        let completion = match tokio::time::timeout(after, &mut self.rx).await {
            Ok(Ok(completion)) => completion,
            Ok(Err(_)) => return Err(AtError::ConnectionClosed),
            Err(_) => {
                warn!(id = self.id, ?class, ?after, "request timed out");
                return Err(AtError::TransactionTimeout { class, after });
            }
        };

        let actual = completion.status?;
        if actual == expected {
            return Ok(Response::new(completion.lines));
        }

        match actual {
            ConfirmStatus::Device(err) => Err(AtError::DeviceReported(err)),
            _ => Err(AtError::UnexpectedStatus { expected, actual }),
        }
    }

    /// Wait for `OK`.
    pub async fn confirm(self, class: TimeoutClass) -> Result<Response> {
        self.wait_for_confirm(class, ConfirmStatus::Success).await
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.shared.router.cancel(self.id);
    }
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending").field("id", &self.id).finish()
    }
}

/// Response lines captured between a request and its confirmation.
///
/// Echo, events and the confirmation itself are not included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
}

impl Response {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Arguments of the first `<prefix>: ...` line.
    pub fn args(&self, prefix: &str) -> Result<ArgCursor<'_>> {
        self.args_all(prefix)
            .next()
            .ok_or_else(|| AtError::malformed(format!("no {} line in response", prefix)))
    }

    /// Arguments of every `<prefix>: ...` line, in order.
    pub fn args_all<'a>(&'a self, prefix: &str) -> impl Iterator<Item = ArgCursor<'a>> + 'a {
        let prefix = prefix.to_string();
        self.lines.iter().filter_map(move |line| match split_prefix(line) {
            Some((p, args)) if p == prefix => Some(ArgCursor::new(args)),
            _ => None,
        })
    }

    /// The first line as a whole, for responses without a prefix.
    pub fn first_line(&self) -> Result<ArgCursor<'_>> {
        self.lines
            .first()
            .map(|line| ArgCursor::new(line))
            .ok_or_else(|| AtError::malformed("empty response"))
    }
}

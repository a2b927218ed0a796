//! Line router: the single point where every received line is classified.
//!
//! Each complete line goes to exactly one of:
//! - nowhere (blank line, payload prompt, command echo)
//! - the pending request (a line carrying the request's own response prefix)
//! - the event registry (registered prefix)
//! - the pending request (confirmation status, or other captured line)
//!
//! Which of event prefix and status token is checked first is set by
//! [`Precedence`]. Lines that match nothing while no request is pending are
//! logged at trace level and dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::config::Precedence;
use crate::error::{AtError, Result};
use crate::events::EventRegistry;
use crate::protocol::{split_prefix, ConfirmStatus, PAYLOAD_PROMPT};

/// Outcome delivered to a waiting request.
#[derive(Debug)]
pub(crate) struct Completion {
    pub status: Result<ConfirmStatus>,
    pub lines: Vec<String>,
}

struct PendingSlot {
    id: u64,
    command_head: String,
    response_prefix: Option<String>,
    lines: Vec<String>,
    done: oneshot::Sender<Completion>,
}

/// Where a routed line ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// Blank, prompt or echo.
    Dropped,
    /// Handed to a registered event parser.
    Event,
    /// Terminated the pending request.
    Confirmation,
    /// Appended to the pending request's response.
    Captured,
    /// Nothing wanted it.
    Ignored,
}

pub(crate) struct LineRouter {
    pending: Mutex<Option<PendingSlot>>,
    events: Arc<EventRegistry>,
    precedence: Precedence,
}

impl LineRouter {
    pub fn new(events: Arc<EventRegistry>, precedence: Precedence) -> Self {
        Self {
            pending: Mutex::new(None),
            events,
            precedence,
        }
    }

    pub fn events(&self) -> &Arc<EventRegistry> {
        &self.events
    }

    fn slot(&self) -> MutexGuard<'_, Option<PendingSlot>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register request `id` as the one awaiting confirmation.
    ///
    /// Lines starting with `response_prefix` are captured even when an event
    /// handler is registered for that prefix.
    ///
    /// The caller holds the command buffer, so a slot still present here
    /// belongs to a request whose owner went away; it is replaced.
    pub fn install(
        &self,
        id: u64,
        command_head: String,
        response_prefix: Option<String>,
    ) -> oneshot::Receiver<Completion> {
        let (done, rx) = oneshot::channel();
        let mut slot = self.slot();
        if let Some(stale) = slot.take() {
            warn!(id = stale.id, "discarding abandoned request");
        }
        *slot = Some(PendingSlot {
            id,
            command_head,
            response_prefix,
            lines: Vec::new(),
            done,
        });
        rx
    }

    /// Forget request `id` if it is still pending.
    pub fn cancel(&self, id: u64) {
        let mut slot = self.slot();
        if slot.as_ref().map(|s| s.id) == Some(id) {
            *slot = None;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    /// Fail the pending request, if any, because no more lines will arrive.
    pub fn close(&self) {
        if let Some(slot) = self.slot().take() {
            let _ = slot.done.send(Completion {
                status: Err(AtError::ConnectionClosed),
                lines: slot.lines,
            });
        }
    }

    /// Classify one complete line.
    pub fn route(&self, line: &str) -> Route {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line == PAYLOAD_PROMPT {
            trace!(line, "dropped");
            return Route::Dropped;
        }

        if self
            .slot()
            .as_ref()
            .is_some_and(|slot| slot.command_head == line)
        {
            trace!(line, "echo");
            return Route::Dropped;
        }

        if let Some(slot) = self.slot().as_mut() {
            let own = split_prefix(line).map(|(prefix, _)| prefix);
            if own.is_some() && own == slot.response_prefix.as_deref() {
                trace!(id = slot.id, line, "captured response");
                slot.lines.push(line.to_string());
                return Route::Captured;
            }
        }

        let route = match self.precedence {
            Precedence::EventsFirst => self
                .try_event(line)
                .or_else(|| self.try_confirmation(line)),
            Precedence::ConfirmationFirst => self
                .try_confirmation(line)
                .or_else(|| self.try_event(line)),
        };
        if let Some(route) = route {
            return route;
        }

        match self.slot().as_mut() {
            Some(slot) => {
                trace!(id = slot.id, line, "captured");
                slot.lines.push(line.to_string());
                Route::Captured
            }
            None => {
                trace!(line, "ignoring unsolicited line");
                Route::Ignored
            }
        }
    }

    fn try_event(&self, line: &str) -> Option<Route> {
        let (prefix, args) = split_prefix(line)?;
        match self.events.dispatch(prefix, args) {
            Ok(true) => {
                trace!(prefix, "event dispatched");
                Some(Route::Event)
            }
            Ok(false) => None,
            Err(e) => {
                warn!(prefix, error = %e, "malformed event");
                Some(Route::Event)
            }
        }
    }

    fn try_confirmation(&self, line: &str) -> Option<Route> {
        let status = ConfirmStatus::parse(line)?;

        let Some(slot) = self.slot().take() else {
            warn!(line, "confirmation with no request pending");
            return Some(Route::Ignored);
        };

        debug!(id = slot.id, line, lines = slot.lines.len(), "confirmation");
        let completion = Completion {
            status,
            lines: slot.lines,
        };
        if slot.done.send(completion).is_err() {
            debug!(id = slot.id, "requester no longer waiting");
        }
        Some(Route::Confirmation)
    }
}

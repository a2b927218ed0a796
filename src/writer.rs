//! Dedicated writer task for request transmission.
//!
//! The write half of the device stream is owned by a single task that
//! receives composed requests over an mpsc channel. Each request carries a
//! oneshot acknowledgement so the transaction that sent it learns whether
//! the bytes actually reached the transport.
//!
//! # Architecture
//!
//! ```text
//! Composer::send ─► mpsc::Sender<OutboundRequest> ─► Writer Task ─► device
//!        ▲                                              │
//!        └──────────── oneshot ack (io::Result) ◄───────┘
//! ```

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::error::{AtError, Result};

/// A composed request waiting to be written.
#[derive(Debug)]
pub(crate) struct OutboundRequest {
    pub bytes: Bytes,
    pub ack: oneshot::Sender<std::io::Result<()>>,
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the request queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending requests to the writer task.
#[derive(Debug, Clone)]
pub(crate) struct WriterHandle {
    tx: mpsc::Sender<OutboundRequest>,
}

impl WriterHandle {
    /// Queue `bytes` and wait until they are written and flushed.
    pub async fn transmit(&self, bytes: Bytes) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(OutboundRequest { bytes, ack })
            .await
            .map_err(|_| AtError::ConnectionClosed)?;

        match done.await {
            Ok(result) => result.map_err(AtError::TransportFailure),
            Err(_) => Err(AtError::ConnectionClosed),
        }
    }
}

/// Spawn the writer task and return a handle for sending requests.
pub(crate) fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - writes each request in full, then acknowledges it.
///
/// A write failure is reported to the waiting request and ends the loop;
/// the stream is not usable afterwards.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundRequest>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(request) = rx.recv().await {
        trace!(len = request.bytes.len(), "writing request");

        let result = write_request(&mut writer, &request.bytes).await;
        let failure = result
            .as_ref()
            .err()
            .map(|e| std::io::Error::new(e.kind(), e.to_string()));

        // The sender may have given up already; nothing to do then.
        let _ = request.ack.send(result);

        if let Some(err) = failure {
            error!(error = %err, "writer task stopping");
            return Err(AtError::TransportFailure(err));
        }
    }

    // Channel closed, clean shutdown
    Ok(())
}

async fn write_request<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}

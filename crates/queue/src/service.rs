//! Async host for [`UploadQueue`].
//!
//! The queue lives inside one tokio task and is driven by a command channel.
//! Transfers and the batch-offset timer run as their own tasks and report
//! back through the same channel, so every queue mutation is serialized and
//! callbacks never observe a half-applied change.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::callbacks::QueueCallbacks;
use crate::engine::{QueueDriver, UploadQueue};
use crate::error::QueueError;
use crate::options::QueueOptions;
use crate::transport::{ProgressSink, TransferEvent, TransferRequest, Transport};
use crate::unit::{TransferUnit, UnitId, UploadStatus};

const COMMAND_CAPACITY: usize = 256;

enum Command {
    AddFiles(Vec<TransferUnit>),
    RemoveFile(UnitId),
    ClearFiles {
        exclude: Vec<UploadStatus>,
        cancel_in_flight: bool,
    },
    StartFile(UnitId),
    CancelFile(UnitId),
    Transfer {
        id: UnitId,
        event: TransferEvent,
    },
    OffsetElapsed,
    Snapshot(oneshot::Sender<Vec<TransferUnit>>),
}

/// Running upload queue.
///
/// Dropping the service stops the queue task and aborts every in-flight
/// transfer; use [`shutdown`](Self::shutdown) to also wait for it.
pub struct UploadService {
    handle: QueueHandle,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl UploadService {
    /// Spawns the queue task. Units without their own transport are sent
    /// through `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        options: QueueOptions,
        callbacks: QueueCallbacks,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let cancel = CancellationToken::new();

        let driver = ChannelDriver {
            tx: tx.clone(),
            transport,
            cancel: cancel.clone(),
        };
        debug!(?options, "starting upload service");
        let queue = UploadQueue::new(options, callbacks, driver);
        let task = tokio::spawn(run(queue, rx, cancel.clone()));

        Self {
            handle: QueueHandle { tx },
            cancel,
            task: Some(task),
        }
    }

    /// Returns a cloneable handle for sending commands to the queue.
    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Stops the queue, aborting in-flight transfers, and waits for the
    /// task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for UploadService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Cloneable command sender for a running [`UploadService`].
///
/// Commands are applied in the order they are sent.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Command>,
}

impl fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl QueueHandle {
    pub async fn add_files(&self, units: Vec<TransferUnit>) -> Result<(), QueueError> {
        self.send(Command::AddFiles(units)).await
    }

    pub async fn remove_file(&self, id: UnitId) -> Result<(), QueueError> {
        self.send(Command::RemoveFile(id)).await
    }

    /// See [`UploadQueue::clear_files`].
    pub async fn clear_files(
        &self,
        exclude: Vec<UploadStatus>,
        cancel_in_flight: bool,
    ) -> Result<(), QueueError> {
        self.send(Command::ClearFiles {
            exclude,
            cancel_in_flight,
        })
        .await
    }

    pub async fn start_file(&self, id: UnitId) -> Result<(), QueueError> {
        self.send(Command::StartFile(id)).await
    }

    pub async fn cancel_file(&self, id: UnitId) -> Result<(), QueueError> {
        self.send(Command::CancelFile(id)).await
    }

    /// Returns a copy of the queue as of now, in queue order.
    pub async fn snapshot(&self) -> Result<Vec<TransferUnit>, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| QueueError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: Command) -> Result<(), QueueError> {
        self.tx.send(command).await.map_err(|_| QueueError::Closed)
    }
}

/// [`QueueDriver`] that runs transfers and timers as tokio tasks.
struct ChannelDriver {
    tx: mpsc::Sender<Command>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
}

impl QueueDriver for ChannelDriver {
    fn launch(&mut self, unit: &TransferUnit) -> CancellationToken {
        let token = self.cancel.child_token();
        let transport = unit
            .route()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.transport));
        let request = TransferRequest::for_unit(unit);
        let id = request.id;

        // Progress samples are lossy: a full channel drops them.
        let progress_tx = self.tx.clone();
        let sink = ProgressSink::new(move |sent, total| {
            let event = TransferEvent::Progress { sent, total };
            let _ = progress_tx.try_send(Command::Transfer { id, event });
        });

        let tx = self.tx.clone();
        let cancel = token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!(unit = %id, "transfer aborted");
                    return;
                }
                outcome = transport.transfer(request, sink) => outcome,
            };
            let event = TransferEvent::from(outcome);
            let _ = tx.send(Command::Transfer { id, event }).await;
        });

        token
    }

    fn arm_offset_timer(&mut self, delay: Duration) -> CancellationToken {
        let token = self.cancel.child_token();
        let tx = self.tx.clone();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Command::OffsetElapsed).await;
                }
            }
        });
        token
    }
}

async fn run(
    mut queue: UploadQueue<ChannelDriver>,
    mut rx: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::AddFiles(units) => queue.add_files(units),
            Command::RemoveFile(id) => queue.remove_file(id, false),
            Command::ClearFiles {
                exclude,
                cancel_in_flight,
            } => queue.clear_files(&exclude, cancel_in_flight),
            Command::StartFile(id) => queue.start_file(id),
            Command::CancelFile(id) => queue.cancel_file(id),
            Command::Transfer { id, event } => queue.on_transfer_event(id, event),
            Command::OffsetElapsed => queue.offset_elapsed(),
            Command::Snapshot(reply) => {
                let _ = reply.send(queue.units().to_vec());
            }
        }
    }
    debug!(remaining = queue.len(), "upload service stopped");
}

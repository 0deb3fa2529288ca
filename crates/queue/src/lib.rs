//! Upload queue with admission control.
//!
//! Holds an ordered set of [`TransferUnit`]s, decides which of them may
//! start transferring under a parallelism / batch-offset policy, and keeps
//! per-file lifecycle state consistent while transfers complete, fail or
//! get cancelled underneath it.
//!
//! # Layers
//!
//! - [`UploadQueue`]: the synchronous admission engine. Every mutation runs
//!   to completion on `&mut self`; side effects (starting a transfer, arming
//!   the batch-offset timer) go through a [`QueueDriver`].
//! - [`UploadService`]: hosts an `UploadQueue` on a single tokio task and
//!   feeds it commands, transport events and timer ticks one at a time.
//! - [`Transport`]: the network collaborator that moves one file's bytes.

pub mod callbacks;
pub mod engine;
pub mod error;
pub mod localize;
pub mod offset;
pub mod options;
pub mod service;
pub mod transport;
pub mod unit;

pub use callbacks::QueueCallbacks;
pub use engine::{QueueDriver, UploadQueue};
pub use error::QueueError;
pub use localize::{DefaultLocalizer, Localizer};
pub use options::QueueOptions;
pub use service::{QueueHandle, UploadService};
pub use transport::{
    ProgressSink, TransferEvent, TransferFuture, TransferRequest, TransferResponse, Transport,
    UrlSource,
};
pub use unit::{FileSource, TransferUnit, UnitHooks, UnitId, UnitListener, UploadStatus};

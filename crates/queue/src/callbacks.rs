//! Observer callbacks fired by the queue.
//!
//! Every callback is optional. Unset callbacks are skipped at the call site.

use std::fmt;

use crate::unit::TransferUnit;

/// Callback invoked with a single unit.
pub type UnitCallback = Box<dyn Fn(&TransferUnit) + Send + Sync>;

/// Callback invoked with the whole queue, in queue order.
pub type QueueChangedCallback = Box<dyn Fn(&[TransferUnit]) + Send + Sync>;

/// Callback invoked once the queue has no queued or uploading units left.
pub type AllFinishedCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct QueueCallbacks {
    pub(crate) file_added: Option<UnitCallback>,
    pub(crate) file_removed: Option<UnitCallback>,
    pub(crate) progress: Option<UnitCallback>,
    pub(crate) cancelled: Option<UnitCallback>,
    pub(crate) uploaded: Option<UnitCallback>,
    pub(crate) error: Option<UnitCallback>,
    pub(crate) finished: Option<UnitCallback>,
    pub(crate) upload_started: Option<UnitCallback>,
    pub(crate) queue_changed: Option<QueueChangedCallback>,
    pub(crate) all_finished: Option<AllFinishedCallback>,
}

impl QueueCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_file_added(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.file_added = Some(Box::new(f));
        self
    }

    pub fn on_file_removed(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.file_removed = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_cancelled(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.cancelled = Some(Box::new(f));
        self
    }

    pub fn on_uploaded(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.uploaded = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Fires on every terminal outcome: uploaded, failed or cancelled.
    pub fn on_finished(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.finished = Some(Box::new(f));
        self
    }

    pub fn on_upload_started(
        mut self,
        f: impl Fn(&TransferUnit) + Send + Sync + 'static,
    ) -> Self {
        self.upload_started = Some(Box::new(f));
        self
    }

    pub fn on_queue_changed(
        mut self,
        f: impl Fn(&[TransferUnit]) + Send + Sync + 'static,
    ) -> Self {
        self.queue_changed = Some(Box::new(f));
        self
    }

    pub fn on_all_finished(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.all_finished = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for QueueCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueCallbacks").finish_non_exhaustive()
    }
}

pub(crate) fn emit(callback: &Option<UnitCallback>, unit: &TransferUnit) {
    if let Some(cb) = callback {
        cb(unit);
    }
}

pub(crate) fn emit_queue(callback: &Option<QueueChangedCallback>, units: &[TransferUnit]) {
    if let Some(cb) = callback {
        cb(units);
    }
}

pub(crate) fn emit_all_finished(callback: &Option<AllFinishedCallback>) {
    if let Some(cb) = callback {
        cb();
    }
}

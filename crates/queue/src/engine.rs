//! Admission engine.
//!
//! [`UploadQueue`] owns the ordered list of units and re-derives, after every
//! change, which queued units may start. Admission is recomputed from
//! scratch each time; completions, failures, cancellations and removals all
//! free capacity the same way.

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::callbacks::{QueueCallbacks, emit, emit_all_finished, emit_queue};
use crate::offset::OffsetWindow;
use crate::options::QueueOptions;
use crate::transport::{TransferEvent, TransferResponse};
use crate::unit::{TransferUnit, UnitId, UploadStatus};

/// Side effects the engine asks its host to perform.
///
/// [`UploadService`](crate::UploadService) implements this on top of tokio;
/// tests use a recording mock.
pub trait QueueDriver {
    /// Begins the network transfer for `unit`. Cancelling the returned token
    /// must abort it. Outcomes are reported back through
    /// [`UploadQueue::on_transfer_event`].
    fn launch(&mut self, unit: &TransferUnit) -> CancellationToken;

    /// Arms the one-shot batch-offset timer. When it fires the host calls
    /// [`UploadQueue::offset_elapsed`], unless the token was cancelled.
    fn arm_offset_timer(&mut self, delay: Duration) -> CancellationToken;
}

/// Ordered upload queue with parallelism and batch-offset admission.
pub struct UploadQueue<D: QueueDriver> {
    options: QueueOptions,
    callbacks: QueueCallbacks,
    driver: D,
    units: Vec<TransferUnit>,
    inflight: HashMap<UnitId, CancellationToken>,
    offset: OffsetWindow,
    /// New work entered the queue since the last all-finished notification.
    finish_pending: bool,
}

impl<D: QueueDriver> UploadQueue<D> {
    pub fn new(options: QueueOptions, callbacks: QueueCallbacks, driver: D) -> Self {
        Self {
            options,
            callbacks,
            driver,
            units: Vec::new(),
            inflight: HashMap::new(),
            offset: OffsetWindow::default(),
            finish_pending: false,
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Units in queue order.
    pub fn units(&self) -> &[TransferUnit] {
        &self.units
    }

    pub fn get(&self, id: UnitId) -> Option<&TransferUnit> {
        self.units.iter().find(|u| u.id() == id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of units currently in `status`.
    pub fn count(&self, status: UploadStatus) -> usize {
        self.units.iter().filter(|u| u.status() == status).count()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Appends units that are not already queued.
    ///
    /// Units arriving as `Failed` (rejected by validation) are registered and
    /// reported through `on_error`; everything else becomes `Queued`.
    pub fn add_files(&mut self, units: Vec<TransferUnit>) {
        let mut added = 0usize;
        for mut unit in units {
            if self.position(unit.id()).is_some() {
                debug!(unit = %unit.id(), "unit already queued, ignoring");
                continue;
            }
            if unit.status() != UploadStatus::Failed {
                unit.enqueue();
            }
            self.units.push(unit);
            self.finish_pending = true;
            added += 1;

            let unit = &self.units[self.units.len() - 1];
            emit(&self.callbacks.file_added, unit);
            if unit.status() == UploadStatus::Failed {
                warn!(unit = %unit.id(), file = %unit.name(), reason = %unit.response_text(), "file rejected");
                unit.hooks().fire_error(unit);
                emit(&self.callbacks.error, unit);
            }
        }
        debug!(added, total = self.units.len(), "files added to queue");
        self.files_changed();
    }

    /// Detaches a unit from the queue, cancelling it first if it is uploading.
    ///
    /// With `suppress_cascade` the queue-changed cycle is skipped; callers
    /// removing several units run it once themselves.
    pub fn remove_file(&mut self, id: UnitId, suppress_cascade: bool) {
        let Some(index) = self.position(id) else {
            debug!(unit = %id, "remove ignored, unit not in queue");
            return;
        };

        if self.units[index].can_cancel() {
            self.abort(index);
            emit(&self.callbacks.finished, &self.units[index]);
        }

        let mut unit = self.units.remove(index);
        unit.mark_removed();
        debug!(unit = %id, file = %unit.name(), "unit removed");
        emit(&self.callbacks.file_removed, &unit);
        unit.hooks().fire_removed(&unit);

        if !suppress_cascade {
            self.files_changed();
        }
    }

    /// Removes every unit whose status is not in `exclude`.
    ///
    /// Queued and uploading units are always kept unless `cancel_in_flight`
    /// is set. Fires a single `on_queue_changed` at the end.
    pub fn clear_files(&mut self, exclude: &[UploadStatus], cancel_in_flight: bool) {
        let mut keep = exclude.to_vec();
        if !cancel_in_flight {
            keep.extend([UploadStatus::Queued, UploadStatus::Uploading]);
        }

        let doomed: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| !keep.contains(&u.status()))
            .map(TransferUnit::id)
            .collect();
        debug!(count = doomed.len(), cancel_in_flight, "clearing files");
        for id in doomed {
            self.remove_file(id, true);
        }

        emit_queue(&self.callbacks.queue_changed, &self.units);
    }

    /// Starts a queued unit regardless of the admission policy.
    pub fn start_file(&mut self, id: UnitId) {
        match self.position(id) {
            Some(index) if self.units[index].can_start() => {
                self.launch(index);
                self.files_changed();
            }
            Some(_) => debug!(unit = %id, "start ignored, unit not startable"),
            None => debug!(unit = %id, "start ignored, unit not in queue"),
        }
    }

    /// Cancels an uploading unit. The freed slot is visible to the admission
    /// pass that follows immediately.
    pub fn cancel_file(&mut self, id: UnitId) {
        let Some(index) = self.position(id) else {
            debug!(unit = %id, "cancel ignored, unit not in queue");
            return;
        };
        if !self.units[index].can_cancel() {
            debug!(unit = %id, status = %self.units[index].status(), "cancel ignored");
            return;
        }

        let snapshot = self.abort(index);
        self.files_changed();
        emit(&self.callbacks.finished, &snapshot);
    }

    /// Lifecycle hook for transport progress and outcomes.
    ///
    /// Events for units that are no longer uploading (cancelled, removed)
    /// are stale and dropped.
    pub fn on_transfer_event(&mut self, id: UnitId, event: TransferEvent) {
        let Some(index) = self.position(id) else {
            debug!(unit = %id, "transfer event for unknown unit dropped");
            return;
        };
        if self.units[index].status() != UploadStatus::Uploading {
            debug!(unit = %id, status = %self.units[index].status(), "stale transfer event dropped");
            return;
        }

        match event {
            TransferEvent::Progress { sent, total } => {
                self.units[index].record_progress(sent, total);
                emit(&self.callbacks.progress, &self.units[index]);
            }
            TransferEvent::Completed(response) => {
                self.settle(index, UploadStatus::Uploaded, response);
            }
            TransferEvent::Failed(response) => {
                self.settle(index, UploadStatus::Failed, response);
            }
        }
    }

    /// The batch-offset timer fired: close the window and re-admit.
    pub fn offset_elapsed(&mut self) {
        if !self.offset.is_running() {
            return;
        }
        debug!(admitted = self.offset.count(), "batch offset window elapsed");
        self.offset.elapse();
        self.files_changed();
    }

    fn position(&self, id: UnitId) -> Option<usize> {
        self.units.iter().position(|u| u.id() == id)
    }

    /// Queue-changed cycle: prune, admit, notify, check for drain.
    fn files_changed(&mut self) {
        if self.options.auto_remove {
            self.remove_finished();
        }

        for index in self.waiting_files() {
            self.launch(index);
        }

        emit_queue(&self.callbacks.queue_changed, &self.units);
        self.check_all_finished();
    }

    fn remove_finished(&mut self) {
        let done: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| matches!(u.status(), UploadStatus::Uploaded | UploadStatus::Canceled))
            .map(TransferUnit::id)
            .collect();
        for id in done {
            self.remove_file(id, true);
        }
    }

    /// Indices of the queued units admitted by this pass, in queue order.
    fn waiting_files(&mut self) -> Vec<usize> {
        if !self.options.auto_start {
            return Vec::new();
        }

        let mut candidates: Vec<usize> = self
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.can_start())
            .map(|(i, _)| i)
            .collect();

        let max = self.options.max_parallel;
        if max == 0 {
            return candidates;
        }

        let uploading = self.count(UploadStatus::Uploading);
        let mut count = max.saturating_sub(uploading).min(candidates.len());
        if count == 0 {
            return Vec::new();
        }

        let offset = self.options.batch_offset();
        if !offset.is_zero() {
            if !self.offset.is_running() {
                let timer = self.driver.arm_offset_timer(offset);
                self.offset.open(timer);
                debug!(offset_ms = offset.as_millis() as u64, "batch offset window opened");
            }
            count = self.offset.claim(count, max);
        }

        candidates.truncate(count);
        candidates
    }

    fn launch(&mut self, index: usize) {
        self.units[index].mark_uploading();
        let token = self.driver.launch(&self.units[index]);

        let unit = &self.units[index];
        self.inflight.insert(unit.id(), token);
        info!(unit = %unit.id(), file = %unit.name(), size = unit.size(), "upload started");
        emit(&self.callbacks.upload_started, unit);
        unit.hooks().fire_started(unit);
    }

    /// Aborts the transfer of an uploading unit and runs its cancel path.
    /// Returns a snapshot taken right after cancellation.
    fn abort(&mut self, index: usize) -> TransferUnit {
        let id = self.units[index].id();
        if let Some(token) = self.inflight.remove(&id) {
            token.cancel();
        }
        self.units[index].mark_canceled();

        let unit = &self.units[index];
        info!(unit = %id, file = %unit.name(), "upload cancelled");
        unit.hooks().fire_cancelled(unit);
        emit(&self.callbacks.cancelled, unit);
        unit.clone()
    }

    fn settle(&mut self, index: usize, status: UploadStatus, response: TransferResponse) {
        let id = self.units[index].id();
        self.inflight.remove(&id);

        if status == UploadStatus::Uploaded && self.units[index].complete_progress() {
            emit(&self.callbacks.progress, &self.units[index]);
        }
        self.units[index].settle(status, response);

        let unit = &self.units[index];
        if status == UploadStatus::Uploaded {
            info!(unit = %id, file = %unit.name(), code = unit.response_code(), "upload finished");
            emit(&self.callbacks.uploaded, unit);
        } else {
            warn!(
                unit = %id,
                file = %unit.name(),
                code = unit.response_code(),
                response = %unit.response_text(),
                "upload failed"
            );
            unit.hooks().fire_error(unit);
            emit(&self.callbacks.error, unit);
        }

        let snapshot = unit.clone();
        self.files_changed();
        emit(&self.callbacks.finished, &snapshot);
    }

    fn check_all_finished(&mut self) {
        if !self.finish_pending || self.units.iter().any(|u| u.status().is_active()) {
            return;
        }
        self.finish_pending = false;
        info!(total = self.units.len(), "all uploads finished");
        emit_all_finished(&self.callbacks.all_finished);
    }
}

impl<D: QueueDriver> Drop for UploadQueue<D> {
    fn drop(&mut self) {
        self.offset.close();
        for (_, token) in self.inflight.drain() {
            token.cancel();
        }
    }
}

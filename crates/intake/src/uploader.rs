use std::sync::Arc;

use tracing::debug;
use upqueue_queue::{QueueCallbacks, QueueHandle, QueueOptions, Transport, UploadService};

use crate::area::{AreaCallbacks, AreaOptions, UploadArea};

/// Identifies an area registered with an [`Uploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaId(u64);

/// Owns the shared upload queue and the areas feeding it.
pub struct Uploader {
    service: UploadService,
    areas: Vec<(AreaId, UploadArea)>,
    next_id: u64,
}

impl Uploader {
    /// Starts the queue. Must be called from within a tokio runtime.
    pub fn new(
        options: QueueOptions,
        callbacks: QueueCallbacks,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            service: UploadService::spawn(options, callbacks, transport),
            areas: Vec::new(),
            next_id: 0,
        }
    }

    pub fn queue(&self) -> QueueHandle {
        self.service.handle()
    }

    pub fn register_area(&mut self, options: AreaOptions, callbacks: AreaCallbacks) -> AreaId {
        let id = AreaId(self.next_id);
        self.next_id += 1;
        let area = UploadArea::new(options, callbacks, self.service.handle());
        self.areas.push((id, area));
        debug!(area = id.0, "upload area registered");
        id
    }

    /// Detaches an area. Files it already queued stay in the queue.
    pub fn unregister_area(&mut self, id: AreaId) -> Option<UploadArea> {
        let index = self.areas.iter().position(|(area_id, _)| *area_id == id)?;
        debug!(area = id.0, "upload area unregistered");
        Some(self.areas.remove(index).1)
    }

    pub fn area(&self, id: AreaId) -> Option<&UploadArea> {
        self.areas.iter().find(|(a, _)| *a == id).map(|(_, area)| area)
    }

    pub fn area_mut(&mut self, id: AreaId) -> Option<&mut UploadArea> {
        self.areas
            .iter_mut()
            .find(|(a, _)| *a == id)
            .map(|(_, area)| area)
    }

    /// The earliest registered area still attached.
    pub fn first_area(&mut self) -> Option<&mut UploadArea> {
        self.areas.first_mut().map(|(_, area)| area)
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Stops the queue and waits for it to exit.
    pub async fn shutdown(self) {
        self.service.shutdown().await;
    }
}

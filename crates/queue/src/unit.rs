use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transport::{TransferResponse, Transport};

/// Identifier assigned to a file when it is handed to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(Uuid);

impl UnitId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle status of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    Uploading,
    Uploaded,
    Failed,
    Canceled,
    Removed,
}

impl UploadStatus {
    /// `true` while the unit still has work ahead of it.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Uploading)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file on disk selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    pub path: PathBuf,
    /// File name sent to the server.
    pub name: String,
    /// `dir/sub/name` when the file was found by walking a dropped directory.
    pub relative_path: Option<String>,
    pub size: u64,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            relative_path: None,
            size,
        }
    }

    /// Reads name and size from the file system.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(path, name, metadata.len()))
    }

    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }

    /// Extension including the leading dot (`.jpg`), if the name has one.
    pub fn extension(&self) -> Option<&str> {
        self.name.rfind('.').map(|i| &self.name[i..])
    }
}

/// Listener attached to a single unit.
pub type UnitListener = Arc<dyn Fn(&TransferUnit) + Send + Sync>;

/// Behaviour registered on a unit from outside the queue.
///
/// Each list runs in registration order.
#[derive(Clone, Default)]
pub struct UnitHooks {
    started: Vec<UnitListener>,
    error: Vec<UnitListener>,
    cancelled: Vec<UnitListener>,
    removed: Vec<UnitListener>,
}

impl UnitHooks {
    /// Runs after the unit's transfer has been launched.
    pub fn on_started(&mut self, listener: impl Fn(&TransferUnit) + Send + Sync + 'static) {
        self.started.push(Arc::new(listener));
    }

    /// Runs when the unit fails, whether in validation or in transport.
    pub fn on_error(&mut self, listener: impl Fn(&TransferUnit) + Send + Sync + 'static) {
        self.error.push(Arc::new(listener));
    }

    pub fn on_cancelled(&mut self, listener: impl Fn(&TransferUnit) + Send + Sync + 'static) {
        self.cancelled.push(Arc::new(listener));
    }

    /// Runs after the unit has been detached from the queue.
    pub fn on_removed(&mut self, listener: impl Fn(&TransferUnit) + Send + Sync + 'static) {
        self.removed.push(Arc::new(listener));
    }

    pub(crate) fn fire_started(&self, unit: &TransferUnit) {
        self.started.iter().for_each(|l| l(unit));
    }

    pub(crate) fn fire_error(&self, unit: &TransferUnit) {
        self.error.iter().for_each(|l| l(unit));
    }

    pub(crate) fn fire_cancelled(&self, unit: &TransferUnit) {
        self.cancelled.iter().for_each(|l| l(unit));
    }

    pub(crate) fn fire_removed(&self, unit: &TransferUnit) {
        self.removed.iter().for_each(|l| l(unit));
    }
}

impl fmt::Debug for UnitHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHooks")
            .field("started", &self.started.len())
            .field("error", &self.error.len())
            .field("cancelled", &self.cancelled.len())
            .field("removed", &self.removed.len())
            .finish()
    }
}

/// One file's transfer record.
///
/// Which of `start`, `cancel` and `remove` is meaningful depends on
/// [`status`](Self::status); the queue dispatches on it and treats the
/// others as no-ops.
#[derive(Clone)]
pub struct TransferUnit {
    id: UnitId,
    source: FileSource,
    url: String,
    status: UploadStatus,
    progress: u8,
    sent_bytes: u64,
    response_code: u16,
    response_text: String,
    started: bool,
    hooks: UnitHooks,
    route: Option<Arc<dyn Transport>>,
}

impl TransferUnit {
    /// Creates a queued unit with a fresh identifier.
    pub fn new(source: FileSource) -> Self {
        Self {
            id: UnitId::new(),
            source,
            url: String::new(),
            status: UploadStatus::Queued,
            progress: 0,
            sent_bytes: 0,
            response_code: 0,
            response_text: String::new(),
            started: false,
            hooks: UnitHooks::default(),
            route: None,
        }
    }

    /// Creates a unit that was rejected before it could be queued.
    pub fn rejected(source: FileSource, message: impl Into<String>) -> Self {
        let mut unit = Self::new(source);
        unit.status = UploadStatus::Failed;
        unit.response_text = message.into();
        unit
    }

    /// Sets the endpoint this unit is sent to.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sends this unit through `transport` instead of the queue's default.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.route = Some(transport);
        self
    }

    pub fn hooks_mut(&mut self) -> &mut UnitHooks {
        &mut self.hooks
    }

    pub fn hooks(&self) -> &UnitHooks {
        &self.hooks
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn size(&self) -> u64 {
        self.source.size
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// Upload progress in percent.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    pub fn route(&self) -> Option<&Arc<dyn Transport>> {
        self.route.as_ref()
    }

    /// A unit starts at most once, and only from `Queued`.
    pub fn can_start(&self) -> bool {
        self.status == UploadStatus::Queued && !self.started
    }

    pub fn can_cancel(&self) -> bool {
        self.status == UploadStatus::Uploading
    }

    pub fn can_remove(&self) -> bool {
        self.status != UploadStatus::Removed
    }

    pub(crate) fn enqueue(&mut self) {
        self.status = UploadStatus::Queued;
        self.started = false;
        self.progress = 0;
        self.sent_bytes = 0;
    }

    pub(crate) fn mark_uploading(&mut self) {
        self.status = UploadStatus::Uploading;
        self.started = true;
    }

    /// Applies a transport progress report. Progress never goes backwards.
    pub(crate) fn record_progress(&mut self, sent: u64, total: Option<u64>) {
        let Some(total) = total.filter(|t| *t > 0) else {
            return;
        };
        let sent = sent.min(total);
        let percent = ((u128::from(sent) * 200 + u128::from(total)) / (u128::from(total) * 2))
            .min(100) as u8;
        self.progress = self.progress.max(percent);
        self.sent_bytes = self.sent_bytes.max(sent);
    }

    /// Forces progress to 100% on success. Returns `true` if it changed.
    pub(crate) fn complete_progress(&mut self) -> bool {
        if self.progress == 100 {
            return false;
        }
        self.progress = 100;
        self.sent_bytes = self.source.size;
        true
    }

    pub(crate) fn settle(&mut self, status: UploadStatus, response: TransferResponse) {
        self.status = status;
        self.response_code = response.code;
        self.response_text = response.body;
    }

    pub(crate) fn mark_canceled(&mut self) {
        self.status = UploadStatus::Canceled;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.status = UploadStatus::Removed;
        self.started = true;
    }
}

impl fmt::Debug for TransferUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferUnit")
            .field("id", &self.id)
            .field("name", &self.source.name)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .field("sent_bytes", &self.sent_bytes)
            .field("response_code", &self.response_code)
            .finish_non_exhaustive()
    }
}

//! Upload areas: one intake surface with its own options and callbacks.
//!
//! Files enter an area as a pending selection, either picked explicitly
//! ([`browse`](UploadArea::browse), [`select_files`](UploadArea::select_files))
//! or dropped ([`drop_paths`](UploadArea::drop_paths)). Unless the area is in
//! manual-start mode the selection is validated and queued immediately.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use upqueue_queue::{
    DefaultLocalizer, FileSource, Localizer, QueueHandle, TransferUnit, Transport, UrlSource,
};

use crate::error::IntakeError;
use crate::scanner::scan_dropped_directory;
use crate::validation::FileValidator;

/// A flag that is either fixed or evaluated each time it is read.
#[derive(Clone)]
pub enum Toggle {
    Fixed(bool),
    Dynamic(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl Toggle {
    pub fn dynamic(f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    pub fn get(&self) -> bool {
        match self {
            Self::Fixed(value) => *value,
            Self::Dynamic(f) => f(),
        }
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        Self::Fixed(value)
    }
}

impl fmt::Debug for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Clone)]
pub struct AreaOptions {
    /// Largest accepted file, in MiB.
    pub max_file_size: u64,
    pub allow_drag_drop: Toggle,
    pub clickable: Toggle,
    pub accept: String,
    pub multiple: bool,
    pub validate_extension: bool,
    /// Keep selections pending until [`UploadArea::start`] is called.
    pub manual_start: bool,
    pub allow_empty_file: bool,
    /// Endpoint resolved onto each unit when it is queued.
    pub url: UrlSource,
    /// Transport for this area's units; the queue's default when `None`.
    pub transport: Option<Arc<dyn Transport>>,
    pub localizer: Arc<dyn Localizer>,
}

impl Default for AreaOptions {
    fn default() -> Self {
        Self {
            max_file_size: 1024,
            allow_drag_drop: Toggle::Fixed(true),
            clickable: Toggle::Fixed(true),
            accept: "*.*".into(),
            multiple: true,
            validate_extension: false,
            manual_start: false,
            allow_empty_file: false,
            url: UrlSource::default(),
            transport: None,
            localizer: Arc::new(DefaultLocalizer),
        }
    }
}

impl fmt::Debug for AreaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaOptions")
            .field("max_file_size", &self.max_file_size)
            .field("allow_drag_drop", &self.allow_drag_drop)
            .field("clickable", &self.clickable)
            .field("accept", &self.accept)
            .field("multiple", &self.multiple)
            .field("validate_extension", &self.validate_extension)
            .field("manual_start", &self.manual_start)
            .field("allow_empty_file", &self.allow_empty_file)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl AreaOptions {
    pub fn validator(&self) -> FileValidator {
        FileValidator {
            max_file_size_mb: self.max_file_size,
            allow_empty_file: self.allow_empty_file,
            accept: self.accept.clone(),
            validate_extension: self.validate_extension,
        }
    }
}

type SourceCallback = Arc<dyn Fn(&FileSource) + Send + Sync>;
type SelectionCallback = Arc<dyn Fn(&[FileSource]) + Send + Sync>;
type UnitCallback = Arc<dyn Fn(&TransferUnit) + Send + Sync>;

/// Per-area observers.
#[derive(Clone, Default)]
pub struct AreaCallbacks {
    file_selected: Option<SourceCallback>,
    files_selected: Option<SelectionCallback>,
    file_added: Option<UnitCallback>,
    file_error: Option<UnitCallback>,
    file_canceled: Option<UnitCallback>,
}

impl AreaCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires for each file of a new selection.
    pub fn on_file_selected(mut self, f: impl Fn(&FileSource) + Send + Sync + 'static) -> Self {
        self.file_selected = Some(Arc::new(f));
        self
    }

    /// Fires once per selection with every file in it.
    pub fn on_files_selected(
        mut self,
        f: impl Fn(&[FileSource]) + Send + Sync + 'static,
    ) -> Self {
        self.files_selected = Some(Arc::new(f));
        self
    }

    /// Fires when one of this area's units starts uploading.
    pub fn on_file_added(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.file_added = Some(Arc::new(f));
        self
    }

    /// Fires when one of this area's units fails validation or transfer.
    pub fn on_file_error(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.file_error = Some(Arc::new(f));
        self
    }

    pub fn on_file_canceled(mut self, f: impl Fn(&TransferUnit) + Send + Sync + 'static) -> Self {
        self.file_canceled = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for AreaCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaCallbacks").finish_non_exhaustive()
    }
}

/// One intake surface feeding the shared queue.
#[derive(Debug)]
pub struct UploadArea {
    options: AreaOptions,
    callbacks: AreaCallbacks,
    queue: QueueHandle,
    pending: Option<Vec<FileSource>>,
}

impl UploadArea {
    pub fn new(options: AreaOptions, callbacks: AreaCallbacks, queue: QueueHandle) -> Self {
        Self {
            options,
            callbacks,
            queue,
            pending: None,
        }
    }

    pub fn options(&self) -> &AreaOptions {
        &self.options
    }

    /// Files selected but not yet queued or cleared.
    pub fn pending(&self) -> &[FileSource] {
        self.pending.as_deref().unwrap_or_default()
    }

    /// Selects files picked through a file dialog. Ignored when the area is
    /// not clickable. Only the first path is used when `multiple` is off.
    pub async fn browse(&mut self, paths: &[PathBuf]) -> Result<(), IntakeError> {
        if !self.options.clickable.get() {
            debug!("browse ignored, area not clickable");
            return Ok(());
        }
        let limit = if self.options.multiple { paths.len() } else { 1 };
        let files = paths
            .iter()
            .take(limit)
            .map(|p| FileSource::from_path(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.select_files(files).await
    }

    /// Selects dropped paths, walking directories recursively. Ignored when
    /// drag and drop is disabled. Only the first item is used when
    /// `multiple` is off.
    pub async fn drop_paths(&mut self, paths: &[PathBuf]) -> Result<(), IntakeError> {
        if !self.options.allow_drag_drop.get() {
            debug!("drop ignored, drag and drop disabled");
            return Ok(());
        }
        if paths.is_empty() {
            return Ok(());
        }

        let limit = if self.options.multiple { paths.len() } else { 1 };
        let mut files = Vec::new();
        for path in paths.iter().take(limit) {
            let metadata = std::fs::metadata(path)?;
            if metadata.is_dir() {
                files.extend(scan_dropped_directory(path)?);
            } else if metadata.is_file() {
                files.push(FileSource::from_path(path)?);
            } else {
                return Err(IntakeError::UnsupportedPath(path.display().to_string()));
            }
        }
        self.select_files(files).await
    }

    /// Replaces the pending selection and notifies observers. Queues it
    /// right away unless the area is in manual-start mode.
    pub async fn select_files(&mut self, files: Vec<FileSource>) -> Result<(), IntakeError> {
        if let Some(cb) = &self.callbacks.file_selected {
            files.iter().for_each(|f| cb(f));
        }
        if let Some(cb) = &self.callbacks.files_selected {
            cb(&files);
        }
        debug!(count = files.len(), "files selected");
        self.pending = Some(files);

        if !self.options.manual_start {
            self.put_files_to_queue(None).await?;
        }
        Ok(())
    }

    /// Queues pending files in manual-start mode: all of them, or only the
    /// pending ones listed in `files`. With `auto_clear` the queued files
    /// leave the pending selection.
    pub async fn start(
        &mut self,
        auto_clear: bool,
        files: Option<&[FileSource]>,
    ) -> Result<(), IntakeError> {
        if !self.options.manual_start || (files.is_none() && self.pending.is_none()) {
            return Ok(());
        }
        self.put_files_to_queue(files).await?;
        if auto_clear {
            self.clear(files);
        }
        Ok(())
    }

    /// Drops `files` from the pending selection, or the whole selection.
    pub fn clear(&mut self, files: Option<&[FileSource]>) {
        self.pending = match (self.pending.take(), files) {
            (Some(pending), Some(files)) => {
                Some(pending.into_iter().filter(|p| !files.contains(p)).collect())
            }
            _ => None,
        };
    }

    async fn put_files_to_queue(&self, only: Option<&[FileSource]>) -> Result<(), IntakeError> {
        let Some(pending) = &self.pending else {
            return Ok(());
        };
        let units: Vec<TransferUnit> = pending
            .iter()
            .filter(|f| only.is_none_or(|only| only.contains(f)))
            .map(|f| self.prepare_unit(f.clone()))
            .collect();
        if units.is_empty() {
            return Ok(());
        }

        info!(count = units.len(), "queueing files");
        self.queue.add_files(units).await?;
        Ok(())
    }

    /// Builds a fresh unit for `source`, rejected if it fails validation.
    fn prepare_unit(&self, source: FileSource) -> TransferUnit {
        let url = self.options.url.resolve(&source);
        let mut unit = match self.options.validator().validate(&source) {
            Ok(()) => TransferUnit::new(source),
            Err(e) => {
                debug!(file = %source.name, error = %e, "file failed validation");
                let message = e.localized(self.options.localizer.as_ref());
                TransferUnit::rejected(source, message)
            }
        }
        .with_url(url);

        if let Some(transport) = &self.options.transport {
            unit = unit.with_transport(Arc::clone(transport));
        }

        let hooks = unit.hooks_mut();
        if let Some(cb) = self.callbacks.file_added.clone() {
            hooks.on_started(move |u| cb(u));
        }
        if let Some(cb) = self.callbacks.file_error.clone() {
            hooks.on_error(move |u| cb(u));
        }
        if let Some(cb) = self.callbacks.file_canceled.clone() {
            hooks.on_cancelled(move |u| cb(u));
        }
        unit
    }
}

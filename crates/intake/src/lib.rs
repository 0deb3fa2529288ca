//! Intake surface for the upload queue.
//!
//! An [`UploadArea`] collects file selections (explicit paths or dropped
//! files and directories), validates them and hands them to the shared
//! queue owned by an [`Uploader`].

pub mod area;
pub mod error;
pub mod scanner;
pub mod uploader;
pub mod validation;

pub use area::{AreaCallbacks, AreaOptions, Toggle, UploadArea};
pub use error::IntakeError;
pub use scanner::scan_dropped_directory;
pub use uploader::{AreaId, Uploader};
pub use validation::{FileValidator, ValidationError};

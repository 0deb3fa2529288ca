//! Size and extension checks applied before a file is queued.

use upqueue_queue::{FileSource, Localizer};

const MIB: u64 = 1024 * 1024;

/// Why a file was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("file is empty or larger than {max_file_size_mb} MiB")]
    FileSize { max_file_size_mb: u64 },

    #[error("file type not in {accept}")]
    FileType { accept: String },
}

impl ValidationError {
    /// Message stored as the unit's response text.
    pub fn localized(&self, localizer: &dyn Localizer) -> String {
        match self {
            Self::FileSize { max_file_size_mb } => localizer.file_size_invalid(*max_file_size_mb),
            Self::FileType { accept } => localizer.file_type_invalid(accept),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidator {
    pub max_file_size_mb: u64,
    pub allow_empty_file: bool,
    /// Comma-separated extensions (`.jpg,.png`), `*`, `*.*` or a MIME pattern.
    pub accept: String,
    pub validate_extension: bool,
}

impl FileValidator {
    pub fn validate(&self, file: &FileSource) -> Result<(), ValidationError> {
        if !self.size_ok(file.size) {
            return Err(ValidationError::FileSize {
                max_file_size_mb: self.max_file_size_mb,
            });
        }
        if !self.extension_ok(file) {
            return Err(ValidationError::FileType {
                accept: self.accept.clone(),
            });
        }
        Ok(())
    }

    fn size_ok(&self, size: u64) -> bool {
        let max = self.max_file_size_mb.saturating_mul(MIB);
        size <= max && (self.allow_empty_file || size > 0)
    }

    fn extension_ok(&self, file: &FileSource) -> bool {
        let accept = self.accept.trim();
        if !self.validate_extension
            || file.name.is_empty()
            || accept.is_empty()
            || accept == "*"
            || accept == "*.*"
            || accept.contains('/')
        {
            return true;
        }

        let Some(extension) = file.extension() else {
            return false;
        };
        accept
            .split(',')
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(extension))
    }
}

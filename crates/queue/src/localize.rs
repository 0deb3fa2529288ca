//! User-facing messages attached to failed units.

/// Produces the texts stored in a unit's response when it fails locally.
pub trait Localizer: Send + Sync {
    /// `max_file_size_mb` is the configured limit in MiB.
    fn file_size_invalid(&self, max_file_size_mb: u64) -> String;
    fn file_type_invalid(&self, accept: &str) -> String;
    fn invalid_response_from_server(&self) -> String;
}

/// English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocalizer;

impl Localizer for DefaultLocalizer {
    fn file_size_invalid(&self, max_file_size_mb: u64) -> String {
        format!(
            "The selected file exceeds the allowed size of {max_file_size_mb} \
             or its size is 0 MB. Please choose another file."
        )
    }

    fn file_type_invalid(&self, accept: &str) -> String {
        format!("File format is not allowed. Only {accept} files are allowed.")
    }

    fn invalid_response_from_server(&self) -> String {
        "Invalid response from server".to_string()
    }
}

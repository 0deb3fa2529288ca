//! HTTP transport for the upload queue.
//!
//! Sends each file as a `multipart/form-data` request: configured form
//! parameters first, then the file itself under the `file` field. Upload
//! progress is reported as the file body is streamed.

pub mod body;
pub mod error;
pub mod options;
pub mod transport;

pub use error::HttpError;
pub use options::{FormParam, HeaderField, UploadOptions};
pub use transport::HttpTransport;

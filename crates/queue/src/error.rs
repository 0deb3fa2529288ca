//! Queue error types.

/// Errors produced when talking to a running [`UploadService`](crate::UploadService).
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("upload queue is shut down")]
    Closed,
}

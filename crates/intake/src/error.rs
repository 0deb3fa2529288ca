use upqueue_queue::QueueError;

/// Errors from the intake layer.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("path is neither a file nor a directory: {0}")]
    UnsupportedPath(String),
}

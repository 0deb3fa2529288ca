/// Errors raised while preparing or sending an upload request.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no upload URL configured")]
    MissingUrl,

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid header {0}")]
    InvalidHeader(String),
}

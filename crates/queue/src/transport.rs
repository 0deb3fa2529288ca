//! Contract between the queue and whatever moves a file's bytes.
//!
//! A [`Transport`] is given one [`TransferRequest`] at a time. It may report
//! any number of progress samples through the [`ProgressSink`] and resolves
//! to exactly one outcome. Aborting is done by the host dropping the future.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::unit::{FileSource, TransferUnit, UnitId};

/// Terminal outcome of a transfer: `Ok` on success, `Err` on failure. Both
/// carry the server's status code and response text.
pub type TransferFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransferResponse, TransferResponse>> + Send + 'a>>;

/// Performs the network transfer for one unit.
pub trait Transport: Send + Sync {
    fn transfer(&self, request: TransferRequest, progress: ProgressSink) -> TransferFuture<'_>;
}

/// Everything a transport needs to know about one unit.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub id: UnitId,
    pub source: FileSource,
    /// Resolved endpoint; empty means "use the transport's own".
    pub url: String,
}

impl TransferRequest {
    pub fn for_unit(unit: &TransferUnit) -> Self {
        Self {
            id: unit.id(),
            source: unit.source().clone(),
            url: unit.url().to_string(),
        }
    }
}

/// Status code and body returned by the remote end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferResponse {
    pub code: u16,
    pub body: String,
}

impl TransferResponse {
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self {
            code,
            body: body.into(),
        }
    }
}

/// Receives `(bytes_sent, bytes_total)` samples for one transfer.
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(u64, Option<u64>) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(report: impl Fn(u64, Option<u64>) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// A sink that discards every sample.
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    /// `total` is `None` when the transport cannot know the full length.
    pub fn report(&self, sent: u64, total: Option<u64>) {
        (self.report)(sent, total);
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// Lifecycle event delivered back to the queue for an in-flight unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Progress { sent: u64, total: Option<u64> },
    Completed(TransferResponse),
    Failed(TransferResponse),
}

impl From<Result<TransferResponse, TransferResponse>> for TransferEvent {
    fn from(outcome: Result<TransferResponse, TransferResponse>) -> Self {
        match outcome {
            Ok(response) => Self::Completed(response),
            Err(response) => Self::Failed(response),
        }
    }
}

/// Endpoint for uploads: one fixed URL, or computed per file.
#[derive(Clone)]
pub enum UrlSource {
    Fixed(String),
    PerFile(Arc<dyn Fn(&FileSource) -> String + Send + Sync>),
}

impl UrlSource {
    pub fn per_file(resolve: impl Fn(&FileSource) -> String + Send + Sync + 'static) -> Self {
        Self::PerFile(Arc::new(resolve))
    }

    pub fn resolve(&self, source: &FileSource) -> String {
        match self {
            Self::Fixed(url) => url.clone(),
            Self::PerFile(resolve) => resolve(source),
        }
    }
}

impl Default for UrlSource {
    fn default() -> Self {
        Self::Fixed(String::new())
    }
}

impl From<&str> for UrlSource {
    fn from(url: &str) -> Self {
        Self::Fixed(url.to_string())
    }
}

impl From<String> for UrlSource {
    fn from(url: String) -> Self {
        Self::Fixed(url)
    }
}

impl fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(url) => f.debug_tuple("Fixed").field(url).finish(),
            Self::PerFile(_) => f.write_str("PerFile(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn url_source_resolves_per_file() {
        let src = UrlSource::per_file(|f| format!("https://up.example/{}", f.name));
        let file = FileSource::new("/tmp/a.txt", "a.txt", 3);
        assert_eq!(src.resolve(&file), "https://up.example/a.txt");

        let fixed = UrlSource::from("https://up.example/files");
        assert_eq!(fixed.resolve(&file), "https://up.example/files");
    }

    #[test]
    fn progress_sink_forwards_samples() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sink = ProgressSink::new(move |sent, total| s.lock().unwrap().push((sent, total)));
        sink.report(10, Some(20));
        sink.report(15, None);
        assert_eq!(*seen.lock().unwrap(), vec![(10, Some(20)), (15, None)]);
    }

    #[test]
    fn outcome_maps_to_event() {
        let ok: TransferEvent = Ok(TransferResponse::new(200, "done")).into();
        assert_eq!(ok, TransferEvent::Completed(TransferResponse::new(200, "done")));
        let err: TransferEvent = Err(TransferResponse::new(500, "boom")).into();
        assert!(matches!(err, TransferEvent::Failed(r) if r.code == 500));
    }

    #[test]
    fn request_copies_unit_fields() {
        let unit = TransferUnit::new(FileSource::new("/tmp/b.bin", "b.bin", 9))
            .with_url("https://up.example/b");
        let req = TransferRequest::for_unit(&unit);
        assert_eq!(req.id, unit.id());
        assert_eq!(req.url, "https://up.example/b");
        assert_eq!(req.source.size, 9);
    }
}

//! Streaming file body with progress reporting.

use std::path::Path;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::multipart::Part;
use tokio_util::io::ReaderStream;
use upqueue_queue::ProgressSink;

/// Wraps `stream` so each chunk it yields is counted and reported to `sink`
/// against `total`.
pub fn with_progress<S>(
    stream: S,
    total: u64,
    sink: ProgressSink,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
{
    let mut sent = 0u64;
    stream.inspect(move |chunk| {
        if let Ok(bytes) = chunk {
            sent += bytes.len() as u64;
            sink.report(sent, Some(total));
        }
    })
}

/// Opens `path` as a multipart part of known length that reports progress
/// while it is read.
pub async fn file_part(
    path: &Path,
    file_name: &str,
    size: u64,
    sink: ProgressSink,
) -> std::io::Result<Part> {
    let file = tokio::fs::File::open(path).await?;
    let stream = with_progress(ReaderStream::new(file), size, sink);
    let body = reqwest::Body::wrap_stream(stream);
    Ok(Part::stream_with_length(body, size).file_name(file_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn reports_running_total() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sink = ProgressSink::new(move |sent, total| s.lock().unwrap().push((sent, total)));

        let chunks = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"abcd")),
            Ok(Bytes::from_static(b"ef")),
        ]);
        let collected: Vec<_> = with_progress(chunks, 6, sink).collect().await;

        assert_eq!(collected.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![(4, Some(6)), (6, Some(6))]);
    }

    #[tokio::test]
    async fn file_part_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");
        let result = file_part(&missing, "nope.bin", 1, ProgressSink::noop()).await;
        assert!(result.is_err());
    }
}

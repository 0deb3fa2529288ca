//! reqwest-backed [`Transport`].

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};
use upqueue_queue::{
    Localizer, ProgressSink, TransferFuture, TransferRequest, TransferResponse, Transport,
};

use crate::body::file_part;
use crate::error::HttpError;
use crate::options::{FormParam, UploadOptions};

/// Uploads files as multipart form requests.
pub struct HttpTransport {
    http: reqwest::Client,
    options: UploadOptions,
}

impl HttpTransport {
    /// Builds a client for `options`. Headers are attached per request.
    pub fn new(options: UploadOptions) -> Result<Self, HttpError> {
        // Reject malformed headers before any upload starts.
        options.header_map()?;
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, options })
    }

    /// Uses an existing client. Configured headers are applied per request.
    pub fn with_client(http: reqwest::Client, options: UploadOptions) -> Self {
        Self { http, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    async fn send(
        &self,
        request: TransferRequest,
        progress: ProgressSink,
    ) -> Result<TransferResponse, TransferResponse> {
        let localizer: &dyn Localizer = self.options.localizer.as_ref();
        let response = match self.dispatch(&request, progress).await {
            Ok(response) => response,
            Err(e) => {
                warn!(unit = %request.id, file = %request.source.name, error = %e, "upload request failed");
                return Err(TransferResponse::new(0, localizer.invalid_response_from_server()));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(unit = %request.id, error = %e, "could not read response body");
                String::new()
            }
        };
        let outcome = TransferResponse::new(status.as_u16(), response_text(status, body));

        if status.is_success() {
            Ok(outcome)
        } else {
            Err(outcome)
        }
    }

    async fn dispatch(
        &self,
        request: &TransferRequest,
        progress: ProgressSink,
    ) -> Result<reqwest::Response, HttpError> {
        let url = if request.url.is_empty() {
            self.options.url.resolve(&request.source)
        } else {
            request.url.clone()
        };
        if url.is_empty() {
            return Err(HttpError::MissingUrl);
        }

        let mut form = build_form(&self.options.params);
        let source = &request.source;
        form = form.part(
            "file",
            file_part(&source.path, &source.name, source.size, progress).await?,
        );

        debug!(unit = %request.id, %url, method = %self.options.method, "sending upload");
        let response = self
            .http
            .request(self.options.http_method()?, &url)
            .headers(self.options.header_map()?)
            .multipart(form)
            .send()
            .await?;
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn transfer(&self, request: TransferRequest, progress: ProgressSink) -> TransferFuture<'_> {
        Box::pin(self.send(request, progress))
    }
}

/// Form with the configured parameters, in order.
fn build_form(params: &[(String, FormParam)]) -> Form {
    params.iter().fold(Form::new(), |form, (name, param)| match param {
        FormParam::Bytes { data, file_name } => {
            let mut part = Part::bytes(data.clone());
            if let Some(file_name) = file_name {
                part = part.file_name(file_name.clone());
            }
            form.part(name.clone(), part)
        }
        scalar => form.text(name.clone(), scalar.as_text().unwrap_or_default()),
    })
}

/// Text stored on the unit for a received response: the body if any, else
/// the reason phrase, else the numeric status.
///
/// Requests that never get a response are reported with the localized
/// invalid-response message instead (see `send`).
pub fn response_text(status: StatusCode, body: String) -> String {
    if !body.is_empty() {
        return body;
    }
    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => status.as_u16().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use crate::options::HeaderField;
    use upqueue_queue::{FileSource, TransferUnit, UrlSource};

    fn ends_request(buf: &[u8]) -> bool {
        buf.ends_with(b"--\r\n") || buf.ends_with(b"0\r\n\r\n")
    }

    /// Accepts one request, captures it and answers with `status` and `body`.
    async fn mock_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, Arc<Mutex<String>>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/upload");
        let captured = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&captured);

        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = vec![0u8; 8192];
                loop {
                    let read = tokio::time::timeout(
                        std::time::Duration::from_secs(2),
                        stream.read(&mut buf),
                    )
                    .await;
                    match read {
                        Ok(Ok(n)) if n > 0 => {
                            request.extend_from_slice(&buf[..n]);
                            if ends_request(&request) {
                                break;
                            }
                        }
                        _ => break,
                    }
                }
                *sink.lock().unwrap() = String::from_utf8_lossy(&request).into_owned();

                let resp = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, captured, handle)
    }

    fn temp_file(contents: &[u8]) -> (tempfile::TempDir, FileSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, contents).unwrap();
        let source = FileSource::from_path(&path).unwrap();
        (dir, source)
    }

    #[tokio::test]
    async fn uploads_file_with_params() {
        let (url, captured, handle) = mock_server("200 OK", r#"{"ok":true}"#).await;
        let (_dir, source) = temp_file(b"hello upload");
        let options = UploadOptions::new(UrlSource::from(url))
            .with_param("album", FormParam::Text("holidays".into()))
            .with_param("public", FormParam::Bool(true));
        let transport = HttpTransport::new(options).unwrap();

        let last = Arc::new(AtomicU64::new(0));
        let l = Arc::clone(&last);
        let sink = ProgressSink::new(move |sent, _| l.store(sent, Ordering::SeqCst));
        let request = TransferRequest::for_unit(&TransferUnit::new(source));
        let outcome = transport.transfer(request, sink).await.unwrap();

        assert_eq!(outcome.code, 200);
        assert_eq!(outcome.body, r#"{"ok":true}"#);
        assert_eq!(last.load(Ordering::SeqCst), 12);

        let raw = captured.lock().unwrap().clone();
        assert!(raw.starts_with("POST /upload"));
        assert!(raw.to_ascii_lowercase().contains("x-requested-with: xmlhttprequest"));
        assert!(raw.contains("name=\"album\"\r\n\r\nholidays"));
        assert!(raw.contains("name=\"public\"\r\n\r\ntrue"));
        assert!(raw.contains("name=\"file\"; filename=\"report.txt\""));
        assert!(raw.contains("hello upload"));
        handle.abort();
    }

    #[tokio::test]
    async fn error_status_fails_with_reason_phrase() {
        let (url, _captured, handle) = mock_server("503 Service Unavailable", "").await;
        let (_dir, source) = temp_file(b"x");
        let transport = HttpTransport::new(UploadOptions::new(UrlSource::from(url))).unwrap();

        let request = TransferRequest::for_unit(&TransferUnit::new(source));
        let outcome = transport
            .transfer(request, ProgressSink::noop())
            .await
            .unwrap_err();
        assert_eq!(outcome.code, 503);
        assert_eq!(outcome.body, "Service Unavailable");
        handle.abort();
    }

    #[tokio::test]
    async fn unit_url_takes_precedence() {
        let (url, captured, handle) = mock_server("201 Created", "made").await;
        let (_dir, source) = temp_file(b"abc");
        let transport =
            HttpTransport::new(UploadOptions::new("http://127.0.0.1:9/unused")).unwrap();

        let unit = TransferUnit::new(source).with_url(url);
        let outcome = transport
            .transfer(TransferRequest::for_unit(&unit), ProgressSink::noop())
            .await
            .unwrap();
        assert_eq!(outcome.code, 201);
        assert!(captured.lock().unwrap().starts_with("POST /upload"));
        handle.abort();
    }

    #[tokio::test]
    async fn missing_url_fails_locally() {
        let (_dir, source) = temp_file(b"abc");
        let transport = HttpTransport::new(UploadOptions::default()).unwrap();
        let request = TransferRequest::for_unit(&TransferUnit::new(source));
        let outcome = transport
            .transfer(request, ProgressSink::noop())
            .await
            .unwrap_err();
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.body, "Invalid response from server");
    }

    #[tokio::test]
    async fn configured_headers_sent_once() {
        let (url, captured, handle) = mock_server("200 OK", "ok").await;
        let (_dir, source) = temp_file(b"abc");
        let options = UploadOptions::new(UrlSource::from(url))
            .with_header("X-Api-Key", HeaderField::Text("secret".into()));
        let transport = HttpTransport::new(options).unwrap();

        transport
            .transfer(
                TransferRequest::for_unit(&TransferUnit::new(source)),
                ProgressSink::noop(),
            )
            .await
            .unwrap();

        let raw = captured.lock().unwrap().to_ascii_lowercase();
        assert_eq!(raw.matches("x-requested-with:").count(), 1);
        assert_eq!(raw.matches("x-api-key:").count(), 1);
        assert_eq!(raw.matches("cache-control:").count(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn shared_client_still_gets_headers() {
        let (url, captured, handle) = mock_server("200 OK", "ok").await;
        let (_dir, source) = temp_file(b"abc");
        let transport =
            HttpTransport::with_client(reqwest::Client::new(), UploadOptions::new(url.as_str()));

        transport
            .transfer(
                TransferRequest::for_unit(&TransferUnit::new(source)),
                ProgressSink::noop(),
            )
            .await
            .unwrap();

        let raw = captured.lock().unwrap().to_ascii_lowercase();
        assert_eq!(raw.matches("x-requested-with: xmlhttprequest").count(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn unreachable_server_fails_with_localized_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (_dir, source) = temp_file(b"abc");
        let transport =
            HttpTransport::new(UploadOptions::new(format!("http://127.0.0.1:{port}/upload")))
                .unwrap();
        let outcome = transport
            .transfer(
                TransferRequest::for_unit(&TransferUnit::new(source)),
                ProgressSink::noop(),
            )
            .await
            .unwrap_err();
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.body, "Invalid response from server");
    }

    #[test]
    fn invalid_header_rejected_at_construction() {
        let options = UploadOptions::new("http://127.0.0.1:9/")
            .with_header("bad header", HeaderField::Text("x".into()));
        assert!(matches!(
            HttpTransport::new(options),
            Err(HttpError::InvalidHeader(_))
        ));
    }

    #[test]
    fn response_text_fallback_chain() {
        assert_eq!(response_text(StatusCode::OK, "body".into()), "body");
        assert_eq!(response_text(StatusCode::NOT_FOUND, String::new()), "Not Found");
        let unnamed = StatusCode::from_u16(599).unwrap();
        assert_eq!(response_text(unnamed, String::new()), "599");
    }
}

//! Upload run: wires the HTTP transport, queue and intake area together.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;
use tracing::{debug, info, warn};
use upqueue_http::{FormParam, HeaderField, HttpTransport, UploadOptions};
use upqueue_intake::{AreaCallbacks, AreaOptions, Uploader};
use upqueue_queue::{QueueCallbacks, UrlSource};

use crate::config::Config;

/// Outcome counts of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub uploaded: usize,
    pub failed: usize,
    pub canceled: usize,
}

/// Outcome counters fed by queue callbacks. Auto-removed units are gone
/// from the final snapshot, so the run is counted as it happens.
#[derive(Debug, Default)]
struct Tally {
    uploaded: AtomicUsize,
    failed: AtomicUsize,
    canceled: AtomicUsize,
}

impl Tally {
    fn summary(&self) -> Summary {
        Summary {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
        }
    }
}

pub fn upload_options(config: &Config) -> UploadOptions {
    let mut options = UploadOptions::new(UrlSource::from(config.url.clone()))
        .with_method(config.method.clone());
    for (name, value) in &config.headers {
        options = options.with_header(name.clone(), HeaderField::Text(value.clone()));
    }
    for (name, value) in &config.params {
        options = options.with_param(name.clone(), FormParam::Text(value.clone()));
    }
    options
}

pub fn area_options(config: &Config) -> AreaOptions {
    AreaOptions {
        max_file_size: config.area.max_file_size,
        accept: config.area.accept.clone(),
        validate_extension: config.area.validate_extension,
        allow_empty_file: config.area.allow_empty_file,
        ..AreaOptions::default()
    }
}

fn queue_callbacks(done: Arc<Notify>, tally: Arc<Tally>) -> QueueCallbacks {
    let (uploaded, failed, canceled) = (Arc::clone(&tally), Arc::clone(&tally), tally);
    QueueCallbacks::new()
        .on_upload_started(|u| info!(file = %u.name(), size = u.size(), "uploading"))
        .on_progress(|u| debug!(file = %u.name(), progress = u.progress(), "progress"))
        .on_uploaded(move |u| {
            uploaded.uploaded.fetch_add(1, Ordering::Relaxed);
            info!(file = %u.name(), code = u.response_code(), "uploaded")
        })
        .on_error(move |u| {
            failed.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                file = %u.name(),
                code = u.response_code(),
                response = %u.response_text(),
                "upload failed"
            )
        })
        .on_cancelled(move |u| {
            canceled.canceled.fetch_add(1, Ordering::Relaxed);
            info!(file = %u.name(), "upload canceled")
        })
        .on_all_finished(move || done.notify_one())
}

/// Uploads `paths` and waits for the queue to drain.
pub async fn run(config: Config, paths: Vec<PathBuf>) -> anyhow::Result<Summary> {
    if config.url.is_empty() {
        anyhow::bail!("no upload URL configured; pass --url or set `url` in the config file");
    }

    let transport = Arc::new(HttpTransport::new(upload_options(&config))?);
    let done = Arc::new(Notify::new());
    let tally = Arc::new(Tally::default());
    let mut uploader = Uploader::new(
        config.queue.options(),
        queue_callbacks(Arc::clone(&done), Arc::clone(&tally)),
        transport,
    );
    let area = uploader.register_area(area_options(&config), AreaCallbacks::new());

    if let Some(area) = uploader.area_mut(area) {
        area.drop_paths(&paths).await?;
    }

    let queue = uploader.queue();
    if queue.snapshot().await?.is_empty() {
        warn!("nothing to upload");
        uploader.shutdown().await;
        return Ok(Summary::default());
    }

    tokio::select! {
        _ = done.notified() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling uploads");
            queue.clear_files(Vec::new(), true).await?;
            uploader.shutdown().await;
            anyhow::bail!("upload interrupted");
        }
    }

    uploader.shutdown().await;
    Ok(tally.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use upqueue_queue::{
        FileSource, ProgressSink, TransferFuture, TransferRequest, TransferResponse,
        TransferUnit, Transport, UploadService,
    };

    /// Accepts every file except those named `fail*`.
    struct NameCheck;

    impl Transport for NameCheck {
        fn transfer(
            &self,
            request: TransferRequest,
            _progress: ProgressSink,
        ) -> TransferFuture<'_> {
            Box::pin(async move {
                if request.source.name.starts_with("fail") {
                    Err(TransferResponse::new(500, "boom"))
                } else {
                    Ok(TransferResponse::new(200, "ok"))
                }
            })
        }
    }

    #[tokio::test]
    async fn summary_counts_auto_removed_uploads() {
        let done = Arc::new(Notify::new());
        let tally = Arc::new(Tally::default());
        let options = QueueConfig {
            auto_remove: true,
            ..QueueConfig::default()
        };
        let service = UploadService::spawn(
            options.options(),
            queue_callbacks(Arc::clone(&done), Arc::clone(&tally)),
            Arc::new(NameCheck),
        );
        let queue = service.handle();

        let notified = done.notified();
        queue
            .add_files(vec![
                TransferUnit::new(FileSource::new("/a", "a.txt", 1)),
                TransferUnit::new(FileSource::new("/b", "b.txt", 1)),
                TransferUnit::new(FileSource::new("/f", "fail.txt", 1)),
                TransferUnit::rejected(FileSource::new("/e", "empty.txt", 0), "empty"),
            ])
            .await
            .unwrap();
        notified.await;

        let left = queue.snapshot().await.unwrap();
        assert!(left.iter().all(|u| u.name().starts_with("fail") || u.name() == "empty.txt"));
        assert_eq!(
            tally.summary(),
            Summary {
                uploaded: 2,
                failed: 2,
                canceled: 0,
            }
        );
        service.shutdown().await;
    }

    #[test]
    fn options_follow_config() {
        let mut config = Config {
            url: "https://up.example".into(),
            method: "put".into(),
            ..Config::default()
        };
        config.headers.insert("X-Key".into(), "k".into());
        config.params.insert("album".into(), "trip".into());
        config.area.accept = ".jpg".into();

        let upload = upload_options(&config);
        assert_eq!(upload.method, "put");
        assert_eq!(upload.headers, vec![("X-Key".to_string(), HeaderField::Text("k".into()))]);
        assert_eq!(upload.params, vec![("album".to_string(), FormParam::Text("trip".into()))]);

        let area = area_options(&config);
        assert_eq!(area.accept, ".jpg");
        assert!(area.multiple);
    }

    #[tokio::test]
    async fn missing_url_is_rejected() {
        let err = run(Config::default(), vec![PathBuf::from("x")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no upload URL"));
    }
}

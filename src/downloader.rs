//! High-level acquisition and delivery facade
//!
//! [`MediaDownloader`] wires the pieces together: one shared
//! [`NotifyThrottle`] for every job in the process, a subprocess streamer for
//! acquisition, and a delivery uploader for hand-off to the transport. Most
//! embedders only ever touch this type.

use crate::config::Config;
use crate::error::Result;
use crate::notify::NotifyThrottle;
use crate::streamer::{DownloadJob, ProcessStreamer, fetch_url};
use crate::upload::{DeliveryRequest, DeliveryUploader, Transport};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entry point for acquiring media via an external downloader and delivering
/// it through a transport
///
/// Cheap to share behind an `Arc`; all methods take `&self` and jobs for
/// distinct notification targets proceed concurrently.
pub struct MediaDownloader {
    config: Arc<Config>,
    notifier: Arc<NotifyThrottle>,
    streamer: ProcessStreamer,
    uploader: DeliveryUploader,
}

impl MediaDownloader {
    /// Create a downloader from the given configuration
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let notifier = Arc::new(NotifyThrottle::new(config.notify.clone()));
        let streamer = ProcessStreamer::new(config.stream.clone(), Arc::clone(&notifier));
        let uploader = DeliveryUploader::new(Arc::clone(&config), Arc::clone(&notifier));
        Self {
            config,
            notifier,
            streamer,
            uploader,
        }
    }

    /// The configuration this downloader was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared notification throttle, for embedders that dispatch their
    /// own status edits through the same per-target serialization
    pub fn notifier(&self) -> &Arc<NotifyThrottle> {
        &self.notifier
    }

    /// Run the job's external downloader command to completion, streaming
    /// throttled progress panels to its notification target.
    ///
    /// Returns the resolved output file path.
    pub async fn acquire(&self, job: &DownloadJob) -> Result<PathBuf> {
        Ok(self.streamer.run(job).await?)
    }

    /// Download a direct URL (no external downloader) to the given path
    pub async fn fetch(&self, url: &str, out_path: &Path) -> Result<PathBuf> {
        fetch_url(url, out_path).await
    }

    /// Deliver a finished artifact through the transport: post-process,
    /// upload with bounded retries and document fallback, clean up.
    pub async fn deliver(&self, transport: &dyn Transport, request: DeliveryRequest) -> Result<()> {
        Ok(self.uploader.deliver(transport, request).await?)
    }

    /// Await all in-flight notification edits (graceful shutdown)
    pub async fn drain(&self) {
        self.notifier.drain().await;
    }
}

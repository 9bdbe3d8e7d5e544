//! Artifact delivery through a pluggable transport
//!
//! [`DeliveryUploader`] owns a finished media artifact for the duration of a
//! single delivery: it prepares thumbnail/rotation/metadata, uploads as a
//! streamable video with bounded retries, falls back once to a generic
//! document upload, and unconditionally cleans up every temporary file it
//! created along with the original artifact.

use crate::config::Config;
use crate::error::TransportError;
use crate::error::UploadError;
use crate::media::{MediaPostProcessor, RotationFix};
use crate::notify::{Notifiable, NotifyThrottle};
use crate::progress::render_transfer_panel;
use crate::retry::retry_with_delay;
use crate::utils::safe_remove;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Byte-progress callback hook: (bytes sent, total bytes)
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Parameters for a video upload
pub struct VideoUpload<'a> {
    /// Destination (chat/channel) identifier
    pub destination: i64,
    /// File to upload
    pub path: &'a Path,
    /// Caption text
    pub caption: &'a str,
    /// Thumbnail image, if available
    pub thumbnail: Option<&'a Path>,
    /// Duration in whole seconds, 0 when unknown
    pub duration: u64,
    /// Width in pixels, 0 when unknown
    pub width: u32,
    /// Height in pixels, 0 when unknown
    pub height: u32,
    /// Progress callback invoked by the transport as bytes go out
    pub progress: Option<ProgressFn>,
}

/// Parameters for a document upload
pub struct DocumentUpload<'a> {
    /// Destination (chat/channel) identifier
    pub destination: i64,
    /// File to upload
    pub path: &'a Path,
    /// Caption text
    pub caption: &'a str,
    /// Thumbnail image, if available
    pub thumbnail: Option<&'a Path>,
    /// Progress callback invoked by the transport as bytes go out
    pub progress: Option<ProgressFn>,
}

/// Outbound delivery capability (send as video or as document)
///
/// Implemented by an adapter over the real messaging client. Rate limits are
/// signalled via [`TransportError::RateLimited`] with the wait duration.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload as a streamable video
    async fn send_video(&self, upload: VideoUpload<'_>) -> Result<(), TransportError>;

    /// Upload as a generic document
    async fn send_document(&self, upload: DocumentUpload<'_>) -> Result<(), TransportError>;
}

/// A finished media file prepared for upload
///
/// Owned exclusively by the uploader during a single delivery; all paths it
/// created plus the original artifact are deleted once the attempt concludes.
#[derive(Clone, Debug)]
pub struct MediaArtifact {
    /// The original artifact file
    pub path: PathBuf,
    /// The file actually uploaded: the rotation-fixed copy if one was made
    pub source: PathBuf,
    /// Thumbnail image, caller-supplied or generated
    pub thumbnail: Option<PathBuf>,
    /// Whether the thumbnail was generated here (and so must be cleaned up)
    pub generated_thumbnail: bool,
    /// The rotation-fixed temporary copy, if one was made
    pub fixed: Option<PathBuf>,
    /// Probed width in pixels, 0 when unknown
    pub width: u32,
    /// Probed height in pixels, 0 when unknown
    pub height: u32,
    /// Probed rotation tag, if any was present before fixing
    pub rotation: Option<i32>,
    /// Probed duration in whole seconds, 0 when unknown
    pub duration: u64,
}

/// One delivery request
pub struct DeliveryRequest {
    /// The artifact file to deliver
    pub path: PathBuf,
    /// Caption attached to the upload
    pub caption: String,
    /// Caller-supplied thumbnail hint; used when it exists, never deleted
    pub thumbnail: Option<PathBuf>,
    /// Short display name for logs and error messages
    pub display_name: String,
    /// Editable message receiving byte-progress panels, if any
    pub target: Option<Arc<dyn Notifiable>>,
    /// Destination (chat/channel) identifier
    pub destination: i64,
}

/// Uploads finished artifacts with typed retry and guaranteed cleanup
pub struct DeliveryUploader {
    config: Arc<Config>,
    notifier: Arc<NotifyThrottle>,
    media: MediaPostProcessor,
}

impl DeliveryUploader {
    /// Create an uploader sharing the process-wide notification throttle
    pub fn new(config: Arc<Config>, notifier: Arc<NotifyThrottle>) -> Self {
        let media = MediaPostProcessor::new(config.media.clone());
        Self {
            config,
            notifier,
            media,
        }
    }

    /// Prepare an artifact for upload: resolve or generate a thumbnail,
    /// normalize rotation, and probe dimensions and duration on the file
    /// that will actually be uploaded.
    pub async fn prepare(&self, path: &Path, thumbnail_hint: Option<&Path>) -> MediaArtifact {
        let (thumbnail, generated_thumbnail) = match thumbnail_hint {
            Some(hint) if hint.is_file() => (Some(hint.to_path_buf()), false),
            _ => match self.media.generate_thumbnail(path).await {
                Some(generated) => (Some(generated), true),
                None => (None, false),
            },
        };

        let rotation_fix = self.media.fix_rotation(path).await;
        let source = rotation_fix.source_path(path).to_path_buf();
        let fixed = match rotation_fix {
            RotationFix::Remuxed(fixed) => Some(fixed),
            RotationFix::Unchanged => None,
        };

        let dims = self.media.probe_dimensions(&source).await;
        let duration = self.media.probe_duration(&source).await;

        MediaArtifact {
            path: path.to_path_buf(),
            source,
            thumbnail,
            generated_thumbnail,
            fixed,
            width: dims.width,
            height: dims.height,
            rotation: dims.rotation,
            duration,
        }
    }

    /// Deliver the artifact: video upload with bounded retries, a single
    /// document fallback, then unconditional cleanup.
    ///
    /// Reports success if either the video or the document attempt succeeded.
    pub async fn deliver(
        &self,
        transport: &dyn Transport,
        request: DeliveryRequest,
    ) -> Result<(), UploadError> {
        if !request.path.is_file() {
            return Err(UploadError::FileMissing {
                path: request.path.clone(),
            });
        }

        let artifact = self
            .prepare(&request.path, request.thumbnail.as_deref())
            .await;
        let progress = request.target.as_ref().map(|t| self.transfer_progress(t));

        let upload_config = &self.config.upload;
        let video_result = retry_with_delay(upload_config, upload_config.video_attempts, || {
            transport.send_video(VideoUpload {
                destination: request.destination,
                path: &artifact.source,
                caption: &request.caption,
                thumbnail: artifact.thumbnail.as_deref(),
                duration: artifact.duration,
                width: artifact.width,
                height: artifact.height,
                progress: progress.clone(),
            })
        })
        .await;

        let outcome = match video_result {
            Ok(()) => Ok(()),
            Err(video_err) => {
                warn!(
                    name = %request.display_name,
                    error = %video_err,
                    "video upload failed, falling back to document"
                );
                retry_with_delay(upload_config, upload_config.document_attempts, || {
                    transport.send_document(DocumentUpload {
                        destination: request.destination,
                        path: &artifact.source,
                        caption: &request.caption,
                        thumbnail: artifact.thumbnail.as_deref(),
                        progress: progress.clone(),
                    })
                })
                .await
            }
        };

        self.cleanup(&artifact).await;

        match outcome {
            Ok(()) => {
                // The progress message has served its purpose once the upload
                // landed; removal is best-effort.
                if let Some(target) = &request.target {
                    target.delete().await;
                }
                info!(name = %request.display_name, "delivery complete");
                Ok(())
            }
            Err(e) => Err(UploadError::AttemptsExhausted {
                name: request.display_name,
                attempts: upload_config.video_attempts + upload_config.document_attempts,
                last_error: e.to_string(),
            }),
        }
    }

    /// Delete every temporary resource this delivery created, then the
    /// original artifact. Each removal is independently best-effort.
    async fn cleanup(&self, artifact: &MediaArtifact) {
        if let Some(fixed) = &artifact.fixed {
            safe_remove(fixed).await;
        }
        if artifact.generated_thumbnail
            && let Some(thumb) = &artifact.thumbnail
        {
            safe_remove(thumb).await;
        }
        safe_remove(&artifact.path).await;
    }

    /// Build the byte-progress callback wired to the notification target.
    ///
    /// Self-throttled against the target's last successful edit so upload
    /// chunk callbacks don't flood the endpoint.
    fn transfer_progress(&self, target: &Arc<dyn Notifiable>) -> ProgressFn {
        let notifier = Arc::clone(&self.notifier);
        let target = Arc::clone(target);
        let interval = self.config.notify.transfer_interval;
        let start = Instant::now();
        Arc::new(move |current, total| {
            if !notifier.should_render(target.target_id(), interval) {
                return;
            }
            let panel = render_transfer_panel(current, total, start.elapsed());
            notifier.dispatch(Arc::clone(&target), panel);
        })
    }
}

//! End-to-end pipeline tests: acquire via a scripted external downloader,
//! then deliver through a mock transport.
//!
//! These tests exercise the full flow an embedding bot drives:
//! - Subprocess streaming with progress panels pushed to an editable message
//! - Output file resolution from the candidate list
//! - Delivery with retry, document fallback, and unconditional cleanup

use async_trait::async_trait;
use media_dl::{
    Config, DeliveryRequest, DocumentUpload, DownloadJob, MediaConfig, MediaDownloader, Notifiable,
    NotifyError, TargetId, Transport, TransportError, VideoUpload,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Editable message stand-in recording every text written to it
struct PanelRecorder {
    id: TargetId,
    texts: Mutex<Vec<String>>,
    deleted: AtomicU32,
}

impl PanelRecorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::new(100, 7),
            texts: Mutex::new(Vec::new()),
            deleted: AtomicU32::new(0),
        })
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifiable for PanelRecorder {
    fn target_id(&self) -> TargetId {
        self.id
    }

    async fn edit_text(&self, text: &str) -> Result<(), NotifyError> {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        Ok(())
    }

    async fn delete(&self) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport stand-in with scriptable video results
struct ScriptedTransport {
    video_results: Mutex<Vec<Result<(), TransportError>>>,
    video_calls: AtomicU32,
    document_calls: AtomicU32,
    last_caption: Mutex<String>,
}

impl ScriptedTransport {
    fn new(video_results: Vec<Result<(), TransportError>>) -> Self {
        Self {
            video_results: Mutex::new(video_results),
            video_calls: AtomicU32::new(0),
            document_calls: AtomicU32::new(0),
            last_caption: Mutex::new(String::new()),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_video(&self, upload: VideoUpload<'_>) -> Result<(), TransportError> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut caption) = self.last_caption.lock() {
            *caption = upload.caption.to_string();
        }
        if let Some(progress) = &upload.progress {
            progress(1024, 4096);
        }
        match self.video_results.lock() {
            Ok(mut q) if !q.is_empty() => q.remove(0),
            _ => Ok(()),
        }
    }

    async fn send_document(&self, upload: DocumentUpload<'_>) -> Result<(), TransportError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut caption) = self.last_caption.lock() {
            *caption = upload.caption.to_string();
        }
        Ok(())
    }
}

/// A configuration that never finds the ffmpeg toolkit, so post-processing
/// degrades gracefully on machines without it
fn offline_config() -> Config {
    Config {
        media: MediaConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ffprobe_path: Some(PathBuf::from("/nonexistent/ffprobe")),
            search_path: false,
            ..MediaConfig::default()
        },
        ..Config::default()
    }
}

/// Scripted downloader run emitting a handful of progress lines, then
/// producing the output file
fn progress_command(dir: &TempDir, output: &str) -> String {
    let mut script = String::new();
    for pct in ["12.5", "50.0", "100.0"] {
        script.push_str(&format!(
            "printf '[download] {pct}%% of ~8.00MiB at 2.00MiB/s ETA 00:03\\n'; "
        ));
    }
    script.push_str(&format!("touch {}", dir.path().join(output).display()));
    script
}

#[tokio::test]
async fn full_pipeline_acquires_and_delivers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let downloader = MediaDownloader::new(offline_config());
    let recorder = PanelRecorder::new();

    let job = DownloadJob {
        command: progress_command(&dir, "lecture.mp4"),
        dest: dir.path().join("lecture"),
        target: Some(Arc::clone(&recorder) as Arc<dyn Notifiable>),
    };
    let path = downloader.acquire(&job).await.expect("acquire");
    assert_eq!(path, dir.path().join("lecture.mp4"));
    std::fs::write(&path, b"video bytes").expect("write artifact");

    let transport = ScriptedTransport::new(vec![Ok(())]);
    downloader
        .deliver(
            &transport,
            DeliveryRequest {
                path: path.clone(),
                caption: "lecture 12".into(),
                thumbnail: None,
                display_name: "lecture.mp4".into(),
                target: Some(Arc::clone(&recorder) as Arc<dyn Notifiable>),
                destination: 42,
            },
        )
        .await
        .expect("deliver");
    downloader.drain().await;

    // Progress panels reached the editable message during acquisition
    let texts = recorder.texts();
    assert!(!texts.is_empty(), "progress panels must be dispatched");
    assert!(texts.iter().any(|t| t.contains('%')));

    // Upload happened with the requested caption, artifact was cleaned up,
    // and the progress message was removed after success
    assert_eq!(transport.video_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        transport.last_caption.lock().expect("caption").as_str(),
        "lecture 12"
    );
    assert!(!path.exists(), "delivered artifact must be removed");
    assert_eq!(recorder.deleted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_acquisition_still_sends_a_terminal_panel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let downloader = MediaDownloader::new(offline_config());
    let recorder = PanelRecorder::new();

    let job = DownloadJob {
        command: "printf '[download] 37.5%% of ~8.00MiB at 2.00MiB/s ETA 00:03\\n'; exit 1"
            .to_string(),
        dest: dir.path().join("lecture"),
        target: Some(Arc::clone(&recorder) as Arc<dyn Notifiable>),
    };
    assert!(downloader.acquire(&job).await.is_err());
    downloader.drain().await;

    let texts = recorder.texts();
    assert!(
        texts.iter().any(|t| t.contains("37.50")),
        "last snapshot must be rendered after failure: {texts:?}"
    );
}

#[tokio::test]
async fn delivery_falls_back_to_document_and_cleans_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let downloader = MediaDownloader::new(offline_config());
    let file = dir.path().join("clip.mp4");
    std::fs::write(&file, b"video bytes").expect("write");

    let transport = ScriptedTransport::new(vec![
        Err(TransportError::Failed("unsupported codec".into())),
        Err(TransportError::Failed("unsupported codec".into())),
    ]);
    downloader
        .deliver(
            &transport,
            DeliveryRequest {
                path: file.clone(),
                caption: "clip".into(),
                thumbnail: None,
                display_name: "clip.mp4".into(),
                target: None,
                destination: 42,
            },
        )
        .await
        .expect("document fallback succeeds");
    downloader.drain().await;

    assert_eq!(transport.video_calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.document_calls.load(Ordering::SeqCst), 1);
    assert!(!file.exists());
}

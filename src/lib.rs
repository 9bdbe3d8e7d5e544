//! # media-dl
//!
//! Backend library for bot-driven media acquisition: run an external
//! downloader as a subprocess, stream its progress to a remote editable
//! message, post-process the result with ffmpeg, and deliver it through a
//! pluggable transport with bounded retries and guaranteed cleanup.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Transport-agnostic** - Progress targets and upload endpoints are traits
//! - **Non-blocking** - Notification edits never backpressure the pipeline
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadJob, MediaDownloader};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default());
//!
//!     let job = DownloadJob {
//!         command: "yt-dlp -o /tmp/clip 'https://example.com/watch?v=abc'".to_string(),
//!         dest: PathBuf::from("/tmp/clip"),
//!         target: None,
//!     };
//!     let path = downloader.acquire(&job).await?;
//!     println!("downloaded to {}", path.display());
//!
//!     downloader.drain().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// High-level acquisition and delivery facade
pub mod downloader;
/// Error types
pub mod error;
/// Media post-processing via ffmpeg/ffprobe
pub mod media;
/// Throttled, serialized notification edits
pub mod notify;
/// Progress line parsing and panel rendering
pub mod progress;
/// Typed retry for delivery attempts
pub mod retry;
/// External downloader subprocess streaming
pub mod streamer;
/// Artifact delivery through a pluggable transport
pub mod upload;
/// Output resolution and file cleanup helpers
pub mod utils;

// Re-export commonly used types
pub use config::{Config, MediaConfig, NotifyConfig, StreamConfig, UploadConfig};
pub use downloader::MediaDownloader;
pub use error::{DownloadError, Error, NotifyError, Result, TransportError, UploadError};
pub use media::{Dimensions, MediaPostProcessor, RotationFix};
pub use notify::{EditOutcome, Notifiable, NotifyThrottle, TargetId};
pub use progress::ProgressSnapshot;
pub use streamer::{DownloadJob, ProcessStreamer, fetch_url};
pub use upload::{
    DeliveryRequest, DeliveryUploader, DocumentUpload, MediaArtifact, Transport, VideoUpload,
};
pub use utils::{resolve_output, safe_remove};

//! Configuration types for media-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Subprocess streaming configuration (buffers, throttle interval)
///
/// Groups settings for how the external downloader's output is buffered and
/// how often progress notifications fire. Used as a nested sub-config within
/// [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Minimum spacing between successive progress notifications (default: 1.2s)
    #[serde(default = "default_throttle")]
    pub throttle: Duration,

    /// Maximum number of completed output lines kept in the ring buffer (default: 80)
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    /// Cap on the unterminated trailing buffer, in bytes (default: 20000)
    ///
    /// Bounds memory if the child emits extremely long output without a line
    /// terminator.
    #[serde(default = "default_tail_cap")]
    pub tail_cap_bytes: usize,

    /// Read chunk size for the child's output pipe (default: 4096)
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            throttle: default_throttle(),
            ring_capacity: default_ring_capacity(),
            tail_cap_bytes: default_tail_cap(),
            read_chunk: default_read_chunk(),
        }
    }
}

/// Notification edit configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Backoff before the single retry of a transiently failed edit (default: 0.8s)
    #[serde(default = "default_edit_backoff")]
    pub retry_backoff: Duration,

    /// Minimum spacing between byte-progress panel updates during uploads (default: 2.5s)
    #[serde(default = "default_transfer_interval")]
    pub transfer_interval: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            retry_backoff: default_edit_backoff(),
            transfer_interval: default_transfer_interval(),
        }
    }
}

/// External media toolkit configuration (ffmpeg/ffprobe)
///
/// Groups settings for the external binaries and probe behavior.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Whether to search PATH for the toolkit binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Time offset into the video for thumbnail extraction (default: 5s)
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset: Duration,

    /// Timeout for width/height/rotation probes (default: 6s)
    #[serde(default = "default_dimension_timeout")]
    pub dimension_probe_timeout: Duration,

    /// Timeout for the rotation-tag probe preceding a remux (default: 8s)
    #[serde(default = "default_rotation_timeout")]
    pub rotation_probe_timeout: Duration,

    /// Timeout for the duration probe (default: 10s)
    #[serde(default = "default_duration_timeout")]
    pub duration_probe_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            search_path: true,
            thumbnail_offset: default_thumbnail_offset(),
            dimension_probe_timeout: default_dimension_timeout(),
            rotation_probe_timeout: default_rotation_timeout(),
            duration_probe_timeout: default_duration_timeout(),
        }
    }
}

/// Upload attempt configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Attempts to upload as a streamable video before falling back (default: 2)
    #[serde(default = "default_video_attempts")]
    pub video_attempts: u32,

    /// Attempts to upload as a generic document after video attempts fail (default: 1)
    #[serde(default = "default_document_attempts")]
    pub document_attempts: u32,

    /// Delay before retrying after a non-rate-limit transport failure (default: 1s)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Extra wait added on top of a transport-signalled rate-limit duration (default: 1s)
    #[serde(default = "default_rate_limit_pad")]
    pub rate_limit_pad: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            video_attempts: default_video_attempts(),
            document_attempts: default_document_attempts(),
            retry_delay: default_retry_delay(),
            rate_limit_pad: default_rate_limit_pad(),
        }
    }
}

/// Main configuration for [`MediaDownloader`](crate::downloader::MediaDownloader)
///
/// Works out of the box with zero configuration; every field has a sensible
/// default and deserializes from partial JSON.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Subprocess streaming settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Notification edit settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Media toolkit settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Upload attempt settings
    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_throttle() -> Duration {
    Duration::from_millis(1200)
}

fn default_ring_capacity() -> usize {
    80
}

fn default_tail_cap() -> usize {
    20_000
}

fn default_read_chunk() -> usize {
    4096
}

fn default_edit_backoff() -> Duration {
    Duration::from_millis(800)
}

fn default_transfer_interval() -> Duration {
    Duration::from_millis(2500)
}

fn default_thumbnail_offset() -> Duration {
    Duration::from_secs(5)
}

fn default_dimension_timeout() -> Duration {
    Duration::from_secs(6)
}

fn default_rotation_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_duration_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_video_attempts() -> u32 {
    2
}

fn default_document_attempts() -> u32 {
    1
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_rate_limit_pad() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

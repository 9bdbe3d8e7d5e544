//! Media post-processing via the external ffmpeg/ffprobe toolkit
//!
//! Everything here degrades gracefully: a failed thumbnail yields no
//! thumbnail, a failed remux falls back to the original file, and a failed
//! probe yields zero/absent values. None of it is ever fatal for the
//! pipeline.

use crate::config::MediaConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// ffmpeg scale/pad filter producing a 1280x720 canvas preserving aspect ratio
const THUMBNAIL_FILTER: &str = "scale='if(gt(a,1280/720),1280,-2)':'if(gt(a,1280/720),-2,720)',\
pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1";

/// Result of a rotation-normalization pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RotationFix {
    /// No rotation metadata present (or the remux failed); keep the original
    Unchanged,
    /// A remuxed copy with cleared rotation metadata; supersedes the original
    /// as the upload source
    Remuxed(PathBuf),
}

impl RotationFix {
    /// The path to upload from, given the original source
    pub fn source_path<'a>(&'a self, original: &'a Path) -> &'a Path {
        match self {
            RotationFix::Unchanged => original,
            RotationFix::Remuxed(path) => path.as_path(),
        }
    }
}

/// Probed video stream geometry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dimensions {
    /// Stream width in pixels, 0 when the probe failed
    pub width: u32,
    /// Stream height in pixels, 0 when the probe failed
    pub height: u32,
    /// Rotation metadata tag, absent when unset or unreadable
    pub rotation: Option<i32>,
}

/// Probes, thumbnails, and rotation-corrects finished media files
pub struct MediaPostProcessor {
    config: MediaConfig,
}

impl MediaPostProcessor {
    /// Create a post-processor with the given toolkit settings
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    fn ffmpeg(&self) -> PathBuf {
        resolve_tool(&self.config.ffmpeg_path, self.config.search_path, "ffmpeg")
    }

    fn ffprobe(&self) -> PathBuf {
        resolve_tool(&self.config.ffprobe_path, self.config.search_path, "ffprobe")
    }

    /// Extract one frame at the configured offset, scaled and padded to
    /// 1280x720. Returns `None` on any toolkit failure.
    pub async fn generate_thumbnail(&self, video: &Path) -> Option<PathBuf> {
        let thumb = video.with_extension("thumb.jpg");
        let offset = self.config.thumbnail_offset.as_secs().to_string();
        let status = Command::new(self.ffmpeg())
            .args(["-y", "-ss", &offset, "-i"])
            .arg(video)
            .args(["-vframes", "1", "-q:v", "2", "-vf", THUMBNAIL_FILTER])
            .arg(&thumb)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() && thumb.is_file() => {
                debug!(thumb = %thumb.display(), "thumbnail generated");
                Some(thumb)
            }
            Ok(s) => {
                debug!(video = %video.display(), code = ?s.code(), "thumbnail extraction failed");
                None
            }
            Err(e) => {
                warn!(video = %video.display(), error = %e, "could not run ffmpeg for thumbnail");
                None
            }
        }
    }

    /// Probe the rotation tag and, if one is set, remux a copy (stream copy,
    /// no re-encode) with the rotation metadata cleared.
    ///
    /// Falls back to `Unchanged` on any toolkit failure.
    pub async fn fix_rotation(&self, input: &Path) -> RotationFix {
        let rotation = self
            .probe_field(
                input,
                &["-show_entries", "stream_tags=rotate", "-of", "default=noprint_wrappers=1:nokey=1"],
                true,
                self.config.rotation_probe_timeout,
            )
            .await;
        let Some(rotation) = rotation else {
            return RotationFix::Unchanged;
        };
        if rotation.is_empty() {
            return RotationFix::Unchanged;
        }

        let fixed = input.with_extension("fixed.mp4");
        let status = Command::new(self.ffmpeg())
            .args(["-y", "-i"])
            .arg(input)
            .args(["-c", "copy", "-map", "0", "-metadata:s:v:0", "rotate=0"])
            .arg(&fixed)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() && fixed.is_file() => {
                debug!(input = %input.display(), rotation = %rotation, "rotation metadata cleared");
                RotationFix::Remuxed(fixed)
            }
            _ => {
                debug!(input = %input.display(), "rotation remux failed, keeping original");
                RotationFix::Unchanged
            }
        }
    }

    /// Probe width, height, and rotation independently.
    ///
    /// Each field's probe failure yields a zero/absent value without
    /// affecting the others.
    pub async fn probe_dimensions(&self, path: &Path) -> Dimensions {
        let timeout = self.config.dimension_probe_timeout;
        let width = self
            .probe_field(path, &["-show_entries", "stream=width", "-of", "csv=p=0"], true, timeout)
            .await
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);
        let height = self
            .probe_field(path, &["-show_entries", "stream=height", "-of", "csv=p=0"], true, timeout)
            .await
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);
        let rotation = self
            .probe_field(
                path,
                &["-show_entries", "stream_tags=rotate", "-of", "default=noprint_wrappers=1:nokey=1"],
                true,
                timeout,
            )
            .await
            .and_then(|s| s.parse::<i32>().ok());

        Dimensions {
            width,
            height,
            rotation,
        }
    }

    /// Probe the container duration in whole seconds.
    ///
    /// Returns 0 on failure, which downstream treats as "unknown duration".
    pub async fn probe_duration(&self, path: &Path) -> u64 {
        self.probe_field(
            path,
            &["-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"],
            false,
            self.config.duration_probe_timeout,
        )
        .await
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| secs as u64)
        .unwrap_or(0)
    }

    /// Run one ffprobe query with a timeout, returning trimmed stdout.
    ///
    /// `video_stream` selects `v:0` (stream probes); format probes skip it.
    async fn probe_field(
        &self,
        path: &Path,
        entry_args: &[&str],
        video_stream: bool,
        timeout: Duration,
    ) -> Option<String> {
        let mut cmd = Command::new(self.ffprobe());
        cmd.args(["-v", "error"]);
        if video_stream {
            cmd.args(["-select_streams", "v:0"]);
        }
        cmd.args(entry_args).arg(path).stdin(Stdio::null());

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(path = %path.display(), error = %e, "ffprobe failed to run");
                return None;
            }
            Err(_) => {
                warn!(path = %path.display(), ?timeout, "ffprobe timed out");
                return None;
            }
        };
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn resolve_tool(explicit: &Option<PathBuf>, search_path: bool, name: &str) -> PathBuf {
    if let Some(path) = explicit {
        return path.clone();
    }
    if search_path
        && let Ok(found) = which::which(name)
    {
        return found;
    }
    PathBuf::from(name)
}

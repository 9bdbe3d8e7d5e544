//! External downloader subprocess streaming
//!
//! [`ProcessStreamer`] runs an opaque shell command, incrementally reads its
//! combined stdout/stderr, keeps a bounded ring of recent output lines, and
//! pushes throttled progress notifications while the download runs. When the
//! process exits it resolves the produced output file from a deterministic
//! candidate list.
//!
//! Also provides [`fetch_url`] for plain HTTP downloads (PDFs and other
//! direct links) that don't need the external downloader.

use crate::config::StreamConfig;
use crate::error::{DownloadError, Error, Result};
use crate::notify::{Notifiable, NotifyThrottle};
use crate::progress::{parse_progress_line, render_progress_panel};
use crate::utils::{resolve_output, safe_remove};
use futures::StreamExt;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Markers identifying a progress line during streaming (case-insensitive)
const PROGRESS_MARKERS: [&str; 5] = ["[download]", "%", "eta", "frag", "downloading"];

/// Markers accepted for the terminal notification after process exit
const FINAL_MARKERS: [&str; 3] = ["%", "eta", "frag"];

/// One request to acquire a single media file via an external downloader invocation
///
/// Immutable; discarded after the streamer returns.
pub struct DownloadJob {
    /// Opaque shell invocation producing progress lines on its output
    pub command: String,
    /// Destination base path the output candidates are derived from
    pub dest: PathBuf,
    /// Editable message to push progress panels to, if any
    pub target: Option<Arc<dyn Notifiable>>,
}

impl DownloadJob {
    /// Short display name for logs and error messages
    pub fn display_name(&self) -> String {
        self.dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dest.display().to_string())
    }
}

/// Rolling output state for one streaming run
struct StreamState {
    /// Most recent completed lines, newest at the back
    lines: VecDeque<String>,
    /// Unterminated trailing bytes, capped
    tail: String,
    /// When the last notification was dispatched
    last_dispatch: Option<Instant>,
    /// Last qualifying progress line seen (re-rendered on forced intervals)
    last_line: Option<String>,
}

impl StreamState {
    fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            tail: String::new(),
            last_dispatch: None,
            last_line: None,
        }
    }
}

/// Drives one external downloader invocation and its progress notifications
pub struct ProcessStreamer {
    config: StreamConfig,
    notifier: Arc<NotifyThrottle>,
}

enum Pipe {
    Out,
    Err,
}

impl ProcessStreamer {
    /// Create a streamer sharing the process-wide notification throttle
    pub fn new(config: StreamConfig, notifier: Arc<NotifyThrottle>) -> Self {
        Self { config, notifier }
    }

    /// Execute the job's command and stream it to completion.
    ///
    /// Returns the resolved output file path on success. Spawn, stream,
    /// exit-code, and missing-output failures are reported as distinct
    /// [`DownloadError`] variants.
    pub async fn run(&self, job: &DownloadJob) -> std::result::Result<PathBuf, DownloadError> {
        let name = job.display_name();
        info!(job = %name, command = %job.command, "starting downloader");

        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(&job.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(job = %name, error = %e, "failed to spawn downloader");
                return Err(DownloadError::Spawn {
                    job: name,
                    reason: e.to_string(),
                });
            }
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = vec![0u8; self.config.read_chunk];
        let mut err_buf = vec![0u8; self.config.read_chunk];
        let mut state = StreamState::new();

        loop {
            let (pipe, read) = tokio::select! {
                r = read_pipe(&mut stdout, &mut out_buf), if stdout.is_some() => (Pipe::Out, r),
                r = read_pipe(&mut stderr, &mut err_buf), if stderr.is_some() => (Pipe::Err, r),
                else => break,
            };

            match read {
                Ok(0) => match pipe {
                    Pipe::Out => stdout = None,
                    Pipe::Err => stderr = None,
                },
                Ok(n) => {
                    let chunk = match pipe {
                        Pipe::Out => &out_buf[..n],
                        Pipe::Err => &err_buf[..n],
                    };
                    self.ingest(&mut state, chunk);
                    self.maybe_notify(&mut state, job.target.as_ref());
                }
                Err(e) => {
                    warn!(job = %name, error = %e, "stream error, killing downloader");
                    // Best-effort termination; the pipe is already broken.
                    let _ = child.kill().await;
                    return Err(DownloadError::Stream {
                        job: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return Err(DownloadError::Stream {
                    job: name,
                    reason: e.to_string(),
                });
            }
        };

        // Terminal dispatch: the remote observer sees a final state whether
        // the process succeeded or not, and only after it has fully exited.
        self.dispatch_final(&state, job.target.as_ref());

        if !status.success() {
            warn!(job = %name, code = ?status.code(), "downloader exited with failure");
            return Err(DownloadError::ExitCode {
                job: name,
                code: status.code(),
            });
        }

        match resolve_output(&job.dest) {
            Some(path) => {
                info!(job = %name, path = %path.display(), "download complete");
                Ok(path)
            }
            None => {
                warn!(job = %name, base = %job.dest.display(), "downloader exited zero but produced no output file");
                Err(DownloadError::OutputNotFound {
                    base: job.dest.clone(),
                })
            }
        }
    }

    /// Fold a chunk of raw output into the line ring and trailing buffer.
    fn ingest(&self, state: &mut StreamState, chunk: &[u8]) {
        state.tail.push_str(&String::from_utf8_lossy(chunk));

        if state.tail.contains('\n') {
            let mut parts: Vec<String> = state.tail.split('\n').map(str::to_string).collect();
            let rest = parts.pop().unwrap_or_default();
            for line in parts {
                state.lines.push_back(line);
                while state.lines.len() > self.config.ring_capacity {
                    state.lines.pop_front();
                }
            }
            state.tail = rest;
        } else if state.tail.len() > self.config.tail_cap_bytes {
            // Keep only the last tail_cap_bytes, respecting char boundaries.
            let excess = state.tail.len() - self.config.tail_cap_bytes;
            let cut = (excess..state.tail.len())
                .find(|i| state.tail.is_char_boundary(*i))
                .unwrap_or(0);
            state.tail.drain(..cut);
        }
    }

    /// Newest-to-oldest scan for a line carrying progress markers.
    fn select_progress_line(&self, state: &StreamState) -> Option<String> {
        for line in state.lines.iter().rev() {
            let lower = line.to_lowercase();
            if PROGRESS_MARKERS.iter().any(|m| lower.contains(m)) {
                return Some(line.clone());
            }
        }
        if !state.tail.is_empty() {
            let lower = state.tail.to_lowercase();
            if lower.contains('%') || lower.contains("eta") {
                return Some(state.tail.clone());
            }
        }
        None
    }

    /// Dispatch a progress panel if a qualifying line is known and the
    /// throttle interval has elapsed.
    ///
    /// A forced-interval firing re-renders the latest known snapshot even if
    /// no new qualifying line appeared since the previous dispatch.
    fn maybe_notify(&self, state: &mut StreamState, target: Option<&Arc<dyn Notifiable>>) {
        if let Some(line) = self.select_progress_line(state) {
            state.last_line = Some(line);
        }

        let Some(target) = target else { return };
        let Some(line) = &state.last_line else { return };

        let due = match state.last_dispatch {
            None => true,
            Some(t) => t.elapsed() >= self.config.throttle,
        };
        if !due {
            return;
        }

        let panel = render_progress_panel(&parse_progress_line(line));
        self.notifier.dispatch(Arc::clone(target), panel);
        state.last_dispatch = Some(Instant::now());
    }

    /// Dispatch the terminal progress panel after the process has exited.
    fn dispatch_final(&self, state: &StreamState, target: Option<&Arc<dyn Notifiable>>) {
        let Some(target) = target else { return };

        let mut line = state.lines.iter().rev().find_map(|l| {
            let lower = l.to_lowercase();
            FINAL_MARKERS
                .iter()
                .any(|m| lower.contains(m))
                .then(|| l.clone())
        });
        if line.is_none() && !state.tail.is_empty() {
            line = Some(state.tail.clone());
        }
        if line.is_none() {
            line = state.last_line.clone();
        }

        if let Some(line) = line {
            debug!("dispatching terminal progress panel");
            let panel = render_progress_panel(&parse_progress_line(&line));
            self.notifier.dispatch(Arc::clone(target), panel);
        }
    }
}

async fn read_pipe<R>(reader: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match reader {
        Some(r) => r.read(buf).await,
        // Guarded out by the select arm condition
        None => std::future::pending().await,
    }
}

/// Download a URL directly to a file (streaming, following redirects).
///
/// Used for plain document links (PDFs and the like) that don't need the
/// external downloader. A partially written file is removed on failure.
pub async fn fetch_url(url: &str, out_path: &Path) -> Result<PathBuf> {
    let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let client = reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (compatible; media-dl/0.2)")
        .build()?;
    let response = client.get(parsed).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let write_result: Result<()> = async {
        let mut file = tokio::fs::File::create(out_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = write_result {
        safe_remove(out_path).await;
        return Err(e);
    }
    Ok(out_path.to_path_buf())
}

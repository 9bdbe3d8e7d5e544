//! Error types for media-dl
//!
//! This module provides the error taxonomy for the library:
//! - Acquisition errors with distinct spawn/stream/exit/missing-output kinds
//! - Delivery errors with attempt accounting
//! - Notification errors classified as permanent or transient
//! - Transport errors including rate-limit signals
//!
//! No raw toolkit or transport error type crosses a component boundary;
//! everything is converted into one of the variants below.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information naming the job or file involved.
#[derive(Debug, Error)]
pub enum Error {
    /// Acquisition (external downloader) error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Delivery (upload) error
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// A direct-fetch URL failed to parse
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as given by the caller
        url: String,
        /// Why it failed to parse
        reason: String,
    },

    /// Direct URL fetch returned a non-success HTTP status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The status code returned by the server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "media.ffmpeg_path")
        key: Option<String>,
    },
}

/// Acquisition errors
///
/// Spawn, stream, exit-code, and missing-output failures are deliberately kept
/// as separate variants so callers and logs can tell them apart, even though
/// they all fail the job.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The downloader process could not be started at all
    #[error("failed to spawn downloader for {job}: {reason}")]
    Spawn {
        /// Display name of the job (typically the destination file name)
        job: String,
        /// Why the spawn failed
        reason: String,
    },

    /// I/O failure on the downloader's output pipe mid-transfer
    #[error("stream error while downloading {job}: {reason}")]
    Stream {
        /// Display name of the job
        job: String,
        /// Why the stream failed
        reason: String,
    },

    /// The downloader exited with a non-zero status
    #[error("downloader exited with code {code:?} for {job}")]
    ExitCode {
        /// Display name of the job
        job: String,
        /// The exit code, or None if the process was killed by a signal
        code: Option<i32>,
    },

    /// The downloader exited zero but no output file resolved from the
    /// candidate list or the directory-prefix fallback
    #[error("downloader finished but no output file was found for {base}")]
    OutputNotFound {
        /// The destination base path the candidates were derived from
        base: PathBuf,
    },
}

/// Delivery errors
#[derive(Debug, Error)]
pub enum UploadError {
    /// The artifact to upload does not exist on disk
    #[error("upload source not found: {path}")]
    FileMissing {
        /// The missing artifact path
        path: PathBuf,
    },

    /// Every video attempt and the document fallback failed
    #[error("upload of {name} failed after {attempts} attempts: {last_error}")]
    AttemptsExhausted {
        /// Display name of the artifact
        name: String,
        /// Total attempts made across video and document uploads
        attempts: u32,
        /// Message from the last transport error observed
        last_error: String,
    },
}

/// Notification edit errors, classified for the throttle's dead-target logic
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The referenced message or container no longer resolves; further edits
    /// to this target are futile
    #[error("notification target no longer resolves: {0}")]
    Permanent(String),

    /// Rate limiting or a transport hiccup; worth one retry
    #[error("transient notification failure: {0}")]
    Transient(String),
}

impl NotifyError {
    /// Returns true if this failure permanently invalidates the target
    pub fn is_permanent(&self) -> bool {
        matches!(self, NotifyError::Permanent(_))
    }
}

/// Transport errors raised by [`Transport`](crate::upload::Transport) implementations
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport signalled a rate limit carrying a wait duration
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// How long the transport asked us to wait
        retry_after: Duration,
    },

    /// Any other transport failure
    #[error("transport failure: {0}")]
    Failed(String),
}

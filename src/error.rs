use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Startup configuration problems. The only error kind that stops the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid shortcut '{spec}': {reason}")]
    InvalidShortcut { spec: String, reason: String },

    #[error("invalid capture region '{spec}': {reason}")]
    InvalidRegion { spec: String, reason: String },

    #[error("knowledge directory {} is unusable: {reason}", .path.display())]
    KnowledgeDir { path: PathBuf, reason: String },

    #[error("hotkey service already running")]
    AlreadyRunning,

    #[error("no keyboard listener backend compiled in (enable the `listener` feature)")]
    NoListenerBackend,

    #[error("keyboard listener could not start: {reason}")]
    ListenerUnavailable { reason: String },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no display available for screen capture")]
    NoDisplay,

    #[error("screen capture tool '{tool}' is not installed")]
    BackendUnavailable { tool: String },

    #[error("screen capture denied by the system: {reason}")]
    PermissionDenied { reason: String },

    #[error("screen capture timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("captured image could not be decoded: {reason}")]
    InvalidImage { reason: String },

    #[error("capture region {region} lies outside the {width}x{height} screen")]
    RegionOutOfBounds {
        region: String,
        width: u32,
        height: u32,
    },

    #[error("screen capture i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("image data is unreadable: {reason}")]
    UnreadableImage { reason: String },

    #[error("OCR engine '{engine}' is not installed")]
    EngineUnavailable { engine: String },

    #[error("OCR engine failed (status {status}): {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("OCR timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("OCR i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to create knowledge directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append to {}: {source}", .path.display())]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("knowledge writer lock poisoned")]
    Poisoned,
}

/// Failure of one pipeline invocation. Never fatal to the listener.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("capture and recognition timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("pipeline worker failed: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Short stage label used in console reports.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Capture(_) => "capture",
            PipelineError::Ocr(_) => "ocr",
            PipelineError::Write(_) => "write",
            PipelineError::Timeout { .. } | PipelineError::Worker(_) => "pipeline",
        }
    }
}

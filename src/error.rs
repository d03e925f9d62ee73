//! Error type for capture sessions.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

/// Error type for capture operations.
///
/// Every variant names the step that failed. Variants raised before the
/// capture loop starts are fatal to the session; the loop-phase variants
/// (`FrameDequeue`, `BufferEnqueue` on requeue, `FrameSave`) and `StreamStop`
/// are recorded or logged without aborting teardown.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The device path could not be opened.
    #[error("failed to open device {}: {source}", path.display())]
    DeviceOpen {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The capability query itself failed.
    #[error("failed to query device capabilities: {0}")]
    CapabilityQuery(#[source] io::Error),

    /// The device does not report the video capture capability.
    #[error("device {card:?} ({driver}) does not support video capture")]
    UnsupportedDevice {
        /// Driver name.
        driver: String,
        /// Card name.
        card: String,
    },

    /// The driver rejected the format request.
    #[error("failed to set pixel format: {0}")]
    FormatNegotiation(#[source] io::Error),

    /// The buffer request failed or granted nothing.
    #[error("failed to request {count} buffers: {source}")]
    BufferAllocation {
        /// Number of buffers requested.
        count: u32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Querying a buffer's placement failed.
    #[error("failed to query buffer {index}: {source}")]
    BufferQuery {
        /// Buffer index.
        index: u32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Mapping a buffer into the process failed.
    #[error("failed to map buffer {index}: {source}")]
    BufferMap {
        /// Buffer index.
        index: u32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Handing a buffer to the driver failed.
    #[error("failed to queue buffer {index}: {source}")]
    BufferEnqueue {
        /// Buffer index.
        index: u32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Starting the stream failed.
    #[error("failed to start capture: {0}")]
    StreamStart(#[source] io::Error),

    /// Taking a filled buffer back from the driver failed.
    #[error("failed to dequeue frame {frame}: {source}")]
    FrameDequeue {
        /// Zero-based frame counter of the attempt.
        frame: u32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Writing a frame to its output file failed.
    #[error("failed to save frame {frame} to {}: {source}", path.display())]
    FrameSave {
        /// Zero-based frame counter.
        frame: u32,
        /// Output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Stopping the stream failed.
    #[error("failed to stop capture: {0}")]
    StreamStop(#[source] io::Error),
}

impl CaptureError {
    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidConfig(_) => ExitCode::from(2),
            Self::DeviceOpen { .. } | Self::UnsupportedDevice { .. } => ExitCode::from(3),
            _ => ExitCode::from(1),
        }
    }
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

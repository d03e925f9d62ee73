//! Fixed capture parameters.

use std::path::{Path, PathBuf};

use crate::error::{CaptureError, Result};
use crate::traits::{FieldOrder, Format, FourCC};

/// Device opened by the binary.
pub const DEVICE_PATH: &str = "/dev/video0";
/// Requested frame width in pixels.
pub const FRAME_WIDTH: u32 = 640;
/// Requested frame height in pixels.
pub const FRAME_HEIGHT: u32 = 480;
/// Number of kernel buffers requested.
pub const NUM_BUFFERS: u32 = 10;
/// Number of frames captured per run.
pub const NUM_FRAMES: u32 = 60;

/// Parameters of one capture session.
///
/// `Default` yields the values the binary runs with; the `with_*` methods
/// exist so tests can shrink the run or point it elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Path of the capture device.
    pub device: PathBuf,
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Requested pixel format.
    pub fourcc: FourCC,
    /// Requested field order.
    pub field_order: FieldOrder,
    /// Number of kernel buffers to request.
    pub buffer_count: u32,
    /// Number of frames to capture.
    pub frame_count: u32,
    /// Directory receiving the frame files.
    pub output_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEVICE_PATH),
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            fourcc: FourCC::YUYV,
            field_order: FieldOrder::Interlaced,
            buffer_count: NUM_BUFFERS,
            frame_count: NUM_FRAMES,
            output_dir: PathBuf::from("."),
        }
    }
}

impl CaptureConfig {
    /// Set the device path.
    #[must_use]
    pub fn with_device<P: AsRef<Path>>(mut self, device: P) -> Self {
        self.device = device.as_ref().to_path_buf();
        self
    }

    /// Set the requested resolution.
    #[must_use]
    pub const fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the requested field order.
    #[must_use]
    pub const fn with_field_order(mut self, field_order: FieldOrder) -> Self {
        self.field_order = field_order;
        self
    }

    /// Set the number of kernel buffers.
    #[must_use]
    pub const fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    /// Set the number of frames to capture.
    #[must_use]
    pub const fn with_frame_count(mut self, frame_count: u32) -> Self {
        self.frame_count = frame_count;
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir<P: AsRef<Path>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.as_ref().to_path_buf();
        self
    }

    /// The format requested from the driver.
    pub const fn requested_format(&self) -> Format {
        Format::new(self.width, self.height, self.fourcc).with_field_order(self.field_order)
    }

    /// Reject configurations no driver could satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "frame size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if self.buffer_count == 0 {
            return Err(CaptureError::InvalidConfig(
                "buffer count must be at least 1".to_owned(),
            ));
        }
        if self.frame_count == 0 {
            return Err(CaptureError::InvalidConfig(
                "frame count must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

//! v4l2-frame-dump: capture a fixed number of raw frames from a V4L2 camera
//!
//! The capture session drives a device through buffer request, mapping,
//! queueing, streaming and teardown, writing each dequeued frame to its own
//! file. The device sits behind the [`VideoDevice`] trait so the whole
//! lifecycle can run against a mock in tests.

pub mod buffer;
pub mod config;
#[allow(unsafe_code)]
pub mod device;
pub mod error;
pub mod output;
pub mod session;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use buffer::{BufferPool, Frame, Owner};
pub use config::CaptureConfig;
pub use device::V4L2Device;
pub use error::{CaptureError, Result};
pub use output::FrameWriter;
pub use session::{CaptureReport, CaptureSession, SavedFrame};
pub use traits::{
    BufferInfo, DeviceCapabilities, FieldOrder, Format, FourCC, FrameMetadata, MappedRegion,
    VideoDevice,
};

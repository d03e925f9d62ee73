//! Core traits and types for the V4L2 capture collaborator.

use std::fmt;
use std::io;
use std::time::Duration;

/// Pixel format representation (e.g., YUYV).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Field order of the captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    /// Let the driver choose.
    #[default]
    Any,
    /// Progressive (non-interlaced) frames.
    Progressive,
    /// Top field only.
    Top,
    /// Bottom field only.
    Bottom,
    /// Both fields interleaved line by line in one buffer.
    Interlaced,
    /// Fields delivered in alternating buffers.
    Alternate,
}

impl From<FieldOrder> for v4l::format::FieldOrder {
    fn from(order: FieldOrder) -> Self {
        match order {
            FieldOrder::Any => Self::Any,
            FieldOrder::Progressive => Self::Progressive,
            FieldOrder::Top => Self::Top,
            FieldOrder::Bottom => Self::Bottom,
            FieldOrder::Interlaced => Self::Interlaced,
            FieldOrder::Alternate => Self::Alternate,
        }
    }
}

impl From<v4l::format::FieldOrder> for FieldOrder {
    fn from(order: v4l::format::FieldOrder) -> Self {
        use v4l::format::FieldOrder as V4lFieldOrder;

        match order {
            V4lFieldOrder::Progressive => Self::Progressive,
            V4lFieldOrder::Top => Self::Top,
            V4lFieldOrder::Bottom => Self::Bottom,
            V4lFieldOrder::Interlaced
            | V4lFieldOrder::InterlacedTB
            | V4lFieldOrder::InterlacedBT
            | V4lFieldOrder::SequentialTB
            | V4lFieldOrder::SequentialBT => Self::Interlaced,
            V4lFieldOrder::Alternate => Self::Alternate,
            _ => Self::Any,
        }
    }
}

/// Video format specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Field order.
    pub field_order: FieldOrder,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl Format {
    /// Create a new format specification.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let stride = width * 2; // YUYV is 2 bytes per pixel
        let size = stride * height;
        Self {
            width,
            height,
            fourcc,
            field_order: FieldOrder::Any,
            stride,
            size,
        }
    }

    /// Set the requested field order.
    #[must_use]
    pub const fn with_field_order(mut self, field_order: FieldOrder) -> Self {
        self.field_order = field_order;
        self
    }

    /// Whether the driver kept the geometry and pixel format of `requested`.
    pub fn matches(&self, requested: &Self) -> bool {
        self.width == requested.width
            && self.height == requested.height
            && self.fourcc == requested.fourcc
            && (requested.field_order == FieldOrder::Any
                || self.field_order == requested.field_order)
    }
}

impl From<v4l::Format> for Format {
    fn from(fmt: v4l::Format) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.fourcc),
            field_order: FieldOrder::from(fmt.field_order),
            stride: fmt.stride,
            size: fmt.size,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} ({:?}, stride {}, {} bytes)",
            self.width, self.height, self.fourcc, self.field_order, self.stride, self.size
        )
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// Placement of one kernel buffer, as reported by a buffer query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Index in the driver's buffer table.
    pub index: u32,
    /// Length of the buffer in bytes.
    pub length: u32,
    /// Offset to pass to `mmap`.
    pub offset: u32,
}

/// Metadata for a dequeued buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Index of the buffer that holds the frame.
    pub buffer_index: u32,
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// A memory region holding one mapped kernel buffer.
///
/// Dropping the region unmaps it.
pub trait MappedRegion {
    /// The mapped bytes.
    fn as_slice(&self) -> &[u8];

    /// Length of the mapping in bytes.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the mapping is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Abstraction over the kernel video capture interface.
///
/// Each method is one request to the driver. Errors are the raw OS errors;
/// the capture session decides which step failed.
pub trait VideoDevice {
    /// The mapping type returned by `map_buffer`.
    type Region: MappedRegion;

    /// Query device capabilities.
    fn capabilities(&self) -> io::Result<DeviceCapabilities>;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> io::Result<Format>;

    /// Request `count` mmap capture buffers. Returns the number granted.
    fn request_buffers(&mut self, count: u32) -> io::Result<u32>;

    /// Query length and offset of the buffer at `index`.
    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo>;

    /// Map a queried buffer into the process.
    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<Self::Region>;

    /// Hand the buffer at `index` to the driver.
    fn queue_buffer(&mut self, index: u32) -> io::Result<()>;

    /// Take the next filled buffer back from the driver, blocking until one
    /// is ready.
    fn dequeue_buffer(&mut self) -> io::Result<FrameMetadata>;

    /// Start streaming.
    fn stream_on(&mut self) -> io::Result<()>;

    /// Stop streaming. Returns every queued buffer to the application.
    fn stream_off(&mut self) -> io::Result<()>;
}

//! V4L2 device implementation using the v4l crate.
//!
//! Capability and format requests go through the v4l crate's safe API. The
//! buffer lifecycle (request, query, map, queue, dequeue, stream on/off) is
//! driven with individual ioctls so each step can fail on its own.

use std::io;
use std::mem;
use std::os::raw::{c_int, c_void};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::slice;
use std::time::Duration;

use log::{debug, warn};
use v4l::buffer::Type;
use v4l::v4l2;
use v4l::v4l2::vidioc;
use v4l::v4l_sys::{v4l2_buffer, v4l2_requestbuffers};
use v4l::video::Capture;
use v4l::{Device, Memory, Timestamp};

use crate::traits::{
    BufferInfo, DeviceCapabilities, Format, FrameMetadata, MappedRegion, VideoDevice,
};

/// V4L2 device implementation wrapping the v4l crate.
pub struct V4L2Device {
    device: Device,
}

impl V4L2Device {
    /// Open a V4L2 device by path (e.g., `/dev/video0`).
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let device = Device::with_path(path)?;
        Ok(Self { device })
    }

    fn fd(&self) -> c_int {
        self.device.handle().fd()
    }

    fn buffer_desc(index: u32) -> v4l2_buffer {
        // SAFETY: v4l2_buffer is a plain C struct; all-zero is a valid value.
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.index = index;
        buf.type_ = Type::VideoCapture as u32;
        buf.memory = Memory::Mmap as u32;
        buf
    }

    fn set_streaming(&self, on: bool) -> io::Result<()> {
        let request = if on {
            vidioc::VIDIOC_STREAMON
        } else {
            vidioc::VIDIOC_STREAMOFF
        };
        let mut typ = Type::VideoCapture as u32;
        // SAFETY: STREAMON/STREAMOFF read a single buffer type from `typ`,
        // which outlives the call.
        unsafe {
            v4l2::ioctl(
                self.fd(),
                request,
                ptr::addr_of_mut!(typ).cast::<c_void>(),
            )
        }
    }
}

impl VideoDevice for V4L2Device {
    type Region = MmapRegion;

    fn capabilities(&self) -> io::Result<DeviceCapabilities> {
        let caps = self.device.query_caps()?;

        Ok(DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        })
    }

    fn set_format(&mut self, format: &Format) -> io::Result<Format> {
        let mut fmt = self.device.format()?;

        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();
        fmt.field_order = format.field_order.into();

        let fmt = self.device.set_format(&fmt)?;
        Ok(Format::from(fmt))
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        // SAFETY: v4l2_requestbuffers is a plain C struct; all-zero is valid.
        let mut req: v4l2_requestbuffers = unsafe { mem::zeroed() };
        req.count = count;
        req.type_ = Type::VideoCapture as u32;
        req.memory = Memory::Mmap as u32;

        // SAFETY: REQBUFS reads and writes a v4l2_requestbuffers, which `req` is.
        unsafe {
            v4l2::ioctl(
                self.fd(),
                vidioc::VIDIOC_REQBUFS,
                ptr::addr_of_mut!(req).cast::<c_void>(),
            )?;
        }
        Ok(req.count)
    }

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo> {
        let mut buf = Self::buffer_desc(index);

        // SAFETY: QUERYBUF reads and writes a v4l2_buffer, which `buf` is.
        unsafe {
            v4l2::ioctl(
                self.fd(),
                vidioc::VIDIOC_QUERYBUF,
                ptr::addr_of_mut!(buf).cast::<c_void>(),
            )?;
        }

        Ok(BufferInfo {
            index,
            length: buf.length,
            // SAFETY: for MMAP buffers the driver fills in `m.offset`.
            offset: unsafe { buf.m.offset },
        })
    }

    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<MmapRegion> {
        MmapRegion::map(self.fd(), info.length as usize, info.offset)
    }

    fn queue_buffer(&mut self, index: u32) -> io::Result<()> {
        let mut buf = Self::buffer_desc(index);

        // SAFETY: QBUF reads a v4l2_buffer, which `buf` is.
        unsafe {
            v4l2::ioctl(
                self.fd(),
                vidioc::VIDIOC_QBUF,
                ptr::addr_of_mut!(buf).cast::<c_void>(),
            )
        }
    }

    fn dequeue_buffer(&mut self) -> io::Result<FrameMetadata> {
        let mut buf = Self::buffer_desc(0);

        // SAFETY: DQBUF reads and writes a v4l2_buffer, which `buf` is. The
        // device is opened blocking, so this waits for a filled buffer.
        unsafe {
            v4l2::ioctl(
                self.fd(),
                vidioc::VIDIOC_DQBUF,
                ptr::addr_of_mut!(buf).cast::<c_void>(),
            )?;
        }

        let timestamp = Timestamp::from(buf.timestamp);
        // Safe conversions: V4L2 timestamps are always non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (timestamp.usec.max(0) as u32).saturating_mul(1000);

        Ok(FrameMetadata {
            buffer_index: buf.index,
            sequence: buf.sequence,
            timestamp: Duration::new(secs, nanos),
            bytes_used: buf.bytesused,
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        self.set_streaming(true)
    }

    fn stream_off(&mut self) -> io::Result<()> {
        self.set_streaming(false)
    }
}

/// A kernel buffer mapped into the process with `mmap`.
///
/// The mapping is shared with the driver and unmapped on drop.
#[derive(Debug)]
pub struct MmapRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl MmapRegion {
    fn map(fd: c_int, len: usize, offset: u32) -> io::Result<Self> {
        let offset = libc::off_t::try_from(offset).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "buffer offset out of range")
        })?;

        // SAFETY: a fresh shared mapping of the driver's buffer; the kernel
        // picks the address and validates `len` and `offset`.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                offset,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned null"))?;
        Ok(Self { ptr, len })
    }
}

impl MappedRegion for MmapRegion {
    fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` points to `len` mapped bytes that live until drop.
        // Callers only read a buffer while it is dequeued, so the driver is
        // not writing to it.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        // SAFETY: `ptr` and `len` are exactly what mmap returned and the
        // mapping has not been unmapped before.
        let ret = unsafe { libc::munmap(self.ptr.as_ptr().cast::<c_void>(), self.len) };
        if ret == 0 {
            debug!("Unmapped {} bytes at {:p}", self.len, self.ptr);
        } else {
            warn!("munmap failed: {}", io::Error::last_os_error());
        }
    }
}

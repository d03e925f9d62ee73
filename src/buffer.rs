//! Pool of memory-mapped capture buffers.
//!
//! Each buffer is owned either by the driver (queued) or by the application
//! (dequeued). The pool tracks which, and refuses requests that would break
//! the alternation before they reach the device.

use std::io;

use log::{debug, warn};

use crate::error::{CaptureError, Result};
use crate::traits::{FrameMetadata, MappedRegion, VideoDevice};

/// Who may touch a buffer's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Dequeued or never queued; safe to read.
    Application,
    /// Queued; the driver may be writing into it.
    Kernel,
}

/// One mapped kernel buffer.
#[derive(Debug)]
pub struct Buffer<R> {
    index: u32,
    region: R,
    owner: Owner,
}

impl<R: MappedRegion> Buffer<R> {
    /// Index in the driver's buffer table.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Current owner.
    pub const fn owner(&self) -> Owner {
        self.owner
    }

    /// Length of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}

/// A filled buffer, borrowed from the pool until it is requeued.
#[derive(Debug)]
pub struct Frame<'a> {
    /// The bytes the driver reported as used.
    pub data: &'a [u8],
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

/// Fixed set of mapped buffers, indexed like the driver's table.
#[derive(Debug)]
pub struct BufferPool<R> {
    buffers: Vec<Buffer<R>>,
    granted: u32,
}

impl<R> Default for BufferPool<R> {
    fn default() -> Self {
        Self {
            buffers: Vec::new(),
            granted: 0,
        }
    }
}

impl<R: MappedRegion> BufferPool<R> {
    /// Request `count` buffers from the driver and map each one.
    ///
    /// Buffers join the pool as soon as they are mapped, so a failure part
    /// way through leaves the earlier mappings here for `release` to undo.
    pub fn allocate<D>(&mut self, device: &mut D, count: u32) -> Result<()>
    where
        D: VideoDevice<Region = R>,
    {
        let granted = device
            .request_buffers(count)
            .map_err(|source| CaptureError::BufferAllocation { count, source })?;
        self.granted = granted;

        if granted == 0 {
            return Err(CaptureError::BufferAllocation {
                count,
                source: io::Error::new(io::ErrorKind::OutOfMemory, "driver granted no buffers"),
            });
        }
        if granted < count {
            warn!("Requested {count} buffers, driver granted {granted}");
        }

        self.buffers.reserve_exact(granted as usize);
        for index in 0..granted {
            let info = device
                .query_buffer(index)
                .map_err(|source| CaptureError::BufferQuery { index, source })?;
            let region = device
                .map_buffer(&info)
                .map_err(|source| CaptureError::BufferMap { index, source })?;

            debug!("Mapped buffer {index}: {} bytes at offset {:#x}", info.length, info.offset);
            self.buffers.push(Buffer {
                index,
                region,
                owner: Owner::Application,
            });
        }

        Ok(())
    }

    /// Number of mapped buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffer is mapped.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Number of buffers the driver granted, mapped or not.
    pub const fn granted(&self) -> u32 {
        self.granted
    }

    /// Buffer at `index`, if mapped.
    pub fn get(&self, index: u32) -> Option<&Buffer<R>> {
        self.buffers.get(index as usize)
    }

    /// Hand every buffer to the driver, in index order.
    pub fn enqueue_all<D>(&mut self, device: &mut D) -> Result<()>
    where
        D: VideoDevice<Region = R>,
    {
        for index in 0..self.index_limit() {
            self.enqueue(device, index)?;
        }
        Ok(())
    }

    /// Hand the buffer at `index` to the driver.
    pub fn enqueue<D>(&mut self, device: &mut D, index: u32) -> Result<()>
    where
        D: VideoDevice<Region = R>,
    {
        let buffer = self
            .buffers
            .get_mut(index as usize)
            .ok_or_else(|| CaptureError::BufferEnqueue {
                index,
                source: io::Error::new(io::ErrorKind::InvalidInput, "no such buffer"),
            })?;

        if buffer.owner == Owner::Kernel {
            return Err(CaptureError::BufferEnqueue {
                index,
                source: io::Error::new(io::ErrorKind::InvalidInput, "buffer is already queued"),
            });
        }

        device
            .queue_buffer(index)
            .map_err(|source| CaptureError::BufferEnqueue { index, source })?;
        buffer.owner = Owner::Kernel;
        Ok(())
    }

    /// Take the next filled buffer from the driver.
    ///
    /// `frame` is the caller's frame counter, used only to label errors.
    pub fn dequeue<D>(&mut self, device: &mut D, frame: u32) -> Result<Frame<'_>>
    where
        D: VideoDevice<Region = R>,
    {
        let invalid = |msg: String| CaptureError::FrameDequeue {
            frame,
            source: io::Error::new(io::ErrorKind::InvalidData, msg),
        };

        let metadata = device
            .dequeue_buffer()
            .map_err(|source| CaptureError::FrameDequeue { frame, source })?;
        let index = metadata.buffer_index;

        let buffer = self
            .buffers
            .get_mut(index as usize)
            .ok_or_else(|| invalid(format!("driver returned unknown buffer {index}")))?;

        if buffer.owner != Owner::Kernel {
            return Err(invalid(format!("driver returned buffer {index}, which was not queued")));
        }
        buffer.owner = Owner::Application;

        let buffer = &*buffer;
        let mapped = buffer.region.len();
        let data = buffer
            .region
            .as_slice()
            .get(..metadata.bytes_used as usize)
            .ok_or_else(|| {
                invalid(format!(
                    "buffer {index} reports {} bytes used but maps {mapped}",
                    metadata.bytes_used
                ))
            })?;

        Ok(Frame { data, metadata })
    }

    /// Mark every buffer as returned to the application, as a stream-off does.
    pub fn reclaim_all(&mut self) {
        for buffer in &mut self.buffers {
            buffer.owner = Owner::Application;
        }
    }

    /// Unmap every buffer.
    pub fn release(&mut self) {
        for buffer in self.buffers.drain(..) {
            debug!("Unmapping buffer {}", buffer.index);
            drop(buffer);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index_limit(&self) -> u32 {
        self.buffers.len() as u32
    }
}

//! Capture session: device setup, the fixed-count capture loop, teardown.

use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::buffer::BufferPool;
use crate::config::CaptureConfig;
use crate::device::V4L2Device;
use crate::error::{CaptureError, Result};
use crate::output::FrameWriter;
use crate::traits::{DeviceCapabilities, Format, VideoDevice};

/// A frame written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFrame {
    /// Zero-based frame counter.
    pub frame: u32,
    /// File the frame was written to.
    pub path: PathBuf,
    /// Bytes written, equal to the driver's bytes-used.
    pub bytes: u32,
    /// Driver sequence number.
    pub sequence: u32,
}

/// Outcome of [`CaptureSession::capture`].
#[derive(Debug)]
pub struct CaptureReport {
    /// Frames the loop was asked for.
    pub requested: u32,
    /// Frames written to disk, in capture order.
    pub saved: Vec<SavedFrame>,
    /// Frames dequeued but not written.
    pub save_failures: u32,
    /// Error that ended the loop before `requested` iterations.
    pub stopped: Option<CaptureError>,
    /// Frames the driver skipped, judged by gaps in the sequence numbers of
    /// every dequeued frame, saved or not.
    pub dropped: u32,
}

impl CaptureReport {
    const fn new(requested: u32) -> Self {
        Self {
            requested,
            saved: Vec::new(),
            save_failures: 0,
            stopped: None,
            dropped: 0,
        }
    }

    /// Whether every requested frame was dequeued and saved.
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none()
            && self.save_failures == 0
            && self.saved.len() == self.requested as usize
    }

    /// Frames the driver skipped during the loop.
    pub const fn dropped_frames(&self) -> u32 {
        self.dropped
    }
}

/// An open device with its buffer pool, ready to capture.
///
/// All resources are released when the session is dropped: streaming is
/// stopped, every mapped buffer is unmapped, the driver's buffer table is
/// freed and the device is closed, in that order. This holds on every exit
/// path, including a failure half way through [`CaptureSession::start`].
pub struct CaptureSession<D: VideoDevice> {
    config: CaptureConfig,
    capabilities: DeviceCapabilities,
    format: Format,
    // Declared before `device` so buffers are unmapped before it closes.
    pool: BufferPool<D::Region>,
    device: D,
    streaming: bool,
}

impl CaptureSession<V4L2Device> {
    /// Open the configured device path and start capturing.
    pub fn open(config: CaptureConfig) -> Result<Self> {
        let device = V4L2Device::open(&config.device).map_err(|source| {
            CaptureError::DeviceOpen {
                path: config.device.clone(),
                source,
            }
        })?;
        info!("Opened {}", config.device.display());

        Self::start(device, config)
    }
}

impl<D: VideoDevice> CaptureSession<D> {
    /// Take ownership of an open device and bring it to the streaming state.
    ///
    /// Runs the setup steps in order: capability check, format negotiation,
    /// buffer allocation and mapping, initial queueing of every buffer, and
    /// stream start. The first failure is returned; whatever was set up
    /// before it is torn down.
    pub fn start(device: D, config: CaptureConfig) -> Result<Self> {
        let capabilities = device
            .capabilities()
            .map_err(CaptureError::CapabilityQuery)?;
        info!(
            "Device: {} (driver {}, bus {})",
            capabilities.card, capabilities.driver, capabilities.bus_info
        );
        if !capabilities.can_capture {
            return Err(CaptureError::UnsupportedDevice {
                driver: capabilities.driver,
                card: capabilities.card,
            });
        }
        if !capabilities.can_stream {
            warn!("Device does not advertise streaming I/O; buffer requests may fail");
        }

        let requested = config.requested_format();
        let mut session = Self {
            config,
            capabilities,
            format: requested.clone(),
            pool: BufferPool::default(),
            device,
            streaming: false,
        };

        session.format = session
            .device
            .set_format(&requested)
            .map_err(CaptureError::FormatNegotiation)?;
        if session.format.matches(&requested) {
            info!("Format: {}", session.format);
        } else {
            warn!("Requested {requested}, driver chose {}", session.format);
        }

        session
            .pool
            .allocate(&mut session.device, session.config.buffer_count)?;
        info!("Mapped {} buffers", session.pool.len());

        session.pool.enqueue_all(&mut session.device)?;

        session
            .device
            .stream_on()
            .map_err(CaptureError::StreamStart)?;
        session.streaming = true;
        info!("Streaming started");

        Ok(session)
    }

    /// Capabilities reported by the device.
    pub const fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Format the driver settled on.
    pub const fn format(&self) -> &Format {
        &self.format
    }

    /// Number of mapped buffers.
    pub fn buffer_count(&self) -> usize {
        self.pool.len()
    }

    /// Capture the configured number of frames into `writer`.
    ///
    /// A dequeue or requeue failure ends the loop early and is returned in
    /// the report. A frame that cannot be written is logged and counted, and
    /// the loop moves on to the next frame.
    pub fn capture(&mut self, writer: &FrameWriter) -> CaptureReport {
        let mut report = CaptureReport::new(self.config.frame_count);
        let mut last_sequence: Option<u32> = None;

        for frame_count in 0..self.config.frame_count {
            let frame = match self.pool.dequeue(&mut self.device, frame_count) {
                Ok(frame) => frame,
                Err(err) => {
                    error!("{err}");
                    report.stopped = Some(err);
                    break;
                }
            };

            let metadata = frame.metadata;
            let gap = last_sequence
                .and_then(|prev| metadata.sequence.checked_sub(prev)?.checked_sub(1))
                .unwrap_or(0);
            if gap > 0 {
                warn!("Driver dropped {gap} frames before frame {frame_count}");
                report.dropped = report.dropped.saturating_add(gap);
            }
            last_sequence = Some(metadata.sequence);

            match writer.write(frame_count, frame.data) {
                Ok(path) => {
                    info!("frame {frame_count} saved to {}", path.display());
                    report.saved.push(SavedFrame {
                        frame: frame_count,
                        path,
                        bytes: metadata.bytes_used,
                        sequence: metadata.sequence,
                    });
                }
                Err(err) => {
                    error!("{err}");
                    report.save_failures += 1;
                }
            }

            if let Err(err) = self.pool.enqueue(&mut self.device, metadata.buffer_index) {
                error!("{err}");
                report.stopped = Some(err);
                break;
            }
        }

        report
    }

    /// Stop streaming and release every resource.
    ///
    /// Equivalent to dropping the session; provided so the end of a run is
    /// visible at the call site.
    pub fn close(self) {
        drop(self);
    }

    fn shutdown(&mut self) {
        if self.streaming {
            self.streaming = false;
            match self.device.stream_off() {
                Ok(()) => info!("Streaming stopped"),
                Err(source) => warn!("{}", CaptureError::StreamStop(source)),
            }
            self.pool.reclaim_all();
        }

        if self.pool.granted() > 0 {
            let mapped = self.pool.len();
            self.pool.release();
            debug!("Unmapped {mapped} buffers");

            if let Err(err) = self.device.request_buffers(0) {
                debug!("Failed to release driver buffers: {err}");
            }
        }
    }
}

impl<D: VideoDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Mock device implementation for testing without hardware.
//!
//! `MockDevice` behaves like a well-mannered driver: it keeps a FIFO of
//! queued buffers, refuses to dequeue while not streaming, and fills each
//! mapping with a test pattern. Every request is recorded in a shared
//! [`Journal`] so tests can assert on the exact call sequence, including the
//! unmaps and close that happen on drop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::traits::{
    BufferInfo, DeviceCapabilities, Format, FourCC, FrameMetadata, MappedRegion, VideoDevice,
};

/// One request observed by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Capability query.
    QueryCapabilities,
    /// Format set.
    SetFormat,
    /// Buffer request with the requested count.
    RequestBuffers(u32),
    /// Buffer query.
    QueryBuffer(u32),
    /// Buffer mapped.
    Map(u32),
    /// Buffer unmapped.
    Unmap(u32),
    /// Buffer queued.
    Queue(u32),
    /// Buffer dequeued.
    Dequeue(u32),
    /// Stream started.
    StreamOn,
    /// Stream stopped.
    StreamOff,
    /// Device closed.
    Close,
}

/// Shared record of every request made to a mock device and its regions.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    fn record(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    /// Whether `event` was recorded.
    pub fn contains(&self, event: Event) -> bool {
        self.0.borrow().contains(&event)
    }

    /// Indices of mapped buffers, in mapping order.
    pub fn mapped(&self) -> Vec<u32> {
        self.filter(|event| match event {
            Event::Map(index) => Some(*index),
            _ => None,
        })
    }

    /// Indices of unmapped buffers, in unmapping order.
    pub fn unmapped(&self) -> Vec<u32> {
        self.filter(|event| match event {
            Event::Unmap(index) => Some(*index),
            _ => None,
        })
    }

    /// Number of dequeue requests that returned a buffer.
    pub fn dequeues(&self) -> usize {
        self.filter(|event| match event {
            Event::Dequeue(index) => Some(*index),
            _ => None,
        })
        .len()
    }

    fn filter<F: Fn(&Event) -> Option<u32>>(&self, f: F) -> Vec<u32> {
        self.0.borrow().iter().filter_map(f).collect()
    }
}

/// A request to make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Capability query fails.
    QueryCapabilities,
    /// Format set fails.
    SetFormat,
    /// Buffer request fails.
    RequestBuffers,
    /// Query of the buffer with this index fails.
    QueryBuffer(u32),
    /// Mapping of the buffer with this index fails.
    MapBuffer(u32),
    /// The n-th queue request (zero-based, counting initial queues) fails.
    Queue(usize),
    /// Stream start fails.
    StreamOn,
    /// The n-th dequeue request (zero-based) fails.
    Dequeue(usize),
    /// Stream stop fails.
    StreamOff,
}

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    driver_format: Option<Format>,
    granted_buffers: Option<u32>,
    bytes_used: Option<u32>,
    dequeue_index: Option<u32>,
    sequence_step: u32,
    pattern: TestPattern,
    faults: Vec<Fault>,
    journal: Journal,
    queued: VecDeque<u32>,
    streaming: bool,
    queue_calls: usize,
    dequeue_calls: usize,
    frame_count: u32,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(640, 480, FourCC::YUYV),
            driver_format: None,
            granted_buffers: None,
            bytes_used: None,
            dequeue_index: None,
            sequence_step: 1,
            pattern: TestPattern::ColorBars,
            faults: Vec::new(),
            journal: Journal::default(),
            queued: VecDeque::new(),
            streaming: false,
            queue_calls: 0,
            dequeue_calls: 0,
            frame_count: 0,
        }
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Answer every format request with `format`, as a driver that adjusts
    /// the request would.
    #[must_use]
    pub fn with_driver_format(mut self, format: Format) -> Self {
        self.driver_format = Some(format);
        self
    }

    /// Grant at most `count` buffers.
    #[must_use]
    pub const fn with_granted_buffers(mut self, count: u32) -> Self {
        self.granted_buffers = Some(count);
        self
    }

    /// Report `bytes` used for every dequeued buffer instead of the format size.
    #[must_use]
    pub const fn with_bytes_used(mut self, bytes: u32) -> Self {
        self.bytes_used = Some(bytes);
        self
    }

    /// Report `index` for every dequeued buffer, whichever buffer was
    /// actually taken off the queue.
    #[must_use]
    pub const fn with_dequeue_index(mut self, index: u32) -> Self {
        self.dequeue_index = Some(index);
        self
    }

    /// Advance the sequence number by `step` per frame; a step above one
    /// looks like a driver dropping frames.
    #[must_use]
    pub const fn with_sequence_step(mut self, step: u32) -> Self {
        self.sequence_step = step;
        self
    }

    /// Set the pattern written into mapped buffers.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Make one request fail.
    #[must_use]
    pub fn fail_on(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Handle to the journal, valid after the device is moved or dropped.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn check(&self, fault: Fault) -> io::Result<()> {
        if self.faults.contains(&fault) {
            Err(io::Error::other(format!("injected fault: {fault:?}")))
        } else {
            Ok(())
        }
    }
}

impl VideoDevice for MockDevice {
    type Region = MockRegion;

    fn capabilities(&self) -> io::Result<DeviceCapabilities> {
        self.journal.record(Event::QueryCapabilities);
        self.check(Fault::QueryCapabilities)?;
        Ok(self.capabilities.clone())
    }

    fn set_format(&mut self, format: &Format) -> io::Result<Format> {
        self.journal.record(Event::SetFormat);
        self.check(Fault::SetFormat)?;
        self.format = self
            .driver_format
            .clone()
            .unwrap_or_else(|| format.clone());
        Ok(self.format.clone())
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        self.journal.record(Event::RequestBuffers(count));
        self.check(Fault::RequestBuffers)?;
        Ok(self.granted_buffers.map_or(count, |granted| granted.min(count)))
    }

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo> {
        self.journal.record(Event::QueryBuffer(index));
        self.check(Fault::QueryBuffer(index))?;
        Ok(BufferInfo {
            index,
            length: self.format.size,
            offset: index * self.format.size,
        })
    }

    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<MockRegion> {
        self.check(Fault::MapBuffer(info.index))?;
        self.journal.record(Event::Map(info.index));

        let mut data = generate_test_frame(&self.format, self.pattern);
        data.resize(info.length as usize, 0);
        Ok(MockRegion {
            index: info.index,
            data,
            journal: self.journal.clone(),
        })
    }

    fn queue_buffer(&mut self, index: u32) -> io::Result<()> {
        let call = self.queue_calls;
        self.queue_calls += 1;
        self.check(Fault::Queue(call))?;
        self.journal.record(Event::Queue(index));
        self.queued.push_back(index);
        Ok(())
    }

    fn dequeue_buffer(&mut self) -> io::Result<FrameMetadata> {
        let call = self.dequeue_calls;
        self.dequeue_calls += 1;
        self.check(Fault::Dequeue(call))?;

        if !self.streaming {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "stream is not running",
            ));
        }
        let index = self
            .queued
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no buffer queued"))?;
        self.journal.record(Event::Dequeue(index));

        let sequence = self.frame_count * self.sequence_step;
        self.frame_count += 1;

        Ok(FrameMetadata {
            buffer_index: self.dequeue_index.unwrap_or(index),
            sequence,
            timestamp: Duration::from_millis(u64::from(sequence) * 33), // ~30fps
            bytes_used: self.bytes_used.unwrap_or(self.format.size),
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        self.journal.record(Event::StreamOn);
        self.check(Fault::StreamOn)?;
        self.streaming = true;
        Ok(())
    }

    fn stream_off(&mut self) -> io::Result<()> {
        self.journal.record(Event::StreamOff);
        self.check(Fault::StreamOff)?;
        self.streaming = false;
        self.queued.clear();
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.journal.record(Event::Close);
    }
}

/// Mapping handed out by [`MockDevice`]. Records an unmap when dropped.
#[derive(Debug)]
pub struct MockRegion {
    index: u32,
    data: Vec<u8>,
    journal: Journal,
}

impl MappedRegion for MockRegion {
    fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for MockRegion {
    fn drop(&mut self) {
        self.journal.record(Event::Unmap(self.index));
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// Generate test frame data based on pattern.
fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let size = (format.width * format.height * 2) as usize; // YUYV = 2 bytes/pixel
    let mut data = vec![0u8; size];

    match pattern {
        TestPattern::ColorBars => {
            generate_color_bars(&mut data, format.width, format.height);
        }
        TestPattern::Solid(y, u, v) => {
            generate_solid(&mut data, y, u, v);
        }
    }

    data
}

/// Write four YUYV bytes at `offset`, if they fit.
fn put_pair(data: &mut [u8], offset: usize, y: u8, u: u8, v: u8) {
    if let Some(pair) = data.get_mut(offset..offset + 4) {
        pair.copy_from_slice(&[y, u, y, v]);
    }
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32) {
    // White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128),
        (210, 16, 146),
        (170, 166, 16),
        (145, 54, 34),
        (106, 202, 222),
        (81, 90, 240),
        (41, 240, 110),
        (16, 128, 128),
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let (y_val, u_val, v_val) = bars.get(bar_idx).copied().unwrap_or((16, 128, 128));
            put_pair(data, ((y * width + x) * 2) as usize, y_val, u_val, v_val);
        }
    }
}

/// Generate solid color YUYV frame.
fn generate_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for chunk in data.chunks_exact_mut(4) {
        chunk.copy_from_slice(&[y, u, y, v]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        let caps = device.capabilities().expect("capabilities should succeed");
        assert_eq!(caps.driver, "mock");
        assert!(caps.can_capture);
        assert!(caps.can_stream);
    }

    #[test]
    fn test_mock_driver_adjusts_format() {
        let mut device = MockDevice::new().with_driver_format(Format::new(320, 240, FourCC::YUYV));
        let actual = device
            .set_format(&Format::new(1280, 720, FourCC::YUYV))
            .expect("set_format should succeed");
        assert_eq!(actual.width, 320);
        assert_eq!(actual.height, 240);
    }

    #[test]
    fn test_mock_fifo_order() {
        let mut device = MockDevice::new();
        device.set_format(&Format::new(64, 48, FourCC::YUYV)).expect("set_format should succeed");
        device.queue_buffer(2).expect("queue should succeed");
        device.queue_buffer(0).expect("queue should succeed");
        device.stream_on().expect("stream_on should succeed");

        let first = device.dequeue_buffer().expect("dequeue should succeed");
        let second = device.dequeue_buffer().expect("dequeue should succeed");
        assert_eq!(first.buffer_index, 2);
        assert_eq!(first.sequence, 0);
        assert_eq!(second.buffer_index, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(first.bytes_used, 64 * 48 * 2);

        let err = device.dequeue_buffer().expect_err("queue should be empty");
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_mock_dequeue_requires_streaming() {
        let mut device = MockDevice::new();
        device.queue_buffer(0).expect("queue should succeed");
        assert!(device.dequeue_buffer().is_err());
    }

    #[test]
    fn test_mock_journal_records_drops() {
        let mut device = MockDevice::new();
        let journal = device.journal();
        let info = device.query_buffer(0).expect("query should succeed");
        let region = device.map_buffer(&info).expect("map should succeed");
        assert_eq!(region.len(), 640 * 480 * 2);

        drop(region);
        drop(device);
        assert_eq!(
            journal.events(),
            vec![Event::QueryBuffer(0), Event::Map(0), Event::Unmap(0), Event::Close]
        );
    }

    #[test]
    fn test_mock_fault_injection() {
        let mut device = MockDevice::new().fail_on(Fault::Queue(1));
        assert!(device.queue_buffer(0).is_ok());
        assert!(device.queue_buffer(1).is_err());
        assert!(device.queue_buffer(2).is_ok());
    }

    #[test]
    fn test_color_bars_pattern() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::ColorBars);

        // Check frame size
        assert_eq!(data.len(), (640 * 480 * 2) as usize);

        // First bar should be white (Y=235)
        assert_eq!(data[0], 235);
    }

    #[test]
    fn test_solid_pattern() {
        let format = Format::new(64, 64, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Solid(128, 64, 192));

        assert_eq!(data[0], 128);
        assert_eq!(data[2], 128);
        assert_eq!(data[1], 64);
        assert_eq!(data[3], 192);
    }
}

//! Frames and the external collaborators that produce or consume them
//!
//! The camera, the pose-estimation provider and the transport encoder are
//! external. This module fixes their contracts and owns the pre-processing
//! the pipeline applies before detection (mirror, aspect crop).

use dancematch_core::{DanceError, DanceResult};
use dancematch_pose::Pose;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const AMBER: Rgb = Rgb(255, 191, 0);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
}

/// Packed RGB8 image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Wrap a raw buffer; its length must be `width * height * 3`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> DanceResult<Self> {
        let expected = width as usize * height as usize * Self::BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(DanceError::FrameBufferMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame of a single color
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * Self::BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&[color.0, color.1, color.2]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some(Rgb(self.data[i], self.data[i + 1], self.data[i + 2]))
    }

    /// Set a pixel; coordinates outside the frame are ignored
    pub fn put_pixel(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = self.offset(x as u32, y as u32);
        self.data[i] = color.0;
        self.data[i + 1] = color.1;
        self.data[i + 2] = color.2;
    }

    /// Horizontal flip, so the user sees themselves as in a mirror
    pub fn mirrored(mut self) -> Self {
        let row_len = self.width as usize * Self::BYTES_PER_PIXEL;
        if row_len == 0 {
            return self;
        }
        for row in self.data.chunks_exact_mut(row_len) {
            let pixels = self.width as usize;
            for x in 0..pixels / 2 {
                let a = x * Self::BYTES_PER_PIXEL;
                let b = (pixels - 1 - x) * Self::BYTES_PER_PIXEL;
                for c in 0..Self::BYTES_PER_PIXEL {
                    row.swap(a + c, b + c);
                }
            }
        }
        self
    }

    /// Centered crop to `aspect_w:aspect_h` keeping the full height
    ///
    /// Frames already narrower than the target are returned unchanged.
    pub fn cropped_to_aspect(self, aspect_w: u32, aspect_h: u32) -> Self {
        if aspect_w == 0 || aspect_h == 0 {
            return self;
        }
        let target_width = (self.height as u64 * aspect_w as u64 / aspect_h as u64) as u32;
        if target_width == 0 || target_width >= self.width {
            return self;
        }

        let start_x = (self.width - target_width) / 2;
        let mut data =
            Vec::with_capacity(target_width as usize * self.height as usize * Self::BYTES_PER_PIXEL);
        for y in 0..self.height {
            let from = self.offset(start_x, y);
            let to = from + target_width as usize * Self::BYTES_PER_PIXEL;
            data.extend_from_slice(&self.data[from..to]);
        }
        Self {
            width: target_width,
            height: self.height,
            data,
        }
    }
}

/// Camera-like frame producer
pub trait FrameSource: Send {
    /// Acquire the device
    fn open(&mut self) -> DanceResult<()>;

    /// Next frame, or None if none is available yet
    fn read(&mut self) -> Option<Frame>;

    /// Release the device
    fn close(&mut self);
}

/// Pose-estimation provider
///
/// Called at most once per frame. Must not influence scoring beyond the
/// pose it returns.
pub trait PoseDetector: Send {
    /// Detected pose, Ok(None) if no body is in the frame
    fn detect(&mut self, frame: &Frame) -> DanceResult<Option<Pose>>;
}

/// Frame compression for transport
pub trait FrameEncoder: Send + Sync {
    /// MIME type of encoded frames
    fn content_type(&self) -> &'static str;

    fn encode(&self, frame: &Frame) -> DanceResult<Vec<u8>>;
}

/// Binary PPM (P6) encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct PpmEncoder;

impl FrameEncoder for PpmEncoder {
    fn content_type(&self) -> &'static str {
        "image/x-portable-pixmap"
    }

    fn encode(&self, frame: &Frame) -> DanceResult<Vec<u8>> {
        let header = format!("P6\n{} {}\n255\n", frame.width(), frame.height());
        let mut out = Vec::with_capacity(header.len() + frame.data().len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(frame.data());
        Ok(out)
    }
}

/// Owned frame source that is closed when released or dropped
pub struct Camera {
    source: Box<dyn FrameSource>,
    open: bool,
}

impl Camera {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            open: false,
        }
    }

    /// Acquire the device; no-op if already open
    pub fn acquire(&mut self) -> DanceResult<()> {
        if !self.open {
            self.source.open()?;
            self.open = true;
            tracing::info!("camera acquired");
        }
        Ok(())
    }

    /// Release the device; no-op if already closed
    pub fn release(&mut self) {
        if self.open {
            self.source.close();
            self.open = false;
            tracing::info!("camera released");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Next frame, None when closed or nothing is ready
    pub fn read(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        self.source.read()
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}

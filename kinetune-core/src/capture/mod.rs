//! Frame acquisition.
//!
//! # Design constraints
//!
//! The pipeline is a chained per-frame loop: it pulls one frame, runs pose
//! estimation + classification to completion, then pulls the next. A
//! `FrameSource` is therefore *pull-based* — a slow model throttles the
//! effective frame rate instead of piling frames up behind it.
//!
//! The OpenCV-backed camera is gated under the `camera-opencv` feature so
//! the core SDK builds without native OpenCV libraries installed. Hosts
//! without a camera can feed any other `FrameSource` (synthetic patterns,
//! recorded sequences, test scripts).

pub mod frame;

pub use frame::Frame;

use crate::error::Result;

/// Contract for anything that can produce frames for the pipeline.
///
/// `&mut self` expresses that sources are stateful (device handles, frame
/// counters). The pipeline owns its source exclusively.
pub trait FrameSource: Send + 'static {
    /// Pull the next frame.
    ///
    /// # Returns
    /// - `Ok(Some(frame))` — a fresh frame to process.
    /// - `Ok(None)` — the source is exhausted; the pipeline ends cleanly.
    ///
    /// # Errors
    /// A device-level failure. The pipeline treats this as fatal and halts
    /// with an error status.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Source resolution as (width, height), if known up front.
    fn resolution(&self) -> Option<(usize, usize)> {
        None
    }
}

/// Webcam capture via OpenCV `VideoCapture`.
///
/// Frames are converted BGR → packed `0x00RRGGBB` and mirrored
/// horizontally so on-screen movement matches the user's own.
#[cfg(feature = "camera-opencv")]
pub struct OpenCvCamera {
    capture: opencv::videoio::VideoCapture,
    width: usize,
    height: usize,
    flip: bool,
}

#[cfg(feature = "camera-opencv")]
impl OpenCvCamera {
    /// Open camera `index`, requesting the given resolution.
    ///
    /// The device may report a different actual resolution; `resolution()`
    /// returns what the driver settled on.
    pub fn open(index: i32, width: usize, height: usize, flip: bool) -> Result<Self> {
        use crate::error::KinetuneError;
        use opencv::prelude::*;
        use opencv::videoio::{self, VideoCapture, VideoCaptureAPIs};

        let mut capture = VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32)
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))?;

        let opened = capture
            .is_opened()
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))?;
        if !opened {
            return Err(KinetuneError::NoCameraDevice);
        }

        capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))?;
        capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))?;
        capture
            .set(videoio::CAP_PROP_BUFFERSIZE, 1.0)
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))?;

        let actual_width = capture
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))? as usize;
        let actual_height = capture
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))? as usize;

        tracing::info!(
            index,
            width = actual_width,
            height = actual_height,
            "camera opened"
        );

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
            flip,
        })
    }
}

#[cfg(feature = "camera-opencv")]
impl FrameSource for OpenCvCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use crate::error::KinetuneError;
        use opencv::core::Mat;
        use opencv::prelude::*;

        let mut mat = Mat::default();
        let grabbed = self
            .capture
            .read(&mut mat)
            .map_err(|e| KinetuneError::FrameSource(e.to_string()))?;
        if !grabbed || mat.empty() {
            // Camera unplugged or stream ended.
            return Ok(None);
        }

        let rows = mat.rows() as usize;
        let cols = mat.cols() as usize;
        let mut pixels = vec![0u32; cols * rows];
        for y in 0..rows {
            for x in 0..cols {
                let bgr = mat
                    .at_2d::<opencv::core::Vec3b>(y as i32, x as i32)
                    .map_err(|e| KinetuneError::FrameSource(e.to_string()))?;
                let r = bgr[2] as u32;
                let g = bgr[1] as u32;
                let b = bgr[0] as u32;
                pixels[y * cols + x] = (r << 16) | (g << 8) | b;
            }
        }

        let mut frame = Frame::new(pixels, cols, rows);
        if self.flip {
            frame.flip_horizontal();
        }
        Ok(Some(frame))
    }

    fn resolution(&self) -> Option<(usize, usize)> {
        Some((self.width, self.height))
    }
}

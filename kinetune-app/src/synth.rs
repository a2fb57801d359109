//! Synthetic frame source for camera-less runs.
//!
//! Draws a drifting bright disc over noise at roughly webcam rate so the
//! overlay window shows motion and the stub model has frames to chew on.

use std::time::Duration;

use kinetune_core::{Frame, FrameSource, KinetuneError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

pub struct SyntheticWebcam {
    width: usize,
    height: usize,
    rng: StdRng,
    tick: u64,
}

impl SyntheticWebcam {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rng: StdRng::seed_from_u64(0x6b696e65),
            tick: 0,
        }
    }
}

impl FrameSource for SyntheticWebcam {
    fn next_frame(&mut self) -> Result<Option<Frame>, KinetuneError> {
        // Pace like a real webcam; the pipeline pulls as fast as we allow.
        std::thread::sleep(FRAME_INTERVAL);
        self.tick += 1;

        let mut pixels = vec![0u32; self.width * self.height];
        for px in pixels.iter_mut() {
            let v = self.rng.gen_range(0u32..32);
            *px = (v << 16) | (v << 8) | v;
        }

        // A slow circular orbit for the "subject".
        let t = self.tick as f32 / 60.0;
        let cx = (self.width as f32 / 2.0 + t.cos() * self.width as f32 / 4.0) as i32;
        let cy = (self.height as f32 / 2.0 + t.sin() * self.height as f32 / 4.0) as i32;
        let radius = (self.width.min(self.height) / 10) as i32;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let (x, y) = (cx + dx, cy + dy);
                if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
                    continue;
                }
                pixels[y as usize * self.width + x as usize] = 0x00C0C0FF;
            }
        }

        Ok(Some(Frame::new(pixels, self.width, self.height)))
    }

    fn resolution(&self) -> Option<(usize, usize)> {
        Some((self.width, self.height))
    }
}

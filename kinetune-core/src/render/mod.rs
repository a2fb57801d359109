//! CPU overlay rendering: frame + keypoint dots + skeleton edges.
//!
//! Purely cosmetic — the pipeline never makes a decision based on this
//! module, and overlay delivery is best-effort. Drawing is bounds-clamped
//! and infallible.

use crate::capture::Frame;
use crate::pose::{KeypointIndex, Pose};

/// Skeleton edge list (start keypoint, end keypoint).
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 16] = [
    // Face
    (KeypointIndex::LeftEar, KeypointIndex::LeftEye),
    (KeypointIndex::LeftEye, KeypointIndex::Nose),
    (KeypointIndex::Nose, KeypointIndex::RightEye),
    (KeypointIndex::RightEye, KeypointIndex::RightEar),
    // Arms
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // Torso
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    // Legs
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

/// Keypoint dot color (RGB).
pub const KEYPOINT_COLOR: u32 = 0x00FF00;

/// Skeleton edge color (RGB).
pub const SKELETON_COLOR: u32 = 0xFFFF00;

/// Keypoint dot radius in pixels.
const KEYPOINT_RADIUS: i32 = 3;

/// Default minimum keypoint confidence for drawing.
pub const DEFAULT_MIN_PART_CONFIDENCE: f32 = 0.5;

/// Compose the overlay: the frame itself, then skeleton edges, then
/// keypoint dots. Keypoints below `min_confidence` are skipped, as is any
/// edge touching one.
pub fn render_overlay(frame: &Frame, pose: Option<&Pose>, min_confidence: f32) -> Frame {
    let mut out = frame.clone();

    if let Some(pose) = pose {
        for (from, to) in SKELETON_CONNECTIONS {
            let a = pose.get(from);
            let b = pose.get(to);
            if !a.is_valid(min_confidence) || !b.is_valid(min_confidence) {
                continue;
            }
            let (x0, y0) = a.to_pixel(out.width, out.height);
            let (x1, y1) = b.to_pixel(out.width, out.height);
            draw_line(&mut out, x0, y0, x1, y1, SKELETON_COLOR);
        }

        for keypoint in &pose.keypoints {
            if !keypoint.is_valid(min_confidence) {
                continue;
            }
            let (x, y) = keypoint.to_pixel(out.width, out.height);
            draw_disc(&mut out, x, y, KEYPOINT_RADIUS, KEYPOINT_COLOR);
        }
    }

    out
}

fn put_pixel(frame: &mut Frame, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= frame.width || y >= frame.height {
        return;
    }
    frame.pixels[y * frame.width + x] = color;
}

fn draw_disc(frame: &mut Frame, cx: i32, cy: i32, radius: i32, color: u32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Bresenham line.
fn draw_line(frame: &mut Frame, mut x0: i32, mut y0: i32, x1: i32, y1: i32, color: u32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(frame, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    fn pose_with(index: KeypointIndex, keypoint: Keypoint) -> Pose {
        let mut pose = Pose::default();
        pose.keypoints[index as usize] = keypoint;
        pose
    }

    #[test]
    fn no_pose_copies_frame_untouched() {
        let frame = Frame::new(vec![7; 100], 10, 10);
        let out = render_overlay(&frame, None, DEFAULT_MIN_PART_CONFIDENCE);
        assert_eq!(out.pixels, frame.pixels);
    }

    #[test]
    fn confident_keypoint_is_drawn() {
        let frame = Frame::blank(100, 100);
        let pose = pose_with(KeypointIndex::Nose, Keypoint::new(0.5, 0.5, 0.9));
        let out = render_overlay(&frame, Some(&pose), 0.5);
        assert_eq!(out.pixel(50, 50), Some(KEYPOINT_COLOR));
    }

    #[test]
    fn low_confidence_keypoint_is_filtered() {
        let frame = Frame::blank(100, 100);
        let pose = pose_with(KeypointIndex::Nose, Keypoint::new(0.5, 0.5, 0.4));
        let out = render_overlay(&frame, Some(&pose), 0.5);
        assert_eq!(out.pixel(50, 50), Some(0));
    }

    #[test]
    fn skeleton_edge_needs_both_endpoints_confident() {
        let frame = Frame::blank(100, 100);
        let mut pose = Pose::default();
        pose.keypoints[KeypointIndex::LeftShoulder as usize] = Keypoint::new(0.2, 0.5, 0.9);
        pose.keypoints[KeypointIndex::RightShoulder as usize] = Keypoint::new(0.8, 0.5, 0.2);
        let out = render_overlay(&frame, Some(&pose), 0.5);

        // Midpoint of the shoulder line stays untouched — one end is weak.
        assert_eq!(out.pixel(50, 50), Some(0));

        pose.keypoints[KeypointIndex::RightShoulder as usize] = Keypoint::new(0.8, 0.5, 0.9);
        let out = render_overlay(&frame, Some(&pose), 0.5);
        assert_eq!(out.pixel(50, 50), Some(SKELETON_COLOR));
    }

    #[test]
    fn out_of_frame_keypoints_do_not_panic() {
        let frame = Frame::blank(16, 16);
        let pose = pose_with(KeypointIndex::Nose, Keypoint::new(1.0, 1.0, 0.9));
        let out = render_overlay(&frame, Some(&pose), 0.5);
        assert_eq!(out.pixels.len(), 256);
    }
}

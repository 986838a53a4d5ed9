//! Frame annotation - skeleton drawing and phase overlays
//!
//! Drawing only reads the pose and score; it never feeds back into them.
//! Text (countdown digits, timer) travels as overlay metadata for the
//! client to render.

use dancematch_pose::{Joint, Landmark, Pose, MATCH_VISIBILITY};
use serde::Serialize;

use crate::frame::{Frame, Rgb};
use crate::session::PhaseHint;

/// Bone segments drawn between joints
pub const SKELETON: &[(Joint, Joint)] = &[
    (Joint::Nose, Joint::LeftShoulder),
    (Joint::Nose, Joint::RightShoulder),
    (Joint::LeftShoulder, Joint::RightShoulder),
    (Joint::LeftShoulder, Joint::LeftElbow),
    (Joint::LeftElbow, Joint::LeftWrist),
    (Joint::RightShoulder, Joint::RightElbow),
    (Joint::RightElbow, Joint::RightWrist),
    (Joint::LeftShoulder, Joint::LeftHip),
    (Joint::RightShoulder, Joint::RightHip),
    (Joint::LeftHip, Joint::RightHip),
    (Joint::LeftHip, Joint::LeftKnee),
    (Joint::LeftKnee, Joint::LeftAnkle),
    (Joint::RightHip, Joint::RightKnee),
    (Joint::RightKnee, Joint::RightAnkle),
];

const JOINT_RADIUS: i64 = 2;
const BORDER: u32 = 4;
const SCORE_BAR_HEIGHT: u32 = 6;

/// Overlay content accompanying an annotated frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub person_detected: bool,
    /// User is not fully in frame
    pub step_back: bool,
    pub score: f32,
    pub hint: PhaseHint,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            person_detected: false,
            step_back: false,
            score: 0.0,
            hint: PhaseHint::Idle,
        }
    }
}

/// Processed frame ready for transport
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub overlay: Overlay,
}

/// Normalized coordinates outside [-MARGIN, 1 + MARGIN] are not drawn
const COORD_MARGIN: f32 = 0.5;

fn drawable(lm: &Landmark) -> bool {
    let range = -COORD_MARGIN..=1.0 + COORD_MARGIN;
    range.contains(&lm.x) && range.contains(&lm.y)
}

fn to_pixel(frame: &Frame, lm: &Landmark) -> (i64, i64) {
    (
        (lm.x * frame.width() as f32).round() as i64,
        (lm.y * frame.height() as f32).round() as i64,
    )
}

/// Liang-Barsky clip of a segment to the frame rectangle
///
/// None when the segment misses the frame entirely.
fn clip_line(
    frame: &Frame,
    from: (i64, i64),
    to: (i64, i64),
) -> Option<((i64, i64), (i64, i64))> {
    if frame.width() == 0 || frame.height() == 0 {
        return None;
    }
    let max_x = (frame.width() - 1) as f64;
    let max_y = (frame.height() - 1) as f64;
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = (to.0 as f64 - x0, to.1 as f64 - y0);

    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [(-dx, x0), (dx, max_x - x0), (-dy, y0), (dy, max_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| {
        (
            (x0 + t * dx).round().clamp(0.0, max_x) as i64,
            (y0 + t * dy).round().clamp(0.0, max_y) as i64,
        )
    };
    Some((at(t0), at(t1)))
}

/// Bresenham line, clipped to the frame first
fn draw_line(frame: &mut Frame, from: (i64, i64), to: (i64, i64), color: Rgb) {
    let Some(((mut x0, mut y0), (x1, y1))) = clip_line(frame, from, to) else {
        return;
    };
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        frame.put_pixel(x0, y0, color);
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

fn draw_dot(frame: &mut Frame, center: (i64, i64), radius: i64, color: Rgb) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                frame.put_pixel(center.0 + dx, center.1 + dy, color);
            }
        }
    }
}

fn fill_rect(frame: &mut Frame, x: u32, y: u32, width: u32, height: u32, color: Rgb) {
    for py in y..y.saturating_add(height).min(frame.height()) {
        for px in x..x.saturating_add(width).min(frame.width()) {
            frame.put_pixel(px as i64, py as i64, color);
        }
    }
}

/// Bones in red, joints in green
///
/// Landmarks at or below 0.5 visibility, non-finite, or far off-frame are
/// skipped.
pub fn draw_skeleton(frame: &mut Frame, pose: &Pose) {
    let visible = |joint: Joint| {
        pose.get(joint)
            .filter(|lm| lm.is_visible(MATCH_VISIBILITY) && drawable(lm))
    };

    for &(a, b) in SKELETON {
        if let (Some(a), Some(b)) = (visible(a), visible(b)) {
            let (pa, pb) = (to_pixel(frame, a), to_pixel(frame, b));
            draw_line(frame, pa, pb, Rgb::RED);
        }
    }
    for &joint in Joint::all() {
        if let Some(lm) = visible(joint) {
            let center = to_pixel(frame, lm);
            draw_dot(frame, center, JOINT_RADIUS, Rgb::GREEN);
        }
    }
}

/// Colored border around the whole frame
pub fn draw_border(frame: &mut Frame, color: Rgb) {
    let (w, h) = (frame.width(), frame.height());
    let band = BORDER.min(w / 2).min(h / 2);
    fill_rect(frame, 0, 0, w, band, color);
    fill_rect(frame, 0, h.saturating_sub(band), w, band, color);
    fill_rect(frame, 0, 0, band, h, color);
    fill_rect(frame, w.saturating_sub(band), 0, band, h, color);
}

/// Bar along the bottom edge, width proportional to the score
pub fn draw_score_bar(frame: &mut Frame, score: f32) {
    let filled = (frame.width() as f32 * score.clamp(0.0, 100.0) / 100.0).round() as u32;
    let y = frame.height().saturating_sub(SCORE_BAR_HEIGHT);
    fill_rect(frame, 0, y, filled, SCORE_BAR_HEIGHT, Rgb::GREEN);
}

/// Draw everything the overlay calls for
pub fn annotate(mut frame: Frame, pose: Option<&Pose>, overlay: Overlay) -> AnnotatedFrame {
    if let Some(pose) = pose {
        draw_skeleton(&mut frame, pose);
    }
    if !overlay.person_detected {
        draw_border(&mut frame, Rgb::RED);
    } else if overlay.step_back {
        draw_border(&mut frame, Rgb::AMBER);
    }
    if matches!(overlay.hint, PhaseHint::Dancing { .. }) {
        draw_score_bar(&mut frame, overlay.score);
    }
    AnnotatedFrame { frame, overlay }
}

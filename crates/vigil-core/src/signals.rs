//! Per-frame signal extraction: eye aspect ratio and head pose angles.
//!
//! Everything here is a pure function of one [`LandmarkFrame`].

use crate::error::InvalidInputError;
use crate::landmarks::{HeadPose, LandmarkFrame, LEFT_EYE, RIGHT_EYE};

/// Added to the horizontal term so near-degenerate eyes stay finite.
const EAR_EPSILON: f64 = 1e-6;

/// Raw signals extracted from a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSignals {
    /// Mean eye aspect ratio over both eyes.
    pub ear: f64,
    /// Head yaw in degrees (left/right turn).
    pub yaw: f64,
    /// Head pitch in degrees (up/down nod).
    pub pitch: f64,
}

/// Signals after the per-session moving average.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothedSignals {
    pub ear: f64,
    pub yaw: f64,
    pub pitch: f64,
}

pub fn extract(frame: &LandmarkFrame) -> Result<FrameSignals, InvalidInputError> {
    let left = eye_aspect_ratio(frame, &LEFT_EYE)?;
    let right = eye_aspect_ratio(frame, &RIGHT_EYE)?;
    let (yaw, pitch) = frame.head_pose().map(pose_angles).unwrap_or((0.0, 0.0));

    Ok(FrameSignals {
        ear: (left + right) / 2.0,
        yaw,
        pitch,
    })
}

/// EAR for one eye from `[outer, top1, top2, inner, bottom1, bottom2]`.
///
/// Returns 0.0 when the eye corners coincide. The result is always finite
/// and non-negative.
pub fn eye_aspect_ratio(frame: &LandmarkFrame, eye: &[usize; 6]) -> Result<f64, InvalidInputError> {
    let outer = frame.get(eye[0])?;
    let top1 = frame.get(eye[1])?;
    let top2 = frame.get(eye[2])?;
    let inner = frame.get(eye[3])?;
    let bottom1 = frame.get(eye[4])?;
    let bottom2 = frame.get(eye[5])?;

    let horizontal = outer.planar_distance(inner);
    if horizontal == 0.0 {
        return Ok(0.0);
    }

    let vertical = top1.planar_distance(bottom2) + top2.planar_distance(bottom1);
    let ear = vertical / (2.0 * horizontal + EAR_EPSILON);
    Ok(if ear.is_finite() { ear } else { 0.0 })
}

/// Yaw and pitch in degrees from the rotation block.
pub fn pose_angles(pose: &HeadPose) -> (f64, f64) {
    let r = &pose.rotation;
    // Rounding in the detector can push |r02| a hair past 1.
    let yaw = -r[0][2].clamp(-1.0, 1.0).asin();
    let pitch = r[1][2].atan2(r[2][2]);
    (yaw.to_degrees(), pitch.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, FACE_MESH_POINTS};

    fn frame_with_eyes(width: f64, opening: f64) -> LandmarkFrame {
        let mut points = vec![Landmark::new(0.5, 0.5, 0.0); FACE_MESH_POINTS];
        for eye in [LEFT_EYE, RIGHT_EYE] {
            points[eye[0]] = Landmark::new(0.0, 0.0, 0.0);
            points[eye[3]] = Landmark::new(width, 0.0, 0.0);
            points[eye[1]] = Landmark::new(width / 3.0, -opening / 2.0, 0.0);
            points[eye[5]] = Landmark::new(width / 3.0, opening / 2.0, 0.0);
            points[eye[2]] = Landmark::new(2.0 * width / 3.0, -opening / 2.0, 0.0);
            points[eye[4]] = Landmark::new(2.0 * width / 3.0, opening / 2.0, 0.0);
        }
        LandmarkFrame::new(points, None).unwrap()
    }

    fn rotation_y(degrees: f64) -> HeadPose {
        let (s, c) = degrees.to_radians().sin_cos();
        HeadPose {
            rotation: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    fn rotation_x(degrees: f64) -> HeadPose {
        let (s, c) = degrees.to_radians().sin_cos();
        HeadPose {
            rotation: [[1.0, 0.0, 0.0], [0.0, c, s], [0.0, -s, c]],
        }
    }

    #[test]
    fn test_open_eye_ear() {
        let frame = frame_with_eyes(0.1, 0.035);
        let ear = extract(&frame).unwrap().ear;
        // 2 * 0.035 / (2 * 0.1 + eps)
        assert!((ear - 0.35).abs() < 1e-4, "ear = {ear}");
    }

    #[test]
    fn test_closed_eye_ear_is_zero() {
        let frame = frame_with_eyes(0.1, 0.0);
        assert_eq!(extract(&frame).unwrap().ear, 0.0);
    }

    #[test]
    fn test_degenerate_eye_width_yields_zero() {
        let frame = frame_with_eyes(0.0, 0.03);
        let ear = extract(&frame).unwrap().ear;
        assert_eq!(ear, 0.0);
        assert!(ear.is_finite());
    }

    #[test]
    fn test_ear_ignores_depth() {
        let mut points = frame_with_eyes(0.1, 0.035).points().to_vec();
        for idx in LEFT_EYE.iter().chain(RIGHT_EYE.iter()) {
            points[*idx].z = 0.7;
        }
        let frame = LandmarkFrame::new(points, None).unwrap();
        assert!((extract(&frame).unwrap().ear - 0.35).abs() < 1e-4);
    }

    #[test]
    fn test_no_head_pose_is_frontal() {
        let signals = extract(&frame_with_eyes(0.1, 0.03)).unwrap();
        assert_eq!(signals.yaw, 0.0);
        assert_eq!(signals.pitch, 0.0);
    }

    #[test]
    fn test_identity_pose() {
        assert_eq!(pose_angles(&HeadPose::IDENTITY), (0.0, 0.0));
    }

    #[test]
    fn test_yaw_from_rotation() {
        let (yaw, pitch) = pose_angles(&rotation_y(20.0));
        assert!((yaw + 20.0).abs() < 1e-9, "yaw = {yaw}");
        assert!(pitch.abs() < 1e-9);
    }

    #[test]
    fn test_pitch_from_rotation() {
        let (yaw, pitch) = pose_angles(&rotation_x(25.0));
        assert!(yaw.abs() < 1e-9);
        assert!((pitch - 25.0).abs() < 1e-9, "pitch = {pitch}");
    }

    #[test]
    fn test_yaw_clamps_rounding_overshoot() {
        let mut pose = HeadPose::IDENTITY;
        pose.rotation[0][2] = 1.000_000_1;
        let (yaw, _) = pose_angles(&pose);
        assert!((yaw + 90.0).abs() < 1e-9);
    }
}

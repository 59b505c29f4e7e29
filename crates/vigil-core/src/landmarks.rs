//! Face-mesh landmark frames as delivered by the external detector.
//!
//! Indices follow the 468-point MediaPipe face-mesh scheme. The detector
//! runs outside this crate; a frame here is already a set of normalized
//! points for exactly one face.

use crate::error::InvalidInputError;

/// Minimum number of points in a face-mesh frame.
pub const FACE_MESH_POINTS: usize = 468;

/// Left eye, ordered `[outer, top1, top2, inner, bottom1, bottom2]`.
pub const LEFT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];
/// Right eye, ordered `[outer, top1, top2, inner, bottom1, bottom2]`.
pub const RIGHT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

pub const NOSE_TIP: usize = 1;
pub const CHIN: usize = 152;
pub const FOREHEAD: usize = 10;

/// Largest accepted |coordinate|. Detector output is normalized to roughly
/// [0, 1]; points slightly off-frame are fine, values this far out are not.
pub const MAX_COORDINATE: f64 = 1e3;

/// A normalized 3D point in detector space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane (x, y only).
    pub fn planar_distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn is_within(&self, bound: f64) -> bool {
        self.x.abs() <= bound && self.y.abs() <= bound && self.z.abs() <= bound
    }
}

impl From<(f64, f64, f64)> for Landmark {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// Rotation block of the head-pose transform, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub rotation: [[f64; 3]; 3],
}

impl HeadPose {
    pub const IDENTITY: HeadPose = HeadPose {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Build from a flat row-major 3x3 (9 values) or 4x4 (16 values) matrix.
    /// For 4x4 input only the upper-left 3x3 rotation block is kept.
    pub fn from_row_major(values: &[f64]) -> Result<Self, InvalidInputError> {
        let stride = match values.len() {
            9 => 3,
            16 => 4,
            n => return Err(InvalidInputError::HeadPoseShape(n)),
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(InvalidInputError::NonFiniteHeadPose);
        }

        let mut rotation = [[0.0; 3]; 3];
        for (r, row) in rotation.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = values[r * stride + c];
            }
        }
        Ok(Self { rotation })
    }
}

/// One face's landmarks for one video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: Vec<Landmark>,
    head_pose: Option<HeadPose>,
}

impl LandmarkFrame {
    /// Validate cardinality and coordinates. Index ranges for the eye and
    /// motion landmarks are checked again where they are read.
    pub fn new(points: Vec<Landmark>, head_pose: Option<HeadPose>) -> Result<Self, InvalidInputError> {
        if points.len() < FACE_MESH_POINTS {
            return Err(InvalidInputError::TooFewLandmarks {
                expected: FACE_MESH_POINTS,
                actual: points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(InvalidInputError::NonFiniteLandmark { index });
        }
        if let Some(index) = points.iter().position(|p| !p.is_within(MAX_COORDINATE)) {
            return Err(InvalidInputError::CoordinateOutOfRange {
                index,
                bound: MAX_COORDINATE,
            });
        }
        Ok(Self { points, head_pose })
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn head_pose(&self) -> Option<&HeadPose> {
        self.head_pose.as_ref()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Landmark, InvalidInputError> {
        self.points.get(index).ok_or(InvalidInputError::IndexOutOfRange {
            index,
            len: self.points.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_points(n: usize) -> Vec<Landmark> {
        vec![Landmark::new(0.5, 0.5, 0.0); n]
    }

    #[test]
    fn test_rejects_short_frame() {
        let err = LandmarkFrame::new(flat_points(100), None).unwrap_err();
        assert_eq!(
            err,
            InvalidInputError::TooFewLandmarks {
                expected: FACE_MESH_POINTS,
                actual: 100
            }
        );
    }

    #[test]
    fn test_accepts_refined_mesh() {
        // Iris-refined meshes carry 478 points; extra points are fine.
        let frame = LandmarkFrame::new(flat_points(478), None).unwrap();
        assert_eq!(frame.len(), 478);
    }

    #[test]
    fn test_rejects_nan_coordinate() {
        let mut points = flat_points(FACE_MESH_POINTS);
        points[42].y = f64::NAN;
        let err = LandmarkFrame::new(points, None).unwrap_err();
        assert_eq!(err, InvalidInputError::NonFiniteLandmark { index: 42 });
    }

    #[test]
    fn test_rejects_huge_finite_coordinate() {
        let mut points = flat_points(FACE_MESH_POINTS);
        points[362].x = 0.55e200;
        let err = LandmarkFrame::new(points, None).unwrap_err();
        assert_eq!(
            err,
            InvalidInputError::CoordinateOutOfRange {
                index: 362,
                bound: MAX_COORDINATE
            }
        );
    }

    #[test]
    fn test_accepts_slightly_off_frame_points() {
        let mut points = flat_points(FACE_MESH_POINTS);
        points[0] = Landmark::new(-0.2, 1.3, -0.5);
        assert!(LandmarkFrame::new(points, None).is_ok());
    }

    #[test]
    fn test_planar_distance_does_not_overflow() {
        let a = Landmark::new(1e200, 0.0, 0.0);
        let b = Landmark::new(0.0, 1e200, 0.0);
        let d = a.planar_distance(&b);
        assert!(d.is_finite());
        assert!((d / 1e200 - std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_get_out_of_range() {
        let frame = LandmarkFrame::new(flat_points(FACE_MESH_POINTS), None).unwrap();
        assert!(matches!(
            frame.get(500),
            Err(InvalidInputError::IndexOutOfRange { index: 500, len: 468 })
        ));
    }

    #[test]
    fn test_head_pose_from_4x4_keeps_rotation_block() {
        let m = [
            1.0, 2.0, 3.0, 10.0, //
            4.0, 5.0, 6.0, 11.0, //
            7.0, 8.0, 9.0, 12.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let pose = HeadPose::from_row_major(&m).unwrap();
        assert_eq!(pose.rotation, [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
    }

    #[test]
    fn test_head_pose_rejects_bad_shape() {
        assert_eq!(
            HeadPose::from_row_major(&[1.0; 12]).unwrap_err(),
            InvalidInputError::HeadPoseShape(12)
        );
        let mut m = [0.0; 9];
        m[4] = f64::INFINITY;
        assert_eq!(
            HeadPose::from_row_major(&m).unwrap_err(),
            InvalidInputError::NonFiniteHeadPose
        );
    }
}

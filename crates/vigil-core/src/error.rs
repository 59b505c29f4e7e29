use thiserror::Error;

/// A landmark frame that cannot be interpreted under the face-mesh index scheme.
///
/// The frame is dropped; no session state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputError {
    #[error("too few landmarks: {actual} (expected at least {expected})")]
    TooFewLandmarks { expected: usize, actual: usize },
    #[error("landmark index {index} out of range for a frame of {len} points")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("landmark {index} has a non-finite coordinate")]
    NonFiniteLandmark { index: usize },
    #[error("landmark {index} has a coordinate outside ±{bound}")]
    CoordinateOutOfRange { index: usize, bound: f64 },
    #[error("head pose must be a row-major 3x3 or 4x4 matrix, got {0} values")]
    HeadPoseShape(usize),
    #[error("head pose contains a non-finite value")]
    NonFiniteHeadPose,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LivenessError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

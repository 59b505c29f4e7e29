#![allow(dead_code)]

use std::sync::Arc;

use vigil_core::landmarks::{CHIN, FACE_MESH_POINTS, FOREHEAD, LEFT_EYE, NOSE_TIP, RIGHT_EYE};
use vigil_core::{EngineConfig, HeadPose, Landmark, LandmarkFrame, LivenessEngine, ManualClock};

pub const FRAME_SECS: f64 = 1.0 / 30.0;
pub const OPEN: f64 = 0.35;
pub const CLOSED: f64 = 0.05;

/// Synthetic face-mesh frame with controllable eye opening, pose and sway.
#[derive(Debug, Clone, Copy)]
pub struct Face {
    pub ear: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub sway: f64,
}

impl Face {
    pub fn open() -> Self {
        Self {
            ear: OPEN,
            yaw: 0.0,
            pitch: 0.0,
            sway: 0.0,
        }
    }

    pub fn ear(mut self, ear: f64) -> Self {
        self.ear = ear;
        self
    }

    pub fn yaw(mut self, yaw: f64) -> Self {
        self.yaw = yaw;
        self
    }

    pub fn pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    /// Alternate the nose/chin/forehead by ±0.004 depending on frame parity.
    pub fn live(mut self, frame_index: usize) -> Self {
        self.sway = if frame_index % 2 == 0 { 0.004 } else { -0.004 };
        self
    }

    pub fn frame(&self) -> LandmarkFrame {
        let mut points = vec![Landmark::new(0.5, 0.5, -0.01); FACE_MESH_POINTS];

        let width = 0.1;
        let opening = self.ear * width;
        for (eye, x0) in [(LEFT_EYE, 0.55), (RIGHT_EYE, 0.35)] {
            points[eye[0]] = Landmark::new(x0, 0.4, 0.0);
            points[eye[3]] = Landmark::new(x0 + width, 0.4, 0.0);
            points[eye[1]] = Landmark::new(x0 + width / 3.0, 0.4 - opening / 2.0, 0.0);
            points[eye[5]] = Landmark::new(x0 + width / 3.0, 0.4 + opening / 2.0, 0.0);
            points[eye[2]] = Landmark::new(x0 + 2.0 * width / 3.0, 0.4 - opening / 2.0, 0.0);
            points[eye[4]] = Landmark::new(x0 + 2.0 * width / 3.0, 0.4 + opening / 2.0, 0.0);
        }

        points[NOSE_TIP] = Landmark::new(0.5 + self.sway, 0.55, -0.05);
        points[CHIN] = Landmark::new(0.5 + self.sway, 0.8, -0.02);
        points[FOREHEAD] = Landmark::new(0.5 + self.sway, 0.2, -0.02);

        let pose = HeadPose::from_row_major(&pose_matrix(self.yaw, self.pitch))
            .expect("pose matrix is 4x4");
        LandmarkFrame::new(points, Some(pose)).expect("synthetic frame is valid")
    }
}

/// Row-major 4x4 transform whose rotation decodes to (yaw, pitch) degrees.
fn pose_matrix(yaw: f64, pitch: f64) -> [f64; 16] {
    let (sy, cy) = yaw.to_radians().sin_cos();
    let (sp, cp) = pitch.to_radians().sin_cos();
    [
        cy, 0.0, -sy, 0.0, //
        sp * sy, cp, sp * cy, 0.0, //
        cp * sy, -sp, cp * cy, -40.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

pub fn engine_with(config: EngineConfig) -> (Arc<LivenessEngine>, ManualClock) {
    let clock = ManualClock::new();
    let engine = LivenessEngine::with_clock(config, Arc::new(clock.clone())).expect("valid config");
    (Arc::new(engine), clock)
}

pub fn engine() -> (Arc<LivenessEngine>, ManualClock) {
    engine_with(EngineConfig::default())
}

/// Eye-aspect-ratio script for `n` full blinks: open, closed, open.
pub fn blink_script(n: usize) -> Vec<f64> {
    let mut script = vec![OPEN; 5];
    for _ in 0..n {
        script.extend(std::iter::repeat(CLOSED).take(5));
        script.extend(std::iter::repeat(OPEN).take(5));
    }
    script
}

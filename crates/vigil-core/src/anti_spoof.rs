//! Passive anti-spoofing via landmark motion variance.
//!
//! A printed photograph, or a frozen video frame held in front of the
//! camera, still yields a detected face, but its landmarks barely move. A live
//! person exhibits involuntary head sway and breathing motion that spread the
//! positions of stable landmarks (nose tip, chin, forehead) over a short
//! window.
//!
//! The monitor keeps a fixed-length history of those positions and sums the
//! per-axis population variance across tracked landmarks. No extra inference
//! or user interaction is needed; it runs on the landmarks the session
//! already receives.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs, static screens, paused video replays.
//! - **Does not block:** Moving video replay, 3D masks, or adversarial
//!   displays. Those need the active challenge to carry the decision.

use crate::error::InvalidInputError;
use crate::landmarks::{Landmark, LandmarkFrame};
use crate::smoothing::RingBuffer;

/// Snapshot of the monitor after a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessReport {
    /// Summed per-axis variance over tracked landmarks (always ≥ 0).
    pub variance: f64,
    /// Whether the motion is enough to indicate a live subject.
    pub is_live: bool,
    /// `variance / (threshold * 10)`, saturating at 1.0.
    pub confidence: f64,
    /// Frames currently in the history window.
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct AntiSpoofingMonitor {
    history: Vec<RingBuffer<Landmark>>,
    min_samples: usize,
    variance_threshold: f64,
}

impl AntiSpoofingMonitor {
    pub fn new(
        tracked: &[usize],
        history_length: usize,
        min_samples: usize,
        variance_threshold: f64,
    ) -> Self {
        Self {
            history: tracked
                .iter()
                .map(|_| RingBuffer::new(history_length))
                .collect(),
            min_samples,
            variance_threshold,
        }
    }

    /// Push one frame's tracked positions, as returned by
    /// [`sample_landmarks`], in tracking order.
    pub fn record(&mut self, positions: &[Landmark]) -> LivenessReport {
        for (buffer, point) in self.history.iter_mut().zip(positions) {
            buffer.push(*point);
        }
        self.report()
    }

    pub fn report(&self) -> LivenessReport {
        let variance = self.variance();
        let enough = self.samples() > self.min_samples;
        LivenessReport {
            variance,
            is_live: enough && variance >= self.variance_threshold,
            confidence: (variance / (self.variance_threshold * 10.0)).min(1.0),
            samples: self.samples(),
        }
    }

    /// Zero until the history holds more than `min_samples` frames.
    pub fn variance(&self) -> f64 {
        if self.samples() <= self.min_samples {
            return 0.0;
        }
        self.history.iter().map(landmark_variance).sum()
    }

    pub fn samples(&self) -> usize {
        self.history.first().map(RingBuffer::len).unwrap_or(0)
    }

    pub fn reset(&mut self) {
        for buffer in &mut self.history {
            buffer.clear();
        }
    }
}

/// Resolve `indices` in `frame`, failing on the first out-of-range index.
pub fn sample_landmarks(
    frame: &LandmarkFrame,
    indices: &[usize],
) -> Result<Vec<Landmark>, InvalidInputError> {
    indices.iter().map(|&idx| frame.get(idx).copied()).collect()
}

/// Sum over x, y, z of the population variance of one landmark's track.
///
/// Deviations are taken relative to the first sample, so a perfectly static
/// track yields exactly 0.0 regardless of rounding in the coordinates.
fn landmark_variance(track: &RingBuffer<Landmark>) -> f64 {
    let Some(origin) = track.iter().next().copied() else {
        return 0.0;
    };
    let n = track.len() as f64;
    let shifted = || track.iter().map(move |p| (p.x - origin.x, p.y - origin.y, p.z - origin.z));

    let (sx, sy, sz) = shifted().fold((0.0, 0.0, 0.0), |(x, y, z), (dx, dy, dz)| {
        (x + dx, y + dy, z + dz)
    });
    let (mx, my, mz) = (sx / n, sy / n, sz / n);

    let total: f64 = shifted()
        .map(|(dx, dy, dz)| {
            let (ex, ey, ez) = (dx - mx, dy - my, dz - mz);
            ex * ex + ey * ey + ez * ez
        })
        .sum();
    (total / n).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{CHIN, FACE_MESH_POINTS, FOREHEAD, NOSE_TIP};

    const THRESHOLD: f64 = 1e-5;

    const TRACKED: [usize; 3] = [NOSE_TIP, CHIN, FOREHEAD];

    fn monitor() -> AntiSpoofingMonitor {
        AntiSpoofingMonitor::new(&TRACKED, 30, 10, THRESHOLD)
    }

    fn feed(m: &mut AntiSpoofingMonitor, frame: &LandmarkFrame) -> LivenessReport {
        m.record(&sample_landmarks(frame, &TRACKED).unwrap())
    }

    /// Frame with every point at the same position, shifted by `offset`.
    fn frame_at(offset: f64) -> LandmarkFrame {
        let p = Landmark::new(0.5 + offset, 0.5, -0.02);
        LandmarkFrame::new(vec![p; FACE_MESH_POINTS], None).unwrap()
    }

    #[test]
    fn test_identical_frames_rejected() {
        let mut m = monitor();
        let frame = frame_at(0.0);
        let mut report = m.report();
        for _ in 0..11 {
            report = feed(&mut m, &frame);
        }
        assert_eq!(report.samples, 11);
        assert_eq!(report.variance, 0.0);
        assert!(!report.is_live);
        assert_eq!(report.confidence, 0.0);
    }

    #[test]
    fn test_insufficient_samples_not_live() {
        let mut m = monitor();
        // Large motion, but only 10 frames: not enough history yet.
        for i in 0..10 {
            let offset = if i % 2 == 0 { 0.05 } else { -0.05 };
            feed(&mut m, &frame_at(offset));
        }
        let report = m.report();
        assert_eq!(report.variance, 0.0);
        assert!(!report.is_live);
    }

    #[test]
    fn test_micro_movement_passes() {
        let mut m = monitor();
        for i in 0..12 {
            let offset = if i % 2 == 0 { 0.003 } else { -0.003 };
            feed(&mut m, &frame_at(offset));
        }
        let report = m.report();
        // Three landmarks, each with x variance 9e-6.
        assert!((report.variance - 2.7e-5).abs() < 1e-9, "variance = {}", report.variance);
        assert!(report.is_live);
        assert!(report.confidence > 0.0 && report.confidence < 1.0);
    }

    #[test]
    fn test_confidence_saturates() {
        let mut m = monitor();
        for i in 0..20 {
            let offset = if i % 2 == 0 { 0.02 } else { -0.02 };
            feed(&mut m, &frame_at(offset));
        }
        let report = m.report();
        assert!(report.variance >= THRESHOLD * 10.0);
        assert_eq!(report.confidence, 1.0);
    }

    #[test]
    fn test_history_window_forgets_old_motion() {
        let mut m = monitor();
        for i in 0..30 {
            let offset = if i % 2 == 0 { 0.02 } else { -0.02 };
            feed(&mut m, &frame_at(offset));
        }
        assert!(m.report().is_live);
        // A photo swapped in after a live start: once the window fills with
        // static frames the variance collapses.
        for _ in 0..30 {
            feed(&mut m, &frame_at(0.0));
        }
        let report = m.report();
        assert_eq!(report.samples, 30);
        assert!(report.variance < 1e-20);
        assert!(!report.is_live);
    }

    #[test]
    fn test_out_of_range_landmark_is_rejected() {
        let err = sample_landmarks(&frame_at(0.0), &[NOSE_TIP, 900]).unwrap_err();
        assert!(matches!(err, InvalidInputError::IndexOutOfRange { index: 900, .. }));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut m = monitor();
        for _ in 0..5 {
            feed(&mut m, &frame_at(0.0));
        }
        m.reset();
        assert_eq!(m.samples(), 0);
    }
}

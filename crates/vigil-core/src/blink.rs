//! Debounced blink counting on the smoothed eye aspect ratio.
//!
//! A blink is registered on the open edge that follows at least
//! `debounce_frames` consecutive frames below the EAR threshold. A single
//! frame dip (detector noise) never counts.

/// Eye state as seen by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeState {
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    ear_threshold: f64,
    debounce_frames: u32,
    state: EyeState,
    closed_frame_count: u32,
    blink_count: u32,
}

impl BlinkDetector {
    pub fn new(ear_threshold: f64, debounce_frames: u32) -> Self {
        Self {
            ear_threshold,
            debounce_frames: debounce_frames.max(1),
            state: EyeState::Open,
            closed_frame_count: 0,
            blink_count: 0,
        }
    }

    /// Feed one smoothed EAR sample. Returns true when a blink completed on
    /// this frame.
    pub fn update(&mut self, smoothed_ear: f64) -> bool {
        if smoothed_ear < self.ear_threshold {
            self.closed_frame_count = self.closed_frame_count.saturating_add(1);
            if self.closed_frame_count >= self.debounce_frames {
                self.state = EyeState::Closed;
            }
            return false;
        }

        self.closed_frame_count = 0;
        if self.state == EyeState::Closed {
            self.state = EyeState::Open;
            self.blink_count = self.blink_count.saturating_add(1);
            return true;
        }
        false
    }

    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    pub fn state(&self) -> EyeState {
        self.state
    }

    pub fn is_eye_closed(&self) -> bool {
        self.state == EyeState::Closed
    }

    pub fn closed_frame_count(&self) -> u32 {
        self.closed_frame_count
    }

    pub fn reset(&mut self) {
        self.state = EyeState::Open;
        self.closed_frame_count = 0;
        self.blink_count = 0;
    }
}

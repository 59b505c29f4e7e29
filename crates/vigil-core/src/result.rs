use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;

/// Outcome of one `process_frame` call as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The detector reported no face on this frame.
    NoFace,
    /// Challenge running and not yet passed.
    Processing,
    /// Challenge passed with the liveness gate open.
    Verified,
    /// Time limit expired before the challenge was performed.
    Timeout,
    /// Time limit expired after the challenge was performed, but motion never
    /// looked live.
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Timeout | Self::Failed)
    }
}

/// Per-frame verification result, returned by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: Status,
    pub challenge: Challenge,
    #[serde(rename = "blinkCount")]
    pub blink_count: u32,
    #[serde(rename = "isLive")]
    pub is_live: bool,
    pub variance: f64,
    pub confidence: f64,
    /// True exactly when the session has reached SUCCESS.
    pub verified: bool,
    #[serde(rename = "timeElapsed")]
    pub time_elapsed: f64,
    #[serde(rename = "timeRemaining")]
    pub time_remaining: f64,
    /// Unsmoothed mean EAR of the most recent face frame.
    #[serde(rename = "avgEAR")]
    pub avg_ear: f64,
}

//! Per-session challenge state machine.
//!
//! ```text
//! WAITING ──first face frame──▶ CHALLENGE_ACTIVE ──passed & live──▶ SUCCESS
//!                                      │
//!                                      └──elapsed ≥ limit──▶ FAILED
//! ```
//!
//! Only `reset` moves a session backwards. All frame input is validated into
//! a [`FrameObservation`] before a session is touched, so advancing a session
//! cannot fail halfway.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::anti_spoof::{sample_landmarks, AntiSpoofingMonitor, LivenessReport};
use crate::blink::BlinkDetector;
use crate::challenge::{Challenge, ChallengeVerifier, SessionCounters};
use crate::config::EngineConfig;
use crate::error::InvalidInputError;
use crate::landmarks::{Landmark, LandmarkFrame};
use crate::result::{Status, VerificationResult};
use crate::signals::{self, FrameSignals, SmoothedSignals};
use crate::smoothing::MovingAverage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Waiting,
    ChallengeActive,
    Success,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Everything a session needs from one validated face frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub signals: FrameSignals,
    /// Positions of the tracked motion landmarks, in tracking order.
    pub motion: Vec<Landmark>,
}

impl FrameObservation {
    pub fn from_frame(frame: &LandmarkFrame, tracked: &[usize]) -> Result<Self, InvalidInputError> {
        Ok(Self {
            signals: signals::extract(frame)?,
            motion: sample_landmarks(frame, tracked)?,
        })
    }
}

/// Rules shared by every session of one engine.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub time_limit: Duration,
    pub session_timeout: Duration,
    pub verifier: ChallengeVerifier,
}

impl SessionPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            time_limit: config.time_limit(),
            session_timeout: config.session_timeout(),
            verifier: ChallengeVerifier::new(config.required_blinks, config.pose_threshold_degrees),
        }
    }
}

/// Read-only view of a session for status queries and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub challenge: Challenge,
    pub state: SessionState,
    pub blink_count: u32,
    pub is_eye_closed: bool,
    pub closed_frame_count: u32,
    pub verified: bool,
    pub frames_processed: u64,
    pub smoothing_samples: usize,
    pub motion_samples: usize,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    challenge: Challenge,
    state: SessionState,
    start_time: Instant,
    finished_after: Option<Duration>,
    blink: BlinkDetector,
    ear_buffer: MovingAverage,
    yaw_buffer: MovingAverage,
    pitch_buffer: MovingAverage,
    motion: AntiSpoofingMonitor,
    liveness: LivenessReport,
    /// Challenge satisfied at least once. Latches until reset.
    verified: bool,
    frames_processed: u64,
    last_ear: f64,
}

impl Session {
    pub fn new(id: impl Into<String>, challenge: Challenge, config: &EngineConfig, now: Instant) -> Self {
        let motion = AntiSpoofingMonitor::new(
            &config.tracked_landmarks,
            config.history_length,
            config.min_motion_samples,
            config.variance_threshold,
        );
        let liveness = motion.report();
        Self {
            id: id.into(),
            challenge,
            state: SessionState::Waiting,
            start_time: now,
            finished_after: None,
            blink: BlinkDetector::new(config.ear_threshold, config.debounce_frames),
            ear_buffer: MovingAverage::new(config.smoothing_window),
            yaw_buffer: MovingAverage::new(config.smoothing_window),
            pitch_buffer: MovingAverage::new(config.smoothing_window),
            motion,
            liveness,
            verified: false,
            frames_processed: 0,
            last_ear: 0.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn challenge(&self) -> Challenge {
        self.challenge
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn blink_count(&self) -> u32 {
        self.blink.blink_count()
    }

    /// Age of the session, measured from creation, reset or activation.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    /// Whether the store may reclaim this session.
    pub fn is_expired(&self, now: Instant, session_timeout: Duration) -> bool {
        self.age(now) > session_timeout
    }

    /// Return to WAITING with empty buffers. `None` keeps the current challenge.
    pub fn reset(&mut self, challenge: Option<Challenge>, now: Instant) {
        if let Some(challenge) = challenge {
            self.challenge = challenge;
        }
        self.state = SessionState::Waiting;
        self.start_time = now;
        self.finished_after = None;
        self.blink.reset();
        self.ear_buffer.clear();
        self.yaw_buffer.clear();
        self.pitch_buffer.clear();
        self.motion.reset();
        self.liveness = self.motion.report();
        self.verified = false;
        self.frames_processed = 0;
        self.last_ear = 0.0;
    }

    /// Advance the state machine by one frame. `None` means no face.
    pub fn advance(
        &mut self,
        observation: Option<&FrameObservation>,
        now: Instant,
        policy: &SessionPolicy,
    ) -> VerificationResult {
        match self.state {
            SessionState::Success => return self.result(Status::Verified, now, policy),
            SessionState::Failed => return self.result(self.failure_status(), now, policy),
            SessionState::Waiting => {
                if observation.is_none() {
                    return self.result(Status::NoFace, now, policy);
                }
                self.state = SessionState::ChallengeActive;
                self.start_time = now;
                tracing::info!(session = %self.id, challenge = %self.challenge, "challenge started");
            }
            SessionState::ChallengeActive => {}
        }

        // Deadline is checked before the frame is applied, and also on
        // no-face frames: hiding the face never buys time. Reaching the limit
        // exactly counts as expired.
        let elapsed = self.age(now);
        if elapsed >= policy.time_limit {
            self.state = SessionState::Failed;
            self.finished_after = Some(elapsed);
            let status = self.failure_status();
            tracing::info!(
                session = %self.id,
                challenge = %self.challenge,
                ?status,
                blinks = self.blink.blink_count(),
                challenge_met = self.verified,
                elapsed_secs = elapsed.as_secs_f64(),
                "challenge failed"
            );
            return self.result(status, now, policy);
        }

        let Some(observation) = observation else {
            return self.result(Status::NoFace, now, policy);
        };

        let smoothed = self.apply(observation);
        if !self.verified {
            let counters = SessionCounters {
                blink_count: self.blink.blink_count(),
            };
            if policy.verifier.evaluate(self.challenge, &smoothed, &counters) {
                self.verified = true;
                tracing::debug!(session = %self.id, challenge = %self.challenge, "challenge satisfied");
            }
        }

        if self.verified && self.liveness.is_live {
            self.state = SessionState::Success;
            self.finished_after = Some(elapsed);
            tracing::info!(
                session = %self.id,
                challenge = %self.challenge,
                variance = self.liveness.variance,
                elapsed_secs = elapsed.as_secs_f64(),
                "liveness verified"
            );
            return self.result(Status::Verified, now, policy);
        }

        self.result(Status::Processing, now, policy)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            challenge: self.challenge,
            state: self.state,
            blink_count: self.blink.blink_count(),
            is_eye_closed: self.blink.is_eye_closed(),
            closed_frame_count: self.blink.closed_frame_count(),
            verified: self.verified,
            frames_processed: self.frames_processed,
            smoothing_samples: self.ear_buffer.len(),
            motion_samples: self.motion.samples(),
        }
    }

    /// Feed one face frame into the smoothing buffers and both detectors.
    fn apply(&mut self, observation: &FrameObservation) -> SmoothedSignals {
        let raw = observation.signals;
        let smoothed = SmoothedSignals {
            ear: self.ear_buffer.push(raw.ear),
            yaw: self.yaw_buffer.push(raw.yaw),
            pitch: self.pitch_buffer.push(raw.pitch),
        };

        if self.blink.update(smoothed.ear) {
            tracing::debug!(
                session = %self.id,
                blinks = self.blink.blink_count(),
                ear = smoothed.ear,
                "blink"
            );
        }
        self.liveness = self.motion.record(&observation.motion);
        self.frames_processed += 1;
        self.last_ear = raw.ear;
        smoothed
    }

    fn failure_status(&self) -> Status {
        if self.verified {
            Status::Failed
        } else {
            Status::Timeout
        }
    }

    fn result(&self, status: Status, now: Instant, policy: &SessionPolicy) -> VerificationResult {
        let elapsed = match (self.state, self.finished_after) {
            (SessionState::Waiting, _) => Duration::ZERO,
            (_, Some(finished)) => finished,
            _ => self.age(now),
        };
        let remaining = if self.state == SessionState::ChallengeActive {
            policy.time_limit.saturating_sub(elapsed)
        } else {
            Duration::ZERO
        };

        VerificationResult {
            status,
            challenge: self.challenge,
            blink_count: self.blink.blink_count(),
            is_live: status != Status::NoFace && self.liveness.is_live,
            variance: self.liveness.variance,
            confidence: self.liveness.confidence,
            verified: self.state == SessionState::Success,
            time_elapsed: elapsed.as_secs_f64(),
            time_remaining: remaining.as_secs_f64(),
            avg_ear: self.last_ear,
        }
    }
}

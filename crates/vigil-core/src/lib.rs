//! Vigil liveness core.
//!
//! Turns a stream of face-mesh landmark frames into a pass/fail liveness
//! decision: an active challenge (blink, head turn, head nod) gated by a
//! passive motion-variance anti-spoofing check, bounded by a time limit.
//!
//! The landmark detector is external. Callers hand each detector result to
//! [`LivenessEngine::process_frame`] and get a [`VerificationResult`] back.

pub mod anti_spoof;
pub mod blink;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod landmarks;
pub mod result;
pub mod session;
pub mod signals;
pub mod smoothing;
pub mod store;

pub use anti_spoof::{AntiSpoofingMonitor, LivenessReport};
pub use blink::{BlinkDetector, EyeState};
pub use challenge::{Challenge, ChallengeStrategy, ChallengeVerifier, UnknownChallenge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::LivenessEngine;
pub use error::{InvalidInputError, LivenessError};
pub use landmarks::{HeadPose, Landmark, LandmarkFrame};
pub use result::{Status, VerificationResult};
pub use session::{SessionSnapshot, SessionState};
pub use store::SessionStore;

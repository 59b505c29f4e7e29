use std::sync::Arc;
use std::time::Instant;

use zbus::interface;

use vigil_core::{Challenge, HeadPose, Landmark, LandmarkFrame, LivenessEngine, LivenessError};

use crate::config::Config;

/// D-Bus interface for the Vigil liveness daemon.
///
/// Bus name: org.freedesktop.Vigil1
/// Object path: /org/freedesktop/Vigil1
pub struct VigilService {
    pub engine: Arc<LivenessEngine>,
    pub config: Config,
    pub started: Instant,
}

impl VigilService {
    pub fn new(engine: Arc<LivenessEngine>, config: Config) -> Self {
        Self {
            engine,
            config,
            started: Instant::now(),
        }
    }
}

/// Parse a wire challenge name. Empty means "not specified".
fn parse_challenge(name: &str) -> zbus::fdo::Result<Option<Challenge>> {
    if name.trim().is_empty() {
        return Ok(None);
    }
    name.parse()
        .map(Some)
        .map_err(|e: vigil_core::UnknownChallenge| zbus::fdo::Error::InvalidArgs(e.to_string()))
}

fn require_session_id(session_id: &str) -> zbus::fdo::Result<()> {
    if session_id.is_empty() {
        return Err(zbus::fdo::Error::InvalidArgs(
            "session id must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Build a frame from its wire form. Empty landmarks mean the detector
/// found no face; empty `head_pose` means no transform was produced.
fn frame_from_wire(
    landmarks: Vec<(f64, f64, f64)>,
    head_pose: &[f64],
) -> Result<Option<LandmarkFrame>, LivenessError> {
    if landmarks.is_empty() {
        return Ok(None);
    }
    let pose = if head_pose.is_empty() {
        None
    } else {
        Some(HeadPose::from_row_major(head_pose)?)
    };
    let points = landmarks.into_iter().map(Landmark::from).collect();
    Ok(Some(LandmarkFrame::new(points, pose)?))
}

fn engine_error(e: LivenessError) -> zbus::fdo::Error {
    match e {
        LivenessError::InvalidInput(_) => zbus::fdo::Error::InvalidArgs(e.to_string()),
        LivenessError::Config(_) => zbus::fdo::Error::Failed(e.to_string()),
    }
}

#[interface(name = "org.freedesktop.Vigil1")]
impl VigilService {
    /// Open a new session in WAITING and return its generated id.
    ///
    /// An empty `challenge` selects the configured default.
    async fn start_session(&self, challenge: &str) -> zbus::fdo::Result<String> {
        let challenge = parse_challenge(challenge)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let active = self.engine.reset_session(&session_id, challenge);
        tracing::info!(session = %session_id, challenge = %active, "session started");
        Ok(session_id)
    }

    /// Feed one detector frame into a session and return the result as JSON.
    async fn process_frame(
        &self,
        session_id: &str,
        landmarks: Vec<(f64, f64, f64)>,
        head_pose: Vec<f64>,
    ) -> zbus::fdo::Result<String> {
        require_session_id(session_id)?;
        let frame = frame_from_wire(landmarks, &head_pose).map_err(|e| {
            tracing::warn!(session = session_id, error = %e, "process_frame: malformed frame");
            engine_error(e)
        })?;

        let result = self
            .engine
            .process_frame(session_id, frame.as_ref())
            .map_err(engine_error)?;

        if result.status.is_terminal() {
            tracing::info!(
                session = session_id,
                status = ?result.status,
                blinks = result.blink_count,
                variance = result.variance,
                elapsed = result.time_elapsed,
                "session finished"
            );
        }
        serde_json::to_string(&result).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return a session to WAITING, optionally switching its challenge.
    ///
    /// Returns the challenge now active.
    async fn reset_session(&self, session_id: &str, challenge: &str) -> zbus::fdo::Result<String> {
        require_session_id(session_id)?;
        let challenge = parse_challenge(challenge)?;
        Ok(self.engine.reset_session(session_id, challenge).to_string())
    }

    /// Move a session to the next challenge in rotation and back to WAITING.
    ///
    /// Returns the challenge now active.
    async fn next_challenge(&self, session_id: &str) -> zbus::fdo::Result<String> {
        require_session_id(session_id)?;
        Ok(self.engine.rotate_challenge(session_id).to_string())
    }

    /// Return a JSON snapshot of a tracked session.
    async fn get_session(&self, session_id: &str) -> zbus::fdo::Result<String> {
        let snapshot = self.engine.session_snapshot(session_id).ok_or_else(|| {
            zbus::fdo::Error::Failed(format!("unknown session '{session_id}'"))
        })?;
        serde_json::to_string(&snapshot).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Drop a session immediately. Returns whether it existed.
    async fn end_session(&self, session_id: &str) -> zbus::fdo::Result<bool> {
        let removed = self.engine.remove_session(session_id);
        if removed {
            tracing::info!(session = session_id, "session ended by client");
        }
        Ok(removed)
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let engine = self.engine.config();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": self.started.elapsed().as_secs(),
            "active_sessions": self.engine.session_count(),
            "default_challenge": engine.default_challenge,
            "time_limit_secs": engine.time_limit_secs,
            "session_timeout_secs": engine.session_timeout_secs,
            "ear_threshold": engine.ear_threshold,
            "variance_threshold": engine.variance_threshold,
            "session_bus": self.config.session_bus,
        })
        .to_string())
    }
}

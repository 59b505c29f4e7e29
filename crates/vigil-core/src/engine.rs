use std::sync::Arc;

use crate::challenge::Challenge;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::LivenessError;
use crate::landmarks::LandmarkFrame;
use crate::result::VerificationResult;
use crate::session::{FrameObservation, Session, SessionPolicy, SessionSnapshot, SessionState};
use crate::store::{lock_session, SessionHandle, SessionStore};

/// Liveness verification over many concurrent sessions.
///
/// Share it by `Arc`; every method takes `&self`. Frames for different
/// session ids run in parallel; frames for the same id are serialized.
pub struct LivenessEngine {
    config: EngineConfig,
    policy: SessionPolicy,
    store: SessionStore,
    clock: Arc<dyn Clock>,
}

impl LivenessEngine {
    pub fn new(config: EngineConfig) -> Result<Self, LivenessError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, LivenessError> {
        config.validate()?;
        Ok(Self {
            policy: SessionPolicy::from_config(&config),
            config,
            store: SessionStore::new(),
            clock,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one detector frame through `session_id`'s challenge.
    ///
    /// `frame` is `None` when the detector found no face. An unseen id starts
    /// a session with the default challenge. Malformed frames are rejected
    /// before any session is created or modified.
    pub fn process_frame(
        &self,
        session_id: &str,
        frame: Option<&LandmarkFrame>,
    ) -> Result<VerificationResult, LivenessError> {
        let observation = frame
            .map(|f| FrameObservation::from_frame(f, &self.config.tracked_landmarks))
            .transpose()
            .map_err(|e| {
                tracing::warn!(session = session_id, error = %e, "dropping invalid frame");
                e
            })?;

        let now = self.clock.now();
        let handle = self.checkout(session_id, now);
        let mut session = lock_session(&handle);
        let result = session.advance(observation.as_ref(), now, &self.policy);

        if session.state() == SessionState::Failed {
            drop(session);
            if self.store.remove_if_current(session_id, &handle) {
                tracing::info!(session = session_id, status = ?result.status, "session evicted");
            }
        }
        Ok(result)
    }

    /// Put `session_id` back into WAITING, creating it if needed.
    ///
    /// `None` keeps the session's current challenge (or the default for a new
    /// session). Returns the challenge now active.
    ///
    /// A WAITING session counts toward `session_timeout` from the moment of
    /// the reset. If no face frame arrives within that window the session is
    /// reclaimed, and a later frame for the same id starts a fresh session
    /// with the default challenge, not the one chosen here.
    pub fn reset_session(&self, session_id: &str, challenge: Option<Challenge>) -> Challenge {
        let now = self.clock.now();
        let handle = self.store.get_or_insert_with(session_id, || {
            Session::new(
                session_id,
                challenge.unwrap_or(self.config.default_challenge),
                &self.config,
                now,
            )
        });
        let mut session = lock_session(&handle);
        session.reset(challenge, now);
        tracing::info!(session = session_id, challenge = %session.challenge(), "session reset");
        session.challenge()
    }

    /// Reset `session_id` onto the next challenge in rotation
    /// (BLINK → NOD → TURN → BLINK). An unseen id rotates from the default.
    pub fn rotate_challenge(&self, session_id: &str) -> Challenge {
        let now = self.clock.now();
        let handle = self.store.get_or_insert_with(session_id, || {
            Session::new(session_id, self.config.default_challenge, &self.config, now)
        });
        let mut session = lock_session(&handle);
        let next = session.challenge().next();
        session.reset(Some(next), now);
        tracing::info!(session = session_id, challenge = %next, "challenge rotated");
        next
    }

    pub fn session_snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.store
            .get(session_id)
            .map(|handle| lock_session(&handle).snapshot())
    }

    pub fn remove_session(&self, session_id: &str) -> bool {
        self.store.remove(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Reclaim sessions older than the session timeout. Returns how many
    /// were dropped.
    pub fn reap_expired(&self) -> usize {
        let reaped = self
            .store
            .reap_expired(self.clock.now(), self.policy.session_timeout);
        if reaped > 0 {
            tracing::debug!(reaped, remaining = self.store.len(), "reaped expired sessions");
        }
        reaped
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Fetch or create the session for `id`, replacing one that has outlived
    /// the session timeout. Active sessions are left for the state machine
    /// so an overdue challenge still reports its timeout.
    fn checkout(&self, id: &str, now: std::time::Instant) -> SessionHandle {
        loop {
            let handle = self.store.get_or_insert_with(id, || {
                tracing::info!(
                    session = id,
                    challenge = %self.config.default_challenge,
                    "session created"
                );
                Session::new(id, self.config.default_challenge, &self.config, now)
            });

            let stale = {
                let session = lock_session(&handle);
                session.state() != SessionState::ChallengeActive
                    && session.is_expired(now, self.policy.session_timeout)
            };
            if !stale {
                return handle;
            }
            if self.store.remove_if_current(id, &handle) {
                tracing::debug!(session = id, "expired session evicted on access");
            }
        }
    }
}

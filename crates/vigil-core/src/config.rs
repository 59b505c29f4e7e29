use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;
use crate::error::LivenessError;
use crate::landmarks::{CHIN, FOREHEAD, NOSE_TIP};

/// Thresholds and window sizes for the liveness engine.
///
/// Missing fields take their defaults when deserialized, so a config file
/// only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smoothed EAR below this value counts as a closed eye.
    pub ear_threshold: f64,
    /// Minimum |yaw| or |pitch| (degrees) for TURN/NOD.
    pub pose_threshold_degrees: f64,
    /// Consecutive closed frames before a closure is registered.
    pub debounce_frames: u32,
    /// Blinks needed to satisfy BLINK.
    pub required_blinks: u32,
    /// Time allowed to complete the challenge after the first face frame.
    pub time_limit_secs: f64,
    /// Session age past which the store reclaims it.
    pub session_timeout_secs: f64,
    /// Frames of motion history kept for anti-spoofing.
    pub history_length: usize,
    /// History must exceed this many frames before variance is computed.
    pub min_motion_samples: usize,
    /// Minimum summed landmark variance for a live subject.
    pub variance_threshold: f64,
    /// Moving-average window for EAR, yaw and pitch.
    pub smoothing_window: usize,
    /// Face-mesh indices whose motion is tracked.
    pub tracked_landmarks: Vec<usize>,
    /// Challenge for sessions created implicitly by a first frame.
    pub default_challenge: Challenge,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.20,
            pose_threshold_degrees: 15.0,
            debounce_frames: 2,
            required_blinks: 2,
            time_limit_secs: 10.0,
            session_timeout_secs: 15.0,
            history_length: 30,
            min_motion_samples: 10,
            variance_threshold: 1e-5,
            smoothing_window: 5,
            tracked_landmarks: vec![NOSE_TIP, CHIN, FOREHEAD],
            default_challenge: Challenge::Blink,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), LivenessError> {
        let positive = [
            ("ear_threshold", self.ear_threshold),
            ("pose_threshold_degrees", self.pose_threshold_degrees),
            ("time_limit_secs", self.time_limit_secs),
            ("session_timeout_secs", self.session_timeout_secs),
            ("variance_threshold", self.variance_threshold),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LivenessError::Config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        if self.debounce_frames == 0 {
            return Err(LivenessError::Config("debounce_frames must be at least 1".into()));
        }
        if self.required_blinks == 0 {
            return Err(LivenessError::Config("required_blinks must be at least 1".into()));
        }
        if self.smoothing_window == 0 {
            return Err(LivenessError::Config("smoothing_window must be at least 1".into()));
        }
        if self.history_length <= self.min_motion_samples {
            return Err(LivenessError::Config(format!(
                "history_length ({}) must exceed min_motion_samples ({})",
                self.history_length, self.min_motion_samples
            )));
        }
        if self.tracked_landmarks.is_empty() {
            return Err(LivenessError::Config(
                "tracked_landmarks must name at least one landmark".into(),
            ));
        }
        if self.session_timeout_secs < self.time_limit_secs {
            return Err(LivenessError::Config(format!(
                "session_timeout_secs ({}) must not be shorter than time_limit_secs ({})",
                self.session_timeout_secs, self.time_limit_secs
            )));
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.time_limit_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.session_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_limit(), Duration::from_secs(10));
        assert_eq!(config.session_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            ear_threshold = 0.22
            default_challenge = "NOD"
            "#,
        )
        .unwrap();
        assert_eq!(config.ear_threshold, 0.22);
        assert_eq!(config.default_challenge, Challenge::Nod);
        assert_eq!(config.smoothing_window, 5);
        assert_eq!(config.tracked_landmarks, vec![NOSE_TIP, CHIN, FOREHEAD]);
    }

    #[test]
    fn test_rejects_session_timeout_shorter_than_limit() {
        let config = EngineConfig {
            session_timeout_secs: 5.0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(LivenessError::Config(_))));
    }

    #[test]
    fn test_rejects_short_history() {
        let config = EngineConfig {
            history_length: 10,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let config = EngineConfig {
            variance_threshold: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
        let config = EngineConfig {
            ear_threshold: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

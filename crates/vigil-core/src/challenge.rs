//! Active liveness challenges and their per-frame verification strategies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signals::SmoothedSignals;

/// The action a subject is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Challenge {
    #[default]
    Blink,
    Turn,
    Nod,
}

impl Challenge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blink => "BLINK",
            Self::Turn => "TURN",
            Self::Nod => "NOD",
        }
    }

    /// Next challenge in rotation: BLINK → NOD → TURN → BLINK.
    pub fn next(self) -> Self {
        match self {
            Self::Blink => Self::Nod,
            Self::Nod => Self::Turn,
            Self::Turn => Self::Blink,
        }
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown challenge '{0}' (expected BLINK, TURN or NOD)")]
pub struct UnknownChallenge(pub String);

impl FromStr for Challenge {
    type Err = UnknownChallenge;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLINK" => Ok(Self::Blink),
            "TURN" => Ok(Self::Turn),
            "NOD" => Ok(Self::Nod),
            _ => Err(UnknownChallenge(s.to_string())),
        }
    }
}

/// Session counters a strategy may consult.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub blink_count: u32,
}

/// One verification rule per challenge.
pub trait ChallengeStrategy {
    /// True when the challenge is satisfied on this frame.
    fn evaluate(&self, signals: &SmoothedSignals, counters: &SessionCounters) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct BlinkStrategy {
    pub required_blinks: u32,
}

impl ChallengeStrategy for BlinkStrategy {
    fn evaluate(&self, _signals: &SmoothedSignals, counters: &SessionCounters) -> bool {
        counters.blink_count >= self.required_blinks
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TurnStrategy {
    pub threshold_degrees: f64,
}

impl ChallengeStrategy for TurnStrategy {
    fn evaluate(&self, signals: &SmoothedSignals, _counters: &SessionCounters) -> bool {
        signals.yaw.abs() > self.threshold_degrees
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NodStrategy {
    pub threshold_degrees: f64,
}

impl ChallengeStrategy for NodStrategy {
    fn evaluate(&self, signals: &SmoothedSignals, _counters: &SessionCounters) -> bool {
        signals.pitch.abs() > self.threshold_degrees
    }
}

/// Dispatches a [`Challenge`] to its strategy.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeVerifier {
    blink: BlinkStrategy,
    turn: TurnStrategy,
    nod: NodStrategy,
}

impl ChallengeVerifier {
    pub fn new(required_blinks: u32, pose_threshold_degrees: f64) -> Self {
        Self {
            blink: BlinkStrategy { required_blinks },
            turn: TurnStrategy {
                threshold_degrees: pose_threshold_degrees,
            },
            nod: NodStrategy {
                threshold_degrees: pose_threshold_degrees,
            },
        }
    }

    pub fn strategy(&self, challenge: Challenge) -> &dyn ChallengeStrategy {
        match challenge {
            Challenge::Blink => &self.blink,
            Challenge::Turn => &self.turn,
            Challenge::Nod => &self.nod,
        }
    }

    pub fn evaluate(
        &self,
        challenge: Challenge,
        signals: &SmoothedSignals,
        counters: &SessionCounters,
    ) -> bool {
        self.strategy(challenge).evaluate(signals, counters)
    }
}

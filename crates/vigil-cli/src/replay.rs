//! `vigil replay`: run a recorded landmark stream through the engine offline.
//!
//! Input is JSON Lines, one detector result per line:
//!
//! ```text
//! {"landmarks": [[x, y, z], ...], "head_pose": [16 row-major values]}
//! {"landmarks": null}
//! ```
//!
//! A null or empty `landmarks` is a no-face frame; `head_pose` is optional.
//! Frame time comes from a manual clock stepped by `1 / fps`, so results are
//! reproducible regardless of how fast the file is read.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vigil_core::{
    Challenge, EngineConfig, HeadPose, Landmark, LandmarkFrame, LivenessEngine, ManualClock,
    Status, VerificationResult,
};

const SESSION_ID: &str = "replay";

#[derive(Debug, Deserialize)]
struct FrameRecord {
    #[serde(default)]
    landmarks: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    head_pose: Option<Vec<f64>>,
}

pub struct ReplayOptions {
    pub config: EngineConfig,
    pub challenge: Option<Challenge>,
    pub fps: f64,
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub frames: usize,
    pub skipped: usize,
    pub result: Option<VerificationResult>,
}

impl ReplaySummary {
    pub fn verified(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.verified)
    }
}

/// One recorded detector result in the shape `ProcessFrame` takes on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub landmarks: Vec<(f64, f64, f64)>,
    pub head_pose: Vec<f64>,
}

/// Parse one JSONL record without validating it. Empty `landmarks` is a
/// no-face frame.
pub fn parse_wire(line: &str) -> Result<WireFrame> {
    let record: FrameRecord = serde_json::from_str(line).context("malformed JSON record")?;
    Ok(WireFrame {
        landmarks: record
            .landmarks
            .unwrap_or_default()
            .into_iter()
            .map(|[x, y, z]| (x, y, z))
            .collect(),
        head_pose: record.head_pose.unwrap_or_default(),
    })
}

/// Parse and validate one JSONL record. `Ok(None)` is a no-face frame.
fn parse_record(line: &str) -> Result<Option<LandmarkFrame>> {
    let wire = parse_wire(line)?;
    if wire.landmarks.is_empty() {
        return Ok(None);
    }
    let pose = if wire.head_pose.is_empty() {
        None
    } else {
        Some(HeadPose::from_row_major(&wire.head_pose)?)
    };
    let points = wire.landmarks.into_iter().map(Landmark::from).collect();
    Ok(Some(LandmarkFrame::new(points, pose)?))
}

pub fn replay(reader: impl BufRead, options: &ReplayOptions) -> Result<ReplaySummary> {
    let clock = ManualClock::new();
    let engine = LivenessEngine::with_clock(options.config.clone(), Arc::new(clock.clone()))?;
    let challenge = engine.reset_session(SESSION_ID, options.challenge);
    tracing::info!(%challenge, fps = options.fps, "replay started");

    let step = Duration::from_secs_f64(1.0 / options.fps);
    let mut summary = ReplaySummary {
        frames: 0,
        skipped: 0,
        result: None,
    };

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }

        let frame = match parse_record(&line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(line = lineno + 1, error = %e, "skipping record");
                summary.skipped += 1;
                clock.advance(step);
                continue;
            }
        };

        let result = engine.process_frame(SESSION_ID, frame.as_ref())?;
        summary.frames += 1;
        if options.verbose {
            println!("{}", serde_json::to_string(&result)?);
        }

        let finished = result.status.is_terminal();
        summary.result = Some(result);
        if finished {
            break;
        }
        clock.advance(step);
    }

    match &summary.result {
        Some(r) if r.status == Status::Processing || r.status == Status::NoFace => {
            tracing::info!(frames = summary.frames, "input ended before the challenge resolved")
        }
        Some(r) => tracing::info!(status = ?r.status, frames = summary.frames, "replay finished"),
        None => tracing::warn!("no frames in input"),
    }
    Ok(summary)
}

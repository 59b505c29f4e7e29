//! D-Bus client for a running `vigild`.

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use vigil_core::VerificationResult;

use crate::replay::parse_wire;

#[zbus::proxy(
    interface = "org.freedesktop.Vigil1",
    default_service = "org.freedesktop.Vigil1",
    default_path = "/org/freedesktop/Vigil1"
)]
pub trait Vigil {
    fn start_session(&self, challenge: &str) -> zbus::Result<String>;

    fn process_frame(
        &self,
        session_id: &str,
        landmarks: Vec<(f64, f64, f64)>,
        head_pose: Vec<f64>,
    ) -> zbus::Result<String>;

    fn reset_session(&self, session_id: &str, challenge: &str) -> zbus::Result<String>;

    fn next_challenge(&self, session_id: &str) -> zbus::Result<String>;

    fn get_session(&self, session_id: &str) -> zbus::Result<String>;

    fn end_session(&self, session_id: &str) -> zbus::Result<bool>;

    fn status(&self) -> zbus::Result<String>;
}

pub async fn connect(session_bus: bool) -> Result<VigilProxy<'static>> {
    let conn = if session_bus {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus")?;
    VigilProxy::new(&conn)
        .await
        .context("failed to reach vigild (is it running?)")
}

/// Stream a JSONL recording into a daemon session, one `ProcessFrame` call
/// per line. `fps` paces the calls in real time, since the daemon times
/// sessions on its own clock. Stops at the first terminal status.
pub async fn feed(
    proxy: &VigilProxy<'_>,
    session_id: &str,
    reader: impl BufRead,
    fps: Option<f64>,
    verbose: bool,
) -> Result<Option<VerificationResult>> {
    let mut ticker = fps.map(|fps| tokio::time::interval(Duration::from_secs_f64(1.0 / fps)));
    let mut last = None;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let wire = match parse_wire(&line) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::warn!(line = lineno + 1, error = %e, "skipping record");
                continue;
            }
        };
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }

        let reply = proxy
            .process_frame(session_id, wire.landmarks, wire.head_pose)
            .await
            .with_context(|| format!("ProcessFrame failed on line {}", lineno + 1))?;
        let result: VerificationResult =
            serde_json::from_str(&reply).context("unexpected ProcessFrame reply")?;
        if verbose {
            println!("{reply}");
        }

        let finished = result.status.is_terminal();
        last = Some(result);
        if finished {
            break;
        }
    }
    Ok(last)
}

/// Re-indent a JSON reply for the terminal; non-JSON replies pass through.
pub fn pretty(reply: &str) -> String {
    serde_json::from_str::<serde_json::Value>(reply)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| reply.to_string())
}

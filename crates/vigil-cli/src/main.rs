use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vigil_core::{Challenge, EngineConfig};

mod client;
mod replay;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Vigil liveness verification")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true)]
    session_bus: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a recorded JSONL landmark stream through the engine offline
    Replay {
        /// Input file, or `-` for stdin
        input: PathBuf,
        /// Challenge to perform (BLINK, TURN, NOD)
        #[arg(long)]
        challenge: Option<Challenge>,
        /// Frame rate the stream was captured at
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
        /// TOML file with engine thresholds
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print every per-frame result
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show daemon status
    Status,
    /// Open a new session on the daemon and print its id
    Start {
        #[arg(long)]
        challenge: Option<Challenge>,
    },
    /// Return a session to WAITING
    Reset {
        session_id: String,
        #[arg(long)]
        challenge: Option<Challenge>,
    },
    /// Move a session to the next challenge (BLINK, NOD, TURN, ...)
    Next { session_id: String },
    /// Stream a JSONL landmark recording into a daemon session
    Feed {
        session_id: String,
        /// Input file, or `-` for stdin
        input: PathBuf,
        /// Pace frames at this rate; unpaced when omitted
        #[arg(long)]
        fps: Option<f64>,
        /// Print every per-frame result
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show a session snapshot
    Session { session_id: String },
    /// Drop a session
    End { session_id: String },
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn open_input(input: &Path) -> Result<Box<dyn BufRead>> {
    if input.as_os_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn challenge_arg(challenge: Option<Challenge>) -> String {
    challenge.map(|c| c.to_string()).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            input,
            challenge,
            fps,
            config,
            verbose,
        } => {
            anyhow::ensure!(fps.is_finite() && fps > 0.0, "--fps must be positive");
            let options = replay::ReplayOptions {
                config: load_engine_config(config.as_deref())?,
                challenge,
                fps,
                verbose,
            };
            let summary = replay::replay(open_input(&input)?, &options)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.verified() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Status => {
            let proxy = client::connect(cli.session_bus).await?;
            println!("{}", client::pretty(&proxy.status().await?));
        }
        Command::Start { challenge } => {
            let proxy = client::connect(cli.session_bus).await?;
            println!("{}", proxy.start_session(&challenge_arg(challenge)).await?);
        }
        Command::Reset {
            session_id,
            challenge,
        } => {
            let proxy = client::connect(cli.session_bus).await?;
            let active = proxy
                .reset_session(&session_id, &challenge_arg(challenge))
                .await?;
            println!("{session_id}: {active}");
        }
        Command::Next { session_id } => {
            let proxy = client::connect(cli.session_bus).await?;
            let active = proxy.next_challenge(&session_id).await?;
            println!("{session_id}: {active}");
        }
        Command::Feed {
            session_id,
            input,
            fps,
            verbose,
        } => {
            if let Some(fps) = fps {
                anyhow::ensure!(fps.is_finite() && fps > 0.0, "--fps must be positive");
            }
            let proxy = client::connect(cli.session_bus).await?;
            let result =
                client::feed(&proxy, &session_id, open_input(&input)?, fps, verbose).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.is_some_and(|r| r.verified) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Session { session_id } => {
            let proxy = client::connect(cli.session_bus).await?;
            println!("{}", client::pretty(&proxy.get_session(&session_id).await?));
        }
        Command::End { session_id } => {
            let proxy = client::connect(cli.session_bus).await?;
            if !proxy.end_session(&session_id).await? {
                eprintln!("no such session: {session_id}");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

use std::path::{Path, PathBuf};

use thiserror::Error;
use vigil_core::{Challenge, EngineConfig, LivenessError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Invalid(#[from] LivenessError),
}

/// Daemon configuration, loaded from an optional TOML file and `VIGIL_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine thresholds after file and environment overrides.
    pub engine: EngineConfig,
    /// TOML file the engine section was read from, if any.
    pub config_path: Option<PathBuf>,
    /// Seconds between background sweeps for expired sessions.
    pub reaper_interval_secs: u64,
    /// Whether the daemon is running on the session bus (development mode).
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Precedence: defaults, then `VIGIL_CONFIG` file, then per-field
    /// environment variables. Unparsable values fall back silently to the
    /// previous layer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config_path = lookup("VIGIL_CONFIG").map(PathBuf::from);
        let mut engine = match &config_path {
            Some(path) => load_engine_file(path)?,
            None => EngineConfig::default(),
        };

        let env = Env(&lookup);
        engine.ear_threshold = env.parse_or("VIGIL_EAR_THRESHOLD", engine.ear_threshold);
        engine.pose_threshold_degrees =
            env.parse_or("VIGIL_POSE_THRESHOLD_DEGREES", engine.pose_threshold_degrees);
        engine.debounce_frames = env.parse_or("VIGIL_DEBOUNCE_FRAMES", engine.debounce_frames);
        engine.required_blinks = env.parse_or("VIGIL_REQUIRED_BLINKS", engine.required_blinks);
        engine.time_limit_secs = env.parse_or("VIGIL_TIME_LIMIT_SECS", engine.time_limit_secs);
        engine.session_timeout_secs =
            env.parse_or("VIGIL_SESSION_TIMEOUT_SECS", engine.session_timeout_secs);
        engine.history_length = env.parse_or("VIGIL_HISTORY_LENGTH", engine.history_length);
        engine.min_motion_samples =
            env.parse_or("VIGIL_MIN_MOTION_SAMPLES", engine.min_motion_samples);
        engine.variance_threshold =
            env.parse_or("VIGIL_VARIANCE_THRESHOLD", engine.variance_threshold);
        engine.smoothing_window = env.parse_or("VIGIL_SMOOTHING_WINDOW", engine.smoothing_window);
        engine.default_challenge =
            env.parse_or::<Challenge>("VIGIL_DEFAULT_CHALLENGE", engine.default_challenge);

        engine.validate()?;

        Ok(Self {
            engine,
            config_path,
            reaper_interval_secs: env.parse_or("VIGIL_REAPER_INTERVAL_SECS", 5u64).max(1),
            session_bus: lookup("VIGIL_SESSION_BUS").is_some(),
        })
    }
}

fn load_engine_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        (self.0)(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.reaper_interval_secs, 5);
        assert!(!config.session_bus);
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("VIGIL_EAR_THRESHOLD", "0.18"),
            ("VIGIL_REQUIRED_BLINKS", "3"),
            ("VIGIL_DEFAULT_CHALLENGE", "turn"),
            ("VIGIL_SESSION_BUS", "1"),
            ("VIGIL_REAPER_INTERVAL_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.engine.ear_threshold, 0.18);
        assert_eq!(config.engine.required_blinks, 3);
        assert_eq!(config.engine.default_challenge, Challenge::Turn);
        assert!(config.session_bus);
        assert_eq!(config.reaper_interval_secs, 1);
    }

    #[test]
    fn test_unparsable_value_keeps_default() {
        let config =
            Config::from_lookup(lookup(&[("VIGIL_TIME_LIMIT_SECS", "ten")])).unwrap();
        assert_eq!(config.engine.time_limit_secs, 10.0);
    }

    #[test]
    fn test_invalid_combination_rejected() {
        let err = Config::from_lookup(lookup(&[("VIGIL_TIME_LIMIT_SECS", "30")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_file_then_env() {
        let dir = std::env::temp_dir().join(format!("vigild-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vigil.toml");
        std::fs::write(&path, "smoothing_window = 3\nrequired_blinks = 4\n").unwrap();

        let path_str = path.to_string_lossy().into_owned();
        let config = Config::from_lookup(lookup(&[
            ("VIGIL_CONFIG", &path_str),
            ("VIGIL_REQUIRED_BLINKS", "1"),
        ]))
        .unwrap();
        assert_eq!(config.engine.smoothing_window, 3);
        assert_eq!(config.engine.required_blinks, 1);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::from_lookup(lookup(&[("VIGIL_CONFIG", "/nonexistent/vigil.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

//! Editor configuration from `POLYEDIT_*` environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `POLYEDIT_SNAP_THRESHOLD_PX` | 10 |
//! | `POLYEDIT_SHAKE_THRESHOLD_PX` | 20 |
//! | `POLYEDIT_CONTINUOUS_DRAW` | true |
//! | `POLYEDIT_SNAPSHOT_PATH` | unset (no durable history) |
//! | `POLYEDIT_SHAKE_STEPS` | 6 |
//! | `POLYEDIT_SHAKE_INTERVAL_MS` | 40 |
//!
//! A variable that is set but does not parse is an error.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::str::FromStr;

use geometry::consts::{SHAKE_THRESHOLD_PX, SNAP_THRESHOLD_PX};

const DEFAULT_CONTINUOUS_DRAW: bool = true;
const DEFAULT_SHAKE_STEPS: u32 = 6;
const DEFAULT_SHAKE_INTERVAL_MS: u64 = 40;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Parse { key: String, value: String },
    #[error("{key} must be positive, got {value}")]
    NotPositive { key: String, value: String },
}

/// Tunables for the editor coordinator and the shake animation.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Pixel radius for vertex/edge snapping while drawing and cutting.
    pub snap_threshold_px: f64,
    /// Pixel radius for snap-to-neighbours.
    pub shake_threshold_px: f64,
    /// Stay in draw mode after finishing a polygon.
    pub continuous_draw: bool,
    /// Where to keep the durable history snapshot, if anywhere.
    pub snapshot_path: Option<PathBuf>,
    /// Interpolation frames in the shake animation.
    pub shake_steps: u32,
    pub shake_interval_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_threshold_px: SNAP_THRESHOLD_PX,
            shake_threshold_px: SHAKE_THRESHOLD_PX,
            continuous_draw: DEFAULT_CONTINUOUS_DRAW,
            snapshot_path: None,
            shake_steps: DEFAULT_SHAKE_STEPS,
            shake_interval_ms: DEFAULT_SHAKE_INTERVAL_MS,
        }
    }
}

impl EditorConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`EditorConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value. Missing and blank variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for a value that does not parse as its
    /// type, and [`ConfigError::NotPositive`] for a threshold that is not a
    /// positive finite number, or a zero step count or interval.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let snap_threshold_px = parse_or(&read, "POLYEDIT_SNAP_THRESHOLD_PX", SNAP_THRESHOLD_PX)?;
        let shake_threshold_px = parse_or(&read, "POLYEDIT_SHAKE_THRESHOLD_PX", SHAKE_THRESHOLD_PX)?;
        let continuous_draw = match read("POLYEDIT_CONTINUOUS_DRAW") {
            Some(value) => parse_flag("POLYEDIT_CONTINUOUS_DRAW", &value)?,
            None => DEFAULT_CONTINUOUS_DRAW,
        };
        let snapshot_path = read("POLYEDIT_SNAPSHOT_PATH").map(PathBuf::from);
        let shake_steps = parse_or(&read, "POLYEDIT_SHAKE_STEPS", DEFAULT_SHAKE_STEPS)?;
        let shake_interval_ms = parse_or(&read, "POLYEDIT_SHAKE_INTERVAL_MS", DEFAULT_SHAKE_INTERVAL_MS)?;

        require_positive("POLYEDIT_SNAP_THRESHOLD_PX", snap_threshold_px)?;
        require_positive("POLYEDIT_SHAKE_THRESHOLD_PX", shake_threshold_px)?;
        if shake_steps == 0 {
            return Err(ConfigError::NotPositive { key: "POLYEDIT_SHAKE_STEPS".into(), value: "0".into() });
        }
        if shake_interval_ms == 0 {
            return Err(ConfigError::NotPositive { key: "POLYEDIT_SHAKE_INTERVAL_MS".into(), value: "0".into() });
        }

        Ok(Self {
            snap_threshold_px,
            shake_threshold_px,
            continuous_draw,
            snapshot_path,
            shake_steps,
            shake_interval_ms,
        })
    }
}

fn parse_or<T, R>(read: &R, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    R: Fn(&str) -> Option<String>,
{
    let Some(value) = read(key) else {
        return Ok(default);
    };
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Parse { key: key.to_owned(), value })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Parse { key: key.to_owned(), value: value.to_owned() }),
    }
}

fn require_positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        return Ok(());
    }
    Err(ConfigError::NotPositive { key: key.to_owned(), value: value.to_string() })
}

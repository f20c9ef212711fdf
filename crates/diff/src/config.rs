//! Engine configuration.
//!
//! Defaults suit the lessons as shipped. [`EngineConfig::from_env`] lets a
//! host override any field through `CHAINRULE_*` environment variables, and
//! [`EngineConfig::validate`] rejects values the engine can't work with.

use crate::error::DiffError;
use crate::ops::DEFAULT_EXP_CLAMP;

pub const ENV_PREFIX: &str = "CHAINRULE_";
pub const ENV_EXP_CLAMP: &str = "EXP_CLAMP";
pub const ENV_FD_STEP: &str = "FD_STEP";
pub const ENV_FD_TOLERANCE: &str = "FD_TOLERANCE";
pub const ENV_LEARNING_RATE: &str = "LEARNING_RATE";

pub const DEFAULT_FD_STEP: f64 = 1e-5;
pub const DEFAULT_FD_TOLERANCE: f64 = 1e-3;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Numeric knobs shared by graph building, gradient checking and descent.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Ceiling on the exponent of new `Exp` nodes.
    pub exp_clamp: f64,
    /// Central-difference step `h` for gradient checks.
    pub fd_step: f64,
    /// Allowed relative error in gradient checks.
    pub fd_tolerance: f64,
    /// SGD step size.
    pub learning_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exp_clamp: DEFAULT_EXP_CLAMP,
            fd_step: DEFAULT_FD_STEP,
            fd_tolerance: DEFAULT_FD_TOLERANCE,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

impl EngineConfig {
    /// Build from environment variables, falling back to defaults for unset keys.
    ///
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self, DiffError> {
        let default = Self::default();
        let config = Self {
            exp_clamp: env_parsed(ENV_EXP_CLAMP)?.unwrap_or(default.exp_clamp),
            fd_step: env_parsed(ENV_FD_STEP)?.unwrap_or(default.fd_step),
            fd_tolerance: env_parsed(ENV_FD_TOLERANCE)?.unwrap_or(default.fd_tolerance),
            learning_rate: env_parsed(ENV_LEARNING_RATE)?.unwrap_or(default.learning_rate),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DiffError> {
        if !self.exp_clamp.is_finite() || self.exp_clamp > f64::MAX.ln() {
            return Err(invalid(ENV_EXP_CLAMP, "must be finite and keep e^x finite"));
        }
        for (key, value) in [
            (ENV_FD_STEP, self.fd_step),
            (ENV_FD_TOLERANCE, self.fd_tolerance),
            (ENV_LEARNING_RATE, self.learning_rate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(key, "must be a positive finite number"));
            }
        }
        Ok(())
    }
}

/// Full environment variable name for a key suffix (`FD_STEP` → `CHAINRULE_FD_STEP`).
pub fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

fn env_parsed(suffix: &str) -> Result<Option<f64>, DiffError> {
    let key = env_key(suffix);
    let raw = match std::env::var(&key) {
        Ok(raw) => raw,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(e) => {
            return Err(DiffError::Config {
                key,
                message: e.to_string(),
            })
        }
    };
    raw.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|e| DiffError::Config {
            key,
            message: format!("{:?}: {}", raw, e),
        })
}

fn invalid(suffix: &str, message: &str) -> DiffError {
    DiffError::Config {
        key: env_key(suffix),
        message: message.to_string(),
    }
}
